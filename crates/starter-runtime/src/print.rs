//! The `c-1` print fixture: `run` greets, `print` echoes a string with a
//! timestamp.
//!
//! Strings cross the component boundary as a pointer and a length with no
//! terminator, so printing is driven by the length alone. [`bounded`] is the
//! only place the text is sliced.

use core::fmt;

/// Line written by the fixture's `run` export.
pub const HELLO: &str = "Hello World!";

/// Value returned by the fixture's `run` export.
pub const RUN_RESULT: i32 = 100;

/// A wall-clock reading, as `wasi:clocks/wall-clock` reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub seconds: u64,
    /// Sub-second part, always below 1_000_000_000.
    pub nanoseconds: u32,
}

impl Timestamp {
    pub const fn new(seconds: u64, nanoseconds: u32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// The first `len` bytes of `text`, or all of it if `len` is larger.
#[inline]
pub fn bounded(text: &[u8], len: usize) -> &[u8] {
    &text[..len.min(text.len())]
}

/// Write the `run` greeting and return the export's result.
pub fn write_hello<W: fmt::Write>(out: &mut W) -> Result<i32, fmt::Error> {
    writeln!(out, "{HELLO}")?;
    Ok(RUN_RESULT)
}

/// Write one `print` line: `[<timestamp>] <text>`.
///
/// Reads at most `len` bytes of `text`. Invalid UTF-8 is replaced with
/// U+FFFD rather than rejected.
pub fn write_line<W: fmt::Write>(
    out: &mut W,
    text: &[u8],
    len: usize,
    at: Timestamp,
) -> fmt::Result {
    write!(out, "[{at}] ")?;
    for chunk in bounded(text, len).utf8_chunks() {
        out.write_str(chunk.valid())?;
        if !chunk.invalid().is_empty() {
            out.write_char(char::REPLACEMENT_CHARACTER)?;
        }
    }
    out.write_char('\n')
}

/// [`write_line`] into a fresh `String`.
#[cfg(feature = "alloc")]
pub fn line(text: &[u8], len: usize, at: Timestamp) -> alloc::string::String {
    let mut out = alloc::string::String::new();
    // Writing into a String cannot fail.
    let _ = write_line(&mut out, text, len, at);
    out
}


// ── Kani Formal Verification Proofs ──────────────────────────────────────

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: `bounded` never yields more than `len` bytes, never panics.
    #[kani::proof]
    #[kani::unwind(1)]
    fn bounded_never_reads_past_len() {
        let text = [0u8; 8];
        let len: usize = kani::any();
        let slice = bounded(&text, len);
        kani::assert(slice.len() <= len, "slice must not exceed len");
        kani::assert(slice.len() <= text.len(), "slice must stay in text");
    }
}
