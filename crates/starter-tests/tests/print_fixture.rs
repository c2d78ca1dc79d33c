//! The `c-1` fixture's `run` and `print` output.

use starter_runtime::print::{bounded, line, write_hello, write_line, HELLO, RUN_RESULT};
use starter_runtime::Timestamp;

#[test]
fn test_run_prints_greeting_and_returns_100() {
    let mut out = String::new();
    assert_eq!(write_hello(&mut out), Ok(100));
    assert_eq!(RUN_RESULT, 100);
    assert_eq!(out, format!("{HELLO}\n"));
}

#[test]
fn test_print_prefixes_timestamp() {
    let at = Timestamp::new(12, 345_000_000);
    assert_eq!(line(b"hi there", 8, at), "[12.345000000] hi there\n");
}

#[test]
fn test_print_never_reads_past_len() {
    // A guest string lives inside a larger buffer; only `len` bytes are its own.
    let memory = b"first\xff\xfesecond";
    for len in 0..=5 {
        let printed = line(memory, len, Timestamp::default());
        let text = printed
            .strip_prefix("[0.000000000] ")
            .and_then(|rest| rest.strip_suffix('\n'))
            .unwrap();
        assert_eq!(text.as_bytes(), &memory[..len]);
    }
}

#[test]
fn test_len_beyond_buffer_is_clamped() {
    assert_eq!(bounded(b"abc", usize::MAX), b"abc");
    assert_eq!(line(b"abc", 10, Timestamp::default()), "[0.000000000] abc\n");
}

#[test]
fn test_write_line_into_fixed_buffer_fails_cleanly() {
    struct Tiny(usize);
    impl std::fmt::Write for Tiny {
        fn write_str(&mut self, s: &str) -> std::fmt::Result {
            self.0 = self.0.checked_sub(s.len()).ok_or(std::fmt::Error)?;
            Ok(())
        }
    }
    let mut out = Tiny(4);
    assert!(write_line(&mut out, b"too long", 8, Timestamp::default()).is_err());
}

#[test]
fn test_timestamps_order() {
    assert!(Timestamp::new(1, 999_999_999) < Timestamp::new(2, 0));
}
