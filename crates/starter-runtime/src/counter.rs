//! Process-wide accumulator behind the counter component's `add`/`get`.
//!
//! A component instance is single-threaded, but the total lives in a
//! `static`, so it is an atomic rather than a `static mut`. `Relaxed`
//! ordering is enough: there is no other memory the total guards.

use core::sync::atomic::{AtomicU64, Ordering};

/// The accumulator exported by the counter component. Starts at zero when the
/// instance is loaded and lives as long as the instance.
pub static TOTAL: Counter = Counter::new();

/// A 64-bit running total.
///
/// Addition wraps on overflow, the same as unsigned 64-bit arithmetic in the
/// guest languages the starters are generated for.
#[derive(Debug, Default)]
pub struct Counter {
    total: AtomicU64,
}

impl Counter {
    /// A counter at zero.
    pub const fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
        }
    }

    /// Add `value` to the total.
    #[inline]
    pub fn add(&self, value: u64) {
        self.total.fetch_add(value, Ordering::Relaxed);
    }

    /// Current total.
    #[inline]
    pub fn get(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}


// ── Kani Formal Verification Proofs ──────────────────────────────────────
//
// Run with: cargo kani -p starter-runtime

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: two adds equal one wrapping sum, and never panic.
    #[kani::proof]
    fn add_is_wrapping_sum() {
        let counter = Counter::new();
        let a: u64 = kani::any();
        let b: u64 = kani::any();
        counter.add(a);
        counter.add(b);
        kani::assert(
            counter.get() == a.wrapping_add(b),
            "total must be the wrapping sum of the added values",
        );
    }
}
