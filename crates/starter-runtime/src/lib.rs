//! `starter-runtime` — guest-side logic of the starter components.
//!
//! This crate is `#![no_std]`. It provides:
//! - [`Counter`] and the process-wide [`TOTAL`] accumulator behind `add`/`get`
//! - the outgoing HTTP request workflow behind `send`, written against the
//!   [`http::HttpImports`] host trait (requires `alloc`)
//! - the print fixture's line formatting
//! - the large-dynamic-memory fixture's allocation run (requires `alloc`)
//!
//! The component crates only translate between their generated bindings and
//! these functions, so everything here also runs natively under `cargo test`.

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

/// One mebibyte, the block size of the large-dynamic-memory fixture.
pub const MIB: usize = 1 << 20;

/// WebAssembly page size: 64 KiB per the Wasm specification.
pub const WASM_PAGE_SIZE: usize = 65536;

mod counter;
pub use counter::{Counter, TOTAL};

pub mod print;
pub use print::Timestamp;

#[cfg(feature = "alloc")]
pub mod http;

#[cfg(feature = "alloc")]
pub mod memory;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mib_is_sixteen_wasm_pages() {
        assert_eq!(MIB / WASM_PAGE_SIZE, 16);
        assert_eq!(MIB % WASM_PAGE_SIZE, 0);
    }
}
