//! Shared fixtures for the end-to-end tests and benchmarks.
//!
//! - [`ModuleFixture`] builds core modules and components in the shape the
//!   starter components compile to, for any package and interface.
//! - [`RecordingHost`] implements the HTTP host imports in memory and logs
//!   every handle it hands out and gets back.

mod fixture;
mod host;

pub use fixture::ModuleFixture;
pub use host::{Event, Handle, RecordedRequest, RecordingHost, Resource, Step};
