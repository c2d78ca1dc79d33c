//! starter — export-surface inspector for the starter WebAssembly components.
//!
//! Derives the names each example exports for a package and interface, and
//! checks built core modules and components against them.

pub mod catalog;
pub mod naming;
pub mod parser;
pub mod surface;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use catalog::Example;
pub use naming::{PackageName, PackageNameError};
pub use surface::{ExpectedExport, Finding, Severity, SurfaceReport};

use naming::check_kebab;
use parser::{parse_wasm, ParsedBinary};

/// What to check a binary against.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub example: Example,
    /// Package the example was generated for.
    pub package: PackageName,
    /// Exported interface name, in kebab case.
    pub interface: String,
    /// Treat exports in the interface that the example does not define as errors.
    pub strict: bool,
}

impl CheckOptions {
    /// Options with the example's default package and interface.
    pub fn new(example: Example) -> Self {
        Self {
            example,
            package: example.default_package(),
            interface: example.default_interface().to_string(),
            strict: false,
        }
    }

    pub fn with_package(mut self, package: PackageName) -> Self {
        self.package = package;
        self
    }

    pub fn with_interface(mut self, interface: &str) -> Result<Self, PackageNameError> {
        check_kebab(interface, "interface name")?;
        self.interface = interface.to_string();
        Ok(self)
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Parse a core module or component.
pub fn inspect(wasm_bytes: &[u8]) -> Result<ParsedBinary> {
    parse_wasm(wasm_bytes).context("failed to parse WebAssembly binary")
}

/// Check the export surface of a binary against `options`.
///
/// # Example
/// ```no_run
/// use starter::{check, CheckOptions, Example};
///
/// let wasm_bytes = std::fs::read("counter.wasm").unwrap();
/// let report = check(&wasm_bytes, &CheckOptions::new(Example::Counter)).unwrap();
/// assert!(report.is_ok());
/// ```
pub fn check(wasm_bytes: &[u8], options: &CheckOptions) -> Result<SurfaceReport> {
    let binary = inspect(wasm_bytes)?;
    tracing::debug!(
        kind = ?binary.kind,
        modules = binary.modules.len(),
        component_exports = binary.component_exports.len(),
        "parsed binary"
    );
    let report = surface::check_surface(&binary, options);
    tracing::debug!(
        example = %options.example,
        matched = report.matched.len(),
        findings = report.findings.len(),
        "checked surface"
    );
    Ok(report)
}

/// Names of every export the configured example must provide.
pub fn expected_exports(options: &CheckOptions) -> Vec<ExpectedExport> {
    surface::expected_exports(options.example, &options.package, &options.interface)
}
