//! Package names and the export names derived from them.
//!
//! For package `ns:name`, interface `iface` and function `fn`:
//! - C symbol: `exports_<ns>_<name>_<iface>_<fn>` (parts in snake case)
//! - canonical core export: `ns:name/iface#fn`
//! - component export: `ns:name/iface`
//! - post-return: `cabi_post_ns:name/iface#fn`

use heck::ToSnakeCase;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from validating package, interface or function names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PackageNameError {
    #[error("package name `{0}` must have the form `namespace:name`")]
    MissingSeparator(String),
    #[error("`{part}` in `{context}` is not a kebab-case identifier")]
    NotKebab { context: String, part: String },
}

/// A WIT package name without version, e.g. `pack:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName {
    namespace: String,
    name: String,
}

impl PackageName {
    pub fn new(namespace: &str, name: &str) -> Result<Self, PackageNameError> {
        let context = format!("{namespace}:{name}");
        check_kebab(namespace, &context)?;
        check_kebab(name, &context)?;
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Build a name the crate itself declares, skipping validation.
    pub(crate) fn known(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `pack:name` → `pack_name`
    pub fn to_snake_case(&self) -> String {
        format!(
            "{}_{}",
            self.namespace.to_snake_case(),
            self.name.to_snake_case()
        )
    }

    /// Component-level export name of `interface`: `pack:name/iface`.
    pub fn interface(&self, interface: &str) -> String {
        format!("{self}/{interface}")
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl FromStr for PackageName {
    type Err = PackageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = s
            .split_once(':')
            .ok_or_else(|| PackageNameError::MissingSeparator(s.to_string()))?;
        Self::new(namespace, name)
    }
}

/// A kebab-case identifier: lowercase ASCII words of letters and digits,
/// joined by single dashes, each word starting with a letter.
pub fn is_kebab_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.split('-').all(|word| {
            let mut chars = word.chars();
            chars.next().is_some_and(|c| c.is_ascii_lowercase())
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

/// Validate `part` as a kebab-case identifier, naming `context` on failure.
pub fn check_kebab(part: &str, context: &str) -> Result<(), PackageNameError> {
    if is_kebab_identifier(part) {
        Ok(())
    } else {
        Err(PackageNameError::NotKebab {
            context: context.to_string(),
            part: part.to_string(),
        })
    }
}

/// C binding symbol of an exported function.
pub fn c_symbol(package: &PackageName, interface: &str, function: &str) -> String {
    format!(
        "exports_{}_{}_{}",
        package.to_snake_case(),
        interface.to_snake_case(),
        function.to_snake_case()
    )
}

/// Canonical core-module export name of an exported function.
pub fn canonical_export(package: &PackageName, interface: &str, function: &str) -> String {
    format!("{}#{function}", package.interface(interface))
}

/// Post-return export paired with a function whose result lives in memory.
pub fn post_return_export(package: &PackageName, interface: &str, function: &str) -> String {
    format!("cabi_post_{}", canonical_export(package, interface, function))
}
