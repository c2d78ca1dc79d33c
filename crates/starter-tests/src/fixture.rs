use anyhow::{Context, Result};
use starter::catalog::val_type_name;
use starter::{expected_exports, CheckOptions, ExpectedExport};
use std::fmt::Write;

/// WAT source of an example as the toolchain would emit it.
///
/// Every function is exported under its canonical name and carries its C
/// symbol in the `name` section. String results get a post-return export.
#[derive(Debug, Clone)]
pub struct ModuleFixture {
    interface_export: String,
    exports: Vec<ExpectedExport>,
    post_return: bool,
    extra: Vec<String>,
}

impl ModuleFixture {
    pub fn new(options: &CheckOptions) -> Self {
        Self {
            interface_export: options.package.interface(&options.interface),
            exports: expected_exports(options),
            post_return: true,
            extra: Vec::new(),
        }
    }

    /// Leave out the function named `function`.
    pub fn without(mut self, function: &str) -> Self {
        self.exports.retain(|export| export.function.name != function);
        self
    }

    /// Leave out every `cabi_post_` export.
    pub fn without_post_return(mut self) -> Self {
        self.post_return = false;
        self
    }

    /// Add a `() -> ()` function exported under the interface as `function`.
    /// Components also lift it into the interface instance.
    pub fn with_extra_function(mut self, function: &str) -> Self {
        self.extra.push(function.to_string());
        self
    }

    pub fn module_wat(&self) -> String {
        let mut wat = String::from("(module\n");
        wat.push_str("  (memory (export \"memory\") 1)\n");
        wat.push_str(
            "  (func $cabi_realloc (export \"cabi_realloc\") \
             (param i32 i32 i32 i32) (result i32) i32.const 8)\n",
        );
        for export in &self.exports {
            let _ = write!(
                wat,
                "  (func ${} (export \"{}\")",
                export.c_symbol, export.canonical
            );
            let params = export.function.core_params();
            if !params.is_empty() {
                wat.push_str(" (param");
                for ty in params {
                    let _ = write!(wat, " {}", val_type_name(ty));
                }
                wat.push(')');
            }
            if let Some(&result) = export.function.core_results().first() {
                let ty = val_type_name(result);
                let _ = write!(wat, " (result {ty}) {ty}.const 0");
            }
            wat.push_str(")\n");

            if let Some(post_return) = export.post_return.as_ref().filter(|_| self.post_return) {
                let _ = writeln!(wat, "  (func (export \"{post_return}\") (param i32))");
            }
        }
        for name in &self.extra {
            let _ = writeln!(wat, "  (func (export \"{}#{name}\"))", self.interface_export);
        }
        wat.push(')');
        wat
    }

    /// The core module wrapped in a component that lifts every function and
    /// exports them as one instance named after the interface.
    pub fn component_wat(&self) -> String {
        let mut wat = String::from("(component\n");
        for line in self.module_wat().lines() {
            let line = line.strip_prefix("(module").map_or_else(
                || line.to_string(),
                |rest| format!("(core module $main{rest}"),
            );
            let _ = writeln!(wat, "  {line}");
        }
        wat.push_str("  (core instance $i (instantiate $main))\n");

        for (index, export) in self.exports.iter().enumerate() {
            let function = &export.function;
            let _ = write!(wat, "  (func $f{index}");
            for (name, ty) in function.params {
                let _ = write!(wat, " (param \"{name}\" {ty})");
            }
            if let Some(result) = function.result {
                let _ = write!(wat, " (result {result})");
            }
            let _ = write!(
                wat,
                " (canon lift (core func $i \"{}\") (memory (core memory $i \"memory\")) \
                 (realloc (core func $i \"cabi_realloc\"))",
                export.canonical
            );
            if let Some(post_return) = export.post_return.as_ref().filter(|_| self.post_return) {
                let _ = write!(wat, " (post-return (core func $i \"{post_return}\"))");
            }
            wat.push_str("))\n");
        }
        for (index, name) in self.extra.iter().enumerate() {
            let _ = writeln!(
                wat,
                "  (func $extra{index} (canon lift (core func $i \"{}#{name}\")))",
                self.interface_export
            );
        }

        wat.push_str("  (instance $api");
        for (index, export) in self.exports.iter().enumerate() {
            let _ = write!(
                wat,
                " (export \"{}\" (func $f{index}))",
                export.function.name
            );
        }
        for (index, name) in self.extra.iter().enumerate() {
            let _ = write!(wat, " (export \"{name}\" (func $extra{index}))");
        }
        wat.push_str(")\n");
        let _ = writeln!(wat, "  (export \"{}\" (instance $api))", self.interface_export);
        wat.push(')');
        wat
    }

    pub fn module(&self) -> Result<Vec<u8>> {
        wat::parse_str(self.module_wat()).context("failed to assemble fixture module")
    }

    pub fn component(&self) -> Result<Vec<u8>> {
        wat::parse_str(self.component_wat()).context("failed to assemble fixture component")
    }
}
