//! Export-surface check of a built example.
//!
//! Compares the exports of a core module or component against what an
//! example, generated for a given package and interface, must export.

use crate::catalog::{format_core_signature, Example, ExportFunction};
use crate::naming::{c_symbol, canonical_export, post_return_export, PackageName};
use crate::parser::{
    BinaryKind, ComponentExportInfo, ComponentFuncSig, ParsedBinary, ParsedModule,
};
use crate::CheckOptions;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn error(message: String) -> Self {
        Self {
            severity: Severity::Error,
            message,
        }
    }

    fn warning(message: String) -> Self {
        Self {
            severity: Severity::Warning,
            message,
        }
    }

    fn info(message: String) -> Self {
        Self {
            severity: Severity::Info,
            message,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// The names one exported function is expected under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedExport {
    pub function: ExportFunction,
    /// `exports_<package>_<interface>_<function>`
    pub c_symbol: String,
    /// `ns:name/iface#fn`
    pub canonical: String,
    /// `cabi_post_ns:name/iface#fn`, for results held in memory.
    pub post_return: Option<String>,
}

/// Expected exports of `example` generated for `package` and `interface`.
pub fn expected_exports(
    example: Example,
    package: &PackageName,
    interface: &str,
) -> Vec<ExpectedExport> {
    example
        .functions()
        .iter()
        .map(|function| ExpectedExport {
            function: *function,
            c_symbol: c_symbol(package, interface, function.name),
            canonical: canonical_export(package, interface, function.name),
            post_return: function
                .needs_post_return()
                .then(|| post_return_export(package, interface, function.name)),
        })
        .collect()
}

/// Outcome of checking one binary.
#[derive(Debug, Clone)]
pub struct SurfaceReport {
    pub example: Example,
    pub package: PackageName,
    pub interface: String,
    pub kind: BinaryKind,
    /// Canonical names of the functions found with the right signature.
    pub matched: Vec<String>,
    pub findings: Vec<Finding>,
}

impl SurfaceReport {
    /// True when no finding is an error.
    pub fn is_ok(&self) -> bool {
        self.findings.iter().all(|f| f.severity != Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }
}

/// Check the export surface of a parsed binary.
pub fn check_surface(binary: &ParsedBinary, options: &CheckOptions) -> SurfaceReport {
    let interface_export = options.package.interface(&options.interface);
    let mut report = SurfaceReport {
        example: options.example,
        package: options.package.clone(),
        interface: options.interface.clone(),
        kind: binary.kind,
        matched: Vec::new(),
        findings: Vec::new(),
    };

    let expected = expected_exports(options.example, &options.package, &options.interface);

    if binary.kind == BinaryKind::Component {
        match binary
            .component_exports
            .iter()
            .find(|export| export.name == interface_export)
        {
            None => report.findings.push(Finding::error(format!(
                "component does not export instance `{interface_export}`"
            ))),
            Some(export) if export.kind != "instance" => {
                report.findings.push(Finding::error(format!(
                    "component export `{interface_export}` is a {}, expected an instance",
                    export.kind
                )))
            }
            Some(export) => check_instance(export, &expected, options.strict, &mut report),
        }
    }

    let prefix = format!("{interface_export}#");
    let Some(module) = implementing_module(binary, &prefix) else {
        report
            .findings
            .push(Finding::error("binary contains no core module".to_string()));
        return report;
    };

    for export in &expected {
        check_function(module, export, &mut report);
    }

    for export in module.exported_functions() {
        if !export.name.starts_with(&prefix)
            || expected.iter().any(|e| e.canonical == export.name)
        {
            continue;
        }
        if options.strict {
            report.findings.push(Finding::error(format!(
                "unexpected export `{}` in interface `{interface_export}`",
                export.name
            )));
        } else {
            tracing::debug!(export = %export.name, "ignoring export outside the example");
        }
    }

    report
}

/// Compare the functions of the exported interface instance with the
/// example's WIT signatures.
fn check_instance(
    instance: &ComponentExportInfo,
    expected: &[ExpectedExport],
    strict: bool,
    report: &mut SurfaceReport,
) {
    let Some(functions) = &instance.functions else {
        report.findings.push(Finding::warning(format!(
            "functions of instance `{}` could not be resolved",
            instance.name
        )));
        return;
    };

    for export in expected {
        let function = &export.function;
        let Some(found) = instance.function(function.name) else {
            report.findings.push(Finding::error(format!(
                "instance `{}` does not export `{}`",
                instance.name,
                function.wit_signature()
            )));
            continue;
        };
        match &found.sig {
            None => tracing::debug!(function = function.name, "instance function type unresolved"),
            Some(sig) if !wit_signature_matches(sig, function) => {
                report.findings.push(Finding::error(format!(
                    "instance `{}` exports `{}` as `{sig}` but expected `{}`",
                    instance.name,
                    function.name,
                    function.wit_signature()
                )))
            }
            Some(_) => {}
        }
    }

    for found in functions {
        if expected.iter().any(|e| e.function.name == found.name) {
            continue;
        }
        if strict {
            report.findings.push(Finding::error(format!(
                "unexpected function `{}` in instance `{}`",
                found.name, instance.name
            )));
        } else {
            tracing::debug!(
                function = %found.name,
                "ignoring instance function outside the example"
            );
        }
    }
}

fn wit_signature_matches(sig: &ComponentFuncSig, function: &ExportFunction) -> bool {
    sig.params.len() == function.params.len()
        && sig
            .params
            .iter()
            .zip(function.params)
            .all(|((name, ty), (want_name, want_ty))| {
                name == want_name && *ty == want_ty.to_string()
            })
        && sig.result == function.result.map(|ty| ty.to_string())
}

/// The core module carrying the interface's exports: the one with the most
/// exports under `prefix`, or the first module when none has any.
fn implementing_module<'a>(binary: &'a ParsedBinary, prefix: &str) -> Option<&'a ParsedModule> {
    let count = |module: &ParsedModule| {
        module
            .exported_functions()
            .filter(|export| export.name.starts_with(prefix))
            .count()
    };
    let mut best: Option<(&ParsedModule, usize)> = None;
    for module in &binary.modules {
        let n = count(module);
        if best.map_or(true, |(_, best_n)| n > best_n) {
            best = Some((module, n));
        }
    }
    best.map(|(module, _)| module)
}

fn check_function(module: &ParsedModule, expected: &ExpectedExport, report: &mut SurfaceReport) {
    let Some(export) = module.exported_function(&expected.canonical) else {
        report.findings.push(Finding::error(format!(
            "missing export `{}` (C symbol `{}`)",
            expected.canonical, expected.c_symbol
        )));
        return;
    };

    let Some(ty) = module.func_type(export.index) else {
        report.findings.push(Finding::error(format!(
            "export `{}` refers to function {} which has no function type",
            expected.canonical, export.index
        )));
        return;
    };

    let want_params = expected.function.core_params();
    let want_results = expected.function.core_results();
    if ty.params() != want_params.as_slice() || ty.results() != want_results.as_slice() {
        report.findings.push(Finding::error(format!(
            "export `{}` has signature {} but `{}` lowers to {}",
            expected.canonical,
            format_core_signature(ty.params(), ty.results()),
            expected.function.wit_signature(),
            format_core_signature(&want_params, &want_results),
        )));
        return;
    }

    report.matched.push(expected.canonical.clone());

    if let Some(symbol) = module.symbol(export.index) {
        // wit-bindgen names the function after its canonical export.
        if symbol != expected.c_symbol && symbol != expected.canonical {
            report.findings.push(Finding::info(format!(
                "export `{}` is implemented by `{symbol}`, not `{}`",
                expected.canonical, expected.c_symbol
            )));
        }
    }

    if let Some(post_return) = &expected.post_return {
        if module.exported_function(post_return).is_none() {
            report.findings.push(Finding::warning(format!(
                "missing post-return export `{post_return}`; the string returned by `{}` is never freed",
                expected.canonical
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_wasm;

    fn check_wat(wat: &str, options: &CheckOptions) -> SurfaceReport {
        let wasm = wat::parse_str(wat).unwrap();
        check_surface(&parse_wasm(&wasm).unwrap(), options)
    }

    const COUNTER_MODULE: &str = r#"
        (module
            (func $exports_pack_name_api_add (export "pack:name/api#add") (param i64))
            (func $exports_pack_name_api_get (export "pack:name/api#get") (result i64)
                i64.const 0)
        )
    "#;

    /// A counter component whose core module is correct and whose interface
    /// instance is built from `lifts`, a list of `(name, func type)`.
    fn counter_component(lifts: &[(&str, &str)]) -> String {
        let mut funcs = String::new();
        let mut instance = String::new();
        for (i, (name, ty)) in lifts.iter().enumerate() {
            funcs.push_str(&format!(
                "(func $f{i} {ty} (canon lift (core func $i \"pack:name/api#get\")))\n"
            ));
            instance.push_str(&format!("(export \"{name}\" (func $f{i}))\n"));
        }
        format!(
            r#"
            (component
                (core module $m
                    (func (export "pack:name/api#add") (param i64))
                    (func (export "pack:name/api#get") (result i64) i64.const 0)
                )
                (core instance $i (instantiate $m))
                {funcs}
                (instance $api {instance})
                (export "pack:name/api" (instance $api))
            )
            "#
        )
    }

    const ADD: (&str, &str) = ("add", r#"(param "value" u64)"#);
    const GET: (&str, &str) = ("get", "(result u64)");

    #[test]
    fn matching_component_passes() {
        let report = check_wat(
            &counter_component(&[ADD, GET]),
            &CheckOptions::new(Example::Counter).strict(true),
        );
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert_eq!(report.matched.len(), 2);
    }

    #[test]
    fn instance_missing_function_is_an_error() {
        let report = check_wat(
            &counter_component(&[ADD]),
            &CheckOptions::new(Example::Counter),
        );
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("does not export `get: func() -> u64`"));
        // The core module alone still matches.
        assert_eq!(report.matched.len(), 2);
    }

    #[test]
    fn instance_function_with_wrong_param_type_is_an_error() {
        let report = check_wat(
            &counter_component(&[("add", r#"(param "value" string)"#), GET]),
            &CheckOptions::new(Example::Counter),
        );
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("`func(value: string)`"));
        assert!(errors[0].message.contains("`add: func(value: u64)`"));
    }

    #[test]
    fn instance_function_with_wrong_param_name_is_an_error() {
        let report = check_wat(
            &counter_component(&[("add", r#"(param "amount" u64)"#), GET]),
            &CheckOptions::new(Example::Counter),
        );
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn extra_instance_function_fails_only_when_strict() {
        let wat = counter_component(&[ADD, GET, ("reset", "")]);
        let lenient = check_wat(&wat, &CheckOptions::new(Example::Counter));
        assert!(lenient.findings.is_empty(), "{:?}", lenient.findings);

        let strict = check_wat(&wat, &CheckOptions::new(Example::Counter).strict(true));
        let errors: Vec<_> = strict.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unexpected function `reset`"));
    }

    #[test]
    fn renamed_instance_function_is_not_accepted() {
        // Correct core exports, but the instance only offers `plus(s: string)`.
        let report = check_wat(
            &counter_component(&[("plus", r#"(param "s" string)"#)]),
            &CheckOptions::new(Example::Counter).strict(true),
        );
        assert!(!report.is_ok());
        let messages: Vec<_> = report.errors().map(|f| f.message.as_str()).collect();
        assert_eq!(messages.len(), 3, "{messages:?}");
        assert!(messages[0].contains("`add: func(value: u64)`"));
        assert!(messages[1].contains("`get: func() -> u64`"));
        assert!(messages[2].contains("`plus`"));
    }

    #[test]
    fn expected_exports_of_http_send() {
        let example = Example::HttpSend;
        let expected = expected_exports(example, &example.default_package(), "api");
        assert_eq!(expected.len(), 1);
        assert_eq!(expected[0].c_symbol, "exports_pack_name_api_send");
        assert_eq!(expected[0].canonical, "pack:name/api#send");
        assert_eq!(
            expected[0].post_return.as_deref(),
            Some("cabi_post_pack:name/api#send")
        );
    }

    #[test]
    fn counter_module_passes() {
        let report = check_wat(COUNTER_MODULE, &CheckOptions::new(Example::Counter));
        assert!(report.is_ok(), "{:?}", report.findings);
        assert!(report.findings.is_empty());
        assert_eq!(report.matched, ["pack:name/api#add", "pack:name/api#get"]);
    }

    #[test]
    fn wrong_package_reports_missing_exports() {
        let options =
            CheckOptions::new(Example::Counter).with_package("my:app".parse().unwrap());
        let report = check_wat(COUNTER_MODULE, &options);
        assert_eq!(report.errors().count(), 2);
        assert!(report.findings[0]
            .message
            .contains("C symbol `exports_my_app_api_add`"));
    }

    #[test]
    fn signature_mismatch_is_an_error() {
        let wat = r#"
            (module
                (func (export "pack:name/api#add") (param i32))
                (func (export "pack:name/api#get") (result i64) i64.const 0)
            )
        "#;
        let report = check_wat(wat, &CheckOptions::new(Example::Counter));
        assert!(!report.is_ok());
        assert_eq!(report.matched, ["pack:name/api#get"]);
        assert!(report.findings[0].message.contains("(i32) -> ()"));
        assert!(report.findings[0].message.contains("(i64) -> ()"));
    }

    #[test]
    fn foreign_symbol_name_is_info() {
        let wat = r#"
            (module
                (func $bump (export "pack:name/api#add") (param i64))
                (func (export "pack:name/api#get") (result i64) i64.const 0)
            )
        "#;
        let report = check_wat(wat, &CheckOptions::new(Example::Counter));
        assert!(report.is_ok());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].severity, Severity::Info);
        assert!(report.findings[0].message.contains("`bump`"));
    }

    #[test]
    fn canonical_symbol_name_is_quiet() {
        let wat = r#"
            (module
                (func $pack:name/api#add (export "pack:name/api#add") (param i64))
                (func $pack:name/api#get (export "pack:name/api#get") (result i64)
                    i64.const 0)
            )
        "#;
        let report = check_wat(wat, &CheckOptions::new(Example::Counter));
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[test]
    fn missing_post_return_is_a_warning() {
        let wat = r#"
            (module
                (func (export "pack:name/api#send") (result i32) i32.const 0)
            )
        "#;
        let report = check_wat(wat, &CheckOptions::new(Example::HttpSend));
        assert!(report.is_ok());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].severity, Severity::Warning);
    }

    #[test]
    fn strict_mode_rejects_extra_interface_exports() {
        let wat = r#"
            (module
                (func (export "pack:name/api#add") (param i64))
                (func (export "pack:name/api#get") (result i64) i64.const 0)
                (func (export "pack:name/api#reset"))
                (func (export "_initialize"))
            )
        "#;
        let lenient = check_wat(wat, &CheckOptions::new(Example::Counter));
        assert!(lenient.is_ok());

        let strict = check_wat(wat, &CheckOptions::new(Example::Counter).strict(true));
        let errors: Vec<_> = strict.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("pack:name/api#reset"));
    }

    #[test]
    fn component_without_interface_instance() {
        let wat = r#"
            (component
                (core module $m
                    (func (export "pack:name/api#add") (param i64))
                    (func (export "pack:name/api#get") (result i64) i64.const 0)
                )
            )
        "#;
        let report = check_wat(wat, &CheckOptions::new(Example::Counter));
        assert_eq!(report.kind, BinaryKind::Component);
        assert_eq!(report.errors().count(), 1);
        assert!(report.findings[0].message.contains("`pack:name/api`"));
        assert_eq!(report.matched.len(), 2);
    }
}
