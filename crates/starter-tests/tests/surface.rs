//! Surface checks against modules and components shaped like the built
//! starter components.

use anyhow::Result;
use starter::parser::BinaryKind;
use starter::{check, inspect, CheckOptions, Example, Severity};
use starter_tests::ModuleFixture;

#[test]
fn test_every_example_module_passes() -> Result<()> {
    for example in Example::ALL {
        let options = CheckOptions::new(example);
        let wasm = ModuleFixture::new(&options).module()?;
        let report = check(&wasm, &options)?;

        assert_eq!(report.kind, BinaryKind::Module);
        assert!(report.findings.is_empty(), "{example}: {:?}", report.findings);
        assert_eq!(report.matched.len(), example.functions().len());
    }
    Ok(())
}

#[test]
fn test_every_example_component_passes() -> Result<()> {
    for example in Example::ALL {
        let options = CheckOptions::new(example).strict(true);
        let wasm = ModuleFixture::new(&options).component()?;
        let report = check(&wasm, &options)?;

        assert_eq!(report.kind, BinaryKind::Component);
        assert!(report.findings.is_empty(), "{example}: {:?}", report.findings);
    }
    Ok(())
}

#[test]
fn test_component_exports_interface_instance() -> Result<()> {
    let options = CheckOptions::new(Example::Counter);
    let binary = inspect(&ModuleFixture::new(&options).component()?)?;

    assert_eq!(binary.component_exports.len(), 1);
    assert_eq!(binary.component_exports[0].name, "pack:name/api");
    assert_eq!(binary.component_exports[0].kind, "instance");

    let add = binary.component_exports[0].function("add").unwrap();
    assert_eq!(
        add.sig.as_ref().map(ToString::to_string).as_deref(),
        Some("func(value: u64)")
    );
    Ok(())
}

#[test]
fn test_symbols_follow_package_and_interface() -> Result<()> {
    let options = CheckOptions::new(Example::Counter)
        .with_package("my-app:shopping-cart".parse()?)
        .with_interface("cart-api")?;
    let binary = inspect(&ModuleFixture::new(&options).module()?)?;
    let module = &binary.modules[0];

    let add = module
        .exported_function("my-app:shopping-cart/cart-api#add")
        .unwrap();
    assert_eq!(
        module.symbol(add.index),
        Some("exports_my_app_shopping_cart_cart_api_add")
    );
    assert!(check(&ModuleFixture::new(&options).module()?, &options)?.is_ok());
    Ok(())
}

#[test]
fn test_missing_function_is_an_error() -> Result<()> {
    let options = CheckOptions::new(Example::C1);
    let wasm = ModuleFixture::new(&options).without("print").component()?;
    let report = check(&wasm, &options)?;

    assert!(!report.is_ok());
    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 2);
    // Once in the interface instance, once in the core module.
    assert!(errors[0].message.contains("`print: func(s: string)`"));
    assert!(errors[1].message.contains("golem:it/api#print"));
    assert!(errors[1].message.contains("exports_golem_it_api_print"));
    Ok(())
}

#[test]
fn test_missing_post_return_is_a_warning() -> Result<()> {
    let options = CheckOptions::new(Example::HttpSend);
    let wasm = ModuleFixture::new(&options).without_post_return().module()?;
    let report = check(&wasm, &options)?;

    assert!(report.is_ok());
    let severities: Vec<_> = report.findings.iter().map(|f| f.severity).collect();
    assert_eq!(severities, [Severity::Warning]);
    assert!(report.findings[0]
        .message
        .contains("cabi_post_pack:name/api#send"));
    Ok(())
}

#[test]
fn test_strict_mode_flags_extra_functions() -> Result<()> {
    let options = CheckOptions::new(Example::LargeDynamicMemory);
    let wasm = ModuleFixture::new(&options)
        .with_extra_function("reset")
        .module()?;

    assert!(check(&wasm, &options)?.is_ok());

    let strict = options.strict(true);
    let report = check(&wasm, &strict)?;
    assert!(!report.is_ok());
    assert!(report.errors().any(|f| f.message.contains("golem:it/api#reset")));
    Ok(())
}

#[test]
fn test_wrong_example_does_not_match() -> Result<()> {
    let counter = CheckOptions::new(Example::Counter);
    let wasm = ModuleFixture::new(&counter).module()?;
    let report = check(&wasm, &CheckOptions::new(Example::HttpSend))?;

    assert!(report.matched.is_empty());
    assert!(report.errors().any(|f| f.message.contains("pack:name/api#send")));
    Ok(())
}

#[test]
fn test_strict_mode_flags_extra_instance_functions() -> Result<()> {
    let options = CheckOptions::new(Example::Counter);
    let wasm = ModuleFixture::new(&options)
        .with_extra_function("reset")
        .component()?;

    assert!(check(&wasm, &options)?.is_ok());

    let report = check(&wasm, &options.strict(true))?;
    let errors: Vec<_> = report.errors().map(|f| f.message.as_str()).collect();
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors[0].contains("unexpected function `reset` in instance `pack:name/api`"));
    assert!(errors[1].contains("pack:name/api#reset"));
    Ok(())
}
