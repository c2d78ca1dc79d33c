//! WebAssembly binary parser.
//!
//! This module wraps the `wasmparser` crate to extract the export surface of
//! a core module or a component: component-level exports, and for every core
//! module (the binary itself, or each module nested in the component) its
//! function exports, their types and their names from the `name` section.

mod component;

use anyhow::{Context, Result};
use component::ComponentScope;
use std::collections::HashMap;
use wasmparser::{Encoding, ExternalKind, FuncType, KnownCustom, Name, Parser, Payload, TypeRef};

pub use component::{ComponentFunc, ComponentFuncSig};

/// Whether the binary is a core module or a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    Module,
    Component,
}

/// A top-level export of a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentExportInfo {
    /// Export name, e.g. `pack:name/api`.
    pub name: String,
    /// Kind of item exported (`instance`, `func`, ...).
    pub kind: &'static str,
    /// Functions of an exported instance, when they could be resolved.
    pub functions: Option<Vec<ComponentFunc>>,
}

impl ComponentExportInfo {
    /// Function of an exported instance named `name`.
    pub fn function(&self, name: &str) -> Option<&ComponentFunc> {
        self.functions.as_ref()?.iter().find(|f| f.name == name)
    }
}

/// An export from a core module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInfo {
    pub name: String,
    pub kind: ExternalKind,
    /// Index into the corresponding index space.
    pub index: u32,
}

/// One parsed core module.
#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    /// Function types from the type section, by type index.
    pub types: Vec<Option<FuncType>>,
    /// Type index of every function, imported ones first.
    pub function_types: Vec<u32>,
    /// Number of imported functions.
    pub num_imported_functions: u32,
    pub exports: Vec<ExportInfo>,
    /// Function names from the `name` custom section, by function index.
    pub function_names: HashMap<u32, String>,
}

impl ParsedModule {
    /// Signature of the function at `func_index`.
    pub fn func_type(&self, func_index: u32) -> Option<&FuncType> {
        let type_index = *self.function_types.get(func_index as usize)?;
        self.types.get(type_index as usize)?.as_ref()
    }

    /// Exported function named `name`, with its index.
    pub fn exported_function(&self, name: &str) -> Option<&ExportInfo> {
        self.exports
            .iter()
            .find(|export| export.kind == ExternalKind::Func && export.name == name)
    }

    /// All exported functions, in export order.
    pub fn exported_functions(&self) -> impl Iterator<Item = &ExportInfo> {
        self.exports
            .iter()
            .filter(|export| export.kind == ExternalKind::Func)
    }

    /// Symbol name of a function from the `name` section, if present.
    pub fn symbol(&self, func_index: u32) -> Option<&str> {
        self.function_names.get(&func_index).map(String::as_str)
    }
}

/// A parsed binary: its kind, component exports and core modules.
#[derive(Debug, Clone)]
pub struct ParsedBinary {
    pub kind: BinaryKind,
    /// Exports of the outermost component. Empty for core modules.
    pub component_exports: Vec<ComponentExportInfo>,
    /// Every core module, in the order their sections end.
    pub modules: Vec<ParsedModule>,
}

/// Nesting level being parsed. `parse_all` flattens nested modules and
/// components into one payload stream delimited by `Version`/`End`.
enum Frame {
    Module(ParsedModule),
    Component(ComponentScope),
}

/// Parse a WebAssembly core module or component.
pub fn parse_wasm(wasm_bytes: &[u8]) -> Result<ParsedBinary> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut kind = None;
    let mut component_exports = Vec::new();
    let mut modules = Vec::new();

    for payload in Parser::new(0).parse_all(wasm_bytes) {
        let payload = payload.context("parsing wasm payload")?;

        match payload {
            Payload::Version { encoding, .. } => {
                let frame = match encoding {
                    Encoding::Module => Frame::Module(ParsedModule::default()),
                    Encoding::Component => Frame::Component(ComponentScope::default()),
                };
                if kind.is_none() {
                    kind = Some(match frame {
                        Frame::Module(_) => BinaryKind::Module,
                        Frame::Component(_) => BinaryKind::Component,
                    });
                }
                stack.push(frame);
            }

            Payload::End(_) => match stack.pop() {
                Some(Frame::Module(module)) => modules.push(module),
                // Only the outermost component's exports form its surface.
                Some(Frame::Component(scope)) => match stack.last_mut() {
                    Some(Frame::Component(parent)) => parent.push_component(scope),
                    _ => component_exports = scope.exports,
                },
                None => anyhow::bail!("unbalanced end of module or component"),
            },

            payload => match stack.last_mut() {
                Some(Frame::Module(module)) => parse_module_payload(module, payload)?,
                Some(Frame::Component(scope)) => scope.parse_payload(payload)?,
                None => {}
            },
        }
    }

    let kind = kind.context("empty wasm binary")?;
    Ok(ParsedBinary {
        kind,
        component_exports,
        modules,
    })
}

/// Fold one core-module payload into `module`.
fn parse_module_payload(module: &mut ParsedModule, payload: Payload<'_>) -> Result<()> {
    match payload {
        Payload::TypeSection(reader) => {
            for rec_group in reader {
                let rec_group = rec_group.context("reading rec group")?;
                for sub_type in rec_group.types() {
                    // Non-function types still take a type index.
                    module.types.push(match &sub_type.composite_type.inner {
                        wasmparser::CompositeInnerType::Func(func_ty) => Some(func_ty.clone()),
                        _ => None,
                    });
                }
            }
        }

        Payload::ImportSection(reader) => {
            for import in reader {
                let import = import.context("reading import")?;
                if let TypeRef::Func(type_idx) = import.ty {
                    module.function_types.push(type_idx);
                    module.num_imported_functions += 1;
                }
            }
        }

        Payload::FunctionSection(reader) => {
            for func_type_idx in reader {
                let func_type_idx = func_type_idx.context("reading function type index")?;
                module.function_types.push(func_type_idx);
            }
        }

        Payload::ExportSection(reader) => {
            for export in reader {
                let export = export.context("reading export")?;
                module.exports.push(ExportInfo {
                    name: export.name.to_string(),
                    kind: export.kind,
                    index: export.index,
                });
            }
        }

        Payload::CustomSection(reader) => {
            if let KnownCustom::Name(names) = reader.as_known() {
                for name in names {
                    // A malformed name section only loses symbol names.
                    let Ok(Name::Function(map)) = name else {
                        continue;
                    };
                    for naming in map.into_iter().flatten() {
                        module
                            .function_names
                            .insert(naming.index, naming.name.to_string());
                    }
                }
            }
        }

        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmparser::ValType;

    #[test]
    fn parse_minimal_module() {
        let wasm = wat::parse_str("(module)").unwrap();
        let binary = parse_wasm(&wasm).unwrap();
        assert_eq!(binary.kind, BinaryKind::Module);
        assert!(binary.component_exports.is_empty());
        assert_eq!(binary.modules.len(), 1);
        assert!(binary.modules[0].exports.is_empty());
    }

    #[test]
    fn parse_exported_function_type() {
        let wat = r#"
            (module
                (func (export "pack:name/api#add") (param i64))
                (func (export "pack:name/api#get") (result i64) i64.const 0)
            )
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let binary = parse_wasm(&wasm).unwrap();
        let module = &binary.modules[0];

        let get = module.exported_function("pack:name/api#get").unwrap();
        assert_eq!(get.index, 1);
        let ty = module.func_type(get.index).unwrap();
        assert!(ty.params().is_empty());
        assert_eq!(ty.results(), [ValType::I64]);

        assert_eq!(module.exported_functions().count(), 2);
    }

    #[test]
    fn imported_functions_shift_indices() {
        let wat = r#"
            (module
                (import "env" "log" (func (param i32 i32)))
                (func (export "run") (result i32) i32.const 100)
            )
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let binary = parse_wasm(&wasm).unwrap();
        let module = &binary.modules[0];

        assert_eq!(module.num_imported_functions, 1);
        let run = module.exported_function("run").unwrap();
        assert_eq!(run.index, 1);
        assert_eq!(module.func_type(run.index).unwrap().results(), [ValType::I32]);
        assert_eq!(module.func_type(0).unwrap().params(), [ValType::I32, ValType::I32]);
    }

    #[test]
    fn non_function_exports_are_not_functions() {
        let wat = r#"
            (module
                (memory (export "memory") 1)
                (func (export "f"))
            )
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let binary = parse_wasm(&wasm).unwrap();
        let module = &binary.modules[0];
        assert_eq!(module.exports.len(), 2);
        assert!(module.exported_function("memory").is_none());
        assert_eq!(module.exported_functions().count(), 1);
    }

    #[test]
    fn parse_function_names() {
        let wat = r#"
            (module
                (func $exports_pack_name_api_add (export "pack:name/api#add") (param i64))
            )
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let binary = parse_wasm(&wasm).unwrap();
        assert_eq!(
            binary.modules[0].symbol(0),
            Some("exports_pack_name_api_add")
        );
    }

    #[test]
    fn parse_component_with_nested_module() {
        let wat = r#"
            (component
                (core module $m
                    (func (export "pack:name/api#get") (result i64) i64.const 0)
                )
                (core instance $i (instantiate $m))
                (func $get (result u64) (canon lift (core func $i "pack:name/api#get")))
                (instance $api (export "get" (func $get)))
                (export "pack:name/api" (instance $api))
            )
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let binary = parse_wasm(&wasm).unwrap();

        assert_eq!(binary.kind, BinaryKind::Component);
        assert_eq!(
            binary.component_exports,
            [ComponentExportInfo {
                name: "pack:name/api".to_string(),
                kind: "instance",
                functions: Some(vec![ComponentFunc {
                    name: "get".to_string(),
                    sig: Some(ComponentFuncSig {
                        params: Vec::new(),
                        result: Some("u64".to_string()),
                    }),
                }]),
            }]
        );
        assert_eq!(binary.modules.len(), 1);
        assert!(binary.modules[0]
            .exported_function("pack:name/api#get")
            .is_some());
    }

    #[test]
    fn instance_from_nested_component_carries_export_types() {
        // The shape `wit-component` emits: lifted functions passed to a
        // nested component that re-exports them under typed names.
        let wat = r#"
            (component
                (core module $m
                    (func (export "pack:name/api#add") (param i64))
                    (func (export "pack:name/api#get") (result i64) i64.const 0)
                )
                (core instance $i (instantiate $m))
                (type $add-ty (func (param "value" u64)))
                (type $get-ty (func (result u64)))
                (func $add (type $add-ty) (canon lift (core func $i "pack:name/api#add")))
                (func $get (type $get-ty) (canon lift (core func $i "pack:name/api#get")))
                (component $shim
                    (type $add-ty (func (param "value" u64)))
                    (import "import-func-add" (func $add (type $add-ty)))
                    (type $get-ty (func (result u64)))
                    (import "import-func-get" (func $get (type $get-ty)))
                    (type $add-out (func (param "value" u64)))
                    (export "add" (func $add) (func (type $add-out)))
                    (export "get" (func $get))
                )
                (instance $api (instantiate $shim
                    (with "import-func-add" (func $add))
                    (with "import-func-get" (func $get))
                ))
                (export "pack:name/api" (instance $api))
            )
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let binary = parse_wasm(&wasm).unwrap();

        let api = &binary.component_exports[0];
        assert_eq!(api.name, "pack:name/api");
        let add = api.function("add").unwrap().sig.as_ref().unwrap();
        assert_eq!(add.to_string(), "func(value: u64)");
        let get = api.function("get").unwrap().sig.as_ref().unwrap();
        assert_eq!(get.to_string(), "func() -> u64");
        assert_eq!(api.functions.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn reexported_import_instance_uses_its_type() {
        let wat = r#"
            (component
                (import "pack:name/api" (instance $api
                    (export "print" (func (param "s" string)))
                    (export "run" (func (result s32)))
                ))
                (export "pack:name/api" (instance $api))
            )
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let binary = parse_wasm(&wasm).unwrap();

        let api = &binary.component_exports[0];
        let print = api.function("print").unwrap().sig.as_ref().unwrap();
        assert_eq!(print.params, [("s".to_string(), "string".to_string())]);
        assert_eq!(print.result, None);
        let run = api.function("run").unwrap().sig.as_ref().unwrap();
        assert_eq!(run.result.as_deref(), Some("s32"));
    }

    #[test]
    fn nested_component_exports_are_not_top_level() {
        let wat = r#"
            (component
                (component
                    (core module $m (func (export "f")))
                    (core instance $i (instantiate $m))
                    (func $f (canon lift (core func $i "f")))
                    (export "inner" (func $f))
                )
            )
        "#;
        let wasm = wat::parse_str(wat).unwrap();
        let binary = parse_wasm(&wasm).unwrap();
        assert!(binary.component_exports.is_empty());
        assert_eq!(binary.modules.len(), 1);
    }

    #[test]
    fn parse_garbage_fails() {
        assert!(parse_wasm(b"not wasm").is_err());
    }
}
