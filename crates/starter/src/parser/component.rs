//! Component index spaces.
//!
//! Tracks enough of a component's type, function, instance and component
//! index spaces to resolve the functions an exported instance carries, with
//! their WIT parameter and result types.

use super::ComponentExportInfo;
use anyhow::{Context, Result};
use std::fmt;
use wasmparser::{
    CanonicalFunction, ComponentAlias, ComponentDefinedType, ComponentExternalKind,
    ComponentFuncType, ComponentInstance, ComponentOuterAliasKind, ComponentType,
    ComponentTypeRef, ComponentValType, InstanceTypeDeclaration, Payload, PrimitiveValType,
};

/// Signature of a component-level function, with value types written as in
/// WIT (`u64`, `string`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFuncSig {
    pub params: Vec<(String, String)>,
    pub result: Option<String>,
}

impl fmt::Display for ComponentFuncSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("func(")?;
        for (i, (name, ty)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {ty}")?;
        }
        f.write_str(")")?;
        if let Some(result) = &self.result {
            write!(f, " -> {result}")?;
        }
        Ok(())
    }
}

/// A function exported by a component instance. `sig` is `None` when its
/// type could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFunc {
    pub name: String,
    pub sig: Option<ComponentFuncSig>,
}

#[derive(Debug, Clone)]
enum TypeInfo {
    Func(ComponentFuncSig),
    Instance(Vec<ComponentFunc>),
    Value(String),
    Other,
}

/// Index spaces of one component being parsed.
#[derive(Debug, Default)]
pub(super) struct ComponentScope {
    types: Vec<TypeInfo>,
    funcs: Vec<Option<ComponentFuncSig>>,
    instances: Vec<Option<Vec<ComponentFunc>>>,
    components: Vec<Option<Vec<ComponentFunc>>>,
    /// Functions this component exports directly.
    exported_funcs: Vec<ComponentFunc>,
    pub(super) exports: Vec<ComponentExportInfo>,
}

impl ComponentScope {
    fn func_type(&self, type_index: u32) -> Option<ComponentFuncSig> {
        match self.types.get(type_index as usize)? {
            TypeInfo::Func(sig) => Some(sig.clone()),
            _ => None,
        }
    }

    fn instance_type(&self, type_index: u32) -> Option<Vec<ComponentFunc>> {
        match self.types.get(type_index as usize)? {
            TypeInfo::Instance(funcs) => Some(funcs.clone()),
            _ => None,
        }
    }

    fn func(&self, index: u32) -> Option<ComponentFuncSig> {
        self.funcs.get(index as usize).cloned().flatten()
    }

    fn instance(&self, index: u32) -> Option<Vec<ComponentFunc>> {
        self.instances.get(index as usize).cloned().flatten()
    }

    fn component(&self, index: u32) -> Option<Vec<ComponentFunc>> {
        self.components.get(index as usize).cloned().flatten()
    }

    /// Record a nested component that just ended, by the functions it exports.
    pub(super) fn push_component(&mut self, nested: ComponentScope) {
        self.components.push(Some(nested.exported_funcs));
    }

    /// Fold one component-level payload into the index spaces.
    pub(super) fn parse_payload(&mut self, payload: Payload<'_>) -> Result<()> {
        match payload {
            Payload::ComponentTypeSection(reader) => {
                for ty in reader {
                    let ty = ty.context("reading component type")?;
                    let info = resolve_type(&self.types, &ty);
                    self.types.push(info);
                }
            }

            Payload::ComponentImportSection(reader) => {
                for import in reader {
                    let import = import.context("reading component import")?;
                    match import.ty {
                        ComponentTypeRef::Func(ty) => {
                            let sig = self.func_type(ty);
                            self.funcs.push(sig);
                        }
                        ComponentTypeRef::Instance(ty) => {
                            let funcs = self.instance_type(ty);
                            self.instances.push(funcs);
                        }
                        ComponentTypeRef::Type(_) => self.types.push(TypeInfo::Other),
                        ComponentTypeRef::Component(_) => self.components.push(None),
                        ComponentTypeRef::Module(_) | ComponentTypeRef::Value(_) => {}
                    }
                }
            }

            Payload::ComponentAliasSection(reader) => {
                for alias in reader {
                    match alias.context("reading component alias")? {
                        ComponentAlias::InstanceExport {
                            kind,
                            instance_index,
                            name,
                        } => match kind {
                            ComponentExternalKind::Func => {
                                let sig = self
                                    .instance(instance_index)
                                    .and_then(|funcs| funcs.into_iter().find(|f| f.name == name))
                                    .and_then(|func| func.sig);
                                self.funcs.push(sig);
                            }
                            ComponentExternalKind::Instance => self.instances.push(None),
                            ComponentExternalKind::Type => self.types.push(TypeInfo::Other),
                            ComponentExternalKind::Component => self.components.push(None),
                            _ => {}
                        },
                        ComponentAlias::Outer { kind, .. } => match kind {
                            ComponentOuterAliasKind::Type => self.types.push(TypeInfo::Other),
                            ComponentOuterAliasKind::Component => self.components.push(None),
                            _ => {}
                        },
                        ComponentAlias::CoreInstanceExport { .. } => {}
                    }
                }
            }

            Payload::ComponentCanonicalSection(reader) => {
                for func in reader {
                    // Only lifting defines a component function; the rest are core.
                    if let CanonicalFunction::Lift { type_index, .. } =
                        func.context("reading canonical function")?
                    {
                        let sig = self.func_type(type_index);
                        self.funcs.push(sig);
                    }
                }
            }

            Payload::ComponentInstanceSection(reader) => {
                for instance in reader {
                    let funcs = match instance.context("reading component instance")? {
                        ComponentInstance::Instantiate {
                            component_index, ..
                        } => self.component(component_index),
                        ComponentInstance::FromExports(exports) => Some(
                            exports
                                .iter()
                                .filter(|export| export.kind == ComponentExternalKind::Func)
                                .map(|export| ComponentFunc {
                                    name: export.name.0.to_string(),
                                    sig: self.func(export.index),
                                })
                                .collect(),
                        ),
                    };
                    self.instances.push(funcs);
                }
            }

            Payload::ComponentExportSection(reader) => {
                for export in reader {
                    let export = export.context("reading component export")?;
                    let name = export.name.0.to_string();
                    let mut functions = None;
                    // Exporting an item also defines a new index for it.
                    match export.kind {
                        ComponentExternalKind::Func => {
                            let sig = match export.ty {
                                Some(ComponentTypeRef::Func(ty)) => self.func_type(ty),
                                _ => self.func(export.index),
                            };
                            self.funcs.push(sig.clone());
                            self.exported_funcs.push(ComponentFunc {
                                name: name.clone(),
                                sig,
                            });
                        }
                        ComponentExternalKind::Instance => {
                            let funcs = match export.ty {
                                Some(ComponentTypeRef::Instance(ty)) => self.instance_type(ty),
                                _ => self.instance(export.index),
                            };
                            self.instances.push(funcs.clone());
                            functions = funcs;
                        }
                        ComponentExternalKind::Type => {
                            let info = self
                                .types
                                .get(export.index as usize)
                                .cloned()
                                .unwrap_or(TypeInfo::Other);
                            self.types.push(info);
                        }
                        ComponentExternalKind::Component => {
                            let funcs = self.component(export.index);
                            self.components.push(funcs);
                        }
                        _ => {}
                    }
                    self.exports.push(ComponentExportInfo {
                        name,
                        kind: component_kind_name(export.kind),
                        functions,
                    });
                }
            }

            _ => {}
        }
        Ok(())
    }
}

pub(super) fn component_kind_name(kind: ComponentExternalKind) -> &'static str {
    match kind {
        ComponentExternalKind::Module => "module",
        ComponentExternalKind::Func => "func",
        ComponentExternalKind::Value => "value",
        ComponentExternalKind::Type => "type",
        ComponentExternalKind::Instance => "instance",
        ComponentExternalKind::Component => "component",
    }
}

fn resolve_type(types: &[TypeInfo], ty: &ComponentType<'_>) -> TypeInfo {
    match ty {
        ComponentType::Func(func) => TypeInfo::Func(func_sig(types, func)),
        ComponentType::Instance(decls) => TypeInfo::Instance(instance_funcs(types, decls)),
        ComponentType::Defined(ComponentDefinedType::Primitive(ty)) => {
            TypeInfo::Value(primitive_name(*ty).to_string())
        }
        _ => TypeInfo::Other,
    }
}

/// Functions declared by an instance type. Declarations have their own type
/// index space; `outer` is the enclosing component's.
fn instance_funcs(outer: &[TypeInfo], decls: &[InstanceTypeDeclaration<'_>]) -> Vec<ComponentFunc> {
    let mut types = Vec::new();
    let mut funcs = Vec::new();
    for decl in decls {
        match decl {
            InstanceTypeDeclaration::Type(ty) => {
                let info = resolve_type(&types, ty);
                types.push(info);
            }
            InstanceTypeDeclaration::Alias(ComponentAlias::Outer {
                kind: ComponentOuterAliasKind::Type,
                count: 1,
                index,
            }) => types.push(outer.get(*index as usize).cloned().unwrap_or(TypeInfo::Other)),
            InstanceTypeDeclaration::Alias(
                ComponentAlias::Outer {
                    kind: ComponentOuterAliasKind::Type,
                    ..
                }
                | ComponentAlias::InstanceExport {
                    kind: ComponentExternalKind::Type,
                    ..
                },
            ) => types.push(TypeInfo::Other),
            InstanceTypeDeclaration::Export { name, ty } => match ty {
                ComponentTypeRef::Func(index) => funcs.push(ComponentFunc {
                    name: name.0.to_string(),
                    sig: match types.get(*index as usize) {
                        Some(TypeInfo::Func(sig)) => Some(sig.clone()),
                        _ => None,
                    },
                }),
                ComponentTypeRef::Type(_) => types.push(TypeInfo::Other),
                _ => {}
            },
            _ => {}
        }
    }
    funcs
}

fn func_sig(types: &[TypeInfo], func: &ComponentFuncType<'_>) -> ComponentFuncSig {
    ComponentFuncSig {
        params: func
            .params
            .iter()
            .map(|(name, ty)| (name.to_string(), val_type_name(types, ty)))
            .collect(),
        result: func.result.as_ref().map(|ty| val_type_name(types, ty)),
    }
}

fn val_type_name(types: &[TypeInfo], ty: &ComponentValType) -> String {
    match ty {
        ComponentValType::Primitive(ty) => primitive_name(*ty).to_string(),
        ComponentValType::Type(index) => match types.get(*index as usize) {
            Some(TypeInfo::Value(name)) => name.clone(),
            _ => format!("type {index}"),
        },
    }
}

fn primitive_name(ty: PrimitiveValType) -> &'static str {
    match ty {
        PrimitiveValType::Bool => "bool",
        PrimitiveValType::S8 => "s8",
        PrimitiveValType::U8 => "u8",
        PrimitiveValType::S16 => "s16",
        PrimitiveValType::U16 => "u16",
        PrimitiveValType::S32 => "s32",
        PrimitiveValType::U32 => "u32",
        PrimitiveValType::S64 => "s64",
        PrimitiveValType::U64 => "u64",
        PrimitiveValType::F32 => "f32",
        PrimitiveValType::F64 => "f64",
        PrimitiveValType::Char => "char",
        PrimitiveValType::String => "string",
        #[allow(unreachable_patterns)]
        _ => "unknown",
    }
}
