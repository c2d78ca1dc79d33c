//! The starter examples and the functions each one exports.

use crate::naming::PackageName;
use clap::ValueEnum;
use std::fmt;
use wasmparser::ValType;

/// A starter component or test fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Example {
    /// `add`/`get` over a process-wide total.
    Counter,
    /// `send` of one outgoing HTTP request.
    HttpSend,
    /// `run`/`print` fixture.
    #[value(name = "c-1")]
    C1,
    /// `run` fixture allocating 512 MiB in 1 MiB blocks.
    LargeDynamicMemory,
}

/// Component-model types used by the examples' signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WitType {
    U64,
    S32,
    String,
}

impl WitType {
    /// Canonical-ABI flattening of a parameter of this type.
    fn flat_params(self) -> &'static [ValType] {
        match self {
            WitType::U64 => &[ValType::I64],
            WitType::S32 => &[ValType::I32],
            WitType::String => &[ValType::I32, ValType::I32],
        }
    }

    /// Canonical-ABI flattening of a result of this type. Results that do not
    /// fit in one core value come back as a pointer to a return area.
    fn flat_result(self) -> ValType {
        match self {
            WitType::U64 => ValType::I64,
            WitType::S32 | WitType::String => ValType::I32,
        }
    }
}

impl fmt::Display for WitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WitType::U64 => "u64",
            WitType::S32 => "s32",
            WitType::String => "string",
        })
    }
}

/// One exported function of an example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFunction {
    pub name: &'static str,
    pub params: &'static [(&'static str, WitType)],
    pub result: Option<WitType>,
}

impl ExportFunction {
    pub fn core_params(&self) -> Vec<ValType> {
        self.params
            .iter()
            .flat_map(|(_, ty)| ty.flat_params().iter().copied())
            .collect()
    }

    pub fn core_results(&self) -> Vec<ValType> {
        self.result.map(WitType::flat_result).into_iter().collect()
    }

    /// Results held in linear memory need a `cabi_post_` export to free them.
    pub fn needs_post_return(&self) -> bool {
        matches!(self.result, Some(WitType::String))
    }

    /// WIT form, e.g. `add: func(value: u64)`.
    pub fn wit_signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(name, ty)| format!("{name}: {ty}"))
            .collect::<Vec<_>>()
            .join(", ");
        match self.result {
            Some(result) => format!("{}: func({params}) -> {result}", self.name),
            None => format!("{}: func({params})", self.name),
        }
    }

    /// Core form, e.g. `(i64) -> ()`.
    pub fn core_signature(&self) -> String {
        format_core_signature(&self.core_params(), &self.core_results())
    }
}

const COUNTER: &[ExportFunction] = &[
    ExportFunction {
        name: "add",
        params: &[("value", WitType::U64)],
        result: None,
    },
    ExportFunction {
        name: "get",
        params: &[],
        result: Some(WitType::U64),
    },
];

const HTTP_SEND: &[ExportFunction] = &[ExportFunction {
    name: "send",
    params: &[],
    result: Some(WitType::String),
}];

const C1: &[ExportFunction] = &[
    ExportFunction {
        name: "run",
        params: &[],
        result: Some(WitType::S32),
    },
    ExportFunction {
        name: "print",
        params: &[("s", WitType::String)],
        result: None,
    },
];

const LARGE_DYNAMIC_MEMORY: &[ExportFunction] = &[ExportFunction {
    name: "run",
    params: &[],
    result: Some(WitType::U64),
}];

impl Example {
    pub const ALL: [Example; 4] = [
        Example::Counter,
        Example::HttpSend,
        Example::C1,
        Example::LargeDynamicMemory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Example::Counter => "counter",
            Example::HttpSend => "http-send",
            Example::C1 => "c-1",
            Example::LargeDynamicMemory => "large-dynamic-memory",
        }
    }

    /// Package the example is generated with when none is given.
    pub fn default_package(self) -> PackageName {
        match self {
            Example::Counter | Example::HttpSend => PackageName::known("pack", "name"),
            Example::C1 | Example::LargeDynamicMemory => PackageName::known("golem", "it"),
        }
    }

    pub fn default_interface(self) -> &'static str {
        "api"
    }

    pub fn functions(self) -> &'static [ExportFunction] {
        match self {
            Example::Counter => COUNTER,
            Example::HttpSend => HTTP_SEND,
            Example::C1 => C1,
            Example::LargeDynamicMemory => LARGE_DYNAMIC_MEMORY,
        }
    }
}

impl fmt::Display for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Core value type as written in the text format.
pub fn val_type_name(ty: ValType) -> &'static str {
    match ty {
        ValType::I32 => "i32",
        ValType::I64 => "i64",
        ValType::F32 => "f32",
        ValType::F64 => "f64",
        ValType::V128 => "v128",
        ValType::Ref(_) => "ref",
    }
}

/// `(i32, i32) -> (i64)` style rendering of a core signature.
pub fn format_core_signature(params: &[ValType], results: &[ValType]) -> String {
    let list = |types: &[ValType]| {
        types
            .iter()
            .map(|ty| val_type_name(*ty))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("({}) -> ({})", list(params), list(results))
}
