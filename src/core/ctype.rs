//! Native C types as recovered from debug information.
//!
//! These are never parsed from C source. The layout extractor builds them
//! from the compiler's own description of each probed identifier.

use serde::{Deserialize, Serialize};

/// A C type with its native layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CType {
    Void,
    Bool,
    /// Integer types; `name` is the C spelling (`int`, `unsigned long`, ...).
    Int { name: String, size: u64, signed: bool },
    Float { name: String, size: u64 },
    Pointer { pointee: Box<CType>, size: u64 },
    Array { elem: Box<CType>, len: u64 },
    Struct(Aggregate),
    Union(Aggregate),
    Enum(EnumType),
    Typedef { name: String, target: Box<CType> },
    Func(FuncType),
}

/// A struct or union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub tag: Option<String>,
    pub size: u64,
    pub align: u64,
    pub fields: Vec<Field>,
    /// False for forward declarations and for self-references cut while the
    /// aggregate was still being built.
    pub complete: bool,
}

/// A struct member at a fixed byte offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub offset: u64,
    pub ty: CType,
    /// Bit-field width; bit-fields are not addressable from managed code.
    pub bit_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub tag: Option<String>,
    pub size: u64,
    pub signed: bool,
    pub enumerators: Vec<(String, i64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncType {
    pub params: Vec<CType>,
    pub result: Box<CType>,
    pub variadic: bool,
}

/// Byte layout of a native value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeLayout {
    pub size: u64,
    pub align: u64,
    pub fields: Vec<FieldLayout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

impl CType {
    /// Size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            CType::Void | CType::Func(_) => 0,
            CType::Bool => 1,
            CType::Int { size, .. } | CType::Float { size, .. } => *size,
            CType::Pointer { size, .. } => *size,
            CType::Array { elem, len } => elem.size() * len,
            CType::Struct(agg) | CType::Union(agg) => agg.size,
            CType::Enum(e) => e.size,
            CType::Typedef { target, .. } => target.size(),
        }
    }

    /// Natural alignment in bytes.
    pub fn align(&self) -> u64 {
        match self {
            CType::Void | CType::Func(_) | CType::Bool => 1,
            CType::Int { size, .. } | CType::Float { size, .. } => (*size).clamp(1, 8),
            CType::Pointer { size, .. } => *size,
            CType::Array { elem, .. } => elem.align(),
            CType::Struct(agg) | CType::Union(agg) => agg.align.max(1),
            CType::Enum(e) => e.size.clamp(1, 8),
            CType::Typedef { target, .. } => target.align(),
        }
    }

    /// Strip typedefs.
    pub fn resolve(&self) -> &CType {
        match self {
            CType::Typedef { target, .. } => target.resolve(),
            other => other,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.resolve(), CType::Void)
    }

    pub fn is_function(&self) -> bool {
        matches!(self.resolve(), CType::Func(_))
    }

    /// Integer-like types whose values fit the 64-bit constant slot.
    pub fn is_integral(&self) -> bool {
        matches!(
            self.resolve(),
            CType::Bool | CType::Int { .. } | CType::Enum(_) | CType::Pointer { .. }
        )
    }

    /// Whether integer values of this type are signed.
    pub fn is_signed(&self) -> bool {
        match self.resolve() {
            CType::Int { signed, .. } => *signed,
            CType::Enum(e) => e.signed,
            _ => false,
        }
    }

    /// C spelling usable in generated declarations, or `None` for types
    /// that cannot be named (anonymous aggregates, function types).
    pub fn c_spelling(&self) -> Option<String> {
        match self {
            CType::Void => Some("void".to_string()),
            CType::Bool => Some("_Bool".to_string()),
            CType::Int { name, .. } | CType::Float { name, .. } => Some(name.clone()),
            CType::Pointer { pointee, .. } => match pointee.resolve() {
                // Function pointers and pointers to anonymous types travel as void*.
                CType::Func(_) => Some("void*".to_string()),
                _ => pointee
                    .c_spelling()
                    .map(|s| format!("{}*", s))
                    .or_else(|| Some("void*".to_string())),
            },
            CType::Array { .. } | CType::Func(_) => None,
            CType::Struct(agg) => agg.tag.as_ref().map(|t| format!("struct {}", t)),
            CType::Union(agg) => agg.tag.as_ref().map(|t| format!("union {}", t)),
            CType::Enum(e) => e.tag.as_ref().map(|t| format!("enum {}", t)),
            CType::Typedef { name, .. } => Some(name.clone()),
        }
    }

    /// Native layout: size, alignment and, for structs, the field offsets.
    pub fn layout(&self) -> NativeLayout {
        let fields = match self.resolve() {
            CType::Struct(agg) => agg
                .fields
                .iter()
                .map(|f| FieldLayout {
                    name: f.name.clone(),
                    offset: f.offset,
                    size: f.ty.size(),
                })
                .collect(),
            _ => Vec::new(),
        };
        NativeLayout {
            size: self.size(),
            align: self.align(),
            fields,
        }
    }

    /// Canonical text used when hashing bridge signatures.
    pub fn signature(&self) -> String {
        match self {
            CType::Pointer { pointee, .. } => format!("{}*", pointee.signature_name()),
            CType::Array { elem, len } => format!("{}[{}]", elem.signature(), len),
            CType::Func(f) => {
                let params: Vec<String> = f.params.iter().map(|p| p.signature()).collect();
                format!(
                    "{}({}{})",
                    f.result.signature(),
                    params.join(","),
                    if f.variadic { ",..." } else { "" }
                )
            }
            other => other.signature_name(),
        }
    }

    fn signature_name(&self) -> String {
        match self.c_spelling() {
            Some(s) => s,
            None => match self {
                CType::Struct(agg) => format!("struct{{{}}}", agg.size),
                CType::Union(agg) => format!("union{{{}}}", agg.size),
                CType::Array { .. } => self.signature(),
                CType::Func(_) => self.signature(),
                _ => "?".to_string(),
            },
        }
    }
}

/// Value of a C constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    /// Raw 64-bit pattern; interpret with the constant's signedness.
    Int(i64),
    Float(f64),
    Str(String),
}
