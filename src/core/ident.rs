//! Foreign identifiers referenced through the `C.` namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ctype::{CType, ConstValue, FuncType, NativeLayout};

/// Kind of a foreign identifier.
///
/// `FunctionOrVariable` is the prober's verdict; debug information splits
/// it into `Function` or `Variable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentKind {
    Unknown,
    Type,
    FunctionOrVariable,
    Function,
    Variable,
    Constant,
}

impl IdentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentKind::Unknown => "unknown",
            IdentKind::Type => "type",
            IdentKind::FunctionOrVariable => "function or variable",
            IdentKind::Function => "function",
            IdentKind::Variable => "variable",
            IdentKind::Constant => "constant",
        }
    }
}

impl fmt::Display for IdentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload once layout extraction is done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resolved {
    Type(CType),
    Function(FuncType),
    Variable(CType),
    Constant { ty: CType, value: ConstValue },
}

impl Resolved {
    pub fn kind(&self) -> IdentKind {
        match self {
            Resolved::Type(_) => IdentKind::Type,
            Resolved::Function(_) => IdentKind::Function,
            Resolved::Variable(_) => IdentKind::Variable,
            Resolved::Constant { .. } => IdentKind::Constant,
        }
    }
}

/// A name referenced as `C.name` somewhere in the package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignIdentifier {
    /// Name as written after `C.` (`struct_stat`, `puts`)
    pub name: String,
    /// Spelling in C (`struct stat`, `puts`)
    pub c_name: String,
    pub kind: IdentKind,
    pub resolved: Option<Resolved>,
}

impl ForeignIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let c_name = c_spelling_of(&name);
        ForeignIdentifier {
            name,
            c_name,
            kind: IdentKind::Unknown,
            resolved: None,
        }
    }

    /// First mutation: the prober's verdict.
    pub fn assign_kind(&mut self, kind: IdentKind) {
        self.kind = kind;
    }

    /// Second mutation: the extracted type/value.
    pub fn assign_resolution(&mut self, resolved: Resolved) {
        self.kind = resolved.kind();
        self.resolved = Some(resolved);
    }

    /// Native layout of the identifier's type.
    pub fn native_layout(&self) -> Option<NativeLayout> {
        match self.resolved.as_ref()? {
            Resolved::Type(ty) | Resolved::Variable(ty) | Resolved::Constant { ty, .. } => {
                Some(ty.layout())
            }
            Resolved::Function(_) => None,
        }
    }

    pub fn constant_value(&self) -> Option<&ConstValue> {
        match self.resolved.as_ref()? {
            Resolved::Constant { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Builtin managed spellings of C numeric types.
pub const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("char", "char"),
    ("schar", "signed char"),
    ("uchar", "unsigned char"),
    ("short", "short"),
    ("ushort", "unsigned short"),
    ("int", "int"),
    ("uint", "unsigned int"),
    ("long", "long"),
    ("ulong", "unsigned long"),
    ("longlong", "long long"),
    ("ulonglong", "unsigned long long"),
    ("float", "float"),
    ("double", "double"),
];

/// Conversion helpers provided by the generator rather than by C.
pub const CONVERSION_HELPERS: &[&str] = &["CString", "GoString", "GoStringN", "GoBytes"];

/// C spelling of a `C.name` reference.
pub fn c_spelling_of(name: &str) -> String {
    if let Some((_, c)) = BUILTIN_TYPES.iter().find(|(n, _)| *n == name) {
        return c.to_string();
    }
    for prefix in ["struct", "union", "enum"] {
        if let Some(tag) = name.strip_prefix(prefix).and_then(|r| r.strip_prefix('_')) {
            if !tag.is_empty() {
                return format!("{} {}", prefix, tag);
            }
        }
    }
    name.to_string()
}

/// Names that are types without asking the compiler.
pub fn is_known_type_name(name: &str) -> bool {
    name == "void"
        || BUILTIN_TYPES.iter().any(|(n, _)| *n == name)
        || ["struct_", "union_", "enum_"]
            .iter()
            .any(|p| name.len() > p.len() && name.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_spelling() {
        assert_eq!(c_spelling_of("struct_stat"), "struct stat");
        assert_eq!(c_spelling_of("ulonglong"), "unsigned long long");
        assert_eq!(c_spelling_of("puts"), "puts");
        assert_eq!(c_spelling_of("struct_"), "struct_");
    }

    #[test]
    fn test_known_types() {
        assert!(is_known_type_name("uint"));
        assert!(is_known_type_name("union_sigval"));
        assert!(!is_known_type_name("size_t"));
    }

    #[test]
    fn test_kind_follows_resolution() {
        let mut ident = ForeignIdentifier::new("errno_value");
        assert_eq!(ident.kind, IdentKind::Unknown);
        ident.assign_kind(IdentKind::FunctionOrVariable);
        ident.assign_resolution(Resolved::Variable(CType::Int {
            name: "int".to_string(),
            size: 4,
            signed: true,
        }));
        assert_eq!(ident.kind, IdentKind::Variable);
        assert_eq!(ident.native_layout().unwrap().size, 4);
    }
}
