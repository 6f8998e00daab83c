//! Mapping of native types to managed type expressions.
//!
//! Named C types become `_Ctype_*` declarations collected for
//! `_cgo_gotypes.go`; anonymous ones are spelled inline.

use std::collections::BTreeMap;

use crate::core::ctype::{Aggregate, CType};

/// Managed-language keywords; struct fields spelled like one get a `_` prefix.
const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// Field name as exposed to managed code.
pub fn field_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("anon{}", index)
    } else if KEYWORDS.contains(&name) {
        format!("_{}", name)
    } else {
        name.to_string()
    }
}

/// Builtin managed name of a C integer spelling (`long unsigned int` -> `ulong`).
pub fn int_name(c_name: &str) -> String {
    let words: Vec<&str> = c_name.split_whitespace().collect();
    let unsigned = words.contains(&"unsigned");
    let signed = words.contains(&"signed");
    let longs = words.iter().filter(|w| **w == "long").count();
    let base = if words.contains(&"char") {
        "char"
    } else if words.contains(&"short") {
        "short"
    } else if longs >= 2 {
        "longlong"
    } else if longs == 1 {
        "long"
    } else if words.contains(&"int") || unsigned || signed {
        "int"
    } else {
        return sanitize(c_name);
    };
    match (base, unsigned, signed) {
        ("char", true, _) => "uchar".to_string(),
        ("char", false, true) => "schar".to_string(),
        (base, true, _) => format!("u{}", base),
        (base, _, _) => base.to_string(),
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Collects `_Ctype_*` declarations while mapping types.
#[derive(Debug, Default)]
pub struct TypeMapper {
    decls: BTreeMap<String, String>,
}

impl TypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Managed name for a `C.name` type reference, declaring it if needed.
    pub fn named(&mut self, name: &str, ty: &CType) -> String {
        let managed = format!("_Ctype_{}", name);
        let expr = self.managed(ty);
        if expr != managed && !self.decls.contains_key(&managed) {
            self.decls.insert(managed.clone(), format!("= {}", expr));
        }
        managed
    }

    /// Managed type expression for `ty`.
    pub fn managed(&mut self, ty: &CType) -> String {
        match ty {
            CType::Void => self.declare("_Ctype_void", "[0]byte"),
            CType::Bool => self.declare("_Ctype__Bool", "bool"),
            CType::Int { name, size, signed } => {
                let underlying = match (size, signed) {
                    (1 | 2 | 4 | 8, true) => format!("int{}", size * 8),
                    (1 | 2 | 4 | 8, false) => format!("uint{}", size * 8),
                    _ => format!("[{}]byte", size),
                };
                self.declare(&format!("_Ctype_{}", int_name(name)), &underlying)
            }
            CType::Float { name, size } => {
                let underlying = format!("float{}", size * 8);
                self.declare(&format!("_Ctype_{}", sanitize(name)), &underlying)
            }
            CType::Pointer { pointee, .. } => match pointee.as_ref() {
                CType::Void => "unsafe.Pointer".to_string(),
                CType::Func(_) => "*[0]byte".to_string(),
                other => format!("*{}", self.managed(other)),
            },
            CType::Array { elem, len } => format!("[{}]{}", len, self.managed(elem)),
            CType::Struct(agg) => match &agg.tag {
                Some(tag) => {
                    let name = format!("_Ctype_struct_{}", tag);
                    if agg.complete {
                        let body = self.struct_body(agg);
                        self.decls.insert(name.clone(), body);
                    } else {
                        self.decls
                            .entry(name.clone())
                            .or_insert_with(|| "struct{}".to_string());
                    }
                    name
                }
                None => self.struct_body(agg),
            },
            CType::Union(agg) => {
                let bytes = format!("[{}]byte", agg.size);
                match &agg.tag {
                    Some(tag) => self.declare(&format!("_Ctype_union_{}", tag), &bytes),
                    None => bytes,
                }
            }
            CType::Enum(e) => {
                let underlying = match (e.size, e.signed) {
                    (1 | 2 | 4 | 8, true) => format!("int{}", e.size * 8),
                    (1 | 2 | 4 | 8, false) => format!("uint{}", e.size * 8),
                    _ => "uint32".to_string(),
                };
                match &e.tag {
                    Some(tag) => self.declare(&format!("_Ctype_enum_{}", tag), &underlying),
                    None => underlying,
                }
            }
            CType::Typedef { name, target } => {
                let managed = format!("_Ctype_{}", name);
                if !self.decls.contains_key(&managed) {
                    let expr = self.managed(target);
                    self.decls.insert(managed.clone(), format!("= {}", expr));
                }
                managed
            }
            CType::Func(_) => "[0]byte".to_string(),
        }
    }

    fn declare(&mut self, name: &str, underlying: &str) -> String {
        self.decls
            .entry(name.to_string())
            .or_insert_with(|| underlying.to_string());
        name.to_string()
    }

    fn struct_body(&mut self, agg: &Aggregate) -> String {
        let mut lines = Vec::new();
        let mut end = 0;
        for (i, field) in agg.fields.iter().enumerate() {
            if field.bit_size.is_some() || field.offset < end {
                continue;
            }
            if field.offset > end {
                lines.push(format!("\t_ [{}]byte", field.offset - end));
            }
            let size = field.ty.size();
            let ty = if field.offset % field.ty.align() != 0 {
                // Packed member: managed alignment rules cannot express it.
                format!("[{}]byte", size)
            } else {
                self.managed(&field.ty)
            };
            lines.push(format!("\t{} {}", field_name(&field.name, i), ty));
            end = field.offset + size;
        }
        if agg.size > end {
            lines.push(format!("\t_ [{}]byte", agg.size - end));
        }
        if lines.is_empty() {
            return "struct{}".to_string();
        }
        format!("struct {{\n{}\n}}", lines.join("\n"))
    }

    /// `type` declarations in name order.
    pub fn declarations(&self) -> Vec<String> {
        self.decls
            .iter()
            .map(|(name, body)| format!("type {} {}", name, body))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ctype::Field;

    fn int(name: &str, size: u64, signed: bool) -> CType {
        CType::Int {
            name: name.to_string(),
            size,
            signed,
        }
    }

    #[test]
    fn test_int_names() {
        assert_eq!(int_name("int"), "int");
        assert_eq!(int_name("long unsigned int"), "ulong");
        assert_eq!(int_name("long long int"), "longlong");
        assert_eq!(int_name("long long unsigned int"), "ulonglong");
        assert_eq!(int_name("short unsigned int"), "ushort");
        assert_eq!(int_name("signed char"), "schar");
        assert_eq!(int_name("unsigned char"), "uchar");
        assert_eq!(int_name("unsigned"), "uint");
        assert_eq!(int_name("__int128"), "__int128");
    }

    #[test]
    fn test_builtin_reference_uses_canonical_name() {
        let mut mapper = TypeMapper::new();
        let name = mapper.named("ulong", &int("long unsigned int", 8, false));
        assert_eq!(name, "_Ctype_ulong");
        assert_eq!(mapper.declarations(), vec!["type _Ctype_ulong uint64"]);
    }

    #[test]
    fn test_typedef_alias() {
        let mut mapper = TypeMapper::new();
        let size_t = CType::Typedef {
            name: "size_t".to_string(),
            target: Box::new(int("long unsigned int", 8, false)),
        };
        assert_eq!(mapper.named("size_t", &size_t), "_Ctype_size_t");
        assert_eq!(
            mapper.declarations(),
            vec!["type _Ctype_size_t = _Ctype_ulong", "type _Ctype_ulong uint64"]
        );
    }

    #[test]
    fn test_struct_with_keyword_field_and_padding() {
        let mut mapper = TypeMapper::new();
        let s = CType::Struct(Aggregate {
            tag: Some("tok".to_string()),
            size: 16,
            align: 8,
            fields: vec![
                Field {
                    name: "type".to_string(),
                    offset: 0,
                    ty: int("char", 1, true),
                    bit_size: None,
                },
                Field {
                    name: "text".to_string(),
                    offset: 8,
                    ty: CType::Pointer {
                        pointee: Box::new(int("char", 1, true)),
                        size: 8,
                    },
                    bit_size: None,
                },
            ],
            complete: true,
        });
        assert_eq!(mapper.managed(&s), "_Ctype_struct_tok");
        let decls = mapper.declarations();
        assert!(decls.contains(
            &"type _Ctype_struct_tok struct {\n\t_type _Ctype_char\n\t_ [7]byte\n\ttext *_Ctype_char\n}"
                .to_string()
        ));
    }

    #[test]
    fn test_union_is_opaque_bytes() {
        let mut mapper = TypeMapper::new();
        let u = CType::Union(Aggregate {
            tag: Some("val".to_string()),
            size: 8,
            align: 8,
            fields: Vec::new(),
            complete: true,
        });
        assert_eq!(mapper.managed(&u), "_Ctype_union_val");
        assert_eq!(mapper.declarations(), vec!["type _Ctype_union_val [8]byte"]);
    }

    #[test]
    fn test_void_pointer_and_void() {
        let mut mapper = TypeMapper::new();
        let vp = CType::Pointer {
            pointee: Box::new(CType::Void),
            size: 8,
        };
        assert_eq!(mapper.managed(&vp), "unsafe.Pointer");
        assert_eq!(mapper.managed(&CType::Void), "_Ctype_void");
        assert_eq!(mapper.declarations(), vec!["type _Ctype_void [0]byte"]);
    }

    #[test]
    fn test_incomplete_struct_does_not_replace_complete() {
        let mut mapper = TypeMapper::new();
        let complete = CType::Struct(Aggregate {
            tag: Some("node".to_string()),
            size: 4,
            align: 4,
            fields: vec![Field {
                name: "v".to_string(),
                offset: 0,
                ty: int("int", 4, true),
                bit_size: None,
            }],
            complete: true,
        });
        let forward = CType::Struct(Aggregate {
            tag: Some("node".to_string()),
            size: 0,
            align: 1,
            fields: Vec::new(),
            complete: false,
        });
        mapper.managed(&complete);
        mapper.managed(&forward);
        assert!(mapper
            .declarations()
            .contains(&"type _Ctype_struct_node struct {\n\tv _Ctype_int\n}".to_string()));
    }
}
