//! Conversion of type DIEs into [`CType`].

use std::collections::{HashMap, HashSet};

use super::consts::*;
use super::die::{AttrValue, Die, DieTree};
use super::DwarfError;
use crate::core::ctype::{Aggregate, CType, EnumType, Field, FuncType};

const MAX_DEPTH: usize = 64;

/// Builds native types from a DIE tree, memoizing completed types.
pub struct TypeBuilder<'a> {
    tree: &'a DieTree,
    cache: HashMap<u64, CType>,
    in_progress: HashSet<u64>,
    depth: usize,
}

impl<'a> TypeBuilder<'a> {
    pub fn new(tree: &'a DieTree) -> Self {
        TypeBuilder {
            tree,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
            depth: 0,
        }
    }

    /// Type referenced by `die`'s `DW_AT_type`, or `void` when absent.
    pub fn type_of(&mut self, die: &Die) -> Result<CType, DwarfError> {
        match die.type_ref() {
            Some(offset) => self.build(offset),
            None => Ok(CType::Void),
        }
    }

    /// Type described by the DIE at `offset`.
    pub fn build(&mut self, offset: u64) -> Result<CType, DwarfError> {
        if let Some(ty) = self.cache.get(&offset) {
            return Ok(ty.clone());
        }
        if self.depth >= MAX_DEPTH {
            return Err(DwarfError::Type("type nesting too deep".to_string()));
        }

        let tree = self.tree;
        let die = tree.get(offset)?;
        if self.in_progress.contains(&offset) {
            // Self-reference through a pointer: cut the cycle here.
            return Ok(placeholder(die));
        }

        self.depth += 1;
        self.in_progress.insert(offset);
        let result = self.build_die(die);
        self.in_progress.remove(&offset);
        self.depth -= 1;

        let ty = result?;
        self.cache.insert(offset, ty.clone());
        Ok(ty)
    }

    fn build_die(&mut self, die: &Die) -> Result<CType, DwarfError> {
        match die.tag {
            DW_TAG_BASE_TYPE => base_type(die),
            DW_TAG_CONST_TYPE | DW_TAG_VOLATILE_TYPE | DW_TAG_RESTRICT_TYPE
            | DW_TAG_ATOMIC_TYPE => self.type_of(die),
            DW_TAG_POINTER_TYPE => {
                let pointee = self.type_of(die)?;
                let size = die
                    .udata(DW_AT_BYTE_SIZE)
                    .unwrap_or(u64::from(die.address_size));
                Ok(CType::Pointer {
                    pointee: Box::new(pointee),
                    size,
                })
            }
            DW_TAG_TYPEDEF => {
                let name = die.name().unwrap_or_default().to_string();
                let target = self.type_of(die)?;
                Ok(CType::Typedef {
                    name,
                    target: Box::new(target),
                })
            }
            DW_TAG_STRUCTURE_TYPE => Ok(CType::Struct(self.aggregate(die, false)?)),
            DW_TAG_UNION_TYPE => Ok(CType::Union(self.aggregate(die, true)?)),
            DW_TAG_ENUMERATION_TYPE => self.enumeration(die),
            DW_TAG_ARRAY_TYPE => self.array(die),
            DW_TAG_SUBROUTINE_TYPE => Ok(CType::Func(self.function(die)?)),
            tag => Err(DwarfError::Type(format!(
                "unexpected DWARF tag {:#x} at offset {:#x}",
                tag, die.offset
            ))),
        }
    }

    fn aggregate(&mut self, die: &Die, union: bool) -> Result<Aggregate, DwarfError> {
        let tag = die.name().map(str::to_string);
        if die.flag(DW_AT_DECLARATION) {
            return Ok(Aggregate {
                tag,
                size: 0,
                align: 1,
                fields: Vec::new(),
                complete: false,
            });
        }

        let size = die.udata(DW_AT_BYTE_SIZE).unwrap_or(0);
        let mut fields = Vec::new();
        let tree = self.tree;
        for member in tree.children(die).filter(|c| c.tag == DW_TAG_MEMBER) {
            let ty = match self.type_of(member) {
                Ok(ty) => ty,
                // Unrepresentable members keep their bytes as an opaque array.
                Err(DwarfError::Type(_)) => opaque_bytes(self.raw_size(member.type_ref())),
                Err(e) => return Err(e),
            };
            let bit_size = member.udata(DW_AT_BIT_SIZE);
            let offset = match member_location(member) {
                Some(offset) => offset,
                None if union => 0,
                None => member
                    .udata(DW_AT_DATA_BIT_OFFSET)
                    .map(|bits| bits / 8)
                    .unwrap_or(0),
            };
            fields.push(Field {
                name: member.name().unwrap_or_default().to_string(),
                offset,
                ty,
                bit_size,
            });
        }

        let align = die.udata(DW_AT_ALIGNMENT).unwrap_or_else(|| {
            fields
                .iter()
                .filter(|f| f.bit_size.is_none())
                .map(|f| f.ty.align())
                .max()
                .unwrap_or(1)
        });

        Ok(Aggregate {
            tag,
            size,
            align,
            fields,
            complete: true,
        })
    }

    fn enumeration(&mut self, die: &Die) -> Result<CType, DwarfError> {
        let underlying_signed = match die.type_ref() {
            Some(offset) => Some(self.build(offset)?.is_signed()),
            None => None,
        };
        let tree = self.tree;
        let enumerators: Vec<&Die> = tree
            .children(die)
            .filter(|c| c.tag == DW_TAG_ENUMERATOR)
            .collect();
        let signed = underlying_signed.unwrap_or_else(|| {
            enumerators
                .iter()
                .any(|e| matches!(e.attr(DW_AT_CONST_VALUE), Some(AttrValue::Sdata(v)) if *v < 0))
        });

        let mut values = Vec::with_capacity(enumerators.len());
        for e in enumerators {
            let value = e
                .attr(DW_AT_CONST_VALUE)
                .and_then(|v| v.as_i64(signed))
                .ok_or_else(|| {
                    DwarfError::Type(format!(
                        "enumerator {} has no value",
                        e.name().unwrap_or("?")
                    ))
                })?;
            values.push((e.name().unwrap_or_default().to_string(), value));
        }

        Ok(CType::Enum(EnumType {
            tag: die.name().map(str::to_string),
            size: die.udata(DW_AT_BYTE_SIZE).unwrap_or(4),
            signed,
            enumerators: values,
        }))
    }

    fn array(&mut self, die: &Die) -> Result<CType, DwarfError> {
        let mut ty = self.type_of(die)?;
        let tree = self.tree;
        let dims: Vec<u64> = tree
            .children(die)
            .filter(|c| c.tag == DW_TAG_SUBRANGE_TYPE)
            .map(|sub| {
                sub.udata(DW_AT_COUNT)
                    .or_else(|| {
                        sub.attr(DW_AT_UPPER_BOUND)
                            .and_then(|v| v.as_i64(true))
                            .map(|upper| (upper + 1).max(0) as u64)
                    })
                    // Flexible array member.
                    .unwrap_or(0)
            })
            .collect();
        if dims.is_empty() {
            return Ok(CType::Array {
                elem: Box::new(ty),
                len: 0,
            });
        }
        for len in dims.into_iter().rev() {
            ty = CType::Array {
                elem: Box::new(ty),
                len,
            };
        }
        Ok(ty)
    }

    fn function(&mut self, die: &Die) -> Result<FuncType, DwarfError> {
        let result = self.type_of(die)?;
        let mut params = Vec::new();
        let mut variadic = false;
        // `int f()` carries unspecified parameters too; only a prototype
        // ending in `...` is variadic. Unprototyped calls pass the declared
        // formals, or nothing.
        let prototyped = die.flag(DW_AT_PROTOTYPED);
        let tree = self.tree;
        for child in tree.children(die) {
            match child.tag {
                DW_TAG_FORMAL_PARAMETER => params.push(self.type_of(child)?),
                DW_TAG_UNSPECIFIED_PARAMETERS => variadic = prototyped,
                _ => {}
            }
        }
        Ok(FuncType {
            params,
            result: Box::new(result),
            variadic,
        })
    }

    /// Byte size of a type without interpreting it.
    fn raw_size(&self, mut offset: Option<u64>) -> u64 {
        for _ in 0..MAX_DEPTH {
            let Some(die) = offset.and_then(|o| self.tree.get(o).ok()) else {
                return 0;
            };
            if let Some(size) = die.udata(DW_AT_BYTE_SIZE) {
                return size;
            }
            offset = die.type_ref();
        }
        0
    }
}

fn base_type(die: &Die) -> Result<CType, DwarfError> {
    let name = die.name().unwrap_or_default().to_string();
    let size = die.udata(DW_AT_BYTE_SIZE).unwrap_or(0);
    match die.udata(DW_AT_ENCODING) {
        Some(DW_ATE_BOOLEAN) => Ok(CType::Bool),
        Some(DW_ATE_SIGNED) | Some(DW_ATE_SIGNED_CHAR) => Ok(CType::Int {
            name,
            size,
            signed: true,
        }),
        Some(DW_ATE_UNSIGNED) | Some(DW_ATE_UNSIGNED_CHAR) => Ok(CType::Int {
            name,
            size,
            signed: false,
        }),
        Some(DW_ATE_FLOAT) if size == 4 || size == 8 => Ok(CType::Float { name, size }),
        Some(DW_ATE_FLOAT) => Err(DwarfError::Type(format!(
            "unsupported floating-point type `{}` ({} bytes)",
            name, size
        ))),
        Some(DW_ATE_COMPLEX_FLOAT) => Err(DwarfError::Type(format!(
            "unsupported complex type `{}`",
            name
        ))),
        other => Err(DwarfError::Type(format!(
            "base type `{}` has unsupported encoding {:?}",
            name, other
        ))),
    }
}

/// Constant `DW_AT_data_member_location`, or a `DW_OP_plus_uconst` expression.
fn member_location(member: &Die) -> Option<u64> {
    match member.attr(DW_AT_DATA_MEMBER_LOCATION)? {
        AttrValue::Block(expr) => match expr.split_first() {
            Some((&DW_OP_PLUS_UCONST, rest)) => {
                let mut value = 0u64;
                let mut shift = 0;
                for byte in rest {
                    value |= u64::from(byte & 0x7f) << shift;
                    shift += 7;
                    if byte & 0x80 == 0 {
                        break;
                    }
                }
                Some(value)
            }
            _ => None,
        },
        other => other.as_u64(),
    }
}

fn placeholder(die: &Die) -> CType {
    let agg = Aggregate {
        tag: die.name().map(str::to_string),
        size: die.udata(DW_AT_BYTE_SIZE).unwrap_or(0),
        align: 1,
        fields: Vec::new(),
        complete: false,
    };
    match die.tag {
        DW_TAG_UNION_TYPE => CType::Union(agg),
        _ => CType::Struct(agg),
    }
}

fn opaque_bytes(len: u64) -> CType {
    CType::Array {
        elem: Box::new(CType::Int {
            name: "unsigned char".to_string(),
            size: 1,
            signed: false,
        }),
        len,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A tiny DWARF v4 writer for building test objects by hand.

    use super::super::objfile::DebugSections;

    pub const CU: u8 = 1;
    pub const BASE: u8 = 2;
    pub const POINTER: u8 = 3;
    pub const STRUCT: u8 = 4;
    pub const MEMBER: u8 = 5;
    pub const VARIABLE: u8 = 6;
    pub const ENUM: u8 = 7;
    pub const ENUMERATOR: u8 = 8;
    pub const TYPEDEF: u8 = 9;
    pub const SUBROUTINE: u8 = 10;
    pub const PARAM: u8 = 11;
    pub const VARARGS: u8 = 12;
    pub const ENUMERATOR_U: u8 = 13;
    pub const PROTOTYPE: u8 = 14;

    /// Abbreviations for every entry shape the tests use.
    pub fn abbrevs() -> Vec<u8> {
        vec![
            CU, 0x11, 1, 0x03, 0x08, 0, 0, // compile_unit: name
            BASE, 0x24, 0, 0x03, 0x08, 0x0b, 0x0b, 0x3e, 0x0b, 0, 0, // name size encoding
            POINTER, 0x0f, 0, 0x0b, 0x0b, 0x49, 0x13, 0, 0, // size type
            STRUCT, 0x13, 1, 0x03, 0x08, 0x0b, 0x0b, 0, 0, // name size
            MEMBER, 0x0d, 0, 0x03, 0x08, 0x49, 0x13, 0x38, 0x0b, 0, 0, // name type loc
            VARIABLE, 0x34, 0, 0x03, 0x08, 0x49, 0x13, 0, 0, // name type
            ENUM, 0x04, 1, 0x0b, 0x0b, 0x49, 0x13, 0, 0, // size type
            ENUMERATOR, 0x28, 0, 0x03, 0x08, 0x1c, 0x0d, 0, 0, // name sdata
            TYPEDEF, 0x16, 0, 0x03, 0x08, 0x49, 0x13, 0, 0, // name type
            SUBROUTINE, 0x15, 1, 0x49, 0x13, 0, 0, // result
            PARAM, 0x05, 0, 0x49, 0x13, 0, 0, // type
            VARARGS, 0x18, 0, 0, 0, //
            ENUMERATOR_U, 0x28, 0, 0x03, 0x08, 0x1c, 0x06, 0, 0, // name data4
            PROTOTYPE, 0x15, 1, 0x49, 0x13, 0x27, 0x19, 0, 0, // result prototyped
            0,
        ]
    }

    /// Builder for one compile unit; offsets are unit-relative like `ref4`.
    pub struct UnitWriter {
        body: Vec<u8>,
    }

    impl UnitWriter {
        pub fn new() -> Self {
            // version 4, abbrev offset 0, address size 8
            let mut w = UnitWriter {
                body: vec![4, 0, 0, 0, 0, 0, 8],
            };
            w.entry(CU);
            w.string("probe.c");
            w
        }

        /// Unit-relative offset of the next entry.
        pub fn here(&self) -> u32 {
            self.body.len() as u32 + 4
        }

        pub fn entry(&mut self, code: u8) -> u32 {
            let at = self.here();
            self.body.push(code);
            at
        }

        pub fn string(&mut self, s: &str) {
            self.body.extend_from_slice(s.as_bytes());
            self.body.push(0);
        }

        pub fn u8(&mut self, v: u8) {
            self.body.push(v);
        }

        pub fn u32(&mut self, v: u32) {
            self.body.extend_from_slice(&v.to_le_bytes());
        }

        pub fn sleb(&mut self, mut v: i64) {
            loop {
                let byte = (v & 0x7f) as u8;
                v >>= 7;
                let done = (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0);
                self.body.push(if done { byte } else { byte | 0x80 });
                if done {
                    break;
                }
            }
        }

        pub fn end_children(&mut self) {
            self.body.push(0);
        }

        pub fn base(&mut self, name: &str, size: u8, encoding: u8) -> u32 {
            let at = self.entry(BASE);
            self.string(name);
            self.u8(size);
            self.u8(encoding);
            at
        }

        pub fn pointer(&mut self, target: u32) -> u32 {
            let at = self.entry(POINTER);
            self.u8(8);
            self.u32(target);
            at
        }

        pub fn variable(&mut self, name: &str, ty: u32) -> u32 {
            let at = self.entry(VARIABLE);
            self.string(name);
            self.u32(ty);
            at
        }

        pub fn typedef(&mut self, name: &str, ty: u32) -> u32 {
            let at = self.entry(TYPEDEF);
            self.string(name);
            self.u32(ty);
            at
        }

        pub fn finish(mut self) -> Vec<u8> {
            self.end_children();
            let mut info = (self.body.len() as u32).to_le_bytes().to_vec();
            info.extend(self.body);
            info
        }

        pub fn sections(self, data_array: Option<Vec<u64>>) -> DebugSections {
            DebugSections {
                little_endian: true,
                info: self.finish(),
                abbrev: abbrevs(),
                data_array,
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn build(w: UnitWriter, offset: u32) -> CType {
        let tree = DieTree::parse(&w.sections(None)).unwrap();
        TypeBuilder::new(&tree).build(u64::from(offset)).unwrap()
    }

    #[test]
    fn test_typedef_of_unsigned_long() {
        let mut w = UnitWriter::new();
        let ulong = w.base("long unsigned int", 8, 0x07);
        let size_t = w.typedef("size_t", ulong);
        let ty = build(w, size_t);
        assert_eq!(ty.c_spelling().as_deref(), Some("size_t"));
        assert_eq!(ty.size(), 8);
        assert!(!ty.is_signed());
    }

    #[test]
    fn test_self_referential_struct() {
        // struct node { int v; struct node *next; }
        let mut w = UnitWriter::new();
        let int = w.base("int", 4, 0x05);
        let node = w.entry(STRUCT);
        w.string("node");
        w.u8(16);
        w.entry(MEMBER);
        w.string("v");
        w.u32(int);
        w.u8(0);
        w.entry(MEMBER);
        w.string("next");
        let ptr_slot = w.here() - 4;
        w.u32(0);
        w.u8(8);
        w.end_children();
        let ptr = w.pointer(node);
        let mut info = w.finish();
        // Patch the forward reference to the pointer type.
        let slot = (ptr_slot + 4) as usize;
        info[slot..slot + 4].copy_from_slice(&ptr.to_le_bytes());

        let sections = crate::dwarf::DebugSections {
            little_endian: true,
            info,
            abbrev: abbrevs(),
            ..Default::default()
        };
        let tree = DieTree::parse(&sections).unwrap();
        let ty = TypeBuilder::new(&tree).build(u64::from(node)).unwrap();
        let CType::Struct(agg) = ty else {
            panic!("expected struct");
        };
        assert!(agg.complete);
        assert_eq!(agg.size, 16);
        assert_eq!(agg.align, 8);
        assert_eq!(agg.fields[1].offset, 8);
        let CType::Pointer { pointee, .. } = &agg.fields[1].ty else {
            panic!("expected pointer");
        };
        assert!(matches!(pointee.as_ref(), CType::Struct(inner) if !inner.complete));
    }

    #[test]
    fn test_variadic_function_type() {
        // int (*)(const char *, ...)
        let mut w = UnitWriter::new();
        let int = w.base("int", 4, 0x05);
        let ch = w.base("char", 1, 0x06);
        let char_ptr = w.pointer(ch);
        let func = w.entry(PROTOTYPE);
        w.u32(int);
        w.entry(PARAM);
        w.u32(char_ptr);
        w.entry(VARARGS);
        w.end_children();
        let ty = build(w, func);
        let CType::Func(f) = ty else {
            panic!("expected function");
        };
        assert!(f.variadic);
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.result.size(), 4);
    }

    #[test]
    fn test_unprototyped_function_is_not_variadic() {
        // int answer() { return 42; }
        let mut w = UnitWriter::new();
        let int = w.base("int", 4, 0x05);
        let func = w.entry(SUBROUTINE);
        w.u32(int);
        w.entry(VARARGS);
        w.end_children();
        let CType::Func(f) = build(w, func) else {
            panic!("expected function");
        };
        assert!(!f.variadic);
        assert!(f.params.is_empty());
        assert_eq!(f.result.size(), 4);
    }

    #[test]
    fn test_long_double_is_unsupported() {
        let mut w = UnitWriter::new();
        let ld = w.base("long double", 16, 0x04);
        let tree = DieTree::parse(&w.sections(None)).unwrap();
        let err = TypeBuilder::new(&tree).build(u64::from(ld)).unwrap_err();
        assert!(err.to_string().contains("long double"));
    }

    #[test]
    fn test_long_double_member_becomes_opaque() {
        let mut w = UnitWriter::new();
        let ld = w.base("long double", 16, 0x04);
        let s = w.entry(STRUCT);
        w.string("wide");
        w.u8(16);
        w.entry(MEMBER);
        w.string("x");
        w.u32(ld);
        w.u8(0);
        w.end_children();
        let CType::Struct(agg) = build(w, s) else {
            panic!("expected struct");
        };
        assert_eq!(agg.fields[0].ty.size(), 16);
        assert!(matches!(agg.fields[0].ty, CType::Array { len: 16, .. }));
    }

    #[test]
    fn test_unsigned_enum_values() {
        let mut w = UnitWriter::new();
        let uint = w.base("unsigned int", 4, 0x07);
        let e = w.entry(ENUM);
        w.u8(4);
        w.u32(uint);
        w.entry(ENUMERATOR_U);
        w.string("BIG");
        w.u32(0xffff_fffe);
        w.end_children();
        let CType::Enum(en) = build(w, e) else {
            panic!("expected enum");
        };
        assert!(!en.signed);
        assert_eq!(en.enumerators, vec![("BIG".to_string(), 0xffff_fffe)]);
    }
}
