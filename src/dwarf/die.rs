//! Debugging information entries.
//!
//! Every unit in `.debug_info` is decoded into one flat arena of DIEs.
//! References are normalized to absolute `.debug_info` offsets so the type
//! builder can follow them across units.

use std::collections::HashMap;

use super::consts::*;
use super::objfile::DebugSections;
use super::reader::{str_at, Reader};
use super::DwarfError;

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Fixed-width constant (`data1`..`data8`); signedness depends on use.
    Data { value: u64, width: u8 },
    Udata(u64),
    Sdata(i64),
    Str(String),
    /// Index into the string offsets table, resolved once the unit is read
    StrIndex(u64),
    /// Absolute offset of the referenced DIE
    Ref(u64),
    Flag(bool),
    Block(Vec<u8>),
    SecOffset(u64),
    /// Forms the type builder never needs (addresses, list indices, ...)
    Ignored,
}

impl AttrValue {
    /// Value as an unsigned constant.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::Data { value, .. } | AttrValue::Udata(value) => Some(*value),
            AttrValue::Sdata(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Value as a signed constant, sign-extending fixed-width data when
    /// `signed` is true.
    pub fn as_i64(&self, signed: bool) -> Option<i64> {
        match *self {
            AttrValue::Data { value, width } if signed && width < 8 => {
                let shift = 64 - 8 * u32::from(width);
                Some(((value << shift) as i64) >> shift)
            }
            AttrValue::Data { value, .. } | AttrValue::Udata(value) => Some(value as i64),
            AttrValue::Sdata(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Die {
    pub offset: u64,
    pub tag: u64,
    pub attrs: Vec<(u64, AttrValue)>,
    pub children: Vec<usize>,
    /// Address size of the owning unit
    pub address_size: u8,
}

impl Die {
    pub fn attr(&self, at: u64) -> Option<&AttrValue> {
        self.attrs.iter().find(|(a, _)| *a == at).map(|(_, v)| v)
    }

    pub fn name(&self) -> Option<&str> {
        match self.attr(DW_AT_NAME)? {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_ref(&self) -> Option<u64> {
        match self.attr(DW_AT_TYPE)? {
            AttrValue::Ref(r) => Some(*r),
            _ => None,
        }
    }

    pub fn udata(&self, at: u64) -> Option<u64> {
        self.attr(at)?.as_u64()
    }

    pub fn flag(&self, at: u64) -> bool {
        matches!(self.attr(at), Some(AttrValue::Flag(true)))
    }
}

#[derive(Debug, Clone)]
struct AttrSpec {
    at: u64,
    form: u64,
    implicit: i64,
}

#[derive(Debug, Clone)]
struct Abbrev {
    tag: u64,
    has_children: bool,
    attrs: Vec<AttrSpec>,
}

fn parse_abbrevs(data: &[u8], offset: u64, le: bool) -> Result<HashMap<u64, Abbrev>, DwarfError> {
    let mut r = Reader::new(data, le, ".debug_abbrev").at(offset as usize);
    let mut table = HashMap::new();
    loop {
        let code = r.uleb()?;
        if code == 0 {
            return Ok(table);
        }
        let tag = r.uleb()?;
        let has_children = r.u8()? != 0;
        let mut attrs = Vec::new();
        loop {
            let at = r.uleb()?;
            let form = r.uleb()?;
            if at == 0 && form == 0 {
                break;
            }
            let implicit = if form == DW_FORM_IMPLICIT_CONST {
                r.sleb()?
            } else {
                0
            };
            attrs.push(AttrSpec { at, form, implicit });
        }
        table.insert(
            code,
            Abbrev {
                tag,
                has_children,
                attrs,
            },
        );
    }
}

/// Per-unit decoding state.
struct Unit<'a> {
    offset: u64,
    version: u16,
    dwarf64: bool,
    address_size: u8,
    sections: &'a DebugSections,
}

/// All DIEs of an object.
#[derive(Debug, Default, Clone)]
pub struct DieTree {
    pub dies: Vec<Die>,
    by_offset: HashMap<u64, usize>,
}

impl DieTree {
    pub fn parse(sections: &DebugSections) -> Result<Self, DwarfError> {
        let mut tree = DieTree::default();
        let le = sections.little_endian;
        let mut r = Reader::new(&sections.info, le, ".debug_info");
        let mut abbrev_cache: HashMap<u64, HashMap<u64, Abbrev>> = HashMap::new();

        while !r.is_empty() {
            let unit_offset = r.pos() as u64;
            let mut length = u64::from(r.u32()?);
            let dwarf64 = length == 0xffff_ffff;
            if dwarf64 {
                length = r.u64()?;
            }
            let body_start = r.pos();
            let unit_end = body_start + length as usize;

            let version = r.u16()?;
            let (abbrev_offset, address_size) = match version {
                2..=4 => {
                    let abbrev = r.offset(dwarf64)?;
                    (abbrev, r.u8()?)
                }
                5 => {
                    let unit_type = r.u8()?;
                    let address_size = r.u8()?;
                    let abbrev = r.offset(dwarf64)?;
                    match unit_type {
                        DW_UT_TYPE | DW_UT_SPLIT_TYPE => {
                            r.skip(8)?;
                            r.offset(dwarf64)?;
                        }
                        DW_UT_SKELETON | DW_UT_SPLIT_COMPILE => r.skip(8)?,
                        _ => {}
                    }
                    (abbrev, address_size)
                }
                v => return Err(DwarfError::UnsupportedVersion(v)),
            };

            if !abbrev_cache.contains_key(&abbrev_offset) {
                let table = parse_abbrevs(&sections.abbrev, abbrev_offset, le)?;
                abbrev_cache.insert(abbrev_offset, table);
            }
            let abbrevs = &abbrev_cache[&abbrev_offset];

            let unit = Unit {
                offset: unit_offset,
                version,
                dwarf64,
                address_size,
                sections,
            };
            let first = tree.dies.len();
            tree.parse_entries(&mut r, unit_end, abbrevs, &unit)?;
            tree.resolve_str_indices(first, &unit);

            r = Reader::new(&sections.info, le, ".debug_info").at(unit_end);
        }

        Ok(tree)
    }

    fn parse_entries(
        &mut self,
        r: &mut Reader<'_>,
        end: usize,
        abbrevs: &HashMap<u64, Abbrev>,
        unit: &Unit<'_>,
    ) -> Result<(), DwarfError> {
        // Stack of parents whose children are still being read.
        let mut parents: Vec<usize> = Vec::new();
        while r.pos() < end {
            let offset = r.pos() as u64;
            let code = r.uleb()?;
            if code == 0 {
                parents.pop();
                continue;
            }
            let abbrev = abbrevs
                .get(&code)
                .ok_or(DwarfError::BadAbbrev { code, offset })?;

            let mut attrs = Vec::with_capacity(abbrev.attrs.len());
            for spec in &abbrev.attrs {
                let value = read_attr(r, spec.form, spec.implicit, unit)?;
                attrs.push((spec.at, value));
            }

            let index = self.dies.len();
            self.dies.push(Die {
                offset,
                tag: abbrev.tag,
                attrs,
                children: Vec::new(),
                address_size: unit.address_size,
            });
            self.by_offset.insert(offset, index);
            if let Some(&parent) = parents.last() {
                self.dies[parent].children.push(index);
            }
            if abbrev.has_children {
                parents.push(index);
            }
        }
        Ok(())
    }

    fn resolve_str_indices(&mut self, first: usize, unit: &Unit<'_>) {
        let sections = unit.sections;
        let base = self.dies.get(first).and_then(|cu| match cu.attr(DW_AT_STR_OFFSETS_BASE) {
            Some(AttrValue::SecOffset(base)) => Some(*base),
            _ => None,
        });
        // DWARF 5 default: just past the table header.
        let base = base.unwrap_or(if unit.dwarf64 { 16 } else { 8 });
        let entry = if unit.dwarf64 { 8 } else { 4 };

        for die in &mut self.dies[first..] {
            for (_, value) in &mut die.attrs {
                if let AttrValue::StrIndex(index) = *value {
                    let at = base + index * entry;
                    let resolved = Reader::new(&sections.str_offsets, sections.little_endian, "")
                        .at(at as usize)
                        .offset(unit.dwarf64)
                        .ok()
                        .and_then(|off| str_at(&sections.str, off));
                    *value = resolved.map_or(AttrValue::Ignored, AttrValue::Str);
                }
            }
        }
    }

    pub fn get(&self, offset: u64) -> Result<&Die, DwarfError> {
        self.by_offset
            .get(&offset)
            .map(|&i| &self.dies[i])
            .ok_or(DwarfError::BadReference(offset))
    }

    pub fn children<'a>(&'a self, die: &'a Die) -> impl Iterator<Item = &'a Die> + 'a {
        die.children.iter().map(move |&i| &self.dies[i])
    }

    /// First DIE with the given tag and name.
    pub fn find(&self, tag: u64, name: &str) -> Option<&Die> {
        self.dies
            .iter()
            .find(|d| d.tag == tag && d.name() == Some(name))
    }
}

fn read_attr(
    r: &mut Reader<'_>,
    form: u64,
    implicit: i64,
    unit: &Unit<'_>,
) -> Result<AttrValue, DwarfError> {
    let sections = unit.sections;
    let value = match form {
        DW_FORM_ADDR => {
            r.uint(usize::from(unit.address_size))?;
            AttrValue::Ignored
        }
        DW_FORM_DATA1 => AttrValue::Data { value: r.uint(1)?, width: 1 },
        DW_FORM_DATA2 => AttrValue::Data { value: r.uint(2)?, width: 2 },
        DW_FORM_DATA4 => AttrValue::Data { value: r.uint(4)?, width: 4 },
        DW_FORM_DATA8 => AttrValue::Data { value: r.uint(8)?, width: 8 },
        DW_FORM_DATA16 => {
            r.skip(16)?;
            AttrValue::Ignored
        }
        DW_FORM_SDATA => AttrValue::Sdata(r.sleb()?),
        DW_FORM_UDATA => AttrValue::Udata(r.uleb()?),
        DW_FORM_IMPLICIT_CONST => AttrValue::Sdata(implicit),
        DW_FORM_STRING => AttrValue::Str(r.cstr()?),
        DW_FORM_STRP => {
            let off = r.offset(unit.dwarf64)?;
            str_at(&sections.str, off).map_or(AttrValue::Ignored, AttrValue::Str)
        }
        DW_FORM_LINE_STRP => {
            let off = r.offset(unit.dwarf64)?;
            str_at(&sections.line_str, off).map_or(AttrValue::Ignored, AttrValue::Str)
        }
        DW_FORM_STRP_SUP => {
            r.offset(unit.dwarf64)?;
            AttrValue::Ignored
        }
        DW_FORM_STRX | DW_FORM_STRX1 | DW_FORM_STRX2 | DW_FORM_STRX3 | DW_FORM_STRX4 => {
            let index = match form {
                DW_FORM_STRX1 => r.uint(1)?,
                DW_FORM_STRX2 => r.uint(2)?,
                DW_FORM_STRX3 => r.uint(3)?,
                DW_FORM_STRX4 => r.uint(4)?,
                _ => r.uleb()?,
            };
            AttrValue::StrIndex(index)
        }
        DW_FORM_ADDRX | DW_FORM_LOCLISTX | DW_FORM_RNGLISTX => {
            r.uleb()?;
            AttrValue::Ignored
        }
        DW_FORM_ADDRX1 | DW_FORM_ADDRX2 | DW_FORM_ADDRX3 | DW_FORM_ADDRX4 => {
            r.skip((form - DW_FORM_ADDRX1 + 1) as usize)?;
            AttrValue::Ignored
        }
        DW_FORM_REF1 => AttrValue::Ref(unit.offset + r.uint(1)?),
        DW_FORM_REF2 => AttrValue::Ref(unit.offset + r.uint(2)?),
        DW_FORM_REF4 => AttrValue::Ref(unit.offset + r.uint(4)?),
        DW_FORM_REF8 => AttrValue::Ref(unit.offset + r.uint(8)?),
        DW_FORM_REF_UDATA => AttrValue::Ref(unit.offset + r.uleb()?),
        DW_FORM_REF_ADDR => {
            // DWARF 2 encodes this with the address size.
            let width = if unit.version <= 2 {
                usize::from(unit.address_size)
            } else if unit.dwarf64 {
                8
            } else {
                4
            };
            AttrValue::Ref(r.uint(width)?)
        }
        DW_FORM_REF_SIG8 => {
            r.skip(8)?;
            AttrValue::Ignored
        }
        DW_FORM_REF_SUP4 => {
            r.skip(4)?;
            AttrValue::Ignored
        }
        DW_FORM_REF_SUP8 => {
            r.skip(8)?;
            AttrValue::Ignored
        }
        DW_FORM_SEC_OFFSET => AttrValue::SecOffset(r.offset(unit.dwarf64)?),
        DW_FORM_FLAG => AttrValue::Flag(r.u8()? != 0),
        DW_FORM_FLAG_PRESENT => AttrValue::Flag(true),
        DW_FORM_EXPRLOC | DW_FORM_BLOCK => {
            let len = r.uleb()? as usize;
            AttrValue::Block(r.bytes(len)?.to_vec())
        }
        DW_FORM_BLOCK1 => {
            let len = r.uint(1)? as usize;
            AttrValue::Block(r.bytes(len)?.to_vec())
        }
        DW_FORM_BLOCK2 => {
            let len = r.uint(2)? as usize;
            AttrValue::Block(r.bytes(len)?.to_vec())
        }
        DW_FORM_BLOCK4 => {
            let len = r.uint(4)? as usize;
            AttrValue::Block(r.bytes(len)?.to_vec())
        }
        DW_FORM_INDIRECT => {
            let actual = r.uleb()?;
            return read_attr(r, actual, implicit, unit);
        }
        other => return Err(DwarfError::UnsupportedForm(other)),
    };
    Ok(value)
}
