//! Debug sections and the constant data array, read out of an object file.
//!
//! Probe objects are never linked, so cross-section references inside
//! `.debug_info` may still be relocations. They are applied here, against
//! a private copy of each section.

use std::borrow::Cow;

use object::{
    Object, ObjectSection, ObjectSymbol, RelocationKind, RelocationTarget, SectionIndex,
};

use super::reader::read_uint;
use super::DwarfError;

/// Symbol of the constant data array, without platform prefix.
pub const DATA_ARRAY_SYMBOL: &str = "__cgo_debug_data";

/// The debug sections of one object, relocated.
#[derive(Debug, Clone, Default)]
pub struct DebugSections {
    pub little_endian: bool,
    pub info: Vec<u8>,
    pub abbrev: Vec<u8>,
    pub str: Vec<u8>,
    pub line_str: Vec<u8>,
    pub str_offsets: Vec<u8>,
    /// Elements of the constant data array, if the object defines one
    pub data_array: Option<Vec<u64>>,
}

impl DebugSections {
    /// Read the debug sections out of object file bytes.
    pub fn load(bytes: &[u8]) -> Result<Self, DwarfError> {
        let file = object::File::parse(bytes).map_err(|e| DwarfError::Object(e.to_string()))?;
        let little_endian = file.is_little_endian();

        let info = section_data(&file, ".debug_info")?
            .ok_or(DwarfError::MissingSection(".debug_info"))?;
        let abbrev = section_data(&file, ".debug_abbrev")?
            .ok_or(DwarfError::MissingSection(".debug_abbrev"))?;

        Ok(DebugSections {
            little_endian,
            info,
            abbrev,
            str: section_data(&file, ".debug_str")?.unwrap_or_default(),
            line_str: section_data(&file, ".debug_line_str")?.unwrap_or_default(),
            str_offsets: section_data(&file, ".debug_str_offsets")?.unwrap_or_default(),
            data_array: data_array(&file, DATA_ARRAY_SYMBOL),
        })
    }
}

fn find_section<'data, 'file>(
    file: &'file object::File<'data>,
    name: &str,
) -> Option<object::Section<'data, 'file>> {
    // Mach-O spells `.debug_info` as `__debug_info`.
    file.section_by_name(name).or_else(|| {
        name.strip_prefix('.')
            .and_then(|rest| file.section_by_name(&format!("__{}", rest)))
    })
}

/// Section contents with relocations applied.
fn section_data(file: &object::File<'_>, name: &str) -> Result<Option<Vec<u8>>, DwarfError> {
    let Some(section) = find_section(file, name) else {
        return Ok(None);
    };
    let data: Cow<'_, [u8]> = section
        .uncompressed_data()
        .map_err(|e| DwarfError::Object(format!("{}: {}", name, e)))?;
    let mut data = data.into_owned();
    let little_endian = file.is_little_endian();

    for (offset, reloc) in section.relocations() {
        let target = match reloc.target() {
            RelocationTarget::Symbol(index) => {
                let symbol = file
                    .symbol_by_index(index)
                    .map_err(|e| DwarfError::Object(format!("bad relocation symbol: {}", e)))?;
                symbol.address()
            }
            RelocationTarget::Section(index) => section_address(file, index),
            _ => continue,
        };
        if !matches!(reloc.kind(), RelocationKind::Absolute | RelocationKind::SectionOffset) {
            continue;
        }

        let width = usize::from(reloc.size() / 8);
        let start = usize::try_from(offset).map_err(|_| DwarfError::Object(name.to_string()))?;
        let Some(slot) = data.get_mut(start..start + width) else {
            return Err(DwarfError::Truncated {
                section: "relocation",
                offset: start,
            });
        };
        let addend = if reloc.has_implicit_addend() {
            read_uint(slot, little_endian) as i64
        } else {
            reloc.addend()
        };
        let value = target.wrapping_add(addend as u64);
        write_uint(slot, value, little_endian);
    }

    Ok(Some(data))
}

fn section_address(file: &object::File<'_>, index: SectionIndex) -> u64 {
    file.section_by_index(index).map(|s| s.address()).unwrap_or(0)
}

fn write_uint(slot: &mut [u8], value: u64, little_endian: bool) {
    let n = slot.len();
    for (i, byte) in slot.iter_mut().enumerate() {
        let shift = if little_endian { 8 * i } else { 8 * (n - 1 - i) };
        *byte = (value >> shift) as u8;
    }
}

/// Read the 8-byte elements of the data array symbol.
fn data_array(file: &object::File<'_>, name: &str) -> Option<Vec<u64>> {
    let prefixed = format!("_{}", name);
    let symbol = file
        .symbols()
        .find(|s| matches!(s.name(), Ok(n) if n == name || n == prefixed))?;
    let section = file.section_by_index(symbol.section_index()?).ok()?;
    let data = section.data().ok()?;
    let start = usize::try_from(symbol.address().checked_sub(section.address())?).ok()?;
    let end = match symbol.size() {
        0 => data.len(),
        size => start.checked_add(usize::try_from(size).ok()?)?.min(data.len()),
    };
    let bytes = data.get(start..end)?;
    Some(
        bytes
            .chunks_exact(8)
            .map(|chunk| read_uint(chunk, file.is_little_endian()))
            .collect(),
    )
}
