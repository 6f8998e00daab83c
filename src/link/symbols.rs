//! Defined and undefined symbols of host objects.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use object::{BinaryFormat, Object, ObjectSymbol};

/// Symbol table summary of one object file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSymbols {
    pub defined: BTreeSet<String>,
    pub undefined: BTreeSet<String>,
}

impl ObjectSymbols {
    pub fn read(path: &Path) -> Result<Self> {
        let data = crate::util::fs::read_bytes(path)?;
        Self::parse(&data).with_context(|| format!("failed to read symbols of {}", path.display()))
    }

    /// Global symbols with the platform's C prefix removed.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let file = object::File::parse(data)?;
        let prefixed = file.format() == BinaryFormat::MachO;
        let mut symbols = ObjectSymbols::default();
        for sym in file.symbols() {
            if !sym.is_global() {
                continue;
            }
            let Ok(name) = sym.name() else { continue };
            let name = if prefixed {
                name.strip_prefix('_').unwrap_or(name)
            } else {
                name
            };
            if name.is_empty() {
                continue;
            }
            if sym.is_undefined() {
                symbols.undefined.insert(name.to_string());
            } else {
                symbols.defined.insert(name.to_string());
            }
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object::write::{Object as WriteObject, Symbol, SymbolSection};
    use object::{Architecture, Endianness, SymbolFlags, SymbolKind, SymbolScope};

    #[test]
    fn test_defined_and_undefined() {
        let mut obj = WriteObject::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
        let text = obj.section_id(object::write::StandardSection::Text);
        obj.append_section_data(text, &[0xc3], 1);
        obj.add_symbol(Symbol {
            name: b"_cgo_0123456789ab_Cfunc_puts".to_vec(),
            value: 0,
            size: 1,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
        obj.add_symbol(Symbol {
            name: b"puts".to_vec(),
            value: 0,
            size: 0,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Undefined,
            flags: SymbolFlags::None,
        });
        let bytes = obj.write().unwrap();

        let symbols = ObjectSymbols::parse(&bytes).unwrap();
        assert!(symbols.defined.contains("_cgo_0123456789ab_Cfunc_puts"));
        assert!(symbols.undefined.contains("puts"));
    }
}
