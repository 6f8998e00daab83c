//! Dynamic import discovery.
//!
//! A package's bridge objects, linked into a throwaway dynamic executable,
//! tell us exactly which shared-library symbols internal linking will have
//! to bind: the executable's undefined dynamic symbols (with their symbol
//! versions and owning libraries), its `DT_NEEDED` entries and its program
//! interpreter.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use object::elf;
use object::read::elf::{Dyn, FileHeader, SectionHeader, Sym};
use object::read::Object;
use object::{Endianness, FileKind, ObjectKind, SymbolIndex};

use crate::core::link_directive::LinkDirective;

/// One undefined symbol of a dynamic executable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImportedSymbol {
    pub name: String,
    pub version: Option<String>,
    pub library: Option<String>,
}

/// What a dynamic executable needs from the platform at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicImports {
    pub symbols: Vec<ImportedSymbol>,
    pub libraries: Vec<String>,
    pub interpreter: Option<String>,
}

impl DynamicImports {
    /// Read the imports of an executable image.
    pub fn read(data: &[u8]) -> Result<Self> {
        match FileKind::parse(data).context("unrecognized object file")? {
            FileKind::Elf32 => read_elf::<elf::FileHeader32<Endianness>>(data),
            FileKind::Elf64 => read_elf::<elf::FileHeader64<Endianness>>(data),
            _ => read_generic(data),
        }
    }

    /// Directives in the order the internal linker consumes them: symbols,
    /// then library dependencies, then the interpreter.
    pub fn directives(&self) -> Vec<LinkDirective> {
        let mut out = Vec::new();
        for sym in &self.symbols {
            out.push(LinkDirective::ImportDynamic {
                local: sym.name.clone(),
                remote: Some(sym.name.clone()),
                version: sym.version.clone(),
                library: Some(sym.library.clone().unwrap_or_default()),
            });
        }
        for lib in &self.libraries {
            out.push(LinkDirective::library_dependency(lib.clone()));
        }
        if let Some(path) = &self.interpreter {
            out.push(LinkDirective::DynamicLinker { path: path.clone() });
        }
        out
    }
}

fn utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn read_elf<Elf: FileHeader<Endian = Endianness>>(data: &[u8]) -> Result<DynamicImports> {
    let header = Elf::parse(data).context("malformed ELF header")?;
    let endian = header.endian().context("malformed ELF header")?;
    let sections = header
        .sections(endian, data)
        .context("malformed ELF section table")?;

    let mut imports = DynamicImports::default();

    if let Some((_, interp)) = sections.section_by_name(endian, b".interp") {
        let bytes = interp
            .data(endian, data)
            .map_err(|_| anyhow::anyhow!("malformed .interp section"))?;
        let path = bytes.split(|b| *b == 0).next().unwrap_or_default();
        if !path.is_empty() {
            imports.interpreter = Some(utf8(path));
        }
    }

    let dynsym = sections
        .symbols(endian, data, elf::SHT_DYNSYM)
        .context("malformed .dynsym")?;
    let versions = sections
        .versions(endian, data)
        .context("malformed symbol version tables")?;
    let mut seen = BTreeSet::new();
    for (i, sym) in dynsym.symbols().iter().enumerate() {
        if i == 0 || sym.st_shndx(endian) != elf::SHN_UNDEF {
            continue;
        }
        let name = sym
            .name(endian, dynsym.strings())
            .context("malformed symbol name")?;
        if name.is_empty() {
            continue;
        }
        let (version, library) = match &versions {
            Some(table) => {
                let index = table.version_index(endian, SymbolIndex(i));
                match table.version(index).context("malformed symbol version")? {
                    Some(v) => (Some(utf8(v.name())), v.file().map(utf8)),
                    None => (None, None),
                }
            }
            None => (None, None),
        };
        let sym = ImportedSymbol {
            name: utf8(name),
            version,
            library,
        };
        if seen.insert(sym.clone()) {
            imports.symbols.push(sym);
        }
    }

    // The index returned alongside the entries is already the linked string
    // table, not the `.dynamic` section itself.
    if let Some((entries, strtab)) = sections
        .dynamic(endian, data)
        .context("malformed .dynamic")?
    {
        let strings = sections
            .strings(endian, data, strtab)
            .context("malformed dynamic string table")?;
        for entry in entries {
            if entry.tag32(endian) == Some(elf::DT_NEEDED) {
                let lib = entry.string(endian, strings).context("malformed DT_NEEDED")?;
                imports.libraries.push(utf8(lib));
            }
        }
    }

    Ok(imports)
}

/// Non-ELF images: the object crate's import table already carries the
/// owning library.
fn read_generic(data: &[u8]) -> Result<DynamicImports> {
    let file = object::File::parse(data).context("unrecognized object file")?;
    if file.kind() != ObjectKind::Executable && file.kind() != ObjectKind::Dynamic {
        anyhow::bail!("not an executable image");
    }
    let mut imports = DynamicImports::default();
    let mut libraries = BTreeSet::new();
    for import in file.imports().context("malformed import table")? {
        let library = utf8(import.library());
        if !library.is_empty() {
            libraries.insert(library.clone());
        }
        imports.symbols.push(ImportedSymbol {
            name: utf8(import.name()),
            version: None,
            library: (!library.is_empty()).then_some(library),
        });
    }
    imports.libraries = libraries.into_iter().collect();
    Ok(imports)
}
