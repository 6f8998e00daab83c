//! Layout extraction: compile the layout probe, read back types and values.

use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};

use super::consts::{DW_TAG_ENUMERATOR, DW_TAG_VARIABLE};
use super::die::DieTree;
use super::objfile::{DebugSections, DATA_ARRAY_SYMBOL};
use super::types::TypeBuilder;
use super::DwarfError;
use crate::builder::toolchain::Toolchain;
use crate::core::ctype::{CType, ConstValue};
use crate::core::ident::{ForeignIdentifier, IdentKind, Resolved};
use crate::util::errors::BridgeError;

/// File name the probe declarations are attributed to.
const LAYOUT_FILE: &str = "cgo-dwarf-inference";

/// One identifier to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub name: String,
    pub c_name: String,
    pub kind: IdentKind,
}

/// Synthesize the layout probe.
///
/// Every entry gets a pointer variable `__cgo__<i>` to its type. Constants
/// additionally get an enumerator `__cgo_enum__<i>` and a slot in the data
/// array, which is read when the compiler records no enumerator value.
pub fn layout_program(preamble: &str, entries: &[LayoutEntry]) -> String {
    let mut out = String::with_capacity(preamble.len() + entries.len() * 96);
    out.push_str(preamble);
    if !preamble.ends_with('\n') {
        out.push('\n');
    }
    let _ = writeln!(out, "#line 1 \"{}\"", LAYOUT_FILE);
    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "__typeof__({}) *__cgo__{};", entry.c_name, i);
    }
    for (i, entry) in entries.iter().enumerate() {
        if entry.kind == IdentKind::Constant {
            let _ = writeln!(out, "enum {{ __cgo_enum__{} = {} }};", i, entry.c_name);
        }
    }
    let _ = writeln!(out, "long long {}[] = {{", DATA_ARRAY_SYMBOL);
    for entry in entries {
        if entry.kind == IdentKind::Constant {
            let _ = writeln!(out, "\t(long long)({}),", entry.c_name);
        } else {
            out.push_str("\t0,\n");
        }
    }
    out.push_str("\t1\n};\n");
    out
}

/// Compiles the layout probe with one toolchain.
pub struct LayoutExtractor<'a> {
    toolchain: &'a dyn Toolchain,
    cflags: Vec<String>,
}

impl<'a> LayoutExtractor<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, cflags: Vec<String>) -> Self {
        LayoutExtractor { toolchain, cflags }
    }

    /// Resolve every classified identifier that has no resolution yet.
    ///
    /// Per-identifier failures are gathered and reported together.
    pub fn extract(&self, preamble: &str, idents: &mut [ForeignIdentifier]) -> Result<()> {
        let pending: Vec<usize> = idents
            .iter()
            .enumerate()
            .filter(|(_, i)| i.kind != IdentKind::Unknown && i.resolved.is_none())
            .map(|(n, _)| n)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let entries: Vec<LayoutEntry> = pending
            .iter()
            .map(|&n| LayoutEntry {
                name: idents[n].name.clone(),
                c_name: idents[n].c_name.clone(),
                kind: idents[n].kind,
            })
            .collect();

        let sections = self.compile(preamble, &entries)?;
        let results = resolve_layouts(&sections, &entries)?;

        let mut failures = Vec::new();
        for (&n, result) in pending.iter().zip(results) {
            match result {
                Ok(resolved) => idents[n].assign_resolution(resolved),
                Err(reason) => failures.push((idents[n].name.clone(), reason)),
            }
        }
        if !failures.is_empty() {
            return Err(BridgeError::LayoutExtraction { failures }.into());
        }

        tracing::debug!("extracted layout of {} identifier(s)", entries.len());
        Ok(())
    }

    fn compile(&self, preamble: &str, entries: &[LayoutEntry]) -> Result<DebugSections> {
        let program = layout_program(preamble, entries);
        let dir = tempfile::tempdir().context("failed to create probe directory")?;
        let object = dir
            .path()
            .join(format!("_cgo_layout.{}", self.toolchain.object_extension()));

        self.toolchain
            .debug_object_command(&self.cflags, &program, &object)
            .into_process()
            .exec_and_check()?;

        let bytes = std::fs::read(&object)
            .with_context(|| format!("failed to read {}", object.display()))?;
        Ok(DebugSections::load(&bytes)?)
    }
}

/// Read the type and value of every entry out of decoded debug sections.
///
/// The outer error is a malformed object; inner errors are per entry.
pub fn resolve_layouts(
    sections: &DebugSections,
    entries: &[LayoutEntry],
) -> Result<Vec<Result<Resolved, String>>, DwarfError> {
    let tree = DieTree::parse(sections)?;
    let mut variables = HashMap::new();
    let mut enumerators = HashMap::new();
    for die in &tree.dies {
        match (die.tag, die.name()) {
            (DW_TAG_VARIABLE, Some(name)) if name.starts_with("__cgo__") => {
                variables.insert(name.to_string(), die);
            }
            (DW_TAG_ENUMERATOR, Some(name)) if name.starts_with("__cgo_enum__") => {
                enumerators.insert(name.to_string(), die);
            }
            _ => {}
        }
    }

    let mut builder = TypeBuilder::new(&tree);
    let mut fallbacks = 0;
    let mut results = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let Some(var) = variables.get(&format!("__cgo__{}", i)) else {
            results.push(Err("no debug information recorded".to_string()));
            continue;
        };
        let ty = match builder.type_of(var) {
            Ok(CType::Pointer { pointee, .. }) => *pointee,
            Ok(other) => {
                results.push(Err(format!("unexpected probe type {:?}", other)));
                continue;
            }
            Err(DwarfError::Type(reason)) => {
                results.push(Err(reason));
                continue;
            }
            Err(e) => return Err(e),
        };

        let resolved = match entry.kind {
            IdentKind::Type => Ok(Resolved::Type(ty)),
            IdentKind::Function => match ty.resolve() {
                CType::Func(f) => Ok(Resolved::Function(f.clone())),
                _ => Err("declared as a function but is not one".to_string()),
            },
            IdentKind::Variable => Ok(Resolved::Variable(ty)),
            IdentKind::FunctionOrVariable => match ty.resolve() {
                CType::Func(f) => Ok(Resolved::Function(f.clone())),
                _ => Ok(Resolved::Variable(ty)),
            },
            IdentKind::Constant => {
                let signed = ty.is_signed();
                let from_enum = enumerators
                    .get(&format!("__cgo_enum__{}", i))
                    .and_then(|e| e.attr(super::consts::DW_AT_CONST_VALUE))
                    .and_then(|v| v.as_i64(signed));
                let value = match from_enum {
                    Some(v) => Some(v),
                    None => {
                        let slot = sections.data_array.as_ref().and_then(|a| a.get(i).copied());
                        if slot.is_some() {
                            fallbacks += 1;
                        }
                        slot.map(|v| v as i64)
                    }
                };
                match value {
                    Some(v) => Ok(Resolved::Constant {
                        ty,
                        value: ConstValue::Int(v),
                    }),
                    None => Err("compiler recorded no value for the constant".to_string()),
                }
            }
            IdentKind::Unknown => Err("identifier was never classified".to_string()),
        };
        results.push(resolved);
    }

    if fallbacks > 0 {
        tracing::warn!(
            "{} constant value(s) read from {} because debug info omitted the enumerator",
            fallbacks,
            DATA_ARRAY_SYMBOL
        );
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwarf::types::testing::*;

    fn entry(name: &str, kind: IdentKind) -> LayoutEntry {
        LayoutEntry {
            name: name.to_string(),
            c_name: name.to_string(),
            kind,
        }
    }

    #[test]
    fn test_layout_program_shape() {
        let entries = vec![
            entry("size_t", IdentKind::Type),
            entry("EOF", IdentKind::Constant),
        ];
        let program = layout_program("#include <stdio.h>", &entries);
        assert!(program.starts_with("#include <stdio.h>\n#line 1 \"cgo-dwarf-inference\"\n"));
        assert!(program.contains("__typeof__(size_t) *__cgo__0;\n"));
        assert!(program.contains("__typeof__(EOF) *__cgo__1;\n"));
        assert!(program.contains("enum { __cgo_enum__1 = EOF };"));
        assert!(!program.contains("__cgo_enum__0"));
        assert!(program.contains("long long __cgo_debug_data[] = {\n\t0,\n\t(long long)(EOF),\n\t1\n};"));
    }

    /// `int *__cgo__0;` plus, optionally, the enumerator `__cgo_enum__0 = -1`.
    fn constant_unit(with_enumerator: bool) -> UnitWriter {
        let mut w = UnitWriter::new();
        let int = w.base("int", 4, 0x05);
        let ptr = w.pointer(int);
        w.variable("__cgo__0", ptr);
        w.entry(ENUM);
        w.u8(4);
        w.u32(int);
        if with_enumerator {
            w.entry(ENUMERATOR);
            w.string("__cgo_enum__0");
            w.sleb(-1);
        }
        w.end_children();
        w
    }

    #[test]
    fn test_constant_from_enumerator() {
        let sections = constant_unit(true).sections(None);
        let results = resolve_layouts(&sections, &[entry("EOF", IdentKind::Constant)]).unwrap();
        match &results[0] {
            Ok(Resolved::Constant { ty, value }) => {
                assert_eq!(ty.size(), 4);
                assert_eq!(value, &ConstValue::Int(-1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_data_array_fallback_agrees_with_enumerator() {
        let entries = [entry("EOF", IdentKind::Constant)];
        let with_enum = resolve_layouts(&constant_unit(true).sections(None), &entries).unwrap();
        let fallback = resolve_layouts(
            &constant_unit(false).sections(Some(vec![(-1i64) as u64, 1])),
            &entries,
        )
        .unwrap();
        assert_eq!(with_enum[0], fallback[0]);
    }

    #[test]
    fn test_constant_without_any_value_fails() {
        let sections = constant_unit(false).sections(None);
        let results = resolve_layouts(&sections, &[entry("EOF", IdentKind::Constant)]).unwrap();
        assert!(results[0].is_err());
    }

    #[test]
    fn test_function_or_variable_is_split() {
        let mut w = UnitWriter::new();
        let int = w.base("int", 4, 0x05);
        let func = w.entry(SUBROUTINE);
        w.u32(int);
        w.entry(PARAM);
        w.u32(int);
        w.end_children();
        let fptr = w.pointer(func);
        let iptr = w.pointer(int);
        w.variable("__cgo__0", fptr);
        w.variable("__cgo__1", iptr);
        let sections = w.sections(None);

        let entries = [
            entry("abs", IdentKind::FunctionOrVariable),
            entry("counter", IdentKind::FunctionOrVariable),
            entry("missing", IdentKind::Type),
        ];
        let results = resolve_layouts(&sections, &entries).unwrap();
        assert!(matches!(&results[0], Ok(Resolved::Function(f)) if f.params.len() == 1));
        assert!(matches!(&results[1], Ok(Resolved::Variable(CType::Int { size: 4, .. }))));
        assert!(results[2].is_err());
    }
}
