//! Managed-source front end.
//!
//! Extracts, per file, the C preamble with its `#cgo` directives, the set
//! of `C.name` references and any `//export` annotations. Nothing here ever
//! looks inside the C text beyond recognizing directive lines.

pub mod exports;
pub mod lexer;
pub mod preamble;
pub mod references;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

pub use exports::{ExportedFunc, ManagedParam};
pub use preamble::{BridgeImport, Preamble};
pub use references::{RefContext, Reference};

use crate::core::ident::CONVERSION_HELPERS;
use crate::util::errors::{BridgeError, PreambleError};

/// A parsed managed source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    pub package: String,
    /// Import paths other than the foreign namespace
    pub imports: Vec<String>,
    pub bridge: Option<BridgeImport>,
    pub references: Vec<Reference>,
    pub exports: Vec<ExportedFunc>,
}

impl SourceFile {
    pub fn load(path: &Path) -> Result<Self> {
        let source = crate::util::fs::read_to_string(path)?;
        Self::parse(path, source).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parse a file already in memory.
    pub fn parse(path: &Path, source: String) -> Result<Self, BridgeError> {
        let tokens = lexer::tokenize(&source).map_err(|e| {
            PreambleError::new(path, &source, e.line, (e.offset, 1), e.message)
        })?;

        let package = package_name(&source, &tokens).ok_or_else(|| {
            PreambleError::new(path, &source, 1, (0, 0), "missing package clause")
        })?;
        let imports = import_paths(&source, &tokens);
        let bridge = preamble::find_bridge_import(path, &source, &tokens)?;
        let references = if bridge.is_some() {
            references::collect_references(&source, &tokens)
        } else {
            Vec::new()
        };
        let exports = exports::collect_exports(path, &source, &tokens)?;

        if let Some(import) = &bridge {
            if !exports.is_empty() {
                check_declarations_only(path, &source, &import.preamble)?;
            }
        }

        Ok(SourceFile {
            path: path.to_path_buf(),
            source,
            package,
            imports,
            bridge,
            references,
            exports,
        })
    }

    pub fn uses_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    pub fn preamble(&self) -> Option<&Preamble> {
        self.bridge.as_ref().map(|b| &b.preamble)
    }

    /// File stem used for generated names (`png.go` -> `png`).
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string())
    }
}

/// Owning file of every foreign name: the first file, in the given order,
/// that references it. The name is probed against that file's preamble.
pub fn owner_files(files: &[SourceFile]) -> BTreeMap<String, usize> {
    let mut owners = BTreeMap::new();
    for (i, file) in files.iter().enumerate() {
        for r in &file.references {
            if CONVERSION_HELPERS.contains(&r.name.as_str()) {
                continue;
            }
            owners.entry(r.name.clone()).or_insert(i);
        }
    }
    owners
}

fn package_name(src: &str, tokens: &[lexer::Token]) -> Option<String> {
    let mut code = tokens.iter().filter(|t| !t.is_comment());
    let kw = code.next()?;
    let name = code.next()?;
    (kw.is_ident(src, "package") && name.kind == lexer::TokenKind::Ident)
        .then(|| name.text(src).to_string())
}

fn import_paths(src: &str, tokens: &[lexer::Token]) -> Vec<String> {
    let code: Vec<&lexer::Token> = tokens.iter().filter(|t| !t.is_comment()).collect();
    let mut paths = Vec::new();
    let mut i = 0;
    while i < code.len() {
        if !code[i].is_ident(src, "import") {
            // Imports precede all other declarations.
            if code[i].is_ident(src, "func")
                || code[i].is_ident(src, "type")
                || code[i].is_ident(src, "var")
                || code[i].is_ident(src, "const")
            {
                break;
            }
            i += 1;
            continue;
        }
        i += 1;
        let grouped = code.get(i).is_some_and(|t| t.is_punct(src, "("));
        while i < code.len() {
            let tok = code[i];
            if grouped && tok.is_punct(src, ")") {
                break;
            }
            if tok.kind == lexer::TokenKind::Str {
                if let Some(path) = lexer::unquote(tok.text(src)) {
                    if path != "C" {
                        paths.push(path);
                    }
                }
                if !grouped {
                    break;
                }
            }
            i += 1;
        }
        i += 1;
    }
    paths
}

/// Preambles of files with `//export` end up in a header included by two
/// translation units, so they must not define anything.
fn check_declarations_only(
    path: &Path,
    src: &str,
    preamble: &Preamble,
) -> Result<(), PreambleError> {
    let definition = Regex::new(r"\)\s*\{").map_err(|e| {
        PreambleError::new(path, src, preamble.first_line, (0, 0), e.to_string())
    })?;
    if let Some(m) = definition.find(&preamble.text) {
        let line = preamble.first_line + preamble.text[..m.start()].matches('\n').count();
        let offset = line_offset(src, line);
        return Err(PreambleError::new(
            path,
            src,
            line,
            (offset, 0),
            "preamble of a file with //export must only contain declarations",
        ));
    }
    Ok(())
}

fn line_offset(src: &str, line: usize) -> usize {
    src.split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file() {
        let src = "package answer\n\n\
                   import \"fmt\"\n\n\
                   // int answer() { return 42; }\n\
                   import \"C\"\n\n\
                   func Print() { fmt.Println(C.answer()) }\n";
        let file = SourceFile::parse(Path::new("answer.go"), src.to_string()).unwrap();
        assert_eq!(file.package, "answer");
        assert_eq!(file.imports, vec!["fmt"]);
        assert!(file.uses_bridge());
        assert_eq!(file.references.len(), 1);
        assert_eq!(file.references[0].context, RefContext::Call);
        assert_eq!(file.stem(), "answer");
    }

    #[test]
    fn test_grouped_imports() {
        let src = "package x\nimport (\n\t\"os\"\n\tstr \"strings\"\n\t\"C\"\n)\n";
        let file = SourceFile::parse(Path::new("x.go"), src.to_string()).unwrap();
        assert_eq!(file.imports, vec!["os", "strings"]);
    }

    #[test]
    fn test_no_bridge_means_no_references() {
        let src = "package x\nfunc f() { C.puts() }\n";
        let file = SourceFile::parse(Path::new("x.go"), src.to_string()).unwrap();
        assert!(file.references.is_empty());
    }

    #[test]
    fn test_export_with_definition_in_preamble() {
        let src = "package x\n\n\
                   // #include <stdio.h>\n\
                   // static void hello() { puts(\"hi\"); }\n\
                   import \"C\"\n\n\
                   //export Callback\n\
                   func Callback() {}\n";
        let err = SourceFile::parse(Path::new("x.go"), src.to_string()).unwrap_err();
        match err {
            BridgeError::Preamble(e) => assert_eq!(e.line, 4),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_export_with_declarations_only() {
        let src = "package x\n\n\
                   // extern void Callback(void);\n\
                   import \"C\"\n\n\
                   //export Callback\n\
                   func Callback() {}\n";
        let file = SourceFile::parse(Path::new("x.go"), src.to_string()).unwrap();
        assert_eq!(file.exports.len(), 1);
    }

    #[test]
    fn test_first_referencing_file_owns_a_name() {
        let a = "package x\n// #include <stdio.h>\nimport \"C\"\nfunc a() { C.puts(C.CString(\"a\")) }\n";
        let b = "package x\n// #include <stdlib.h>\nimport \"C\"\nfunc b() { C.puts(nil); C.free(nil) }\n";
        let files = vec![
            SourceFile::parse(Path::new("a.go"), a.to_string()).unwrap(),
            SourceFile::parse(Path::new("b.go"), b.to_string()).unwrap(),
        ];
        let owners = owner_files(&files);
        assert_eq!(owners.get("puts"), Some(&0));
        assert_eq!(owners.get("free"), Some(&1));
        assert!(!owners.contains_key("CString"));
    }

    #[test]
    fn test_missing_package_clause() {
        assert!(SourceFile::parse(Path::new("x.go"), "func f() {}".to_string()).is_err());
    }
}
