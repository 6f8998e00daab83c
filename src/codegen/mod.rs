//! Stub generation.
//!
//! Turns a package's parsed files and resolved identifiers into the
//! generated managed and native sources:
//!
//! - `<stem>.cgo1.go`: the file with `C.name` rewritten to generated names
//! - `_cgo_gotypes.go`: type, constant and variable declarations plus one
//!   trampoline per called function
//! - `<stem>.cgo2.c`: the preamble and the native wrappers the file owns
//! - `_cgo_export.h` / `_cgo_export.c`: exported functions
//! - `_cgo_main.c`: a dummy main used to link the dynimport probe binary

pub mod bridge;
pub mod export;
pub mod gotypes;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{bail, Result};

pub use bridge::{ArgDescriptor, BridgeFunction, VariableBridge};
pub use export::{export_type, ExportBridge, ExportType};
pub use gotypes::TypeMapper;

use crate::core::ctype::{CType, ConstValue};
use crate::core::ident::{ForeignIdentifier, Resolved, CONVERSION_HELPERS};
use crate::core::package::StubSymbol;
use crate::frontend::{owner_files, RefContext, SourceFile};
use crate::util::hash::{bridge_hash, Fingerprint};

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

/// Everything generated for one package.
#[derive(Debug, Clone, Default)]
pub struct GeneratedPackage {
    pub files: Vec<GeneratedFile>,
    /// Native symbols the managed side references; expected to be
    /// satisfied by the package's own host objects.
    pub static_imports: Vec<String>,
    /// Managed entry points exported to native code.
    pub exports: Vec<String>,
    /// Every generated native symbol with its content hash.
    pub stubs: Vec<StubSymbol>,
    pub functions: Vec<BridgeFunction>,
}

impl GeneratedPackage {
    pub fn file(&self, name: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// Input to [`generate`].
pub struct PackageInput<'a> {
    pub package: &'a str,
    /// Files in path order
    pub files: &'a [SourceFile],
    /// Every referenced name, resolved
    pub identifiers: &'a BTreeMap<String, ForeignIdentifier>,
    pub pointer_size: u64,
}

/// Generate the bridge sources for one package.
pub fn generate(input: &PackageInput<'_>) -> Result<GeneratedPackage> {
    check_references(input)?;

    let owners = owner_files(input.files);
    let mut mapper = TypeMapper::new();
    let mut out = GeneratedPackage::default();

    let mut consts: Vec<String> = Vec::new();
    let mut vars: Vec<(usize, VariableBridge)> = Vec::new();
    let mut funcs: Vec<(usize, BridgeFunction)> = Vec::new();

    for (name, ident) in input.identifiers {
        let Some(&owner) = owners.get(name) else {
            continue;
        };
        let preamble = preamble_of(&input.files[owner]);
        let Some(resolved) = &ident.resolved else {
            bail!("C.{} reached code generation without a resolved {}", name, ident.kind);
        };
        match resolved {
            Resolved::Type(ty) => {
                mapper.named(name, ty);
            }
            Resolved::Constant { ty, value } => {
                consts.push(const_decl(name, ty, value)?);
            }
            Resolved::Variable(ty) => {
                let var = VariableBridge::new(name, ty, preamble, &mut mapper);
                out.static_imports.push(var.stub_name());
                out.stubs.push(var.stub_symbol());
                vars.push((owner, var));
            }
            Resolved::Function(func) => {
                let (plain, errno) = call_forms(input.files, name);
                for (used, errno_form) in [(plain, false), (errno, true)] {
                    if !used {
                        continue;
                    }
                    let bridge = BridgeFunction::new(
                        name,
                        func,
                        preamble,
                        errno_form,
                        input.pointer_size,
                        &mut mapper,
                    )?;
                    out.static_imports.push(bridge.stub_name());
                    out.stubs.push(bridge.stub_symbol());
                    funcs.push((owner, bridge));
                }
            }
        }
    }

    let helpers = used_helpers(input.files);
    let malloc = helpers
        .iter()
        .any(|h| h == "CString")
        .then(MallocHelper::new);
    if let Some(m) = &malloc {
        out.static_imports.push(m.stub_name());
        out.stubs.push(m.stub_symbol());
    }

    let lookup = |name: &str| match input.identifiers.get(name)?.resolved.as_ref()? {
        Resolved::Type(ty) => Some(ty.clone()),
        _ => None,
    };
    let mut exports = Vec::new();
    for file in input.files {
        for func in &file.exports {
            let bridge = ExportBridge::new(
                func,
                preamble_of(file),
                input.pointer_size,
                &lookup,
            )?;
            out.exports.push(bridge.stub_name());
            out.stubs.push(bridge.stub_symbol());
            exports.push(bridge);
        }
    }

    for file in input.files {
        out.files.push(GeneratedFile {
            name: format!("{}.cgo1.go", file.stem()),
            contents: rewrite_file(file, input.identifiers),
        });
    }
    for (i, file) in input.files.iter().enumerate() {
        if !file.uses_bridge() {
            continue;
        }
        let owned_funcs: Vec<&BridgeFunction> = funcs
            .iter()
            .filter(|(o, _)| *o == i)
            .map(|(_, f)| f)
            .collect();
        let owned_vars: Vec<&VariableBridge> = vars
            .iter()
            .filter(|(o, _)| *o == i)
            .map(|(_, v)| v)
            .collect();
        out.files.push(GeneratedFile {
            name: format!("{}.cgo2.c", file.stem()),
            contents: native_source(file, &owned_funcs, &owned_vars),
        });
    }

    // Helper conversions need these even when the package never names them.
    if helpers.iter().any(|h| h != "GoBytes") {
        mapper.named("char", &builtin_int("char", 1, true));
    }
    if helpers.iter().any(|h| h == "GoStringN" || h == "GoBytes") {
        mapper.named("int", &builtin_int("int", 4, true));
    }

    out.files.push(GeneratedFile {
        name: "_cgo_gotypes.go".to_string(),
        contents: managed_declarations(
            input.package,
            &mapper,
            &consts,
            &vars,
            &funcs,
            &helpers,
            malloc.as_ref(),
            &exports,
        ),
    });

    let export_files: Vec<&SourceFile> = input
        .files
        .iter()
        .filter(|f| !f.exports.is_empty())
        .collect();
    out.files.push(GeneratedFile {
        name: "_cgo_export.h".to_string(),
        contents: export_header(&export_files, &exports, input.pointer_size),
    });
    out.files.push(GeneratedFile {
        name: "_cgo_export.c".to_string(),
        contents: export_source(&exports, malloc.as_ref()),
    });
    out.files.push(GeneratedFile {
        name: "_cgo_main.c".to_string(),
        contents: dummy_main(&exports),
    });

    out.functions = funcs.into_iter().map(|(_, f)| f).collect();
    tracing::info!(
        "generated {} bridge(s), {} export(s) for package {}",
        out.functions.len(),
        exports.len(),
        input.package
    );
    Ok(out)
}

fn preamble_of(file: &SourceFile) -> &str {
    file.preamble().map(|p| p.text.as_str()).unwrap_or("")
}

fn builtin_int(name: &str, size: u64, signed: bool) -> CType {
    CType::Int {
        name: name.to_string(),
        size,
        signed,
    }
}

/// Reject uses that do not match the identifier's kind.
fn check_references(input: &PackageInput<'_>) -> Result<()> {
    let mut problems = Vec::new();
    for file in input.files {
        for r in &file.references {
            let at = format!("{}:{}", file.path.display(), r.line);
            if CONVERSION_HELPERS.contains(&r.name.as_str()) {
                if r.context == RefContext::Expr {
                    problems.push(format!("{}: must call C.{}", at, r.name));
                }
                continue;
            }
            let Some(ident) = input.identifiers.get(&r.name) else {
                problems.push(format!("{}: C.{} was never resolved", at, r.name));
                continue;
            };
            let problem = match (ident.resolved.as_ref(), r.context) {
                (Some(Resolved::Function(_)), RefContext::Expr) => {
                    Some(format!("must call C.{}", r.name))
                }
                (Some(Resolved::Variable(_)), RefContext::Call | RefContext::CallErrno) => {
                    Some(format!("call of non-function C.{}", r.name))
                }
                (Some(Resolved::Constant { .. }), RefContext::Call | RefContext::CallErrno) => {
                    Some(format!("call of non-function C.{}", r.name))
                }
                (Some(Resolved::Type(_)), RefContext::CallErrno) => {
                    Some(format!("conversion to C.{} returns a single value", r.name))
                }
                (None, _) => Some(format!("C.{} has no resolved layout", r.name)),
                _ => None,
            };
            if let Some(p) = problem {
                problems.push(format!("{}: {}", at, p));
            }
        }
    }
    if !problems.is_empty() {
        bail!("invalid use of C identifiers:\n  {}", problems.join("\n  "));
    }
    Ok(())
}

/// Whether `name` is called in plain form and/or in errno form.
fn call_forms(files: &[SourceFile], name: &str) -> (bool, bool) {
    let mut plain = false;
    let mut errno = false;
    for r in files.iter().flat_map(|f| &f.references) {
        if r.name == name {
            match r.context {
                RefContext::Call => plain = true,
                RefContext::CallErrno => errno = true,
                RefContext::Expr => {}
            }
        }
    }
    (plain, errno)
}

fn used_helpers(files: &[SourceFile]) -> Vec<String> {
    CONVERSION_HELPERS
        .iter()
        .filter(|h| {
            files
                .iter()
                .flat_map(|f| &f.references)
                .any(|r| r.name == **h)
        })
        .map(|h| h.to_string())
        .collect()
}

/// Name that replaces `C.name` at a use site.
fn replacement(name: &str, context: RefContext, ident: Option<&ForeignIdentifier>) -> String {
    if CONVERSION_HELPERS.contains(&name) {
        return format!("_Cfunc_{}", name);
    }
    match ident.and_then(|i| i.resolved.as_ref()) {
        Some(Resolved::Function(_)) if context == RefContext::CallErrno => {
            format!("_C2func_{}", name)
        }
        Some(Resolved::Function(_)) => format!("_Cfunc_{}", name),
        Some(Resolved::Variable(_)) => format!("(*_Cvar_{})", name),
        Some(Resolved::Constant { .. }) => format!("_Cconst_{}", name),
        _ => format!("_Ctype_{}", name),
    }
}

/// The managed file with the foreign import removed and every `C.name`
/// replaced. Newlines are kept so line numbers still match.
pub fn rewrite_file(file: &SourceFile, identifiers: &BTreeMap<String, ForeignIdentifier>) -> String {
    let src = file.source.as_str();
    let mut edits: Vec<((usize, usize), String)> = Vec::new();
    if let Some(import) = &file.bridge {
        let (start, end) = import.span;
        let blank: String = src[start..end]
            .chars()
            .map(|c| if c == '\n' { '\n' } else { ' ' })
            .collect();
        edits.push((import.span, blank));
    }
    for r in &file.references {
        edits.push((r.span, replacement(&r.name, r.context, identifiers.get(&r.name))));
    }
    edits.sort_by_key(|(span, _)| span.0);

    let mut out = format!("//line {}:1\n", file.path.display());
    let mut pos = 0;
    for ((start, end), text) in edits {
        if start < pos {
            continue;
        }
        out.push_str(&src[pos..start]);
        out.push_str(&text);
        pos = end;
    }
    out.push_str(&src[pos..]);
    out
}

fn const_decl(name: &str, ty: &CType, value: &ConstValue) -> Result<String> {
    let text = match value {
        ConstValue::Int(v) if ty.is_signed() => v.to_string(),
        ConstValue::Int(v) => (*v as u64).to_string(),
        ConstValue::Float(f) if f.is_finite() => format!("{:?}", f),
        ConstValue::Float(f) => bail!("C.{} has non-finite value {}", name, f),
        ConstValue::Str(s) => quote(s),
    };
    Ok(format!("const _Cconst_{} = {}", name, text))
}

/// Managed-language string literal.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for b in s.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(b as char),
            other => {
                let _ = write!(out, "\\x{:02x}", other);
            }
        }
    }
    out.push('"');
    out
}

/// Native allocator bridge backing `C.CString`.
struct MallocHelper {
    hash: String,
    content: String,
}

impl MallocHelper {
    const SIGNATURE: &'static str = "_CMalloc void*(unsigned long long)";

    fn new() -> Self {
        let mut fp = Fingerprint::new();
        fp.update_str("").update_str(Self::SIGNATURE);
        MallocHelper {
            hash: bridge_hash("", Self::SIGNATURE),
            content: fp.finish(),
        }
    }

    fn stub_name(&self) -> String {
        format!("_cgo_{}_Cfunc__CMalloc", self.hash)
    }

    fn stub_symbol(&self) -> StubSymbol {
        StubSymbol {
            name: self.stub_name(),
            content: self.content.clone(),
        }
    }

    fn c_source(&self) -> String {
        format!(
            "void\n{}(void *v)\n{{\n\
             \tstruct {{\n\
             \t\tunsigned long long p0;\n\
             \t\tvoid *r1;\n\
             \t}} __attribute__((__packed__)) *a = v;\n\
             \tvoid *ret = malloc(a->p0 == 0 ? 1 : a->p0);\n\
             \tif (ret == 0)\n\
             \t\tabort();\n\
             \ta->r1 = ret;\n\
             }}\n",
            self.stub_name()
        )
    }

    fn managed_source(&self) -> String {
        let stub = self.stub_name();
        format!(
            "//go:cgo_import_static {stub}\n\
             //go:linkname __cgofn_{stub} {stub}\n\
             var __cgofn_{stub} byte\n\
             var {stub} = unsafe.Pointer(&__cgofn_{stub})\n\
             \n\
             //go:cgo_unsafe_args\n\
             func _cgo_cmalloc(p0 uint64) (r1 unsafe.Pointer) {{\n\
             \t_cgo_runtime_cgocall({stub}, uintptr(unsafe.Pointer(&p0)))\n\
             \treturn\n\
             }}\n",
            stub = stub
        )
    }
}

fn helper_source(helper: &str) -> &'static str {
    match helper {
        "CString" => {
            "func _Cfunc_CString(s string) *_Ctype_char {\n\
             \tp := _cgo_cmalloc(uint64(len(s) + 1))\n\
             \tpp := (*[1 << 30]byte)(p)\n\
             \tcopy(pp[:], s)\n\
             \tpp[len(s)] = 0\n\
             \treturn (*_Ctype_char)(p)\n\
             }\n"
        }
        "GoString" => {
            "//go:linkname _cgo_runtime_gostring runtime.gostring\n\
             func _cgo_runtime_gostring(*_Ctype_char) string\n\
             \n\
             func _Cfunc_GoString(p *_Ctype_char) string {\n\
             \treturn _cgo_runtime_gostring(p)\n\
             }\n"
        }
        "GoStringN" => {
            "//go:linkname _cgo_runtime_gostringn runtime.gostringn\n\
             func _cgo_runtime_gostringn(*_Ctype_char, int) string\n\
             \n\
             func _Cfunc_GoStringN(p *_Ctype_char, l _Ctype_int) string {\n\
             \treturn _cgo_runtime_gostringn(p, int(l))\n\
             }\n"
        }
        "GoBytes" => {
            "//go:linkname _cgo_runtime_gobytes runtime.gobytes\n\
             func _cgo_runtime_gobytes(unsafe.Pointer, int) []byte\n\
             \n\
             func _Cfunc_GoBytes(p unsafe.Pointer, l _Ctype_int) []byte {\n\
             \treturn _cgo_runtime_gobytes(p, int(l))\n\
             }\n"
        }
        _ => "",
    }
}

#[allow(clippy::too_many_arguments)]
fn managed_declarations(
    package: &str,
    mapper: &TypeMapper,
    consts: &[String],
    vars: &[(usize, VariableBridge)],
    funcs: &[(usize, BridgeFunction)],
    helpers: &[String],
    malloc: Option<&MallocHelper>,
    exports: &[ExportBridge],
) -> String {
    let mut out = String::new();
    out.push_str("// Code generated by cbridge. DO NOT EDIT.\n\n");
    let _ = writeln!(out, "package {}\n", package);
    out.push_str("import \"unsafe\"\n\nimport \"syscall\"\n\nimport _ \"runtime/cgo\"\n\n");
    out.push_str("var _ syscall.Errno\nvar _ unsafe.Pointer\n\n");
    out.push_str(
        "//go:linkname _cgo_runtime_cgocall runtime.cgocall\n\
         func _cgo_runtime_cgocall(unsafe.Pointer, uintptr) int32\n\n",
    );
    if !exports.is_empty() {
        out.push_str(
            "//go:linkname _cgo_runtime_cgocallback runtime.cgocallback\n\
             func _cgo_runtime_cgocallback(unsafe.Pointer, unsafe.Pointer, uintptr)\n\n",
        );
    }

    for decl in mapper.declarations() {
        let _ = writeln!(out, "{}\n", decl);
    }
    for c in consts {
        let _ = writeln!(out, "{}", c);
    }
    if !consts.is_empty() {
        out.push('\n');
    }
    for (_, var) in vars {
        let _ = writeln!(out, "{}", var.managed_declaration());
    }
    for (_, func) in funcs {
        let _ = writeln!(out, "{}", func.managed_trampoline());
    }
    if let Some(m) = malloc {
        let _ = writeln!(out, "{}", m.managed_source());
    }
    for helper in helpers {
        let _ = writeln!(out, "{}", helper_source(helper));
    }
    for export in exports {
        let _ = writeln!(out, "{}", export.managed_entry());
    }
    out
}

fn native_source(
    file: &SourceFile,
    funcs: &[&BridgeFunction],
    vars: &[&VariableBridge],
) -> String {
    let mut out = String::new();
    if let Some(preamble) = file.preamble() {
        out.push_str(&preamble.with_line_marker(&file.path));
        if !out.ends_with('\n') && !out.is_empty() {
            out.push('\n');
        }
    }
    let _ = writeln!(out, "\n#line 1 \"cgo-generated-wrappers\"");
    out.push_str("#include <stdlib.h>\n#include <string.h>\n");
    if funcs.iter().any(|f| f.errno) {
        out.push_str("#include <errno.h>\n");
    }
    out.push('\n');
    for var in vars {
        out.push_str(&var.c_definition());
    }
    if !vars.is_empty() {
        out.push('\n');
    }
    for func in funcs {
        let _ = writeln!(out, "{}", func.c_wrapper());
    }
    out
}

fn export_header(files: &[&SourceFile], exports: &[ExportBridge], pointer_size: u64) -> String {
    let mut out = String::new();
    out.push_str("/* Code generated by cbridge. DO NOT EDIT. */\n\n");
    out.push_str("#include <stddef.h>\n\n");
    out.push_str("/* Start of preamble from import \"C\" comments. */\n\n");
    for file in files {
        if let Some(preamble) = file.preamble() {
            out.push_str(&preamble.with_line_marker(&file.path));
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    out.push_str("\n/* End of preamble from import \"C\" comments. */\n\n");
    out.push_str(&export::header_prologue(pointer_size));
    out.push_str("\n#ifdef __cplusplus\nextern \"C\" {\n#endif\n\n");
    for export in exports {
        out.push_str(&export.header_decl());
    }
    out.push_str("\n#ifdef __cplusplus\n}\n#endif\n");
    out
}

fn export_source(exports: &[ExportBridge], malloc: Option<&MallocHelper>) -> String {
    let mut out = String::new();
    out.push_str("/* Code generated by cbridge. DO NOT EDIT. */\n\n");
    out.push_str("#include <stdlib.h>\n#include \"_cgo_export.h\"\n\n");
    out.push_str("extern void crosscall2(void (*fn)(void *, int), void *, int);\n\n");
    if let Some(m) = malloc {
        let _ = writeln!(out, "{}", m.c_source());
    }
    for export in exports {
        let _ = writeln!(out, "{}", export.c_trampoline());
    }
    out
}

fn dummy_main(exports: &[ExportBridge]) -> String {
    let mut out = String::new();
    out.push_str(
        "int main() { return 0; }\n\
         void crosscall2(void (*fn)(void *, int), void *a, int c) { }\n\
         void _cgo_allocate(void *a, int c) { }\n\
         void _cgo_panic(void *a, int c) { }\n\
         void _cgo_reginit(void) { }\n",
    );
    for export in exports {
        let _ = writeln!(out, "void {}(void *a, int c) {{ }}", export.stub_name());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ctype::FuncType;
    use std::path::Path;

    fn int() -> CType {
        builtin_int("int", 4, true)
    }

    fn char_ptr() -> CType {
        CType::Pointer {
            pointee: Box::new(builtin_int("char", 1, true)),
            size: 8,
        }
    }

    fn resolved(name: &str, r: Resolved) -> (String, ForeignIdentifier) {
        let mut ident = ForeignIdentifier::new(name);
        ident.assign_resolution(r);
        (name.to_string(), ident)
    }

    fn puts() -> Resolved {
        Resolved::Function(FuncType {
            params: vec![char_ptr()],
            result: Box::new(int()),
            variadic: false,
        })
    }

    fn parse(path: &str, src: &str) -> SourceFile {
        SourceFile::parse(Path::new(path), src.to_string()).unwrap()
    }

    const HELLO: &str = "package hello\n\n\
                         // #include <stdio.h>\n\
                         import \"C\"\n\n\
                         func Hello() { C.puts(C.CString(\"hi\")); _ = C.EOF }\n";

    fn hello_idents() -> BTreeMap<String, ForeignIdentifier> {
        BTreeMap::from([
            resolved("puts", puts()),
            resolved(
                "EOF",
                Resolved::Constant {
                    ty: int(),
                    value: ConstValue::Int(-1),
                },
            ),
        ])
    }

    #[test]
    fn test_generates_every_file() {
        let files = vec![parse("hello.go", HELLO)];
        let idents = hello_idents();
        let pkg = generate(&PackageInput {
            package: "hello",
            files: &files,
            identifiers: &idents,
            pointer_size: 8,
        })
        .unwrap();

        for name in [
            "hello.cgo1.go",
            "hello.cgo2.c",
            "_cgo_gotypes.go",
            "_cgo_export.h",
            "_cgo_export.c",
            "_cgo_main.c",
        ] {
            assert!(pkg.file(name).is_some(), "missing {}", name);
        }

        let cgo1 = &pkg.file("hello.cgo1.go").unwrap().contents;
        assert!(cgo1.starts_with("//line hello.go:1\n"));
        assert!(cgo1.contains("_Cfunc_puts(_Cfunc_CString(\"hi\"))"));
        assert!(cgo1.contains("_ = _Cconst_EOF"));
        assert!(!cgo1.contains("import \"C\""));
        assert_eq!(cgo1.lines().count(), HELLO.lines().count() + 1);

        let types = &pkg.file("_cgo_gotypes.go").unwrap().contents;
        assert!(types.contains("package hello"));
        assert!(types.contains("const _Cconst_EOF = -1"));
        assert!(types.contains("func _Cfunc_puts(p0 *_Ctype_char) (r1 _Ctype_int)"));
        assert!(types.contains("func _Cfunc_CString(s string) *_Ctype_char"));
        assert!(types.contains("type _Ctype_char int8"));

        let native = &pkg.file("hello.cgo2.c").unwrap().contents;
        assert!(native.contains("#line 3 \"hello.go\"\n #include <stdio.h>"));
        assert!(native.contains("puts((void*)a->p0)"));

        let export_c = &pkg.file("_cgo_export.c").unwrap().contents;
        assert!(export_c.contains("_Cfunc__CMalloc(void *v)"));

        assert_eq!(pkg.functions.len(), 1);
        assert_eq!(pkg.static_imports.len(), 2);
        assert!(pkg.exports.is_empty());
    }

    #[test]
    fn test_same_declaration_in_two_packages_shares_a_stub_name() {
        let a = vec![parse("a.go", "package a\n// #include <stdio.h>\nimport \"C\"\nfunc f() { C.puts(nil) }\n")];
        let b = vec![parse("b.go", "package b\n// #include <stdio.h>\nimport \"C\"\nfunc g() { C.puts(nil) }\n")];
        let c = vec![parse("c.go", "package c\n// #include <stdio.h>\n// #include <stdlib.h>\nimport \"C\"\nfunc h() { C.puts(nil) }\n")];
        let idents = BTreeMap::from([resolved("puts", puts())]);
        let gen = |files: &[SourceFile], package: &str| {
            generate(&PackageInput {
                package,
                files,
                identifiers: &idents,
                pointer_size: 8,
            })
            .unwrap()
            .static_imports
        };
        assert_eq!(gen(&a, "a"), gen(&b, "b"));
        assert_ne!(gen(&a, "a"), gen(&c, "c"));
    }

    #[test]
    fn test_function_must_be_called() {
        let files = vec![parse(
            "f.go",
            "package f\n// #include <stdio.h>\nimport \"C\"\nvar p = C.puts\n",
        )];
        let idents = BTreeMap::from([resolved("puts", puts())]);
        let err = generate(&PackageInput {
            package: "f",
            files: &files,
            identifiers: &idents,
            pointer_size: 8,
        })
        .unwrap_err();
        assert!(err.to_string().contains("must call C.puts"));
    }

    #[test]
    fn test_errno_form_and_variable() {
        let src = "package f\n// #include <errno.h>\nimport \"C\"\n\
                   func f() { n, err := C.puts(nil); C.counter = 1; _, _ = n, err }\n";
        let files = vec![parse("f.go", src)];
        let idents = BTreeMap::from([
            resolved("puts", puts()),
            resolved("counter", Resolved::Variable(int())),
        ]);
        let pkg = generate(&PackageInput {
            package: "f",
            files: &files,
            identifiers: &idents,
            pointer_size: 8,
        })
        .unwrap();
        let cgo1 = &pkg.file("f.cgo1.go").unwrap().contents;
        assert!(cgo1.contains("n, err := _C2func_puts(nil)"));
        assert!(cgo1.contains("(*_Cvar_counter) = 1"));
        let native = &pkg.file("f.cgo2.c").unwrap().contents;
        assert!(native.contains("#include <errno.h>\n"));
        assert!(native.contains("_Cvar_counter = &counter;"));
        assert!(pkg.functions.iter().all(|f| f.errno));
    }

    #[test]
    fn test_exports_reach_header_and_main() {
        let src = "package cb\n// #include <stdint.h>\nimport \"C\"\n\n\
                   //export Add\nfunc Add(a, b int) int { return a + b }\n";
        let files = vec![parse("cb.go", src)];
        let idents = BTreeMap::new();
        let pkg = generate(&PackageInput {
            package: "cb",
            files: &files,
            identifiers: &idents,
            pointer_size: 8,
        })
        .unwrap();
        let header = &pkg.file("_cgo_export.h").unwrap().contents;
        assert!(header.contains("#include <stdint.h>"));
        assert!(header.contains("extern GoInt Add(GoInt a, GoInt b);"));
        let main = &pkg.file("_cgo_main.c").unwrap().contents;
        assert!(main.contains(&format!("void {}(void *a, int c) {{ }}", pkg.exports[0])));
        assert!(pkg.file("_cgo_gotypes.go").unwrap().contents.contains("fn := Add"));
    }

    #[test]
    fn test_const_text() {
        let ulong = builtin_int("unsigned long", 8, false);
        assert_eq!(
            const_decl("MAX", &ulong, &ConstValue::Int(-1)).unwrap(),
            "const _Cconst_MAX = 18446744073709551615"
        );
        let dbl = CType::Float {
            name: "double".to_string(),
            size: 8,
        };
        assert_eq!(
            const_decl("PI", &dbl, &ConstValue::Float(3.0)).unwrap(),
            "const _Cconst_PI = 3.0"
        );
        assert_eq!(quote("a\"b\n\x01"), "\"a\\\"b\\n\\x01\"");
    }
}
