//! Managed functions exported to native callers (`//export`).
//!
//! Produces the declarations header, the native reverse trampolines in
//! `_cgo_export.c`, and the managed entry points they call into.

use std::fmt::Write as _;

use anyhow::{bail, Result};

use crate::core::ctype::CType;
use crate::core::ident::c_spelling_of;
use crate::core::layout::{FrameLayout, SlotSpec};
use crate::core::package::StubSymbol;
use crate::frontend::ExportedFunc;
use crate::util::hash::{bridge_hash, Fingerprint};

/// C view of a managed type: spelling, size and alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportType {
    pub c_type: String,
    pub size: u64,
    pub align: u64,
}

impl ExportType {
    fn new(c_type: impl Into<String>, size: u64, align: u64) -> Self {
        ExportType {
            c_type: c_type.into(),
            size,
            align,
        }
    }
}

/// Map a managed parameter type to C.
///
/// `lookup` resolves `C.name` references to their native type.
pub fn export_type(
    managed: &str,
    pointer_size: u64,
    lookup: &dyn Fn(&str) -> Option<CType>,
) -> Result<ExportType> {
    let word = pointer_size;
    let t = match managed {
        "int" => ExportType::new("GoInt", word, word),
        "uint" => ExportType::new("GoUint", word, word),
        "uintptr" => ExportType::new("GoUintptr", word, word),
        "int8" => ExportType::new("GoInt8", 1, 1),
        "uint8" | "byte" | "bool" => ExportType::new("GoUint8", 1, 1),
        "int16" => ExportType::new("GoInt16", 2, 2),
        "uint16" => ExportType::new("GoUint16", 2, 2),
        "int32" | "rune" => ExportType::new("GoInt32", 4, 4),
        "uint32" => ExportType::new("GoUint32", 4, 4),
        "int64" => ExportType::new("GoInt64", 8, 8.min(word)),
        "uint64" => ExportType::new("GoUint64", 8, 8.min(word)),
        "float32" => ExportType::new("GoFloat32", 4, 4),
        "float64" => ExportType::new("GoFloat64", 8, 8.min(word)),
        "complex64" => ExportType::new("GoComplex64", 8, 4),
        "complex128" => ExportType::new("GoComplex128", 16, 8.min(word)),
        "string" => ExportType::new("GoString", 2 * word, word),
        "unsafe.Pointer" => ExportType::new("void*", word, word),
        "error" | "any" | "interface{}" => ExportType::new("GoInterface", 2 * word, word),
        t if t.starts_with("[]") => ExportType::new("GoSlice", 3 * word, word),
        t if t.starts_with("map[") => ExportType::new("GoMap", word, word),
        t if t.starts_with("chan ") || t.starts_with("<-chan") => {
            ExportType::new("GoChan", word, word)
        }
        t if t.starts_with("*C.") => {
            let name = &t[3..];
            ExportType::new(format!("{}*", c_spelling_of(name)), word, word)
        }
        t if t.starts_with('*') => ExportType::new("void*", word, word),
        t if t.starts_with("C.") => {
            let name = &t[2..];
            let Some(ty) = lookup(name) else {
                bail!("exported function uses unresolved type {}", t);
            };
            let spelling = ty.c_spelling().unwrap_or_else(|| c_spelling_of(name));
            ExportType::new(spelling, ty.size(), ty.align())
        }
        other => bail!("type {} cannot be used in an exported function", other),
    };
    Ok(t)
}

/// One exported managed function.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBridge {
    pub func: ExportedFunc,
    pub params: Vec<(String, ExportType)>,
    pub results: Vec<ExportType>,
    pub frame: FrameLayout,
    hash: String,
    content: String,
}

impl ExportBridge {
    pub fn new(
        func: &ExportedFunc,
        preamble: &str,
        pointer_size: u64,
        lookup: &dyn Fn(&str) -> Option<CType>,
    ) -> Result<Self> {
        let mut params = Vec::with_capacity(func.params.len());
        for (i, p) in func.params.iter().enumerate() {
            let ty = export_type(&p.ty, pointer_size, lookup)
                .map_err(|e| anyhow::anyhow!("//export {}: {}", func.name, e))?;
            let name = p.name.clone().unwrap_or_else(|| format!("p{}", i));
            params.push((name, ty));
        }
        let mut results = Vec::with_capacity(func.results.len());
        for r in &func.results {
            let ty = export_type(&r.ty, pointer_size, lookup)
                .map_err(|e| anyhow::anyhow!("//export {}: {}", func.name, e))?;
            results.push(ty);
        }

        let param_specs: Vec<SlotSpec> = params
            .iter()
            .enumerate()
            .map(|(i, (_, t))| SlotSpec::new(format!("p{}", i), t.size, t.align))
            .collect();
        let result_specs: Vec<SlotSpec> = results
            .iter()
            .enumerate()
            .map(|(i, t)| SlotSpec::new(format!("r{}", i), t.size, t.align))
            .collect();
        let frame = FrameLayout::new(&param_specs, &result_specs, pointer_size);

        let signature = format!("export {}{}", func.name, prototype_key(&params, &results));
        let mut fp = Fingerprint::new();
        fp.update_str(preamble).update_str(&signature);

        Ok(ExportBridge {
            func: func.clone(),
            params,
            results,
            frame,
            hash: bridge_hash(preamble, &signature),
            content: fp.finish(),
        })
    }

    /// Managed entry point called by the reverse trampoline.
    pub fn stub_name(&self) -> String {
        format!("_cgoexp_{}_{}", self.hash, self.func.name)
    }

    pub fn stub_symbol(&self) -> StubSymbol {
        StubSymbol {
            name: self.stub_name(),
            content: self.content.clone(),
        }
    }

    fn return_type(&self) -> String {
        match self.results.as_slice() {
            [] => "void".to_string(),
            [single] => single.c_type.clone(),
            _ => format!("struct {}_return", self.func.name),
        }
    }

    /// Prototype for the header.
    pub fn prototype(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, t)| format!("{} {}", t.c_type, name))
            .collect();
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };
        format!("{} {}({})", self.return_type(), self.func.name, params)
    }

    /// Header text for this function: optional return struct plus prototype.
    pub fn header_decl(&self) -> String {
        let mut out = String::new();
        if self.results.len() > 1 {
            let _ = writeln!(out, "/* Return type for {} */", self.func.name);
            let _ = writeln!(out, "struct {}_return {{", self.func.name);
            for (i, r) in self.results.iter().enumerate() {
                let _ = writeln!(out, "\t{} r{};", r.c_type, i);
            }
            out.push_str("};\n");
        }
        let _ = writeln!(out, "extern {};", self.prototype());
        out
    }

    /// Reverse trampoline: pack the frame and call into the managed side.
    pub fn c_trampoline(&self) -> String {
        let mut fields: Vec<(u64, String)> = Vec::new();
        for (i, (_, t)) in self.params.iter().enumerate() {
            let offset = self.frame.params[i].offset;
            fields.push((offset, format!("{} p{};", t.c_type, i)));
        }
        for (i, t) in self.results.iter().enumerate() {
            let offset = self.frame.results[i].offset;
            fields.push((offset, format!("{} r{};", t.c_type, i)));
        }
        for (offset, len) in self.frame.padding() {
            fields.push((offset, format!("char __pad{}[{}];", offset, len)));
        }
        fields.sort_by_key(|(offset, _)| *offset);

        let mut out = String::new();
        let _ = writeln!(out, "extern void {}(void *, int);\n", self.stub_name());
        let _ = writeln!(out, "{}\n{{", self.prototype());
        out.push_str("\tstruct {\n");
        for (_, field) in fields {
            let _ = writeln!(out, "\t\t{}", field);
        }
        out.push_str("\t} __attribute__((__packed__)) a;\n");
        for (i, (name, _)) in self.params.iter().enumerate() {
            let _ = writeln!(out, "\ta.p{} = {};", i, name);
        }
        let _ = writeln!(
            out,
            "\tcrosscall2({}, &a, {});",
            self.stub_name(),
            self.frame.size
        );
        match self.results.len() {
            0 => {}
            1 => out.push_str("\treturn a.r0;\n"),
            n => {
                let _ = writeln!(out, "\t{} r;", self.return_type());
                for i in 0..n {
                    let _ = writeln!(out, "\tr.r{} = a.r{};", i, i);
                }
                out.push_str("\treturn r;\n");
            }
        }
        out.push_str("}\n");
        out
    }

    /// Managed entry point with its export pragmas.
    pub fn managed_entry(&self) -> String {
        let stub = self.stub_name();
        format!(
            "//go:cgo_export_dynamic {stub}\n\
             //go:linkname {stub} {stub}\n\
             //go:cgo_export_static {stub}\n\
             //go:nosplit\n\
             func {stub}(a unsafe.Pointer, n int32) {{\n\
             \tfn := {name}\n\
             \t_cgo_runtime_cgocallback(**(**unsafe.Pointer)(unsafe.Pointer(&fn)), a, uintptr(n))\n\
             }}\n",
            stub = stub,
            name = self.func.name
        )
    }
}

fn prototype_key(params: &[(String, ExportType)], results: &[ExportType]) -> String {
    let params: Vec<&str> = params.iter().map(|(_, t)| t.c_type.as_str()).collect();
    let results: Vec<&str> = results.iter().map(|t| t.c_type.as_str()).collect();
    format!("({}) ({})", params.join(","), results.join(","))
}

/// Fixed typedefs every export header starts with.
pub fn header_prologue(pointer_size: u64) -> String {
    let (int, uint) = if pointer_size == 8 {
        ("GoInt64", "GoUint64")
    } else {
        ("GoInt32", "GoUint32")
    };
    format!(
        "#ifndef GO_CGO_PROLOGUE_H\n\
         #define GO_CGO_PROLOGUE_H\n\
         \n\
         typedef signed char GoInt8;\n\
         typedef unsigned char GoUint8;\n\
         typedef short GoInt16;\n\
         typedef unsigned short GoUint16;\n\
         typedef int GoInt32;\n\
         typedef unsigned int GoUint32;\n\
         typedef long long GoInt64;\n\
         typedef unsigned long long GoUint64;\n\
         typedef {int} GoInt;\n\
         typedef {uint} GoUint;\n\
         typedef __SIZE_TYPE__ GoUintptr;\n\
         typedef float GoFloat32;\n\
         typedef double GoFloat64;\n\
         typedef struct {{ float re, im; }} GoComplex64;\n\
         typedef struct {{ double re, im; }} GoComplex128;\n\
         \n\
         typedef struct {{ const char *p; GoInt n; }} GoString;\n\
         typedef void *GoMap;\n\
         typedef void *GoChan;\n\
         typedef struct {{ void *t; void *v; }} GoInterface;\n\
         typedef struct {{ void *data; GoInt len; GoInt cap; }} GoSlice;\n\
         \n\
         #endif\n",
        int = int,
        uint = uint
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ManagedParam;

    fn param(name: Option<&str>, ty: &str) -> ManagedParam {
        ManagedParam {
            name: name.map(str::to_string),
            ty: ty.to_string(),
        }
    }

    fn no_lookup(_: &str) -> Option<CType> {
        None
    }

    fn func(name: &str, params: Vec<ManagedParam>, results: Vec<ManagedParam>) -> ExportedFunc {
        ExportedFunc {
            name: name.to_string(),
            params,
            results,
            line: 1,
        }
    }

    #[test]
    fn test_single_result_prototype() {
        let f = func(
            "MyFunction",
            vec![
                param(Some("arg1"), "int"),
                param(Some("arg2"), "int"),
                param(Some("arg3"), "string"),
            ],
            vec![param(None, "int64")],
        );
        let bridge = ExportBridge::new(&f, "", 8, &no_lookup).unwrap();
        assert_eq!(
            bridge.prototype(),
            "GoInt64 MyFunction(GoInt arg1, GoInt arg2, GoString arg3)"
        );
        assert_eq!(bridge.frame.results[0].offset, 32);
        assert_eq!(bridge.frame.size, 40);
        let c = bridge.c_trampoline();
        assert!(c.contains("\ta.p2 = arg3;\n"));
        assert!(c.contains("crosscall2(_cgoexp_"));
        assert!(c.contains(", &a, 40);"));
        assert!(c.contains("\treturn a.r0;\n"));
    }

    #[test]
    fn test_multiple_results_use_return_struct() {
        let f = func(
            "MyFunction2",
            vec![param(Some("arg1"), "int")],
            vec![param(None, "int64"), param(None, "*C.char")],
        );
        let bridge = ExportBridge::new(&f, "", 8, &no_lookup).unwrap();
        let header = bridge.header_decl();
        assert!(header.contains("struct MyFunction2_return {\n\tGoInt64 r0;\n\tchar* r1;\n};"));
        assert!(header.contains("extern struct MyFunction2_return MyFunction2(GoInt arg1);"));
        assert!(bridge.c_trampoline().contains("\tr.r1 = a.r1;\n"));
    }

    #[test]
    fn test_resolved_c_type_parameter() {
        let lookup = |name: &str| {
            (name == "int").then(|| CType::Int {
                name: "int".to_string(),
                size: 4,
                signed: true,
            })
        };
        let f = func("Cb", vec![param(Some("x"), "C.int")], Vec::new());
        let bridge = ExportBridge::new(&f, "", 8, &lookup).unwrap();
        assert_eq!(bridge.prototype(), "void Cb(int x)");
        assert!(ExportBridge::new(
            &func("Bad", vec![param(Some("x"), "C.nosuch")], Vec::new()),
            "",
            8,
            &lookup
        )
        .is_err());
    }

    #[test]
    fn test_managed_entry_names_the_function() {
        let f = func("Hook", Vec::new(), Vec::new());
        let bridge = ExportBridge::new(&f, "", 8, &no_lookup).unwrap();
        let entry = bridge.managed_entry();
        assert!(entry.contains("fn := Hook"));
        assert!(entry.starts_with("//go:cgo_export_dynamic _cgoexp_"));
        assert_eq!(bridge.prototype(), "void Hook(void)");
    }

    #[test]
    fn test_header_prologue_word_size() {
        assert!(header_prologue(8).contains("typedef GoInt64 GoInt;"));
        assert!(header_prologue(4).contains("typedef GoInt32 GoInt;"));
    }
}
