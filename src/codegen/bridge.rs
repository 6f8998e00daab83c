//! Boundary-crossing functions: one per called foreign function.

use std::fmt::Write as _;

use anyhow::{bail, Result};

use super::gotypes::TypeMapper;
use crate::core::ctype::{CType, FuncType};
use crate::core::layout::{FrameLayout, SlotSpec};
use crate::core::package::StubSymbol;
use crate::util::hash::{bridge_hash, Fingerprint};

/// One argument or the result of a bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgDescriptor {
    /// Field name inside the packed frame (`p0`, `r`)
    pub name: String,
    pub c_type: CType,
    /// C spelling used for the frame field
    pub c_decl: String,
    pub managed: String,
}

/// A generated bridge around a native function.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeFunction {
    /// C name of the wrapped function
    pub name: String,
    /// Whether this is the `(result, errno)` form
    pub errno: bool,
    pub params: Vec<ArgDescriptor>,
    pub result: Option<ArgDescriptor>,
    pub frame: FrameLayout,
    hash: String,
    content: String,
}

impl BridgeFunction {
    /// Build the bridge for `name` as declared by `preamble`.
    pub fn new(
        name: &str,
        func: &FuncType,
        preamble: &str,
        errno: bool,
        pointer_size: u64,
        mapper: &mut TypeMapper,
    ) -> Result<Self> {
        if func.variadic {
            bail!("C.{}: calling variadic C functions is not supported", name);
        }

        let mut params = Vec::with_capacity(func.params.len());
        for (i, ty) in func.params.iter().enumerate() {
            // Fixed-size arrays are passed as a pointer to their first element.
            let ty = match ty.resolve() {
                CType::Array { elem, .. } => CType::Pointer {
                    pointee: elem.clone(),
                    size: pointer_size,
                },
                _ => ty.clone(),
            };
            params.push(descriptor(name, format!("p{}", i), ty, mapper)?);
        }
        let result = if func.result.is_void() {
            None
        } else {
            Some(descriptor(name, "r".to_string(), (*func.result).clone(), mapper)?)
        };

        let specs: Vec<SlotSpec> = params
            .iter()
            .map(|p| SlotSpec::new(&p.name, p.c_type.size(), p.c_type.align()))
            .collect();
        let results: Vec<SlotSpec> = result
            .iter()
            .map(|r| SlotSpec::new(&r.name, r.c_type.size(), r.c_type.align()))
            .collect();
        let frame = FrameLayout::new(&specs, &results, pointer_size);

        let signature = format!("{} {}", name, CType::Func(func.clone()).signature());
        let mut fp = Fingerprint::new();
        fp.update_str(preamble).update_str(&signature);

        Ok(BridgeFunction {
            name: name.to_string(),
            errno,
            params,
            result,
            frame,
            hash: bridge_hash(preamble, &signature),
            content: fp.finish(),
        })
    }

    /// Managed-side name (`_Cfunc_puts`, `_C2func_puts`).
    pub fn managed_name(&self) -> String {
        format!("{}_{}", if self.errno { "_C2func" } else { "_Cfunc" }, self.name)
    }

    /// Native symbol of the wrapper (`_cgo_<hash>_Cfunc_puts`).
    pub fn stub_name(&self) -> String {
        format!("_cgo_{}{}", self.hash, self.managed_name())
    }

    pub fn stub_symbol(&self) -> StubSymbol {
        StubSymbol {
            name: self.stub_name(),
            content: self.content.clone(),
        }
    }

    /// Packed C struct mirroring the frame, with explicit padding.
    pub fn frame_struct(&self, indent: &str) -> String {
        let mut fields: Vec<(u64, String)> = self
            .params
            .iter()
            .chain(self.result.iter())
            .filter_map(|arg| {
                let slot = self.frame.slot(&arg.name)?;
                Some((slot.offset, format!("{} {};", arg.c_decl, arg.name)))
            })
            .collect();
        for (offset, len) in self.frame.padding() {
            fields.push((offset, format!("char __pad{}[{}];", offset, len)));
        }
        fields.sort_by_key(|(offset, _)| *offset);

        let mut out = format!("{}struct {{\n", indent);
        for (_, field) in fields {
            let _ = writeln!(out, "{}\t{}", indent, field);
        }
        let _ = write!(out, "{}}} __attribute__((__packed__))", indent);
        out
    }

    /// The native wrapper: unpack the frame, call, store the result.
    pub fn c_wrapper(&self) -> String {
        let args: Vec<String> = self
            .params
            .iter()
            .map(|p| match p.c_type.resolve() {
                CType::Pointer { .. } => format!("(void*)a->{}", p.name),
                _ => format!("a->{}", p.name),
            })
            .collect();
        let call = format!("{}({})", self.name, args.join(", "));
        let call = match &self.result {
            Some(_) => format!("a->r = {};", call),
            None => format!("{};", call),
        };

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}\n{}(void *v)\n{{",
            if self.errno { "int" } else { "void" },
            self.stub_name()
        );
        if self.errno {
            out.push_str("\tint _cgo_errno;\n");
        }
        let _ = writeln!(out, "{} *a = v;", self.frame_struct("\t"));
        if self.errno {
            let _ = writeln!(out, "\terrno = 0;\n\t{}\n\t_cgo_errno = errno;", call);
            out.push_str("\treturn _cgo_errno;\n");
        } else {
            let _ = writeln!(out, "\t{}", call);
        }
        out.push_str("}\n");
        out
    }

    /// Managed declarations: the wrapper symbol and the trampoline that
    /// hands the frame to the runtime.
    pub fn managed_trampoline(&self) -> String {
        let stub = self.stub_name();
        let mut out = String::new();
        let _ = writeln!(out, "//go:cgo_import_static {}", stub);
        let _ = writeln!(out, "//go:linkname __cgofn_{} {}", stub, stub);
        let _ = writeln!(out, "var __cgofn_{} byte", stub);
        let _ = writeln!(
            out,
            "var {} = unsafe.Pointer(&__cgofn_{})\n",
            stub, stub
        );

        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{} {}", p.name, p.managed))
            .collect();
        let mut results: Vec<String> = Vec::new();
        if let Some(r) = &self.result {
            results.push(format!("r1 {}", r.managed));
        } else if self.errno {
            results.push("r1 _Ctype_void".to_string());
        }
        if self.errno {
            results.push("r2 error".to_string());
        }
        let frame_ptr = match (self.params.first(), results.first()) {
            (Some(p), _) => format!("uintptr(unsafe.Pointer(&{}))", p.name),
            (None, Some(_)) => "uintptr(unsafe.Pointer(&r1))".to_string(),
            (None, None) => "0".to_string(),
        };

        out.push_str("//go:cgo_unsafe_args\n");
        let _ = write!(out, "func {}({})", self.managed_name(), params.join(", "));
        if !results.is_empty() {
            let _ = write!(out, " ({})", results.join(", "));
        }
        out.push_str(" {\n");
        if self.errno {
            let _ = writeln!(out, "\terrno := _cgo_runtime_cgocall({}, {})", stub, frame_ptr);
            out.push_str("\tif errno != 0 {\n\t\tr2 = syscall.Errno(errno)\n\t}\n");
        } else {
            let _ = writeln!(out, "\t_cgo_runtime_cgocall({}, {})", stub, frame_ptr);
        }
        if !results.is_empty() {
            out.push_str("\treturn\n");
        }
        out.push_str("}\n");
        out
    }
}

fn descriptor(
    func: &str,
    name: String,
    ty: CType,
    mapper: &mut TypeMapper,
) -> Result<ArgDescriptor> {
    let Some(c_decl) = ty.c_spelling() else {
        bail!(
            "C.{}: {} has type {} which cannot be named in C",
            func,
            name,
            ty.signature()
        );
    };
    let managed = mapper.managed(&ty);
    Ok(ArgDescriptor {
        name,
        c_type: ty,
        c_decl,
        managed,
    })
}

/// Bridge for a foreign global variable: a native pointer to it.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBridge {
    pub name: String,
    pub managed_type: String,
    hash: String,
    content: String,
}

impl VariableBridge {
    pub fn new(name: &str, ty: &CType, preamble: &str, mapper: &mut TypeMapper) -> Self {
        let signature = format!("var {} {}", name, ty.signature());
        let mut fp = Fingerprint::new();
        fp.update_str(preamble).update_str(&signature);
        VariableBridge {
            name: name.to_string(),
            managed_type: mapper.managed(ty),
            hash: bridge_hash(preamble, &signature),
            content: fp.finish(),
        }
    }

    pub fn managed_name(&self) -> String {
        format!("_Cvar_{}", self.name)
    }

    pub fn stub_name(&self) -> String {
        format!("_cgo_{}_Cvar_{}", self.hash, self.name)
    }

    pub fn stub_symbol(&self) -> StubSymbol {
        StubSymbol {
            name: self.stub_name(),
            content: self.content.clone(),
        }
    }

    pub fn c_definition(&self) -> String {
        format!("void *{} = &{};\n", self.stub_name(), self.name)
    }

    pub fn managed_declaration(&self) -> String {
        format!(
            "//go:cgo_import_static {stub}\n//go:linkname {name} {stub}\nvar {name} *{ty}\n",
            stub = self.stub_name(),
            name = self.managed_name(),
            ty = self.managed_type
        )
    }
}
