//! Implementation of `cbridge dynimport`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::toolchain::{CompileInput, LinkInput, Toolchain};
use crate::core::link_directive::LinkDirective;
use crate::link::DynamicImports;
use crate::util::fs::read_bytes;

/// Name of the probe executable linked from a package's host objects.
pub const PROBE_EXECUTABLE: &str = "_cgo_.o";

/// Directives derived from a dynamically linked executable.
pub fn dynimport(binary: &Path) -> Result<Vec<LinkDirective>> {
    let data = read_bytes(binary)?;
    let imports = DynamicImports::read(&data)
        .with_context(|| format!("failed to read dynamic imports of {}", binary.display()))?;
    tracing::debug!(
        "{}: {} symbol(s), {} library dependencies",
        binary.display(),
        imports.symbols.len(),
        imports.libraries.len()
    );
    Ok(imports.directives())
}

/// Link the package's host objects with `_cgo_main.c` and read back what
/// the resulting executable imports.
pub fn probe_imports(
    toolchain: &dyn Toolchain,
    cflags: &[String],
    ldflags: &[String],
    objects: &[PathBuf],
    objdir: &Path,
) -> Result<DynamicImports> {
    let main_object = objdir.join(format!("_cgo_main.{}", toolchain.object_extension()));
    toolchain
        .compile_command(&CompileInput {
            source: objdir.join("_cgo_main.c"),
            output: main_object.clone(),
            cflags: cflags.to_vec(),
        })
        .into_process()
        .exec_and_check()
        .context("failed to compile _cgo_main.c")?;

    let mut all = objects.to_vec();
    all.push(main_object);
    let output = objdir.join(PROBE_EXECUTABLE);
    toolchain
        .link_exe_command(&LinkInput {
            objects: all,
            output: output.clone(),
            ldflags: ldflags.to_vec(),
        })
        .into_process()
        .exec_and_check()
        .context("failed to link dynamic import probe")?;

    let data = read_bytes(&output)?;
    DynamicImports::read(&data)
        .with_context(|| format!("failed to read dynamic imports of {}", output.display()))
}
