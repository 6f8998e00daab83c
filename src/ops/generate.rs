//! Implementation of `cbridge generate` and `cbridge build-all`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rayon::prelude::*;

use crate::builder::toolchain::{detect_toolchain, CompileInput, Toolchain};
use crate::codegen::{self, GeneratedPackage, PackageInput};
use crate::core::directive::BuildFlags;
use crate::core::ident::ForeignIdentifier;
use crate::core::link_directive;
use crate::core::package::PackageArtifact;
use crate::dwarf::LayoutExtractor;
use crate::frontend::{owner_files, SourceFile};
use crate::link::{expand_pkg_config, package_directives};
use crate::probe::classify_identifiers;
use crate::util::config::Config;
use crate::util::fs::{collect_sources, ensure_dir, write_string};

use super::dynimport::probe_imports;

/// File holding the package's link directives, one record per line.
pub const IMPORT_FILE: &str = "_cgo_import.txt";

/// Options for the generate command.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Managed source files or package directories
    pub inputs: Vec<PathBuf>,

    /// Where generated files and objects go
    pub objdir: PathBuf,

    /// Import path recorded in the artifact (defaults to the package name)
    pub import_path: Option<String>,
}

/// What one generate run produced.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub artifact: PackageArtifact,
    /// Every file written, in write order
    pub written: Vec<PathBuf>,
}

/// Load and parse every source file of one package, in path order.
pub fn load_package(inputs: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut paths = collect_sources(inputs)?;
    if paths.is_empty() {
        bail!("no managed source files found");
    }
    paths.sort();
    paths.dedup();

    let files = paths
        .iter()
        .map(|p| SourceFile::load(p))
        .collect::<Result<Vec<_>>>()?;

    let first = &files[0];
    if let Some(other) = files.iter().find(|f| f.package != first.package) {
        bail!(
            "found packages {} ({}) and {} ({})",
            first.package,
            first.path.display(),
            other.package,
            other.path.display()
        );
    }
    Ok(files)
}

/// Effective flags of a package: directives of every file folded in file
/// order, environment overrides appended, then package-config expanded.
pub fn package_flags(config: &Config, files: &[SourceFile]) -> Result<BuildFlags> {
    let target = config.target();
    let mut flags = BuildFlags::default();
    for file in files {
        if let Some(preamble) = file.preamble() {
            flags.merge(&BuildFlags::from_directives(&preamble.directives, &target));
        }
    }
    flags.apply_env(|var| std::env::var(var).ok());

    if !flags.pkg_config.is_empty() {
        let Some(tool) = config.pkg_config_tool() else {
            bail!(
                "pkg-config is required for {} but was not found",
                flags.pkg_config.join(" ")
            );
        };
        expand_pkg_config(&tool, &mut flags)?;
    }
    Ok(flags)
}

/// Classify and resolve every foreign name, each against the preamble of
/// the first file that references it.
fn resolve_identifiers(
    toolchain: &dyn Toolchain,
    cflags: &[String],
    files: &[SourceFile],
) -> Result<BTreeMap<String, ForeignIdentifier>> {
    let mut by_owner: BTreeMap<usize, Vec<ForeignIdentifier>> = BTreeMap::new();
    for (name, owner) in owner_files(files) {
        by_owner
            .entry(owner)
            .or_default()
            .push(ForeignIdentifier::new(name));
    }

    let extractor = LayoutExtractor::new(toolchain, cflags.to_vec());
    let mut identifiers = BTreeMap::new();
    for (owner, mut idents) in by_owner {
        let file = &files[owner];
        let preamble = file
            .preamble()
            .map(|p| p.with_line_marker(&file.path))
            .unwrap_or_default();

        tracing::debug!(
            "probing {} name(s) against {}",
            idents.len(),
            file.path.display()
        );
        classify_identifiers(toolchain, cflags, &preamble, &mut idents)?;
        extractor.extract(&preamble, &mut idents)?;

        for ident in idents {
            identifiers.insert(ident.name.clone(), ident);
        }
    }
    Ok(identifiers)
}

fn write_generated(generated: &GeneratedPackage, objdir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(generated.files.len());
    for file in &generated.files {
        let path = objdir.join(&file.name);
        write_string(&path, &file.contents)?;
        written.push(path);
    }
    Ok(written)
}

/// Compile the generated native sources into host objects.
///
/// Returned paths are relative to `objdir`, the form the artifact records.
fn compile_host_objects(
    toolchain: &dyn Toolchain,
    cflags: &[String],
    generated: &GeneratedPackage,
    objdir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut objects = Vec::new();
    for file in &generated.files {
        let Some(stem) = file
            .name
            .strip_suffix(".cgo2.c")
            .or_else(|| file.name.strip_suffix(".c").filter(|s| *s == "_cgo_export"))
        else {
            continue;
        };
        let object = PathBuf::from(format!("{}.{}", stem, toolchain.object_extension()));
        let input = CompileInput {
            source: objdir.join(&file.name),
            output: objdir.join(&object),
            cflags: cflags.to_vec(),
        };
        toolchain
            .compile_command(&input)
            .into_process()
            .exec_and_check()
            .with_context(|| format!("failed to compile {}", file.name))?;
        objects.push(object);
    }
    Ok(objects)
}

/// Run the whole bridge pipeline for one package.
pub fn generate(config: &Config, opts: &GenerateOptions) -> Result<GenerateResult> {
    let files = load_package(&opts.inputs)?;
    let package = files[0].package.clone();
    let import_path = opts.import_path.clone().unwrap_or_else(|| package.clone());

    let mut artifact = PackageArtifact::new(&import_path);
    let mut imports: Vec<String> = files.iter().flat_map(|f| f.imports.clone()).collect();
    imports.sort();
    imports.dedup();
    artifact.imports = imports;
    artifact.uses_bridge = files.iter().any(|f| f.uses_bridge());

    ensure_dir(&opts.objdir)?;
    let mut written = Vec::new();

    if !artifact.uses_bridge {
        tracing::info!("{} does not use the bridge", import_path);
        artifact.save(&opts.objdir)?;
        written.push(opts.objdir.join(crate::core::package::ARTIFACT_FILE));
        return Ok(GenerateResult { artifact, written });
    }

    let flags = package_flags(config, &files)?;
    let mut cflags = flags.compile_flags();
    cflags.extend(config.toolchain.cflags.iter().cloned());

    let toolchain = detect_toolchain(config)?;
    let target = config.target();

    tracing::info!("classifying C names of {}", import_path);
    let identifiers = resolve_identifiers(toolchain.as_ref(), &cflags, &files)?;

    tracing::info!("generating bridges for {}", import_path);
    let generated = codegen::generate(&PackageInput {
        package: &package,
        files: &files,
        identifiers: &identifiers,
        pointer_size: target.pointer_size(),
    })?;
    written.extend(write_generated(&generated, &opts.objdir)?);

    tracing::info!("compiling host objects for {}", import_path);
    let objects = compile_host_objects(toolchain.as_ref(), &cflags, &generated, &opts.objdir)?;

    // Internal-mode directives are recorded for every package; the resolver
    // decides later whether they apply.
    let mut directives = package_directives(&generated, &flags);
    let absolute: Vec<PathBuf> = objects.iter().map(|o| opts.objdir.join(o)).collect();
    let imports = probe_imports(toolchain.as_ref(), &cflags, &flags.ldflags, &absolute, &opts.objdir)?;
    tracing::debug!(
        "{}: {} dynamic import(s)",
        import_path,
        imports.symbols.len()
    );
    directives.extend(imports.directives());

    let import_file = opts.objdir.join(IMPORT_FILE);
    write_string(&import_file, &link_directive::render(&directives))?;
    written.push(import_file);

    artifact.directives = directives;
    artifact.host_objects = objects;
    artifact.stubs = generated.stubs.clone();
    artifact.save(&opts.objdir)?;
    written.push(opts.objdir.join(crate::core::package::ARTIFACT_FILE));

    tracing::info!(
        "{}: {} bridge(s), {} directive(s)",
        import_path,
        generated.functions.len(),
        artifact.directives.len()
    );
    Ok(GenerateResult { artifact, written })
}

/// Object directory of one package under a shared root.
pub fn package_objdir(root: &Path, import_path: &str) -> PathBuf {
    root.join(import_path.replace(['/', '\\'], "_"))
}

/// Run [`generate`] for several package directories in parallel.
///
/// Every package runs to completion; failures are reported together after
/// the join.
pub fn build_all(config: &Config, objdir: &Path, packages: &[PathBuf]) -> Result<Vec<PackageArtifact>> {
    let results: Vec<(PathBuf, Result<GenerateResult>)> = packages
        .par_iter()
        .map(|dir| {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "main".to_string());
            let opts = GenerateOptions {
                inputs: vec![dir.clone()],
                objdir: package_objdir(objdir, &name),
                import_path: None,
            };
            (dir.clone(), generate(config, &opts))
        })
        .collect();

    let mut artifacts = Vec::new();
    let mut failed = Vec::new();
    for (dir, result) in results {
        match result {
            Ok(r) => artifacts.push(r.artifact),
            Err(e) => {
                tracing::error!("{}: {:#}", dir.display(), e);
                failed.push(dir.display().to_string());
            }
        }
    }
    if !failed.is_empty() {
        bail!("{} package(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(artifacts)
}
