//! Implementation of `cbridge linkplan` and `cbridge link`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::link::plan::check_symbols;
use crate::link::{HostLinker, LinkMode, LinkModeSetting, LinkPlan, LinkResolver};
use crate::util::config::Config;
use crate::util::fs::write_string;

/// Options for the link command.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Import path of the main package
    pub main: String,

    /// Artifact directories of every package in the program
    pub artifact_dirs: Vec<PathBuf>,

    /// Final binary (external) or plan file (internal)
    pub output: PathBuf,

    /// The managed toolchain's merged object
    pub managed_object: PathBuf,

    /// Link mode override (falls back to config, then auto)
    pub mode: Option<LinkModeSetting>,

    /// Host linker template override
    pub extld: Option<String>,
}

/// Resolve the plan for `main` over the given artifact directories.
pub fn linkplan(
    config: &Config,
    main: &str,
    artifact_dirs: &[PathBuf],
    mode: Option<LinkModeSetting>,
) -> Result<LinkPlan> {
    let mut resolver = LinkResolver::new(&config.plain_packages());
    resolver.load_dirs(artifact_dirs)?;
    let setting = mode.or(config.link.mode).unwrap_or_default();
    resolver.resolve(main, setting)
}

/// Link the final binary.
///
/// External mode runs the host linker. Internal mode has no linker of its
/// own here: the checked plan is written to `output` as JSON for the
/// managed toolchain to consume.
pub fn link(config: &Config, opts: &LinkOptions) -> Result<LinkPlan> {
    let plan = linkplan(config, &opts.main, &opts.artifact_dirs, opts.mode)?;
    check_symbols(&plan)?;

    match plan.mode {
        LinkMode::External => {
            let template = opts.extld.as_deref().or(config.link.extld.as_deref());
            let cc = std::env::var("CC").ok();
            let linker = HostLinker::select(template, cc.as_deref())?;
            linker.link(&plan, &opts.managed_object, &opts.output)?;
        }
        LinkMode::Internal => {
            write_plan(&plan, &opts.output)?;
        }
    }
    Ok(plan)
}

fn write_plan(plan: &LinkPlan, path: &Path) -> Result<()> {
    tracing::info!("writing internal link plan to {}", path.display());
    write_string(path, &plan.to_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::link_directive::LinkDirective;
    use crate::core::package::PackageArtifact;
    use crate::link::plan::load_plan;
    use tempfile::TempDir;

    fn save(root: &Path, name: &str, artifact: &PackageArtifact) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        artifact.save(&dir).unwrap();
        dir
    }

    #[test]
    fn test_internal_link_writes_plan() {
        let tmp = TempDir::new().unwrap();
        let mut main = PackageArtifact::new("main");
        main.imports.push("net".to_string());
        let mut net = PackageArtifact::new("net");
        net.uses_bridge = true;
        net.directives.push(LinkDirective::DynamicLinker {
            path: "/lib64/ld-linux-x86-64.so.2".to_string(),
        });
        let dirs = vec![save(tmp.path(), "main", &main), save(tmp.path(), "net", &net)];

        let out = tmp.path().join("plan.json");
        let plan = link(
            &Config::default(),
            &LinkOptions {
                main: "main".to_string(),
                artifact_dirs: dirs,
                output: out.clone(),
                managed_object: tmp.path().join("go.o"),
                mode: None,
                extld: None,
            },
        )
        .unwrap();
        assert_eq!(plan.mode, LinkMode::Internal);
        assert_eq!(load_plan(&out).unwrap(), plan);
    }

    #[test]
    fn test_override_beats_config() {
        let tmp = TempDir::new().unwrap();
        let dirs = vec![save(tmp.path(), "main", &PackageArtifact::new("main"))];
        let mut config = Config::default();
        config.link.mode = Some(LinkModeSetting::External);

        let plan = linkplan(&config, "main", &dirs, None).unwrap();
        assert_eq!(plan.mode, LinkMode::External);
        let plan = linkplan(&config, "main", &dirs, Some(LinkModeSetting::Auto)).unwrap();
        assert_eq!(plan.mode, LinkMode::Internal);
    }
}
