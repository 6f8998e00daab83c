//! External linking through the host C toolchain.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use super::plan::LinkPlan;
use crate::core::directive::split_quoted;
use crate::util::process::ProcessBuilder;

/// The host linker command line, before objects and flags are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLinker {
    argv: Vec<String>,
}

impl HostLinker {
    /// Pick the host linker: an explicit template first, then `$CC` split
    /// into fields, then `gcc`.
    pub fn select(template: Option<&str>, cc_env: Option<&str>) -> Result<Self> {
        let source = template
            .filter(|t| !t.trim().is_empty())
            .or(cc_env.filter(|c| !c.trim().is_empty()));
        let argv = match source {
            Some(text) => split_quoted(text)
                .map_err(|e| anyhow::anyhow!(e))
                .with_context(|| format!("invalid host linker command `{}`", text))?,
            None => vec!["gcc".to_string()],
        };
        if argv.is_empty() {
            anyhow::bail!("empty host linker command");
        }
        Ok(HostLinker { argv })
    }

    /// Program and leading arguments.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Full command: template, output, managed object, host objects, then
    /// the accumulated `LdFlag`s verbatim.
    pub fn command(
        &self,
        output: &Path,
        managed_object: &Path,
        host_objects: &[PathBuf],
        ldflags: &[String],
    ) -> ProcessBuilder {
        ProcessBuilder::new(&self.argv[0])
            .args(&self.argv[1..])
            .arg("-o")
            .arg(output)
            .arg(managed_object)
            .args(host_objects)
            .args(ldflags)
    }

    /// Link `plan` into `output`.
    ///
    /// Host objects are copied into a scratch directory as `000000.o`,
    /// `000001.o`, ... so packages that produced equally named objects
    /// cannot clash.
    pub fn link(&self, plan: &LinkPlan, managed_object: &Path, output: &Path) -> Result<()> {
        let scratch = TempDir::new().context("failed to create link directory")?;
        let objects = stage_host_objects(&plan.host_objects, scratch.path())?;
        let ldflags = plan.ldflags();

        let cmd = self.command(output, managed_object, &objects, &ldflags);
        tracing::info!(
            "linking {} with {} ({} host object(s))",
            output.display(),
            self.argv[0],
            objects.len()
        );
        cmd.exec_and_check()?;
        Ok(())
    }
}

/// Copy objects to `dir` under sequential names.
pub fn stage_host_objects(objects: &[PathBuf], dir: &Path) -> Result<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(objects.len());
    for (i, obj) in objects.iter().enumerate() {
        let dest = dir.join(format!("{:06}.o", i));
        std::fs::copy(obj, &dest).with_context(|| {
            format!("failed to copy {} to {}", obj.display(), dest.display())
        })?;
        staged.push(dest);
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_order() {
        let t = HostLinker::select(Some("clang -fuse-ld=lld"), Some("gcc -m64")).unwrap();
        assert_eq!(t.argv(), &["clang", "-fuse-ld=lld"]);
        let cc = HostLinker::select(None, Some("gcc -m64")).unwrap();
        assert_eq!(cc.argv(), &["gcc", "-m64"]);
        let default = HostLinker::select(None, None).unwrap();
        assert_eq!(default.argv(), &["gcc"]);
        let blank = HostLinker::select(Some("  "), None).unwrap();
        assert_eq!(blank.argv(), &["gcc"]);
    }

    #[test]
    fn test_ldflags_appended_verbatim_in_order() {
        let linker = HostLinker::select(None, None).unwrap();
        let cmd = linker.command(
            Path::new("app"),
            Path::new("go.o"),
            &[PathBuf::from("000000.o"), PathBuf::from("000001.o")],
            &["-lpng".to_string(), "-lcairo".to_string()],
        );
        assert_eq!(
            cmd.display_command(),
            "gcc -o app go.o 000000.o 000001.o -lpng -lcairo"
        );
    }

    #[test]
    fn test_staged_names() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let a = src.path().join("x.o");
        let b = src.path().join("sub_x.o");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let staged = stage_host_objects(&[a, b], dst.path()).unwrap();
        assert_eq!(staged[0].file_name().unwrap(), "000000.o");
        assert_eq!(staged[1].file_name().unwrap(), "000001.o");
        assert_eq!(std::fs::read(&staged[1]).unwrap(), b"b");
    }
}
