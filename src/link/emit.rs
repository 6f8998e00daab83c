//! Directive emission for one compiled package.
//!
//! Package-config names are expanded into compiler and linker flags before
//! anything is compiled. After generation, the package's link requirements
//! are written as [`LinkDirective`] records: both the internal-mode and the
//! external-mode directives are attached; the resolver picks later.

use std::path::Path;

use anyhow::{Context, Result};

use crate::codegen::GeneratedPackage;
use crate::core::directive::{split_quoted, BuildFlags};
use crate::core::link_directive::LinkDirective;
use crate::util::process::ProcessBuilder;

/// Fold `#cgo pkg-config:` packages into CFLAGS and LDFLAGS.
///
/// Reported flags are appended after the source-declared ones so that
/// explicit directives keep their position.
pub fn expand_pkg_config(tool: &Path, flags: &mut BuildFlags) -> Result<()> {
    if flags.pkg_config.is_empty() {
        return Ok(());
    }
    let names = flags.pkg_config.clone();
    if let Some(bad) = names.iter().find(|n| n.starts_with('-') && !n.starts_with("--")) {
        anyhow::bail!("invalid pkg-config package name: {}", bad);
    }

    let cflags = query(tool, "--cflags", &names)?;
    let libs = query(tool, "--libs", &names)?;
    tracing::debug!(
        "pkg-config {}: cflags={:?} libs={:?}",
        names.join(" "),
        cflags,
        libs
    );
    flags.cflags.extend(cflags);
    flags.ldflags.extend(libs);
    Ok(())
}

fn query(tool: &Path, mode: &str, names: &[String]) -> Result<Vec<String>> {
    let output = ProcessBuilder::new(tool)
        .arg(mode)
        .arg("--")
        .args(names)
        .exec_and_check()?;
    let text = String::from_utf8_lossy(&output.stdout);
    split_quoted(text.trim())
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("failed to parse pkg-config {} output", mode))
}

/// Link directives for a generated package.
///
/// Order: static imports for every generated native symbol, export records
/// for each managed entry point, then the package's LDFLAGS verbatim.
pub fn package_directives(generated: &GeneratedPackage, flags: &BuildFlags) -> Vec<LinkDirective> {
    let mut directives = Vec::new();
    for stub in &generated.static_imports {
        directives.push(LinkDirective::ImportStatic {
            local: stub.clone(),
        });
    }
    for entry in &generated.exports {
        directives.push(LinkDirective::ExportDynamic {
            local: entry.clone(),
            remote: entry.clone(),
        });
        directives.push(LinkDirective::ExportStatic {
            local: entry.clone(),
            remote: entry.clone(),
        });
    }
    for arg in &flags.ldflags {
        directives.push(LinkDirective::LdFlag { arg: arg.clone() });
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ldflags_keep_order_and_duplicates() {
        let generated = GeneratedPackage {
            static_imports: vec!["_cgo_0123456789ab_Cfunc_puts".to_string()],
            ..Default::default()
        };
        let flags = BuildFlags {
            ldflags: vec!["-lpng".to_string(), "-lcairo".to_string(), "-lpng".to_string()],
            ..Default::default()
        };
        let directives = package_directives(&generated, &flags);
        let rendered: Vec<String> = directives.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "cgo_import_static _cgo_0123456789ab_Cfunc_puts",
                "cgo_ldflag \"-lpng\"",
                "cgo_ldflag \"-lcairo\"",
                "cgo_ldflag \"-lpng\"",
            ]
        );
    }

    #[test]
    fn test_exports_emit_both_modes() {
        let generated = GeneratedPackage {
            exports: vec!["_cgoexp_0123456789ab_Add".to_string()],
            ..Default::default()
        };
        let directives = package_directives(&generated, &BuildFlags::default());
        assert_eq!(directives.len(), 2);
        assert!(directives[0].applies_internal());
        assert!(directives[1].applies_external());
    }

    #[test]
    fn test_no_pkg_config_is_a_no_op() {
        let mut flags = BuildFlags::default();
        expand_pkg_config(Path::new("/nonexistent/pkg-config"), &mut flags).unwrap();
        assert!(flags.cflags.is_empty());
    }

    #[test]
    fn test_option_like_package_name_is_rejected() {
        let mut flags = BuildFlags {
            pkg_config: vec!["-lfoo".to_string()],
            ..Default::default()
        };
        assert!(expand_pkg_config(Path::new("pkg-config"), &mut flags).is_err());
    }
}
