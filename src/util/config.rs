//! Configuration file support.
//!
//! Two configuration file locations are read:
//! - Global: `~/.cbridge/config.toml` - User-wide defaults
//! - Project: `.cbridge/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Environment variables
//! and CLI flags take precedence over both (applied by the callers).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::directive::Target;
use crate::link::LinkModeSetting;
use crate::util::process::find_executable;

/// Packages whose bridge use is satisfied by the platform C library alone.
pub const DEFAULT_PLAIN_PACKAGES: &[&str] = &["net", "os/user", "runtime/cgo"];

/// Bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Native toolchain settings
    pub toolchain: ToolchainSettings,

    /// Target platform settings
    pub target: TargetSettings,

    /// Final link settings
    pub link: LinkSettings,
}

/// Native toolchain settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the C compiler (e.g., /usr/bin/clang)
    pub cc: Option<PathBuf>,

    /// Package-config tool (e.g., pkgconf)
    pub pkg_config: Option<PathBuf>,

    /// Extra flags for compiling generated bridge sources
    pub cflags: Vec<String>,
}

/// Target platform used to evaluate `#cgo` conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    pub goos: Option<String>,
    pub goarch: Option<String>,
}

/// Final link settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Link mode selection
    pub mode: Option<LinkModeSetting>,

    /// Host linker command template, split into fields
    pub extld: Option<String>,

    /// Allow-list of plain packages (replaces the default list when set)
    pub plain_packages: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if other.toolchain.pkg_config.is_some() {
            self.toolchain.pkg_config = other.toolchain.pkg_config;
        }
        if !other.toolchain.cflags.is_empty() {
            self.toolchain.cflags = other.toolchain.cflags;
        }
        if other.target.goos.is_some() {
            self.target.goos = other.target.goos;
        }
        if other.target.goarch.is_some() {
            self.target.goarch = other.target.goarch;
        }
        if other.link.mode.is_some() {
            self.link.mode = other.link.mode;
        }
        if other.link.extld.is_some() {
            self.link.extld = other.link.extld;
        }
        if other.link.plain_packages.is_some() {
            self.link.plain_packages = other.link.plain_packages;
        }
    }

    /// Effective allow-list of plain packages.
    pub fn plain_packages(&self) -> Vec<String> {
        match &self.link.plain_packages {
            Some(list) => list.clone(),
            None => DEFAULT_PLAIN_PACKAGES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Target platform: `GOOS`/`GOARCH` first, then config, then the host.
    pub fn target(&self) -> Target {
        let host = Target::host();
        let goos = std::env::var("GOOS")
            .ok()
            .or_else(|| self.target.goos.clone())
            .unwrap_or(host.goos);
        let goarch = std::env::var("GOARCH")
            .ok()
            .or_else(|| self.target.goarch.clone())
            .unwrap_or(host.goarch);
        Target::new(goos, goarch)
    }

    /// Package-config tool: `$PKG_CONFIG`, then config, then PATH.
    pub fn pkg_config_tool(&self) -> Option<PathBuf> {
        if let Ok(tool) = std::env::var("PKG_CONFIG") {
            if let Some(path) = find_executable(&tool) {
                return Some(path);
            }
        }
        if let Some(tool) = &self.toolchain.pkg_config {
            return Some(tool.clone());
        }
        ["pkg-config", "pkgconf"]
            .iter()
            .find_map(|name| find_executable(name))
    }
}

/// Load merged configuration from global and project locations.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global) = global_path {
        config.merge(Config::load_or_default(global));
    }
    config.merge(Config::load_or_default(project_path));

    config
}

/// Load configuration for the current working directory.
pub fn load_default_config() -> Config {
    let cwd = std::env::current_dir().unwrap_or_default();
    let global = global_config_path();
    load_config(global.as_deref(), &project_config_path(&cwd))
}

/// Get the global config directory (~/.cbridge).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".cbridge"))
}

/// Get the global config path (~/.cbridge/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.cbridge/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".cbridge").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
[toolchain]
cc = "/usr/bin/clang"
cflags = ["-O2"]

[target]
goos = "linux"
goarch = "arm64"

[link]
mode = "external"
extld = "gcc -ggdb"
plain_packages = ["net"]
"#,
        )
        .unwrap();

        assert_eq!(config.toolchain.cc, Some(PathBuf::from("/usr/bin/clang")));
        assert_eq!(config.target.goarch.as_deref(), Some("arm64"));
        assert_eq!(config.link.mode, Some(LinkModeSetting::External));
        assert_eq!(config.plain_packages(), vec!["net".to_string()]);
    }

    #[test]
    fn test_default_plain_packages() {
        let config = Config::default();
        assert_eq!(config.plain_packages(), vec!["net", "os/user", "runtime/cgo"]);
    }

    #[test]
    fn test_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");
        std::fs::write(&global, "[link]\nextld = \"cc\"\nmode = \"internal\"\n").unwrap();
        std::fs::write(&project, "[link]\nextld = \"clang -fuse-ld=lld\"\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.link.extld.as_deref(), Some("clang -fuse-ld=lld"));
        assert_eq!(config.link.mode, Some(LinkModeSetting::Internal));
    }

    #[test]
    fn test_broken_config_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[link\nmode = ").unwrap();
        let config = Config::load_or_default(&path);
        assert!(config.link.mode.is_none());
    }
}
