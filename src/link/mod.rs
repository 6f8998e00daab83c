//! Final-binary link planning.
//!
//! - [`emit`]: per-package directive emission (and package-config expansion)
//! - [`dynimport`]: dynamic-import discovery from a linked probe executable
//! - [`plan`]: link-mode selection over the package graph
//! - [`host`]: external linking through the host C toolchain

pub mod dynimport;
pub mod emit;
pub mod host;
pub mod plan;
pub mod symbols;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use dynimport::{DynamicImports, ImportedSymbol};
pub use emit::{expand_pkg_config, package_directives};
pub use host::HostLinker;
pub use plan::{LinkPlan, LinkResolver, PlannedDirective};

/// How the final binary is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// The managed toolchain's own linker, binding native symbols dynamically.
    Internal,
    /// The host C linker, fed the merged managed object plus host objects.
    External,
}

impl LinkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkMode::Internal => "internal",
            LinkMode::External => "external",
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator choice of link mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkModeSetting {
    #[default]
    Auto,
    Internal,
    External,
}

impl FromStr for LinkModeSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(LinkModeSetting::Auto),
            "internal" => Ok(LinkModeSetting::Internal),
            "external" => Ok(LinkModeSetting::External),
            other => Err(format!(
                "invalid link mode `{}` (expected auto, internal or external)",
                other
            )),
        }
    }
}

impl fmt::Display for LinkModeSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkModeSetting::Auto => "auto",
            LinkModeSetting::Internal => "internal",
            LinkModeSetting::External => "external",
        })
    }
}
