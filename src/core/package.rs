//! Compiled-package artifact metadata.
//!
//! Each package that went through the bridge pipeline persists one
//! `_cgo_artifact.json` next to its generated files. The link stage reads
//! only these records; it never re-runs any earlier stage.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::link_directive::LinkDirective;

/// File name of the artifact record inside an object directory.
pub const ARTIFACT_FILE: &str = "_cgo_artifact.json";

/// A generated symbol together with the content it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubSymbol {
    pub name: String,
    /// Full (untruncated) hash of the inputs that produced `name`
    pub content: String,
}

/// Metadata for one compiled package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageArtifact {
    /// Package import path (e.g. `net`, `example.com/app/db`)
    pub import_path: String,

    /// Direct package dependencies by import path
    #[serde(default)]
    pub imports: Vec<String>,

    /// Whether any file of the package imports the foreign namespace
    pub uses_bridge: bool,

    /// Link directives, in emission order
    #[serde(default)]
    pub directives: Vec<LinkDirective>,

    /// Native objects produced for this package (relative to the artifact dir)
    #[serde(default)]
    pub host_objects: Vec<PathBuf>,

    /// Generated bridge symbols
    #[serde(default)]
    pub stubs: Vec<StubSymbol>,
}

impl PackageArtifact {
    pub fn new(import_path: impl Into<String>) -> Self {
        PackageArtifact {
            import_path: import_path.into(),
            imports: Vec::new(),
            uses_bridge: false,
            directives: Vec::new(),
            host_objects: Vec::new(),
            stubs: Vec::new(),
        }
    }

    /// Load the artifact record from an object directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(ARTIFACT_FILE);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read artifact: {}", path.display()))?;
        let mut artifact: PackageArtifact = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse artifact: {}", path.display()))?;
        for obj in &mut artifact.host_objects {
            if obj.is_relative() {
                *obj = dir.join(&*obj);
            }
        }
        Ok(artifact)
    }

    /// Save the artifact record into an object directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(ARTIFACT_FILE);
        let text = serde_json::to_string_pretty(self).context("failed to serialize artifact")?;
        crate::util::fs::write_string(&path, &text)
    }
}
