//! Link-mode resolution.
//!
//! Runs once per final binary. Loads every package artifact, walks the
//! import graph from the main package, and picks Internal linking iff every
//! bridge-using package reachable from main is on the plain-package
//! allow-list. Adding a non-plain bridge user can only move the decision
//! to External, never back.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};

use super::symbols::ObjectSymbols;
use super::{LinkMode, LinkModeSetting};
use crate::core::link_directive::LinkDirective;
use crate::core::package::PackageArtifact;
use crate::util::errors::BridgeError;

/// A directive together with the package that contributed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedDirective {
    pub package: String,
    pub directive: LinkDirective,
}

/// The link decision for one final binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPlan {
    pub mode: LinkMode,
    /// Human-readable justification of `mode`
    pub reason: String,
    /// Packages in the link, dependencies first
    pub packages: Vec<String>,
    /// Directives that apply to `mode`, in package order then emission order
    pub directives: Vec<PlannedDirective>,
    /// Host objects of every package in the link
    pub host_objects: Vec<PathBuf>,
}

impl LinkPlan {
    /// Accumulated `LdFlag`s, verbatim and in order.
    pub fn ldflags(&self) -> Vec<String> {
        self.directives
            .iter()
            .filter_map(|d| match &d.directive {
                LinkDirective::LdFlag { arg } => Some(arg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct LoadedPackage {
    dir: PathBuf,
    artifact: PackageArtifact,
}

/// Folds package artifacts into a [`LinkPlan`].
pub struct LinkResolver {
    packages: Vec<LoadedPackage>,
    by_path: HashMap<String, usize>,
    plain: BTreeSet<String>,
}

impl LinkResolver {
    pub fn new(plain_packages: &[String]) -> Self {
        LinkResolver {
            packages: Vec::new(),
            by_path: HashMap::new(),
            plain: plain_packages.iter().cloned().collect(),
        }
    }

    /// Add a package; `dir` is where its host objects live.
    pub fn add(&mut self, dir: impl Into<PathBuf>, artifact: PackageArtifact) -> Result<()> {
        if self.by_path.contains_key(&artifact.import_path) {
            bail!("package `{}` given more than once", artifact.import_path);
        }
        self.by_path
            .insert(artifact.import_path.clone(), self.packages.len());
        self.packages.push(LoadedPackage {
            dir: dir.into(),
            artifact,
        });
        Ok(())
    }

    /// Load `_cgo_artifact.json` from each directory.
    pub fn load_dirs(&mut self, dirs: &[PathBuf]) -> Result<()> {
        for dir in dirs {
            let artifact = PackageArtifact::load(dir)?;
            self.add(dir.clone(), artifact)?;
        }
        Ok(())
    }

    /// Import paths reachable from `main`, dependencies first.
    fn link_order(&self, main: &str) -> Result<Vec<usize>> {
        let Some(&root) = self.by_path.get(main) else {
            bail!("main package `{}` has no artifact", main);
        };

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.packages.len()).map(|i| graph.add_node(i)).collect();
        for (i, pkg) in self.packages.iter().enumerate() {
            for import in &pkg.artifact.imports {
                // Imports without an artifact never used the bridge.
                if let Some(&j) = self.by_path.get(import) {
                    graph.update_edge(nodes[i], nodes[j], ());
                }
            }
        }

        let mut reachable = BTreeSet::new();
        let mut dfs = Dfs::new(&graph, nodes[root]);
        while let Some(node) = dfs.next(&graph) {
            reachable.insert(graph[node]);
        }

        // Cycles among packages outside the program are not our concern.
        let linked: DiGraph<usize, ()> = graph.filter_map(
            |_, &i| reachable.contains(&i).then_some(i),
            |_, &e| Some(e),
        );
        let sorted = petgraph::algo::toposort(&linked, None).map_err(|cycle| {
            anyhow::anyhow!(
                "import cycle through `{}`",
                self.packages[linked[cycle.node_id()]].artifact.import_path
            )
        })?;
        Ok(sorted.into_iter().rev().map(|n| linked[n]).collect())
    }

    /// Compute the plan for the binary whose main package is `main`.
    pub fn resolve(&self, main: &str, setting: LinkModeSetting) -> Result<LinkPlan> {
        let order = self.link_order(main)?;

        self.check_stub_collisions(&order)?;
        self.check_directive_conflicts(&order)?;

        let non_plain: Vec<&str> = order
            .iter()
            .map(|&i| &self.packages[i].artifact)
            .filter(|a| a.uses_bridge && !self.plain.contains(&a.import_path))
            .map(|a| a.import_path.as_str())
            .collect();

        let (mode, reason) = match setting {
            LinkModeSetting::Internal => {
                if !non_plain.is_empty() {
                    tracing::warn!(
                        "internal linking requested although {} use(s) the bridge",
                        non_plain.join(", ")
                    );
                }
                (LinkMode::Internal, "requested with --linkmode internal".to_string())
            }
            LinkModeSetting::External => {
                (LinkMode::External, "requested with --linkmode external".to_string())
            }
            LinkModeSetting::Auto if non_plain.is_empty() => (
                LinkMode::Internal,
                "every bridge-using package is a plain platform package".to_string(),
            ),
            LinkModeSetting::Auto => (
                LinkMode::External,
                format!("bridge used by non-plain package(s): {}", non_plain.join(", ")),
            ),
        };

        let mut directives = Vec::new();
        let mut host_objects = Vec::new();
        for &i in &order {
            let pkg = &self.packages[i];
            for d in &pkg.artifact.directives {
                let applies = match mode {
                    LinkMode::Internal => d.applies_internal(),
                    LinkMode::External => d.applies_external(),
                };
                if applies {
                    directives.push(PlannedDirective {
                        package: pkg.artifact.import_path.clone(),
                        directive: d.clone(),
                    });
                }
            }
            host_objects.extend(pkg.artifact.host_objects.iter().map(|o| pkg.dir.join(o)));
        }

        tracing::info!("link mode {} ({})", mode, reason);
        Ok(LinkPlan {
            mode,
            reason,
            packages: order
                .iter()
                .map(|&i| self.packages[i].artifact.import_path.clone())
                .collect(),
            directives,
            host_objects,
        })
    }

    /// Identical bridges from different packages merge; anything else
    /// sharing a name is fatal.
    fn check_stub_collisions(&self, order: &[usize]) -> Result<()> {
        let mut seen: HashMap<&str, (&str, &str)> = HashMap::new();
        for &i in order {
            let artifact = &self.packages[i].artifact;
            for stub in &artifact.stubs {
                match seen.get(stub.name.as_str()) {
                    Some((_, content)) if *content == stub.content => {}
                    Some((first, _)) => {
                        return Err(BridgeError::NameCollision {
                            name: stub.name.clone(),
                            first: first.to_string(),
                            second: artifact.import_path.clone(),
                        }
                        .into());
                    }
                    None => {
                        seen.insert(stub.name.as_str(), (artifact.import_path.as_str(), stub.content.as_str()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Two packages may not bind the same local symbol differently.
    fn check_directive_conflicts(&self, order: &[usize]) -> Result<()> {
        let mut bindings: BTreeMap<String, (&str, &LinkDirective)> = BTreeMap::new();
        for &i in order {
            let artifact = &self.packages[i].artifact;
            for d in &artifact.directives {
                let key = match d {
                    LinkDirective::ImportDynamic { .. } => d.local().map(|l| format!("import {}", l)),
                    LinkDirective::ExportDynamic { local, .. } => Some(format!("export {}", local)),
                    LinkDirective::DynamicLinker { .. } => Some("dynamic linker".to_string()),
                    _ => None,
                };
                let Some(key) = key else { continue };
                match bindings.get(&key) {
                    Some((_, existing)) if *existing == d => {}
                    Some((first, existing)) => {
                        let symbol = d.local().unwrap_or("<dynamic linker>").to_string();
                        return Err(BridgeError::LinkDirectiveConflict {
                            symbol,
                            first: (first.to_string(), existing.to_string()),
                            second: (artifact.import_path.clone(), d.to_string()),
                        }
                        .into());
                    }
                    None => {
                        bindings.insert(key, (artifact.import_path.as_str(), d));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Native symbols the managed runtime defines for bridge objects.
const MANAGED_RUNTIME_SYMBOLS: &[&str] = &["crosscall2", "_cgo_allocate", "_cgo_panic", "_cgo_reginit"];

/// Check that every symbol the plan's host objects need is accounted for.
///
/// Internal: undefined references must be defined by another host object
/// or rewritten by an `ImportDynamic`. External: every `ImportStatic`
/// symbol must be defined by some host object.
pub fn check_symbols(plan: &LinkPlan) -> Result<()> {
    let mut defined = BTreeSet::new();
    let mut needed: Vec<(String, String)> = Vec::new();
    for path in &plan.host_objects {
        let symbols = ObjectSymbols::read(path)?;
        let origin = display_name(path);
        defined.extend(symbols.defined);
        needed.extend(symbols.undefined.into_iter().map(|s| (s, origin.clone())));
    }

    let missing: Vec<(String, String)> = match plan.mode {
        LinkMode::Internal => {
            // Export entry points and the call-back trampoline come from the
            // managed side of the link.
            let provided: BTreeSet<&str> = plan
                .directives
                .iter()
                .filter_map(|d| match &d.directive {
                    LinkDirective::ImportDynamic { .. }
                    | LinkDirective::ExportDynamic { .. }
                    | LinkDirective::ExportStatic { .. } => d.directive.local(),
                    _ => None,
                })
                .chain(MANAGED_RUNTIME_SYMBOLS.iter().copied())
                .collect();
            needed
                .into_iter()
                .filter(|(s, _)| !defined.contains(s) && !provided.contains(s.as_str()))
                .collect()
        }
        LinkMode::External => plan
            .directives
            .iter()
            .filter_map(|d| match &d.directive {
                LinkDirective::ImportStatic { local } if !defined.contains(local) => {
                    Some((local.clone(), d.package.clone()))
                }
                _ => None,
            })
            .collect(),
    };

    if !missing.is_empty() {
        return Err(BridgeError::UnresolvedSymbols {
            mode: plan.mode.to_string(),
            symbols: missing,
        }
        .into());
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load a plan previously written with [`LinkPlan::to_json`].
pub fn load_plan(path: &Path) -> Result<LinkPlan> {
    let text = crate::util::fs::read_to_string(path)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}
