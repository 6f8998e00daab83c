//! Link directives embedded in compiled artifacts.
//!
//! One record per line:
//!
//! ```text
//! cgo_import_dynamic <local> [<remote>[#<version>] ["<library>"]]
//! cgo_dynamic_linker "<path>"
//! cgo_export_dynamic <local> <remote>
//! cgo_import_static <local>
//! cgo_export_static <local> <remote>
//! cgo_ldflag "<arg>"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::directive::split_quoted;

/// A single link-time requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkDirective {
    ImportDynamic {
        local: String,
        remote: Option<String>,
        version: Option<String>,
        library: Option<String>,
    },
    DynamicLinker {
        path: String,
    },
    ExportDynamic {
        local: String,
        remote: String,
    },
    ImportStatic {
        local: String,
    },
    ExportStatic {
        local: String,
        remote: String,
    },
    LdFlag {
        arg: String,
    },
}

impl LinkDirective {
    /// Load-time dependency on a library without importing a symbol.
    pub fn library_dependency(library: impl Into<String>) -> Self {
        LinkDirective::ImportDynamic {
            local: "_".to_string(),
            remote: Some("_".to_string()),
            version: None,
            library: Some(library.into()),
        }
    }

    /// Record keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            LinkDirective::ImportDynamic { .. } => "cgo_import_dynamic",
            LinkDirective::DynamicLinker { .. } => "cgo_dynamic_linker",
            LinkDirective::ExportDynamic { .. } => "cgo_export_dynamic",
            LinkDirective::ImportStatic { .. } => "cgo_import_static",
            LinkDirective::ExportStatic { .. } => "cgo_export_static",
            LinkDirective::LdFlag { .. } => "cgo_ldflag",
        }
    }

    /// The local symbol this directive talks about, if any.
    pub fn local(&self) -> Option<&str> {
        match self {
            LinkDirective::ImportDynamic { local, .. } if local != "_" => Some(local),
            LinkDirective::ExportDynamic { local, .. }
            | LinkDirective::ImportStatic { local }
            | LinkDirective::ExportStatic { local, .. } => Some(local),
            _ => None,
        }
    }

    /// Whether the directive is consumed by internal linking.
    pub fn applies_internal(&self) -> bool {
        matches!(
            self,
            LinkDirective::ImportDynamic { .. }
                | LinkDirective::DynamicLinker { .. }
                | LinkDirective::ExportDynamic { .. }
        )
    }

    /// Whether the directive is consumed by external linking.
    pub fn applies_external(&self) -> bool {
        matches!(
            self,
            LinkDirective::ImportStatic { .. }
                | LinkDirective::ExportStatic { .. }
                | LinkDirective::LdFlag { .. }
        )
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl fmt::Display for LinkDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())?;
        match self {
            LinkDirective::ImportDynamic {
                local,
                remote,
                version,
                library,
            } => {
                write!(f, " {}", local)?;
                if let Some(remote) = remote {
                    write!(f, " {}", remote)?;
                    if let Some(version) = version {
                        write!(f, "#{}", version)?;
                    }
                    if let Some(library) = library {
                        write!(f, " {}", quote(library))?;
                    }
                }
                Ok(())
            }
            LinkDirective::DynamicLinker { path } => write!(f, " {}", quote(path)),
            LinkDirective::ExportDynamic { local, remote }
            | LinkDirective::ExportStatic { local, remote } => write!(f, " {} {}", local, remote),
            LinkDirective::ImportStatic { local } => write!(f, " {}", local),
            LinkDirective::LdFlag { arg } => write!(f, " {}", quote(arg)),
        }
    }
}

impl FromStr for LinkDirective {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields = split_quoted(line).map_err(|e| format!("{}: {}", e, line))?;
        let Some((keyword, args)) = fields.split_first() else {
            return Err("empty directive".to_string());
        };
        let usage = |form: &str| format!("usage: {} {}", keyword, form);

        match keyword.as_str() {
            "cgo_import_dynamic" | "dynimport" => {
                if args.is_empty() || args.len() > 3 {
                    return Err(usage("<local> [<remote> [\"<library>\"]]"));
                }
                let local = args[0].clone();
                let (remote, version) = match args.get(1) {
                    Some(remote) if remote.contains('@') => {
                        return Err(format!(
                            "symbol version must follow `#`, not `@`: {}",
                            remote
                        ));
                    }
                    Some(remote) => match remote.find('#') {
                        Some(pos) => (
                            Some(remote[..pos].to_string()),
                            Some(remote[pos + 1..].to_string()),
                        ),
                        None => (Some(remote.clone()), None),
                    },
                    None => (None, None),
                };
                if local == "_" && args.len() != 3 {
                    return Err(usage("_ _ \"<library>\""));
                }
                Ok(LinkDirective::ImportDynamic {
                    local,
                    remote,
                    version,
                    library: args.get(2).cloned(),
                })
            }
            "cgo_dynamic_linker" => match args {
                [path] => Ok(LinkDirective::DynamicLinker { path: path.clone() }),
                _ => Err(usage("\"<path>\"")),
            },
            "cgo_export_dynamic" | "dynexport" => match args {
                [local] => Ok(LinkDirective::ExportDynamic {
                    local: local.clone(),
                    remote: local.clone(),
                }),
                [local, remote] => Ok(LinkDirective::ExportDynamic {
                    local: local.clone(),
                    remote: remote.clone(),
                }),
                _ => Err(usage("<local> [<remote>]")),
            },
            "cgo_import_static" => match args {
                [local] => Ok(LinkDirective::ImportStatic {
                    local: local.clone(),
                }),
                _ => Err(usage("<local>")),
            },
            "cgo_export_static" => match args {
                [local] => Ok(LinkDirective::ExportStatic {
                    local: local.clone(),
                    remote: local.clone(),
                }),
                [local, remote] => Ok(LinkDirective::ExportStatic {
                    local: local.clone(),
                    remote: remote.clone(),
                }),
                _ => Err(usage("<local> [<remote>]")),
            },
            "cgo_ldflag" => match args {
                [arg] => Ok(LinkDirective::LdFlag { arg: arg.clone() }),
                _ => Err(usage("\"<arg>\"")),
            },
            other => Err(format!("unknown link directive `{}`", other)),
        }
    }
}

/// Render directives one per line.
pub fn render(directives: &[LinkDirective]) -> String {
    directives.iter().map(|d| format!("{}\n", d)).collect()
}

/// Parse a directive file, skipping blank lines and `//` comments.
pub fn parse_all(text: &str) -> Result<Vec<LinkDirective>, String> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with("//"))
        .map(|(i, line)| {
            let line = line.strip_prefix("#pragma ").unwrap_or(line);
            line.parse().map_err(|e| format!("line {}: {}", i + 1, e))
        })
        .collect()
}
