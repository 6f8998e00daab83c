//! `#cgo` build directives and the target they are evaluated against.
//!
//! A directive carries a kind, an optional platform condition and a list of
//! values. Directives of the same kind whose condition matches the target
//! concatenate in source order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The flag set a directive contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    CFlags,
    CppFlags,
    CxxFlags,
    LdFlags,
    PkgConfig,
}

impl DirectiveKind {
    /// Spelling used in source comments.
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKind::CFlags => "CFLAGS",
            DirectiveKind::CppFlags => "CPPFLAGS",
            DirectiveKind::CxxFlags => "CXXFLAGS",
            DirectiveKind::LdFlags => "LDFLAGS",
            DirectiveKind::PkgConfig => "pkg-config",
        }
    }

    /// Environment variable appended after source-declared flags.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            DirectiveKind::CFlags => Some("CGO_CFLAGS"),
            DirectiveKind::CppFlags => Some("CGO_CPPFLAGS"),
            DirectiveKind::CxxFlags => Some("CGO_CXXFLAGS"),
            DirectiveKind::LdFlags => Some("CGO_LDFLAGS"),
            DirectiveKind::PkgConfig => None,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirectiveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CFLAGS" => Ok(DirectiveKind::CFlags),
            "CPPFLAGS" => Ok(DirectiveKind::CppFlags),
            "CXXFLAGS" => Ok(DirectiveKind::CxxFlags),
            "LDFLAGS" => Ok(DirectiveKind::LdFlags),
            "pkg-config" => Ok(DirectiveKind::PkgConfig),
            other => Err(format!("invalid #cgo verb: {}", other)),
        }
    }
}

/// Target platform, in managed-toolchain spelling (`linux`, `amd64`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub goos: String,
    pub goarch: String,
}

impl Target {
    pub fn new(goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        Target {
            goos: goos.into(),
            goarch: goarch.into(),
        }
    }

    /// Detect the current host platform.
    pub fn host() -> Self {
        let goos = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let goarch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            "powerpc64" => "ppc64",
            other => other,
        };
        Target::new(goos, goarch)
    }

    /// Pointer width of the target architecture in bytes.
    pub fn pointer_size(&self) -> u64 {
        match self.goarch.as_str() {
            "386" | "arm" | "mips" | "mipsle" | "wasm32" => 4,
            _ => 8,
        }
    }

    /// Host platform with `GOOS`/`GOARCH` environment overrides applied.
    pub fn from_env() -> Self {
        let host = Target::host();
        Target {
            goos: std::env::var("GOOS").unwrap_or(host.goos),
            goarch: std::env::var("GOARCH").unwrap_or(host.goarch),
        }
    }
}

/// One term of a directive condition: `goos`, `goarch`, `goos/goarch`,
/// optionally negated with `!`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionTerm {
    pub negated: bool,
    pub os_or_arch: String,
    pub arch: Option<String>,
}

impl ConditionTerm {
    fn matches(&self, target: &Target) -> bool {
        let positive = match &self.arch {
            Some(arch) => self.os_or_arch == target.goos && arch == &target.goarch,
            None => self.os_or_arch == target.goos || self.os_or_arch == target.goarch,
        };
        positive != self.negated
    }
}

impl FromStr for ConditionTerm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negated, body) = match s.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let valid = |part: &str| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        match body.split_once('/') {
            Some((os, arch)) if valid(os) && valid(arch) => Ok(ConditionTerm {
                negated,
                os_or_arch: os.to_string(),
                arch: Some(arch.to_string()),
            }),
            None if valid(body) => Ok(ConditionTerm {
                negated,
                os_or_arch: body.to_string(),
                arch: None,
            }),
            _ => Err(format!("invalid #cgo condition: {}", s)),
        }
    }
}

/// Condition on a directive: matches when any of its terms matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub terms: Vec<ConditionTerm>,
}

impl Condition {
    /// Check if this condition matches the target.
    pub fn matches(&self, target: &Target) -> bool {
        self.terms.is_empty() || self.terms.iter().any(|t| t.matches(target))
    }
}

/// A parsed `#cgo` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub condition: Condition,
    pub values: Vec<String>,
    /// 1-based line in the managed source file
    pub line: usize,
}

/// Effective flags for one package after condition evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFlags {
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub pkg_config: Vec<String>,
}

impl BuildFlags {
    /// Fold matching directives in source order.
    pub fn from_directives<'a>(
        directives: impl IntoIterator<Item = &'a Directive>,
        target: &Target,
    ) -> Self {
        let mut flags = BuildFlags::default();
        for directive in directives {
            if directive.condition.matches(target) {
                flags
                    .slot_mut(directive.kind)
                    .extend(directive.values.iter().cloned());
            }
        }
        flags
    }

    /// Append the `CGO_*FLAGS` environment overrides after source flags.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for kind in [
            DirectiveKind::CFlags,
            DirectiveKind::CppFlags,
            DirectiveKind::CxxFlags,
            DirectiveKind::LdFlags,
        ] {
            let Some(var) = kind.env_var() else { continue };
            if let Some(value) = lookup(var) {
                self.slot_mut(kind).extend(split_quoted(&value).unwrap_or_default());
            }
        }
    }

    pub fn slot_mut(&mut self, kind: DirectiveKind) -> &mut Vec<String> {
        match kind {
            DirectiveKind::CFlags => &mut self.cflags,
            DirectiveKind::CppFlags => &mut self.cppflags,
            DirectiveKind::CxxFlags => &mut self.cxxflags,
            DirectiveKind::LdFlags => &mut self.ldflags,
            DirectiveKind::PkgConfig => &mut self.pkg_config,
        }
    }

    /// Flags passed when compiling C: CPPFLAGS then CFLAGS.
    pub fn compile_flags(&self) -> Vec<String> {
        self.cppflags
            .iter()
            .chain(self.cflags.iter())
            .cloned()
            .collect()
    }

    /// Merge another package file's flags into this one, preserving order.
    pub fn merge(&mut self, other: &BuildFlags) {
        self.cflags.extend(other.cflags.iter().cloned());
        self.cppflags.extend(other.cppflags.iter().cloned());
        self.cxxflags.extend(other.cxxflags.iter().cloned());
        self.ldflags.extend(other.ldflags.iter().cloned());
        self.pkg_config.extend(other.pkg_config.iter().cloned());
    }
}

/// Split a string into fields, honoring single and double quotes and
/// backslash escapes.
pub fn split_quoted(s: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_field = false;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => {
                escaped = true;
                in_field = true;
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_field = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_field {
                    fields.push(std::mem::take(&mut current));
                    in_field = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_field = true;
            }
        }
    }

    if escaped {
        return Err("unfinished escaping".to_string());
    }
    if quote.is_some() {
        return Err("unclosed quote".to_string());
    }
    if in_field {
        fields.push(current);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(kind: DirectiveKind, cond: &[&str], values: &[&str]) -> Directive {
        Directive {
            kind,
            condition: Condition {
                terms: cond.iter().map(|c| c.parse().unwrap()).collect(),
            },
            values: values.iter().map(|v| v.to_string()).collect(),
            line: 1,
        }
    }

    #[test]
    fn test_condition_matching() {
        let linux_amd64 = Target::new("linux", "amd64");

        let term: ConditionTerm = "linux".parse().unwrap();
        assert!(term.matches(&linux_amd64));
        let term: ConditionTerm = "amd64".parse().unwrap();
        assert!(term.matches(&linux_amd64));
        let term: ConditionTerm = "linux/arm64".parse().unwrap();
        assert!(!term.matches(&linux_amd64));
        let term: ConditionTerm = "!windows".parse().unwrap();
        assert!(term.matches(&linux_amd64));
        assert!("linux/".parse::<ConditionTerm>().is_err());
    }

    #[test]
    fn test_ldflags_concatenate_in_order() {
        let target = Target::new("linux", "amd64");
        let directives = vec![
            directive(DirectiveKind::LdFlags, &[], &["-lpng"]),
            directive(DirectiveKind::CFlags, &["linux"], &["-DLINUX=1"]),
            directive(DirectiveKind::CFlags, &["darwin"], &["-DDARWIN=1"]),
            directive(DirectiveKind::LdFlags, &[], &["-lcairo"]),
        ];

        let flags = BuildFlags::from_directives(&directives, &target);
        assert_eq!(flags.ldflags, vec!["-lpng", "-lcairo"]);
        assert_eq!(flags.cflags, vec!["-DLINUX=1"]);
    }

    #[test]
    fn test_env_flags_come_last() {
        let target = Target::new("linux", "amd64");
        let directives = vec![directive(DirectiveKind::CFlags, &[], &["-DA"])];
        let mut flags = BuildFlags::from_directives(&directives, &target);
        flags.apply_env(|var| (var == "CGO_CFLAGS").then(|| "-O2 -g".to_string()));
        assert_eq!(flags.cflags, vec!["-DA", "-O2", "-g"]);
    }

    #[test]
    fn test_split_quoted() {
        assert_eq!(
            split_quoted(r#"-I/usr/include "-DNAME=a b" 'x y' z\ w"#).unwrap(),
            vec!["-I/usr/include", "-DNAME=a b", "x y", "z w"]
        );
        assert!(split_quoted("\"open").is_err());
        assert_eq!(split_quoted("  ").unwrap(), Vec::<String>::new());
    }
}
