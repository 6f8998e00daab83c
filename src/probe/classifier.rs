//! Diagnostic classifiers keyed by toolchain identity.
//!
//! The prober learns what an identifier is from the compiler's complaints
//! about it. Each compiler family words those complaints differently; a
//! classifier maps one family's wording to [`Evidence`]. The phrasings are
//! pinned by the conformance fixtures in `fixtures.rs`.

use std::sync::OnceLock;

use regex::Regex;

use crate::builder::toolchain::ToolchainPlatform;

/// What a single diagnostic says about the probed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Evidence {
    /// The name is a type.
    Type,
    /// The name is an expression with no effect: function or variable
    /// (constants too, until the enum line says otherwise).
    Expression,
    /// The name cannot initialize an enumerator.
    NotIntegerConstant,
    /// The name is not declared at all.
    Undeclared,
}

/// Severity of a compiler diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagSeverity {
    Error,
    Warning,
    Note,
}

/// One `file:line[:col]: severity: message` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerDiagnostic {
    pub file: String,
    pub line: usize,
    pub severity: DiagSeverity,
    pub message: String,
}

/// Parse the diagnostic lines out of compiler stderr, ignoring context
/// lines (`In function ...`, carets, source excerpts).
pub fn parse_diagnostics(stderr: &str) -> Vec<CompilerDiagnostic> {
    static LINE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = LINE
        .get_or_init(|| {
            Regex::new(
                r"^(?P<file>[^:\n]+):(?P<line>\d+):(?:\d+:)?\s*(?P<sev>fatal error|error|warning|note):\s*(?P<msg>.*)$",
            )
            .ok()
        })
        .as_ref()
    else {
        return Vec::new();
    };

    stderr
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let severity = match &caps["sev"] {
                "warning" => DiagSeverity::Warning,
                "note" => DiagSeverity::Note,
                _ => DiagSeverity::Error,
            };
            Some(CompilerDiagnostic {
                file: caps["file"].to_string(),
                line: caps["line"].parse().ok()?,
                severity,
                message: caps["msg"].trim().to_string(),
            })
        })
        .collect()
}

/// Maps one toolchain's diagnostic wording to evidence.
pub trait Classifier: Send + Sync {
    /// Toolchain family this classifier was written against.
    fn identity(&self) -> &'static str;

    /// Classify a diagnostic message, or `None` if it is not evidence.
    fn classify(&self, message: &str) -> Option<Evidence>;
}

/// GCC wording.
#[derive(Debug, Default, Clone, Copy)]
pub struct GccClassifier;

impl Classifier for GccClassifier {
    fn identity(&self) -> &'static str {
        "gcc"
    }

    fn classify(&self, message: &str) -> Option<Evidence> {
        if message.contains("useless type name in empty declaration")
            || message.contains("unexpected type name")
            || message.contains("declaration does not declare anything")
        {
            Some(Evidence::Type)
        } else if message.contains("statement with no effect") {
            Some(Evidence::Expression)
        } else if message.contains("not an integer constant") {
            Some(Evidence::NotIntegerConstant)
        } else if message.contains("undeclared") {
            Some(Evidence::Undeclared)
        } else {
            None
        }
    }
}

/// Clang wording (also used for Apple Clang).
#[derive(Debug, Default, Clone, Copy)]
pub struct ClangClassifier;

impl Classifier for ClangClassifier {
    fn identity(&self) -> &'static str {
        "clang"
    }

    fn classify(&self, message: &str) -> Option<Evidence> {
        if message.contains("unexpected type name")
            || message.contains("declaration does not declare anything")
        {
            Some(Evidence::Type)
        } else if message.contains("expression result unused") {
            Some(Evidence::Expression)
        } else if message.contains("not an integer constant") {
            Some(Evidence::NotIntegerConstant)
        } else if message.contains("use of undeclared identifier") {
            Some(Evidence::Undeclared)
        } else {
            None
        }
    }
}

/// The classifier for a toolchain family.
pub fn classifier_for(platform: ToolchainPlatform) -> Box<dyn Classifier> {
    match platform {
        ToolchainPlatform::Gcc => Box::new(GccClassifier),
        ToolchainPlatform::Clang | ToolchainPlatform::AppleClang => Box::new(ClangClassifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fixtures::{CLANG_FIXTURE, GCC_FIXTURE};

    fn evidence(classifier: &dyn Classifier, fixture: &str) -> Vec<(String, usize, Option<Evidence>)> {
        parse_diagnostics(fixture)
            .into_iter()
            .map(|d| (d.file, d.line, classifier.classify(&d.message)))
            .collect()
    }

    #[test]
    fn test_gcc_conformance_fixture() {
        let ev = evidence(&GccClassifier, GCC_FIXTURE);
        assert_eq!(ev[0], ("cgo-test".to_string(), 1, Some(Evidence::Type)));
        assert_eq!(ev[1], ("cgo-enum".to_string(), 1, None));
        assert_eq!(ev[2], ("cgo-test".to_string(), 2, Some(Evidence::Expression)));
        assert_eq!(ev[3], ("cgo-enum".to_string(), 2, Some(Evidence::NotIntegerConstant)));
        assert_eq!(ev[4], ("cgo-test".to_string(), 3, Some(Evidence::Expression)));
        assert_eq!(ev[5], ("cgo-test".to_string(), 4, Some(Evidence::Undeclared)));
    }

    #[test]
    fn test_clang_conformance_fixture() {
        let ev = evidence(&ClangClassifier, CLANG_FIXTURE);
        assert_eq!(ev.len(), 6);
        assert_eq!(ev[0].2, Some(Evidence::Type));
        assert_eq!(ev[1].2, Some(Evidence::Type));
        assert_eq!(ev[2].2, Some(Evidence::Expression));
        assert_eq!(ev[3].2, Some(Evidence::NotIntegerConstant));
        assert_eq!(ev[5].2, Some(Evidence::Undeclared));
    }

    #[test]
    fn test_parse_diagnostics_skips_context_lines() {
        let diags = parse_diagnostics("In file included from a.h:1:\nfoo.c:3:5: error: boom\n   3 | x\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file, "foo.c");
        assert_eq!(diags[0].line, 3);
        assert_eq!(diags[0].severity, DiagSeverity::Error);
        assert_eq!(diags[0].message, "boom");
    }

    #[test]
    fn test_classifier_selection() {
        assert_eq!(classifier_for(ToolchainPlatform::Gcc).identity(), "gcc");
        assert_eq!(classifier_for(ToolchainPlatform::AppleClang).identity(), "clang");
    }
}
