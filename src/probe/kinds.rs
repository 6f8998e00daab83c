//! Kind probing through compiler diagnostics.
//!
//! For identifiers `n0..nk` the probe program is
//!
//! ```c
//! <preamble>
//! void __cgo__f__(void) {
//! #line 1 "cgo-test"
//! n0;
//! #line 1 "cgo-enum"
//! enum { __cgo_enum__0 = n0 };
//! ...
//! }
//! ```
//!
//! so every diagnostic names the identifier it is about through its line
//! number, and the file name tells which of the two statements produced it.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use anyhow::Result;

use super::classifier::{parse_diagnostics, Classifier, DiagSeverity, Evidence};
use crate::builder::toolchain::Toolchain;
use crate::core::ident::IdentKind;
use crate::util::errors::BridgeError;

const TEST_FILE: &str = "cgo-test";
const ENUM_FILE: &str = "cgo-enum";

/// Result of one probe run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Terminal kinds by name
    pub kinds: BTreeMap<String, IdentKind>,
    /// Names with no kind, with the compiler's reason
    pub unresolved: Vec<(String, String)>,
    /// Names that produced contradictory evidence
    pub suspicious: Vec<String>,
}

/// Runs the kind probe against one toolchain.
pub struct KindProber<'a> {
    toolchain: &'a dyn Toolchain,
    classifier: Box<dyn Classifier>,
    cflags: Vec<String>,
}

impl<'a> KindProber<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, cflags: Vec<String>) -> Self {
        KindProber {
            toolchain,
            classifier: super::classifier::classifier_for(toolchain.platform()),
            cflags,
        }
    }

    /// Use a specific classifier instead of the one keyed by the toolchain.
    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Classify `names` against `preamble`.
    pub fn probe(&self, preamble: &str, names: &[String]) -> Result<ProbeOutcome> {
        if names.is_empty() {
            return Ok(ProbeOutcome::default());
        }

        let program = probe_program(preamble, names);
        let output = self
            .toolchain
            .syntax_check_command(&self.cflags, &program)
            .into_process()
            .exec()?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        tracing::debug!(
            "kind probe of {} name(s) with {} classifier",
            names.len(),
            self.classifier.identity()
        );
        let outcome = interpret(
            self.classifier.as_ref(),
            names,
            &stderr,
            output.status.success(),
        )?;
        for name in &outcome.suspicious {
            tracing::warn!(
                "C.{}: compiler reported both type and expression diagnostics; treating as a type",
                name
            );
        }
        Ok(outcome)
    }
}

/// Synthesize the probe program.
pub fn probe_program(preamble: &str, names: &[String]) -> String {
    let mut out = String::with_capacity(preamble.len() + names.len() * 64);
    out.push_str(preamble);
    if !preamble.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("#line 1 \"cgo-generated\"\nvoid __cgo__f__(void) {\n");
    for (i, name) in names.iter().enumerate() {
        let line = i + 1;
        let _ = writeln!(out, "#line {} \"{}\"\n{};", line, TEST_FILE, name);
        let _ = writeln!(
            out,
            "#line {} \"{}\"\nenum {{ __cgo_enum__{} = {} }};",
            line, ENUM_FILE, i, name
        );
    }
    out.push_str("}\n");
    out
}

/// Turn compiler stderr into kinds.
///
/// Errors outside the two probe files mean the preamble itself is broken;
/// that fails the whole probe with the raw diagnostics.
pub fn interpret(
    classifier: &dyn Classifier,
    names: &[String],
    stderr: &str,
    success: bool,
) -> Result<ProbeOutcome, BridgeError> {
    let mut evidence: Vec<HashSet<Evidence>> = vec![HashSet::new(); names.len()];
    let mut unexplained: Vec<Option<String>> = vec![None; names.len()];
    let mut foreign_errors = 0;
    let diagnostics = parse_diagnostics(stderr);

    for diag in &diagnostics {
        if diag.severity == DiagSeverity::Note {
            continue;
        }
        let in_probe = diag.file == TEST_FILE || diag.file == ENUM_FILE;
        if !in_probe || diag.line == 0 || diag.line > names.len() {
            if diag.severity == DiagSeverity::Error {
                foreign_errors += 1;
            }
            continue;
        }
        let idx = diag.line - 1;
        match classifier.classify(&diag.message) {
            Some(ev) => {
                evidence[idx].insert(ev);
            }
            None if diag.severity == DiagSeverity::Error && diag.file == TEST_FILE => {
                unexplained[idx].get_or_insert_with(|| diag.message.clone());
            }
            None => {}
        }
    }

    if foreign_errors > 0 || (!success && diagnostics.is_empty()) {
        return Err(BridgeError::ProbeCompile {
            diagnostics: stderr.to_string(),
        });
    }

    let mut outcome = ProbeOutcome::default();
    for (i, name) in names.iter().enumerate() {
        let ev = &evidence[i];
        let kind = if ev.contains(&Evidence::Type) {
            if ev.contains(&Evidence::Expression) || ev.contains(&Evidence::NotIntegerConstant) {
                outcome.suspicious.push(name.clone());
            }
            IdentKind::Type
        } else if ev.contains(&Evidence::Undeclared) {
            outcome
                .unresolved
                .push((name.clone(), "not declared by the preamble".to_string()));
            continue;
        } else if let Some(reason) = &unexplained[i] {
            outcome.unresolved.push((name.clone(), reason.clone()));
            continue;
        } else if ev.contains(&Evidence::NotIntegerConstant) {
            IdentKind::FunctionOrVariable
        } else {
            IdentKind::Constant
        };
        outcome.kinds.insert(name.clone(), kind);
    }

    Ok(outcome)
}
