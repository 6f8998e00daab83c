//! Error taxonomy for the bridge pipeline.
//!
//! Every failure the pipeline can report is one of these variants. None of
//! them is ever downgraded to a warning by the stage that raised it.

use std::path::PathBuf;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// Malformed `#cgo` directive or invalid preamble.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("{file}:{line}: {message}")]
#[diagnostic(
    code(cbridge::preamble),
    help("directives look like `#cgo [GOOS[/GOARCH]] CFLAGS: -DX=1` or `#cgo pkg-config: name`")
)]
pub struct PreambleError {
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: SourceSpan,
}

impl PreambleError {
    /// Create an error pointing at `span` inside `source`.
    pub fn new(
        file: impl Into<PathBuf>,
        source: &str,
        line: usize,
        span: (usize, usize),
        message: impl Into<String>,
    ) -> Self {
        let file = file.into();
        PreambleError {
            src: NamedSource::new(file.display().to_string(), source.to_string()),
            file,
            line,
            message: message.into(),
            span: span.into(),
        }
    }
}

/// Errors raised by the bridge pipeline.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Preamble(#[from] PreambleError),

    #[error("probe program failed to compile for reasons unrelated to the probed names")]
    ProbeCompile { diagnostics: String },

    #[error("could not determine the kind of {} C identifier(s)", .names.len())]
    UnresolvedIdentifiers {
        /// (identifier, reason)
        names: Vec<(String, String)>,
    },

    #[error("could not extract layout for {} C identifier(s)", .failures.len())]
    LayoutExtraction {
        /// (identifier, reason)
        failures: Vec<(String, String)>,
    },

    #[error("generated symbol `{name}` collides between `{first}` and `{second}`")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("conflicting link directives for `{symbol}`")]
    LinkDirectiveConflict {
        symbol: String,
        /// (package, directive)
        first: (String, String),
        second: (String, String),
    },

    #[error("{} undefined symbol(s) in {mode} link", .symbols.len())]
    UnresolvedSymbols {
        mode: String,
        /// (symbol, referencing object)
        symbols: Vec<(String, String)>,
    },

    #[error("`{command}` failed with exit code {code:?}")]
    ExternalToolFailure {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl BridgeError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BridgeError::Preamble(err) => Diagnostic::error(err.message.clone())
                .with_location(err.file.clone(), Some(err.line))
                .with_suggestion("Check the `#cgo` directive syntax in the import comment"),

            BridgeError::ProbeCompile { diagnostics } => {
                let mut diag = Diagnostic::error(self.to_string());
                for line in diagnostics.lines().filter(|l| !l.trim().is_empty()) {
                    diag = diag.with_context(line.to_string());
                }
                diag.with_suggestion("Make sure the preamble compiles on its own")
            }

            BridgeError::UnresolvedIdentifiers { names } => {
                let mut diag = Diagnostic::error(self.to_string());
                for (name, reason) in names {
                    diag = diag.with_context(format!("C.{}: {}", name, reason));
                }
                diag.with_suggestion("Declare the missing names in the preamble or #include their header")
            }

            BridgeError::LayoutExtraction { failures } => {
                let mut diag = Diagnostic::error(self.to_string());
                for (name, reason) in failures {
                    diag = diag.with_context(format!("C.{}: {}", name, reason));
                }
                diag
            }

            BridgeError::NameCollision { first, second, .. } => Diagnostic::error(self.to_string())
                .with_context(format!("first defined by {}", first))
                .with_context(format!("redefined by {}", second)),

            BridgeError::LinkDirectiveConflict { first, second, .. } => {
                Diagnostic::error(self.to_string())
                    .with_context(format!("`{}` declares {}", first.0, first.1))
                    .with_context(format!("`{}` declares {}", second.0, second.1))
                    .with_suggestion("Make both packages agree on the symbol binding")
            }

            BridgeError::UnresolvedSymbols { mode, symbols } => {
                let mut diag = Diagnostic::error(self.to_string());
                for (symbol, object) in symbols {
                    diag = diag.with_context(format!("{} (referenced from {})", symbol, object));
                }
                if mode == "internal" {
                    diag = diag.with_suggestion("Link with `--linkmode external`");
                }
                diag
            }

            BridgeError::ExternalToolFailure { stdout, stderr, .. } => {
                let mut diag = Diagnostic::error(self.to_string());
                for line in stdout.lines().chain(stderr.lines()) {
                    diag = diag.with_context(line.to_string());
                }
                diag
            }
        }
    }
}
