//! User-facing diagnostic messages.
//!
//! Every error shown by the CLI carries its root cause, the facts that led
//! to it (compiler output, offending identifiers, the packages involved)
//! and where possible a suggested fix.

use std::fmt::{self, Write};
use std::path::PathBuf;

/// Where a diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: Option<usize>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file.display(), line),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

/// An error report with context lines and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    /// Facts, one per line (compiler diagnostics, failing names, ...)
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, file: impl Into<PathBuf>, line: Option<usize>) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
        });
        self
    }

    /// Render for the terminal.
    pub fn format(&self, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("\x1b[1;{}m{}\x1b[0m", code, text)
            } else {
                text.to_string()
            }
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", paint("31", "error"), self.message);
        if let Some(location) = &self.location {
            let _ = writeln!(out, "  --> {}", location);
        }
        for line in &self.context {
            let _ = writeln!(out, "  = {}", line);
        }
        match self.suggestions.as_slice() {
            [] => {}
            [only] => {
                let _ = writeln!(out, "\n{}: {}", paint("32", "help"), only);
            }
            many => {
                let _ = writeln!(out, "\n{}: consider:", paint("32", "help"));
                for (i, suggestion) in many.iter().enumerate() {
                    let _ = writeln!(out, "  {}. {}", i + 1, suggestion);
                }
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
