//! Preamble extraction and `#cgo` directive parsing.
//!
//! The preamble is the comment group written immediately before
//! `import "C"`. Lines starting with `#cgo` are build directives; they are
//! removed from the C text (replaced by blank lines so line numbers keep
//! matching the managed file) and parsed into [`Directive`]s.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::lexer::{comment_text, unquote, Token, TokenKind};
use crate::core::directive::{split_quoted, Condition, ConditionTerm, Directive, DirectiveKind};
use crate::util::errors::PreambleError;

/// Literal C text attached to a foreign-namespace import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preamble {
    /// C source with `#cgo` lines blanked out
    pub text: String,
    /// 1-based line of the managed file where the text starts (0 if empty)
    pub first_line: usize,
    pub directives: Vec<Directive>,
}

impl Preamble {
    /// The text prefixed with a `#line` marker pointing back at the managed
    /// file, so C diagnostics name the right place.
    pub fn with_line_marker(&self, file: &Path) -> String {
        if self.text.is_empty() {
            return String::new();
        }
        format!(
            "#line {} \"{}\"\n{}",
            self.first_line,
            file.display(),
            self.text
        )
    }
}

/// Location of the `import "C"` declaration inside the managed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeImport {
    /// Byte span to blank out when rewriting the file
    pub span: (usize, usize),
    pub line: usize,
    pub preamble: Preamble,
}

/// A single line of comment text with its origin in the managed file.
struct CommentLine<'a> {
    text: &'a str,
    line: usize,
    offset: usize,
}

/// Find `import "C"` and the comment group that documents it.
pub fn find_bridge_import(
    path: &Path,
    src: &str,
    tokens: &[Token],
) -> Result<Option<BridgeImport>, PreambleError> {
    let code: Vec<usize> = (0..tokens.len())
        .filter(|&i| !tokens[i].is_comment())
        .collect();

    for (ci, &i) in code.iter().enumerate() {
        if !tokens[i].is_ident(src, "import") {
            continue;
        }
        let Some(&next) = code.get(ci + 1) else { break };

        // import "C"
        if is_c_path(&tokens[next], src) {
            let span = (tokens[i].start, tokens[next].end);
            let preamble = collect_preamble(path, src, tokens, i)?;
            return Ok(Some(BridgeImport {
                span,
                line: tokens[i].line,
                preamble,
            }));
        }

        // import ( ... "C" ... )
        if tokens[next].is_punct(src, "(") {
            for &j in &code[ci + 2..] {
                if tokens[j].is_punct(src, ")") {
                    break;
                }
                if is_c_path(&tokens[j], src) {
                    let preamble = collect_preamble(path, src, tokens, j)?;
                    return Ok(Some(BridgeImport {
                        span: (tokens[j].start, tokens[j].end),
                        line: tokens[j].line,
                        preamble,
                    }));
                }
            }
        }
    }

    Ok(None)
}

fn is_c_path(tok: &Token, src: &str) -> bool {
    tok.kind == TokenKind::Str && unquote(tok.text(src)).as_deref() == Some("C")
}

/// Walk backwards from `anchor` over adjacent comments.
fn collect_preamble(
    path: &Path,
    src: &str,
    tokens: &[Token],
    anchor: usize,
) -> Result<Preamble, PreambleError> {
    let mut group = Vec::new();
    let mut next_line = tokens[anchor].line;
    let mut i = anchor;
    while i > 0 {
        let tok = &tokens[i - 1];
        if !tok.is_comment() || tok.end_line + 1 < next_line {
            break;
        }
        group.push(*tok);
        next_line = tok.line;
        i -= 1;
    }
    group.reverse();

    let Some(first) = group.first() else {
        return Ok(Preamble::default());
    };

    let mut lines = Vec::new();
    for tok in &group {
        let body = comment_text(tok, src);
        let body_offset = tok.start + 2;
        let mut offset = body_offset;
        for (k, text) in body.split('\n').enumerate() {
            lines.push(CommentLine {
                text,
                line: tok.line + k,
                offset,
            });
            offset += text.len() + 1;
        }
    }

    let mut text = String::new();
    let mut directives = Vec::new();
    for line in &lines {
        let trimmed = line.text.trim_start();
        let is_directive = trimmed
            .strip_prefix("#cgo")
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']));
        if is_directive {
            let span = (line.offset, line.text.len());
            let directive = parse_directive(trimmed, line.line)
                .map_err(|msg| PreambleError::new(path, src, line.line, span, msg))?;
            directives.push(directive);
            text.push('\n');
        } else {
            text.push_str(line.text);
            text.push('\n');
        }
    }

    Ok(Preamble {
        text,
        first_line: first.line,
        directives,
    })
}

/// Parse one `#cgo [cond...] VERB: values` line.
pub fn parse_directive(line: &str, line_no: usize) -> Result<Directive, String> {
    let rest = line
        .trim()
        .strip_prefix("#cgo")
        .ok_or_else(|| "not a #cgo directive".to_string())?;
    let (head, values) = rest
        .split_once(':')
        .ok_or_else(|| format!("missing colon in #cgo directive: {}", line.trim()))?;

    let mut fields: Vec<&str> = head.split_whitespace().collect();
    let verb = fields
        .pop()
        .ok_or_else(|| format!("missing verb in #cgo directive: {}", line.trim()))?;
    let kind = DirectiveKind::from_str(verb)?;

    let terms = fields
        .into_iter()
        .map(ConditionTerm::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    let values = split_quoted(values)?;
    if kind == DirectiveKind::PkgConfig {
        if let Some(bad) = values.iter().find(|v| v.starts_with('-') && !v.starts_with("--")) {
            return Err(format!("invalid pkg-config package name: {}", bad));
        }
    }

    Ok(Directive {
        kind,
        condition: Condition { terms },
        values,
        line: line_no,
    })
}
