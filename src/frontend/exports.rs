//! `//export Name` directives on managed functions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::lexer::{comment_text, Token, TokenKind};
use crate::util::errors::PreambleError;

/// A managed parameter or result: optional name plus the type as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedParam {
    pub name: Option<String>,
    pub ty: String,
}

/// A managed function callable from C.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFunc {
    pub name: String,
    pub params: Vec<ManagedParam>,
    pub results: Vec<ManagedParam>,
    pub line: usize,
}

/// Find `//export` comments and parse the functions they annotate.
pub fn collect_exports(
    path: &Path,
    src: &str,
    tokens: &[Token],
) -> Result<Vec<ExportedFunc>, PreambleError> {
    let mut exports = Vec::new();

    for (i, tok) in tokens.iter().enumerate() {
        if tok.kind != TokenKind::LineComment {
            continue;
        }
        let Some(name) = comment_text(tok, src).strip_prefix("export ") else {
            continue;
        };
        let name = name.trim();
        let fail = |msg: String| {
            PreambleError::new(path, src, tok.line, (tok.start, tok.end - tok.start), msg)
        };

        // The annotated declaration is the next code token, after any
        // further doc comments.
        let mut j = i + 1;
        while j < tokens.len() && tokens[j].is_comment() {
            j += 1;
        }
        if !tokens.get(j).is_some_and(|t| t.is_ident(src, "func")) {
            return Err(fail(format!("//export {} is not followed by a function", name)));
        }
        j += 1;
        if tokens.get(j).is_some_and(|t| t.is_punct(src, "(")) {
            return Err(fail(format!("cannot export method {}", name)));
        }
        match tokens.get(j) {
            Some(t) if t.is_ident(src, name) => {}
            Some(t) if t.kind == TokenKind::Ident => {
                return Err(fail(format!(
                    "//export comment has wrong name {}, want {}",
                    name,
                    t.text(src)
                )))
            }
            _ => return Err(fail(format!("malformed function after //export {}", name))),
        }
        j += 1;

        let (params, after) = parse_group(src, tokens, j)
            .ok_or_else(|| fail(format!("malformed parameter list for {}", name)))?;
        let results = if tokens.get(after).is_some_and(|t| t.is_punct(src, "(")) {
            parse_group(src, tokens, after)
                .ok_or_else(|| fail(format!("malformed result list for {}", name)))?
                .0
        } else {
            let end = (after..tokens.len())
                .find(|&k| tokens[k].is_punct(src, "{"))
                .unwrap_or(tokens.len());
            let ty = render_type(src, &tokens[after..end]);
            if ty.is_empty() {
                Vec::new()
            } else {
                vec![ManagedParam { name: None, ty }]
            }
        };

        exports.push(ExportedFunc {
            name: name.to_string(),
            params,
            results,
            line: tok.line,
        });
    }

    Ok(exports)
}

/// Parse `( ... )` starting at `open`; returns the parameters and the index
/// after the closing parenthesis.
fn parse_group(src: &str, tokens: &[Token], open: usize) -> Option<(Vec<ManagedParam>, usize)> {
    if !tokens.get(open)?.is_punct(src, "(") {
        return None;
    }
    let mut depth = 0usize;
    let mut items: Vec<Vec<Token>> = vec![Vec::new()];
    let mut k = open + 1;
    loop {
        let tok = *tokens.get(k)?;
        k += 1;
        if tok.is_comment() {
            continue;
        }
        let text = tok.text(src);
        match text {
            ")" if depth == 0 && tok.kind == TokenKind::Punct => break,
            "," if depth == 0 && tok.kind == TokenKind::Punct => {
                items.push(Vec::new());
                continue;
            }
            "(" | "[" | "{" if tok.kind == TokenKind::Punct => depth += 1,
            ")" | "]" | "}" if tok.kind == TokenKind::Punct => depth = depth.saturating_sub(1),
            _ => {}
        }
        if let Some(item) = items.last_mut() {
            item.push(tok);
        }
    }
    items.retain(|item| !item.is_empty());

    // `a, b int` groups names with the next named item's type.
    let is_named = |item: &Vec<Token>| {
        item.len() > 1 && item[0].kind == TokenKind::Ident && !item[1].is_punct(src, ".")
    };
    let any_named = items.iter().any(is_named);

    let mut params = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    for item in &items {
        if !any_named {
            params.push(ManagedParam {
                name: None,
                ty: render_type(src, item),
            });
        } else if is_named(item) {
            let ty = render_type(src, &item[1..]);
            for name in pending.drain(..) {
                params.push(ManagedParam {
                    name: Some(name),
                    ty: ty.clone(),
                });
            }
            params.push(ManagedParam {
                name: Some(item[0].text(src).to_string()),
                ty,
            });
        } else {
            pending.push(item[0].text(src).to_string());
        }
    }
    if !pending.is_empty() {
        return None;
    }
    Some((params, k))
}

/// Canonical text of a type expression.
pub(crate) fn render_type(src: &str, tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev_word = false;
    for tok in tokens.iter().filter(|t| !t.is_comment()) {
        let word = matches!(tok.kind, TokenKind::Ident | TokenKind::Number);
        if word && prev_word {
            out.push(' ');
        }
        out.push_str(tok.text(src));
        prev_word = word;
    }
    out
}
