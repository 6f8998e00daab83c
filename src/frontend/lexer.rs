//! Token scanner for managed source files.
//!
//! The scanner only needs to be exact about what can hide a `C.name`
//! reference: comments, string and rune literals. Everything else is
//! identifiers, numbers and punctuation.

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    RawStr,
    Char,
    LineComment,
    BlockComment,
    Punct,
}

/// A token with its byte span and 1-based line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub end_line: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }

    pub fn is_punct(&self, src: &str, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(src) == p
    }

    pub fn is_ident(&self, src: &str, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(src) == name
    }
}

/// Lexing failure with the offending line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub offset: usize,
    pub message: String,
}

const MULTI_PUNCT: &[&str] = &[
    "...", "<<=", ">>=", "&^=", ":=", "==", "!=", "<=", ">=", "&&", "||", "<-", "++", "--", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^",
];

/// Scan the whole source into tokens.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c == b'\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let start_line = line;
        let err = |message: &str| LexError {
            line: start_line,
            offset: start,
            message: message.to_string(),
        };

        let kind = if src[pos..].starts_with("//") {
            pos = src[pos..].find('\n').map_or(bytes.len(), |n| pos + n);
            TokenKind::LineComment
        } else if src[pos..].starts_with("/*") {
            let close = src[pos + 2..]
                .find("*/")
                .ok_or_else(|| err("comment not terminated"))?;
            let end = pos + 2 + close + 2;
            line += src[pos..end].matches('\n').count();
            pos = end;
            TokenKind::BlockComment
        } else if c == b'"' {
            pos += 1;
            loop {
                match bytes.get(pos) {
                    None | Some(b'\n') => return Err(err("string literal not terminated")),
                    Some(b'\\') => pos += 2,
                    Some(b'"') => {
                        pos += 1;
                        break;
                    }
                    Some(_) => pos += 1,
                }
            }
            TokenKind::Str
        } else if c == b'`' {
            let close = src[pos + 1..]
                .find('`')
                .ok_or_else(|| err("raw string literal not terminated"))?;
            let end = pos + 1 + close + 1;
            line += src[pos..end].matches('\n').count();
            pos = end;
            TokenKind::RawStr
        } else if c == b'\'' {
            pos += 1;
            loop {
                match bytes.get(pos) {
                    None | Some(b'\n') => return Err(err("rune literal not terminated")),
                    Some(b'\\') => pos += 2,
                    Some(b'\'') => {
                        pos += 1;
                        break;
                    }
                    Some(_) => pos += 1,
                }
            }
            TokenKind::Char
        } else if c == b'_' || c.is_ascii_alphabetic() || c >= 0x80 {
            while pos < bytes.len()
                && (bytes[pos] == b'_' || bytes[pos].is_ascii_alphanumeric() || bytes[pos] >= 0x80)
            {
                pos += 1;
            }
            TokenKind::Ident
        } else if c.is_ascii_digit()
            || (c == b'.' && bytes.get(pos + 1).is_some_and(|b| b.is_ascii_digit()))
        {
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'.' || bytes[pos] == b'_')
            {
                // Exponent signs belong to the literal.
                if matches!(bytes[pos], b'e' | b'E' | b'p' | b'P')
                    && matches!(bytes.get(pos + 1), Some(b'+' | b'-'))
                {
                    pos += 1;
                }
                pos += 1;
            }
            TokenKind::Number
        } else {
            let rest = &src[pos..];
            let len = MULTI_PUNCT
                .iter()
                .find(|p| rest.starts_with(**p))
                .map_or_else(|| rest.chars().next().map_or(1, char::len_utf8), |p| p.len());
            pos += len;
            TokenKind::Punct
        };

        tokens.push(Token {
            kind,
            start,
            end: pos.min(bytes.len()),
            line: start_line,
            end_line: line,
        });
    }

    Ok(tokens)
}

/// Text of a comment token without its delimiters.
pub fn comment_text<'a>(tok: &Token, src: &'a str) -> &'a str {
    let text = tok.text(src);
    match tok.kind {
        TokenKind::LineComment => &text[2..],
        TokenKind::BlockComment => &text[2..text.len() - 2],
        _ => text,
    }
}

/// Decode an interpreted string literal (with quotes).
pub fn unquote(lit: &str) -> Option<String> {
    if let Some(raw) = lit.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return Some(raw.to_string());
    }
    let body = lit.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_text(src: &str) -> Vec<(TokenKind, String)> {
        tokenize(src)
            .unwrap()
            .iter()
            .map(|t| (t.kind, t.text(src).to_string()))
            .collect()
    }

    #[test]
    fn test_references_hidden_in_literals() {
        let src = "x := \"C.puts\" + `C.raw` // C.comment\ny := C.puts";
        let toks = kinds_and_text(src);
        let idents: Vec<_> = toks
            .iter()
            .filter(|(k, _)| *k == TokenKind::Ident)
            .map(|(_, t)| t.as_str())
            .collect();
        assert_eq!(idents, vec!["x", "y", "C", "puts"]);
    }

    #[test]
    fn test_line_tracking() {
        let src = "/* a\nb */\nimport \"C\"\n";
        let toks = tokenize(src).unwrap();
        assert_eq!(toks[0].kind, TokenKind::BlockComment);
        assert_eq!((toks[0].line, toks[0].end_line), (1, 2));
        assert_eq!(toks[1].line, 3);
    }

    #[test]
    fn test_multi_char_punct() {
        let toks = kinds_and_text("n, err := f(a...)");
        assert!(toks.contains(&(TokenKind::Punct, ":=".to_string())));
        assert!(toks.contains(&(TokenKind::Punct, "...".to_string())));
    }

    #[test]
    fn test_numbers_with_exponent() {
        let toks = kinds_and_text("1.5e-3 + 0x1p+4");
        assert_eq!(toks[0], (TokenKind::Number, "1.5e-3".to_string()));
        assert_eq!(toks[2], (TokenKind::Number, "0x1p+4".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("a := \"open\nb").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"C\"").as_deref(), Some("C"));
        assert_eq!(unquote("\"a\\\"b\"").as_deref(), Some("a\"b"));
        assert_eq!(unquote("`raw\\n`").as_deref(), Some("raw\\n"));
    }
}
