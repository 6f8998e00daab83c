//! Collection of `C.name` references in managed source.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::lexer::{Token, TokenKind};

/// How a reference is used at its site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefContext {
    /// Any non-call use (type, value, address-of).
    Expr,
    /// `C.f(...)`
    Call,
    /// `r, err := C.f(...)`: the call also reports `errno`.
    CallErrno,
}

/// One occurrence of `C.name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    /// Byte span of the whole `C.name` expression
    pub span: (usize, usize),
    pub line: usize,
    pub context: RefContext,
}

/// Collect every `C.name` occurrence, skipping comments and literals.
pub fn collect_references(src: &str, tokens: &[Token]) -> Vec<Reference> {
    let code: Vec<&Token> = tokens.iter().filter(|t| !t.is_comment()).collect();
    let mut refs = Vec::new();

    for i in 0..code.len() {
        if !code[i].is_ident(src, "C") {
            continue;
        }
        // `x.C.name` is a field selector, not the namespace.
        if i > 0 && code[i - 1].is_punct(src, ".") {
            continue;
        }
        let (Some(dot), Some(name)) = (code.get(i + 1), code.get(i + 2)) else {
            continue;
        };
        if !dot.is_punct(src, ".") || name.kind != TokenKind::Ident {
            continue;
        }

        let is_call = code.get(i + 3).is_some_and(|t| t.is_punct(src, "("));
        let context = if !is_call {
            RefContext::Expr
        } else if is_errno_assignment(src, &code, i) {
            RefContext::CallErrno
        } else {
            RefContext::Call
        };

        refs.push(Reference {
            name: name.text(src).to_string(),
            span: (code[i].start, name.end),
            line: code[i].line,
            context,
        });
    }

    refs
}

/// `a, b := C.f(` or `a, b = C.f(`.
fn is_errno_assignment(src: &str, code: &[&Token], i: usize) -> bool {
    if i < 4 {
        return false;
    }
    let assign = code[i - 1].is_punct(src, ":=") || code[i - 1].is_punct(src, "=");
    let lhs = code[i - 2].kind == TokenKind::Ident
        && code[i - 3].is_punct(src, ",")
        && code[i - 4].kind == TokenKind::Ident;
    let exactly_two = i < 5 || !code[i - 5].is_punct(src, ",");
    assign && lhs && exactly_two
}

/// Distinct referenced names, sorted.
pub fn distinct_names<'a>(refs: impl IntoIterator<Item = &'a Reference>) -> Vec<String> {
    refs.into_iter()
        .map(|r| r.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;

    fn refs(src: &str) -> Vec<Reference> {
        collect_references(src, &tokenize(src).unwrap())
    }

    #[test]
    fn test_contexts() {
        let src = "func f() {\n\
                   \tvar x C.int = C.EOF\n\
                   \tC.puts(C.CString(\"hi\"))\n\
                   \tn, err := C.sqrt(2)\n\
                   }\n";
        let found: Vec<_> = refs(src)
            .into_iter()
            .map(|r| (r.name, r.context))
            .collect();
        assert_eq!(
            found,
            vec![
                ("int".to_string(), RefContext::Expr),
                ("EOF".to_string(), RefContext::Expr),
                ("puts".to_string(), RefContext::Call),
                ("CString".to_string(), RefContext::Call),
                ("sqrt".to_string(), RefContext::CallErrno),
            ]
        );
    }

    #[test]
    fn test_ignores_comments_strings_and_selectors() {
        let src = "// C.hidden\nx := \"C.str\"\ny := obj.C.field\nz := C.visible\n";
        let names = distinct_names(&refs(src));
        assert_eq!(names, vec!["visible"]);
    }

    #[test]
    fn test_three_value_assignment_is_plain_call() {
        let src = "a, b, c := C.f()\n";
        assert_eq!(refs(src)[0].context, RefContext::Call);
    }

    #[test]
    fn test_span_covers_expression() {
        let src = "x := C.getpid()\n";
        let r = &refs(src)[0];
        assert_eq!(&src[r.span.0..r.span.1], "C.getpid");
        assert_eq!(r.line, 1);
    }

    #[test]
    fn test_distinct_names_sorted() {
        let src = "C.b(); C.a(); C.b()";
        assert_eq!(distinct_names(&refs(src)), vec!["a", "b"]);
    }
}
