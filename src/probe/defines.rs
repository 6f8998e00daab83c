//! Macro scan of the preamble (`cc -E -dM`).
//!
//! Macros whose body is a plain literal are constants without any further
//! probing. Floating-point and string constants can only be learned this
//! way; the enum trick of the kind probe works for integers alone.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::builder::toolchain::Toolchain;
use crate::core::ctype::{CType, ConstValue};

/// Object-like macro definitions, by name.
pub fn scan_defines(
    toolchain: &dyn Toolchain,
    cflags: &[String],
    preamble: &str,
) -> Result<BTreeMap<String, String>> {
    let output = toolchain
        .list_defines_command(cflags, preamble)
        .into_process()
        .exec_and_check()?;
    Ok(parse_defines(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `#define NAME BODY` lines, skipping function-like macros.
pub fn parse_defines(text: &str) -> BTreeMap<String, String> {
    let mut defines = BTreeMap::new();
    for line in text.lines() {
        let Some(rest) = line.strip_prefix("#define ") else {
            continue;
        };
        let name_end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let (name, body) = rest.split_at(name_end);
        if name.is_empty() || body.starts_with('(') {
            continue;
        }
        defines.insert(name.to_string(), body.trim().to_string());
    }
    defines
}

/// Value and type of a macro body that is a single literal.
pub fn literal_constant(body: &str) -> Option<(CType, ConstValue)> {
    let mut body = body.trim();
    while let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        body = inner.trim();
    }

    if body.starts_with('"') {
        return parse_c_string(body).map(|s| (char_pointer(), ConstValue::Str(s)));
    }

    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, body),
    };
    if !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }

    if let Some((ty, value)) = parse_integer(digits) {
        let value = if negative { value.wrapping_neg() } else { value };
        return Some((ty, ConstValue::Int(value)));
    }
    parse_float(digits).map(|(ty, v)| (ty, ConstValue::Float(if negative { -v } else { v })))
}

fn parse_integer(lit: &str) -> Option<(CType, i64)> {
    let lower = lit.to_ascii_lowercase();
    let digits = lower.trim_end_matches(['u', 'l']);
    let suffix = &lower[digits.len()..];
    let unsigned = suffix.contains('u');
    let longs = suffix.matches('l').count();

    let value = if let Some(hex) = digits.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<u64>().ok()?
    };

    let fits_int = if unsigned {
        value <= u32::MAX as u64
    } else {
        value <= i32::MAX as u64
    };
    let ty = match (longs, fits_int) {
        (0, true) => int_type(if unsigned { "unsigned int" } else { "int" }, 4, !unsigned),
        (0 | 1, _) => int_type(if unsigned { "unsigned long" } else { "long" }, 8, !unsigned),
        _ => int_type(
            if unsigned { "unsigned long long" } else { "long long" },
            8,
            !unsigned,
        ),
    };
    Some((ty, value as i64))
}

fn parse_float(lit: &str) -> Option<(CType, f64)> {
    let lower = lit.to_ascii_lowercase();
    if lower.starts_with("0x") {
        return None;
    }
    let (digits, ty) = if let Some(d) = lower.strip_suffix('f') {
        (d, CType::Float { name: "float".to_string(), size: 4 })
    } else {
        (
            lower.strip_suffix('l').unwrap_or(&lower),
            CType::Float { name: "double".to_string(), size: 8 },
        )
    };
    if !(digits.contains('.') || digits.contains('e')) {
        return None;
    }
    digits.parse::<f64>().ok().map(|v| (ty, v))
}

/// Decode a C string literal, including adjacent literal concatenation.
fn parse_c_string(body: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = body.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => return Some(out),
            Some('"') => {}
            Some(_) => return None,
        }
        loop {
            match chars.next()? {
                '"' => break,
                '\\' => match chars.next()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    'a' => out.push('\x07'),
                    'b' => out.push('\x08'),
                    'f' => out.push('\x0c'),
                    'v' => out.push('\x0b'),
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
    }
}

fn int_type(name: &str, size: u64, signed: bool) -> CType {
    CType::Int {
        name: name.to_string(),
        size,
        signed,
    }
}

fn char_pointer() -> CType {
    CType::Pointer {
        pointee: Box::new(int_type("char", 1, true)),
        size: 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defines_skips_function_like() {
        let text = "#define EOF (-1)\n#define MAX(a,b) ((a)>(b)?(a):(b))\n#define EMPTY\n";
        let defines = parse_defines(text);
        assert_eq!(defines.get("EOF").map(String::as_str), Some("(-1)"));
        assert!(!defines.contains_key("MAX"));
        assert_eq!(defines.get("EMPTY").map(String::as_str), Some(""));
    }

    #[test]
    fn test_integer_literals() {
        assert_eq!(literal_constant("(-1)").map(|(_, v)| v), Some(ConstValue::Int(-1)));
        assert_eq!(literal_constant("0x10").map(|(_, v)| v), Some(ConstValue::Int(16)));
        assert_eq!(literal_constant("010").map(|(_, v)| v), Some(ConstValue::Int(8)));
        let (ty, v) = literal_constant("4294967295UL").unwrap();
        assert_eq!(v, ConstValue::Int(4294967295));
        assert_eq!(ty.c_spelling().as_deref(), Some("unsigned long"));
        let (ty, _) = literal_constant("42").unwrap();
        assert_eq!(ty.size(), 4);
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(
            literal_constant("3.14159").map(|(_, v)| v),
            Some(ConstValue::Float(3.14159))
        );
        let (ty, v) = literal_constant("1e3f").unwrap();
        assert_eq!(v, ConstValue::Float(1000.0));
        assert_eq!(ty.size(), 4);
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(
            literal_constant("\"1.2.\" \"3\\n\"").map(|(_, v)| v),
            Some(ConstValue::Str("1.2.3\n".to_string()))
        );
    }

    #[test]
    fn test_non_literals() {
        assert!(literal_constant("sizeof(int)").is_none());
        assert!(literal_constant("FOO + 1").is_none());
        assert!(literal_constant("").is_none());
    }
}
