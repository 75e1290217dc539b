//! Spelling normalization for elementary types and legacy type strings.
//!
//! Older compilers only report types as text (`uint`, `struct A.S storage
//! ref`, `mapping(address => uint256)`); newer ones give a typed tree with
//! modern spellings. Everything goes through here before the pool sees it,
//! so a type spelled two ways still interns to one index.

use slir_ir::ast::TypeName;
use slir_ir::StringInterner;
use thiserror::Error;

use crate::Elementary;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("`{0}` is not an elementary type")]
    UnknownElementary(String),
    #[error("`{0}` has an invalid width")]
    BadWidth(String),
    #[error("malformed type string `{text}`: {reason}")]
    Malformed { text: String, reason: &'static str },
}

const LOCATION_SUFFIXES: &[&str] = &[
    " storage ref",
    " storage pointer",
    " calldata slice",
    " storage",
    " memory",
    " calldata",
    " pointer",
    " ref",
];

/// Remove trailing data-location words from a type string.
pub fn strip_location(text: &str) -> &str {
    let mut text = text.trim();
    loop {
        let Some(stripped) = LOCATION_SUFFIXES
            .iter()
            .find_map(|suffix| text.strip_suffix(suffix))
        else {
            return text;
        };
        text = stripped.trim_end();
    }
}

/// Normalize an elementary type spelling.
///
/// Accepts every spelling produced by any supported compiler version,
/// including Vyper's `decimal`, `Bytes[N]` and `String[N]`.
pub fn normalize_elementary(spelling: &str) -> Result<Elementary, NormalizeError> {
    let text = strip_location(spelling);
    let unknown = || NormalizeError::UnknownElementary(text.to_string());
    let bad_width = || NormalizeError::BadWidth(text.to_string());

    match text {
        "bool" => return Ok(Elementary::Bool),
        "address" => return Ok(Elementary::Address),
        "string" => return Ok(Elementary::String),
        "bytes" => return Ok(Elementary::Bytes),
        "byte" => return Ok(Elementary::FixedBytes(1)),
        "uint" => return Ok(Elementary::uint(256)),
        "int" => return Ok(Elementary::int(256)),
        "fixed" | "ufixed" => {
            return Ok(Elementary::Fixed {
                signed: text == "fixed",
                bits: 128,
                decimals: 18,
            })
        }
        "decimal" => {
            return Ok(Elementary::Fixed {
                signed: true,
                bits: 168,
                decimals: 10,
            })
        }
        _ => {}
    }

    if let Some(rest) = text.strip_prefix("address") {
        if rest.trim() == "payable" {
            return Ok(Elementary::AddressPayable);
        }
        return Err(unknown());
    }

    // Vyper bounded strings and byte arrays
    if let Some(bound) = text.strip_prefix("Bytes[").and_then(|r| r.strip_suffix(']')) {
        bound.trim().parse::<u64>().map_err(|_| bad_width())?;
        return Ok(Elementary::Bytes);
    }
    if let Some(bound) = text.strip_prefix("String[").and_then(|r| r.strip_suffix(']')) {
        bound.trim().parse::<u64>().map_err(|_| bad_width())?;
        return Ok(Elementary::String);
    }

    if let Some(width) = text.strip_prefix("bytes") {
        let n: u8 = width.parse().map_err(|_| unknown())?;
        if (1..=32).contains(&n) {
            return Ok(Elementary::FixedBytes(n));
        }
        return Err(bad_width());
    }

    for (prefix, signed) in [("ufixed", false), ("fixed", true)] {
        if let Some(dims) = text.strip_prefix(prefix) {
            let (bits, decimals) = dims.split_once('x').ok_or_else(unknown)?;
            let bits: u16 = bits.parse().map_err(|_| unknown())?;
            let decimals: u8 = decimals.parse().map_err(|_| unknown())?;
            if !valid_int_width(bits) || decimals > 80 {
                return Err(bad_width());
            }
            return Ok(Elementary::Fixed {
                signed,
                bits,
                decimals,
            });
        }
    }

    for (prefix, signed) in [("uint", false), ("int", true)] {
        if let Some(width) = text.strip_prefix(prefix) {
            let bits: u16 = width.parse().map_err(|_| unknown())?;
            if !valid_int_width(bits) {
                return Err(bad_width());
            }
            return Ok(Elementary::Int { signed, bits });
        }
    }

    Err(unknown())
}

fn valid_int_width(bits: u16) -> bool {
    (8..=256).contains(&bits) && bits % 8 == 0
}

/// Parse a legacy compiler type string into an unresolved annotation.
///
/// User-defined types come back as [`TypeName::UserDefined`] paths, to be
/// resolved in scope like any other annotation.
pub fn parse_descriptor(text: &str, interner: &StringInterner) -> Result<TypeName, NormalizeError> {
    let malformed = |reason| NormalizeError::Malformed {
        text: text.to_string(),
        reason,
    };
    let text = strip_location(text);
    if text.is_empty() {
        return Err(malformed("empty type"));
    }

    if text.ends_with(']') {
        if let Some(open) = matching_open_bracket(text) {
            let head = text[..open].trim();
            // Vyper `Bytes[N]`/`String[N]` are elementary, not arrays
            if head == "Bytes" || head == "String" {
                let canonical = normalize_elementary(text)?;
                return Ok(TypeName::Elementary(interner.intern(&canonical.spelling())));
            }
            let elem = parse_descriptor(head, interner)?;
            let len_text = text[open + 1..text.len() - 1].trim();
            let len = if len_text.is_empty() {
                None
            } else {
                Some(
                    len_text
                        .parse::<u64>()
                        .map_err(|_| malformed("array length is not a number"))?,
                )
            };
            return Ok(TypeName::array(elem, len));
        }
        return Err(malformed("unbalanced brackets"));
    }

    if let Some(rest) = text.strip_prefix("mapping") {
        let inner = parenthesized(rest.trim_start()).ok_or_else(|| malformed("expected `(`"))?;
        let (key, value) =
            split_top_level_once(inner, "=>").ok_or_else(|| malformed("expected `=>`"))?;
        return Ok(TypeName::mapping(
            parse_descriptor(key, interner)?,
            parse_descriptor(value, interner)?,
        ));
    }

    if let Some(rest) = text.strip_prefix("function") {
        return parse_function_descriptor(rest, interner).ok_or_else(|| malformed("bad function type"));
    }

    for keyword in ["contract ", "interface ", "library ", "struct ", "enum "] {
        if let Some(path) = text.strip_prefix(keyword) {
            let path = path.trim();
            if path.is_empty() {
                return Err(malformed("missing type name"));
            }
            return Ok(TypeName::UserDefined(
                path.split('.').map(|segment| interner.intern(segment.trim())).collect(),
            ));
        }
    }

    if text.contains(['(', ')', ' ']) && !text.starts_with("address") {
        return Err(malformed("not a type"));
    }

    let elementary = normalize_elementary(text)?;
    Ok(TypeName::Elementary(interner.intern(&elementary.spelling())))
}

fn parse_function_descriptor(rest: &str, interner: &StringInterner) -> Option<TypeName> {
    let rest = rest.trim_start();
    let close = matching_close_paren(rest)?;
    let params = parse_list(&rest[1..close], interner)?;
    let tail = &rest[close + 1..];
    let external = tail.split_whitespace().any(|word| word == "external");
    let returns = match tail.find("returns") {
        Some(at) => {
            let after = tail[at + "returns".len()..].trim_start();
            let close = matching_close_paren(after)?;
            parse_list(&after[1..close], interner)?
        }
        None => Vec::new(),
    };
    Some(TypeName::Function {
        params,
        returns,
        external,
    })
}

fn parse_list(inner: &str, interner: &StringInterner) -> Option<Vec<TypeName>> {
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    split_top_level(inner, ',')
        .into_iter()
        .map(|item| parse_descriptor(item, interner).ok())
        .collect()
}

/// Contents of a leading `( ... )` spanning the whole string.
fn parenthesized(text: &str) -> Option<&str> {
    let close = matching_close_paren(text)?;
    if close + 1 == text.len() {
        Some(&text[1..close])
    } else {
        None
    }
}

fn matching_close_paren(text: &str) -> Option<usize> {
    if !text.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn matching_open_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices().rev() {
        match c {
            ']' => depth += 1,
            '[' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

fn split_top_level_once<'t>(text: &'t str, sep: &str) -> Option<(&'t str, &'t str)> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ if depth == 0 && text[i..].starts_with(sep) => {
                return Some((text[..i].trim(), text[i + sep.len()..].trim()));
            }
            _ => {}
        }
    }
    None
}
