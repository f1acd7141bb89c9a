//! Recovery of the four record sequences from the persisted script fragment.
//!
//! Each sequence lives in an assignment `name = [ ... ];`. The literal is located with a
//! bracket scanner that understands strings and comments, parsed strictly as JSON, and on
//! failure run through one repair pass before a second strict parse. A literal that still
//! fails is reported as corrupt; it is never silently replaced by an empty sequence.

use std::fmt;

use jobfeed_core::{Record, RecordKind, Store};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptSequence {
    pub kind: RecordKind,
    pub reason: String,
}

impl fmt::Display for CorruptSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind.variable_name(), self.kind, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("store document is corrupt: {}", join_corrupt(.0))]
    Corrupt(Vec<CorruptSequence>),
}

impl RecoveryError {
    pub fn corrupt_kinds(&self) -> Vec<RecordKind> {
        match self {
            RecoveryError::Corrupt(items) => items.iter().map(|c| c.kind).collect(),
        }
    }
}

fn join_corrupt(items: &[CorruptSequence]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse every sequence in `text`. Names that never appear yield empty sequences.
pub fn parse_document(text: &str) -> Result<Store, RecoveryError> {
    let mut store = Store::default();
    let mut corrupt = Vec::new();

    for kind in RecordKind::ALL {
        match parse_sequence(text, kind.variable_name()) {
            Ok(records) => *store.sequence_mut(kind) = records,
            Err(reason) => corrupt.push(CorruptSequence { kind, reason }),
        }
    }

    if corrupt.is_empty() {
        Ok(store)
    } else {
        Err(RecoveryError::Corrupt(corrupt))
    }
}

fn parse_sequence(text: &str, name: &str) -> Result<Vec<Record>, String> {
    let Some(literal) = locate_literal(text, name)? else {
        return Ok(Vec::new());
    };

    match strict_parse(literal) {
        Ok(records) => Ok(records),
        Err(strict_err) => {
            let repaired = repair_literal(literal);
            strict_parse(&repaired)
                .map_err(|err| format!("{err} after repair (strict parse failed with: {strict_err})"))
        }
    }
}

fn strict_parse(literal: &str) -> Result<Vec<Record>, serde_json::Error> {
    let maps: Vec<Map<String, Value>> = serde_json::from_str(literal)?;
    Ok(maps.into_iter().map(Record::from_map).collect())
}

/// Find the array literal assigned to `name`.
///
/// `Ok(None)` when the name is not assigned anywhere, `Err` when it is assigned but the
/// literal is missing or never closes.
fn locate_literal<'a>(text: &'a str, name: &str) -> Result<Option<&'a str>, String> {
    let pattern = Regex::new(&format!(r"\b{}\s*=", regex::escape(name)))
        .map_err(|err| format!("building locator for {name}: {err}"))?;

    for found in pattern.find_iter(text) {
        let rest = &text[found.end()..];
        // `==` is a comparison, not an assignment
        if rest.starts_with('=') {
            continue;
        }
        let offset = rest.len() - rest.trim_start().len();
        let start = found.end() + offset;
        if !text[start..].starts_with('[') {
            return Err(format!("`{name} =` is not followed by an array literal"));
        }
        let end = scan_balanced(text.as_bytes(), start)
            .ok_or_else(|| format!("array literal for {name} is unbalanced or unterminated"))?;
        if !ends_statement(text.as_bytes(), end) {
            return Err(format!("array literal for {name} closes before the end of its statement"));
        }
        return Ok(Some(&text[start..end]));
    }

    Ok(None)
}

/// Return the byte offset just past the bracket that closes the one at `start`.
fn scan_balanced(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i = skip_string(bytes, i, quote)?;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find_block_comment_end(bytes, i + 2)?;
                continue;
            }
            open @ (b'[' | b'{') => stack.push(open),
            b']' => {
                if stack.pop()? != b'[' {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + 1);
                }
            }
            b'}' => {
                if stack.pop()? != b'{' {
                    return None;
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// True when only blanks and comments sit between `from` and a `;`, a line break, or the
/// end of the text.
fn ends_statement(bytes: &[u8], from: usize) -> bool {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b';' | b'\n' | b'\r' => return true,
            b' ' | b'\t' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => return true,
            b'/' if bytes.get(i + 1) == Some(&b'*') => match find_block_comment_end(bytes, i + 2) {
                Some(next) => i = next,
                None => return false,
            },
            _ => return false,
        }
    }
    true
}

/// Offset just past the closing quote of the string opening at `start`.
fn skip_string(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn find_block_comment_end(bytes: &[u8], from: usize) -> Option<usize> {
    bytes[from..]
        .windows(2)
        .position(|w| w == b"*/")
        .map(|pos| from + pos + 2)
}

/// One string-aware pass that drops comments and trailing commas, rewrites single-quoted
/// and backtick strings as double-quoted ones, and quotes bare field names.
///
/// Text inside double-quoted strings is copied verbatim, so URLs keep their `//`.
pub(crate) fn repair_literal(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => i = copy_double_quoted(&chars, i, &mut out),
            '\'' | '`' => i = convert_quoted(&chars, i, c, &mut out),
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            ',' => {
                if !matches!(next_significant(&chars, i + 1), Some(']' | '}')) {
                    out.push(',');
                }
                i += 1;
            }
            c if is_ident_start(c) => {
                let begin = i;
                while i < chars.len() && is_ident_continue(chars[i]) {
                    i += 1;
                }
                let ident: String = chars[begin..i].iter().collect();
                if next_significant(&chars, i) == Some(':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else if ident == "undefined" {
                    out.push_str("null");
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn copy_double_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        match c {
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
            }
            '"' => return i + 1,
            _ => i += 1,
        }
    }
    i
}

fn convert_quoted(chars: &[char], start: usize, quote: char, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => match chars.get(i + 1) {
                Some(&next) if next == quote => {
                    out.push(next);
                    i += 2;
                }
                Some(&next) => {
                    out.push('\\');
                    out.push(next);
                    i += 2;
                }
                None => i += 1,
            },
            '"' => {
                out.push_str("\\\"");
                i += 1;
            }
            '\n' => {
                out.push_str("\\n");
                i += 1;
            }
            c if c == quote => {
                out.push('"');
                return i + 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.push('"');
    i
}

/// Next character that is neither whitespace nor inside a comment.
fn next_significant(chars: &[char], mut i: usize) -> Option<char> {
    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            c => return Some(c),
        }
    }
    None
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
