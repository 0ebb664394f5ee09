//! Formula preprocessing.
//!
//! Before formulas can be evaluated by Rhai, spreadsheet syntax is rewritten
//! into calls the evaluation engine registers:
//!
//! - **References**: `A1` → `REF("A1")`, `B2:C3` → `REF("B2:C3")`
//! - **Function calls**: `SUM(A1, 2)` → `CALL("SUM", [REF("A1"), 2])` for
//!   every call whose name starts with an uppercase letter
//!
//! Bare identifiers (labels, named values, parameters) are left alone and
//! picked up by the engine's variable resolver. Text inside string literals
//! is never rewritten.

use regex::Regex;
use std::sync::OnceLock;

use super::cell_ref::CellRef;
use super::deps::is_call_or_member;
use super::range::RangeRef;

/// Names that look like spreadsheet calls but belong to the engine or Rhai.
const RESERVED_CALLS: &[&str] = &["REF", "CALL", "Fn"];

/// Rewrite a formula (with or without a leading `=`) into a Rhai script.
pub fn preprocess_formula(formula: &str) -> String {
    let formula = formula.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);
    let with_refs = map_outside_strings(formula, rewrite_references);
    rewrite_calls(&with_refs)
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z]+[0-9]+)(?::([A-Za-z]+[0-9]+))?\b")
            .expect("formula reference regex must compile")
    })
}

fn rewrite_references(segment: &str) -> String {
    reference_re()
        .replace_all(segment, |caps: &regex::Captures| {
            let whole = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
            let original = caps[0].to_string();
            if is_call_or_member(segment, whole.0, whole.1) {
                return original;
            }
            match caps.get(2) {
                Some(_) => match RangeRef::from_str(&original) {
                    Some(range) => format!("REF(\"{}\")", range),
                    None => original,
                },
                None => match CellRef::from_str(&caps[1]) {
                    Some(cell) => format!("REF(\"{}\")", cell),
                    None => original,
                },
            }
        })
        .to_string()
}

/// Apply `f` to every part of `script` outside double-quoted string literals.
fn map_outside_strings(script: &str, f: impl Fn(&str) -> String) -> String {
    let bytes = script.as_bytes();
    let mut out = String::with_capacity(script.len());
    let mut seg_start = 0;
    let mut in_string = false;
    let mut backslashes = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' {
                backslashes += 1;
                i += 1;
                continue;
            }
            if b == b'"' && backslashes % 2 == 0 {
                out.push_str(&script[seg_start..=i]);
                in_string = false;
                seg_start = i + 1;
            }
            backslashes = 0;
            i += 1;
            continue;
        }

        if b == b'"' {
            out.push_str(&f(&script[seg_start..i]));
            in_string = true;
            seg_start = i;
            backslashes = 0;
        }
        i += 1;
    }

    if seg_start < script.len() {
        if in_string {
            out.push_str(&script[seg_start..]);
        } else {
            out.push_str(&f(&script[seg_start..]));
        }
    }

    out
}

/// Rewrite `NAME(args)` into `CALL("NAME", [args])`, tracking nesting so the
/// matching `)` becomes `])`.
fn rewrite_calls(script: &str) -> String {
    let chars: Vec<char> = script.chars().collect();
    let mut out = String::with_capacity(script.len() + 16);
    // One entry per open paren: true if it opened a rewritten call.
    let mut parens: Vec<bool> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];

        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
                i += 1;
            }
            '(' => {
                parens.push(false);
                out.push(ch);
                i += 1;
            }
            ')' => {
                if parens.pop() == Some(true) {
                    out.push_str("])");
                } else {
                    out.push(')');
                }
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let after_dot = start > 0 && chars[start - 1] == '.';

                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let is_call = j < chars.len() && chars[j] == '(';

                if is_call
                    && !after_dot
                    && word.starts_with(|c: char| c.is_ascii_uppercase())
                    && !RESERVED_CALLS.contains(&word.as_str())
                {
                    out.push_str(&format!("CALL(\"{}\", [", word));
                    parens.push(true);
                    i = j + 1;
                } else {
                    out.push_str(&word);
                }
            }
            c if c.is_ascii_digit() => {
                // Keep numeric literals such as `1e5` intact.
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    out
}
