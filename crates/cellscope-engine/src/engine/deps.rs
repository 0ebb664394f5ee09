//! Dependency extraction from formula strings.
//!
//! Parses formula text to find the references a formula mentions: cell
//! references (`A1`), ranges (`B2:C5`) and bare identifiers that may be
//! labels. Used for cycle detection before a formula cell is evaluated.
//!
//! References inside string literals and names used as function calls are
//! ignored.

use regex::Regex;
use std::sync::OnceLock;

use super::cell_ref::CellRef;
use super::range::RangeRef;
use super::reference::{LabelName, Reference};

const RHAI_KEYWORDS: &[&str] = &[
    "let", "const", "if", "else", "switch", "do", "while", "until", "loop", "for", "in",
    "break", "continue", "return", "throw", "try", "catch", "fn", "private", "import",
    "export", "as", "global", "this",
];

/// Extract the references a formula depends on, ranges first.
pub fn extract_dependencies(script: &str) -> Vec<Reference> {
    let mut deps = Vec::new();

    // Ignore references inside string literals.
    let script = strip_string_literals(script);

    let mut remaining = script.clone();
    for caps in range_re().captures_iter(&script) {
        if let Some(range) = RangeRef::from_str(&caps[0]) {
            deps.push(Reference::CellRange(range));
            remaining = remaining.replacen(&caps[0], " ", 1);
        }
    }

    let script = remaining;
    let mut remaining = script.clone();
    for m in cell_ref_re().find_iter(&script) {
        if is_call_or_member(&script, m.start(), m.end()) {
            continue;
        }
        if let Some(cell) = CellRef::from_str(m.as_str()) {
            deps.push(Reference::Cell(cell));
            remaining = remaining.replacen(m.as_str(), " ", 1);
        }
    }

    for m in identifier_re().find_iter(&remaining) {
        if is_call_or_member(&remaining, m.start(), m.end()) {
            continue;
        }
        let name = m.as_str();
        if RHAI_KEYWORDS.contains(&name) {
            continue;
        }
        if let Ok(label) = LabelName::new(name) {
            deps.push(Reference::Label(label));
        }
    }

    deps
}

fn range_re() -> &'static Regex {
    static RANGE_RE: OnceLock<Regex> = OnceLock::new();
    RANGE_RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z]+[0-9]+:[A-Za-z]+[0-9]+\b")
            .expect("dependency range regex must compile")
    })
}

fn cell_ref_re() -> &'static Regex {
    static CELL_RE: OnceLock<Regex> = OnceLock::new();
    CELL_RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z]+[0-9]+\b").expect("dependency cell reference regex must compile")
    })
}

fn identifier_re() -> &'static Regex {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    IDENT_RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\b").expect("dependency identifier regex must compile")
    })
}

/// True when the word at `start..end` is a call (`NAME(`) or follows a `.`.
pub(crate) fn is_call_or_member(text: &str, start: usize, end: usize) -> bool {
    if text[..start].ends_with('.') {
        return true;
    }
    text[end..].trim_start().starts_with('(')
}

pub(crate) fn strip_string_literals(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in script.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(' ');
                continue;
            }
            if ch == '\\' {
                escaped = true;
                out.push(' ');
                continue;
            }
            if ch == '"' {
                in_string = false;
                out.push('"');
            } else {
                out.push(' ');
            }
        } else if ch == '"' {
            in_string = true;
            out.push('"');
        } else {
            out.push(ch);
        }
    }

    out
}
