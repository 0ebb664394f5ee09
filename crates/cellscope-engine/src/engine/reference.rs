//! Expression references: cells, ranges, labels and environment value names.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::cell_ref::CellRef;
use super::error::{ResolveError, Result};
use super::range::RangeRef;

const MAX_NAME_LENGTH: usize = 255;

/// The four kinds of reference a formula can contain.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ReferenceKind {
    Cell,
    CellRange,
    Label,
    NamedValue,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReferenceKind::Cell => "cell",
            ReferenceKind::CellRange => "cell range",
            ReferenceKind::Label => "label",
            ReferenceKind::NamedValue => "named value",
        };
        f.write_str(text)
    }
}

/// A label name such as `Total` or `Label123`.
///
/// Compared case-insensitively; the spelling it was created with is kept for display.
#[derive(Clone, Debug, Eq)]
pub struct LabelName(String);

impl LabelName {
    pub fn new(name: &str) -> Result<LabelName> {
        if Self::is_valid(name) {
            Ok(LabelName(name.to_string()))
        } else {
            Err(ResolveError::InvalidReference(format!(
                "invalid label name \"{}\"",
                name
            )))
        }
    }

    pub fn is_valid(name: &str) -> bool {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        if !(first.is_ascii_alphabetic() || first == '_') {
            return false;
        }
        if name.len() > MAX_NAME_LENGTH {
            return false;
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            return false;
        }
        if name.eq_ignore_ascii_case("true") || name.eq_ignore_ascii_case("false") {
            return false;
        }
        CellRef::from_str(name).is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for LabelName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Hash for LabelName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_uppercase());
        }
    }
}

impl fmt::Display for LabelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The name of an environment value (and of local template values).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ValueName(String);

impl ValueName {
    pub fn new(name: &str) -> Result<ValueName> {
        let mut chars = name.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && name.len() <= MAX_NAME_LENGTH
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if valid {
            Ok(ValueName(name.to_string()))
        } else {
            Err(ResolveError::InvalidReference(format!(
                "invalid value name \"{}\"",
                name
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything a formula can refer to.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Reference {
    Cell(CellRef),
    CellRange(RangeRef),
    Label(LabelName),
    NamedValue(ValueName),
}

impl Reference {
    /// Parse `B2`, `B2:C3` or a label name.
    ///
    /// Environment value names cannot be told apart from labels textually;
    /// use [`Reference::named_value`] for those.
    pub fn parse(text: &str) -> Result<Reference> {
        let text = text.trim();
        if text.contains(':') {
            return RangeRef::from_str(text)
                .map(Reference::CellRange)
                .ok_or_else(|| ResolveError::InvalidReference(text.to_string()));
        }
        if let Some(cell) = CellRef::from_str(text) {
            return Ok(Reference::Cell(cell));
        }
        if LabelName::is_valid(text) {
            return Ok(Reference::Label(LabelName(text.to_string())));
        }
        Err(ResolveError::InvalidReference(text.to_string()))
    }

    pub fn named_value(name: &str) -> Result<Reference> {
        ValueName::new(name).map(Reference::NamedValue)
    }

    pub fn label(name: &str) -> Result<Reference> {
        LabelName::new(name).map(Reference::Label)
    }

    pub fn kind(&self) -> ReferenceKind {
        match self {
            Reference::Cell(_) => ReferenceKind::Cell,
            Reference::CellRange(_) => ReferenceKind::CellRange,
            Reference::Label(_) => ReferenceKind::Label,
            Reference::NamedValue(_) => ReferenceKind::NamedValue,
        }
    }

    pub(crate) fn not_found(&self) -> ResolveError {
        ResolveError::NotFound {
            kind: self.kind(),
            reference: self.to_string(),
        }
    }
}

impl From<CellRef> for Reference {
    fn from(cell: CellRef) -> Self {
        Reference::Cell(cell)
    }
}

impl From<RangeRef> for Reference {
    fn from(range: RangeRef) -> Self {
        Reference::CellRange(range)
    }
}

impl From<LabelName> for Reference {
    fn from(label: LabelName) -> Self {
        Reference::Label(label)
    }
}

impl From<ValueName> for Reference {
    fn from(name: ValueName) -> Self {
        Reference::NamedValue(name)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Cell(cell) => cell.fmt(f),
            Reference::CellRange(range) => range.fmt(f),
            Reference::Label(label) => label.fmt(f),
            Reference::NamedValue(name) => name.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_textual_kind() {
        assert_eq!(Reference::parse("B2").unwrap().kind(), ReferenceKind::Cell);
        assert_eq!(
            Reference::parse("B2:C3").unwrap().kind(),
            ReferenceKind::CellRange
        );
        assert_eq!(
            Reference::parse("Label123").unwrap().kind(),
            ReferenceKind::Label
        );
        assert!(Reference::parse("1abc").is_err());
        assert!(Reference::parse("B2:").is_err());
    }

    #[test]
    fn test_label_names_compare_case_insensitively() {
        let a = LabelName::new("Total").unwrap();
        let b = LabelName::new("TOTAL").unwrap();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(Reference::Label(a));
        assert!(set.contains(&Reference::Label(b)));
    }

    #[test]
    fn test_label_name_rules() {
        assert!(LabelName::is_valid("_hidden"));
        assert!(LabelName::is_valid("Sales.Q1"));
        assert!(!LabelName::is_valid("B2"));
        assert!(!LabelName::is_valid("true"));
        assert!(!LabelName::is_valid("has space"));
        assert!(!LabelName::is_valid(&"x".repeat(256)));
    }

    #[test]
    fn test_named_value_and_label_are_distinct_keys() {
        let label = Reference::label("Hello").unwrap();
        let value = Reference::named_value("Hello").unwrap();
        assert_ne!(label, value);
        assert_eq!(label.to_string(), value.to_string());
    }

    #[test]
    fn test_not_found_messages() {
        let cell = Reference::parse("B2").unwrap();
        assert_eq!(cell.not_found().to_string(), "Cell not found: \"B2\"");

        let label = Reference::parse("Label123").unwrap();
        assert_eq!(
            label.not_found().to_string(),
            "Label not found: \"Label123\""
        );

        let value = Reference::named_value("Name").unwrap();
        assert_eq!(value.not_found().to_string(), "Unknown reference: \"Name\"");
    }
}
