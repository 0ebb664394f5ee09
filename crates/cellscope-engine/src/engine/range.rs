//! Rectangular cell ranges (`B2:C3`).

use std::fmt;

use super::cell_ref::CellRef;

/// A rectangular block of cells, normalized so `begin` is the top-left corner.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RangeRef {
    begin: CellRef,
    end: CellRef,
}

impl RangeRef {
    /// Build a range from any two opposite corners.
    pub fn new(a: CellRef, b: CellRef) -> RangeRef {
        RangeRef {
            begin: CellRef::new(a.col.min(b.col), a.row.min(b.row)),
            end: CellRef::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    /// Parse a range like "A1:B5". Both corners must be valid cell references.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Option<RangeRef> {
        let (start, end) = text.split_once(':')?;
        let start = CellRef::from_str(start.trim())?;
        let end = CellRef::from_str(end.trim())?;
        Some(RangeRef::new(start, end))
    }

    pub fn begin(&self) -> &CellRef {
        &self.begin
    }

    pub fn end(&self) -> &CellRef {
        &self.end
    }

    pub fn width(&self) -> usize {
        self.end.col - self.begin.col + 1
    }

    pub fn height(&self) -> usize {
        self.end.row - self.begin.row + 1
    }

    /// Number of cells covered (`width * height`).
    pub fn len(&self) -> usize {
        self.width() * self.height()
    }

    /// Always false: a range covers at least one cell.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, cell: &CellRef) -> bool {
        (self.begin.col..=self.end.col).contains(&cell.col)
            && (self.begin.row..=self.end.row).contains(&cell.row)
    }

    /// Every cell in the range, row by row, left to right.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.begin.row..=self.end.row).flat_map(move |row| {
            (self.begin.col..=self.end.col).map(move |col| CellRef::new(col, row))
        })
    }
}

impl std::str::FromStr for RangeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RangeRef::from_str(s).ok_or_else(|| format!("Invalid cell range: {}", s))
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.begin, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_corners() {
        let range = RangeRef::from_str("C3:B2").unwrap();
        assert_eq!(range.to_string(), "B2:C3");
        assert_eq!(range.width(), 2);
        assert_eq!(range.height(), 2);
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_cells_are_row_major() {
        let range = RangeRef::from_str("B2:C3").unwrap();
        let names: Vec<String> = range.cells().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["B2", "C2", "B3", "C3"]);
    }

    #[test]
    fn test_contains() {
        let range = RangeRef::from_str("B2:C3").unwrap();
        assert!(range.contains(&CellRef::new(1, 1)));
        assert!(range.contains(&CellRef::new(2, 2)));
        assert!(!range.contains(&CellRef::new(0, 1)));
        assert!(!range.contains(&CellRef::new(1, 3)));
    }

    #[test]
    fn test_parse_rejects_bad_corners() {
        assert!(RangeRef::from_str("A1").is_none());
        assert!(RangeRef::from_str("A1:").is_none());
        assert!(RangeRef::from_str("A1:Label123").is_none());
    }
}
