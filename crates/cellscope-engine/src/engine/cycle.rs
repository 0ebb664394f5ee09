//! Circular dependency detection for formula cells.
//!
//! When a formula cell is about to be evaluated, we must verify it doesn't sit
//! on a cycle (e.g., A1 references B1, B1 references Total, Total labels A1).
//! This module uses depth-first search over the dependencies recorded on each
//! cell, expanding ranges to the cells present in the grid and following
//! names through `lookup_name`.

use std::collections::HashSet;

use super::cell::Grid;
use super::cell_ref::CellRef;
use super::reference::Reference;

/// Detect circular dependencies starting from a cell.
///
/// `lookup_name` maps a bare name (label or environment value) to the
/// reference it stands for, if any.
/// Returns Some(cycle_path) if a cycle is found, None otherwise. The last
/// element of the path is the cell that closes the loop.
pub fn detect_cycle<F>(start: &CellRef, grid: &Grid, lookup_name: F) -> Option<Vec<CellRef>>
where
    F: Fn(&str) -> Option<Reference>,
{
    let mut visiting = HashSet::new();
    let mut path = Vec::new();

    if detect_cycle_dfs(start, grid, &lookup_name, &mut visiting, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn detect_cycle_dfs<F>(
    current: &CellRef,
    grid: &Grid,
    lookup_name: &F,
    visiting: &mut HashSet<CellRef>,
    path: &mut Vec<CellRef>,
) -> bool
where
    F: Fn(&str) -> Option<Reference>,
{
    if visiting.contains(current) {
        path.push(current.clone());
        return true;
    }

    let deps = match grid.get(current) {
        Some(entry) => entry.depends_on.clone(),
        None => return false,
    };

    visiting.insert(current.clone());
    path.push(current.clone());

    for dep in &deps {
        let mut seen_names = HashSet::new();
        for next in cells_of(dep, grid, lookup_name, &mut seen_names) {
            if detect_cycle_dfs(&next, grid, lookup_name, visiting, path) {
                return true;
            }
        }
    }

    path.pop();
    visiting.remove(current);
    false
}

/// The grid cells a dependency stands for.
fn cells_of<F>(
    dep: &Reference,
    grid: &Grid,
    lookup_name: &F,
    seen_names: &mut HashSet<String>,
) -> Vec<CellRef>
where
    F: Fn(&str) -> Option<Reference>,
{
    match dep {
        Reference::Cell(cell) => vec![cell.clone()],
        Reference::CellRange(range) => grid
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|cell| range.contains(cell))
            .collect(),
        Reference::Label(_) | Reference::NamedValue(_) => {
            let name = dep.to_string();
            // Label loops are reported by the resolver, not here.
            if !seen_names.insert(name.to_ascii_uppercase()) {
                return Vec::new();
            }
            match lookup_name(&name) {
                Some(target) => cells_of(&target, grid, lookup_name, seen_names),
                None => Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cell::Cell;
    use dashmap::DashMap;
    use std::sync::Arc;

    fn grid(cells: &[(&str, Cell)]) -> Grid {
        let grid: Grid = Arc::new(DashMap::new());
        for (name, cell) in cells {
            grid.insert(CellRef::from_str(name).unwrap(), cell.clone());
        }
        grid
    }

    fn no_names(_: &str) -> Option<Reference> {
        None
    }

    #[test]
    fn test_detect_cycle_no_cycle() {
        let grid = grid(&[
            ("A1", Cell::new_number(10.0)),
            ("B1", Cell::new_number(20.0)),
            ("C1", Cell::new_script("A1 + B1")),
        ]);
        assert!(detect_cycle(&CellRef::new(2, 0), &grid, no_names).is_none());
    }

    #[test]
    fn test_detect_cycle_direct() {
        let grid = grid(&[("A1", Cell::new_script("B1")), ("B1", Cell::new_script("A1"))]);
        assert!(detect_cycle(&CellRef::new(0, 0), &grid, no_names).is_some());
        assert!(detect_cycle(&CellRef::new(1, 0), &grid, no_names).is_some());
    }

    #[test]
    fn test_detect_cycle_self_reference() {
        let grid = grid(&[("A1", Cell::new_script("A1 + 1"))]);
        let path = detect_cycle(&CellRef::new(0, 0), &grid, no_names).unwrap();
        assert_eq!(path, vec![CellRef::new(0, 0), CellRef::new(0, 0)]);
    }

    #[test]
    fn test_detect_cycle_through_range() {
        let grid = grid(&[
            ("A1", Cell::new_script("SUM(A2:A3)")),
            ("A3", Cell::new_script("A1 * 2")),
        ]);
        assert!(detect_cycle(&CellRef::new(0, 0), &grid, no_names).is_some());
    }

    #[test]
    fn test_detect_cycle_through_label() {
        let grid = grid(&[("A1", Cell::new_script("Total + 1")), ("B1", Cell::new_script("A1"))]);
        let lookup = |name: &str| {
            (name.eq_ignore_ascii_case("total")).then(|| Reference::parse("B1").unwrap())
        };
        let path = detect_cycle(&CellRef::new(0, 0), &grid, lookup).unwrap();
        assert_eq!(path.first(), Some(&CellRef::new(0, 0)));
        assert_eq!(path.last(), Some(&CellRef::new(0, 0)));
    }

    #[test]
    fn test_label_loop_does_not_hang() {
        let grid = grid(&[("A1", Cell::new_script("Loop"))]);
        let lookup = |_: &str| Some(Reference::parse("Loop").unwrap());
        assert!(detect_cycle(&CellRef::new(0, 0), &grid, lookup).is_none());
    }
}
