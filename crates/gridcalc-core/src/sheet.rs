//! Sheet type
//!
//! A [`Sheet`] is a sparse grid: only written coordinates are stored, reads of anything
//! else yield an empty [`Cell`]. Next to the cells it keeps an ordered index of formula
//! cells so recalculation can enumerate them without scanning the whole map.
//!
//! Structural edits (row/column insert and delete) walk every stored cell, so they cost
//! O(stored cells); there is no per-row index.

use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;

use crate::cell::{Cell, CellValue, FORMULA_MARKER};
use crate::error::{Error, Result};
use crate::{DEFAULT_COLS, DEFAULT_ROWS};

/// Handle returned by [`Sheet::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(u32, u32)>;

/// A single sheet of cells
pub struct Sheet {
    /// Stored cells, keyed by (row, col)
    cells: AHashMap<(u32, u32), Cell>,
    /// Formula text of every formula cell, in row-major order
    formulas: BTreeMap<(u32, u32), String>,
    /// Row bound (exclusive)
    rows: u32,
    /// Column bound (exclusive)
    cols: u32,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Sheet {
    /// Create an empty sheet with the default bounds (1000 x 26)
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_ROWS, DEFAULT_COLS)
    }

    /// Create an empty sheet with the given bounds
    pub fn with_bounds(rows: u32, cols: u32) -> Self {
        Self {
            cells: AHashMap::new(),
            formulas: BTreeMap::new(),
            rows,
            cols,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Build a sheet from row-major raw input text
    ///
    /// Every non-blank entry goes through [`Sheet::set_input`], so `=`-prefixed text becomes a
    /// formula. Bounds grow to fit the data.
    pub fn from_list<S: AsRef<str>>(data: &[Vec<S>]) -> Result<Self> {
        let height = u32::try_from(data.len())
            .map_err(|_| Error::other("too many rows for a sheet"))?;
        let width = data.iter().map(Vec::len).max().unwrap_or(0);
        let width =
            u32::try_from(width).map_err(|_| Error::other("too many columns for a sheet"))?;

        let mut sheet = Self::with_bounds(height.max(DEFAULT_ROWS), width.max(DEFAULT_COLS));
        for (row, values) in data.iter().enumerate() {
            for (col, text) in values.iter().enumerate() {
                let text = text.as_ref();
                if !text.trim().is_empty() {
                    sheet.set_input(row as u32, col as u32, text)?;
                }
            }
        }
        Ok(sheet)
    }

    /// Display text of the used extent, row-major, starting at A1
    pub fn to_list(&self) -> Vec<Vec<String>> {
        let Some((max_row, max_col)) = self.used_extent() else {
            return Vec::new();
        };

        (0..=max_row)
            .map(|row| {
                (0..=max_col)
                    .map(|col| {
                        self.cell_at(row, col)
                            .map(|cell| cell.display().into_owned())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Check whether a coordinate lies inside the current bounds
    pub fn in_bounds(&self, row: u32, col: u32) -> bool {
        row < self.rows && col < self.cols
    }

    // === Cell Access ===

    /// Get a cell by indices
    ///
    /// Always succeeds: coordinates that were never written (or lie outside the bounds)
    /// yield an empty cell.
    pub fn get_cell(&self, row: u32, col: u32) -> Cell {
        self.cell_at(row, col).cloned().unwrap_or_default()
    }

    /// Borrow a stored cell
    pub fn cell_at(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Get the formula text at a cell position (if it's a formula)
    pub fn formula_at(&self, row: u32, col: u32) -> Option<&str> {
        self.formulas.get(&(row, col)).map(String::as_str)
    }

    /// Get cells in a rectangle, row-major, inclusive
    ///
    /// The end coordinates are clamped to the sheet bounds.
    pub fn get_range(&self, r0: u32, c0: u32, r1: u32, c1: u32) -> Vec<Vec<Cell>> {
        if self.rows == 0 || self.cols == 0 {
            return Vec::new();
        }
        let r1 = r1.min(self.rows - 1);
        let c1 = c1.min(self.cols - 1);
        if r0 > r1 || c0 > c1 {
            return Vec::new();
        }

        (r0..=r1)
            .map(|row| (c0..=c1).map(|col| self.get_cell(row, col)).collect())
            .collect()
    }

    // === Cell Modification ===

    /// Write a cell
    ///
    /// With a formula the cell becomes a formula cell and enters the formula index;
    /// otherwise the kind follows the value and any previous formula is dropped.
    /// All listeners are notified with the coordinate.
    pub fn set_cell<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u32,
        value: V,
        formula: Option<&str>,
    ) -> Result<&Cell> {
        self.validate_cell_position(row, col)?;

        let cell = self.cells.entry((row, col)).or_default();
        cell.assign(value.into(), formula);
        match cell.formula() {
            Some(text) => {
                self.formulas.insert((row, col), text.to_string());
            }
            None => {
                self.formulas.remove(&(row, col));
            }
        }

        self.notify(row, col);
        Ok(&self.cells[&(row, col)])
    }

    /// Write raw editor text
    ///
    /// Text starting with the formula marker is stored as a formula; anything else is
    /// inferred with [`CellValue::from_input`].
    pub fn set_input(&mut self, row: u32, col: u32, text: &str) -> Result<&Cell> {
        if text.trim_start().starts_with(FORMULA_MARKER) {
            self.set_cell(row, col, CellValue::Empty, Some(text))
        } else {
            self.set_cell(row, col, CellValue::from_input(text), None)
        }
    }

    /// Store the evaluated result of a formula cell
    ///
    /// Only the cached value and display change; the formula is kept and listeners are not
    /// notified. Returns false if no formula cell is stored at the coordinate.
    pub fn set_result(&mut self, row: u32, col: u32, value: CellValue) -> bool {
        match self.cells.get_mut(&(row, col)) {
            Some(cell) if cell.is_formula() => {
                cell.store_result(value);
                true
            }
            _ => false,
        }
    }

    /// Reset every stored cell inside the rectangle to empty
    ///
    /// Returns the number of cells that were reset.
    pub fn clear_range(&mut self, r0: u32, c0: u32, r1: u32, c1: u32) -> usize {
        let mut cleared = 0;
        for ((row, col), cell) in self.cells.iter_mut() {
            if (r0..=r1).contains(row) && (c0..=c1).contains(col) {
                cell.clear();
                self.formulas.remove(&(*row, *col));
                cleared += 1;
            }
        }
        tracing::debug!(r0, c0, r1, c1, cleared, "cleared range");
        cleared
    }

    // === Row/Column Operations ===

    /// Insert `count` empty rows before `at`
    ///
    /// Returns false if `at` lies beyond the row bound.
    pub fn insert_row(&mut self, at: u32, count: u32) -> bool {
        if at > self.rows {
            return false;
        }
        self.rows = self.rows.saturating_add(count);
        self.remap(|row, col| {
            if row >= at {
                row.checked_add(count).map(|row| (row, col))
            } else {
                Some((row, col))
            }
        });
        tracing::debug!(at, count, rows = self.rows, "inserted rows");
        true
    }

    /// Insert `count` empty columns before `at`
    ///
    /// Returns false if `at` lies beyond the column bound.
    pub fn insert_column(&mut self, at: u32, count: u32) -> bool {
        if at > self.cols {
            return false;
        }
        self.cols = self.cols.saturating_add(count);
        self.remap(|row, col| {
            if col >= at {
                col.checked_add(count).map(|col| (row, col))
            } else {
                Some((row, col))
            }
        });
        tracing::debug!(at, count, cols = self.cols, "inserted columns");
        true
    }

    /// Delete rows `[at, at + count)`, shifting the rows below up
    ///
    /// Returns false if `at` lies outside the row bound.
    pub fn delete_row(&mut self, at: u32, count: u32) -> bool {
        if at >= self.rows {
            return false;
        }
        let count = count.min(self.rows - at);
        let end = at + count;
        self.rows -= count;
        self.remap(|row, col| {
            if row < at {
                Some((row, col))
            } else if row < end {
                None
            } else {
                Some((row - count, col))
            }
        });
        tracing::debug!(at, count, rows = self.rows, "deleted rows");
        true
    }

    /// Delete columns `[at, at + count)`, shifting the columns to the right left
    ///
    /// Returns false if `at` lies outside the column bound.
    pub fn delete_column(&mut self, at: u32, count: u32) -> bool {
        if at >= self.cols {
            return false;
        }
        let count = count.min(self.cols - at);
        let end = at + count;
        self.cols -= count;
        self.remap(|row, col| {
            if col < at {
                Some((row, col))
            } else if col < end {
                None
            } else {
                Some((row, col - count))
            }
        });
        tracing::debug!(at, count, cols = self.cols, "deleted columns");
        true
    }

    /// Move every stored cell (and its formula index entry) to a new key, or drop it
    fn remap<F>(&mut self, f: F)
    where
        F: Fn(u32, u32) -> Option<(u32, u32)>,
    {
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .filter_map(|((row, col), cell)| f(row, col).map(|key| (key, cell)))
            .collect();

        let formulas = std::mem::take(&mut self.formulas);
        self.formulas = formulas
            .into_iter()
            .filter_map(|((row, col), text)| f(row, col).map(|key| (key, text)))
            .collect();
    }

    // === Search ===

    /// Find the first cell at or after `(start_row, start_col)` containing `text`
    ///
    /// Cells are scanned in row-major order. Display text is matched, and for formula cells
    /// the formula text as well.
    pub fn find(
        &self,
        text: &str,
        start_row: u32,
        start_col: u32,
        case_sensitive: bool,
    ) -> Option<(u32, u32)> {
        if text.is_empty() {
            return None;
        }
        let needle = if case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        };
        let matches = |haystack: &str| {
            if case_sensitive {
                haystack.contains(&needle)
            } else {
                haystack.to_lowercase().contains(&needle)
            }
        };

        let mut keys: Vec<(u32, u32)> = self
            .cells
            .keys()
            .copied()
            .filter(|key| *key >= (start_row, start_col))
            .collect();
        keys.sort_unstable();

        keys.into_iter().find(|key| {
            let cell = &self.cells[key];
            matches(cell.display().as_ref()) || cell.formula().map_or(false, |f| matches(f))
        })
    }

    // === Listeners ===

    /// Register a callback invoked with `(row, col)` after every [`Sheet::set_cell`]
    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(u32, u32) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a callback; returns false if the id is unknown
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, row: u32, col: u32) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(row, col);
        }
    }

    // === Enumeration ===

    /// Validate cell position
    fn validate_cell_position(&self, row: u32, col: u32) -> Result<()> {
        if !self.in_bounds(row, col) {
            return Err(Error::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if no cell holds a value or formula
    pub fn is_empty(&self) -> bool {
        self.cells.values().all(Cell::is_empty)
    }

    /// Iterate over all formula cells in row-major order: (row, col, formula_text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u32, &str)> {
        self.formulas
            .iter()
            .map(|(&(row, col), text)| (row, col, text.as_str()))
    }

    /// Number of formula cells
    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    /// Bounds of non-empty cells as (min_row, min_col, max_row, max_col)
    pub fn used_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        self.cells
            .iter()
            .filter(|(_, cell)| !cell.is_empty())
            .fold(None, |acc, (&(row, col), _)| match acc {
                None => Some((row, col, row, col)),
                Some((r0, c0, r1, c1)) => Some((r0.min(row), c0.min(col), r1.max(row), c1.max(col))),
            })
    }

    fn used_extent(&self) -> Option<(u32, u32)> {
        self.used_bounds().map(|(_, _, max_row, max_col)| (max_row, max_col))
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sheet")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("cells", &self.cells.len())
            .field("formulas", &self.formulas)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellKind;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_basic_operations() {
        let mut sheet = Sheet::new();

        sheet.set_cell(0, 0, 42.0, None).unwrap();
        let cell = sheet.get_cell(0, 0);
        assert_eq!(cell.value(), &CellValue::Number(42.0));
        assert_eq!(cell.kind(), CellKind::Number);

        // Reads never materialize cells
        assert!(sheet.get_cell(5, 5).is_empty());
        assert!(sheet.get_cell(5000, 5000).is_empty());
        assert_eq!(sheet.cell_count(), 1);
    }

    #[test]
    fn test_kind_inference() {
        let mut sheet = Sheet::new();

        assert_eq!(sheet.set_cell(0, 0, true, None).unwrap().kind(), CellKind::Boolean);
        assert_eq!(sheet.set_cell(0, 1, "abc", None).unwrap().kind(), CellKind::Text);
        assert_eq!(sheet.set_cell(0, 2, 7, None).unwrap().kind(), CellKind::Number);
        assert_eq!(
            sheet
                .set_cell(0, 3, CellValue::Empty, Some("SUM(A1:A2)"))
                .unwrap()
                .kind(),
            CellKind::Formula
        );
        assert_eq!(sheet.formula_at(0, 3), Some("=SUM(A1:A2)"));
    }

    #[test]
    fn test_out_of_bounds_write() {
        let mut sheet = Sheet::with_bounds(10, 5);

        assert!(matches!(
            sheet.set_cell(10, 0, 1.0, None),
            Err(Error::OutOfBounds { row: 10, .. })
        ));
        assert!(sheet.set_cell(0, 5, 1.0, None).is_err());
        assert!(sheet.set_cell(9, 4, 1.0, None).is_ok());
    }

    #[test]
    fn test_formula_index_follows_cells() {
        let mut sheet = Sheet::new();

        sheet.set_input(0, 0, "=A2+1").unwrap();
        sheet.set_input(1, 1, "=B1").unwrap();
        assert_eq!(sheet.formula_count(), 2);
        assert_eq!(sheet.get_cell(0, 0).formula(), sheet.formula_at(0, 0));

        // Overwriting with a literal drops the index entry
        sheet.set_input(0, 0, "5").unwrap();
        assert_eq!(sheet.formula_at(0, 0), None);
        assert_eq!(sheet.get_cell(0, 0).kind(), CellKind::Number);

        sheet.clear_range(1, 1, 1, 1);
        assert_eq!(sheet.formula_count(), 0);
    }

    #[test]
    fn test_set_result_keeps_formula() {
        let mut sheet = Sheet::new();
        sheet.set_input(0, 0, "=1+1").unwrap();

        assert!(sheet.set_result(0, 0, CellValue::Number(2.0)));
        let cell = sheet.get_cell(0, 0);
        assert_eq!(cell.formula(), Some("=1+1"));
        assert_eq!(cell.kind(), CellKind::Formula);
        assert_eq!(cell.display(), "2");

        // Not a formula cell
        sheet.set_input(1, 0, "x").unwrap();
        assert!(!sheet.set_result(1, 0, CellValue::Number(2.0)));
        assert!(!sheet.set_result(2, 0, CellValue::Number(2.0)));
    }

    #[test]
    fn test_get_range_clamps() {
        let mut sheet = Sheet::with_bounds(3, 3);
        sheet.set_cell(2, 2, 9.0, None).unwrap();

        let range = sheet.get_range(1, 1, 100, 100);
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].len(), 2);
        assert_eq!(range[1][1].value(), &CellValue::Number(9.0));

        assert!(sheet.get_range(5, 0, 10, 2).is_empty());
    }

    #[test]
    fn test_insert_row_shifts_down() {
        let mut sheet = Sheet::new();
        sheet.set_cell(5, 0, "five", None).unwrap();
        sheet.set_cell(1, 0, "one", None).unwrap();
        sheet.set_input(2, 0, "=A1").unwrap();

        assert!(sheet.insert_row(2, 1));
        assert_eq!(sheet.rows(), 1001);
        assert_eq!(sheet.get_cell(6, 0).display(), "five");
        assert!(sheet.get_cell(5, 0).is_empty());
        assert_eq!(sheet.get_cell(1, 0).display(), "one");
        assert_eq!(sheet.formula_at(3, 0), Some("=A1"));
        assert_eq!(sheet.formula_at(2, 0), None);

        assert!(!sheet.insert_row(1002, 1));
        assert!(sheet.insert_row(1001, 1));
    }

    #[test]
    fn test_insert_column_shifts_right() {
        let mut sheet = Sheet::new();
        sheet.set_cell(0, 3, 3.0, None).unwrap();
        sheet.set_cell(0, 0, 0.0, None).unwrap();

        assert!(sheet.insert_column(1, 2));
        assert_eq!(sheet.cols(), 28);
        assert_eq!(sheet.get_cell(0, 5).value(), &CellValue::Number(3.0));
        assert_eq!(sheet.get_cell(0, 0).value(), &CellValue::Number(0.0));
        assert!(!sheet.insert_column(29, 1));
    }

    #[test]
    fn test_delete_row_drops_and_shifts() {
        let mut sheet = Sheet::with_bounds(10, 3);
        sheet.set_cell(0, 0, "keep", None).unwrap();
        sheet.set_cell(2, 0, "gone", None).unwrap();
        sheet.set_input(3, 1, "=A1").unwrap();
        sheet.set_cell(6, 2, "moved", None).unwrap();

        assert!(sheet.delete_row(2, 2));
        assert_eq!(sheet.rows(), 8);
        assert_eq!(sheet.get_cell(0, 0).display(), "keep");
        assert_eq!(sheet.get_cell(4, 2).display(), "moved");
        assert_eq!(sheet.formula_count(), 0);
        assert_eq!(sheet.cell_count(), 2);

        assert!(!sheet.delete_row(8, 1));
        // Deleting past the end shrinks to the deleted part only
        assert!(sheet.delete_row(5, 100));
        assert_eq!(sheet.rows(), 5);
        assert!(sheet.delete_row(0, 100));
        assert_eq!(sheet.rows(), 0);
    }

    #[test]
    fn test_delete_column_drops_and_shifts() {
        let mut sheet = Sheet::new();
        sheet.set_cell(0, 1, "gone", None).unwrap();
        sheet.set_input(1, 4, "=1").unwrap();

        assert!(sheet.delete_column(1, 1));
        assert_eq!(sheet.cols(), 25);
        assert!(sheet.get_cell(0, 1).is_empty());
        assert_eq!(sheet.formula_at(1, 3), Some("=1"));
        assert!(!sheet.delete_column(25, 1));
    }

    #[test]
    fn test_clear_range() {
        let mut sheet = Sheet::new();
        sheet.set_cell(0, 0, 1.0, None).unwrap();
        sheet.set_cell(1, 1, 2.0, None).unwrap();
        sheet.set_cell(5, 5, 3.0, None).unwrap();

        assert_eq!(sheet.clear_range(0, 0, 2, 2), 2);
        assert!(sheet.get_cell(0, 0).is_empty());
        assert!(sheet.get_cell(1, 1).is_empty());
        assert_eq!(sheet.get_cell(5, 5).value(), &CellValue::Number(3.0));

        // Nothing stored there
        assert_eq!(sheet.clear_range(10, 10, 20, 20), 0);
    }

    #[test]
    fn test_find() {
        let mut sheet = Sheet::new();
        sheet.set_cell(0, 1, "Apple pie", None).unwrap();
        sheet.set_cell(2, 0, "apple", None).unwrap();
        sheet.set_cell(1, 3, "banana", None).unwrap();

        assert_eq!(sheet.find("APPLE", 0, 0, false), Some((0, 1)));
        assert_eq!(sheet.find("APPLE", 0, 0, true), None);
        assert_eq!(sheet.find("apple", 0, 0, true), Some((2, 0)));
        assert_eq!(sheet.find("apple", 0, 2, false), Some((2, 0)));
        assert_eq!(sheet.find("nan", 0, 0, false), Some((1, 3)));
        assert_eq!(sheet.find("cherry", 0, 0, false), None);
        assert_eq!(sheet.find("", 0, 0, false), None);
    }

    #[test]
    fn test_listeners() {
        let mut sheet = Sheet::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let id = sheet.add_listener(move |row, col| sink.borrow_mut().push((row, col)));

        sheet.set_cell(1, 2, 1.0, None).unwrap();
        sheet.set_input(3, 4, "=1").unwrap();
        assert!(sheet.set_cell(5000, 0, 1.0, None).is_err());
        assert_eq!(*seen.borrow(), vec![(1, 2), (3, 4)]);

        assert!(sheet.remove_listener(id));
        assert!(!sheet.remove_listener(id));
        sheet.set_cell(0, 0, 1.0, None).unwrap();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_list_round_trip() {
        let data = vec![
            vec!["1", "", "x"],
            vec!["", "=A1+1"],
        ];
        let sheet = Sheet::from_list(&data).unwrap();

        assert_eq!(sheet.get_cell(0, 0).value(), &CellValue::Number(1.0));
        assert_eq!(sheet.formula_at(1, 1), Some("=A1+1"));
        assert_eq!(
            sheet.to_list(),
            vec![
                vec!["1".to_string(), String::new(), "x".to_string()],
                vec![String::new(), "=A1+1".to_string(), String::new()],
            ]
        );

        assert!(Sheet::new().to_list().is_empty());
    }
}
