//! Cell address and range types
//!
//! Addresses are written as column letters followed by a 1-based row number ("A1", "AB12").
//! Internally rows and columns are 0-based. Column letters use bijective base 26: there is
//! no zero digit, so 25 = "Z" is followed by 26 = "AA".

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Convert a 0-based column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
pub fn column_to_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = i64::from(col);

    while n >= 0 {
        letters.push((b'A' + (n % 26) as u8) as char);
        n = n / 26 - 1;
    }

    letters.iter().rev().collect()
}

/// Convert column letters to a 0-based index (A = 0, Z = 25, AA = 26, etc.)
///
/// Letters are case-insensitive.
pub fn letters_to_column(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidAddress("empty column letters".into()));
    }

    let mut acc: u64 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::InvalidAddress(format!(
                "invalid column letter '{}'",
                c
            )));
        }
        let digit = u64::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
        acc = acc * 26 + digit;
        // One past u32::MAX is still representable once we subtract the 1 below
        if acc > u64::from(u32::MAX) + 1 {
            return Err(Error::InvalidAddress(format!(
                "column '{}' is too large",
                letters
            )));
        }
    }

    Ok((acc - 1) as u32)
}

/// Parse an A1-style address into a 0-based `(row, col)` pair
///
/// The whole string must be one or more letters followed by one or more digits.
pub fn parse_address(text: &str) -> Result<(u32, u32)> {
    let bytes = text.as_bytes();
    let split = bytes
        .iter()
        .position(|b| !b.is_ascii_alphabetic())
        .unwrap_or(bytes.len());

    if split == 0 {
        return Err(Error::InvalidAddress(format!(
            "no column letters in '{}'",
            text
        )));
    }

    let digits = &text[split..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidAddress(format!(
            "invalid row number in '{}'",
            text
        )));
    }

    let row: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", text)))?;

    // Rows are 1-based in text, 0-based internally
    if row == 0 || row > u64::from(u32::MAX) + 1 {
        return Err(Error::InvalidAddress(format!(
            "row number out of range in '{}'",
            text
        )));
    }

    let col = letters_to_column(&text[..split])?;
    Ok(((row - 1) as u32, col))
}

/// Format a 0-based `(row, col)` pair as an A1-style address
pub fn format_address(row: u32, col: u32) -> String {
    format!("{}{}", column_to_letters(col), u64::from(row) + 1)
}

/// A cell address (e.g., "A1")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ...)
    pub col: u32,
}

impl CellAddress {
    /// Create a new cell address
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use gridcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("B3").unwrap();
    /// assert_eq!(addr.row, 2);
    /// assert_eq!(addr.col, 1);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let (row, col) = parse_address(s.trim())?;
        Ok(Self { row, col })
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        format_address(self.row, self.col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        // Normalize so start is top-left and end is bottom-right
        Self {
            start: CellAddress::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellAddress::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1:B10 notation
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        match s.split_once(':') {
            Some((start, end)) => {
                let start = CellAddress::parse(start)
                    .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
                let end = CellAddress::parse(end)
                    .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
                Ok(Self::new(start, end))
            }
            None => Ok(Self::single(CellAddress::parse(s)?)),
        }
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.row >= self.start.row
            && addr.row <= self.end.row
            && addr.col >= self.start.col
            && addr.col <= self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u64 {
        u64::from(self.end.row - self.start.row) + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u64 {
        u64::from(self.end.col - self.start.col) + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() * self.col_count()
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            next: Some(self.start),
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over cells in a range, row-major
pub struct CellRangeIterator {
    range: CellRange,
    next: Option<CellAddress>,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        self.next = if current.col < self.range.end.col {
            Some(CellAddress::new(current.row, current.col + 1))
        } else if current.row < self.range.end.row {
            Some(CellAddress::new(current.row + 1, self.range.start.col))
        } else {
            None
        };

        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_letters() {
        assert_eq!(column_to_letters(0), "A");
        assert_eq!(column_to_letters(1), "B");
        assert_eq!(column_to_letters(25), "Z");
        assert_eq!(column_to_letters(26), "AA");
        assert_eq!(column_to_letters(27), "AB");
        assert_eq!(column_to_letters(701), "ZZ");
        assert_eq!(column_to_letters(702), "AAA");
        assert_eq!(column_to_letters(16383), "XFD");
    }

    #[test]
    fn test_letters_to_column() {
        assert_eq!(letters_to_column("A").unwrap(), 0);
        assert_eq!(letters_to_column("Z").unwrap(), 25);
        assert_eq!(letters_to_column("AA").unwrap(), 26);
        assert_eq!(letters_to_column("ZZ").unwrap(), 701);
        assert_eq!(letters_to_column("AAA").unwrap(), 702);

        // Case insensitive
        assert_eq!(letters_to_column("a").unwrap(), 0);
        assert_eq!(letters_to_column("aB").unwrap(), 27);

        assert!(letters_to_column("").is_err());
        assert!(letters_to_column("A1").is_err());
        assert!(letters_to_column("ZZZZZZZZZZ").is_err());
    }

    #[test]
    fn test_column_round_trip() {
        for n in 0..=1000 {
            assert_eq!(letters_to_column(&column_to_letters(n)).unwrap(), n);
        }
        assert_eq!(letters_to_column(&column_to_letters(u32::MAX)).unwrap(), u32::MAX);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("A1").unwrap(), (0, 0));
        assert_eq!(parse_address("B2").unwrap(), (1, 1));
        assert_eq!(parse_address("ab12").unwrap(), (11, 27));
        assert_eq!(parse_address("AA100").unwrap(), (99, 26));
    }

    #[test]
    fn test_parse_address_errors() {
        assert!(parse_address("").is_err());
        assert!(parse_address("A").is_err());
        assert!(parse_address("1").is_err());
        assert!(parse_address("A0").is_err());
        assert!(parse_address("1A").is_err());
        assert!(parse_address("A1B").is_err());
        assert!(parse_address("$A$1").is_err());
        assert!(parse_address(" A1").is_err());
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address(0, 0), "A1");
        assert_eq!(format_address(99, 2), "C100");
        assert_eq!(format_address(11, 27), "AB12");
        assert_eq!(CellAddress::new(4, 26).to_string(), "AA5");
    }

    #[test]
    fn test_cell_range_parse() {
        let range = CellRange::parse("A1:B2").unwrap();
        assert_eq!(range.start, CellAddress::new(0, 0));
        assert_eq!(range.end, CellAddress::new(1, 1));

        // Reversed corners are normalized
        let range = CellRange::parse("B2:A1").unwrap();
        assert_eq!(range.start, CellAddress::new(0, 0));
        assert_eq!(range.end, CellAddress::new(1, 1));

        let range = CellRange::parse("C3").unwrap();
        assert_eq!(range.start, range.end);

        assert!(matches!(
            CellRange::parse("A1:B"),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_cell_range_contains() {
        let range = CellRange::parse("B2:D4").unwrap();

        assert!(range.contains(&CellAddress::new(1, 1)));
        assert!(range.contains(&CellAddress::new(3, 3)));
        assert!(!range.contains(&CellAddress::new(0, 0)));
        assert!(!range.contains(&CellAddress::new(4, 1)));
        assert_eq!(range.cell_count(), 9);
    }

    #[test]
    fn test_cell_range_iterator() {
        let range = CellRange::parse("A1:B2").unwrap();
        let cells: Vec<_> = range.cells().collect();

        assert_eq!(
            cells,
            vec![
                CellAddress::new(0, 0),
                CellAddress::new(0, 1),
                CellAddress::new(1, 0),
                CellAddress::new(1, 1),
            ]
        );
    }
}
