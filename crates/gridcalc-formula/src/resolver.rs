//! Seams between the evaluator and the outside world
//!
//! The evaluator never touches a grid directly: it asks a [`Resolver`] for the raw text of
//! an address, and a [`Clock`] for the current time.

use chrono::{Local, NaiveDateTime};

/// Marks resolved text as a literal string, even if it starts with `=`
pub const TEXT_PREFIX: char = '\'';

/// Looks up the raw text of a cell by its A1 address
///
/// Formula cells resolve to their formula text (with the leading `=`) so the evaluator can
/// compute them on demand. Text cells whose content would read as a formula are returned
/// with a leading [`TEXT_PREFIX`]. `None` means the cell is empty or does not exist.
pub trait Resolver {
    fn resolve(&self, address: &str) -> Option<String>;

    /// Grid size as `(rows, cols)`; ranges are clamped to it
    fn bounds(&self) -> Option<(u32, u32)> {
        None
    }
}

impl<F> Resolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, address: &str) -> Option<String> {
        self(address)
    }
}

/// Resolver for formulas that do not reference any cell
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCells;

impl Resolver for NoCells {
    fn resolve(&self, _address: &str) -> Option<String> {
        None
    }
}

/// Source of the current time for volatile functions
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_closure_resolver() {
        let resolver = |addr: &str| (addr == "A1").then(|| "42".to_string());
        assert_eq!(resolver.resolve("A1").as_deref(), Some("42"));
        assert_eq!(resolver.resolve("B1"), None);
        assert_eq!(NoCells.resolve("A1"), None);
        assert_eq!(resolver.bounds(), None);
    }

    #[test]
    fn test_fixed_clock() {
        let instant = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(FixedClock(instant).now(), instant);
    }
}
