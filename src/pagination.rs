//! Running page offset across merged sections

use crate::error::{Error, Result};

/// Running page counter
///
/// Seeded with the page the first section title will land on, and advanced
/// by each section's final page count. It only ever moves forward.
#[derive(Debug, Clone)]
pub struct PaginationTracker {
    current: u32,
}

impl PaginationTracker {
    pub fn new(start_page: u32) -> Self {
        Self { current: start_page }
    }

    /// The page the next section's title lands on
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Return the page before advancing, then advance by `pages`
    ///
    /// `advance(0)` is a plain read. Fails instead of wrapping past `u32::MAX`.
    pub fn advance(&mut self, pages: u32) -> Result<u32> {
        let before = self.current;
        self.current = before
            .checked_add(pages)
            .ok_or_else(|| Error::Assembly(format!("page number overflow: {} + {} pages", before, pages)))?;
        Ok(before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_returns_previous_value() {
        let mut tracker = PaginationTracker::new(3);
        assert_eq!(tracker.advance(0).unwrap(), 3);
        assert_eq!(tracker.advance(4).unwrap(), 3);
        assert_eq!(tracker.current(), 7);
        assert_eq!(tracker.advance(0).unwrap(), 7);
    }

    #[test]
    fn test_recorded_pages_exclude_own_section() {
        let mut tracker = PaginationTracker::new(3);
        let mut recorded = Vec::new();
        for cost in [4, 2, 6] {
            recorded.push(tracker.advance(0).unwrap());
            tracker.advance(cost).unwrap();
        }
        assert_eq!(recorded, vec![3, 7, 9]);
        assert_eq!(tracker.current(), 15);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let mut tracker = PaginationTracker::new(u32::MAX - 1);
        let err = tracker.advance(2).unwrap_err();
        assert!(matches!(err, Error::Assembly(_)));
        // A failed advance leaves the counter where it was
        assert_eq!(tracker.current(), u32::MAX - 1);
    }
}
