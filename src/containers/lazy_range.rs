//! `LazyRange`: a possibly-infinite integer range (spec.md §4.2).
//!
//! Grounded on the teacher's container style (owning wrapper, value-semantic
//! reference) but specialized to the small state a range needs: no element
//! storage at all, just the bounds, so `generate()` can restart cheaply.

use crate::error::EngineError;

/// `{ start, end?, inclusive }` from spec.md §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LazyRange {
    pub start: i64,
    pub end: Option<i64>,
    pub inclusive: bool,
}

impl LazyRange {
    #[must_use]
    pub fn new(start: i64, end: Option<i64>, inclusive: bool) -> Self {
        Self { start, end, inclusive }
    }

    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.end.is_none()
    }

    /// Exclusive upper bound used for iteration, or `None` when infinite.
    fn exclusive_end(&self) -> Option<i64> {
        self.end.map(|e| if self.inclusive { e + 1 } else { e })
    }

    /// Materializes the range; fails when infinite (spec.md §4.2).
    pub fn to_array(&self) -> Result<Vec<i64>, EngineError> {
        let Some(end) = self.exclusive_end() else {
            return Err(EngineError::container_error("cannot materialize an infinite range"));
        };
        Ok((self.start..end).collect())
    }

    /// A restartable lazy sequence of ints, per spec.md §4.2 `generate`.
    #[must_use]
    pub fn generate(&self) -> RangeIter {
        RangeIter { next: self.start, end: self.exclusive_end() }
    }

    #[must_use]
    pub fn len_bound(&self) -> Option<usize> {
        self.exclusive_end().map(|end| usize::try_from((end - self.start).max(0)).unwrap_or(usize::MAX))
    }
}

/// Iterator backing `generate()`. Restartable because `LazyRange` is `Copy`
/// and a fresh iterator is created from the original bounds each time.
pub struct RangeIter {
    next: i64,
    end: Option<i64>,
}

impl Iterator for RangeIter {
    type Item = i64;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(end) = self.end {
            if self.next >= end {
                return None;
            }
        }
        let current = self.next;
        self.next += 1;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_to_array_length() {
        let r = LazyRange::new(2, Some(7), false);
        let arr = r.to_array().unwrap();
        assert_eq!(arr, vec![2, 3, 4, 5, 6]);
        assert_eq!(arr.len(), (7 - 2).max(0) as usize);
    }

    #[test]
    fn inclusive_to_array_length() {
        let r = LazyRange::new(2, Some(7), true);
        let arr = r.to_array().unwrap();
        assert_eq!(arr.len(), (7 - 2 + 1) as usize);
    }

    #[test]
    fn infinite_range_rejects_to_array() {
        let r = LazyRange::new(0, None, false);
        assert!(r.is_infinite());
        assert!(r.to_array().is_err());
    }

    #[test]
    fn generate_is_restartable() {
        let r = LazyRange::new(0, Some(3), false);
        let first: Vec<i64> = r.generate().collect();
        let second: Vec<i64> = r.generate().collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![0, 1, 2]);
    }
}
