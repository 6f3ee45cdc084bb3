//! Bookkeeping of claimed byte regions
//!
//! Every recognizer that accepts data claims `[offset, offset + size)` of its
//! container. A [`RangeChecker`] rejects claims that would make two different
//! recognized regions overlap. One checker lives for one container of one walk.

use std::collections::BTreeMap;

/// How a [`RangeChecker`] treats new regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    /// Only the cumulative size is limited.
    Simple,
    /// No overlap at all, including exact duplicates.
    Strict,
    /// No overlap, but re-adding an identical region is accepted.
    Shared,
}

/// Tracks accepted regions of one container.
#[derive(Debug, Clone)]
pub struct RangeChecker {
    mode: RangeMode,
    limit: usize,
    total: usize,
    // offset -> size, non-overlapping
    ranges: BTreeMap<usize, usize>,
    affected: Option<(usize, usize)>,
}

impl RangeChecker {
    /// Accepts any regions while their summed size stays within `limit`.
    pub fn simple(limit: usize) -> Self {
        Self::with_mode(RangeMode::Simple, limit)
    }

    /// Accepts non-overlapping regions ending at or before `limit`.
    pub fn strict(limit: usize) -> Self {
        Self::with_mode(RangeMode::Strict, limit)
    }

    /// Like [`RangeChecker::strict`], but identical regions may be added repeatedly.
    pub fn shared(limit: usize) -> Self {
        Self::with_mode(RangeMode::Shared, limit)
    }

    fn with_mode(mode: RangeMode, limit: usize) -> Self {
        Self {
            mode,
            limit,
            total: 0,
            ranges: BTreeMap::new(),
            affected: None,
        }
    }

    /// Try to claim `[offset, offset + size)`. Returns `false` if the claim is rejected.
    pub fn add_range(&mut self, offset: usize, size: usize) -> bool {
        if size == 0 {
            return false;
        }
        let Some(end) = offset.checked_add(size) else {
            return false;
        };

        match self.mode {
            RangeMode::Simple => match self.total.checked_add(size) {
                Some(total) if total <= self.limit => self.total = total,
                _ => return false,
            },
            RangeMode::Strict | RangeMode::Shared => {
                if end > self.limit {
                    return false;
                }
                // accepted regions never overlap, so only the last one starting before `end` can
                if let Some((&start, &len)) = self.ranges.range(..end).next_back() {
                    if start + len > offset {
                        return self.mode == RangeMode::Shared && start == offset && len == size;
                    }
                }
                self.ranges.insert(offset, size);
                self.total += size;
            }
        }

        self.affected = Some(match self.affected {
            Some((min, max)) => (min.min(offset), max.max(end)),
            None => (offset, end),
        });
        true
    }

    /// `(lowest offset, highest end)` over accepted regions, `(0, 0)` if none.
    pub fn affected_range(&self) -> (usize, usize) {
        self.affected.unwrap_or((0, 0))
    }

    /// Sum of accepted region sizes (duplicates counted once).
    #[cfg(test)]
    fn total_size(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_rejects_partial_overlap() {
        let mut checker = RangeChecker::strict(100);
        assert!(checker.add_range(0, 10));
        assert!(!checker.add_range(5, 10));
        assert_eq!(checker.affected_range(), (0, 10));
    }

    #[test]
    fn strict_accepts_adjacent_ranges() {
        let mut checker = RangeChecker::strict(100);
        assert!(checker.add_range(0, 10));
        assert!(checker.add_range(10, 10));
        assert_eq!(checker.affected_range(), (0, 20));
    }

    #[test]
    fn strict_rejects_duplicates_and_enclosing_ranges() {
        let mut checker = RangeChecker::strict(100);
        assert!(checker.add_range(20, 10));
        assert!(!checker.add_range(20, 10));
        assert!(!checker.add_range(0, 50));
        assert!(!checker.add_range(25, 1));
        assert!(checker.add_range(0, 20));
        assert!(checker.add_range(30, 5));
        assert_eq!(checker.affected_range(), (0, 35));
    }

    #[test]
    fn strict_respects_limit() {
        let mut checker = RangeChecker::strict(16);
        assert!(!checker.add_range(10, 7));
        assert!(checker.add_range(10, 6));
    }

    #[test]
    fn shared_accepts_exact_duplicates() {
        let mut checker = RangeChecker::shared(100);
        assert!(checker.add_range(0, 10));
        assert!(checker.add_range(0, 10));
        assert_eq!(checker.affected_range(), (0, 10));
        assert_eq!(checker.total_size(), 10);
        assert!(!checker.add_range(0, 11));
        assert!(!checker.add_range(9, 1));
    }

    #[test]
    fn simple_limits_cumulative_size() {
        let mut checker = RangeChecker::simple(20);
        assert!(checker.add_range(0, 10));
        assert!(checker.add_range(5, 10));
        assert!(!checker.add_range(100, 1));
        assert_eq!(checker.affected_range(), (0, 15));
    }

    #[test]
    fn empty_and_overflowing_ranges_are_rejected() {
        let mut checker = RangeChecker::shared(usize::MAX);
        assert!(!checker.add_range(0, 0));
        assert!(!checker.add_range(usize::MAX, 2));
        assert_eq!(checker.affected_range(), (0, 0));
    }
}
