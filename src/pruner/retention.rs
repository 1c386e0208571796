//! Retention boundary shared by every store in one run
//!
//! One global boundary keeps all application stores queryable at the same
//! historical heights. The boundary version itself is always retained:
//! pruning removes everything strictly below it.

use std::fmt;

use super::{PruneError, Result};

/// Version/height below which data is eligible for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetentionBoundary(i64);

impl RetentionBoundary {
    /// `latest - keep`, never above `latest`. May be `<= 0` (no-op).
    pub fn below(latest: i64, keep: u64) -> Self {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        Self(latest.saturating_sub(keep))
    }

    /// Boundary for the application stores; an empty or unready store set
    /// (`latest <= 0`) has no safe boundary
    pub fn for_latest(latest: i64, keep: u64) -> Result<Self> {
        if latest <= 0 {
            return Err(PruneError::NoValidHeight { latest });
        }
        Ok(Self::below(latest, keep))
    }

    pub fn height(&self) -> i64 {
        self.0
    }

    /// Nothing can be deleted below a non-positive boundary
    pub fn is_noop(&self) -> bool {
        self.0 <= 0
    }

    /// Highest version removed when pruning to this boundary
    pub fn last_pruned(&self) -> i64 {
        self.0 - 1
    }
}

impl fmt::Display for RetentionBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_from_latest() {
        let boundary = RetentionBoundary::for_latest(100, 10).unwrap();
        assert_eq!(boundary.height(), 90);
        assert_eq!(boundary.last_pruned(), 89);
        assert!(!boundary.is_noop());
    }

    #[test]
    fn test_no_valid_height() {
        for latest in [0, -5] {
            let err = RetentionBoundary::for_latest(latest, 10).unwrap_err();
            assert!(matches!(err, PruneError::NoValidHeight { latest: l } if l == latest));
        }
    }

    #[test]
    fn test_keep_exceeding_latest_is_noop() {
        let boundary = RetentionBoundary::for_latest(10, 10).unwrap();
        assert!(boundary.is_noop());

        let boundary = RetentionBoundary::for_latest(10, 500).unwrap();
        assert_eq!(boundary.height(), -490);
        assert!(boundary.is_noop());
    }

    #[test]
    fn test_boundary_never_exceeds_latest() {
        for latest in [1, 2, 50, 1000, i64::MAX] {
            for keep in [0, 1, 7, 1000, u64::MAX] {
                let boundary = RetentionBoundary::below(latest, keep);
                assert!(boundary.height() <= latest, "latest={} keep={}", latest, keep);
            }
        }
    }

    #[test]
    fn test_keep_zero_retains_latest_only() {
        let boundary = RetentionBoundary::below(1000, 0);
        assert_eq!(boundary.height(), 1000);
        assert_eq!(boundary.last_pruned(), 999);
    }
}
