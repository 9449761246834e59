//! Build candidates and their ordering.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::repograph::Commit;

/// A (commit, builder) pair the scheduler proposes to build, with the score
/// the planner assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildCandidate {
    pub commit: Arc<Commit>,
    pub builder: String,
    pub repo: String,
    pub score: f64,
}

impl BuildCandidate {
    /// Ascending order: primarily by score, ties broken by commit hash so
    /// the sort order stays consistent for testing.
    pub fn cmp_ascending(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.commit.hash.cmp(&other.commit.hash))
    }

    /// Descending by score; equal scores order by ascending hash.
    pub fn cmp_descending(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.commit.hash.cmp(&other.commit.hash))
    }
}
