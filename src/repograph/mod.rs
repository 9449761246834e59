//! Repo view adapter.
//!
//! The queue consumes the commit graph of each tracked repository through the
//! [`RepoGraph`] trait: sync the mirror, resolve a ref to a commit, and walk
//! all reachable commits across branches. Commit nodes are immutable and
//! shared; identity is the content hash.

mod mem;

pub use mem::{CommitRecord, InMemoryRepo, RepoSnapshot};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::Result;

/// An immutable commit node.
///
/// `branches` is the set of branch heads from which this commit is reachable,
/// as of the most recent `update` of the owning graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub branches: BTreeSet<String>,
    pub parents: Vec<String>,
}

/// A view of one repository's commit graph.
#[async_trait]
pub trait RepoGraph: Send + Sync {
    /// Sync the underlying mirror. May block on I/O.
    async fn update(&self) -> Result<()>;

    /// Resolve a branch name or commit hash. Returns `None` when unknown.
    fn get(&self, reference: &str) -> Option<Arc<Commit>>;

    /// Depth-first walk of all commits reachable from any branch head. Each
    /// commit is visited at most once. The visitor returns `false` to stop
    /// descending into the commit's parents.
    fn recurse_all_branches(&self, visit: &mut dyn FnMut(&Arc<Commit>) -> Result<bool>) -> Result<()>;
}

/// Tracked repositories, keyed by repo URL. Ordered so that refreshes walk
/// repos in a stable order.
pub type RepoMap = BTreeMap<String, Arc<dyn RepoGraph>>;

/// Sort commits by ascending timestamp, ties broken by hash so that repeated
/// walks enumerate identically.
pub fn sort_commits(commits: &mut [Arc<Commit>]) {
    commits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));
}

/// Extract the hashes of a commit list, preserving order.
pub fn hashes(commits: &[Arc<Commit>]) -> Vec<String> {
    commits.iter().map(|c| c.hash.clone()).collect()
}
