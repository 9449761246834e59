//! Build-history adapter.
//!
//! Observed builds are produced by an external ingester and read here. The
//! queue consumes the store through the [`BuildStore`] trait; the blamelist
//! simulation shared by the planner and the ingester lives in
//! [`blamelist`].

mod blamelist;
mod mem;

pub use blamelist::{find_commits_for_build, BlamelistOutcome, CoverageLookup};
pub use mem::InMemoryBuildStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// One execution record for a builder.
///
/// `commits` is the blamelist: the ordered set of commits this build is
/// credited with first covering. For a given (builder, repo) every commit
/// appears in at most one build's blamelist; the ingester maintains that
/// invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub master: String,
    pub builder: String,
    pub number: u64,
    pub repository: String,
    pub got_revision: String,
    #[serde(default)]
    pub commits: Vec<String>,
}

/// Read access to the build-history store.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Bulk fetch: for each hash, the builds whose blamelist contains it.
    async fn builds_for_commits(&self, hashes: &[String]) -> Result<HashMap<String, Vec<Build>>>;

    /// Point fetch by (master, builder, number).
    async fn build_by_number(&self, master: &str, builder: &str, number: u64) -> Result<Option<Build>>;
}
