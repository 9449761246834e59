//! Per-builder build index.
//!
//! Lives only for the duration of one refresh. The planner commits its
//! hypothetical builds here, so lookups reflect the simulated state of the
//! builder, not just the observed one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::history::{Build, CoverageLookup};
use crate::repograph::RepoGraph;

/// Index of a single builder's builds: by covered commit and by number.
pub struct BuilderCache {
    pub master: String,
    pub builder: String,
    pub repo_name: String,
    pub repo: Arc<dyn RepoGraph>,
    builds_by_number: BTreeMap<u64, Build>,
    number_by_commit: HashMap<String, u64>,
    max_build_number: Option<u64>,
}

impl BuilderCache {
    pub fn new(master: String, builder: String, repo_name: String, repo: Arc<dyn RepoGraph>) -> Self {
        Self {
            master,
            builder,
            repo_name,
            repo,
            builds_by_number: BTreeMap::new(),
            number_by_commit: HashMap::new(),
            max_build_number: None,
        }
    }

    /// Index a build. Re-putting a number replaces the previous instance;
    /// the most recently put build wins, which is how simulated blamelist
    /// mutations land.
    pub fn put_build(&mut self, build: Build) {
        for commit in &build.commits {
            self.number_by_commit.insert(commit.clone(), build.number);
        }
        self.max_build_number = Some(self.max_build_number.map_or(build.number, |m| m.max(build.number)));
        self.builds_by_number.insert(build.number, build);
    }

    /// The build currently credited with covering the given commit.
    pub fn build_for_commit(&self, hash: &str) -> Option<&Build> {
        let number = self.number_by_commit.get(hash)?;
        self.builds_by_number.get(number)
    }

    pub fn build_by_number(&self, number: u64) -> Option<&Build> {
        self.builds_by_number.get(&number)
    }

    pub fn max_build_number(&self) -> Option<u64> {
        self.max_build_number
    }

    /// Number a hypothetical next build would take.
    pub fn next_build_number(&self) -> u64 {
        self.max_build_number.map_or(0, |m| m + 1)
    }
}

impl CoverageLookup for BuilderCache {
    fn build_for_commit(&self, hash: &str) -> Option<&Build> {
        BuilderCache::build_for_commit(self, hash)
    }

    fn build_by_number(&self, number: u64) -> Option<&Build> {
        BuilderCache::build_by_number(self, number)
    }
}
