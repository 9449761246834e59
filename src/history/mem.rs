//! In-memory build-history store.
//!
//! Backs tests and the fixture-driven inspection binary. `ingest_build`
//! mirrors the production ingester: it computes the new build's blamelist
//! and rewrites the victim build when commits move.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::blamelist::{find_commits_for_build, CoverageLookup};
use super::{Build, BuildStore};
use crate::error::{QueueError, Result};
use crate::repograph::RepoMap;

type BuildKey = (String, String, u64);

fn key(build: &Build) -> BuildKey {
    (build.master.clone(), build.builder.clone(), build.number)
}

/// Build store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryBuildStore {
    builds: RwLock<BTreeMap<BuildKey, Build>>,
}

/// Coverage view scoped to one (master, builder) pair, over the full store.
struct BuilderView<'a> {
    builds: &'a BTreeMap<BuildKey, Build>,
    master: &'a str,
    builder: &'a str,
}

impl CoverageLookup for BuilderView<'_> {
    fn build_for_commit(&self, hash: &str) -> Option<&Build> {
        self.builds.values().find(|b| {
            b.master == self.master && b.builder == self.builder && b.commits.iter().any(|c| c == hash)
        })
    }

    fn build_by_number(&self, number: u64) -> Option<&Build> {
        self.builds
            .get(&(self.master.to_string(), self.builder.to_string(), number))
    }
}

impl InMemoryBuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a build record as-is. The blamelist must already be correct;
    /// use [`ingest_build`](Self::ingest_build) to compute it.
    pub async fn insert(&self, build: Build) {
        self.builds.write().await.insert(key(&build), build);
    }

    /// Ingest a freshly completed build: compute its blamelist from the repo
    /// graph and the builder's existing history, shrink the victim build's
    /// blamelist if commits were stolen, and store the result.
    pub async fn ingest_build(&self, mut build: Build, repos: &RepoMap) -> Result<()> {
        let repo = repos
            .get(&build.repository)
            .ok_or_else(|| QueueError::UnknownRepo(build.repository.clone()))?;
        let mut builds = self.builds.write().await;
        let outcome = {
            let view = BuilderView {
                builds: &builds,
                master: &build.master,
                builder: &build.builder,
            };
            find_commits_for_build(&view, &build, repo.as_ref())?
        };
        if let Some(number) = outcome.steal_from {
            let victim_key = (build.master.clone(), build.builder.clone(), number);
            let victim = builds
                .get_mut(&victim_key)
                .ok_or_else(|| QueueError::Storage(format!("no build numbered {number}")))?;
            victim.commits.retain(|c| !outcome.stolen.contains(c));
        }
        build.commits = outcome.commits;
        builds.insert(key(&build), build);
        Ok(())
    }
}

#[async_trait]
impl BuildStore for InMemoryBuildStore {
    async fn builds_for_commits(&self, hashes: &[String]) -> Result<HashMap<String, Vec<Build>>> {
        let builds = self.builds.read().await;
        let mut found: HashMap<String, Vec<Build>> = HashMap::new();
        for hash in hashes {
            for build in builds.values() {
                if build.commits.iter().any(|c| c == hash) {
                    found.entry(hash.clone()).or_default().push(build.clone());
                }
            }
        }
        Ok(found)
    }

    async fn build_by_number(&self, master: &str, builder: &str, number: u64) -> Result<Option<Build>> {
        let builds = self.builds.read().await;
        Ok(builds.get(&(master.to_string(), builder.to_string(), number)).cloned())
    }
}
