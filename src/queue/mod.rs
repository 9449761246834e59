//! Build queue: the priority queue deciding which commit each builder
//! should build next.
//!
//! This module provides:
//! - **Refresh pipeline**: `update` walks every tracked repo, loads recent
//!   builds, and plans candidates per builder, then swaps the new queue in
//!   atomically.
//! - **Queue façade**: `pop`, `top_n`, and `recent_commits` serve the
//!   dispatcher between refreshes without ever waiting on I/O.
//!
//! # Architecture
//!
//! `update` does all heavy work against per-invocation structures: a
//! [`BuilderCache`] per active builder and two commit lists per repo. Repos
//! are processed concurrently, and builders within a repo are planned
//! concurrently; all sub-tasks are awaited before any error is reported, and
//! a failed refresh leaves the previous queue untouched.

mod cache;
mod candidate;
mod planner;

pub use cache::BuilderCache;
pub use candidate::BuildCandidate;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{debug, info};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::blacklist::Blacklist;
use crate::config::{QueueConfig, PERIOD_FOREVER};
use crate::error::{QueueError, Result};
use crate::history::BuildStore;
use crate::repograph::{hashes, sort_commits, Commit, RepoGraph, RepoMap};
use crate::score;
use planner::Planner;

/// Per-builder priority queue over (commit, builder) pairs.
pub struct BuildQueue {
    blacklist: Arc<dyn Blacklist>,
    store: Arc<dyn BuildStore>,
    repos: RepoMap,
    period_secs: u64,
    score_threshold: f64,
    time_lambda: f64,
    bisect_commit_limit: usize,
    blacklisted_branches: Vec<String>,
    default_repo: String,
    default_branch: String,
    queue: RwLock<BTreeMap<String, Vec<BuildCandidate>>>,
    recent_commits: RwLock<Vec<String>>,
}

impl BuildQueue {
    /// Create a queue considering commits within the configured period.
    /// Fails if the decay parameter is out of range.
    pub fn new(
        config: QueueConfig,
        repos: RepoMap,
        store: Arc<dyn BuildStore>,
        blacklist: Arc<dyn Blacklist>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            blacklist,
            store,
            repos,
            period_secs: config.period_secs,
            score_threshold: config.score_threshold,
            time_lambda: score::lambda(config.decay_at_24h),
            bisect_commit_limit: config.bisect_commit_limit,
            blacklisted_branches: config.blacklisted_branches,
            default_repo: config.default_repo,
            default_branch: config.default_branch,
            queue: RwLock::new(BTreeMap::new()),
            recent_commits: RwLock::new(Vec::new()),
        })
    }

    /// Refresh the queue from the repos and the build history as of now.
    pub async fn update(&self) -> Result<()> {
        self.update_at(Utc::now()).await
    }

    /// Inner refresh with an explicit clock, so tests can pin time.
    ///
    /// All repos are processed before errors are aggregated; on any failure
    /// nothing is swapped and the previous queue stays in place.
    pub async fn update_at(&self, now: DateTime<Utc>) -> Result<()> {
        info!("Updating build queue.");
        let tasks = self.repos.iter().map(|(repo_url, repo)| async move {
            (repo_url.clone(), self.update_repo(repo, now).await)
        });
        let mut queue: BTreeMap<String, Vec<BuildCandidate>> = BTreeMap::new();
        let mut failures: Vec<String> = Vec::new();
        for (repo_url, result) in join_all(tasks).await {
            match result {
                Ok(candidates) => queue.extend(candidates),
                Err(e) => failures.push(format!("{repo_url}: {e}")),
            }
        }
        if !failures.is_empty() {
            return Err(QueueError::Update(failures.join("\n")));
        }
        *self.queue.write().await = queue;
        Ok(())
    }

    /// Sync one repo and plan candidates for every builder seen in its
    /// recent build history.
    async fn update_repo(
        &self,
        repo: &Arc<dyn RepoGraph>,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, Vec<BuildCandidate>>> {
        repo.update().await?;

        let (from, from_preload) = self.windows(now);

        // Branch heads excluded from the walk.
        let mut head_blacklist: HashSet<String> = HashSet::new();
        for branch in &self.blacklisted_branches {
            if let Some(head) = repo.get(branch) {
                head_blacklist.insert(head.hash.clone());
            }
        }

        // Find recent commits. Builds are pre-loaded from a larger window
        // than the analysis itself so near-boundary commits score correctly.
        let mut recent: Vec<Arc<Commit>> = Vec::new();
        let mut preload: Vec<Arc<Commit>> = Vec::new();
        repo.recurse_all_branches(&mut |c| {
            if c.timestamp < from_preload {
                return Ok(false);
            }
            if head_blacklist.contains(&c.hash) {
                return Ok(false);
            }
            preload.push(c.clone());
            if c.timestamp > from {
                recent.push(c.clone());
            }
            Ok(true)
        })?;
        sort_commits(&mut recent);
        sort_commits(&mut preload);

        *self.recent_commits.write().await = hashes(&recent);

        // Get all builds associated with the preload window.
        let builds_by_commit = self.store.builds_for_commits(&hashes(&preload)).await?;

        // Index the builds per builder.
        let mut caches: BTreeMap<String, BuilderCache> = BTreeMap::new();
        let mut covered: Vec<&String> = builds_by_commit.keys().collect();
        covered.sort();
        for hash in covered {
            for build in &builds_by_commit[hash] {
                if let Some(rule) = self.blacklist.match_rule(&build.builder, "") {
                    debug!("Skipping blacklisted builder {} due to rule {:?}", build.builder, rule);
                    continue;
                }
                if !caches.contains_key(&build.builder) {
                    let build_repo = self
                        .repos
                        .get(&build.repository)
                        .ok_or_else(|| QueueError::UnknownRepo(build.repository.clone()))?;
                    caches.insert(
                        build.builder.clone(),
                        BuilderCache::new(
                            build.master.clone(),
                            build.builder.clone(),
                            build.repository.clone(),
                            build_repo.clone(),
                        ),
                    );
                }
                if let Some(cache) = caches.get_mut(&build.builder) {
                    cache.put_build(build.clone());
                }
            }
        }

        // Find candidates for each builder.
        let planner = Planner {
            blacklist: self.blacklist.as_ref(),
            store: self.store.as_ref(),
            time_lambda: self.time_lambda,
            score_threshold: self.score_threshold,
            bisect_commit_limit: self.bisect_commit_limit,
        };
        let planner = &planner;
        let recent = &recent;
        let tasks = caches.into_iter().map(|(builder, mut cache)| async move {
            let result = planner.candidates_for_builder(&mut cache, recent, now).await;
            (builder, result)
        });
        let mut candidates: BTreeMap<String, Vec<BuildCandidate>> = BTreeMap::new();
        let mut failures: Vec<String> = Vec::new();
        for (builder, result) in join_all(tasks).await {
            match result {
                Ok(found) => {
                    candidates.insert(builder, found);
                }
                Err(e) => failures.push(
                    QueueError::Planner {
                        builder,
                        message: e.to_string(),
                    }
                    .to_string(),
                ),
            }
        }
        if !failures.is_empty() {
            return Err(QueueError::RepoUpdate(failures.join("\n")));
        }
        Ok(candidates)
    }

    /// The analysis and preload window starts for the given clock.
    fn windows(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        if self.period_secs == PERIOD_FOREVER {
            return (DateTime::UNIX_EPOCH, DateTime::UNIX_EPOCH);
        }
        let from = now - Duration::seconds(self.period_secs as i64);
        let from_preload = now - Duration::seconds(self.period_secs as i64 * 3 / 2);
        (from, from_preload)
    }

    /// Retrieve the highest-priority candidate among the given builders and
    /// remove it from the queue. Returns [`QueueError::EmptyQueue`] when
    /// none of the builders has anything queued.
    ///
    /// A builder the queue has never seen gets a single synthetic candidate
    /// at the default repo's tip, with maximum score: with no history at
    /// all, tip-of-tree is the most valuable build.
    pub async fn pop(&self, builders: &[String]) -> Result<BuildCandidate> {
        let mut queue = self.queue.write().await;
        let mut best: Option<BuildCandidate> = None;
        for builder in builders {
            let head = match queue.get(builder) {
                Some(candidates) => candidates.first().cloned(),
                None => {
                    let repo = self
                        .repos
                        .get(&self.default_repo)
                        .ok_or_else(|| QueueError::UnknownRepo(self.default_repo.clone()))?;
                    let commit = repo
                        .get(&self.default_branch)
                        .ok_or_else(|| QueueError::UnknownCommit(self.default_branch.clone()))?;
                    if let Some(rule) = self.blacklist.match_rule(builder, &commit.hash) {
                        debug!(
                            "Skipping blacklisted builder/commit: {} @ {} due to rule {:?}",
                            builder, commit.hash, rule
                        );
                        continue;
                    }
                    let candidate = BuildCandidate {
                        commit,
                        builder: builder.clone(),
                        repo: self.default_repo.clone(),
                        score: f64::MAX,
                    };
                    queue.insert(builder.clone(), vec![candidate.clone()]);
                    Some(candidate)
                }
            };
            if let Some(candidate) = head {
                if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                    best = Some(candidate);
                }
            }
        }
        let best = best.ok_or(QueueError::EmptyQueue)?;
        if let Some(list) = queue.get_mut(&best.builder) {
            if !list.is_empty() {
                list.remove(0);
            }
        }
        Ok(best)
    }

    /// The top `n` candidates across all builders, descending by score with
    /// ties broken by ascending commit hash.
    pub async fn top_n(&self, n: usize) -> Vec<BuildCandidate> {
        let queue = self.queue.read().await;
        let mut top: Vec<BuildCandidate> = Vec::with_capacity(n);
        for candidates in queue.values() {
            for candidate in candidates {
                if top.len() < n {
                    top.push(candidate.clone());
                    top.sort_by(BuildCandidate::cmp_descending);
                } else if n > 0 && candidate.cmp_descending(&top[n - 1]) == Ordering::Less {
                    top[n - 1] = candidate.clone();
                    top.sort_by(BuildCandidate::cmp_descending);
                }
            }
        }
        top
    }

    /// Hashes of the analysis-window commits from the most recent repo walk,
    /// timestamp-ascending.
    pub async fn recent_commits(&self) -> Vec<String> {
        self.recent_commits.read().await.clone()
    }
}
