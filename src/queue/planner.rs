//! Greedy candidate planner.
//!
//! For a single builder, repeatedly answers "which hypothetical next build
//! adds the most value?" and commits that build to the builder's index,
//! until no build clears the score threshold. Each round simulates a build
//! at every recent commit, asks the blamelist walk what it would cover and
//! which existing build it would steal from, and totals the score change
//! over the affected commits.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::cache::BuilderCache;
use super::candidate::BuildCandidate;
use crate::blacklist::Blacklist;
use crate::error::{QueueError, Result};
use crate::history::{find_commits_for_build, Build, BuildStore};
use crate::repograph::Commit;
use crate::score::{score_build, stable_sum};

pub(crate) struct Planner<'a> {
    pub blacklist: &'a dyn Blacklist,
    pub store: &'a dyn BuildStore,
    pub time_lambda: f64,
    pub score_threshold: f64,
    pub bisect_commit_limit: usize,
}

/// One round's winning hypothetical build.
struct RoundWinner {
    score: f64,
    build: Build,
    stole_from: Option<Build>,
}

impl Planner<'_> {
    /// Find all candidates for the given builder, in order. The cache is
    /// mutated: every emitted candidate's build (and mutated victim copy) is
    /// committed so the next round sees the simulated state.
    pub async fn candidates_for_builder(
        &self,
        cache: &mut BuilderCache,
        recent_commits: &[Arc<Commit>],
        now: DateTime<Utc>,
    ) -> Result<Vec<BuildCandidate>> {
        let mut candidates = Vec::new();
        loop {
            let Some(winner) = self.best_candidate(cache, recent_commits, now).await? else {
                break;
            };
            if winner.score < self.score_threshold {
                break;
            }
            let commit = cache
                .repo
                .get(&winner.build.got_revision)
                .ok_or_else(|| QueueError::UnknownCommit(winner.build.got_revision.clone()))?;
            let builder = winner.build.builder.clone();
            let repo = winner.build.repository.clone();
            // "Insert" the new build, and the reduced victim with it.
            cache.put_build(winner.build);
            if let Some(victim) = winner.stole_from {
                cache.put_build(victim);
            }
            candidates.push(BuildCandidate {
                commit,
                builder,
                repo,
                score: winner.score,
            });
        }
        Ok(candidates)
    }

    /// Find the best hypothetical next build for the builder, scanning the
    /// recent commits newest-first.
    async fn best_candidate(
        &self,
        cache: &mut BuilderCache,
        recent_commits: &[Arc<Commit>],
        now: DateTime<Utc>,
    ) -> Result<Option<RoundWinner>> {
        // Current score for every recent commit. Commits outside the window
        // that a simulated blamelist touches are memoized here on demand.
        let mut current_scores: HashMap<String, f64> = HashMap::new();
        for commit in recent_commits {
            let build = cache.build_for_commit(&commit.hash);
            current_scores.insert(commit.hash.clone(), score_build(commit, build, now, self.time_lambda));
        }

        let mut score_increase: BTreeMap<String, f64> = BTreeMap::new();
        let mut new_builds: HashMap<String, Build> = HashMap::new();
        let mut stole_from: HashMap<String, Build> = HashMap::new();
        // Branches on which the scan has already passed an uncovered commit.
        let mut unbuilt_branches: HashSet<String> = HashSet::new();
        // Branches cut off below an over-large blamelist.
        let mut cutoff_branches: HashSet<String> = HashSet::new();

        for commit in recent_commits.iter().rev() {
            if let Some(rule) = self.blacklist.match_rule(&cache.builder, &commit.hash) {
                debug!(
                    "Skipping blacklisted builder/commit: {} @ {} due to rule {:?}",
                    cache.builder, commit.hash, rule
                );
                continue;
            }
            if commit.branches.iter().any(|b| cutoff_branches.contains(b)) {
                continue;
            }
            let covering = cache.build_for_commit(&commit.hash).cloned();
            match &covering {
                None => {
                    // Don't go past the first commit which ever ran on this
                    // bot: a second uncovered commit on a branch means we
                    // have reached the beginning of its history.
                    if commit.branches.iter().any(|b| unbuilt_branches.contains(b)) {
                        warn!(
                            "Skipping {} on {}; reached the beginning of time for this bot.",
                            commit.hash, cache.builder
                        );
                        break;
                    }
                    for branch in &commit.branches {
                        unbuilt_branches.insert(branch.clone());
                    }
                }
                Some(b) => {
                    // Don't bisect giant blamelists; ancestors on the same
                    // branch are dominated by the same build.
                    if b.commits.len() > self.bisect_commit_limit {
                        warn!(
                            "Skipping {} on {}; previous build has too many commits (#{})",
                            commit.hash, cache.builder, b.number
                        );
                        score_increase.insert(commit.hash.clone(), 0.0);
                        for branch in &commit.branches {
                            cutoff_branches.insert(branch.clone());
                        }
                        continue;
                    }
                }
            }

            // Pretend to run a build at this commit.
            let mut new_build = Build {
                master: cache.master.clone(),
                builder: cache.builder.clone(),
                number: cache.next_build_number(),
                repository: cache.repo_name.clone(),
                got_revision: commit.hash.clone(),
                commits: Vec::new(),
            };
            let repo = cache.repo.clone();
            let outcome = find_commits_for_build(&*cache, &new_build, repo.as_ref())?;
            new_build.commits = outcome.commits;

            // Re-score all commits in the new build.
            let mut new_scores: HashMap<String, f64> = HashMap::new();
            for hash in new_build.commits.clone() {
                let covered = repo.get(&hash).ok_or_else(|| QueueError::UnknownCommit(hash.clone()))?;
                if !current_scores.contains_key(&hash) {
                    let b = cache.build_for_commit(&hash).cloned();
                    current_scores.insert(hash.clone(), score_build(&covered, b.as_ref(), now, self.time_lambda));
                }
                new_scores.insert(hash.clone(), score_build(&covered, Some(&new_build), now, self.time_lambda));
            }

            // If the new build steals commits, re-score what remains of the
            // victim's blamelist on a copy; the indexed build is only
            // replaced if this candidate wins the round.
            if let Some(victim_number) = outcome.steal_from {
                let mut victim = match cache.build_by_number(victim_number) {
                    Some(b) => b.clone(),
                    None => {
                        // Not cached; fall back on the store.
                        let fetched = self
                            .store
                            .build_by_number(&cache.master, &cache.builder, victim_number)
                            .await?
                            .ok_or_else(|| QueueError::Storage(format!("no build numbered {victim_number}")))?;
                        cache.put_build(fetched.clone());
                        fetched
                    }
                };
                victim.commits.retain(|c| !outcome.stolen.contains(c));
                for hash in victim.commits.clone() {
                    let covered = repo.get(&hash).ok_or_else(|| QueueError::UnknownCommit(hash.clone()))?;
                    if !current_scores.contains_key(&hash) {
                        let b = cache.build_for_commit(&hash).cloned();
                        current_scores.insert(hash.clone(), score_build(&covered, b.as_ref(), now, self.time_lambda));
                    }
                    new_scores.insert(hash.clone(), score_build(&covered, Some(&victim), now, self.time_lambda));
                }
                stole_from.insert(commit.hash.clone(), victim);
            }

            // Sum the old and new scores over the affected commits.
            let mut old_totals = Vec::with_capacity(new_scores.len());
            let mut new_totals = Vec::with_capacity(new_scores.len());
            for (hash, score) in &new_scores {
                old_totals.push(current_scores[hash]);
                new_totals.push(*score);
            }
            score_increase.insert(commit.hash.clone(), stable_sum(&new_totals) - stable_sum(&old_totals));
            new_builds.insert(commit.hash.clone(), new_build);
        }

        // Highest increase wins; equal scores resolve to the larger hash.
        let mut best: Option<(&str, f64)> = None;
        for (hash, increase) in &score_increase {
            let better = match best {
                None => true,
                Some((best_hash, best_score)) => {
                    *increase > best_score || (*increase == best_score && hash.as_str() > best_hash)
                }
            };
            if better {
                best = Some((hash, *increase));
            }
        }
        let Some((hash, score)) = best else {
            return Ok(None);
        };
        let hash = hash.to_string();
        // A cutoff entry carries no build; it can only win when the
        // threshold admits zero-value candidates, and ends the builder.
        let Some(build) = new_builds.remove(&hash) else {
            return Ok(None);
        };
        Ok(Some(RoundWinner {
            score,
            build,
            stole_from: stole_from.remove(&hash),
        }))
    }
}
