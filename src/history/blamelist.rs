//! Blamelist computation.
//!
//! Determines which commits a new build is credited with first covering,
//! tracing repo history backwards from the build's checked-out revision. The
//! same walk powers both real ingestion and the planner's hypothetical
//! builds, looking up existing coverage through [`CoverageLookup`].

use crate::error::{QueueError, Result};
use crate::history::Build;
use crate::repograph::RepoGraph;

/// Coverage state the walk consults: which build (if any) currently owns a
/// commit, and point access by build number.
pub trait CoverageLookup {
    fn build_for_commit(&self, hash: &str) -> Option<&Build>;
    fn build_by_number(&self, number: u64) -> Option<&Build>;
}

/// Result of a blamelist computation.
#[derive(Debug, Clone, PartialEq)]
pub struct BlamelistOutcome {
    /// Commits the new build covers, in discovery order.
    pub commits: Vec<String>,
    /// Build number whose blamelist shrinks, when the new build lands on
    /// already-covered history.
    pub steal_from: Option<u64>,
    /// Commits moving from the victim to the new build.
    pub stolen: Vec<String>,
}

/// Compute the blamelist for `build`, whose `got_revision` has been chosen
/// but whose `commits` are not yet known.
///
/// Walking parents depth-first from `got_revision`:
/// - an uncovered commit joins the blamelist and the walk continues;
/// - a commit owned by another build stops that path, unless it is being
///   stolen;
/// - if `got_revision` itself is owned by another build, that build becomes
///   the steal victim and every commit of its blamelist encountered on the
///   walk moves to the new build;
/// - a victim that ran at the very same revision short-circuits: its entire
///   blamelist transfers unchanged.
///
/// Deterministic for a given lookup state; never mutates the lookup.
pub fn find_commits_for_build(
    lookup: &dyn CoverageLookup,
    build: &Build,
    repo: &dyn RepoGraph,
) -> Result<BlamelistOutcome> {
    let mut commits: Vec<String> = Vec::new();
    let mut included: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut steal_from: Option<u64> = None;
    let mut stolen: Vec<String> = Vec::new();

    if build.got_revision.is_empty() {
        return Ok(BlamelistOutcome {
            commits,
            steal_from,
            stolen,
        });
    }

    let mut stack = vec![build.got_revision.clone()];
    while let Some(hash) = stack.pop() {
        if included.contains(&hash) {
            continue;
        }
        if let Some(owner) = lookup.build_for_commit(&hash) {
            if owner.number != build.number {
                if hash == build.got_revision {
                    steal_from = Some(owner.number);
                    let victim = lookup
                        .build_by_number(owner.number)
                        .ok_or_else(|| QueueError::Storage(format!("no build numbered {}", owner.number)))?;
                    if victim.got_revision == build.got_revision && victim.number < build.number {
                        // Same revision: take the whole blamelist as-is.
                        return Ok(BlamelistOutcome {
                            commits: victim.commits.clone(),
                            steal_from,
                            stolen: victim.commits.clone(),
                        });
                    }
                }
                if steal_from == Some(owner.number) {
                    stolen.push(hash.clone());
                } else {
                    // Covered by a build we are not stealing from; this path
                    // of history is accounted for.
                    continue;
                }
            }
        }
        included.insert(hash.clone());
        commits.push(hash.clone());
        let commit = repo.get(&hash).ok_or_else(|| QueueError::UnknownCommit(hash.clone()))?;
        for parent in commit.parents.iter().rev() {
            if !included.contains(parent) {
                stack.push(parent.clone());
            }
        }
    }

    Ok(BlamelistOutcome {
        commits,
        steal_from,
        stolen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repograph::{CommitRecord, InMemoryRepo, RepoSnapshot};
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, HashMap};

    struct MapLookup {
        builds: Vec<Build>,
        by_commit: HashMap<String, usize>,
    }

    impl MapLookup {
        fn new(builds: Vec<Build>) -> Self {
            let mut by_commit = HashMap::new();
            for (i, b) in builds.iter().enumerate() {
                for c in &b.commits {
                    by_commit.insert(c.clone(), i);
                }
            }
            Self { builds, by_commit }
        }
    }

    impl CoverageLookup for MapLookup {
        fn build_for_commit(&self, hash: &str) -> Option<&Build> {
            self.by_commit.get(hash).map(|i| &self.builds[*i])
        }

        fn build_by_number(&self, number: u64) -> Option<&Build> {
            self.builds.iter().find(|b| b.number == number)
        }
    }

    fn build(number: u64, got_revision: &str, commits: &[&str]) -> Build {
        Build {
            master: "fake".to_string(),
            builder: "Test-Builder".to_string(),
            number,
            repository: "repo".to_string(),
            got_revision: got_revision.to_string(),
            commits: commits.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// d3 -> d2 -> d1, plus m2 -> m1 merged at d3 (parents d2, m2).
    fn repo() -> InMemoryRepo {
        let t = |h: u32| Utc.with_ymd_and_hms(2016, 1, 1, h, 0, 0).unwrap();
        InMemoryRepo::new(RepoSnapshot {
            branches: BTreeMap::from([("master".to_string(), "d3".to_string())]),
            commits: vec![
                CommitRecord {
                    hash: "d1".to_string(),
                    timestamp: t(1),
                    parents: vec![],
                },
                CommitRecord {
                    hash: "m1".to_string(),
                    timestamp: t(2),
                    parents: vec!["d1".to_string()],
                },
                CommitRecord {
                    hash: "m2".to_string(),
                    timestamp: t(3),
                    parents: vec!["m1".to_string()],
                },
                CommitRecord {
                    hash: "d2".to_string(),
                    timestamp: t(4),
                    parents: vec!["d1".to_string()],
                },
                CommitRecord {
                    hash: "d3".to_string(),
                    timestamp: t(5),
                    parents: vec!["d2".to_string(), "m2".to_string()],
                },
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_first_build_covers_all_history() {
        let repo = repo();
        let lookup = MapLookup::new(vec![]);
        let outcome = find_commits_for_build(&lookup, &build(0, "d3", &[]), &repo).unwrap();
        assert_eq!(outcome.commits, vec!["d3", "d2", "d1", "m2", "m1"]);
        assert_eq!(outcome.steal_from, None);
        assert!(outcome.stolen.is_empty());
    }

    #[test]
    fn test_walk_stops_at_covered_history() {
        let repo = repo();
        let lookup = MapLookup::new(vec![build(0, "d1", &["d1"])]);
        let outcome = find_commits_for_build(&lookup, &build(1, "d3", &[]), &repo).unwrap();
        assert_eq!(outcome.commits, vec!["d3", "d2", "m2", "m1"]);
        assert_eq!(outcome.steal_from, None);
    }

    #[test]
    fn test_steal_from_covering_build() {
        let repo = repo();
        let lookup = MapLookup::new(vec![build(0, "d3", &["d3", "d2", "d1", "m2", "m1"])]);
        let outcome = find_commits_for_build(&lookup, &build(1, "d2", &[]), &repo).unwrap();
        assert_eq!(outcome.commits, vec!["d2", "d1"]);
        assert_eq!(outcome.steal_from, Some(0));
        assert_eq!(outcome.stolen, vec!["d2", "d1"]);
    }

    #[test]
    fn test_steal_shortcut_same_revision() {
        let repo = repo();
        let lookup = MapLookup::new(vec![build(0, "d3", &["d3", "d2", "d1", "m2", "m1"])]);
        let outcome = find_commits_for_build(&lookup, &build(1, "d3", &[]), &repo).unwrap();
        assert_eq!(outcome.commits, vec!["d3", "d2", "d1", "m2", "m1"]);
        assert_eq!(outcome.steal_from, Some(0));
        assert_eq!(outcome.stolen, outcome.commits);
    }

    #[test]
    fn test_steal_stops_at_other_builds() {
        let repo = repo();
        let lookup = MapLookup::new(vec![
            build(0, "d1", &["d1"]),
            build(1, "d3", &["d3", "d2", "m1", "m2"]),
        ]);
        let outcome = find_commits_for_build(&lookup, &build(2, "d2", &[]), &repo).unwrap();
        // d1 belongs to build 0, not the victim; the walk stops there.
        assert_eq!(outcome.commits, vec!["d2"]);
        assert_eq!(outcome.steal_from, Some(1));
        assert_eq!(outcome.stolen, vec!["d2"]);
    }

    #[test]
    fn test_empty_revision_yields_empty_blamelist() {
        let repo = repo();
        let lookup = MapLookup::new(vec![]);
        let outcome = find_commits_for_build(&lookup, &build(0, "", &[]), &repo).unwrap();
        assert!(outcome.commits.is_empty());
        assert_eq!(outcome.steal_from, None);
    }

    #[test]
    fn test_unknown_revision_is_an_error() {
        let repo = repo();
        let lookup = MapLookup::new(vec![]);
        let err = find_commits_for_build(&lookup, &build(0, "ghost", &[]), &repo).unwrap_err();
        assert!(matches!(err, QueueError::UnknownCommit(_)));
    }
}
