//! In-memory commit graph.
//!
//! Backs tests and the fixture-driven inspection binary. The graph is built
//! once from a snapshot (branch heads plus commit records); branch membership
//! is derived by reachability from each head.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Commit, RepoGraph};
use crate::error::{QueueError, Result};

/// One commit as it appears in a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// A serializable picture of a repository: branch heads and all commits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSnapshot {
    /// Branch name to head hash.
    pub branches: BTreeMap<String, String>,
    pub commits: Vec<CommitRecord>,
}

/// A commit graph held entirely in memory.
#[derive(Debug)]
pub struct InMemoryRepo {
    commits: HashMap<String, Arc<Commit>>,
    branches: BTreeMap<String, String>,
}

impl InMemoryRepo {
    /// Build the graph from a snapshot, resolving branch membership for every
    /// commit. Fails if a parent edge or branch head references an unknown
    /// hash.
    pub fn new(snapshot: RepoSnapshot) -> Result<Self> {
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for record in &snapshot.commits {
            parents.insert(record.hash.clone(), record.parents.clone());
        }
        for record in &snapshot.commits {
            for parent in &record.parents {
                if !parents.contains_key(parent) {
                    return Err(QueueError::UnknownCommit(parent.clone()));
                }
            }
        }

        // Mark each commit with the branches whose heads reach it.
        let mut membership: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (branch, head) in &snapshot.branches {
            if !parents.contains_key(head) {
                return Err(QueueError::UnknownCommit(head.clone()));
            }
            let mut stack = vec![head.clone()];
            let mut seen: HashSet<String> = HashSet::new();
            while let Some(hash) = stack.pop() {
                if !seen.insert(hash.clone()) {
                    continue;
                }
                membership.entry(hash.clone()).or_default().insert(branch.clone());
                for parent in &parents[&hash] {
                    stack.push(parent.clone());
                }
            }
        }

        let mut commits = HashMap::new();
        for record in snapshot.commits {
            let branches = membership.remove(&record.hash).unwrap_or_default();
            commits.insert(
                record.hash.clone(),
                Arc::new(Commit {
                    hash: record.hash,
                    timestamp: record.timestamp,
                    branches,
                    parents: record.parents,
                }),
            );
        }
        Ok(Self {
            commits,
            branches: snapshot.branches,
        })
    }
}

#[async_trait]
impl RepoGraph for InMemoryRepo {
    async fn update(&self) -> Result<()> {
        // Nothing to sync; the snapshot is the mirror.
        Ok(())
    }

    fn get(&self, reference: &str) -> Option<Arc<Commit>> {
        let hash = self.branches.get(reference).map(String::as_str).unwrap_or(reference);
        self.commits.get(hash).cloned()
    }

    fn recurse_all_branches(&self, visit: &mut dyn FnMut(&Arc<Commit>) -> Result<bool>) -> Result<()> {
        let mut visited: HashSet<&str> = HashSet::new();
        for head in self.branches.values() {
            let mut stack = vec![head.as_str()];
            while let Some(hash) = stack.pop() {
                if !visited.insert(hash) {
                    continue;
                }
                let commit = self
                    .commits
                    .get(hash)
                    .ok_or_else(|| QueueError::UnknownCommit(hash.to_string()))?;
                if !visit(commit)? {
                    continue;
                }
                for parent in commit.parents.iter().rev() {
                    if !visited.contains(parent.as_str()) {
                        stack.push(parent);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, 1, hour, 0, 0).unwrap()
    }

    fn linear_snapshot() -> RepoSnapshot {
        RepoSnapshot {
            branches: BTreeMap::from([("master".to_string(), "c3".to_string())]),
            commits: vec![
                CommitRecord {
                    hash: "c1".to_string(),
                    timestamp: ts(1),
                    parents: vec![],
                },
                CommitRecord {
                    hash: "c2".to_string(),
                    timestamp: ts(2),
                    parents: vec!["c1".to_string()],
                },
                CommitRecord {
                    hash: "c3".to_string(),
                    timestamp: ts(3),
                    parents: vec!["c2".to_string()],
                },
            ],
        }
    }

    #[test]
    fn test_get_by_hash_and_branch() {
        let repo = InMemoryRepo::new(linear_snapshot()).unwrap();
        assert_eq!(repo.get("c2").unwrap().hash, "c2");
        assert_eq!(repo.get("master").unwrap().hash, "c3");
        assert!(repo.get("no-such-ref").is_none());
    }

    #[test]
    fn test_branch_membership() {
        let mut snapshot = linear_snapshot();
        snapshot.branches.insert("dev".to_string(), "c2".to_string());
        let repo = InMemoryRepo::new(snapshot).unwrap();
        let c1 = repo.get("c1").unwrap();
        assert!(c1.branches.contains("master"));
        assert!(c1.branches.contains("dev"));
        let c3 = repo.get("c3").unwrap();
        assert!(!c3.branches.contains("dev"));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut snapshot = linear_snapshot();
        snapshot.commits[0].parents = vec!["ghost".to_string()];
        assert!(matches!(InMemoryRepo::new(snapshot), Err(QueueError::UnknownCommit(_))));
    }

    #[test]
    fn test_recurse_visits_each_commit_once() {
        let mut snapshot = linear_snapshot();
        snapshot.branches.insert("dev".to_string(), "c2".to_string());
        let repo = InMemoryRepo::new(snapshot).unwrap();
        let mut seen = Vec::new();
        repo.recurse_all_branches(&mut |c| {
            seen.push(c.hash.clone());
            Ok(true)
        })
        .unwrap();
        seen.sort();
        assert_eq!(seen, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_recurse_prunes_parents() {
        let repo = InMemoryRepo::new(linear_snapshot()).unwrap();
        let mut seen = Vec::new();
        repo.recurse_all_branches(&mut |c| {
            seen.push(c.hash.clone());
            Ok(c.hash != "c2")
        })
        .unwrap();
        assert_eq!(seen, vec!["c3", "c2"]);
    }
}
