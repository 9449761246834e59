//! Commit/build scoring.
//!
//! Scoring for an individual commit/builder pair is as follows:
//!
//! - `-1.0` if no build has ever included this commit on this builder.
//! - `1.0` if this builder has built AT this commit.
//! - `1.0 / N` if a build on this builder has included this commit, where N
//!   is the number of commits included in the build.
//!
//! Scores additionally carry a time factor, an exponential decay controlled
//! by the decay-at-24-hours parameter, which prioritizes backfilling of more
//! recent commits. Sums of scores go through [`stable_sum`] so that two
//! evaluations that differ only in map iteration order produce identical
//! totals.

use chrono::{DateTime, Utc};

use crate::history::Build;
use crate::repograph::Commit;

/// Convert a decay-at-24-hours factor into the exponential rate `lambda`.
///
/// A decay of `1.0` yields `lambda = 0` (no decay); a decay of `0.5` halves
/// a score every 24 hours.
pub fn lambda(decay_at_24h: f64) -> f64 {
    -decay_at_24h.ln() / 24.0
}

/// The time penalty factor: an exponential decay over the commit's age.
pub fn time_factor(now: DateTime<Utc>, t: DateTime<Utc>, lambda: f64) -> f64 {
    let hours = (now - t).num_milliseconds() as f64 / 3_600_000.0;
    (-lambda * hours).exp()
}

/// Current score for a commit/builder pair, given the build observed to
/// cover the commit (if any).
pub fn score_build(commit: &Commit, build: Option<&Build>, now: DateTime<Utc>, lambda: f64) -> f64 {
    let mut s = -1.0;
    if let Some(b) = build {
        if b.got_revision == commit.hash {
            s = 1.0;
        } else if b.commits.iter().any(|c| *c == commit.hash) {
            s = 1.0 / b.commits.len() as f64;
        }
    }
    s * time_factor(now, commit.timestamp, lambda)
}

/// Sum floats deterministically: addends are ordered by ascending magnitude
/// (ties by value) before accumulation, so the result does not depend on the
/// caller's iteration order.
pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.abs().total_cmp(&b.abs()).then(a.total_cmp(b)));
    sorted.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    const EPSILON: f64 = 1e-12;

    fn commit_at(hash: &str, timestamp: DateTime<Utc>) -> Commit {
        Commit {
            hash: hash.to_string(),
            timestamp,
            branches: BTreeSet::new(),
            parents: Vec::new(),
        }
    }

    fn build_covering(got_revision: &str, commits: &[&str]) -> Build {
        Build {
            master: "fake".to_string(),
            builder: "Test-Builder".to_string(),
            number: 0,
            repository: "repo".to_string(),
            got_revision: got_revision.to_string(),
            commits: commits.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_lambda() {
        assert_eq!(lambda(1.0), 0.0);
        assert_eq!(lambda(0.5), 0.028881132523331052);
        assert!(lambda(0.0).is_infinite());
    }

    #[test]
    fn test_score_without_decay() {
        let t0 = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let now = t0 + chrono::Duration::hours(1);
        let build = build_covering("aa", &["aa", "bb", "cc"]);
        let l = lambda(1.0);

        // Built at the commit.
        assert_eq!(score_build(&commit_at("aa", t0), Some(&build), now, l), 1.0);
        // Included in the blamelist.
        assert_eq!(score_build(&commit_at("bb", t0), Some(&build), now, l), 1.0 / 3.0);
        assert_eq!(score_build(&commit_at("cc", t0), Some(&build), now, l), 1.0 / 3.0);
        // Not included.
        assert_eq!(score_build(&commit_at("dd", t0), Some(&build), now, l), -1.0);
        // No build at all.
        assert_eq!(score_build(&commit_at("aa", t0), None, now, l), -1.0);
    }

    #[test]
    fn test_decay_halves_at_24h() {
        let t0 = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let build = build_covering("aa", &["aa"]);
        let l = lambda(0.5);

        let day = score_build(&commit_at("aa", t0), Some(&build), t0 + chrono::Duration::hours(24), l);
        assert!((day - 0.5).abs() < EPSILON, "got {day}");

        let two_days = score_build(&commit_at("aa", t0), Some(&build), t0 + chrono::Duration::hours(48), l);
        assert!((two_days - 0.25).abs() < EPSILON, "got {two_days}");

        let uncovered = score_build(&commit_at("bb", t0), None, t0 + chrono::Duration::hours(24), l);
        assert!((uncovered + 0.5).abs() < EPSILON, "got {uncovered}");
    }

    #[test]
    fn test_time_factor_is_one_at_t() {
        let t0 = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(time_factor(t0, t0, lambda(0.5)), 1.0);
    }

    #[test]
    fn test_stable_sum_order_independent() {
        let a = [0.1, -0.25, 1.0, 0.125, -1.0 / 3.0, 0.5];
        let mut b = a;
        b.reverse();
        assert_eq!(stable_sum(&a), stable_sum(&b));
    }

    #[test]
    fn test_stable_sum_exact_on_dyadic_fractions() {
        assert_eq!(stable_sum(&[1.0, 0.5, 0.25, 0.125]), 1.875);
        assert_eq!(stable_sum(&[]), 0.0);
    }
}
