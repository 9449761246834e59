//! Builder/commit deny rules.
//!
//! A rule names one or more builder patterns and, optionally, an explicit
//! set of commits. A rule with no commits matches its builders in any
//! context; matching with an empty commit hash consults only such
//! builder-wide rules.

use regex::Regex;
use serde::Deserialize;
use std::path::Path;

use crate::error::{QueueError, Result};

/// Matches builders and commits against deny rules.
pub trait Blacklist: Send + Sync {
    /// Returns the name of the first matching rule, if any. An empty
    /// `commit` means "match the builder in any context".
    fn match_rule(&self, builder: &str, commit: &str) -> Option<String>;
}

/// One deny rule as written in the rule file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub builder_patterns: Vec<String>,
    #[serde(default)]
    pub commits: Vec<String>,
}

#[derive(Debug)]
struct Rule {
    name: String,
    builder_patterns: Vec<Regex>,
    commits: Vec<String>,
}

/// An in-memory set of compiled deny rules.
#[derive(Default, Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// A set that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile a list of rule specs. Builder patterns are anchored regexes.
    pub fn new(specs: Vec<RuleSpec>) -> Result<Self> {
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut patterns = Vec::with_capacity(spec.builder_patterns.len());
            for pattern in &spec.builder_patterns {
                let anchored = format!("^(?:{pattern})$");
                let re = Regex::new(&anchored).map_err(|e| QueueError::Blacklist {
                    name: spec.name.clone(),
                    message: e.to_string(),
                })?;
                patterns.push(re);
            }
            rules.push(Rule {
                name: spec.name,
                builder_patterns: patterns,
                commits: spec.commits,
            });
        }
        Ok(Self { rules })
    }

    /// Load rules from a JSON file holding a list of rule specs.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let specs: Vec<RuleSpec> = serde_json::from_str(&content)?;
        Self::new(specs)
    }
}

impl Blacklist for RuleSet {
    fn match_rule(&self, builder: &str, commit: &str) -> Option<String> {
        for rule in &self.rules {
            if !rule.builder_patterns.iter().any(|p| p.is_match(builder)) {
                continue;
            }
            if rule.commits.is_empty() {
                return Some(rule.name.clone());
            }
            if !commit.is_empty() && rule.commits.iter().any(|c| c == commit) {
                return Some(rule.name.clone());
            }
        }
        None
    }
}
