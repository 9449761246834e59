//! Error types for buildq
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in buildq
#[derive(Debug, Error)]
pub enum QueueError {
    /// Sentinel returned by `pop` when no candidate is available for any of
    /// the requested builders. Callers loop on it; it is not a failure.
    #[error("Queue is empty.")]
    EmptyQueue,

    /// Invalid time-decay parameter (rejected at construction)
    #[error("Time decay must satisfy 0 < d <= 1, got {0}")]
    InvalidDecay(f64),

    /// A repository name did not resolve in the configured repo map
    #[error("Unknown repo: {0}")]
    UnknownRepo(String),

    /// A commit hash or ref did not resolve in the repo graph
    #[error("Unknown commit: {0}")]
    UnknownCommit(String),

    /// Repo sync or commit enumeration failed
    #[error("Failed to update the repo: {0}")]
    RepoUpdate(String),

    /// Candidate planning failed for a single builder
    #[error("Failed to get build candidates for {builder}: {message}")]
    Planner { builder: String, message: String },

    /// One or more repos failed during a refresh; nothing was swapped
    #[error("Failed to update build queue:\n{0}")]
    Update(String),

    /// Build-history store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A blacklist rule failed to parse or compile
    #[error("Invalid blacklist rule {name}: {message}")]
    Blacklist { name: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for buildq operations
pub type Result<T> = std::result::Result<T, QueueError>;
