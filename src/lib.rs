//! buildq - a value-of-information build scheduler core
//!
//! For every known builder, buildq decides which source revision that
//! builder should build next: covering new commits first, then greedily
//! bisecting blamelists until the marginal value of another build falls
//! below a threshold. The queue is rebuilt from ground truth on every
//! refresh and served to the dispatcher through `pop` and `top_n`.

pub mod blacklist;
pub mod config;
pub mod error;
pub mod history;
pub mod queue;
pub mod repograph;
pub mod score;

pub use error::{QueueError, Result};
pub use queue::{BuildCandidate, BuildQueue};
