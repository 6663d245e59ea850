//! Trigger domain types

use serde::{Deserialize, Serialize};

use super::image::CommitSha;

/// A push event that may start a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Branch the push landed on
    pub branch: String,
    /// Commit at the head of the push
    pub commit: CommitSha,
}

impl Trigger {
    pub fn new(branch: impl Into<String>, commit: CommitSha) -> Self {
        Self {
            branch: branch.into(),
            commit,
        }
    }

    /// Whether this push targets the tracked branch
    ///
    /// Accepts both the short name and the full `refs/heads/` form.
    pub fn is_tracked(&self, tracked_branch: &str) -> bool {
        let branch = self
            .branch
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.branch);
        branch == tracked_branch
    }
}
