//! Lifecycle states of a scheduled crawl job

use serde::Serialize;
use std::fmt;

/// Represents where a job is in its run cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next due time
    #[default]
    Idle,

    /// Enqueued for the worker but not yet started
    Queued,

    /// The worker is executing it
    Running,

    /// Last run finished without a job-level error
    Completed,

    /// Last run aborted with a job-level error
    Failed,
}

impl JobStatus {
    /// Returns true if the job is waiting on or held by the worker
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Returns true if this status records the outcome of a finished run
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase name used in job tables and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
