//! State module for tracking scheduling and fetch progress
//!
//! # Components
//!
//! - `JobStatus`: lifecycle of a scheduled job (idle, queued, running, completed, failed)
//! - `CrawlJob`: per-source cadence and last outcome, owned by the scheduler
//! - `HostState`: per-host pacing and rate-limit backoff used by the HTTP fetch engine

mod host_state;
mod job;
mod job_status;

pub use host_state::HostState;
pub use job::{CrawlJob, JobReport};
pub use job_status::JobStatus;
