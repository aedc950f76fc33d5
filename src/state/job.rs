use crate::crawler::RunSummary;
use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Outcome of the most recent execution of a job
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobReport {
    Completed(RunSummary),
    Failed {
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl JobReport {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A recurring crawl for one source
///
/// `running` and the `Queued` status are never set together, and
/// `next_run_at` only moves forward when a run begins.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlJob {
    pub source_name: String,
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub enabled: bool,
    pub running: bool,
    pub status: JobStatus,
    pub last_report: Option<JobReport>,
    pub max_urls: usize,
    pub concurrency: Option<usize>,
}

impl CrawlJob {
    /// Creates a job that is due immediately
    pub fn new(source_name: impl Into<String>, interval: Duration, max_urls: usize) -> Self {
        Self {
            source_name: source_name.into(),
            interval,
            last_run_at: None,
            next_run_at: Utc::now(),
            enabled: true,
            running: false,
            status: JobStatus::Idle,
            last_report: None,
            max_urls,
            concurrency: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_next_run_at(mut self, next_run_at: DateTime<Utc>) -> Self {
        self.next_run_at = next_run_at;
        self
    }

    /// Returns true if the checker should enqueue this job at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && !self.is_pending() && now >= self.next_run_at
    }

    /// Returns true if the job is waiting in the queue or executing
    pub fn is_pending(&self) -> bool {
        self.running || self.status.is_active()
    }

    pub fn mark_queued(&mut self) {
        self.status = JobStatus::Queued;
    }

    /// Puts a job that never left the queue back to idle
    pub fn unqueue(&mut self) {
        if self.status == JobStatus::Queued {
            self.status = JobStatus::Idle;
        }
    }

    /// Enters the running state and schedules the next run
    pub fn begin_run(&mut self, now: DateTime<Utc>) {
        self.running = true;
        self.status = JobStatus::Running;
        self.last_run_at = Some(now);
        self.next_run_at = next_due(now, self.interval);
    }

    /// Leaves the running state with the run's outcome
    pub fn finish(&mut self, report: JobReport) {
        self.running = false;
        self.status = if report.is_failure() {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        self.last_report = Some(report);
    }
}

fn next_due(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}
