//! Job scheduler
//!
//! Two background tasks share the job table:
//! - the checker wakes every `check_interval` and queues every due job
//! - the worker takes queued jobs one at a time and runs them
//!
//! Jobs execute strictly one after another. Each run happens inside its own
//! task so that a panicking run is recorded as a failure instead of taking
//! the worker down.

use crate::crawler::result::RunSummary;
use crate::sources::SourceRegistry;
use crate::state::{CrawlJob, JobReport, JobStatus};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Executes one run of a job
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, job: &CrawlJob) -> Result<RunSummary>;
}

#[derive(Debug)]
enum QueueMessage {
    Run(String),
    Shutdown,
}

type SharedJobs = Arc<Mutex<BTreeMap<String, CrawlJob>>>;

struct RunningTasks {
    shutdown: watch::Sender<bool>,
    checker: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// Periodic job scheduler with a single worker
pub struct JobScheduler {
    runner: Arc<dyn JobRunner>,
    check_interval: Duration,
    jobs: SharedJobs,
    queue: Mutex<Option<mpsc::UnboundedSender<QueueMessage>>>,
    tasks: Mutex<Option<RunningTasks>>,
}

impl JobScheduler {
    pub fn new(runner: Arc<dyn JobRunner>, check_interval: Duration) -> Self {
        Self {
            runner,
            check_interval: check_interval.max(Duration::from_millis(10)),
            jobs: Arc::new(Mutex::new(BTreeMap::new())),
            queue: Mutex::new(None),
            tasks: Mutex::new(None),
        }
    }

    /// Creates a scheduler with one job per enabled source, each due now
    pub fn from_registry(
        runner: Arc<dyn JobRunner>,
        check_interval: Duration,
        registry: &SourceRegistry,
    ) -> Self {
        let scheduler = Self::new(runner, check_interval);
        for source in registry.sources() {
            if source.enabled {
                scheduler.add_job(CrawlJob::new(
                    source.name.clone(),
                    source.interval,
                    source.max_urls,
                ));
            }
        }
        scheduler
    }

    /// Adds or replaces the job for `job.source_name`
    ///
    /// Returns false and leaves the table unchanged if a job of that name is
    /// queued or running.
    pub fn add_job(&self, job: CrawlJob) -> bool {
        let key = job.source_name.to_lowercase();
        let mut jobs = lock(&self.jobs);
        if jobs.get(&key).is_some_and(CrawlJob::is_pending) {
            return false;
        }
        debug!("Scheduled {} every {:?}", job.source_name, job.interval);
        jobs.insert(key, job);
        true
    }

    /// Removes a job; a run already in progress still completes
    pub fn remove_job(&self, source_name: &str) -> bool {
        lock(&self.jobs).remove(&source_name.to_lowercase()).is_some()
    }

    /// Queues a job immediately, regardless of when it is due
    ///
    /// Returns false if there is no such job or it is already queued or
    /// running. A job queued while the scheduler is stopped runs once it
    /// starts.
    pub fn run_now(&self, source_name: &str) -> bool {
        let key = source_name.to_lowercase();
        let mut jobs = lock(&self.jobs);
        let Some(job) = jobs.get_mut(&key) else {
            return false;
        };
        if job.is_pending() {
            return false;
        }

        job.mark_queued();
        if let Some(queue) = lock(&self.queue).as_ref() {
            if queue.send(QueueMessage::Run(key)).is_err() {
                job.unqueue();
                return false;
            }
        }
        info!("Queued {} on demand", job.source_name);
        true
    }

    pub fn get_job(&self, source_name: &str) -> Option<CrawlJob> {
        lock(&self.jobs).get(&source_name.to_lowercase()).cloned()
    }

    /// Snapshot of all jobs, ordered by name
    pub fn jobs(&self) -> Vec<CrawlJob> {
        lock(&self.jobs).values().cloned().collect()
    }

    /// Number of jobs waiting for the worker
    pub fn queue_len(&self) -> usize {
        lock(&self.jobs)
            .values()
            .filter(|job| job.status == JobStatus::Queued)
            .count()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.tasks).is_some()
    }

    /// Starts the checker and the worker
    ///
    /// Must be called from within a tokio runtime. Returns false if already
    /// started.
    pub fn start(&self) -> bool {
        let mut tasks = lock(&self.tasks);
        if tasks.is_some() {
            return false;
        }

        let (queue, receiver) = mpsc::unbounded_channel();
        {
            let jobs = lock(&self.jobs);
            for (key, job) in jobs.iter() {
                if job.status == JobStatus::Queued {
                    let _ = queue.send(QueueMessage::Run(key.clone()));
                }
            }
            *lock(&self.queue) = Some(queue.clone());
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let checker = tokio::spawn(run_checker(
            Arc::clone(&self.jobs),
            queue,
            self.check_interval,
            shutdown_rx.clone(),
        ));
        let worker = tokio::spawn(run_worker(
            Arc::clone(&self.jobs),
            Arc::clone(&self.runner),
            receiver,
            shutdown_rx,
        ));

        *tasks = Some(RunningTasks {
            shutdown,
            checker,
            worker,
        });
        info!("Scheduler started, checking every {:?}", self.check_interval);
        true
    }

    /// Stops both tasks
    ///
    /// Waits for a run in progress to finish. Jobs still waiting in the
    /// queue go back to idle. Returns false if the scheduler wasn't running.
    pub async fn stop(&self) -> bool {
        let Some(tasks) = lock(&self.tasks).take() else {
            return false;
        };

        let _ = tasks.shutdown.send(true);
        if let Some(queue) = lock(&self.queue).take() {
            let _ = queue.send(QueueMessage::Shutdown);
        }

        if let Err(e) = tasks.checker.await {
            warn!("Checker task ended abnormally: {}", e);
        }
        if let Err(e) = tasks.worker.await {
            warn!("Worker task ended abnormally: {}", e);
        }

        let mut jobs = lock(&self.jobs);
        for job in jobs.values_mut() {
            job.unqueue();
        }
        info!("Scheduler stopped");
        true
    }
}

async fn run_checker(
    jobs: SharedJobs,
    queue: mpsc::UnboundedSender<QueueMessage>,
    check_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let queued = enqueue_due(&jobs, &queue);
                if queued > 0 {
                    debug!("Checker queued {} jobs", queued);
                }
            }
        }
    }
}

fn enqueue_due(
    jobs: &Mutex<BTreeMap<String, CrawlJob>>,
    queue: &mpsc::UnboundedSender<QueueMessage>,
) -> usize {
    let now = Utc::now();
    let mut jobs = lock(jobs);
    let mut queued = 0;
    for (key, job) in jobs.iter_mut() {
        if job.is_due(now) && queue.send(QueueMessage::Run(key.clone())).is_ok() {
            job.mark_queued();
            info!("Queued {} (due {})", job.source_name, job.next_run_at);
            queued += 1;
        }
    }
    queued
}

async fn run_worker(
    jobs: SharedJobs,
    runner: Arc<dyn JobRunner>,
    mut receiver: mpsc::UnboundedReceiver<QueueMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            message = receiver.recv() => message,
        };

        match message {
            Some(QueueMessage::Run(key)) => execute_job(&jobs, &runner, &key).await,
            Some(QueueMessage::Shutdown) | None => break,
        }
    }
    debug!("Worker exited");
}

async fn execute_job(jobs: &SharedJobs, runner: &Arc<dyn JobRunner>, key: &str) {
    let job = {
        let mut jobs = lock(jobs);
        match jobs.get_mut(key) {
            Some(job) if job.status == JobStatus::Queued && !job.running => {
                job.begin_run(Utc::now());
                job.clone()
            }
            _ => {
                debug!("Dropping stale queue entry for {}", key);
                return;
            }
        }
    };

    info!("Running job {}", job.source_name);
    let source_name = job.source_name.clone();
    let task_runner = Arc::clone(runner);
    let handle = tokio::spawn(async move { task_runner.run_job(&job).await });

    let report = match handle.await {
        Ok(Ok(summary)) => {
            info!(
                "Job {} completed: {} products in {}",
                source_name, summary.products_found, summary.duration_formatted
            );
            JobReport::Completed(summary)
        }
        Ok(Err(e)) => {
            error!("Job {} failed: {}", source_name, e);
            JobReport::Failed {
                error: e.to_string(),
                failed_at: Utc::now(),
            }
        }
        Err(e) => {
            let e = HarvestError::JobPanicked {
                source_name: source_name.clone(),
                message: panic_message(e),
            };
            error!("{}", e);
            JobReport::Failed {
                error: e.to_string(),
                failed_at: Utc::now(),
            }
        }
    };

    if let Some(job) = lock(jobs).get_mut(key).filter(|job| job.running) {
        job.finish(report);
    }
}

fn panic_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return "task was cancelled".to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::result::{CacheMode, CrawlBatchResult};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeRunner {
        delay: Duration,
        fail: bool,
        panic: bool,
        calls: Mutex<Vec<String>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeRunner {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobRunner for FakeRunner {
        async fn run_job(&self, job: &CrawlJob) -> Result<RunSummary> {
            self.calls.lock().unwrap().push(job.source_name.clone());
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.panic {
                panic!("extractor exploded");
            }
            if self.fail {
                return Err(HarvestError::Discovery {
                    url: "https://example.com/sitemap.xml".to_string(),
                    message: "HTTP 503".to_string(),
                });
            }
            Ok(create_test_summary(&job.source_name))
        }
    }

    fn create_test_summary(source: &str) -> RunSummary {
        let result = CrawlBatchResult {
            source: source.to_string(),
            attempted: 3,
            succeeded: 3,
            failed: 0,
            rate_limited: 0,
            extraction_misses: 0,
            artifact_failures: 0,
            total_attempts: 3,
            retry_rounds: 0,
            duration: Duration::from_millis(5),
            run_dir: PathBuf::from("/tmp/run"),
            cache_mode: CacheMode::Fresh,
        };
        RunSummary::from_batch(&result, Utc::now(), Utc::now(), 3)
    }

    fn idle_job(name: &str) -> CrawlJob {
        CrawlJob::new(name, Duration::from_secs(3600), 50)
            .with_next_run_at(Utc::now() + chrono::Duration::hours(1))
    }

    async fn wait_for(
        scheduler: &JobScheduler,
        name: &str,
        condition: impl Fn(&CrawlJob) -> bool,
    ) -> CrawlJob {
        for _ in 0..500 {
            if let Some(job) = scheduler.get_job(name).filter(|job| condition(job)) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting on job {}", name);
    }

    #[tokio::test]
    async fn test_run_now_executes_job() {
        let runner = Arc::new(FakeRunner::default());
        let scheduler = JobScheduler::new(runner.clone(), Duration::from_secs(3600));
        scheduler.add_job(idle_job("PriceCheck"));

        assert!(scheduler.start());
        assert!(scheduler.run_now("pricecheck"));

        let job = wait_for(&scheduler, "PriceCheck", |j| j.status == JobStatus::Completed).await;
        assert!(!job.running);
        assert!(job.last_run_at.is_some());
        assert!(job.next_run_at > Utc::now() + chrono::Duration::minutes(59));
        assert!(matches!(job.last_report, Some(JobReport::Completed(_))));
        assert_eq!(runner.calls(), vec!["PriceCheck"]);

        assert!(scheduler.stop().await);
    }

    #[tokio::test]
    async fn test_checker_runs_due_jobs() {
        let runner = Arc::new(FakeRunner::default());
        let scheduler = JobScheduler::new(runner.clone(), Duration::from_millis(20));
        scheduler.add_job(CrawlJob::new("Due", Duration::from_secs(3600), 10));
        scheduler.add_job(idle_job("Later"));

        scheduler.start();
        wait_for(&scheduler, "Due", |j| j.status == JobStatus::Completed).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.stop().await;

        assert_eq!(runner.calls(), vec!["Due"]);
        assert_eq!(scheduler.get_job("Later").unwrap().status, JobStatus::Idle);
    }

    #[tokio::test]
    async fn test_jobs_run_one_at_a_time() {
        let runner = Arc::new(FakeRunner::slow(Duration::from_millis(30)));
        let scheduler = JobScheduler::new(runner.clone(), Duration::from_millis(10));
        for name in ["a", "b", "c"] {
            scheduler.add_job(CrawlJob::new(name, Duration::from_secs(3600), 10));
        }

        scheduler.start();
        for name in ["a", "b", "c"] {
            wait_for(&scheduler, name, |j| j.status == JobStatus::Completed).await;
        }
        scheduler.stop().await;

        assert_eq!(runner.calls().len(), 3);
        assert_eq!(runner.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_run_recorded() {
        let runner = Arc::new(FakeRunner {
            fail: true,
            ..FakeRunner::default()
        });
        let scheduler = JobScheduler::new(runner, Duration::from_secs(3600));
        scheduler.add_job(idle_job("PriceCheck"));
        scheduler.start();
        scheduler.run_now("PriceCheck");

        let job = wait_for(&scheduler, "PriceCheck", |j| j.status == JobStatus::Failed).await;
        match job.last_report {
            Some(JobReport::Failed { error, .. }) => assert!(error.contains("HTTP 503")),
            other => panic!("expected failure report, got {:?}", other),
        }
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_panicking_run_recorded_and_worker_survives() {
        let runner = Arc::new(FakeRunner {
            panic: true,
            ..FakeRunner::default()
        });
        let scheduler = JobScheduler::new(runner.clone(), Duration::from_secs(3600));
        scheduler.add_job(idle_job("First"));
        scheduler.add_job(idle_job("Second"));
        scheduler.start();

        scheduler.run_now("First");
        let job = wait_for(&scheduler, "First", |j| j.status == JobStatus::Failed).await;
        match job.last_report {
            Some(JobReport::Failed { error, .. }) => assert!(error.contains("extractor exploded")),
            other => panic!("expected failure report, got {:?}", other),
        }

        scheduler.run_now("Second");
        wait_for(&scheduler, "Second", |j| j.status == JobStatus::Failed).await;
        assert_eq!(runner.calls().len(), 2);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_run_now_rejects_pending_and_unknown() {
        let runner = Arc::new(FakeRunner::slow(Duration::from_millis(200)));
        let scheduler = JobScheduler::new(runner, Duration::from_secs(3600));
        scheduler.add_job(idle_job("PriceCheck"));

        assert!(!scheduler.run_now("Nowhere"));
        assert!(scheduler.run_now("PriceCheck"));
        assert!(!scheduler.run_now("PriceCheck"));
        assert_eq!(scheduler.queue_len(), 1);

        scheduler.start();
        wait_for(&scheduler, "PriceCheck", |j| j.running).await;
        assert!(!scheduler.run_now("PriceCheck"));
        assert!(!scheduler.add_job(idle_job("PriceCheck")));

        scheduler.stop().await;
        assert_eq!(
            scheduler.get_job("PriceCheck").unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_stop_returns_queued_jobs_to_idle() {
        let runner = Arc::new(FakeRunner::slow(Duration::from_millis(100)));
        let scheduler = JobScheduler::new(runner.clone(), Duration::from_secs(3600));
        scheduler.add_job(CrawlJob::new("alpha", Duration::from_secs(3600), 10));
        scheduler.add_job(CrawlJob::new("beta", Duration::from_secs(3600), 10));

        scheduler.start();
        wait_for(&scheduler, "alpha", |j| j.running).await;
        assert_eq!(scheduler.get_job("beta").unwrap().status, JobStatus::Queued);

        assert!(scheduler.stop().await);

        assert_eq!(runner.calls(), vec!["alpha"]);
        assert_eq!(scheduler.get_job("alpha").unwrap().status, JobStatus::Completed);
        assert_eq!(scheduler.get_job("beta").unwrap().status, JobStatus::Idle);
        assert_eq!(scheduler.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let scheduler = JobScheduler::new(Arc::new(FakeRunner::default()), Duration::from_secs(60));

        assert!(!scheduler.stop().await);
        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_running());
        assert!(scheduler.stop().await);
        assert!(!scheduler.is_running());
        assert!(scheduler.start());
        assert!(scheduler.stop().await);
    }

    #[tokio::test]
    async fn test_queued_while_stopped_runs_after_start() {
        let runner = Arc::new(FakeRunner::default());
        let scheduler = JobScheduler::new(runner.clone(), Duration::from_secs(3600));
        scheduler.add_job(idle_job("PriceCheck"));

        assert!(scheduler.run_now("PriceCheck"));
        scheduler.start();
        wait_for(&scheduler, "PriceCheck", |j| j.status == JobStatus::Completed).await;
        scheduler.stop().await;

        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_add_and_remove_jobs() {
        let scheduler = JobScheduler::new(Arc::new(FakeRunner::default()), Duration::from_secs(60));

        assert!(scheduler.add_job(idle_job("PriceCheck")));
        assert!(scheduler.add_job(idle_job("Takealot")));
        assert!(scheduler.add_job(idle_job("pricecheck")));

        let names: Vec<String> = scheduler.jobs().into_iter().map(|j| j.source_name).collect();
        assert_eq!(names, vec!["pricecheck", "Takealot"]);

        assert!(scheduler.remove_job("PRICECHECK"));
        assert!(!scheduler.remove_job("PriceCheck"));
        assert_eq!(scheduler.jobs().len(), 1);
    }
}
