use crate::common::{create_test_config, mount_shop, SOURCE};
use shelf_harvest::crawler::{Coordinator, JobRunner, JobScheduler};
use shelf_harvest::state::JobReport;
use shelf_harvest::{CrawlJob, JobStatus};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

async fn wait_for_finish(scheduler: &JobScheduler, name: &str) -> CrawlJob {
    for _ in 0..200 {
        if let Some(job) = scheduler.get_job(name) {
            if job.status.is_finished() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {} did not finish in time", name);
}

fn create_scheduler(coordinator: Coordinator) -> JobScheduler {
    let coordinator = Arc::new(coordinator);
    let registry = Arc::clone(coordinator.registry());
    let runner: Arc<dyn JobRunner> = coordinator;
    JobScheduler::from_registry(runner, Duration::from_millis(20), &registry)
}

#[tokio::test]
async fn test_scheduler_runs_due_source() {
    let server = MockServer::start().await;
    mount_shop(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let coordinator = Coordinator::from_config(&config).unwrap();
    let store = coordinator.store();
    let scheduler = create_scheduler(coordinator);

    assert_eq!(scheduler.jobs().len(), 1);
    assert!(scheduler.start());

    let job = wait_for_finish(&scheduler, SOURCE).await;
    assert!(scheduler.stop().await);

    assert_eq!(job.status, JobStatus::Completed);
    assert!(!job.running);
    assert!(job.last_run_at.is_some());
    assert!(job.next_run_at > job.last_run_at.unwrap());
    match job.last_report {
        Some(JobReport::Completed(summary)) => {
            assert_eq!(summary.succeeded, 2);
            assert_eq!(summary.database_success, Some(2));
        }
        other => panic!("unexpected report: {:?}", other),
    }

    assert_eq!(store.lock().unwrap().stats().unwrap().total_products, 2);
}

#[tokio::test]
async fn test_scheduler_records_failed_discovery() {
    let server = MockServer::start().await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let scheduler = create_scheduler(Coordinator::from_config(&config).unwrap());

    assert!(scheduler.start());
    let job = wait_for_finish(&scheduler, SOURCE).await;
    assert!(scheduler.stop().await);

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.last_report.map(|r| r.is_failure()).unwrap_or(false));
}

#[tokio::test]
async fn test_run_now_on_stopped_scheduler_runs_after_start() {
    let server = MockServer::start().await;
    mount_shop(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), temp_dir.path());
    let coordinator = Arc::new(Coordinator::from_config(&config).unwrap());
    let runner: Arc<dyn JobRunner> = coordinator;
    let scheduler = JobScheduler::new(runner, Duration::from_secs(3600));

    let job = CrawlJob::new(SOURCE, Duration::from_secs(3600), 10)
        .with_next_run_at(chrono::Utc::now() + chrono::Duration::hours(1));
    assert!(scheduler.add_job(job));

    assert!(scheduler.run_now(&SOURCE.to_uppercase()));
    assert_eq!(scheduler.queue_len(), 1);
    assert!(!scheduler.run_now(SOURCE));

    assert!(scheduler.start());
    let job = wait_for_finish(&scheduler, SOURCE).await;
    assert!(scheduler.stop().await);

    assert_eq!(job.status, JobStatus::Completed);
}
