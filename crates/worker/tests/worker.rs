//! Queue draining against a real database with scripted commands.

use std::time::Duration;

use autobids_core::process::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use autobids_db::models::status::TaskStatus;
use autobids_db::repositories::TaskRepo;
use autobids_pipeline::{launch_task, Pipeline, TaskPayload, ToolConfig};
use autobids_worker::{TaskWorker, WorkerConfig};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Answers every command successfully after an optional delay.
struct DelayedRunner(Duration);

impl CommandRunner for DelayedRunner {
    async fn run(&self, _spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        tokio::time::sleep(self.0).await;
        Ok(CommandOutput::default())
    }
}

fn worker(pool: PgPool, delay: Duration, task_timeout: Duration) -> TaskWorker<DelayedRunner> {
    let config = WorkerConfig {
        database_url: String::new(),
        poll_interval: Duration::from_millis(10),
        task_timeout,
    };
    let pipeline = Pipeline::new(pool, ToolConfig::from_env(), DelayedRunner(delay), None);
    TaskWorker::new(pipeline, &config)
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_run_next_on_empty_queue(pool: PgPool) {
    let worker = worker(pool, Duration::ZERO, Duration::from_secs(5));
    assert!(!worker.run_next().await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_run_next_completes_task(pool: PgPool) {
    let task = launch_task(&pool, &TaskPayload::UpdateHeuristics, "Update heuristics", None)
        .await
        .unwrap();
    let worker = worker(pool.clone(), Duration::ZERO, Duration::from_secs(5));

    assert!(worker.run_next().await.unwrap());
    let task = TaskRepo::find_by_id(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(task.status(), Some(TaskStatus::Completed));
    assert!(!worker.run_next().await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_timed_out_task_is_failed(pool: PgPool) {
    let task = launch_task(&pool, &TaskPayload::UpdateHeuristics, "Update heuristics", None)
        .await
        .unwrap();
    let worker = worker(pool.clone(), Duration::from_secs(10), Duration::from_millis(50));

    assert!(worker.run_next().await.unwrap());
    let task = TaskRepo::find_by_id(&pool, task.id).await.unwrap().unwrap();
    assert_eq!(task.status(), Some(TaskStatus::Failed));
    assert!(task.error_message.unwrap().starts_with("Task timed out"));
    assert!(task.log.contains("Task timed out"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_run_drains_queue_until_cancelled(pool: PgPool) {
    for _ in 0..3 {
        launch_task(&pool, &TaskPayload::UpdateHeuristics, "Update heuristics", None)
            .await
            .unwrap();
    }
    let worker = worker(pool.clone(), Duration::ZERO, Duration::from_secs(5));
    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    let handle = tokio::spawn(async move { worker.run(stop).await });

    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let pending: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE completed_at IS NULL")
                .fetch_one(&pool)
                .await
                .unwrap();
        if pending == 0 {
            break;
        }
    }
    cancel.cancel();
    handle.await.unwrap();

    let completed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE completed_at IS NOT NULL")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(completed, 3);
}
