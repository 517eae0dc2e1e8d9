//! Queue polling loop.
//!
//! Claims the oldest pending task with `SELECT FOR UPDATE SKIP LOCKED`
//! (via [`TaskRepo::claim_next`]) so any number of worker processes can
//! share one queue. Each worker runs one task at a time.

use std::time::Duration;

use autobids_core::process::CommandRunner;
use autobids_db::repositories::TaskRepo;
use autobids_pipeline::Pipeline;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Long-lived loop executing queued tasks through a [`Pipeline`].
pub struct TaskWorker<R> {
    pipeline: Pipeline<R>,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl<R: CommandRunner> TaskWorker<R> {
    pub fn new(pipeline: Pipeline<R>, config: &WorkerConfig) -> Self {
        Self {
            pipeline,
            poll_interval: config.poll_interval,
            task_timeout: config.task_timeout,
        }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// A task already executing is allowed to finish before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            task_timeout_secs = self.task_timeout.as_secs(),
            "Task worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Task worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Drain the queue before waiting for the next tick.
                    loop {
                        match self.run_next().await {
                            Ok(true) if !cancel.is_cancelled() => continue,
                            Ok(_) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "Task poll failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Claim and execute one task. Returns `false` when the queue is empty.
    pub async fn run_next(&self) -> Result<bool, sqlx::Error> {
        let pool = self.pipeline.pool();
        let Some(task) = TaskRepo::claim_next(pool).await? else {
            return Ok(false);
        };
        tracing::info!(
            task_id = task.id,
            task_type = %task.task_type,
            study_id = ?task.study_id,
            "Task claimed",
        );

        match tokio::time::timeout(self.task_timeout, self.pipeline.run(&task)).await {
            Ok(Ok(())) => {
                tracing::info!(task_id = task.id, "Task finished");
            }
            // Already recorded on the task by the pipeline.
            Ok(Err(_)) => {}
            Err(_) => {
                let message = format!(
                    "Task timed out after {} seconds",
                    self.task_timeout.as_secs()
                );
                tracing::error!(task_id = task.id, "{message}");
                TaskRepo::append_log(pool, task.id, &format!("\n{message}\n")).await?;
                TaskRepo::fail_if_incomplete(pool, task.id, &message).await?;
            }
        }
        Ok(true)
    }
}
