//! Dispatch controller — admission, blocking strategy, kill, and busy-check.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::DispatchError;
use crate::executor::registry::HandlerRegistry;
use crate::executor::run_table::RunningTasks;
use crate::executor::runner::{CompletionSink, run_task};
use crate::executor::task::Task;
use crate::protocol::TriggerParams;

/// Receives trigger requests and decides whether to launch a task.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    running: Arc<RunningTasks>,
    sink: Arc<dyn CompletionSink>,
    root: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher. Tasks derive their cancellation tokens from
    /// `root`, so cancelling it on shutdown cancels every in-flight task.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        running: Arc<RunningTasks>,
        sink: Arc<dyn CompletionSink>,
        root: CancellationToken,
    ) -> Self {
        Self {
            registry,
            running,
            sink,
            root,
        }
    }

    /// Admit a trigger request. On success the task is already launched;
    /// the caller only learns about acceptance, never completion.
    pub async fn dispatch(&self, params: TriggerParams) -> Result<(), DispatchError> {
        let handler = self
            .registry
            .lookup(&params.executor_handler)
            .await
            .ok_or_else(|| DispatchError::HandlerNotRegistered {
                name: params.executor_handler.clone(),
            })?;

        let cover_early = params.executor_block_strategy.is_cover_early();
        let job_id = params.job_id;
        let task = Task::new(params, handler, &self.root);

        match self.running.try_insert(Arc::clone(&task)).await {
            Ok(()) => {
                self.launch(task);
                Ok(())
            }
            Err(existing) => {
                if !cover_early {
                    // SERIAL_EXECUTION rejects exactly like DISCARD_LATER;
                    // nothing is queued for later execution.
                    warn!(
                        job_id,
                        handler = %task.handler_name,
                        strategy = %task.params.executor_block_strategy,
                        "Job already running, dispatch rejected"
                    );
                    return Err(DispatchError::AlreadyRunning { job_id });
                }

                // Override: cancel and replace the occupant as one
                // transition. If the occupant changed under us (the single
                // retry admission allows), give up rather than loop.
                if self.running.replace_if_match(&existing, Arc::clone(&task)).await {
                    info!(
                        job_id,
                        old_run_id = %existing.run_id,
                        new_run_id = %task.run_id,
                        "Running task superseded by COVER_EARLY dispatch"
                    );
                    self.launch(task);
                    Ok(())
                } else {
                    warn!(job_id, "Occupant changed during COVER_EARLY override, dispatch rejected");
                    Err(DispatchError::AlreadyRunning { job_id })
                }
            }
        }
    }

    /// Kill the running task for `job_id`, if any.
    ///
    /// Cancellation is cooperative: this removes the task from the table and
    /// fires its signal, but does not wait for the handler to return.
    pub async fn kill(&self, job_id: i64) -> Result<(), DispatchError> {
        match self.running.remove(job_id).await {
            Some(task) => {
                info!(job_id, run_id = %task.run_id, "Task killed");
                task.cancel();
                Ok(())
            }
            None => Err(DispatchError::NotRunning { job_id }),
        }
    }

    /// Whether `job_id` has no task in flight.
    pub async fn is_idle(&self, job_id: i64) -> bool {
        self.running.get(job_id).await.is_none()
    }

    fn launch(&self, task: Arc<Task>) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(run_task(task, sink));
    }
}
