//! Task runner — executes one task's handler under a panic boundary and a
//! cooperative deadline, classifies the outcome, and hands it to the
//! completion sink exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::executor::task::{Task, TaskState};
use crate::protocol::{FAILURE_CODE, SUCCESS_CODE};

/// Receives the terminal outcome of a task. Invoked exactly once per
/// accepted dispatch, on every path out of the runner.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn complete(&self, task: Arc<Task>, code: i32, message: String);
}

/// Run `task` to completion and report through `sink`.
///
/// The handler future executes in its own spawned task so that a panic is
/// contained as a `JoinError` here instead of unwinding anything else — this
/// is the single place process-wide where handler panics are converted into
/// a reported outcome.
pub async fn run_task(task: Arc<Task>, sink: Arc<dyn CompletionSink>) {
    task.mark_running();
    info!(
        job_id = task.job_id,
        run_id = %task.run_id,
        handler = %task.handler_name,
        "Task started"
    );

    // Deadline is an implicit kill: the watcher only fires the cancellation
    // signal, the handler's own return still decides the outcome.
    let deadline = task.timeout.map(|timeout| {
        let task = Arc::clone(&task);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(job_id = task.job_id, ?timeout, "Task deadline reached, cancelling");
            task.cancel();
        })
    });

    let handler = Arc::clone(&task.handler);
    let result = tokio::spawn(handler(task.context())).await;

    if let Some(watcher) = deadline {
        watcher.abort();
    }

    let (outcome, code, message) = match result {
        Ok(Ok(msg)) if task.is_cancelled() => {
            // A killed or superseded task must never report success, even if
            // the handler ignored the signal and finished normally.
            (
                TaskState::Killed,
                FAILURE_CODE,
                format!("task cancelled: {msg}"),
            )
        }
        Ok(Ok(msg)) => (TaskState::Succeeded, SUCCESS_CODE, msg),
        Ok(Err(e)) => (TaskState::Failed, FAILURE_CODE, e.to_string()),
        Err(join_err) => {
            // Panic cleanup: cancel in case the handler left background work
            // keyed off the task context.
            task.cancel();
            let message = if join_err.is_panic() {
                format!("task panic: {}", panic_message(join_err.into_panic()))
            } else {
                "task aborted before completion".to_string()
            };
            error!(
                job_id = task.job_id,
                run_id = %task.run_id,
                handler = %task.handler_name,
                "Task panicked: {message}"
            );
            (TaskState::Panicked, FAILURE_CODE, message)
        }
    };

    task.mark_finished(outcome);
    info!(
        job_id = task.job_id,
        run_id = %task.run_id,
        outcome = %outcome,
        elapsed_ms = task.elapsed().as_millis() as u64,
        "Task finished"
    );

    sink.complete(task, code, message).await;
}

/// Extract a readable message from a panic payload.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
