//! Result reporter — delivers task outcomes to the admin center.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::executor::run_table::RunningTasks;
use crate::executor::runner::CompletionSink;
use crate::executor::task::Task;
use crate::protocol::HandleCallbackParam;
use crate::scheduler::client::SchedulerClient;

/// Removes a finished task from the running table and POSTs its callback.
///
/// Delivery is best-effort, at-most-once: a transport failure or a rejecting
/// envelope is logged and dropped, with no retry and no durable queue. The
/// local outcome is final regardless of whether the scheduler ever learns
/// of it.
pub struct ResultReporter {
    client: Arc<SchedulerClient>,
    running: Arc<RunningTasks>,
}

impl ResultReporter {
    pub fn new(client: Arc<SchedulerClient>, running: Arc<RunningTasks>) -> Self {
        Self { client, running }
    }
}

#[async_trait]
impl CompletionSink for ResultReporter {
    async fn complete(&self, task: Arc<Task>, code: i32, message: String) {
        // Generation-checked: a kill already removed this entry, and a
        // COVER_EARLY override replaced it — either way this is a no-op and
        // the current occupant (if any) stays.
        self.running.remove_if_match(&task).await;

        let callback = HandleCallbackParam::new(&task.params, code, message);
        match self
            .client
            .post_api::<_, String>("/api/callback", &[callback])
            .await
        {
            Ok(_) => debug!(
                job_id = task.job_id,
                log_id = task.params.log_id,
                code,
                "Callback delivered"
            ),
            Err(e) => warn!(
                job_id = task.job_id,
                log_id = task.params.log_id,
                error = %e,
                "Callback delivery failed, result dropped"
            ),
        }
    }
}
