//! In-flight task record and its state machine.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::executor::handler::{HandlerFn, TaskContext};
use crate::protocol::TriggerParams;

/// Lifecycle state of a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Admitted but the runner has not started yet.
    Created,
    /// Handler is executing.
    Running,
    /// Handler returned without error.
    Succeeded,
    /// Handler returned an error.
    Failed,
    /// Handler panicked; contained at the runner boundary.
    Panicked,
    /// Cancelled (kill, override, or deadline) before a successful return.
    Killed,
}

impl TaskState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, target),
            (Created, Running)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Panicked)
                | (Running, Killed)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Panicked | Self::Killed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Panicked => "panicked",
            Self::Killed => "killed",
        };
        write!(f, "{s}")
    }
}

struct RunState {
    state: TaskState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// One accepted dispatch.
///
/// Owned by its runner while running; the one sanctioned external mutation
/// is [`Task::cancel`], invoked by kill or a COVER_EARLY override.
pub struct Task {
    /// Job identifier (the running-task table key).
    pub job_id: i64,
    /// Name the handler was registered under.
    pub handler_name: String,
    /// Per-dispatch generation tag; job ids repeat across dispatches, this
    /// never does. Generation-checked removal keys off it.
    pub run_id: Uuid,
    /// Full trigger parameters.
    pub params: Arc<TriggerParams>,
    /// Deadline derived from `executorTimeout` (None = no deadline).
    pub timeout: Option<Duration>,
    pub(crate) handler: HandlerFn,
    cancel: CancellationToken,
    run_state: Mutex<RunState>,
}

impl Task {
    /// Build a task from an admitted trigger. The cancellation token is a
    /// child of `root`, so process shutdown cancels every in-flight task.
    pub fn new(params: TriggerParams, handler: HandlerFn, root: &CancellationToken) -> Arc<Self> {
        let timeout = (params.executor_timeout > 0)
            .then(|| Duration::from_secs(params.executor_timeout as u64));
        Arc::new(Self {
            job_id: params.job_id,
            handler_name: params.executor_handler.clone(),
            run_id: Uuid::new_v4(),
            params: Arc::new(params),
            timeout,
            handler,
            cancel: root.child_token(),
            run_state: Mutex::new(RunState {
                state: TaskState::Created,
                started_at: None,
                finished_at: None,
            }),
        })
    }

    /// Fire this task's cancellation signal. Cooperative: the handler keeps
    /// running until it observes the signal and returns. Safe to call more
    /// than once.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the cancellation signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Context handed to the handler function.
    pub fn context(&self) -> TaskContext {
        TaskContext::new(Arc::clone(&self.params), self.cancel.clone())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.lock_state().state
    }

    pub(crate) fn mark_running(&self) {
        let mut run_state = self.lock_state();
        if !run_state.state.can_transition_to(TaskState::Running) {
            tracing::warn!(
                job_id = self.job_id,
                state = %run_state.state,
                "Invalid transition to running ignored"
            );
            return;
        }
        run_state.state = TaskState::Running;
        run_state.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_finished(&self, outcome: TaskState) {
        let mut run_state = self.lock_state();
        if !run_state.state.can_transition_to(outcome) {
            tracing::warn!(
                job_id = self.job_id,
                state = %run_state.state,
                target = %outcome,
                "Invalid terminal transition ignored"
            );
            return;
        }
        run_state.state = outcome;
        run_state.finished_at = Some(Utc::now());
    }

    /// Wall-clock time spent running, for diagnostic messages.
    pub fn elapsed(&self) -> Duration {
        let run_state = self.lock_state();
        match run_state.started_at {
            Some(start) => {
                let end = run_state.finished_at.unwrap_or_else(Utc::now);
                let elapsed = end.signed_duration_since(start);
                Duration::from_millis(elapsed.num_milliseconds().max(0) as u64)
            }
            None => Duration::ZERO,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.run_state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("job_id", &self.job_id)
            .field("handler_name", &self.handler_name)
            .field("run_id", &self.run_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
