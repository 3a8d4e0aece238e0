//! Handler function types and the context handed to a running handler.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::protocol::TriggerParams;

/// Error type handlers report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by a handler invocation. `Ok` carries the success message
/// delivered to the scheduler.
pub type HandlerFuture = BoxFuture<'static, Result<String, BoxError>>;

/// Type-erased handler function stored in the registry.
pub type HandlerFn = Arc<dyn Fn(TaskContext) -> HandlerFuture + Send + Sync>;

/// Middleware wraps a handler function with another, onion-style.
pub type Middleware = Arc<dyn Fn(HandlerFn) -> HandlerFn + Send + Sync>;

/// A named, registrable unit of work.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute one dispatch. Cancellation is cooperative: a well-behaved
    /// handler watches `ctx.cancelled()` and returns promptly once it fires.
    async fn run(&self, ctx: TaskContext) -> Result<String, BoxError>;
}

/// Adapt a plain async closure into a [`HandlerFn`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, BoxError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Adapt a [`JobHandler`] into a [`HandlerFn`].
pub fn job_handler_fn(handler: Arc<dyn JobHandler>) -> HandlerFn {
    Arc::new(move |ctx| {
        let handler = Arc::clone(&handler);
        Box::pin(async move { handler.run(ctx).await })
    })
}

/// Per-dispatch context passed into the handler.
#[derive(Clone)]
pub struct TaskContext {
    /// Job identifier of this dispatch.
    pub job_id: i64,
    /// Full trigger parameters, including the opaque glue/broadcast fields.
    pub params: Arc<TriggerParams>,
    cancel: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(params: Arc<TriggerParams>, cancel: CancellationToken) -> Self {
        Self {
            job_id: params.job_id,
            params,
            cancel,
        }
    }

    /// Non-blocking cancellation check.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once this task has been killed, superseded, or timed out.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Deserialize `executorParams` as JSON into `T`.
    pub fn params_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.params.executor_params)
    }
}
