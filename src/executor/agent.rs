//! Executor facade — wires the registry, running-task table, dispatcher,
//! and scheduler client together behind one handle.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use secrecy::ExposeSecret;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ExecutorConfig;
use crate::error::Result;
use crate::executor::dispatch::Dispatcher;
use crate::executor::handler::{BoxError, JobHandler, Middleware, TaskContext, handler_fn, job_handler_fn};
use crate::executor::registry::HandlerRegistry;
use crate::executor::run_table::RunningTasks;
use crate::executor::runner::CompletionSink;
use crate::logquery::{LogQueryFn, default_log_query};
use crate::scheduler::client::SchedulerClient;
use crate::scheduler::registration::{deregister, spawn_registration_loop};
use crate::scheduler::reporter::ResultReporter;
use crate::server::{AppState, executor_routes};

/// The executor agent.
///
/// Typical lifecycle: [`Executor::new`] → register handlers → [`start`] the
/// registration loop → serve [`router`] → [`stop`] on shutdown.
///
/// [`start`]: Executor::start
/// [`router`]: Executor::router
/// [`stop`]: Executor::stop
pub struct Executor {
    config: ExecutorConfig,
    registry: Arc<HandlerRegistry>,
    running: Arc<RunningTasks>,
    dispatcher: Arc<Dispatcher>,
    client: Arc<SchedulerClient>,
    log_query: LogQueryFn,
    shutdown: CancellationToken,
    registration: Mutex<Option<JoinHandle<()>>>,
}

impl Executor {
    /// Build an executor from configuration.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        let client = Arc::new(SchedulerClient::new(&config)?);
        let registry = Arc::new(HandlerRegistry::new());
        let running = Arc::new(RunningTasks::new());
        let shutdown = CancellationToken::new();

        let reporter: Arc<dyn CompletionSink> = Arc::new(ResultReporter::new(
            Arc::clone(&client),
            Arc::clone(&running),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&running),
            reporter,
            shutdown.clone(),
        ));

        Ok(Self {
            config,
            registry,
            running,
            dispatcher,
            client,
            log_query: default_log_query(),
            shutdown,
            registration: Mutex::new(None),
        })
    }

    /// Install a log query callback for `/log` (replaces the default).
    pub fn with_log_query(mut self, log_query: LogQueryFn) -> Self {
        self.log_query = log_query;
        self
    }

    /// Register a [`JobHandler`] under `name`. Re-registering a name
    /// overwrites the previous handler.
    pub async fn register<H: JobHandler + 'static>(&self, name: impl Into<String>, handler: H) {
        self.registry
            .register(name, job_handler_fn(Arc::new(handler)))
            .await;
    }

    /// Register a plain async closure under `name`.
    pub async fn register_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<String, BoxError>> + Send + 'static,
    {
        self.registry.register(name, handler_fn(f)).await;
    }

    /// Add a middleware. Only handlers registered afterwards are wrapped.
    pub async fn use_middleware(&self, middleware: Middleware) {
        self.registry.use_middleware(middleware).await;
    }

    /// Build the inbound HTTP router to serve on the executor port.
    pub fn router(&self) -> Router {
        executor_routes(AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            log_query: Arc::clone(&self.log_query),
            access_token: self
                .config
                .access_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
        })
    }

    /// Start the registration heartbeat loop. Idempotent.
    pub fn start(&self) {
        let mut registration = self.lock_registration();
        if registration.is_some() {
            return;
        }
        *registration = Some(spawn_registration_loop(
            Arc::clone(&self.client),
            self.config.registry_params(),
            self.config.registry_interval,
            self.shutdown.clone(),
        ));
    }

    /// Stop the executor: deregister once (best-effort), cancel every
    /// in-flight task's context, and wait for the registration loop to exit.
    pub async fn stop(&self) {
        info!(in_flight = self.running.len().await, "Executor stopping");
        deregister(&self.client, &self.config.registry_params()).await;
        self.shutdown.cancel();

        let handle = self.lock_registration().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Dispatch controller, for embedding in custom HTTP wiring.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Running-task table, for observability.
    pub fn running_tasks(&self) -> Arc<RunningTasks> {
        Arc::clone(&self.running)
    }

    fn lock_registration(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
