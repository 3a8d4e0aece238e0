//! Task dispatch and lifecycle engine.

pub mod agent;
pub mod dispatch;
pub mod handler;
pub mod registry;
pub mod run_table;
pub mod runner;
pub mod task;

pub use agent::Executor;
pub use dispatch::Dispatcher;
pub use handler::{BoxError, HandlerFn, JobHandler, Middleware, TaskContext, handler_fn};
pub use registry::HandlerRegistry;
pub use run_table::RunningTasks;
pub use runner::CompletionSink;
pub use task::{Task, TaskState};
