//! Error types for xxl-agent.

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors produced when admitting or killing a dispatch.
///
/// These are the synchronous rejections a trigger request can receive; a
/// handler's own failure is never an error here — it becomes the task's
/// reported outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Handler {name} not registered")]
    HandlerNotRegistered { name: String },

    #[error("Job {job_id} already running")]
    AlreadyRunning { job_id: i64 },

    #[error("Job {job_id} not running")]
    NotRunning { job_id: i64 },
}

/// Errors talking to the scheduling center.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response from scheduler: {0}")]
    InvalidResponse(String),

    #[error("Scheduler rejected request: code={code} msg={msg}")]
    Rejected { code: i32, msg: String },
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
