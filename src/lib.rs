//! xxl-agent — executor agent for the XXL-JOB distributed scheduling platform.
//!
//! A long-running process that registers named job handlers, accepts trigger
//! requests from the scheduling center over HTTP, runs the matching handler
//! under a cancellable (and optionally deadline-bounded) context, and reports
//! the outcome back via the callback API.

pub mod config;
pub mod error;
pub mod executor;
pub mod logquery;
pub mod protocol;
pub mod scheduler;
pub mod server;
