//! Outbound side: HTTP client for the admin center, the registration
//! heartbeat loop, and the completion reporter.

pub mod client;
pub mod registration;
pub mod reporter;

pub use client::SchedulerClient;
pub use registration::{deregister, spawn_registration_loop};
pub use reporter::ResultReporter;
