//! Registration heartbeat loop.
//!
//! Announces this executor's address to the admin center immediately on
//! start and then on a fixed interval; the admin expires silent executors,
//! so each tick is an independent best-effort attempt and a failed one is
//! simply retried next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::RegistryParams;
use crate::scheduler::client::SchedulerClient;

/// Spawn the registration loop. The first tick fires immediately; the loop
/// exits when `shutdown` is cancelled.
pub fn spawn_registration_loop(
    client: Arc<SchedulerClient>,
    params: RegistryParams,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            registry_key = %params.registry_key,
            registry_value = %params.registry_value,
            interval_secs = interval.as_secs(),
            "Registration loop started"
        );

        let mut tick = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Registration loop stopped");
                    break;
                }
                _ = tick.tick() => {
                    register_once(&client, &params).await;
                }
            }
        }
    })
}

/// One registration attempt. Failure is logged and left for the next tick.
async fn register_once(client: &SchedulerClient, params: &RegistryParams) {
    match client.post_api::<_, String>("/api/registry", params).await {
        Ok(_) => debug!(registry_key = %params.registry_key, "Executor registered"),
        Err(e) => warn!(
            registry_key = %params.registry_key,
            error = %e,
            "Executor registration failed, will retry next tick"
        ),
    }
}

/// One best-effort de-registration at shutdown. Failure is logged, never
/// retried, and never blocks shutdown.
pub async fn deregister(client: &SchedulerClient, params: &RegistryParams) {
    match client
        .post_api::<_, String>("/api/registryRemove", params)
        .await
    {
        Ok(_) => info!(registry_key = %params.registry_key, "Executor deregistered"),
        Err(e) => warn!(
            registry_key = %params.registry_key,
            error = %e,
            "Executor deregistration failed"
        ),
    }
}
