use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use xxl_agent::config::ExecutorConfig;
use xxl_agent::executor::Executor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExecutorConfig::from_env().context("reading XXL_* environment")?;

    // Initialize tracing; optional rolling file output when XXL_LOG_DIR is set.
    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "xxl-agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .init();
            None
        }
    };

    // Handler panics are contained per-task, but route the payload and a
    // backtrace through tracing so operators can diagnose them.
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        tracing::error!("panic: {info}\n{backtrace}");
    }));

    let bind_addr = format!("0.0.0.0:{}", config.executor_port);
    tracing::info!(
        admin = %config.server_addr,
        registry_key = %config.registry_key,
        address = %config.executor_address(),
        "xxl-agent v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let executor = Arc::new(Executor::new(config)?);

    // Demo handlers. A real deployment registers its own before start().
    executor
        .register_fn("echo", |ctx| async move {
            Ok(format!("echo: {}", ctx.params.executor_params))
        })
        .await;
    executor
        .register_fn("sleep", |ctx| async move {
            // Sleeps for the requested seconds, returning early when killed.
            let secs: u64 = ctx.params.executor_params.trim().parse().unwrap_or(10);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    Ok(format!("slept {secs}s"))
                }
                _ = ctx.cancelled() => Err("cancelled while sleeping".into()),
            }
        })
        .await;

    executor.start();

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "Executor HTTP server listening");

    axum::serve(listener, executor.router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    executor.stop().await;
    tracing::info!("Executor stopped");
    Ok(())
}
