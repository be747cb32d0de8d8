mod backfill;
mod bootstrap_job;
mod config;
mod coverage;
mod daily;
mod dependency;
mod jobs;
mod pipeline;
mod reconcile;
mod scheduler;
mod scope;
mod transform;

use crate::scheduler::Scheduler;
use matchfeed_client::{RateGovernor, UpstreamClient, UpstreamConfig};
use miette::IntoDiagnostic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let config_dir = std::env::var("MATCHFEED_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));
    let config = config::load(&config_dir).into_diagnostic()?;

    matchfeed_db::run_migrations().into_diagnostic()?;
    let pool = matchfeed_db::get_pool(10).into_diagnostic()?;

    let governor = Arc::new(RateGovernor::new(
        config.rate_limits.capacity_per_minute as u32,
        config.rate_limits.emergency_stop_threshold,
    ));

    let client = Arc::new(
        UpstreamClient::new(
            UpstreamConfig {
                base_url: config.upstream.base_url.clone(),
                api_key_header: config.upstream.api_key_header.clone(),
                api_key: config.upstream.api_key.clone(),
                request_timeout: Duration::from_secs(config.upstream.request_timeout_secs),
                max_retries: config.upstream.max_retries,
                backoff_base: Duration::from_millis(config.upstream.backoff_base_ms),
                backoff_cap: Duration::from_millis(config.upstream.backoff_cap_ms),
            },
            governor.clone(),
        )
        .into_diagnostic()?,
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        log::info!("shutdown signal received");
        shutdown.cancel();
    });

    let scheduler = Scheduler::new(client, governor, pool, config);
    scheduler.run(cancel).await;

    Ok(())
}

/// Graceful shutdown on SIGINT/SIGTERM, per §4.11. `ctrl_c` alone only covers SIGINT; a
/// `docker stop`/orchestrator shutdown sends SIGTERM, so both are raced on unix targets.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
