//! Standalone worker process: runs the scheduler loop with no HTTP surface.
//! The bot session lives in `leadscout-server`; this process reaches it only
//! through the internal HTTP push endpoint (§5, §6).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use leadscout_core::config::LeadscoutConfig;
use leadscout_llm::{LmClient, OpenAiLmClient};
use leadscout_notify::Notifier;
use leadscout_scheduler::SchedulerEngine;
use leadscout_source::{HttpSource, Source};
use leadscout_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leadscout_worker=info".into()),
        )
        .init();

    let config_path = std::env::var("LEADSCOUT_CONFIG").ok();
    let config = LeadscoutConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        LeadscoutConfig::default()
    });

    let store = Arc::new(Store::open(&config.database_url)?);

    let source: Arc<dyn Source> = Arc::new(HttpSource::new(
        config.chat_platform_api_url.clone(),
        config.chat_platform_app_id.clone(),
        config.chat_platform_app_secret.clone(),
    ));

    let lm: Arc<dyn LmClient> = Arc::new(OpenAiLmClient::new(
        config.lm_api_url.clone(),
        config.lm_api_key.clone(),
        config.lm_model.clone(),
        Duration::from_secs(config.lm_timeout_seconds),
        Duration::from_secs(config.lm_cache_ttl_seconds),
    ));

    let mut notifier = Notifier::new(
        store.clone(),
        config.backend_internal_url.clone(),
        config.smtp_from.clone(),
    );
    if !config.smtp_host.is_empty() && !config.smtp_user.is_empty() {
        notifier = notifier.with_smtp(
            &config.smtp_host,
            config.smtp_port,
            config.smtp_user.clone(),
            config.smtp_password.clone(),
        )?;
    }
    let notifier = Arc::new(notifier);

    let scheduler = SchedulerEngine::new(
        store,
        source,
        lm,
        notifier,
        config.collector_batch_limit,
        config.processor_batch_limit,
        config.first_contact_window_days,
        Duration::from_secs(config.worker_interval_minutes * 60),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = tokio::spawn(scheduler.run(shutdown_rx));

    wait_for_termination().await;
    info!("termination signal received, draining in-flight tick");
    let _ = shutdown_tx.send(true);
    loop_handle.await?;

    info!("leadscout worker stopped");
    Ok(())
}

/// Waits for either SIGINT or, on unix, SIGTERM — whichever the platform
/// sends the process first.
#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
