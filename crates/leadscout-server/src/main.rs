use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

mod app;
mod error;
mod http;

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
                .unwrap_or_else(|_| "leadscout_server=info,tower_http=info".into()),
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
        store.clone(),
        source,
        lm,
        notifier,
        config.collector_batch_limit,
        config.processor_batch_limit,
        config.first_contact_window_days,
        Duration::from_secs(config.worker_interval_minutes * 60),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(scheduler.clone().run(shutdown_rx));

    let bind = config.server_bind.clone();
    let port = config.server_port;
    let state = Arc::new(app::AppState { config, store, scheduler });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("leadscout server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
