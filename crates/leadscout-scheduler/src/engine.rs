use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use leadscout_engine::{run_tick, TickResult};
use leadscout_llm::LmClient;
use leadscout_notify::Notifier;
use leadscout_source::Source;
use leadscout_store::Store;

use crate::error::{Result, SchedulerError};

/// Periodic driver for the collect-then-process tick (§4.7). Singleton per
/// process: the background loop and `run_once` share one `in_flight` guard,
/// so a manual trigger never overlaps a scheduled tick and vice versa.
pub struct SchedulerEngine {
    store: Arc<Store>,
    source: Arc<dyn Source>,
    lm: Arc<dyn LmClient>,
    notifier: Arc<Notifier>,
    collector_batch_limit: u32,
    processor_batch_limit: u32,
    first_contact_window_days: i64,
    tick_interval: Duration,
    in_flight: Mutex<()>,
}

impl SchedulerEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        source: Arc<dyn Source>,
        lm: Arc<dyn LmClient>,
        notifier: Arc<Notifier>,
        collector_batch_limit: u32,
        processor_batch_limit: u32,
        first_contact_window_days: i64,
        tick_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            source,
            lm,
            notifier,
            collector_batch_limit,
            processor_batch_limit,
            first_contact_window_days,
            tick_interval,
            in_flight: Mutex::new(()),
        })
    }

    /// Execute a single tick synchronously and return its aggregated result.
    /// Blocks until any concurrently scheduled tick finishes rather than
    /// racing it, since both share one SQLite writer underneath.
    pub async fn run_once(self: &Arc<Self>) -> TickResult {
        let _guard = self.in_flight.lock().await;
        self.execute_tick().await
    }

    /// Manual trigger that fails fast instead of waiting, for callers that
    /// want to observe contention rather than block on it.
    pub async fn try_run_once(self: &Arc<Self>) -> Result<TickResult> {
        let _guard = self.in_flight.try_lock().map_err(|_| SchedulerError::TickInProgress)?;
        Ok(self.execute_tick().await)
    }

    /// Main event loop. Fires every `tick_interval` until `shutdown`
    /// broadcasts `true`, then lets any in-flight tick finish before
    /// returning.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.tick_interval.as_secs(), "scheduler engine started");

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.in_flight.try_lock() {
                        Ok(_guard) => {
                            self.execute_tick().await;
                        }
                        Err(_) => {
                            warn!("previous tick still running, this tick dropped");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler shutting down, waiting for in-flight tick to finish");
                        let _guard = self.in_flight.lock().await;
                        break;
                    }
                }
            }
        }

        info!("scheduler engine stopped");
    }

    async fn execute_tick(&self) -> TickResult {
        let started_at = Utc::now().to_rfc3339();
        run_tick(
            &self.store,
            &self.source,
            &self.lm,
            &self.notifier,
            self.collector_batch_limit,
            self.processor_batch_limit,
            self.first_contact_window_days,
            started_at,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use leadscout_core::types::{ChannelFilter, ChannelKind, UnitScore};
    use leadscout_llm::fake::FakeLmClient;
    use leadscout_source::fake::FakeSource;
    use leadscout_store::Store;

    use super::*;

    fn build_engine(store: Arc<Store>) -> Arc<SchedulerEngine> {
        let source: Arc<dyn Source> = Arc::new(FakeSource::new());
        let lm: Arc<dyn LmClient> = Arc::new(FakeLmClient::new());
        let notifier = Arc::new(Notifier::new(
            store.clone(),
            "http://localhost:0".to_string(),
            "noreply@leadscout.test".to_string(),
        ));
        SchedulerEngine::new(store, source, lm, notifier, 100, 100, 5, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn run_once_returns_aggregated_tick_result() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store.upsert_channel(1, None, None, ChannelKind::Broadcast).unwrap();
        let credential = store.insert_credential(&tenant.id, b"session".to_vec()).unwrap();
        store.insert_subscription(&tenant.id, &channel.id, &credential.id).unwrap();
        store
            .insert_rule(&tenant.id, "all", "matches all", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        let engine = build_engine(store);
        let result = engine.run_once().await;

        assert_eq!(result.channels_processed, 1);
        assert_eq!(result.tenants_processed, 1);
    }

    #[tokio::test]
    async fn try_run_once_fails_while_another_tick_holds_the_guard() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = build_engine(store);

        let guard = engine.in_flight.lock().await;
        let outcome = engine.try_run_once().await;
        drop(guard);

        assert!(matches!(outcome, Err(SchedulerError::TickInProgress)));
    }
}
