//! The two-stage incremental ingestion-and-classification engine: the
//! Global Collector (C4) and Rule Processor (C5), combined into one tick.

pub mod collector;
pub mod error;
pub mod processor;
pub mod tick;

pub use collector::{run_collector, CollectorOutcome};
pub use error::{EngineError, Result};
pub use processor::{run_processor, update_rule_prompt, ProcessorOutcome};
pub use tick::{run_tick, TickResult};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use leadscout_core::types::{ChannelFilter, ChannelKind, UnitScore};
    use leadscout_llm::fake::FakeLmClient;
    use leadscout_notify::Notifier;
    use leadscout_source::fake::FakeSource;
    use leadscout_source::types::PlatformMessage;
    use leadscout_store::Store;

    use crate::{run_collector, run_processor, update_rule_prompt};

    fn rfc3339_days_ago(days: i64) -> String {
        (Utc::now() - Duration::days(days)).to_rfc3339()
    }

    fn message(external_id: i64, text: &str, days_ago: i64) -> PlatformMessage {
        PlatformMessage {
            external_id,
            text: text.to_string(),
            author_external_id: None,
            author_handle: None,
            media_kind: None,
            sent_at: rfc3339_days_ago(days_ago),
        }
    }

    fn notifier(store: Arc<Store>) -> Notifier {
        Notifier::new(store, "http://localhost:0".to_string(), "noreply@leadscout.test".to_string())
    }

    /// S1 (first contact): 3 messages at t0-1d, t0-3d, t0-10d; rule matches
    /// all with threshold 0.0. After one tick: 2 leads (within the 5-day
    /// window), the t0-10d message is not leaded.
    #[tokio::test]
    async fn s1_first_contact_bounds_backfill_to_window() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let source = FakeSource::new();
        let lm = FakeLmClient::new();

        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store.upsert_channel(1, None, Some("Channel"), ChannelKind::Broadcast).unwrap();
        let credential = store.insert_credential(&tenant.id, b"session".to_vec()).unwrap();
        store.insert_subscription(&tenant.id, &channel.id, &credential.id).unwrap();
        store
            .insert_rule(&tenant.id, "all", "matches all", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        source.seed(
            1,
            vec![
                message(1, "one day old", 1),
                message(2, "three days old", 3),
                message(3, "ten days old", 10),
            ],
        );

        let collector_outcome = run_collector(&store, &source, 100).await;
        assert_eq!(collector_outcome.messages_collected, 3);
        assert!(collector_outcome.errors.is_empty());

        let n = notifier(store.clone());
        let processor_outcome = run_processor(&store, &lm, &n, 100, 5).await;

        assert_eq!(processor_outcome.leads_created, 2);
        assert!(processor_outcome.errors.is_empty());
    }

    /// S2 (incremental): following S1, a new message arrives; after the next
    /// tick exactly one new lead is created and existing leads are retained.
    #[tokio::test]
    async fn s2_incremental_tick_only_leads_the_new_message() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let source = FakeSource::new();
        let lm = FakeLmClient::new();
        let n = notifier(store.clone());

        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store.upsert_channel(1, None, None, ChannelKind::Broadcast).unwrap();
        let credential = store.insert_credential(&tenant.id, b"session".to_vec()).unwrap();
        store.insert_subscription(&tenant.id, &channel.id, &credential.id).unwrap();
        let rule = store
            .insert_rule(&tenant.id, "all", "matches all", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        source.seed(1, vec![message(1, "first", 1)]);
        run_collector(&store, &source, 100).await;
        let first_tick = run_processor(&store, &lm, &n, 100, 5).await;
        assert_eq!(first_tick.leads_created, 1);

        source.seed(1, vec![message(2, "second", 0)]);
        run_collector(&store, &source, 100).await;
        let second_tick = run_processor(&store, &lm, &n, 100, 5).await;

        assert_eq!(second_tick.leads_created, 1);
        let (progress, _) = store.get_or_create_progress(&rule.id, &channel.id).unwrap();
        assert_eq!(progress.messages_analyzed, 2);
    }

    /// S3 (policy change): after raising the threshold to 1.0, no new leads
    /// are created but progress resets to the first-contact window; earlier
    /// leads are retained.
    #[tokio::test]
    async fn s3_policy_change_resets_progress_without_deleting_leads() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let source = FakeSource::new();
        let lm = FakeLmClient::new();
        let n = notifier(store.clone());

        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store.upsert_channel(1, None, None, ChannelKind::Broadcast).unwrap();
        let credential = store.insert_credential(&tenant.id, b"session".to_vec()).unwrap();
        store.insert_subscription(&tenant.id, &channel.id, &credential.id).unwrap();
        let rule = store
            .insert_rule(&tenant.id, "all", "matches all", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        source.seed(1, vec![message(1, "one day old", 1)]);
        run_collector(&store, &source, 100).await;
        let first_tick = run_processor(&store, &lm, &n, 100, 5).await;
        assert_eq!(first_tick.leads_created, 1);

        update_rule_prompt(&store, &lm, &rule.id, "matches all", UnitScore::new(1.0)).await.unwrap();

        let second_tick = run_processor(&store, &lm, &n, 100, 5).await;
        assert_eq!(second_tick.leads_created, 0);

        let (progress, _) = store.get_or_create_progress(&rule.id, &channel.id).unwrap();
        assert_eq!(progress.messages_analyzed, 1);
    }

    /// S4 (dedup across tenants): two tenants subscribe to the same channel
    /// with matching rules; the message is stored once, but each tenant
    /// gets its own lead.
    #[tokio::test]
    async fn s4_shared_channel_dedupes_messages_but_not_leads() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let source = FakeSource::new();
        let lm = FakeLmClient::new();
        let n = notifier(store.clone());

        let channel = store.upsert_channel(1, None, None, ChannelKind::Broadcast).unwrap();

        let tenant_a = store.insert_tenant("A", "free").unwrap();
        let credential_a = store.insert_credential(&tenant_a.id, b"session-a".to_vec()).unwrap();
        store.insert_subscription(&tenant_a.id, &channel.id, &credential_a.id).unwrap();
        store
            .insert_rule(&tenant_a.id, "all", "matches all", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        let tenant_b = store.insert_tenant("B", "free").unwrap();
        let credential_b = store.insert_credential(&tenant_b.id, b"session-b".to_vec()).unwrap();
        store.insert_subscription(&tenant_b.id, &channel.id, &credential_b.id).unwrap();
        store
            .insert_rule(&tenant_b.id, "all", "matches all", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        source.seed(1, vec![message(1, "shared", 0)]);

        let collector_outcome = run_collector(&store, &source, 100).await;
        assert_eq!(collector_outcome.messages_collected, 1);

        let processor_outcome = run_processor(&store, &lm, &n, 100, 5).await;
        assert_eq!(processor_outcome.leads_created, 2);
    }

    /// S5 (LM transient failure): classifier fails, cursor does not advance;
    /// once it succeeds the lead is written and progress advances.
    #[tokio::test]
    async fn s5_lm_failure_does_not_advance_cursor() {
        struct FlakyLmClient {
            inner: FakeLmClient,
            fail_once: std::sync::atomic::AtomicBool,
        }

        #[async_trait::async_trait]
        impl leadscout_llm::LmClient for FlakyLmClient {
            async fn classify(
                &self,
                message_text: &str,
                rule_prompt: &str,
            ) -> leadscout_llm::Result<leadscout_llm::types::ClassifyResult> {
                if self.fail_once.swap(false, std::sync::atomic::Ordering::SeqCst) {
                    return Err(leadscout_llm::LmError::Timeout { ms: 1000 });
                }
                self.inner.classify(message_text, rule_prompt).await
            }

            async fn extract(&self, message_text: &str) -> leadscout_llm::Result<leadscout_llm::types::ExtractResult> {
                self.inner.extract(message_text).await
            }
        }

        let store = Arc::new(Store::open_in_memory().unwrap());
        let source = FakeSource::new();
        let lm = FlakyLmClient {
            inner: FakeLmClient::new(),
            fail_once: std::sync::atomic::AtomicBool::new(true),
        };
        let n = notifier(store.clone());

        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store.upsert_channel(1, None, None, ChannelKind::Broadcast).unwrap();
        let credential = store.insert_credential(&tenant.id, b"session".to_vec()).unwrap();
        store.insert_subscription(&tenant.id, &channel.id, &credential.id).unwrap();
        let rule = store
            .insert_rule(&tenant.id, "all", "matches all", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        source.seed(1, vec![message(1, "will fail then succeed", 0)]);
        run_collector(&store, &source, 100).await;

        let first_tick = run_processor(&store, &lm, &n, 100, 5).await;
        assert_eq!(first_tick.leads_created, 0);
        assert!(!first_tick.errors.is_empty());
        let (progress_after_failure, _) = store.get_or_create_progress(&rule.id, &channel.id).unwrap();
        assert_eq!(progress_after_failure.messages_analyzed, 0);

        let second_tick = run_processor(&store, &lm, &n, 100, 5).await;
        assert_eq!(second_tick.leads_created, 1);
        let (progress_after_success, _) = store.get_or_create_progress(&rule.id, &channel.id).unwrap();
        assert_eq!(progress_after_success.messages_analyzed, 1);
    }

    /// S6 (concurrent ticks): two collector runs over the same backlog never
    /// duplicate a message, thanks to the Store's unique constraint.
    #[tokio::test]
    async fn s6_concurrent_collection_does_not_duplicate_messages() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let source = Arc::new(FakeSource::new());

        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store.upsert_channel(1, None, None, ChannelKind::Broadcast).unwrap();
        let credential = store.insert_credential(&tenant.id, b"session".to_vec()).unwrap();
        store.insert_subscription(&tenant.id, &channel.id, &credential.id).unwrap();

        source.seed(1, vec![message(1, "a", 0), message(2, "b", 0), message(3, "c", 0)]);

        let (a, b) = tokio::join!(
            run_collector(&store, source.as_ref(), 100),
            run_collector(&store, source.as_ref(), 100),
        );

        let total_collected = a.messages_collected + b.messages_collected;
        assert_eq!(total_collected, 3);
        assert_eq!(store.highest_external_message_id(&channel.id).unwrap(), 3);
    }
}
