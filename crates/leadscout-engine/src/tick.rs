use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use leadscout_core::types::LeadId;
use leadscout_llm::LmClient;
use leadscout_notify::Notifier;
use leadscout_source::Source;
use leadscout_store::Store;

use crate::collector;
use crate::processor;

/// Aggregated outcome of one scheduler tick (§4.7, §6). Errors are
/// surfaced here, never as panics or propagated exceptions — a tick's
/// success criterion is "ran to completion" (§7).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickResult {
    pub channels_processed: u32,
    pub global_messages_collected: u32,
    pub tenants_processed: u32,
    pub messages_analyzed: u32,
    pub leads_created: u32,
    pub new_lead_ids: Vec<LeadId>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    pub started_at: String,
}

/// Run one full tick: collector phase to completion, then the processor
/// phase across every tenant (§2, §5 — no cross-phase parallelism).
pub async fn run_tick(
    store: &Arc<Store>,
    source: &Arc<dyn Source>,
    lm: &Arc<dyn LmClient>,
    notifier: &Arc<Notifier>,
    collector_batch_limit: u32,
    processor_batch_limit: u32,
    first_contact_window_days: i64,
    started_at: String,
) -> TickResult {
    let start = Instant::now();
    let mut result = TickResult {
        started_at,
        ..Default::default()
    };

    let collector_outcome = collector::run_collector(store, source.as_ref(), collector_batch_limit).await;
    result.channels_processed = collector_outcome.channels_processed;
    result.global_messages_collected = collector_outcome.messages_collected;
    result.errors.extend(collector_outcome.errors);

    let processor_outcome = processor::run_processor(
        store,
        lm.as_ref(),
        notifier.as_ref(),
        processor_batch_limit,
        first_contact_window_days,
    )
    .await;
    result.tenants_processed = processor_outcome.tenants_processed;
    result.messages_analyzed = processor_outcome.messages_analyzed;
    result.leads_created = processor_outcome.leads_created;
    result.new_lead_ids = processor_outcome.new_lead_ids;
    result.errors.extend(processor_outcome.errors);

    result.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        channels = result.channels_processed,
        messages_collected = result.global_messages_collected,
        tenants = result.tenants_processed,
        messages_analyzed = result.messages_analyzed,
        leads_created = result.leads_created,
        errors = result.errors.len(),
        duration_ms = result.duration_ms,
        "tick complete"
    );

    result
}
