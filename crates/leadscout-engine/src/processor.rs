use std::collections::HashSet;

use chrono::{Duration, Utc};
use tracing::{error, warn};

use leadscout_core::types::{ChannelId, LeadId, RuleId, UnitScore};
use leadscout_llm::types::ExtractResult;
use leadscout_llm::LmClient;
use leadscout_notify::{LeadContext, Notifier};
use leadscout_store::models::{ExtractedEntities, GlobalMessage, Rule};
use leadscout_store::{Store, StoreError};

/// Outcome of one processor phase, folded into the tick's aggregated result.
#[derive(Debug, Default)]
pub struct ProcessorOutcome {
    pub tenants_processed: u32,
    pub messages_analyzed: u32,
    pub leads_created: u32,
    pub new_lead_ids: Vec<LeadId>,
    pub errors: Vec<String>,
}

/// Rule Processor (C5, §4.5): for every tenant, every active rule, every
/// eligible channel, stream unseen messages in time order, classify, and
/// idempotently materialize leads while advancing the resumable cursor.
pub async fn run_processor(
    store: &Store,
    lm: &dyn LmClient,
    notifier: &Notifier,
    limit: u32,
    first_contact_window_days: i64,
) -> ProcessorOutcome {
    let mut outcome = ProcessorOutcome::default();

    let tenants = match store.list_active_tenants() {
        Ok(tenants) => tenants,
        Err(e) => {
            outcome.errors.push(format!("failed to list tenants: {e}"));
            return outcome;
        }
    };

    for tenant in tenants {
        outcome.tenants_processed += 1;

        let subscriptions = match store.list_active_subscriptions(&tenant.id) {
            Ok(subs) => subs,
            Err(e) => {
                outcome.errors.push(format!("tenant {}: failed to list subscriptions: {e}", tenant.id));
                continue;
            }
        };
        let subscribed: HashSet<ChannelId> = subscriptions.iter().map(|s| s.channel_id.clone()).collect();

        let rules = match store.list_active_rules(&tenant.id) {
            Ok(rules) => rules,
            Err(e) => {
                outcome.errors.push(format!("tenant {}: failed to list rules: {e}", tenant.id));
                continue;
            }
        };

        for rule in &rules {
            let targets: HashSet<ChannelId> = if rule.channel_filter.is_all() {
                subscribed.clone()
            } else {
                rule.channel_filter.0.iter().cloned().collect::<HashSet<_>>()
            };
            let eligible_channels: Vec<ChannelId> = targets.intersection(&subscribed).cloned().collect();

            for channel_id in eligible_channels {
                process_rule_channel(
                    store,
                    lm,
                    notifier,
                    &tenant.id,
                    rule,
                    &channel_id,
                    limit,
                    first_contact_window_days,
                    &mut outcome,
                )
                .await;
            }
        }
    }

    outcome
}

#[allow(clippy::too_many_arguments)]
async fn process_rule_channel(
    store: &Store,
    lm: &dyn LmClient,
    notifier: &Notifier,
    tenant_id: &leadscout_core::types::TenantId,
    rule: &Rule,
    channel_id: &ChannelId,
    limit: u32,
    first_contact_window_days: i64,
    outcome: &mut ProcessorOutcome,
) {
    let (progress, is_new) = match store.get_or_create_progress(&rule.id, channel_id) {
        Ok(result) => result,
        Err(e) => {
            outcome.errors.push(format!("rule {}: channel {}: failed to load progress: {e}", rule.id, channel_id));
            return;
        }
    };

    let window: Vec<GlobalMessage> = if is_new {
        let since = (Utc::now() - Duration::days(first_contact_window_days)).to_rfc3339();
        match store.messages_since(channel_id, &since, limit) {
            Ok(messages) => messages,
            Err(e) => {
                outcome.errors.push(format!("rule {}: channel {}: failed to read first-contact window: {e}", rule.id, channel_id));
                return;
            }
        }
    } else {
        let after = progress.last_analyzed_sent_at.as_deref().unwrap_or("0000-01-01T00:00:00Z");
        match store.messages_after(channel_id, after, limit) {
            Ok(messages) => messages,
            Err(e) => {
                outcome.errors.push(format!("rule {}: channel {}: failed to read unseen window: {e}", rule.id, channel_id));
                return;
            }
        }
    };

    for message in window {
        match store.lead_exists(tenant_id, &message.id, &rule.id) {
            Ok(true) => {
                advance(store, &progress.id, &message, false, outcome);
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                outcome.errors.push(format!("rule {}: message {}: failed to check lead existence: {e}", rule.id, message.id));
                return;
            }
        }

        if message.text.is_empty() {
            advance(store, &progress.id, &message, false, outcome);
            continue;
        }

        let classification = match lm.classify(&message.text, &rule.prompt).await {
            Ok(result) => result,
            Err(e) => {
                // Cursor is not advanced past this message — retried next tick (§4.5, §7).
                warn!(rule = %rule.id, message = %message.id, error = %e, "LM call failed, will retry next tick");
                outcome.errors.push(format!("rule {}: message {}: LM call failed: {e}", rule.id, message.id));
                return;
            }
        };

        let mut lead_created = false;

        if classification.is_match && classification.confidence.get() >= rule.threshold.get() {
            let entities = match lm.extract(&message.text).await {
                Ok(result) => to_store_entities(result),
                Err(e) => {
                    warn!(rule = %rule.id, message = %message.id, error = %e, "extraction failed, falling back to truncated summary");
                    to_store_entities(ExtractResult::fallback_summary(&message.text))
                }
            };

            match store.insert_lead(
                tenant_id,
                &message.id,
                &rule.id,
                classification.confidence,
                &classification.reason,
                &entities,
            ) {
                Ok(Some(lead)) => {
                    lead_created = true;
                    outcome.leads_created += 1;
                    outcome.new_lead_ids.push(lead.id.clone());
                    dispatch_notification(store, notifier, tenant_id, &lead, rule, channel_id, &message).await;
                }
                Ok(None) => {
                    // Unique-violation swallowed: a concurrent tick already created this lead.
                }
                Err(e) => {
                    error!(rule = %rule.id, message = %message.id, error = %e, "failed to persist lead");
                    outcome.errors.push(format!("rule {}: message {}: failed to persist lead: {e}", rule.id, message.id));
                    return;
                }
            }
        }

        outcome.messages_analyzed += 1;
        advance(store, &progress.id, &message, lead_created, outcome);
    }
}

fn advance(
    store: &Store,
    progress_id: &leadscout_core::types::ProgressId,
    message: &GlobalMessage,
    lead_created: bool,
    outcome: &mut ProcessorOutcome,
) {
    if let Err(e) = store.advance_progress(progress_id, &message.id, &message.sent_at, lead_created) {
        outcome.errors.push(format!("progress {progress_id}: failed to advance cursor: {e}"));
    }
}

async fn dispatch_notification(
    store: &Store,
    notifier: &Notifier,
    tenant_id: &leadscout_core::types::TenantId,
    lead: &leadscout_store::models::Lead,
    rule: &Rule,
    channel_id: &ChannelId,
    message: &GlobalMessage,
) {
    let source_title = match store.get_channel(channel_id) {
        Ok(channel) => channel.title.unwrap_or_else(|| "Unknown channel".to_string()),
        Err(_) => "Unknown channel".to_string(),
    };

    let users = match store.list_tenant_users(tenant_id) {
        Ok(users) => users,
        Err(e) => {
            warn!(tenant = %tenant_id, error = %e, "failed to load tenant users for notification");
            return;
        }
    };

    // The original system notifies whichever tenant user is found first,
    // not the whole tenant roster; preserved here rather than fanning out.
    let Some(recipient) = users.into_iter().next() else {
        warn!(tenant = %tenant_id, lead = %lead.id, "no user found for tenant, notification not sent");
        return;
    };

    let ctx = LeadContext {
        rule_name: rule.name.clone(),
        source_title,
        message_preview: message.text.clone(),
        lead_url: format!("/dashboard/leads?lead_id={}", lead.id),
        message_link: String::new(),
        score: lead.score.get(),
    };

    if let Err(e) = notifier.notify_lead_created(lead, &recipient, &ctx).await {
        warn!(lead = %lead.id, error = %e, "failed to dispatch lead-created notification");
    }
}

/// Update a rule's prompt/threshold and invalidate the LM client's cached
/// classify entries for the old prompt, since they are keyed on it and would
/// otherwise serve stale verdicts until their TTL expires (§4.2, §4.5).
pub async fn update_rule_prompt(
    store: &Store,
    lm: &dyn LmClient,
    rule_id: &RuleId,
    new_prompt: &str,
    new_threshold: UnitScore,
) -> Result<(), StoreError> {
    let old_prompt = store.get_rule(rule_id)?.map(|rule| rule.prompt);

    store.update_rule_policy(rule_id, new_prompt, new_threshold)?;

    if let Some(old_prompt) = old_prompt {
        if old_prompt != new_prompt {
            lm.invalidate_rule_prompt(&old_prompt);
        }
    }

    Ok(())
}

fn to_store_entities(result: ExtractResult) -> ExtractedEntities {
    ExtractedEntities {
        contacts: result.contacts,
        keywords: result.keywords,
        budget: result.budget,
        deadline: result.deadline,
        summary: result.summary,
        extra: result.extra,
    }
}
