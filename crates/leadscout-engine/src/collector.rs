use tracing::{error, warn};

use leadscout_core::types::CredentialStatus;
use leadscout_source::types::{ChannelRef, SessionMaterial};
use leadscout_source::Source;
use leadscout_store::Store;

/// Outcome of one collector phase, folded into the tick's aggregated result.
#[derive(Debug, Default)]
pub struct CollectorOutcome {
    pub channels_processed: u32,
    pub messages_collected: u32,
    pub errors: Vec<String>,
}

/// Global Collector (C4, §4.4): for each active channel, pull new messages
/// past the channel's ingestion watermark and persist them deduplicated.
pub async fn run_collector(store: &Store, source: &dyn Source, limit: u32) -> CollectorOutcome {
    let mut outcome = CollectorOutcome::default();

    let channels = match store.list_active_channels() {
        Ok(channels) => channels,
        Err(e) => {
            outcome.errors.push(format!("failed to list active channels: {e}"));
            return outcome;
        }
    };

    for channel in channels {
        outcome.channels_processed += 1;

        let credential = match store.any_active_credential() {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                outcome.errors.push(format!("channel {}: no active chat-platform credential available", channel.id));
                continue;
            }
            Err(e) => {
                outcome.errors.push(format!("channel {}: failed to select a credential: {e}", channel.id));
                continue;
            }
        };

        let session = SessionMaterial(credential.session_blob.clone());

        let watermark = match store.highest_external_message_id(&channel.id) {
            Ok(watermark) => watermark,
            Err(e) => {
                outcome.errors.push(format!("channel {}: failed to read watermark: {e}", channel.id));
                continue;
            }
        };

        let channel_ref = ChannelRef { external_id: channel.external_id };

        let messages = match source.fetch_new(&channel_ref, &session, limit, watermark).await {
            Ok(messages) => messages,
            Err(e) if e.is_permanent() => {
                warn!(channel = %channel.id, error = %e, "credential rejected, marking for reauth");
                if let Err(store_err) = store.set_credential_status(&credential.id, CredentialStatus::NeedsReauth) {
                    outcome.errors.push(format!("failed to mark credential needs-reauth: {store_err}"));
                }
                outcome.errors.push(format!("channel {}: {e}", channel.id));
                continue;
            }
            Err(e) => {
                warn!(channel = %channel.id, error = %e, "transient fetch failure, will retry next tick");
                outcome.errors.push(format!("channel {}: {e}", channel.id));
                continue;
            }
        };

        let mut new_max = watermark;
        for message in &messages {
            match store.insert_message_if_new(
                &channel.id,
                message.external_id,
                &message.text,
                message.author_external_id,
                message.author_handle.as_deref(),
                message.media_kind.as_deref(),
                &message.sent_at,
            ) {
                Ok(true) => {
                    outcome.messages_collected += 1;
                    new_max = new_max.max(message.external_id);
                }
                Ok(false) => {
                    // Benign race: another tick already holds this (channel, external id).
                    new_max = new_max.max(message.external_id);
                }
                Err(e) => {
                    error!(channel = %channel.id, external_id = message.external_id, error = %e, "failed to persist message");
                    outcome.errors.push(format!("channel {}: message {}: {e}", channel.id, message.external_id));
                }
            }
        }

        let recorded_max = if new_max > watermark { Some(new_max) } else { None };
        if let Err(e) = store.record_collection(&channel.id, recorded_max) {
            outcome.errors.push(format!("channel {}: failed to record collection: {e}", channel.id));
        }
    }

    outcome
}
