use std::sync::Arc;

use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use leadscout_core::types::{LeadId, NotificationEventKind};
use leadscout_store::models::{Lead, User};
use leadscout_store::Store;

use crate::error::Result;
use crate::types::LeadContext;

/// Fan-out of lead events to in-app rows, email, and bot push, gated by
/// per-user preferences (C6, §4.6).
///
/// Every send path is best-effort: a failure is logged and swallowed so one
/// broken channel (an unreachable SMTP relay, say) never rolls back the
/// in-app row or blocks the tick.
pub struct Notifier {
    store: Arc<Store>,
    http: reqwest::Client,
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    smtp_from: String,
    backend_internal_url: String,
}

impl Notifier {
    pub fn new(store: Arc<Store>, backend_internal_url: String, smtp_from: String) -> Self {
        Self {
            store,
            http: reqwest::Client::new(),
            mailer: None,
            smtp_from,
            backend_internal_url,
        }
    }

    /// Configure SMTP delivery. Left unconfigured (`mailer: None`) the
    /// Notifier simply skips the email leg, which is the right behavior for
    /// test/dev environments without a relay.
    pub fn with_smtp(
        mut self,
        host: &str,
        port: u16,
        user: String,
        password: String,
    ) -> std::result::Result<Self, lettre::transport::smtp::Error> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(user, password))
            .build();
        self.mailer = Some(transport);
        Ok(self)
    }

    pub async fn notify_lead_created(&self, lead: &Lead, recipient: &User, ctx: &LeadContext) -> Result<()> {
        if !recipient.notify_on_new_lead {
            return Ok(());
        }

        let title = format!("New Lead Found: {}", ctx.rule_name);
        let body = format!(
            "A new lead matching rule '{}' was found in {} with {:.0}% confidence.",
            ctx.rule_name,
            ctx.source_title,
            ctx.score * 100.0
        );

        self.dispatch(lead, recipient, NotificationEventKind::LeadCreated, &title, &body, ctx)
            .await;
        Ok(())
    }

    pub async fn notify_lead_status_changed(
        &self,
        lead: &Lead,
        recipient: &User,
        old_status: &str,
        new_status: &str,
        ctx: &LeadContext,
    ) -> Result<()> {
        if !recipient.notify_on_lead_status_change {
            return Ok(());
        }

        let title = format!("Lead Status Changed: {old_status} → {new_status}");
        let body = format!("The status of lead '{}' changed from {old_status} to {new_status}.", ctx.rule_name);

        self.dispatch(lead, recipient, NotificationEventKind::LeadStatusChanged, &title, &body, ctx)
            .await;
        Ok(())
    }

    pub async fn notify_lead_assigned(&self, lead: &Lead, assignee: &User, ctx: &LeadContext) -> Result<()> {
        if !assignee.notify_on_lead_assignment {
            return Ok(());
        }

        let title = format!("Lead Assigned to You: {}", ctx.rule_name);
        let body = format!("A lead from {} has been assigned to you.", ctx.source_title);

        self.dispatch(lead, assignee, NotificationEventKind::LeadAssigned, &title, &body, ctx)
            .await;
        Ok(())
    }

    async fn dispatch(
        &self,
        lead: &Lead,
        recipient: &User,
        kind: NotificationEventKind,
        title: &str,
        body: &str,
        ctx: &LeadContext,
    ) {
        if recipient.in_app_notifications_enabled {
            if let Err(e) = self.store.insert_notification(&recipient.id, kind, Some(&lead.id), title, body) {
                warn!(user = %recipient.id, error = %e, "failed to write in-app notification");
            }
        }

        if recipient.email_notifications_enabled {
            self.send_email(recipient, title, body).await;
        }

        if recipient.bot_push_enabled {
            if let Some(chat_id) = &recipient.bot_push_chat_id {
                self.send_bot_push(chat_id, &lead.id, ctx).await;
            }
        }
    }

    async fn send_email(&self, recipient: &User, title: &str, body: &str) {
        let Some(mailer) = &self.mailer else {
            return;
        };

        let message = match Message::builder()
            .from(self.smtp_from.parse().unwrap_or_else(|_| "noreply@localhost".parse().unwrap()))
            .to(match recipient.email.parse() {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(email = %recipient.email, error = %e, "invalid recipient email, skipping");
                    return;
                }
            })
            .subject(title)
            .body(body.to_string())
        {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "failed to build notification email");
                return;
            }
        };

        match mailer.send(message).await {
            Ok(_) => info!(email = %recipient.email, "sent lead notification email"),
            Err(e) => warn!(email = %recipient.email, error = %e, "failed to send notification email"),
        }
    }

    async fn send_bot_push(&self, chat_id: &str, lead_id: &LeadId, ctx: &LeadContext) {
        let chat_id: i64 = match chat_id.parse() {
            Ok(id) => id,
            Err(e) => {
                warn!(lead_id = %lead_id, chat_id, error = %e, "bot_push_chat_id is not a valid chat id, skipping push");
                return;
            }
        };

        let url = format!("{}/internal/telegram/send-notification", self.backend_internal_url);

        let body = serde_json::json!({
            "chat_id": chat_id,
            "lead_id": lead_id.as_str(),
            "rule_name": ctx.rule_name,
            "source_title": ctx.source_title,
            "message_preview": ctx.message_preview,
            "lead_url": ctx.lead_url,
            "score": ctx.score,
            "message_link": ctx.message_link,
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(lead_id = %lead_id, "sent bot push notification")
            }
            Ok(resp) => warn!(lead_id = %lead_id, status = %resp.status(), "bot push endpoint returned an error"),
            Err(e) => warn!(lead_id = %lead_id, error = %e, "failed to reach bot push endpoint"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use leadscout_core::types::{ChannelFilter, ChannelKind, UnitScore};
    use leadscout_store::models::ExtractedEntities;
    use leadscout_store::Store;

    use super::*;

    fn build_lead(store: &Store) -> (leadscout_store::models::Lead, User) {
        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let user = store.insert_user(&tenant.id, "owner@acme.test", "Owner").unwrap();
        let channel = store.upsert_channel(1, None, Some("Channel"), ChannelKind::Broadcast).unwrap();
        store.insert_message_if_new(&channel.id, 1, "hello", None, None, None, "2026-01-01T00:00:00Z").unwrap();
        let message = store.messages_since(&channel.id, "2020-01-01T00:00:00Z", 10).unwrap().remove(0);
        let rule = store
            .insert_rule(&tenant.id, "all", "matches all", UnitScore::new(0.5), ChannelFilter::all())
            .unwrap();
        let lead = store
            .insert_lead(&tenant.id, &message.id, &rule.id, UnitScore::new(0.9), "matched", &ExtractedEntities::default())
            .unwrap()
            .unwrap();
        (lead, user)
    }

    fn ctx() -> LeadContext {
        LeadContext {
            rule_name: "all".to_string(),
            source_title: "Channel".to_string(),
            message_preview: "hello".to_string(),
            lead_url: "/dashboard/leads?lead_id=x".to_string(),
            message_link: String::new(),
            score: 0.9,
        }
    }

    #[tokio::test]
    async fn in_app_row_written_when_preference_and_event_toggle_are_both_on() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (lead, user) = build_lead(&store);
        let notifier = Notifier::new(store.clone(), "http://localhost:0".to_string(), "noreply@test".to_string());

        notifier.notify_lead_created(&lead, &user, &ctx()).await.unwrap();

        let rows = store.list_notifications_for_user(&user.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].related_lead_id.as_ref(), Some(&lead.id));
    }

    #[tokio::test]
    async fn no_row_written_when_event_toggle_is_off() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (lead, mut user) = build_lead(&store);
        user.notify_on_new_lead = false;
        let notifier = Notifier::new(store.clone(), "http://localhost:0".to_string(), "noreply@test".to_string());

        notifier.notify_lead_created(&lead, &user, &ctx()).await.unwrap();

        let rows = store.list_notifications_for_user(&user.id).unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn no_row_written_when_in_app_channel_is_disabled_even_if_event_toggle_is_on() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (lead, mut user) = build_lead(&store);
        user.in_app_notifications_enabled = false;
        let notifier = Notifier::new(store.clone(), "http://localhost:0".to_string(), "noreply@test".to_string());

        notifier.notify_lead_created(&lead, &user, &ctx()).await.unwrap();

        let rows = store.list_notifications_for_user(&user.id).unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn status_changed_and_assigned_use_their_own_toggle() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (lead, mut user) = build_lead(&store);
        user.notify_on_lead_status_change = false;
        let notifier = Notifier::new(store.clone(), "http://localhost:0".to_string(), "noreply@test".to_string());

        notifier.notify_lead_status_changed(&lead, &user, "new", "in_progress", &ctx()).await.unwrap();
        assert!(store.list_notifications_for_user(&user.id).unwrap().is_empty());

        notifier.notify_lead_assigned(&lead, &user, &ctx()).await.unwrap();
        assert_eq!(store.list_notifications_for_user(&user.id).unwrap().len(), 1);
    }
}
