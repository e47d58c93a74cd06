use std::str::FromStr;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use leadscout_core::types::{
    ChannelFilter, ChannelId, ChannelKind, CredentialId, CredentialStatus, LeadId, LeadStatus,
    MessageId, NotificationEventKind, NotificationId, ProgressId, RuleId, SubscriptionId, TenantId,
    UnitScore, UserId,
};

use crate::error::{is_unique_violation, Result, StoreError};
use crate::models::{
    ChannelSubscription, ChatPlatformCredential, ExtractedEntities, GlobalChannel, GlobalMessage,
    Lead, Notification, Rule, RuleAnalysisProgress, Tenant, User,
};
use crate::schema;

/// Thread-safe handle over the engine's SQLite connection.
///
/// All multi-statement operations (the collector's batch insert, the
/// processor's classify-then-advance step) take the lock for their whole
/// duration rather than per-statement, since SQLite only allows one writer
/// at a time anyway — holding the lock longer costs nothing extra and keeps
/// each logical operation atomic from the caller's point of view.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(database_url: &str) -> Result<Self> {
        let conn = Connection::open(database_url)?;
        schema::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }

    /// Confirms the connection is live by running a trivial query. Used by
    /// the HTTP health endpoint.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ── Tenants ──────────────────────────────────────────────────────────

    pub fn list_active_tenants(&self) -> Result<Vec<Tenant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, plan, deleted_at, created_at, updated_at
             FROM tenants WHERE deleted_at IS NULL",
        )?;
        let rows = stmt
            .query_map([], row_to_tenant)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn insert_tenant(&self, name: &str, plan: &str) -> Result<Tenant> {
        let conn = self.conn.lock().unwrap();
        let id = TenantId::new();
        let now = Self::now();
        conn.execute(
            "INSERT INTO tenants (id, name, plan, deleted_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?4)",
            params![id.as_str(), name, plan, now],
        )?;
        Ok(Tenant {
            id,
            name: name.to_string(),
            plan: plan.to_string(),
            deleted_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    // ── Users ────────────────────────────────────────────────────────────

    pub fn get_user(&self, user_id: &UserId) -> Result<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, tenant_id, email, full_name, in_app_notifications_enabled,
                    email_notifications_enabled, bot_push_enabled, bot_push_chat_id,
                    notify_on_new_lead, notify_on_lead_status_change, notify_on_lead_assignment,
                    created_at, updated_at
             FROM users WHERE id = ?1",
            params![user_id.as_str()],
            row_to_user,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))
    }

    pub fn list_tenant_users(&self, tenant_id: &TenantId) -> Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, email, full_name, in_app_notifications_enabled,
                    email_notifications_enabled, bot_push_enabled, bot_push_chat_id,
                    notify_on_new_lead, notify_on_lead_status_change, notify_on_lead_assignment,
                    created_at, updated_at
             FROM users WHERE tenant_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![tenant_id.as_str()], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn insert_user(&self, tenant_id: &TenantId, email: &str, full_name: &str) -> Result<User> {
        let conn = self.conn.lock().unwrap();
        let id = UserId::new();
        let now = Self::now();
        conn.execute(
            "INSERT INTO users (id, tenant_id, email, full_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id.as_str(), tenant_id.as_str(), email, full_name, now],
        )?;
        self.get_user(&id)
    }

    // ── Chat-Platform Credentials ────────────────────────────────────────

    pub fn insert_credential(
        &self,
        tenant_id: &TenantId,
        session_blob: Vec<u8>,
    ) -> Result<ChatPlatformCredential> {
        let conn = self.conn.lock().unwrap();
        let id = CredentialId::new();
        let now = Self::now();
        conn.execute(
            "INSERT INTO chat_platform_credentials (id, tenant_id, session_blob, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'active', ?4, ?4)",
            params![id.as_str(), tenant_id.as_str(), session_blob, now],
        )?;
        Ok(ChatPlatformCredential {
            id,
            tenant_id: tenant_id.clone(),
            session_blob,
            status: CredentialStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Any credential currently usable as a fetcher. The spec is
    /// intentionally loose about which one is picked (§4.4).
    pub fn any_active_credential(&self) -> Result<Option<ChatPlatformCredential>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, tenant_id, session_blob, status, created_at, updated_at
             FROM chat_platform_credentials WHERE status = 'active' LIMIT 1",
            [],
            row_to_credential,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn set_credential_status(
        &self,
        credential_id: &CredentialId,
        status: CredentialStatus,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE chat_platform_credentials SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_string(), Self::now(), credential_id.as_str()],
        )?;
        Ok(())
    }

    // ── Global Channels ──────────────────────────────────────────────────

    pub fn list_active_channels(&self) -> Result<Vec<GlobalChannel>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, external_id, external_handle, title, kind, active,
                    last_external_message_id, last_collected_at, created_at, updated_at
             FROM global_channels WHERE active = 1",
        )?;
        let rows = stmt
            .query_map([], row_to_channel)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_channel(&self, channel_id: &ChannelId) -> Result<GlobalChannel> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, external_id, external_handle, title, kind, active,
                    last_external_message_id, last_collected_at, created_at, updated_at
             FROM global_channels WHERE id = ?1",
            params![channel_id.as_str()],
            row_to_channel,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("channel {channel_id}")))
    }

    /// Get-or-create by external id, the unique key shared across the fleet.
    pub fn upsert_channel(
        &self,
        external_id: i64,
        external_handle: Option<&str>,
        title: Option<&str>,
        kind: ChannelKind,
    ) -> Result<GlobalChannel> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM global_channels WHERE external_id = ?1",
                params![external_id],
                |r| r.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => ChannelId::from(id),
            None => {
                let id = ChannelId::new();
                let now = Self::now();
                conn.execute(
                    "INSERT INTO global_channels
                        (id, external_id, external_handle, title, kind, active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                    params![id.as_str(), external_id, external_handle, title, kind.to_string(), now],
                )?;
                id
            }
        };
        drop(conn);
        self.get_channel(&id)
    }

    pub fn set_channel_active(&self, channel_id: &ChannelId, active: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE global_channels SET active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active as i64, Self::now(), channel_id.as_str()],
        )?;
        Ok(())
    }

    /// The true ingestion watermark: the highest external id actually
    /// stored, which supersedes the channel row's best-effort column (§4.4).
    pub fn highest_external_message_id(&self, channel_id: &ChannelId) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(external_message_id) FROM global_messages WHERE channel_id = ?1",
            params![channel_id.as_str()],
            |r| r.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    pub fn record_collection(
        &self,
        channel_id: &ChannelId,
        new_max_external_id: Option<i64>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        match new_max_external_id {
            Some(max_id) => conn.execute(
                "UPDATE global_channels
                 SET last_collected_at = ?1,
                     last_external_message_id = MAX(COALESCE(last_external_message_id, 0), ?2),
                     updated_at = ?1
                 WHERE id = ?3",
                params![Self::now(), max_id, channel_id.as_str()],
            )?,
            None => conn.execute(
                "UPDATE global_channels SET last_collected_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![Self::now(), channel_id.as_str()],
            )?,
        };
        Ok(())
    }

    // ── Channel Subscriptions ────────────────────────────────────────────

    pub fn list_active_subscriptions(&self, tenant_id: &TenantId) -> Result<Vec<ChannelSubscription>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, channel_id, credential_id, active, tags, created_at, updated_at
             FROM channel_subscriptions WHERE tenant_id = ?1 AND active = 1",
        )?;
        let rows = stmt
            .query_map(params![tenant_id.as_str()], row_to_subscription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn insert_subscription(
        &self,
        tenant_id: &TenantId,
        channel_id: &ChannelId,
        credential_id: &CredentialId,
    ) -> Result<ChannelSubscription> {
        let conn = self.conn.lock().unwrap();
        let id = SubscriptionId::new();
        let now = Self::now();
        conn.execute(
            "INSERT INTO channel_subscriptions
                (id, tenant_id, channel_id, credential_id, active, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, '[]', ?5, ?5)",
            params![id.as_str(), tenant_id.as_str(), channel_id.as_str(), credential_id.as_str(), now],
        )?;
        Ok(ChannelSubscription {
            id,
            tenant_id: tenant_id.clone(),
            channel_id: channel_id.clone(),
            credential_id: credential_id.clone(),
            active: true,
            tags: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    // ── Rules ────────────────────────────────────────────────────────────

    pub fn list_active_rules(&self, tenant_id: &TenantId) -> Result<Vec<Rule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, name, description, prompt, threshold, channel_filter,
                    active, created_at, updated_at
             FROM rules WHERE tenant_id = ?1 AND active = 1",
        )?;
        let rows = stmt
            .query_map(params![tenant_id.as_str()], row_to_rule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_rule(&self, rule_id: &RuleId) -> Result<Option<Rule>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, name, description, prompt, threshold, channel_filter,
                    active, created_at, updated_at
             FROM rules WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![rule_id.as_str()], row_to_rule)?;
        rows.next().transpose().map_err(Into::into)
    }

    pub fn insert_rule(
        &self,
        tenant_id: &TenantId,
        name: &str,
        prompt: &str,
        threshold: UnitScore,
        channel_filter: ChannelFilter,
    ) -> Result<Rule> {
        let conn = self.conn.lock().unwrap();
        let id = RuleId::new();
        let now = Self::now();
        let filter_json = serde_json::to_string(&channel_filter.0)?;
        conn.execute(
            "INSERT INTO rules (id, tenant_id, name, description, prompt, threshold,
                                 channel_filter, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, 1, ?7, ?7)",
            params![id.as_str(), tenant_id.as_str(), name, prompt, threshold.get(), filter_json, now],
        )?;
        Ok(Rule {
            id,
            tenant_id: tenant_id.clone(),
            name: name.to_string(),
            description: None,
            prompt: prompt.to_string(),
            threshold,
            channel_filter,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Update prompt/threshold and reset progress per the policy-change rule
    /// (§4.5): every progress row for this rule is deleted so the next tick
    /// re-derives from the first-contact window.
    pub fn update_rule_policy(&self, rule_id: &RuleId, prompt: &str, threshold: UnitScore) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE rules SET prompt = ?1, threshold = ?2, updated_at = ?3 WHERE id = ?4",
            params![prompt, threshold.get(), Self::now(), rule_id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM rule_analysis_progress WHERE rule_id = ?1",
            params![rule_id.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Update channel_filter only. Progress rows are left untouched: targets
    /// that remain stay live, dropped targets simply go dormant (§4.5).
    pub fn update_rule_channel_filter(&self, rule_id: &RuleId, channel_filter: ChannelFilter) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let filter_json = serde_json::to_string(&channel_filter.0)?;
        conn.execute(
            "UPDATE rules SET channel_filter = ?1, updated_at = ?2 WHERE id = ?3",
            params![filter_json, Self::now(), rule_id.as_str()],
        )?;
        Ok(())
    }

    // ── Global Messages ──────────────────────────────────────────────────

    /// Attempt to insert a new message; returns `Ok(true)` if inserted,
    /// `Ok(false)` if a unique-violation occurred (another collector run
    /// already holds this (channel, external_message_id) — benign race,
    /// §4.4 guarantee 2).
    pub fn insert_message_if_new(
        &self,
        channel_id: &ChannelId,
        external_message_id: i64,
        text: &str,
        author_external_id: Option<i64>,
        author_handle: Option<&str>,
        media_kind: Option<&str>,
        sent_at: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let id = MessageId::new();
        let now = Self::now();
        let result = conn.execute(
            "INSERT INTO global_messages
                (id, channel_id, external_message_id, text, author_external_id,
                 author_handle, media_kind, sent_at, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id.as_str(),
                channel_id.as_str(),
                external_message_id,
                text,
                author_external_id,
                author_handle,
                media_kind,
                sent_at,
                now,
            ],
        );

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    /// Ascending-`sent_at` window strictly after `after_sent_at`, ties
    /// broken by `external_message_id` ascending (§4.5 ordering rule).
    pub fn messages_after(
        &self,
        channel_id: &ChannelId,
        after_sent_at: &str,
        limit: u32,
    ) -> Result<Vec<GlobalMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, channel_id, external_message_id, text, author_external_id,
                    author_handle, media_kind, sent_at, ingested_at
             FROM global_messages
             WHERE channel_id = ?1 AND sent_at > ?2
             ORDER BY sent_at ASC, external_message_id ASC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![channel_id.as_str(), after_sent_at, limit], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// First-contact window: ascending-`sent_at` from `since_sent_at`
    /// inclusive (§4.5 step 2).
    pub fn messages_since(
        &self,
        channel_id: &ChannelId,
        since_sent_at: &str,
        limit: u32,
    ) -> Result<Vec<GlobalMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, channel_id, external_message_id, text, author_external_id,
                    author_handle, media_kind, sent_at, ingested_at
             FROM global_messages
             WHERE channel_id = ?1 AND sent_at >= ?2
             ORDER BY sent_at ASC, external_message_id ASC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![channel_id.as_str(), since_sent_at, limit], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Rule Analysis Progress ───────────────────────────────────────────

    /// Returns the progress row for (rule, channel) plus whether it was
    /// just created (first-contact, §4.5 step 1).
    pub fn get_or_create_progress(
        &self,
        rule_id: &RuleId,
        channel_id: &ChannelId,
    ) -> Result<(RuleAnalysisProgress, bool)> {
        let conn = self.conn.lock().unwrap();
        let existing = conn
            .query_row(
                "SELECT id, rule_id, channel_id, last_analyzed_message_id, last_analyzed_sent_at,
                        last_analyzed_at, messages_analyzed, leads_created, created_at, updated_at
                 FROM rule_analysis_progress WHERE rule_id = ?1 AND channel_id = ?2",
                params![rule_id.as_str(), channel_id.as_str()],
                row_to_progress,
            )
            .optional()?;

        if let Some(p) = existing {
            return Ok((p, false));
        }

        let id = ProgressId::new();
        let now = Self::now();
        let insert = conn.execute(
            "INSERT INTO rule_analysis_progress
                (id, rule_id, channel_id, messages_analyzed, leads_created, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, 0, ?4, ?4)",
            params![id.as_str(), rule_id.as_str(), channel_id.as_str(), now],
        );

        match insert {
            Ok(_) => Ok((
                RuleAnalysisProgress {
                    id,
                    rule_id: rule_id.clone(),
                    channel_id: channel_id.clone(),
                    last_analyzed_message_id: None,
                    last_analyzed_sent_at: None,
                    last_analyzed_at: None,
                    messages_analyzed: 0,
                    leads_created: 0,
                    created_at: now.clone(),
                    updated_at: now,
                },
                true,
            )),
            Err(e) if is_unique_violation(&e) => {
                // Lost the race to another concurrent tick; read back what it wrote.
                let p = conn
                    .query_row(
                        "SELECT id, rule_id, channel_id, last_analyzed_message_id, last_analyzed_sent_at,
                                last_analyzed_at, messages_analyzed, leads_created, created_at, updated_at
                         FROM rule_analysis_progress WHERE rule_id = ?1 AND channel_id = ?2",
                        params![rule_id.as_str(), channel_id.as_str()],
                        row_to_progress,
                    )?;
                Ok((p, false))
            }
            Err(e) => Err(StoreError::from(e)),
        }
    }

    /// Advance the cursor to `message_id`/`sent_at`, bumping counters. Called
    /// after the lead write (or skip) for each message in order (§4.5 step d).
    pub fn advance_progress(
        &self,
        progress_id: &ProgressId,
        message_id: &MessageId,
        sent_at: &str,
        lead_created: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE rule_analysis_progress
             SET last_analyzed_message_id = ?1,
                 last_analyzed_sent_at = ?2,
                 last_analyzed_at = ?3,
                 messages_analyzed = messages_analyzed + 1,
                 leads_created = leads_created + ?4,
                 updated_at = ?3
             WHERE id = ?5",
            params![
                message_id.as_str(),
                sent_at,
                Self::now(),
                lead_created as i64,
                progress_id.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Delete every progress row for a rule (policy-change invalidation,
    /// §4.5). Exposed separately from `update_rule_policy` for callers that
    /// already hold the rule fields and just need the reset.
    pub fn delete_progress_for_rule(&self, rule_id: &RuleId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM rule_analysis_progress WHERE rule_id = ?1",
            params![rule_id.as_str()],
        )?;
        Ok(())
    }

    // ── Leads ────────────────────────────────────────────────────────────

    pub fn lead_exists(
        &self,
        tenant_id: &TenantId,
        message_id: &MessageId,
        rule_id: &RuleId,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM leads WHERE tenant_id = ?1 AND global_message_id = ?2 AND rule_id = ?3",
            params![tenant_id.as_str(), message_id.as_str(), rule_id.as_str()],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a lead; returns `Ok(None)` on a swallowed unique-violation
    /// (concurrent processor already created it, §4.5 step c).
    #[allow(clippy::too_many_arguments)]
    pub fn insert_lead(
        &self,
        tenant_id: &TenantId,
        message_id: &MessageId,
        rule_id: &RuleId,
        score: UnitScore,
        reasoning: &str,
        extracted_entities: &ExtractedEntities,
    ) -> Result<Option<Lead>> {
        let conn = self.conn.lock().unwrap();
        let id = LeadId::new();
        let now = Self::now();
        let entities_json = serde_json::to_string(extracted_entities)?;

        let result = conn.execute(
            "INSERT INTO leads (id, tenant_id, global_message_id, rule_id, score, reasoning,
                                 extracted_entities, status, assignee_user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'new', NULL, ?8, ?8)",
            params![
                id.as_str(),
                tenant_id.as_str(),
                message_id.as_str(),
                rule_id.as_str(),
                score.get(),
                reasoning,
                entities_json,
                now,
            ],
        );

        match result {
            Ok(_) => Ok(Some(Lead {
                id,
                tenant_id: tenant_id.clone(),
                global_message_id: message_id.clone(),
                rule_id: rule_id.clone(),
                score,
                reasoning: reasoning.to_string(),
                extracted_entities: extracted_entities.clone(),
                status: LeadStatus::New,
                assignee_user_id: None,
                created_at: now.clone(),
                updated_at: now,
            })),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    pub fn set_lead_status(&self, lead_id: &LeadId, status: LeadStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE leads SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_string(), Self::now(), lead_id.as_str()],
        )?;
        Ok(())
    }

    pub fn assign_lead(&self, lead_id: &LeadId, assignee: &UserId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE leads SET assignee_user_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![assignee.as_str(), Self::now(), lead_id.as_str()],
        )?;
        Ok(())
    }

    // ── Notifications ────────────────────────────────────────────────────

    pub fn insert_notification(
        &self,
        recipient_user_id: &UserId,
        event_kind: NotificationEventKind,
        related_lead_id: Option<&LeadId>,
        title: &str,
        message: &str,
    ) -> Result<Notification> {
        let conn = self.conn.lock().unwrap();
        let id = NotificationId::new();
        let now = Self::now();
        conn.execute(
            "INSERT INTO notifications (id, recipient_user_id, event_kind, related_lead_id,
                                         title, message, is_read, read_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7)",
            params![
                id.as_str(),
                recipient_user_id.as_str(),
                event_kind.to_string(),
                related_lead_id.map(|l| l.as_str()),
                title,
                message,
                now,
            ],
        )?;
        Ok(Notification {
            id,
            recipient_user_id: recipient_user_id.clone(),
            event_kind,
            related_lead_id: related_lead_id.cloned(),
            title: title.to_string(),
            message: message.to_string(),
            is_read: false,
            read_at: None,
            created_at: now,
        })
    }

    pub fn list_notifications_for_user(&self, user_id: &UserId) -> Result<Vec<Notification>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, recipient_user_id, event_kind, related_lead_id, title, message,
                    is_read, read_at, created_at
             FROM notifications WHERE recipient_user_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(params![user_id.as_str()], row_to_notification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

// ── Row mappers ──────────────────────────────────────────────────────────
// Centralised here so every query in this crate stays consistent, mirroring
// the one-row-mapper-per-entity convention used elsewhere in the stack.

fn row_to_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: row.get::<_, String>(0)?.into(),
        name: row.get(1)?,
        plan: row.get(2)?,
        deleted_at: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get::<_, String>(0)?.into(),
        tenant_id: row.get::<_, String>(1)?.into(),
        email: row.get(2)?,
        full_name: row.get(3)?,
        in_app_notifications_enabled: row.get::<_, i64>(4)? != 0,
        email_notifications_enabled: row.get::<_, i64>(5)? != 0,
        bot_push_enabled: row.get::<_, i64>(6)? != 0,
        bot_push_chat_id: row.get(7)?,
        notify_on_new_lead: row.get::<_, i64>(8)? != 0,
        notify_on_lead_status_change: row.get::<_, i64>(9)? != 0,
        notify_on_lead_assignment: row.get::<_, i64>(10)? != 0,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatPlatformCredential> {
    let status_str: String = row.get(3)?;
    Ok(ChatPlatformCredential {
        id: row.get::<_, String>(0)?.into(),
        tenant_id: row.get::<_, String>(1)?.into(),
        session_blob: row.get(2)?,
        status: CredentialStatus::from_str(&status_str).unwrap_or(CredentialStatus::NeedsReauth),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn row_to_channel(row: &rusqlite::Row<'_>) -> rusqlite::Result<GlobalChannel> {
    let kind_str: String = row.get(4)?;
    Ok(GlobalChannel {
        id: row.get::<_, String>(0)?.into(),
        external_id: row.get(1)?,
        external_handle: row.get(2)?,
        title: row.get(3)?,
        kind: ChannelKind::from_str(&kind_str).unwrap_or(ChannelKind::Chat),
        active: row.get::<_, i64>(5)? != 0,
        last_external_message_id: row.get(6)?,
        last_collected_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelSubscription> {
    let tags_json: String = row.get(5)?;
    Ok(ChannelSubscription {
        id: row.get::<_, String>(0)?.into(),
        tenant_id: row.get::<_, String>(1)?.into(),
        channel_id: row.get::<_, String>(2)?.into(),
        credential_id: row.get::<_, String>(3)?.into(),
        active: row.get::<_, i64>(4)? != 0,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Rule> {
    let filter_json: String = row.get(6)?;
    let channel_ids: Vec<ChannelId> = serde_json::from_str::<Vec<String>>(&filter_json)
        .unwrap_or_default()
        .into_iter()
        .map(ChannelId::from)
        .collect();
    Ok(Rule {
        id: row.get::<_, String>(0)?.into(),
        tenant_id: row.get::<_, String>(1)?.into(),
        name: row.get(2)?,
        description: row.get(3)?,
        prompt: row.get(4)?,
        threshold: UnitScore::new(row.get(5)?),
        channel_filter: ChannelFilter(channel_ids),
        active: row.get::<_, i64>(7)? != 0,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<GlobalMessage> {
    Ok(GlobalMessage {
        id: row.get::<_, String>(0)?.into(),
        channel_id: row.get::<_, String>(1)?.into(),
        external_message_id: row.get(2)?,
        text: row.get(3)?,
        author_external_id: row.get(4)?,
        author_handle: row.get(5)?,
        media_kind: row.get(6)?,
        sent_at: row.get(7)?,
        ingested_at: row.get(8)?,
    })
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let event_kind_str: String = row.get(2)?;
    Ok(Notification {
        id: row.get::<_, String>(0)?.into(),
        recipient_user_id: row.get::<_, String>(1)?.into(),
        event_kind: event_kind_str.parse().unwrap_or(NotificationEventKind::LeadCreated),
        related_lead_id: row.get::<_, Option<String>>(3)?.map(LeadId::from),
        title: row.get(4)?,
        message: row.get(5)?,
        is_read: row.get::<_, i64>(6)? != 0,
        read_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn row_to_progress(row: &rusqlite::Row<'_>) -> rusqlite::Result<RuleAnalysisProgress> {
    Ok(RuleAnalysisProgress {
        id: row.get::<_, String>(0)?.into(),
        rule_id: row.get::<_, String>(1)?.into(),
        channel_id: row.get::<_, String>(2)?.into(),
        last_analyzed_message_id: row.get::<_, Option<String>>(3)?.map(MessageId::from),
        last_analyzed_sent_at: row.get(4)?,
        last_analyzed_at: row.get(5)?,
        messages_analyzed: row.get(6)?,
        leads_created: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadscout_core::types::ChannelKind;

    fn store() -> Store {
        Store::open_in_memory().expect("open in-memory store")
    }

    #[test]
    fn message_insert_dedupes_on_channel_and_external_id() {
        let store = store();
        let channel = store
            .upsert_channel(42, None, Some("Test Channel"), ChannelKind::Broadcast)
            .unwrap();

        let first = store
            .insert_message_if_new(&channel.id, 100, "hello", None, None, None, &Store::now())
            .unwrap();
        let second = store
            .insert_message_if_new(&channel.id, 100, "hello again", None, None, None, &Store::now())
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(store.highest_external_message_id(&channel.id).unwrap(), 100);
    }

    #[test]
    fn lead_insert_dedupes_on_tenant_message_rule() {
        let store = store();
        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store
            .upsert_channel(7, None, None, ChannelKind::Chat)
            .unwrap();
        store
            .insert_message_if_new(&channel.id, 1, "hi", None, None, None, &Store::now())
            .unwrap();
        let messages = store.messages_since(&channel.id, "0000-01-01T00:00:00Z", 10).unwrap();
        let message = &messages[0];
        let rule = store
            .insert_rule(&tenant.id, "r1", "match all", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        let entities = ExtractedEntities::default();
        let first = store
            .insert_lead(&tenant.id, &message.id, &rule.id, UnitScore::new(0.9), "matched", &entities)
            .unwrap();
        let second = store
            .insert_lead(&tenant.id, &message.id, &rule.id, UnitScore::new(0.9), "matched again", &entities)
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(store.lead_exists(&tenant.id, &message.id, &rule.id).unwrap());
    }

    #[test]
    fn progress_first_contact_then_update_does_not_duplicate_row() {
        let store = store();
        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store.upsert_channel(9, None, None, ChannelKind::Chat).unwrap();
        let rule = store
            .insert_rule(&tenant.id, "r1", "p", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();

        let (p1, is_new_1) = store.get_or_create_progress(&rule.id, &channel.id).unwrap();
        assert!(is_new_1);

        let (p2, is_new_2) = store.get_or_create_progress(&rule.id, &channel.id).unwrap();
        assert!(!is_new_2);
        assert_eq!(p1.id, p2.id);
    }

    #[test]
    fn rule_policy_change_resets_progress() {
        let store = store();
        let tenant = store.insert_tenant("Acme", "free").unwrap();
        let channel = store.upsert_channel(11, None, None, ChannelKind::Chat).unwrap();
        let rule = store
            .insert_rule(&tenant.id, "r1", "old prompt", UnitScore::new(0.0), ChannelFilter::all())
            .unwrap();
        let (progress, _) = store.get_or_create_progress(&rule.id, &channel.id).unwrap();
        store
            .advance_progress(&progress.id, &MessageId::new(), &Store::now(), false)
            .unwrap();

        store
            .update_rule_policy(&rule.id, "new prompt", UnitScore::new(1.0))
            .unwrap();

        let (_, is_new_after_reset) = store.get_or_create_progress(&rule.id, &channel.id).unwrap();
        assert!(is_new_after_reset);
    }
}
