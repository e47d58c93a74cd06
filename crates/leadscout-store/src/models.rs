use serde::{Deserialize, Serialize};

use leadscout_core::types::{
    ChannelFilter, ChannelId, ChannelKind, CredentialId, CredentialStatus, LeadId, LeadStatus,
    MessageId, NotificationEventKind, NotificationId, ProgressId, RuleId, SubscriptionId, TenantId,
    UnitScore, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub plan: String,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub full_name: String,
    pub in_app_notifications_enabled: bool,
    pub email_notifications_enabled: bool,
    pub bot_push_enabled: bool,
    pub bot_push_chat_id: Option<String>,
    pub notify_on_new_lead: bool,
    pub notify_on_lead_status_change: bool,
    pub notify_on_lead_assignment: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPlatformCredential {
    pub id: CredentialId,
    pub tenant_id: TenantId,
    /// Opaque ciphertext. Encrypted/decrypted only by the out-of-scope
    /// credential-handshake collaborator; the engine never inspects it.
    pub session_blob: Vec<u8>,
    pub status: CredentialStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalChannel {
    pub id: ChannelId,
    pub external_id: i64,
    pub external_handle: Option<String>,
    pub title: Option<String>,
    pub kind: ChannelKind,
    pub active: bool,
    pub last_external_message_id: Option<i64>,
    pub last_collected_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSubscription {
    pub id: SubscriptionId,
    pub tenant_id: TenantId,
    pub channel_id: ChannelId,
    pub credential_id: CredentialId,
    pub active: bool,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub prompt: String,
    pub threshold: UnitScore,
    pub channel_filter: ChannelFilter,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub external_message_id: i64,
    pub text: String,
    pub author_external_id: Option<i64>,
    pub author_handle: Option<String>,
    pub media_kind: Option<String>,
    pub sent_at: String,
    pub ingested_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleAnalysisProgress {
    pub id: ProgressId,
    pub rule_id: RuleId,
    pub channel_id: ChannelId,
    pub last_analyzed_message_id: Option<MessageId>,
    pub last_analyzed_sent_at: Option<String>,
    pub last_analyzed_at: Option<String>,
    pub messages_analyzed: i64,
    pub leads_created: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Open-ended extraction payload from `LmClient::extract` (§4.2, §9).
/// Enumerated fields are validated at the LM client boundary; `extra`
/// absorbs anything else the model returned so future fields don't require
/// a schema change here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub tenant_id: TenantId,
    pub global_message_id: MessageId,
    pub rule_id: RuleId,
    pub score: UnitScore,
    pub reasoning: String,
    pub extracted_entities: ExtractedEntities,
    pub status: LeadStatus,
    pub assignee_user_id: Option<UserId>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_user_id: UserId,
    pub event_kind: NotificationEventKind,
    pub related_lead_id: Option<LeadId>,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}
