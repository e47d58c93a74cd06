use serde::{Deserialize, Serialize};

/// A single message as returned by the chat platform's read API (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMessage {
    pub external_id: i64,
    pub text: String,
    pub author_external_id: Option<i64>,
    pub author_handle: Option<String>,
    pub media_kind: Option<String>,
    /// RFC3339 send timestamp as reported by the platform.
    pub sent_at: String,
}

/// A dialog/channel entry as listed by the platform, used only by the
/// subscription-setup API (not the core tick loop, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformDialog {
    pub external_id: i64,
    pub handle: Option<String>,
    pub title: Option<String>,
    pub kind: String,
}

/// Stable reference to a channel on the upstream platform, as opposed to
/// our internal [`leadscout_core::types::ChannelId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRef {
    pub external_id: i64,
}

/// Opaque, already-decrypted credential material handed to the client for a
/// single call. The engine never inspects the bytes; only the platform-
/// specific implementation knows how to use them.
#[derive(Clone)]
pub struct SessionMaterial(pub Vec<u8>);
