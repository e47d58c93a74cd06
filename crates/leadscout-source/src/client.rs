use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelRef, PlatformDialog, PlatformMessage, SessionMaterial};

/// Authenticated read access to a chat platform (§4.1).
///
/// Implementations are stateless across calls: session material is
/// presented fresh on every invocation and the underlying platform
/// connection is opened and torn down per call, since the credential may
/// belong to any tenant and the client itself holds no per-tenant state.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch messages newer than `min_external_id`, newest-first, bounded by
    /// `limit`. Returns an empty vector (not an error) when there is nothing
    /// new.
    async fn fetch_new(
        &self,
        channel: &ChannelRef,
        session: &SessionMaterial,
        limit: u32,
        min_external_id: i64,
    ) -> Result<Vec<PlatformMessage>>;

    /// List dialogs visible to this session. Used by the subscription setup
    /// API, not by the collector tick.
    async fn list_dialogs(&self, session: &SessionMaterial, limit: u32) -> Result<Vec<PlatformDialog>>;

    /// Begin an interactive login, returning an opaque handshake token.
    async fn authenticate(&self, phone: &str) -> Result<String>;

    /// Complete an interactive login, returning session material to store
    /// (encrypted) as a Chat-Platform Credential.
    async fn confirm(&self, phone: &str, code: &str, handshake: &str) -> Result<SessionMaterial>;
}
