use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::Source;
use crate::error::{Result, SourceError};
use crate::types::{ChannelRef, PlatformDialog, PlatformMessage, SessionMaterial};

/// [`Source`] implementation over the generic chat-platform read API
/// described in §6: bearer-authenticated HTTP, `offset_id`/`limit` paging.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, app_id: String, app_secret: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            app_id,
            app_secret,
        }
    }

    fn session_token(session: &SessionMaterial) -> String {
        // The session blob is opaque ciphertext handled upstream (§9); by
        // the time it reaches this client it has already been decrypted
        // into a bearer token the platform understands.
        String::from_utf8_lossy(&session.0).into_owned()
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn fetch_new(
        &self,
        channel: &ChannelRef,
        session: &SessionMaterial,
        limit: u32,
        min_external_id: i64,
    ) -> Result<Vec<PlatformMessage>> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel.external_id);

        debug!(channel = channel.external_id, min_external_id, "fetching new messages");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(Self::session_token(session))
            .header("x-app-id", &self.app_id)
            .header("x-app-secret", &self.app_secret)
            .query(&[("offset_id", min_external_id.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        handle_status(&resp, channel.external_id)?;

        let body: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Protocol(e.to_string()))?;

        Ok(body
            .messages
            .into_iter()
            .filter(|m| m.external_id > min_external_id)
            .map(Into::into)
            .collect())
    }

    async fn list_dialogs(&self, session: &SessionMaterial, limit: u32) -> Result<Vec<PlatformDialog>> {
        let url = format!("{}/dialogs", self.base_url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(Self::session_token(session))
            .header("x-app-id", &self.app_id)
            .header("x-app-secret", &self.app_secret)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;

        handle_status(&resp, 0)?;

        let body: DialogsResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Protocol(e.to_string()))?;

        Ok(body.dialogs.into_iter().map(Into::into).collect())
    }

    async fn authenticate(&self, phone: &str) -> Result<String> {
        let url = format!("{}/auth/start", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header("x-app-id", &self.app_id)
            .header("x-app-secret", &self.app_secret)
            .json(&serde_json::json!({ "phone": phone }))
            .send()
            .await?;

        handle_status(&resp, 0)?;

        let body: AuthStartResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Protocol(e.to_string()))?;

        Ok(body.handshake)
    }

    async fn confirm(&self, phone: &str, code: &str, handshake: &str) -> Result<SessionMaterial> {
        let url = format!("{}/auth/confirm", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header("x-app-id", &self.app_id)
            .header("x-app-secret", &self.app_secret)
            .json(&serde_json::json!({ "phone": phone, "code": code, "handshake": handshake }))
            .send()
            .await?;

        handle_status(&resp, 0)?;

        let body: AuthConfirmResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Protocol(e.to_string()))?;

        Ok(SessionMaterial(body.session.into_bytes()))
    }
}

fn handle_status(resp: &reqwest::Response, channel_external_id: i64) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(SourceError::AuthFailed(format!("platform returned {status}")));
    }
    if status.as_u16() == 404 {
        return Err(SourceError::ChannelGone(format!("channel {channel_external_id}")));
    }
    if status.as_u16() == 429 {
        let retry_after_ms = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|s| s * 1000)
            .unwrap_or(5000);
        return Err(SourceError::RateLimited { retry_after_ms });
    }
    if status.is_server_error() {
        warn!(%status, "chat platform server error");
        return Err(SourceError::ConnectionFailed(format!("platform returned {status}")));
    }

    Err(SourceError::Protocol(format!("unexpected status {status}")))
}

#[derive(Deserialize)]
struct MessagesResponse {
    messages: Vec<RawMessage>,
}

#[derive(Deserialize)]
struct RawMessage {
    id: i64,
    text: Option<String>,
    author_id: Option<i64>,
    author_handle: Option<String>,
    media_kind: Option<String>,
    sent_at: String,
}

impl From<RawMessage> for PlatformMessage {
    fn from(raw: RawMessage) -> Self {
        PlatformMessage {
            external_id: raw.id,
            text: raw.text.unwrap_or_default(),
            author_external_id: raw.author_id,
            author_handle: raw.author_handle,
            media_kind: raw.media_kind,
            sent_at: raw.sent_at,
        }
    }
}

#[derive(Deserialize)]
struct DialogsResponse {
    dialogs: Vec<RawDialog>,
}

#[derive(Deserialize)]
struct RawDialog {
    id: i64,
    handle: Option<String>,
    title: Option<String>,
    kind: String,
}

impl From<RawDialog> for PlatformDialog {
    fn from(raw: RawDialog) -> Self {
        PlatformDialog {
            external_id: raw.id,
            handle: raw.handle,
            title: raw.title,
            kind: raw.kind,
        }
    }
}

#[derive(Deserialize)]
struct AuthStartResponse {
    handshake: String,
}

#[derive(Deserialize)]
struct AuthConfirmResponse {
    session: String,
}
