use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::Source;
use crate::error::Result;
use crate::types::{ChannelRef, PlatformDialog, PlatformMessage, SessionMaterial};

/// In-memory [`Source`] for tests and local development, per the
/// composition-root substitution pattern in the design notes (§9).
#[derive(Default)]
pub struct FakeSource {
    messages: Mutex<HashMap<i64, Vec<PlatformMessage>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed messages for a channel, as the fixture would publish them
    /// upstream (newest-first is not required here; `fetch_new` sorts).
    pub fn seed(&self, channel_external_id: i64, messages: Vec<PlatformMessage>) {
        self.messages
            .lock()
            .unwrap()
            .entry(channel_external_id)
            .or_default()
            .extend(messages);
    }
}

#[async_trait]
impl Source for FakeSource {
    async fn fetch_new(
        &self,
        channel: &ChannelRef,
        _session: &SessionMaterial,
        limit: u32,
        min_external_id: i64,
    ) -> Result<Vec<PlatformMessage>> {
        let guard = self.messages.lock().unwrap();
        let mut matching: Vec<PlatformMessage> = guard
            .get(&channel.external_id)
            .into_iter()
            .flatten()
            .filter(|m| m.external_id > min_external_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.external_id.cmp(&a.external_id));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn list_dialogs(&self, _session: &SessionMaterial, _limit: u32) -> Result<Vec<PlatformDialog>> {
        Ok(Vec::new())
    }

    async fn authenticate(&self, _phone: &str) -> Result<String> {
        Ok("fake-handshake".to_string())
    }

    async fn confirm(&self, _phone: &str, _code: &str, _handshake: &str) -> Result<SessionMaterial> {
        Ok(SessionMaterial(b"fake-session".to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_new_filters_and_bounds_by_limit() {
        let source = FakeSource::new();
        source.seed(
            1,
            vec![
                PlatformMessage {
                    external_id: 1,
                    text: "a".into(),
                    author_external_id: None,
                    author_handle: None,
                    media_kind: None,
                    sent_at: "2026-01-01T00:00:00Z".into(),
                },
                PlatformMessage {
                    external_id: 2,
                    text: "b".into(),
                    author_external_id: None,
                    author_handle: None,
                    media_kind: None,
                    sent_at: "2026-01-02T00:00:00Z".into(),
                },
                PlatformMessage {
                    external_id: 3,
                    text: "c".into(),
                    author_external_id: None,
                    author_handle: None,
                    media_kind: None,
                    sent_at: "2026-01-03T00:00:00Z".into(),
                },
            ],
        );

        let channel = ChannelRef { external_id: 1 };
        let session = SessionMaterial(Vec::new());

        let got = source.fetch_new(&channel, &session, 10, 1).await.unwrap();
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|m| m.external_id > 1));

        let bounded = source.fetch_new(&channel, &session, 1, 0).await.unwrap();
        assert_eq!(bounded.len(), 1);
    }
}
