use async_trait::async_trait;
use leadscout_core::types::UnitScore;

use crate::client::LmClient;
use crate::error::Result;
use crate::types::{ClassifyResult, ExtractResult};

/// Deterministic [`LmClient`] for tests: matches iff `message_text` contains
/// `rule_prompt` case-insensitively, confidence fixed at 1.0. No network, no
/// cache, no retries — substituted at the composition root per §9.
#[derive(Default)]
pub struct FakeLmClient;

impl FakeLmClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LmClient for FakeLmClient {
    async fn classify(&self, message_text: &str, rule_prompt: &str) -> Result<ClassifyResult> {
        let is_match = rule_prompt.trim().is_empty()
            || rule_prompt.eq_ignore_ascii_case("matches all")
            || message_text.to_lowercase().contains(&rule_prompt.to_lowercase());

        Ok(ClassifyResult {
            is_match,
            confidence: UnitScore::new(1.0),
            reason: "fake classifier".to_string(),
        })
    }

    async fn extract(&self, message_text: &str) -> Result<ExtractResult> {
        Ok(ExtractResult {
            summary: message_text.chars().take(120).collect(),
            ..Default::default()
        })
    }

    fn invalidate_rule_prompt(&self, _old_prompt: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_all_prompt_matches_any_text() {
        let client = FakeLmClient::new();
        let result = client.classify("anything at all", "matches all").await.unwrap();
        assert!(result.is_match);
    }

    #[tokio::test]
    async fn non_matching_prompt_does_not_match() {
        let client = FakeLmClient::new();
        let result = client.classify("hello world", "looking for a plumber").await.unwrap();
        assert!(!result.is_match);
    }
}
