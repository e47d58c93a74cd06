use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::client::LmClient;
use crate::error::{LmError, Result};
use crate::types::{ClassifyResult, ExtractResult};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_MAX_MS: u64 = 8_000;
const JITTER_FRACTION: f64 = 0.2;

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are an assistant that decides whether a message matches a criterion.

Respond with ONLY a JSON object, no other text:
{
    "is_match": true/false,
    "confidence": 0.0-1.0,
    "reasoning": "brief explanation (1-2 sentences)"
}"#;

const EXTRACT_SYSTEM_PROMPT: &str = r#"You are an assistant that extracts structured data from a message.

Extract:
- Contacts (email, phone, chat handle)
- Keywords and phrases
- Budget, if mentioned
- Deadline, if mentioned
- A short 2-3 sentence summary

Respond with ONLY a JSON object, no other text:
{
    "contacts": ["contact1", "contact2"],
    "keywords": ["keyword1", "keyword2"],
    "budget": "string or null",
    "deadline": "string or null",
    "summary": "short summary"
}"#;

/// [`LmClient`] over an OpenAI-compatible `/v1/chat/completions` endpoint
/// (§4.2, §6), modelled on the provider's request/response shape.
pub struct OpenAiLmClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    classify_cache: TtlCache<ClassifyResult>,
    extract_cache: TtlCache<ExtractResult>,
}

impl OpenAiLmClient {
    pub fn new(api_url: String, api_key: String, model: String, timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            timeout,
            classify_cache: TtlCache::new(cache_ttl),
            extract_cache: TtlCache::new(cache_ttl),
        }
    }

    async fn call(&self, system_prompt: &str, user_prompt: &str, temperature: f64, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let mut delay_ms = BACKOFF_BASE_MS;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_call(&body).await {
                Ok(content) => return Ok(content),
                Err(e) if attempt == MAX_ATTEMPTS || !e.is_retryable() => return Err(e),
                Err(e) => {
                    let jitter = jitter_ms(delay_ms);
                    let total = delay_ms + jitter;
                    warn!(attempt, max = MAX_ATTEMPTS, error = %e, retry_after_ms = total, "LM call failed, retrying");
                    sleep(Duration::from_millis(total)).await;
                    delay_ms = (delay_ms * 2).min(BACKOFF_MAX_MS);
                }
            }
        }

        unreachable!("retry loop always returns inside the match arms above")
    }

    async fn try_call(&self, body: &serde_json::Value) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.api_url);

        let resp = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .json(body)
                .send(),
        )
        .await
        .map_err(|_| LmError::Timeout { ms: self.timeout.as_millis() as u64 })?
        .map_err(|e| LmError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000)
                .unwrap_or(5000);
            return Err(LmError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LmError::Http { status: status.as_u16(), message: text });
        }

        let parsed: ApiResponse = resp.json().await.map_err(|e| LmError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        debug!(len = content.len(), "LM response received");
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl LmClient for OpenAiLmClient {
    async fn classify(&self, message_text: &str, rule_prompt: &str) -> Result<ClassifyResult> {
        let cache_key = TtlCache::<ClassifyResult>::key("classify", message_text, rule_prompt);
        if let Some(cached) = self.classify_cache.get(&cache_key) {
            return Ok(cached);
        }

        let user_prompt = format!(
            "Criterion:\n{rule_prompt}\n\nMessage to analyze:\n{message_text}\n\nDoes the message match the criterion? Answer in JSON."
        );

        let raw = self.call(CLASSIFY_SYSTEM_PROMPT, &user_prompt, 0.2, 300).await?;

        let result = match serde_json::from_str::<RawClassification>(&raw) {
            Ok(parsed) => ClassifyResult {
                is_match: parsed.is_match,
                confidence: leadscout_core::types::UnitScore::new(parsed.confidence),
                reason: parsed.reasoning,
            },
            Err(e) => {
                warn!(error = %e, "failed to parse classify response, degrading to conservative default");
                ClassifyResult::parse_error_default()
            }
        };

        self.classify_cache.insert(cache_key, result.clone());
        Ok(result)
    }

    async fn extract(&self, message_text: &str) -> Result<ExtractResult> {
        let cache_key = TtlCache::<ExtractResult>::key("extract", message_text, "");
        if let Some(cached) = self.extract_cache.get(&cache_key) {
            return Ok(cached);
        }

        let user_prompt = format!("Message to analyze:\n{message_text}\n\nExtract structured data as JSON.");

        let raw = self.call(EXTRACT_SYSTEM_PROMPT, &user_prompt, 0.1, 500).await?;

        let result = match serde_json::from_str::<ExtractResult>(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "failed to parse extract response, falling back to truncated summary");
                ExtractResult::fallback_summary(message_text)
            }
        };

        self.extract_cache.insert(cache_key, result.clone());
        Ok(result)
    }

    fn invalidate_rule_prompt(&self, old_prompt: &str) {
        self.classify_cache.invalidate_prompt(old_prompt);
    }
}

fn jitter_ms(base_ms: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_ms as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct RawClassification {
    is_match: bool,
    confidence: f64,
    reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_result_parse_error_default_is_conservative() {
        let result = ClassifyResult::parse_error_default();
        assert!(!result.is_match);
        assert_eq!(result.confidence.get(), 0.0);
    }

    #[test]
    fn extract_fallback_truncates_long_messages() {
        let long_text = "a".repeat(500);
        let fallback = ExtractResult::fallback_summary(&long_text);
        assert!(fallback.summary.ends_with("..."));
        assert!(fallback.contacts.is_empty());
    }
}
