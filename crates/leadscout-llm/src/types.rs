use leadscout_core::types::UnitScore;
use serde::{Deserialize, Serialize};

/// Result of [`crate::LmClient::classify`] (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResult {
    pub is_match: bool,
    pub confidence: UnitScore,
    pub reason: String,
}

impl ClassifyResult {
    /// The contract's conservative default when the model's output can't be
    /// parsed — the classifier degrades, it never fails the tick (§4.2).
    pub fn parse_error_default() -> Self {
        Self {
            is_match: false,
            confidence: UnitScore::new(0.0),
            reason: "parse error".to_string(),
        }
    }
}

/// Result of [`crate::LmClient::extract`] (§4.2, §9).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractResult {
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

impl ExtractResult {
    /// Fallback when extraction fails: empty fields plus a truncated-text
    /// summary (§4.5 step c).
    pub fn fallback_summary(message_text: &str) -> Self {
        const MAX_LEN: usize = 200;
        let summary = if message_text.chars().count() > MAX_LEN {
            let truncated: String = message_text.chars().take(MAX_LEN).collect();
            format!("{truncated}...")
        } else {
            message_text.to_string()
        };
        Self {
            summary,
            ..Default::default()
        }
    }
}
