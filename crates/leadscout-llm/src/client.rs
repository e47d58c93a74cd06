use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ClassifyResult, ExtractResult};

/// Classification and extraction over an external language model (C2, §4.2).
#[async_trait]
pub trait LmClient: Send + Sync {
    async fn classify(&self, message_text: &str, rule_prompt: &str) -> Result<ClassifyResult>;

    async fn extract(&self, message_text: &str) -> Result<ExtractResult>;

    /// Drop cached classify entries tied to a rule's old prompt, called when
    /// a rule's prompt changes (§4.2, §4.5).
    fn invalidate_rule_prompt(&self, old_prompt: &str);
}
