/// Display context for a lead event, gathered by the caller from the Store
/// joins the Notifier itself doesn't perform (§4.6).
#[derive(Debug, Clone)]
pub struct LeadContext {
    pub rule_name: String,
    pub source_title: String,
    pub message_preview: String,
    pub lead_url: String,
    pub message_link: String,
    pub score: f64,
}
