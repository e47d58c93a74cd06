//! Fan-out of lead events to in-app rows, email, and bot push (C6).

pub mod error;
pub mod notifier;
pub mod types;

pub use error::{NotifyError, Result};
pub use notifier::Notifier;
pub use types::LeadContext;
