//! Shared types, configuration, and ambient error handling for the lead
//! discovery engine.
//!
//! Every other crate in the workspace depends on this one for entity ids,
//! the process-wide config struct, and the small set of cross-cutting
//! constants (backfill window, batch caps) that more than one component
//! needs to agree on.

pub mod config;
pub mod error;
pub mod types;

pub use config::LeadscoutConfig;
pub use error::{CoreError, Result};
