//! Authenticated read access to the chat platform (C1).
//!
//! The engine depends only on the [`Source`] trait; [`HttpSource`] is the
//! production implementation and [`fake::FakeSource`] is an in-memory
//! stand-in for tests.

pub mod client;
pub mod error;
pub mod fake;
pub mod http;
pub mod types;

pub use client::Source;
pub use error::{Result, SourceError};
pub use http::HttpSource;
