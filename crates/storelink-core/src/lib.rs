//! Shared types for the storelink network layer.
//!
//! - Process-wide client configuration (base URLs, credentials)
//! - Flat request payloads and their form-encoded query strings
//! - URL joining used by both HTTP and WebSocket paths

pub mod config;
pub mod error;
pub mod payload;

pub use config::{ClientConfig, Credentials};
pub use error::{CoreError, CoreResult};
pub use payload::{encode_query, into_payload, join_url, Payload};
