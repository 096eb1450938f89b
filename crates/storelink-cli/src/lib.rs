//! storelink command-line front end.
//!
//! Composition root for the network layer:
//! - Loads configuration (TOML file + environment overrides)
//! - Owns the signed HTTP client and the connection registry
//! - Runs one request or WebSocket session per invocation

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, Command};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
