//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] storelink_http::HttpError),

    #[error("Request failed ({kind}): {payload}")]
    Request {
        kind: &'static str,
        payload: serde_json::Value,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] storelink_ws::WsError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] storelink_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<storelink_http::RequestFailure> for AppError {
    fn from(failure: storelink_http::RequestFailure) -> Self {
        let view = failure.to_json();
        Self::Request {
            kind: failure.kind().as_str(),
            payload: view["payload"].clone(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
