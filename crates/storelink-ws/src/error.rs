//! WebSocket error types.

use crate::connection::ReadyState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("WebSocket [{0}] is not registered")]
    UnknownChannel(String),

    #[error("WebSocket [{channel}] is not connected (state={state})")]
    NotOpen { channel: String, state: ReadyState },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WsResult<T> = Result<T, WsError>;
