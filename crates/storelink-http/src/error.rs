//! Transport error types.
//!
//! Every request failure is reduced to one of two shapes before it reaches
//! the caller: the server answered and said no, or no usable answer arrived.

use serde_json::{json, Value};
use thiserror::Error;

/// Errors raised while constructing the client.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP client error: {0}")]
    ClientBuild(String),
}

pub type HttpResult<T> = Result<T, HttpError>;

/// Transport-level failure detail.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// DNS, connect, TLS, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server replied with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The reply body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// A request header or multipart field could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// `server` or `network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Server,
    Network,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Network => "network",
        }
    }
}

/// Classified request failure.
#[derive(Debug, Error)]
pub enum RequestFailure {
    /// Well-formed reply whose `code` is absent or not `SUCCESS`.
    /// Carries the whole decoded reply.
    #[error("server rejected request: {0}")]
    Server(Value),

    /// No well-formed reply was obtained.
    #[error("network failure: {0}")]
    Network(#[from] NetworkError),
}

impl RequestFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Server(_) => FailureKind::Server,
            Self::Network(_) => FailureKind::Network,
        }
    }

    /// Server reply, if the failure is server-classified.
    pub fn server_payload(&self) -> Option<&Value> {
        match self {
            Self::Server(payload) => Some(payload),
            Self::Network(_) => None,
        }
    }

    /// `{ "kind": ..., "payload": ... }` view for callers that log or display
    /// failures. Network payloads are rendered as their message.
    pub fn to_json(&self) -> Value {
        let payload = match self {
            Self::Server(payload) => payload.clone(),
            Self::Network(err) => Value::String(err.to_string()),
        };
        json!({ "kind": self.kind().as_str(), "payload": payload })
    }
}

pub type RequestResult<T> = Result<T, RequestFailure>;
