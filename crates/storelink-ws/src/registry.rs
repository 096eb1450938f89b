//! Channel-name to connection registry.
//!
//! At most one entry per channel name. Every mutation runs under a single
//! lock and never suspends, so `open`/`close`/`close_all` are atomic with
//! respect to each other.

use crate::connection::{ReadyState, WsConnection};
use crate::error::{WsError, WsResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use storelink_core::{encode_query, join_url, ClientConfig, Payload};
use storelink_telemetry::Metrics;
use tracing::{debug, error, info};

/// Build the connection URL for a channel.
///
/// `ws_base/channel?lang=<locale>[&<query>]`, with the locale
/// percent-encoded and the query form-encoded in key order.
pub fn channel_url(ws_base_url: &str, channel: &str, locale: &str, query: &Payload) -> String {
    let query = encode_query(query);
    let base = join_url(ws_base_url, channel);
    let lang = urlencoding::encode(locale);
    if query.is_empty() {
        format!("{base}?lang={lang}")
    } else {
        format!("{base}?lang={lang}&{query}")
    }
}

/// Registry of named WebSocket connections.
///
/// Owned by the composition root; independent registries do not share state.
pub struct ConnectionRegistry {
    ws_base_url: String,
    outbound_buffer: usize,
    connections: Mutex<HashMap<String, WsConnection>>,
}

impl ConnectionRegistry {
    pub fn new(ws_base_url: impl Into<String>, outbound_buffer: usize) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            outbound_buffer,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.ws_base_url.clone(), config.ws_outbound_buffer)
    }

    /// Open (or reuse) the connection for `channel`.
    ///
    /// An entry in `Open` state is returned unchanged. Otherwise a new
    /// connection replaces the entry unconditionally. A prior connection that
    /// is still `Connecting` or `Closing` is orphaned, not closed.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(&self, locale: &str, channel: &str, query: &Payload) -> WsConnection {
        let mut connections = self.connections.lock();

        if let Some(existing) = connections.get(channel) {
            if existing.state() == ReadyState::Open {
                debug!(channel, id = %existing.id(), "Reusing open WebSocket");
                Metrics::ws_reused();
                return existing.clone();
            }
        }

        let url = channel_url(&self.ws_base_url, channel, locale, query);
        let connection = WsConnection::connect(channel, url, self.outbound_buffer);
        info!(channel, id = %connection.id(), url = %connection.url(), "WebSocket registered");

        match connections.insert(channel.to_string(), connection.clone()) {
            Some(previous) => debug!(
                channel,
                id = %previous.id(),
                state = %previous.state(),
                "Replaced non-open WebSocket entry"
            ),
            None => Metrics::ws_registry_changed(1),
        }

        Metrics::ws_opened();
        connection
    }

    /// Send `message` as JSON on `channel`.
    ///
    /// Missing or non-open channels, unserializable messages and a full or
    /// stopped outbound queue are logged and rejected without transmitting
    /// anything. The queue holds `outbound_buffer` frames per connection; a burst larger
    /// than that is rejected rather than buffered.
    pub fn send<T: Serialize + ?Sized>(&self, channel: &str, message: &T) -> WsResult<()> {
        let connection = self.connections.lock().get(channel).cloned();

        let result = match connection {
            Some(connection) => connection.send_json(message),
            None => Err(WsError::UnknownChannel(channel.to_string())),
        };

        if let Err(ref e) = result {
            let reason = rejection_reason(e);
            match reason {
                RejectReason::NotConnected => {
                    error!(channel, error = %e, "WebSocket [{channel}] is not connected.")
                }
                RejectReason::SendFailed => {
                    error!(channel, error = %e, "WebSocket [{channel}] could not queue message.")
                }
                RejectReason::Serialize => {
                    error!(channel, error = %e, "WebSocket [{channel}] message is not serializable.")
                }
            }
            Metrics::ws_send_rejected(reason.as_str());
        }
        result
    }

    /// Close and remove the entry for `channel`.
    ///
    /// Returns `false` if no entry existed. Removal does not wait for the
    /// close handshake.
    pub fn close(&self, channel: &str) -> bool {
        let removed = self.connections.lock().remove(channel);

        match removed {
            Some(connection) => {
                Metrics::ws_registry_changed(-1);
                connection.close();
                debug!(channel, id = %connection.id(), "WebSocket removed");
                true
            }
            None => false,
        }
    }

    /// Close and remove every entry. Returns the number closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<WsConnection> = self
            .connections
            .lock()
            .drain()
            .map(|(_, c)| c)
            .collect();
        Metrics::ws_registry_changed(-(drained.len() as i64));

        for connection in &drained {
            connection.close();
        }
        info!(count = drained.len(), "All WebSockets closed.");
        drained.len()
    }

    /// Current entry for `channel`, if any.
    pub fn get(&self, channel: &str) -> Option<WsConnection> {
        self.connections.lock().get(channel).cloned()
    }

    /// Registered channel names.
    pub fn channels(&self) -> Vec<String> {
        self.connections.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        // Entries leave the gauge with the registry; connections are not closed.
        let held = self.connections.get_mut().len();
        Metrics::ws_registry_changed(-(held as i64));
    }
}

/// Why a registry send transmitted nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RejectReason {
    NotConnected,
    SendFailed,
    Serialize,
}

impl RejectReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::SendFailed => "send_failed",
            Self::Serialize => "serialize",
        }
    }
}

fn rejection_reason(error: &WsError) -> RejectReason {
    match error {
        WsError::Json(_) => RejectReason::Serialize,
        WsError::SendFailed(_) => RejectReason::SendFailed,
        _ => RejectReason::NotConnected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storelink_core::into_payload;

    // Nothing listens here; tests below never poll the handshake.
    const WS_BASE: &str = "ws://127.0.0.1:9";

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(WS_BASE, 10)
    }

    #[test]
    fn test_channel_url_without_query() {
        assert_eq!(
            channel_url("wss://ws.example.com/", "/orders", "ko", &Payload::new()),
            "wss://ws.example.com/orders?lang=ko"
        );
    }

    #[test]
    fn test_channel_url_with_query() {
        let query = into_payload(json!({"room": 5, "q": "a b"}));
        assert_eq!(
            channel_url("wss://ws.example.com", "chat", "zh-Hant", &query),
            "wss://ws.example.com/chat?lang=zh-Hant&room=5&q=a+b"
        );
    }

    #[test]
    fn test_channel_url_encodes_locale() {
        assert_eq!(
            channel_url("ws://h", "c", "en US&x", &Payload::new()),
            "ws://h/c?lang=en%20US%26x"
        );
    }

    #[tokio::test]
    async fn test_open_registers_connecting_entry() {
        let registry = registry();
        let conn = registry.open("ko", "/orders", &into_payload(json!({"user": 7})));

        assert_eq!(conn.state(), ReadyState::Connecting);
        assert_eq!(conn.url(), "ws://127.0.0.1:9/orders?lang=ko&user=7");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("/orders").unwrap().id(), conn.id());
    }

    #[tokio::test]
    async fn test_open_while_connecting_replaces_and_orphans() {
        let registry = registry();
        let first = registry.open("en", "/orders", &Payload::new());
        let second = registry.open("en", "/orders", &Payload::new());

        assert_ne!(first.id(), second.id());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("/orders").unwrap().id(), second.id());
        // The superseded connection is left alone.
        assert_eq!(first.state(), ReadyState::Connecting);
    }

    #[tokio::test]
    async fn test_close_unknown_channel_is_noop() {
        let registry = registry();
        assert!(!registry.close("/missing"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_close_removes_entry_immediately() {
        let registry = registry();
        let conn = registry.open("en", "/orders", &Payload::new());

        assert!(registry.close("/orders"));
        assert!(registry.get("/orders").is_none());
        assert_eq!(conn.state(), ReadyState::Closing);
    }

    #[tokio::test]
    async fn test_open_after_close_is_fresh() {
        let registry = registry();
        let first = registry.open("en", "/orders", &Payload::new());
        registry.close("/orders");
        let second = registry.open("en", "/orders", &Payload::new());

        assert_ne!(first.id(), second.id());
        assert_eq!(second.state(), ReadyState::Connecting);
    }

    #[tokio::test]
    async fn test_send_unknown_channel_is_rejected() {
        let registry = registry();
        let err = registry.send("/missing", &json!({"a": 1})).unwrap_err();
        assert!(matches!(err, WsError::UnknownChannel(ref c) if c == "/missing"));
    }

    #[tokio::test]
    async fn test_send_after_close_is_rejected() {
        let registry = registry();
        registry.open("en", "/orders", &Payload::new());
        registry.close("/orders");

        let err = registry.send("/orders", &json!({"a": 1})).unwrap_err();
        assert!(matches!(err, WsError::UnknownChannel(_)));
    }

    #[tokio::test]
    async fn test_send_while_connecting_is_rejected() {
        let registry = registry();
        registry.open("en", "/orders", &Payload::new());
        let err = registry.send("/orders", &json!({"a": 1})).unwrap_err();
        assert!(matches!(err, WsError::NotOpen { .. }));
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = registry();
        assert_eq!(registry.close_all(), 0);

        let a = registry.open("en", "/a", &Payload::new());
        let b = registry.open("en", "/b", &Payload::new());
        let mut channels = registry.channels();
        channels.sort();
        assert_eq!(channels, vec!["/a".to_string(), "/b".to_string()]);

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert_eq!(a.state(), ReadyState::Closing);
        assert_eq!(b.state(), ReadyState::Closing);
    }

    #[test]
    fn test_rejection_reason_by_error_kind() {
        let not_open = WsError::NotOpen {
            channel: "/orders".to_string(),
            state: ReadyState::Closed,
        };
        assert_eq!(rejection_reason(&not_open), RejectReason::NotConnected);
        assert_eq!(
            rejection_reason(&WsError::UnknownChannel("/orders".to_string())),
            RejectReason::NotConnected
        );
        assert_eq!(
            rejection_reason(&WsError::SendFailed("outbound queue full".to_string())),
            RejectReason::SendFailed
        );
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            rejection_reason(&WsError::Json(json_err)),
            RejectReason::Serialize
        );
        assert_eq!(RejectReason::SendFailed.as_str(), "send_failed");
    }

    #[tokio::test]
    async fn test_registries_are_isolated() {
        let one = registry();
        let two = registry();
        one.open("en", "/orders", &Payload::new());
        assert!(two.get("/orders").is_none());
    }
}
