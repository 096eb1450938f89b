//! A single WebSocket connection handle.
//!
//! Construction returns immediately in `Connecting`; a background task
//! performs the handshake and then pumps frames in both directions until the
//! connection ends. State follows `Connecting -> Open -> Closing -> Closed`
//! and every transition is observable through [`WsConnection::state_changes`].

use crate::error::{WsError, WsResult};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Close code for connections that ended without a close frame.
const ABNORMAL_CLOSE: u16 = 1006;
/// Close code sent on a caller-requested close.
const NORMAL_CLOSE: u16 = 1000;

/// Connection state, mirroring the browser WebSocket `readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake completed.
    Open,
    /// Inbound text frame. Parsing is up to the caller.
    Text(String),
    /// Inbound binary frame.
    Binary(Vec<u8>),
    /// Handshake or transport error. Always followed by `Closed`.
    Error(String),
    /// Connection finished. Always the last event.
    Closed { code: u16, reason: String },
}

struct Inner {
    id: Uuid,
    channel: String,
    url: String,
    state: watch::Sender<ReadyState>,
    outbound_tx: mpsc::Sender<String>,
    /// Held until the caller takes it; events buffer meanwhile.
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>,
    shutdown_token: CancellationToken,
}

/// Cloneable handle to one WebSocket connection.
#[derive(Clone)]
pub struct WsConnection {
    inner: Arc<Inner>,
}

impl fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.inner.id)
            .field("channel", &self.inner.channel)
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

impl WsConnection {
    /// Start connecting to `url` and return the handle in `Connecting`.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(channel: impl Into<String>, url: impl Into<String>, outbound_buffer: usize) -> Self {
        crate::init_crypto();

        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_buffer.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ReadyState::Connecting);

        let inner = Arc::new(Inner {
            id: Uuid::new_v4(),
            channel: channel.into(),
            url: url.into(),
            state,
            outbound_tx,
            events_rx: Mutex::new(Some(events_rx)),
            shutdown_token: CancellationToken::new(),
        });

        tokio::spawn(run_connection(inner.clone(), outbound_rx, events_tx));

        Self { inner }
    }

    /// Unique id of this connection object.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Get current connection state.
    pub fn state(&self) -> ReadyState {
        *self.inner.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ReadyState::Open
    }

    /// Subscribe to state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ReadyState> {
        self.inner.state.subscribe()
    }

    /// Wait until the connection reaches `target` or `Closed`, whichever
    /// comes first, and return the state reached.
    pub async fn wait_for_state(&self, target: ReadyState) -> ReadyState {
        let mut rx = self.state_changes();
        let result = rx
            .wait_for(|s| *s == target || *s == ReadyState::Closed)
            .await
            .map(|s| *s);
        // The sender lives in `inner`, which we hold, so the channel cannot close.
        result.unwrap_or(ReadyState::Closed)
    }

    /// Take the inbound event stream. Returns `None` after the first call.
    ///
    /// Events raised before the stream is taken are buffered, so a caller
    /// taking it right after construction still sees `Open`.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectionEvent>> {
        self.inner.events_rx.lock().take()
    }

    /// Queue a text frame. Fails unless the connection is `Open`.
    pub fn send_text(&self, text: String) -> WsResult<()> {
        let state = self.state();
        if state != ReadyState::Open {
            return Err(WsError::NotOpen {
                channel: self.inner.channel.clone(),
                state,
            });
        }

        self.inner.outbound_tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                WsError::SendFailed("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                WsError::SendFailed("connection task stopped".to_string())
            }
        })
    }

    /// Serialize `message` as JSON and queue it as a text frame.
    pub fn send_json<T: Serialize + ?Sized>(&self, message: &T) -> WsResult<()> {
        let state = self.state();
        if state != ReadyState::Open {
            return Err(WsError::NotOpen {
                channel: self.inner.channel.clone(),
                state,
            });
        }
        let text = serde_json::to_string(message)?;
        self.send_text(text)
    }

    /// Request closure. No-op once `Closing` or `Closed`.
    ///
    /// The state moves to `Closing` immediately; the task sends a close frame
    /// (or abandons the handshake) and finishes in `Closed`.
    pub fn close(&self) {
        let requested = self.inner.state.send_if_modified(|s| match s {
            ReadyState::Connecting | ReadyState::Open => {
                *s = ReadyState::Closing;
                true
            }
            ReadyState::Closing | ReadyState::Closed => false,
        });

        if requested {
            debug!(channel = %self.inner.channel, id = %self.inner.id, "Close requested");
        }
        self.inner.shutdown_token.cancel();
    }
}

async fn run_connection(
    inner: Arc<Inner>,
    mut outbound_rx: mpsc::Receiver<String>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let (code, reason) = match drive(&inner, &mut outbound_rx, &events_tx).await {
        Ok(close) => close,
        Err(e) => {
            error!(channel = %inner.channel, ?e, "WebSocket connection error");
            let _ = events_tx.send(ConnectionEvent::Error(e.to_string()));
            (ABNORMAL_CLOSE, e.to_string())
        }
    };

    inner.state.send_replace(ReadyState::Closed);
    info!(channel = %inner.channel, code, %reason, "WebSocket closed");
    let _ = events_tx.send(ConnectionEvent::Closed { code, reason });
}

/// Handshake, then pump frames until either side closes.
///
/// Returns the close code and reason on an orderly finish.
async fn drive(
    inner: &Inner,
    outbound_rx: &mut mpsc::Receiver<String>,
    events_tx: &mpsc::UnboundedSender<ConnectionEvent>,
) -> WsResult<(u16, String)> {
    info!(channel = %inner.channel, url = %inner.url, "Connecting to WebSocket");

    let ws_stream = tokio::select! {
        biased;

        () = inner.shutdown_token.cancelled() => {
            info!(channel = %inner.channel, "Closed before handshake completed");
            return Ok((ABNORMAL_CLOSE, "closed before open".to_string()));
        }

        // TCP_NODELAY for lower latency (disable Nagle's algorithm)
        result = connect_async_tls_with_config(inner.url.as_str(), None, true, None) => {
            let (ws_stream, _response) = result?;
            ws_stream
        }
    };

    // A close requested during the handshake already moved us to Closing.
    let opened = inner.state.send_if_modified(|s| {
        if *s == ReadyState::Connecting {
            *s = ReadyState::Open;
            true
        } else {
            false
        }
    });
    if opened {
        info!(channel = %inner.channel, "WebSocket connected");
        let _ = events_tx.send(ConnectionEvent::Open);
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            // Shutdown signal - highest priority (biased)
            biased;

            () = inner.shutdown_token.cancelled() => {
                info!(channel = %inner.channel, "Close signal received in message loop");
                // Frames accepted before the close go out ahead of the close frame.
                while let Ok(text) = outbound_rx.try_recv() {
                    write.send(Message::Text(text)).await?;
                }
                if let Err(e) = write.send(Message::Close(None)).await {
                    warn!(?e, "Failed to send Close frame");
                }
                return Ok((NORMAL_CLOSE, String::new()));
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events_tx.send(ConnectionEvent::Text(text));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let _ = events_tx.send(ConnectionEvent::Binary(data));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((NORMAL_CLOSE, String::new()));
                        warn!(channel = %inner.channel, code, %reason, "WebSocket closed by server");
                        inner.state.send_replace(ReadyState::Closing);
                        return Ok((code, reason));
                    }
                    Some(Err(e)) => {
                        error!(channel = %inner.channel, ?e, "WebSocket read error");
                        return Err(e.into());
                    }
                    None => {
                        warn!(channel = %inner.channel, "WebSocket stream ended");
                        return Err(WsError::ConnectionClosed {
                            code: ABNORMAL_CLOSE,
                            reason: "stream ended".to_string(),
                        });
                    }
                    _ => {}
                }
            }

            outbound = outbound_rx.recv() => {
                if let Some(text) = outbound {
                    write.send(Message::Text(text)).await?;
                }
            }
        }
    }
}
