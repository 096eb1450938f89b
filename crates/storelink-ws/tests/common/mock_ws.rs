//! Mock WebSocket server for integration tests.
//!
//! Provides a simple WebSocket server that can:
//! - Accept connections and record the request path and query
//! - Record received text messages
//! - Echo text messages back to the sender

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<Vec<String>>>,
    request_uris: Arc<parking_lot::Mutex<Vec<String>>>,
    closed: Arc<Mutex<u32>>,
}

impl MockWsServer {
    /// Start a new mock WebSocket server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let request_uris = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let uris_clone = request_uris.clone();
        let closed_clone = closed.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            messages_clone.clone(),
                            uris_clone.clone(),
                            closed_clone.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            request_uris,
            closed,
        }
    }

    /// Get the server's WebSocket base URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Path and query of every accepted handshake, in order.
    pub fn request_uris(&self) -> Vec<String> {
        self.request_uris.lock().clone()
    }

    /// Get all received text messages.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    /// Number of connections that have ended.
    pub async fn closed_count(&self) -> u32 {
        *self.closed.lock().await
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<Vec<String>>>,
    request_uris: Arc<parking_lot::Mutex<Vec<String>>>,
    closed: Arc<Mutex<u32>>,
) {
    let callback = |req: &Request, resp: Response| {
        request_uris.lock().push(req.uri().to_string());
        Ok::<Response, ErrorResponse>(resp)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                messages.lock().await.push(text.clone());
                if write.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    *closed.lock().await += 1;
}
