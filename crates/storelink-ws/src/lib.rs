//! Named WebSocket connections for storelink.
//!
//! One connection per logical channel name:
//! - `open` reuses an OPEN connection or replaces the entry with a new one
//! - `send` transmits JSON on an OPEN channel, rejecting (and logging) otherwise
//! - `close` / `close_all` request closure and drop the entry immediately
//!
//! Inbound frames and state transitions are observed on the returned
//! [`WsConnection`] handle.

pub mod connection;
pub mod error;
pub mod registry;

pub use connection::{ConnectionEvent, ReadyState, WsConnection};
pub use error::{WsError, WsResult};
pub use registry::{channel_url, ConnectionRegistry};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Install the ring provider as the process-wide rustls default.
///
/// `wss://` handshakes build their TLS config from that default. Connections
/// call this themselves; calling it earlier is harmless. A provider installed
/// by someone else first is left in place.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_crypto_installs_default_provider() {
        init_crypto();
        init_crypto();
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }
}
