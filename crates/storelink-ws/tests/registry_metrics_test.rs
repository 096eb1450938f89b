//! Registry size gauge across several registries.
//!
//! Kept in its own test binary so no other test moves the gauge meanwhile.

use storelink_core::Payload;
use storelink_telemetry::Metrics;
use storelink_ws::ConnectionRegistry;

// Nothing listens here; the handshakes fail in the background.
const WS_BASE: &str = "ws://127.0.0.1:9";

#[tokio::test]
async fn test_registry_size_sums_over_registries() {
    let base = Metrics::ws_registry_size();

    let one = ConnectionRegistry::new(WS_BASE, 4);
    let two = ConnectionRegistry::new(WS_BASE, 4);
    one.open("en", "/a", &Payload::new());
    one.open("en", "/b", &Payload::new());
    two.open("en", "/a", &Payload::new());
    assert_eq!(Metrics::ws_registry_size(), base + 3);

    // Replacing an entry does not add one.
    one.open("en", "/a", &Payload::new());
    assert_eq!(Metrics::ws_registry_size(), base + 3);

    assert!(two.close("/a"));
    assert!(!two.close("/a"));
    assert_eq!(Metrics::ws_registry_size(), base + 2);

    drop(one);
    assert_eq!(Metrics::ws_registry_size(), base);

    assert_eq!(two.close_all(), 0);
    assert_eq!(Metrics::ws_registry_size(), base);
}
