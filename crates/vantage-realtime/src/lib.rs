//! # Vantage Real-time
//!
//! Multiplexed real-time event client for the Vantage trading dashboard.
//!
//! One persistent WebSocket connection carries many named channels
//! (`portfolio_update`, `market_data_BTC`, ...). Widgets subscribe to the
//! channels they render; the client declares channels to the server as they
//! gain their first subscriber, withdraws them as they lose their last one,
//! and re-declares everything after a reconnect.
//!
//! ## Features
//!
//! - **One connection**: `connect` is idempotent, reconnects never stop
//! - **Batched declarations**: intents recorded in one tick go out as one frame
//! - **Isolation**: malformed frames are dropped, panicking callbacks are contained
//! - **Scoped consumers**: guards, streams and merged views that unsubscribe on drop
//!
//! ## Example
//!
//! ```rust,no_run
//! use vantage_realtime::{channels, RealtimeClient};
//!
//! # async fn run() {
//! let client = RealtimeClient::new();
//!
//! let handle = client.subscribe(channels::PORTFOLIO_UPDATE, |envelope| {
//!     println!("portfolio: {}", envelope.data);
//! });
//!
//! client.connect("ws://127.0.0.1:8000/ws");
//!
//! // ... later, when the widget goes away
//! handle.unsubscribe();
//! client.disconnect();
//! # }
//! ```
//!
//! ## WebSocket Protocol
//!
//! ### Client -> Server Messages
//!
//! ```json
//! {"type": "subscribe", "events": ["portfolio_update", "market_data_BTC"]}
//! {"type": "unsubscribe", "events": ["market_data_BTC"]}
//! ```
//!
//! ### Server -> Client Messages
//!
//! ```json
//! {"type": "connection", "status": "connected", "client_id": "c-123"}
//! {"type": "subscription_confirmed", "subscribed_events": ["portfolio_update"]}
//! {"type": "portfolio_update", "timestamp": 1700000000000, "data": {"total_value": 100000}}
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                RealtimeClient                │
//! │  ┌────────────────────────────────────────┐  │
//! │  │  Mutex<Shared>                         │  │
//! │  │    registry: channel -> [callbacks]    │  │
//! │  │    pending:  channel -> intent         │  │
//! │  └───────────────┬────────────────────────┘  │
//! │            wake  │                           │
//! │  ┌───────────────▼────────────────────────┐  │
//! │  │  Connection task                       │  │
//! │  │    connect / reconnect (policy)        │  │
//! │  │    flush intents -> Connector sink     │  │
//! │  │    Connector stream -> router          │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod channel;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod observability;
pub mod pending;
pub mod protocol;
pub mod reconnect;
pub mod registry;
pub mod router;
pub mod state;
pub mod transport;

// Re-export main types
pub use adapter::{EnvelopeStream, MergedView, ScopedSubscription};
pub use channel::{channels, Channel};
pub use client::{ClientOptions, RealtimeClient, SubscriptionHandle, DEFAULT_CONNECT_TIMEOUT};
pub use config::{RealtimeConfig, ReconnectConfig, ReconnectStrategy};
pub use envelope::Envelope;
pub use error::{RealtimeError, Result};
pub use observability::{init_logging, LogFormat};
pub use protocol::{ClientCommand, ConnectionInfo, InboundFrame};
pub use reconnect::{ReconnectController, ReconnectPolicy, DEFAULT_RECONNECT_DELAY};
pub use registry::{Callback, SubscriberId};
pub use router::{route, Dispatch, RouteOutcome};
pub use state::{ClientStats, ConnectionState};
pub use transport::{Connector, FrameSink, FrameStream, WebSocketConnector};

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use transport::memory;

    #[test]
    fn test_public_api() {
        let client = RealtimeClient::new();
        assert_eq!(client.status(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert!(client.active_channels().is_empty());
    }

    #[tokio::test]
    async fn test_full_flow() {
        let (connector, mut server) = memory::pair();
        let client = RealtimeClient::with_connector(connector, ClientOptions::default());

        // Subscribe before the socket exists
        let mut stream = client.stream(channels::PORTFOLIO_UPDATE);

        // Connect
        client.connect("ws://dashboard.local/ws");
        let mut session = server.accept().await.unwrap();
        session.send(r#"{"type":"connection","status":"connected","client_id":"c-1"}"#);

        // Declared once
        let frame = session.recv().await.unwrap();
        assert_eq!(frame, r#"{"type":"subscribe","events":["portfolio_update"]}"#);

        // Receive
        session.send(r#"{"type":"portfolio_update","timestamp":5,"data":{"total_value":100000}}"#);
        let envelope = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.data["total_value"], 100000);
        assert_eq!(client.client_id().as_deref(), Some("c-1"));

        // Unmount
        drop(stream);
        let frame = session.recv().await.unwrap();
        assert_eq!(frame, r#"{"type":"unsubscribe","events":["portfolio_update"]}"#);

        // Disconnect
        client.disconnect();
        assert!(!client.is_connected());
        assert!(session.recv().await.is_none());
    }
}
