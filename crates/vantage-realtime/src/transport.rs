//! Physical transport behind the client.
//!
//! A [`Connector`] opens one connection and hands back a text-frame sink and
//! a text-frame stream. The stream ending, or yielding an error, means the
//! connection is gone.

use crate::error::RealtimeError;
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = RealtimeError> + Send>>;

/// Inbound half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, RealtimeError>> + Send>>;

/// Opens physical connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection to `url`.
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), RealtimeError>;
}

/// WebSocket transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a WebSocket connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), RealtimeError> {
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;

        let (ws_sink, ws_stream) = ws.split();

        let sink = ws_sink.with(|text: String| async move {
            Ok::<_, RealtimeError>(Message::Text(text.into()))
        });

        let stream = ws_stream.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        debug!(len = data.len(), "Ignoring non-UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!(frame = ?frame, "Close frame received");
                    Some(Err(RealtimeError::ConnectionClosed))
                }
                // tungstenite answers pings on its own.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
                Err(e) => Some(Err(RealtimeError::from(e))),
            }
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// In-process transport.
///
/// Each successful `open` produces a [`MemorySession`] on the paired
/// [`MemoryServer`], which plays the server side of the connection.
/// Available to downstream tests with the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub mod memory {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[derive(Debug)]
    struct Shared {
        refuse: AtomicBool,
        attempts: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    /// Client half of the in-process transport.
    #[derive(Debug, Clone)]
    pub struct MemoryConnector {
        shared: Arc<Shared>,
        sessions: mpsc::UnboundedSender<MemorySession>,
    }

    /// Server half of the in-process transport.
    #[derive(Debug)]
    pub struct MemoryServer {
        shared: Arc<Shared>,
        sessions: mpsc::UnboundedReceiver<MemorySession>,
    }

    /// One accepted connection, seen from the server.
    #[derive(Debug)]
    pub struct MemorySession {
        from_client: fmpsc::UnboundedReceiver<String>,
        to_client: fmpsc::UnboundedSender<Result<String, RealtimeError>>,
    }

    /// Create a connected connector/server pair.
    pub fn pair() -> (MemoryConnector, MemoryServer) {
        let shared = Arc::new(Shared {
            refuse: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MemoryConnector {
                shared: shared.clone(),
                sessions: tx,
            },
            MemoryServer {
                shared,
                sessions: rx,
            },
        )
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), RealtimeError> {
            self.shared.attempts.fetch_add(1, Ordering::SeqCst);
            self.shared.urls.lock().push(url.to_string());

            if self.shared.refuse.load(Ordering::SeqCst) {
                return Err(RealtimeError::Connect("connection refused".to_string()));
            }

            let (client_tx, from_client) = fmpsc::unbounded();
            let (to_client, client_rx) = fmpsc::unbounded();

            self.sessions
                .send(MemorySession {
                    from_client,
                    to_client,
                })
                .map_err(|_| RealtimeError::Connect("server gone".to_string()))?;

            let sink = client_tx.sink_map_err(|_| RealtimeError::ConnectionClosed);
            Ok((Box::pin(sink), Box::pin(client_rx)))
        }
    }

    impl MemoryServer {
        /// Wait for the next connection.
        pub async fn accept(&mut self) -> Option<MemorySession> {
            self.sessions.recv().await
        }

        /// Take an already-opened connection, if any.
        pub fn try_accept(&mut self) -> Option<MemorySession> {
            self.sessions.try_recv().ok()
        }

        /// Refuse (or stop refusing) new connections.
        pub fn set_refuse(&self, refuse: bool) {
            self.shared.refuse.store(refuse, Ordering::SeqCst);
        }

        /// Connect attempts seen so far, refused ones included.
        pub fn attempts(&self) -> usize {
            self.shared.attempts.load(Ordering::SeqCst)
        }

        /// URLs of every attempt.
        pub fn urls(&self) -> Vec<String> {
            self.shared.urls.lock().clone()
        }
    }

    impl MemorySession {
        /// Push a frame to the client.
        pub fn send(&self, text: impl Into<String>) -> bool {
            self.to_client.unbounded_send(Ok(text.into())).is_ok()
        }

        /// Next frame written by the client; `None` once the client closed.
        pub async fn recv(&mut self) -> Option<String> {
            self.from_client.next().await
        }

        /// Next frame already written by the client, without waiting.
        pub fn try_recv(&mut self) -> Option<String> {
            self.from_client.try_recv().ok()
        }

        /// Fail the connection with a transport error.
        pub fn fail(&self, reason: &str) {
            let _ = self
                .to_client
                .unbounded_send(Err(RealtimeError::Transport(reason.to_string())));
        }

        /// Close the connection from the server side.
        pub fn close(self) {
            drop(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory;
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let (connector, mut server) = memory::pair();
        let url = Url::parse("ws://dashboard.local/ws").unwrap();

        let (mut sink, mut stream) = connector.open(&url).await.unwrap();
        let mut session = server.accept().await.unwrap();

        sink.send("hello".to_string()).await.unwrap();
        assert_eq!(session.recv().await.as_deref(), Some("hello"));

        assert!(session.send("world"));
        assert_eq!(stream.next().await.unwrap().unwrap(), "world");

        session.close();
        assert!(stream.next().await.is_none());
        assert_eq!(server.attempts(), 1);
        assert_eq!(server.urls(), vec!["ws://dashboard.local/ws".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_refuse() {
        let (connector, server) = memory::pair();
        server.set_refuse(true);

        let url = Url::parse("ws://dashboard.local/ws").unwrap();
        assert!(matches!(
            connector.open(&url).await,
            Err(RealtimeError::Connect(_))
        ));
        assert_eq!(server.attempts(), 1);
    }

    #[tokio::test]
    async fn test_websocket_connect_refused() {
        // Port 9 (discard) is essentially never open on a test host.
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let result = WebSocketConnector::new().open(&url).await;
        assert!(matches!(result, Err(RealtimeError::Connect(_))));
    }
}
