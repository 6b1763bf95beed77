//! Local WebSocket server for integration tests.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use vantage_realtime::{ClientOptions, ConnectionState, RealtimeClient, ReconnectPolicy};

/// How long a test waits for anything before failing.
pub const WAIT: Duration = Duration::from_secs(5);

/// Server accepting WebSocket connections on an ephemeral port.
pub struct TestServer {
    pub url: String,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    task: JoinHandle<()>,
}

/// Server side of one accepted connection.
pub struct ServerConnection {
    ws: WebSocketStream<TcpStream>,
}

impl TestServer {
    /// Bind and start accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, connections) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                if tx.send(ServerConnection { ws }).is_err() {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://{}/ws", addr),
            connections,
            task,
        }
    }

    /// Wait for the next client.
    pub async fn accept(&mut self) -> ServerConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("no client connected")
            .expect("server stopped")
    }

    /// Next client if one connects within `wait`.
    pub async fn accept_within(&mut self, wait: Duration) -> Option<ServerConnection> {
        tokio::time::timeout(wait, self.connections.recv())
            .await
            .ok()
            .flatten()
    }

    /// Wait for the next client and greet it like the dashboard backend does.
    pub async fn accept_with_greeting(&mut self, client_id: &str) -> ServerConnection {
        let mut conn = self.accept().await;
        conn.send(&format!(
            r#"{{"type":"connection","status":"connected","client_id":"{}"}}"#,
            client_id
        ))
        .await;
        conn
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ServerConnection {
    /// Send a text frame.
    pub async fn send(&mut self, text: &str) {
        self.ws.send(Message::Text(text.into())).await.unwrap();
    }

    /// Send a binary frame.
    pub async fn send_binary(&mut self, bytes: &[u8]) {
        self.ws.send(Message::Binary(bytes.to_vec().into())).await.unwrap();
    }

    /// Next text frame from the client, parsed as JSON.
    pub async fn recv_json(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("no frame from client")
                .expect("client went away")
                .unwrap();
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    /// Whether the client closes the connection within the wait period.
    pub async fn closed_by_client(&mut self) -> bool {
        let result = tokio::time::timeout(WAIT, async {
            loop {
                match self.ws.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        result.unwrap_or(false)
    }

    /// Close from the server side.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Client with a short reconnect delay.
pub fn fast_client() -> RealtimeClient {
    RealtimeClient::with_options(ClientOptions {
        reconnect: ReconnectPolicy::fixed(Duration::from_millis(50)),
        connect_timeout: Duration::from_secs(2),
    })
}

/// Wait until the client reports `state`.
pub async fn wait_for_state(client: &RealtimeClient, state: ConnectionState) {
    let mut rx = client.watch_status();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached")
        .unwrap();
}

/// Poll `check` until it holds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
