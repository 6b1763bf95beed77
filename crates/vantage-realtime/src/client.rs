//! The multiplexing client.
//!
//! One [`RealtimeClient`] owns at most one physical connection, driven by a
//! background task. Consumers register callbacks per channel; the task keeps
//! the server's view of declared channels in line with the registry, routes
//! inbound frames, and reconnects when the transport drops.
//!
//! ```text
//!  subscribe() ──► registry ──first/last──► pending ──wake──┐
//!                                                           ▼
//!  server ◄── subscribe/unsubscribe frames ◄──── connection task
//!  server ──► frames ──► router ──► callbacks (snapshotted)
//! ```

use crate::channel::Channel;
use crate::config::RealtimeConfig;
use crate::envelope::Envelope;
use crate::error::{RealtimeError, Result};
use crate::pending::{Intent, PendingQueue};
use crate::protocol::ClientCommand;
use crate::reconnect::{ReconnectController, ReconnectPolicy};
use crate::registry::{Callback, Removal, SubscriberId, SubscriptionRegistry};
use crate::router::{self, RouteOutcome};
use crate::state::{ClientStats, ConnectionState, StatsCounters};
use crate::transport::{Connector, FrameSink, FrameStream, WebSocketConnector};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Tunables for a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Delay schedule between connect attempts.
    pub reconnect: ReconnectPolicy,
    /// Bound on one connect attempt.
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Registry and pending queue share one lock so that "declare everything
/// and clear the queue" on connect cannot interleave with a subscribe.
#[derive(Debug, Default)]
struct Shared {
    registry: SubscriptionRegistry,
    pending: PendingQueue,
}

struct Session {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub(crate) struct Inner {
    shared: Mutex<Shared>,
    connector: Arc<dyn Connector>,
    options: ClientOptions,
    status_tx: watch::Sender<ConnectionState>,
    wake: Notify,
    session: Mutex<Option<Session>>,
    generation: AtomicU64,
    client_id: RwLock<Option<String>>,
    stats: StatsCounters,
}

enum SessionEnd {
    Cancelled,
    Lost(RealtimeError),
}

/// Real-time event client.
///
/// Create one per application and share it (for example behind an `Arc`).
/// Dropping the client stops its connection.
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    /// Create a WebSocket client with default options.
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
    }

    /// Create a WebSocket client.
    pub fn with_options(options: ClientOptions) -> Self {
        Self::with_connector(WebSocketConnector::new(), options)
    }

    /// Create a client over a custom transport.
    pub fn with_connector(connector: impl Connector, options: ClientOptions) -> Self {
        let (status_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared::default()),
                connector: Arc::new(connector),
                options,
                status_tx,
                wake: Notify::new(),
                session: Mutex::new(None),
                generation: AtomicU64::new(0),
                client_id: RwLock::new(None),
                stats: StatsCounters::default(),
            }),
        }
    }

    /// Create a WebSocket client from loaded configuration.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::with_options(config.client_options())
    }

    /// Open the shared connection.
    ///
    /// Returns immediately. Does nothing if a connection is already open or
    /// being established. Failures are logged and retried in the background.
    pub fn connect(&self, url: &str) {
        let url = match parse_endpoint(url) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %url, error = %e, "Refusing to connect");
                return;
            }
        };

        let mut session = self.inner.session.lock();
        if let Some(active) = session.as_ref() {
            if !active.task.is_finished() {
                debug!(url = %url, "Connect ignored, connection already active");
                return;
            }
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                error!(url = %url, error = %RealtimeError::NoRuntime, "Cannot connect");
                return;
            }
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();

        self.inner.status_tx.send_replace(ConnectionState::Connecting);
        info!(url = %url, "Connecting");

        let task = handle.spawn(run_connection(
            self.inner.clone(),
            url,
            cancel.clone(),
            generation,
        ));

        *session = Some(Session {
            generation,
            cancel,
            task,
        });
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Subscriptions are kept; they are re-declared on the next `connect`.
    pub fn disconnect(&self) {
        let mut session = self.inner.session.lock();
        if let Some(active) = session.take() {
            active.cancel.cancel();
            info!("Disconnected");
        }
        *self.inner.client_id.write() = None;
        self.inner
            .status_tx
            .send_replace(ConnectionState::Disconnected);
    }

    /// Check whether the connection is open.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Current connection state.
    pub fn status(&self) -> ConnectionState {
        *self.inner.status_tx.borrow()
    }

    /// Watch connection state changes.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.inner.status_tx.subscribe()
    }

    /// Client id assigned by the server on the current connection.
    pub fn client_id(&self) -> Option<String> {
        self.inner.client_id.read().clone()
    }

    /// Register a callback for a channel.
    ///
    /// The channel is declared to the server when it gains its first
    /// subscriber. The returned handle is the only way to unsubscribe.
    pub fn subscribe<F>(&self, channel: impl Into<Channel>, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.add(channel.into(), Arc::new(callback))
    }

    /// Register an already shared callback.
    pub fn subscribe_callback(
        &self,
        channel: impl Into<Channel>,
        callback: Callback,
    ) -> SubscriptionHandle {
        self.inner.add(channel.into(), callback)
    }

    /// Channels with at least one subscriber, sorted.
    pub fn active_channels(&self) -> Vec<Channel> {
        self.inner.shared.lock().registry.channels()
    }

    /// Number of subscribers on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.shared.lock().registry.subscriber_count(channel)
    }

    /// Get client statistics.
    pub fn stats(&self) -> ClientStats {
        self.inner.stats.snapshot()
    }
}

impl Default for RealtimeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(active) = self.inner.session.lock().take() {
            active.cancel.cancel();
        }
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("status", &self.status())
            .field("channels", &self.inner.shared.lock().registry.channel_count())
            .finish()
    }
}

fn parse_endpoint(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| RealtimeError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(RealtimeError::InvalidUrl(format!(
            "unsupported scheme: {}",
            other
        ))),
    }
}

impl Inner {
    fn add(self: &Arc<Self>, channel: Channel, callback: Callback) -> SubscriptionHandle {
        let id = SubscriberId::new();
        let first = {
            let mut shared = self.shared.lock();
            let first = shared.registry.subscribe(channel.clone(), id, callback);
            if first {
                shared.pending.record(channel.clone(), Intent::Subscribe);
            }
            first
        };

        if first {
            debug!(channel = %channel, "First subscriber, declaring channel");
            self.wake.notify_one();
        } else {
            debug!(channel = %channel, subscriber = %id, "Subscriber added");
        }

        SubscriptionHandle {
            inner: Arc::downgrade(self),
            channel,
            id,
            active: AtomicBool::new(true),
        }
    }

    fn remove(&self, channel: &Channel, id: SubscriberId) {
        let removal = {
            let mut shared = self.shared.lock();
            let removal = shared.registry.unsubscribe(channel.as_str(), id);
            if removal == Removal::LastRemoved {
                shared.pending.record(channel.clone(), Intent::Unsubscribe);
            }
            removal
        };

        match removal {
            Removal::LastRemoved => {
                debug!(channel = %channel, "Last subscriber left, withdrawing channel");
                self.wake.notify_one();
            }
            Removal::Removed => debug!(channel = %channel, subscriber = %id, "Subscriber removed"),
            Removal::NotFound => {}
        }
    }

    /// Publish a state change unless a newer `connect`/`disconnect` took over.
    fn set_state(&self, generation: u64, state: ConnectionState) -> bool {
        let session = self.session.lock();
        if session.as_ref().map(|s| s.generation) != Some(generation) {
            return false;
        }
        self.status_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        true
    }

    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        let timeout = self.options.connect_timeout;
        match tokio::time::timeout(timeout, self.connector.open(url)).await {
            Ok(result) => result,
            Err(_) => Err(RealtimeError::ConnectTimeout(timeout.as_millis() as u64)),
        }
    }

    async fn send_command(&self, sink: &mut FrameSink, command: ClientCommand) -> Result<()> {
        let frame = command.to_frame()?;
        sink.send(frame).await?;
        StatsCounters::incr(&self.stats.commands_sent);
        debug!(
            command = ?command,
            count = command.events().len(),
            "Command sent"
        );
        Ok(())
    }

    async fn run_session(
        &self,
        mut sink: FrameSink,
        mut stream: FrameStream,
        cancel: &CancellationToken,
        generation: u64,
    ) -> SessionEnd {
        // Nothing is declared on a fresh socket: declare the whole registry
        // and drop whatever was queued for the previous one.
        let declared = {
            let mut shared = self.shared.lock();
            shared.pending.clear();
            shared.registry.channels()
        };

        let count = declared.len();
        if !declared.is_empty() {
            let command = ClientCommand::Subscribe { events: declared };
            if let Err(e) = self.send_command(&mut sink, command).await {
                return SessionEnd::Lost(e);
            }
        }

        // Ready only once the server holds the channel set.
        if !self.set_state(generation, ConnectionState::Connected) {
            return SessionEnd::Cancelled;
        }
        StatsCounters::incr(&self.stats.connections);
        info!(channels = count, "Connected");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "Close failed");
                    }
                    return SessionEnd::Cancelled;
                }

                _ = self.wake.notified() => {
                    // Let same-tick intents land in one flush.
                    tokio::task::yield_now().await;
                    let flush = self.shared.lock().pending.take();
                    for command in flush.into_commands() {
                        if let Err(e) = self.send_command(&mut sink, command).await {
                            return SessionEnd::Lost(e);
                        }
                    }
                }

                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text, generation),
                    Some(Err(e)) => return SessionEnd::Lost(e),
                    None => return SessionEnd::Lost(RealtimeError::ConnectionClosed),
                },
            }
        }
    }

    fn handle_frame(&self, text: &str, generation: u64) {
        StatsCounters::incr(&self.stats.frames_received);

        let outcome = router::route(text, |channel| self.shared.lock().registry.callbacks(channel));

        match outcome {
            RouteOutcome::Connection(info) => {
                info!(
                    client_id = info.client_id.as_deref().unwrap_or("-"),
                    status = %info.status,
                    "Connection acknowledged"
                );
                *self.client_id.write() = info.client_id;
                self.set_state(generation, ConnectionState::Connected);
            }
            RouteOutcome::Confirmed(_) => {
                StatsCounters::incr(&self.stats.confirmations);
            }
            RouteOutcome::Dispatched(dispatch) => {
                StatsCounters::add(&self.stats.envelopes_delivered, dispatch.delivered as u64);
                StatsCounters::add(&self.stats.callback_panics, dispatch.panicked as u64);
            }
            RouteOutcome::NoSubscribers => {
                StatsCounters::incr(&self.stats.frames_unrouted);
            }
            RouteOutcome::Malformed => {
                StatsCounters::incr(&self.stats.frames_malformed);
            }
        }
    }
}

async fn run_connection(
    inner: Arc<Inner>,
    url: Url,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut controller = ReconnectController::new(inner.options.reconnect.clone());
    let mut ever_connected = false;

    loop {
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = inner.open(&url) => result,
        };

        match attempt {
            Ok((sink, stream)) => {
                controller.reset();
                ever_connected = true;
                match inner.run_session(sink, stream, &cancel, generation).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Lost(e) => warn!(url = %url, error = %e, "Connection lost"),
                }
            }
            Err(e) => {
                warn!(
                    url = %url,
                    attempt = controller.attempts() + 1,
                    error = %e,
                    "Connect attempt failed"
                );
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        *inner.client_id.write() = None;
        let waiting = if ever_connected {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Disconnected
        };
        if !inner.set_state(generation, waiting) {
            break;
        }

        let delay = controller.next_delay();
        StatsCounters::incr(&inner.stats.reconnect_attempts);
        info!(
            attempt = controller.attempts(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        if !ever_connected && !inner.set_state(generation, ConnectionState::Connecting) {
            break;
        }
    }

    debug!(url = %url, "Connection task stopped");
}

/// Handle to one subscription.
///
/// Dropping the handle does not unsubscribe; call [`unsubscribe`] or wrap
/// it in a [`ScopedSubscription`](crate::adapter::ScopedSubscription).
///
/// [`unsubscribe`]: SubscriptionHandle::unsubscribe
#[must_use = "the handle is the only way to unsubscribe"]
pub struct SubscriptionHandle {
    inner: Weak<Inner>,
    channel: Channel,
    id: SubscriberId,
    active: AtomicBool,
}

impl SubscriptionHandle {
    /// Remove this subscription. Calling it again does nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(&self.channel, self.id);
        }
    }

    /// Channel this subscription listens on.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Subscriber identity.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Check whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
