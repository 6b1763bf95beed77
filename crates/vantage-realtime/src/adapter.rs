//! Scoped consumers built on [`RealtimeClient::subscribe`].
//!
//! Each adapter registers on creation and unregisters when dropped, so a
//! widget's lifetime is the subscription's lifetime.

use crate::channel::Channel;
use crate::client::{RealtimeClient, SubscriptionHandle};
use crate::envelope::Envelope;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};

/// Subscription that ends when dropped.
#[derive(Debug)]
pub struct ScopedSubscription {
    handle: SubscriptionHandle,
}

impl ScopedSubscription {
    /// Subscribe for as long as the returned value lives.
    pub fn new<F>(client: &RealtimeClient, channel: impl Into<Channel>, callback: F) -> Self
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        Self {
            handle: client.subscribe(channel, callback),
        }
    }

    /// Channel this subscription listens on.
    pub fn channel(&self) -> &Channel {
        self.handle.channel()
    }
}

impl Drop for ScopedSubscription {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

/// Envelopes of one channel as a [`Stream`].
///
/// Buffers without bound; a consumer that stops polling should drop the
/// stream.
#[derive(Debug)]
pub struct EnvelopeStream {
    receiver: mpsc::UnboundedReceiver<Envelope>,
    handle: SubscriptionHandle,
}

impl EnvelopeStream {
    /// Subscribe and stream envelopes.
    pub fn new(client: &RealtimeClient, channel: impl Into<Channel>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = client.subscribe(channel, move |envelope: &Envelope| {
            let _ = sender.send(envelope.clone());
        });
        Self { receiver, handle }
    }

    /// Channel being streamed.
    pub fn channel(&self) -> &Channel {
        self.handle.channel()
    }
}

impl Stream for EnvelopeStream {
    type Item = Envelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for EnvelopeStream {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

impl RealtimeClient {
    /// Stream the envelopes of a channel until the stream is dropped.
    pub fn stream(&self, channel: impl Into<Channel>) -> EnvelopeStream {
        EnvelopeStream::new(self, channel)
    }

    /// Subscribe until the returned guard is dropped.
    pub fn scoped<F>(&self, channel: impl Into<Channel>, callback: F) -> ScopedSubscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        ScopedSubscription::new(self, channel, callback)
    }
}

/// Latest envelope of each of several channels.
///
/// Every update bumps a revision counter; watchers re-read the snapshot when
/// it changes.
#[derive(Debug)]
pub struct MergedView {
    latest: Arc<Mutex<BTreeMap<Channel, Envelope>>>,
    revision: Arc<watch::Sender<u64>>,
    handles: Vec<SubscriptionHandle>,
}

impl MergedView {
    /// Subscribe once to each distinct channel in `channels`.
    pub fn new<I, C>(client: &RealtimeClient, channels: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Channel>,
    {
        let latest = Arc::new(Mutex::new(BTreeMap::new()));
        let revision = Arc::new(watch::channel(0u64).0);

        let distinct: BTreeSet<Channel> = channels.into_iter().map(Into::into).collect();
        let handles = distinct
            .into_iter()
            .map(|channel| {
                let latest = latest.clone();
                let revision = revision.clone();
                client.subscribe(channel, move |envelope: &Envelope| {
                    latest
                        .lock()
                        .insert(envelope.channel.clone(), envelope.clone());
                    revision.send_modify(|rev| *rev += 1);
                })
            })
            .collect();

        Self {
            latest,
            revision,
            handles,
        }
    }

    /// Latest envelope received on a channel.
    pub fn latest(&self, channel: &str) -> Option<Envelope> {
        self.latest.lock().get(channel).cloned()
    }

    /// Latest envelope of every channel heard from so far.
    pub fn snapshot(&self) -> BTreeMap<Channel, Envelope> {
        self.latest.lock().clone()
    }

    /// Current revision.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Watch the revision counter.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Channels merged into the view.
    pub fn channels(&self) -> Vec<Channel> {
        self.handles.iter().map(|h| h.channel().clone()).collect()
    }
}

impl Drop for MergedView {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.unsubscribe();
        }
    }
}
