//! Subscription bookkeeping.

use crate::channel::Channel;
use crate::envelope::Envelope;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callback invoked for every envelope on a subscribed channel.
pub type Callback = Arc<dyn Fn(&Envelope) + Send + Sync + 'static>;

/// Identity of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(uuid::Uuid);

impl SubscriberId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// No such subscriber (already removed).
    NotFound,
    /// Removed; the channel still has subscribers.
    Removed,
    /// Removed the channel's last subscriber.
    LastRemoved,
}

struct Listener {
    id: SubscriberId,
    callback: Callback,
}

/// Channel -> listeners map.
///
/// Listeners for a channel are kept in registration order. A channel key
/// exists only while it has at least one listener.
#[derive(Default)]
pub struct SubscriptionRegistry {
    channels: HashMap<Channel, Vec<Listener>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Add a listener. Returns true if it is the channel's first.
    pub fn subscribe(&mut self, channel: Channel, id: SubscriberId, callback: Callback) -> bool {
        let listeners = self.channels.entry(channel).or_default();
        let first = listeners.is_empty();
        listeners.push(Listener { id, callback });
        first
    }

    /// Remove exactly one listener.
    pub fn unsubscribe(&mut self, channel: &str, id: SubscriberId) -> Removal {
        let Some(listeners) = self.channels.get_mut(channel) else {
            return Removal::NotFound;
        };

        let Some(pos) = listeners.iter().position(|l| l.id == id) else {
            return Removal::NotFound;
        };
        listeners.remove(pos);

        if listeners.is_empty() {
            self.channels.remove(channel);
            Removal::LastRemoved
        } else {
            Removal::Removed
        }
    }

    /// Snapshot of the callbacks registered for a channel, in registration order.
    pub fn callbacks(&self, channel: &str) -> Vec<Callback> {
        self.channels
            .get(channel)
            .map(|listeners| listeners.iter().map(|l| l.callback.clone()).collect())
            .unwrap_or_default()
    }

    /// Check whether a channel has any listener.
    pub fn is_active(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Number of listeners on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, Vec::len)
    }

    /// Channels with at least one listener, sorted.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.channels.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Number of active channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total listeners across channels.
    pub fn subscription_count(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.channels.iter().map(|(c, l)| (c.as_str(), l.len())))
            .finish()
    }
}
