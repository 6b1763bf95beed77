//! Outbound subscription intents waiting for the transport.
//!
//! The queue stores the latest intent per channel rather than a log of
//! operations. An intent that contradicts the queued one cancels it, so a
//! subscribe followed by an unsubscribe before the next flush costs nothing
//! on the wire.

use crate::channel::Channel;
use crate::protocol::ClientCommand;
use std::collections::BTreeMap;

/// A queued change of interest in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The channel gained its first subscriber.
    Subscribe,
    /// The channel lost its last subscriber.
    Unsubscribe,
}

/// Coalescing intent queue.
#[derive(Debug, Default)]
pub struct PendingQueue {
    intents: BTreeMap<Channel, Intent>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            intents: BTreeMap::new(),
        }
    }

    /// Record an intent, cancelling an opposite queued one.
    pub fn record(&mut self, channel: Channel, intent: Intent) {
        match self.intents.get(&channel) {
            Some(queued) if *queued != intent => {
                self.intents.remove(&channel);
            }
            _ => {
                self.intents.insert(channel, intent);
            }
        }
    }

    /// Queued intent for a channel.
    pub fn get(&self, channel: &str) -> Option<Intent> {
        self.intents.get(channel).copied()
    }

    /// Number of channels with a queued intent.
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Check whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Drain the queue into a flush batch.
    pub fn take(&mut self) -> Flush {
        let mut flush = Flush::default();
        for (channel, intent) in std::mem::take(&mut self.intents) {
            match intent {
                Intent::Subscribe => flush.subscribe.push(channel),
                Intent::Unsubscribe => flush.unsubscribe.push(channel),
            }
        }
        flush
    }

    /// Discard every queued intent.
    pub fn clear(&mut self) {
        self.intents.clear();
    }
}

/// Channels to declare and withdraw in one flush, each list sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Flush {
    /// Channels to subscribe.
    pub subscribe: Vec<Channel>,
    /// Channels to unsubscribe.
    pub unsubscribe: Vec<Channel>,
}

impl Flush {
    /// Check whether the flush carries nothing.
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }

    /// At most one subscribe and one unsubscribe command.
    pub fn into_commands(self) -> Vec<ClientCommand> {
        let mut commands = Vec::with_capacity(2);
        if !self.subscribe.is_empty() {
            commands.push(ClientCommand::Subscribe {
                events: self.subscribe,
            });
        }
        if !self.unsubscribe.is_empty() {
            commands.push(ClientCommand::Unsubscribe {
                events: self.unsubscribe,
            });
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_then_unsubscribe_cancels() {
        let mut queue = PendingQueue::new();
        queue.record("portfolio_update".into(), Intent::Subscribe);
        queue.record("portfolio_update".into(), Intent::Unsubscribe);

        assert!(queue.is_empty());
        assert!(queue.take().is_empty());
    }

    #[test]
    fn test_unsubscribe_then_subscribe_cancels() {
        let mut queue = PendingQueue::new();
        queue.record("news_update".into(), Intent::Unsubscribe);
        queue.record("news_update".into(), Intent::Subscribe);

        assert_eq!(queue.get("news_update"), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_repeated_intent_is_idempotent() {
        let mut queue = PendingQueue::new();
        queue.record("risk_alert".into(), Intent::Subscribe);
        queue.record("risk_alert".into(), Intent::Subscribe);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get("risk_alert"), Some(Intent::Subscribe));
    }

    #[test]
    fn test_take_batches_and_sorts() {
        let mut queue = PendingQueue::new();
        queue.record("c".into(), Intent::Subscribe);
        queue.record("a".into(), Intent::Subscribe);
        queue.record("b".into(), Intent::Unsubscribe);

        let flush = queue.take();
        assert_eq!(flush.subscribe, vec![Channel::from("a"), Channel::from("c")]);
        assert_eq!(flush.unsubscribe, vec![Channel::from("b")]);
        assert!(queue.is_empty());

        let commands = flush.into_commands();
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], ClientCommand::Subscribe { .. }));
        assert!(matches!(commands[1], ClientCommand::Unsubscribe { .. }));
    }

    #[test]
    fn test_ten_channels_one_command() {
        let mut queue = PendingQueue::new();
        for i in 0..10 {
            queue.record(Channel::new(format!("channel_{}", i)), Intent::Subscribe);
        }

        let commands = queue.take().into_commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].events().len(), 10);
    }

    #[test]
    fn test_clear() {
        let mut queue = PendingQueue::new();
        queue.record("x".into(), Intent::Unsubscribe);
        queue.clear();
        assert!(queue.is_empty());
    }
}
