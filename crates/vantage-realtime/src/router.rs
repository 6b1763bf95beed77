//! Inbound frame routing.
//!
//! Every frame is handled on its own: a frame that fails to parse is dropped,
//! and a callback that panics is contained so the remaining callbacks for the
//! frame still run.

use crate::channel::Channel;
use crate::envelope::Envelope;
use crate::protocol::{ConnectionInfo, InboundFrame};
use crate::registry::Callback;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Connection handshake.
    Connection(ConnectionInfo),
    /// Subscription acknowledgement.
    Confirmed(Vec<Channel>),
    /// Data frame handed to the channel's callbacks.
    Dispatched(Dispatch),
    /// Data frame for a channel nobody listens to.
    NoSubscribers,
    /// Unparsable or schema-invalid frame.
    Malformed,
}

/// Per-frame delivery counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatch {
    /// Callbacks that returned normally.
    pub delivered: usize,
    /// Callbacks that panicked.
    pub panicked: usize,
}

/// Parse a text frame and deliver it.
///
/// `lookup` returns the callbacks registered for a channel at the moment the
/// frame is dispatched; it is only called for data frames.
pub fn route<F>(text: &str, lookup: F) -> RouteOutcome
where
    F: FnOnce(&str) -> Vec<Callback>,
{
    let frame = match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, len = text.len(), "Dropping malformed frame");
            return RouteOutcome::Malformed;
        }
    };

    match frame {
        InboundFrame::Connection(info) => RouteOutcome::Connection(info),
        InboundFrame::SubscriptionConfirmed { subscribed_events } => {
            debug!(count = subscribed_events.len(), "Subscription confirmed");
            RouteOutcome::Confirmed(subscribed_events)
        }
        InboundFrame::Data(envelope) => {
            let callbacks = lookup(envelope.channel.as_str());
            if callbacks.is_empty() {
                debug!(channel = %envelope.channel, "No subscribers, frame dropped");
                return RouteOutcome::NoSubscribers;
            }
            RouteOutcome::Dispatched(dispatch(&envelope, &callbacks))
        }
    }
}

/// Invoke each callback once with the envelope.
pub fn dispatch(envelope: &Envelope, callbacks: &[Callback]) -> Dispatch {
    let mut result = Dispatch::default();

    for callback in callbacks {
        match catch_unwind(AssertUnwindSafe(|| callback(envelope))) {
            Ok(()) => result.delivered += 1,
            Err(panic) => {
                result.panicked += 1;
                warn!(
                    channel = %envelope.channel,
                    panic = panic_message(&*panic),
                    "Subscriber callback panicked"
                );
            }
        }
    }

    result
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown"
    }
}
