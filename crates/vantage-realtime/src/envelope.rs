//! Data envelopes delivered to subscribers.

use crate::channel::Channel;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A data frame received on a channel.
///
/// The payload is opaque to the client; subscribers decide what it means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Channel the frame was published on.
    #[serde(rename = "type")]
    pub channel: Channel,

    /// Server timestamp, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Number>,

    /// Event payload data.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(
        channel: impl Into<Channel>,
        timestamp: Option<serde_json::Number>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            timestamp,
            data,
        }
    }

    /// Timestamp as a float, if the server sent one.
    pub fn timestamp_f64(&self) -> Option<f64> {
        self.timestamp.as_ref().and_then(|n| n.as_f64())
    }

    /// Deserialize the payload into a concrete type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}
