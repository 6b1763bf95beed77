//! Wire protocol for the shared stream.
//!
//! ```json
//! // client -> server
//! {"type": "subscribe", "events": ["portfolio_update", "market_data_BTC"]}
//! {"type": "unsubscribe", "events": ["market_data_BTC"]}
//!
//! // server -> client, control
//! {"type": "connection", "status": "connected", "client_id": "c-123"}
//! {"type": "subscription_confirmed", "subscribed_events": ["portfolio_update"]}
//!
//! // server -> client, data
//! {"type": "portfolio_update", "timestamp": 1700000000000, "data": {...}}
//! ```

use crate::channel::Channel;
use crate::envelope::Envelope;
use crate::error::RealtimeError;
use serde::{Deserialize, Serialize};

/// `type` of the connection handshake frame.
pub const CONNECTION_TYPE: &str = "connection";

/// `type` of the subscription acknowledgement frame.
pub const SUBSCRIPTION_CONFIRMED_TYPE: &str = "subscription_confirmed";

/// Commands the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Declare interest in channels.
    Subscribe { events: Vec<Channel> },
    /// Withdraw interest in channels.
    Unsubscribe { events: Vec<Channel> },
}

impl ClientCommand {
    /// Serialize to a text frame.
    pub fn to_frame(&self) -> Result<String, RealtimeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Channels carried by the command.
    pub fn events(&self) -> &[Channel] {
        match self {
            ClientCommand::Subscribe { events } | ClientCommand::Unsubscribe { events } => events,
        }
    }
}

/// Connection handshake sent by the server once the socket is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Handshake status, normally `connected`.
    #[serde(default)]
    pub status: String,
    /// Server-assigned client id.
    #[serde(default)]
    pub client_id: Option<String>,
}

/// A parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Connection handshake.
    Connection(ConnectionInfo),
    /// Acknowledgement of a subscribe command.
    SubscriptionConfirmed { subscribed_events: Vec<Channel> },
    /// Channel data.
    Data(Envelope),
}

#[derive(Deserialize)]
struct SubscriptionConfirmed {
    #[serde(default)]
    subscribed_events: Vec<Channel>,
}

impl InboundFrame {
    /// Parse a text frame.
    ///
    /// Anything that is not a JSON object with a string `type` is rejected.
    pub fn parse(text: &str) -> Result<Self, RealtimeError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        let frame_type = match value.get("type") {
            Some(serde_json::Value::String(t)) => t.clone(),
            Some(_) => {
                return Err(RealtimeError::MalformedFrame(
                    "type is not a string".to_string(),
                ))
            }
            None if value.is_object() => {
                return Err(RealtimeError::MalformedFrame("missing type".to_string()))
            }
            None => {
                return Err(RealtimeError::MalformedFrame(
                    "frame is not an object".to_string(),
                ))
            }
        };

        match frame_type.as_str() {
            CONNECTION_TYPE => Ok(InboundFrame::Connection(serde_json::from_value(value)?)),
            SUBSCRIPTION_CONFIRMED_TYPE => {
                let confirmed: SubscriptionConfirmed = serde_json::from_value(value)?;
                Ok(InboundFrame::SubscriptionConfirmed {
                    subscribed_events: confirmed.subscribed_events,
                })
            }
            _ => Ok(InboundFrame::Data(serde_json::from_value(value)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_command_wire_format() {
        let cmd = ClientCommand::Subscribe {
            events: vec!["portfolio_update".into(), "market_data_BTC".into()],
        };
        let json: serde_json::Value = serde_json::from_str(&cmd.to_frame().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({"type": "subscribe", "events": ["portfolio_update", "market_data_BTC"]})
        );
    }

    #[test]
    fn test_unsubscribe_command_wire_format() {
        let cmd = ClientCommand::Unsubscribe {
            events: vec!["risk_alert".into()],
        };
        let json: serde_json::Value = serde_json::from_str(&cmd.to_frame().unwrap()).unwrap();
        assert_eq!(json, json!({"type": "unsubscribe", "events": ["risk_alert"]}));
        assert_eq!(cmd.events().len(), 1);
    }

    #[test]
    fn test_parse_connection_frame() {
        let frame =
            InboundFrame::parse(r#"{"type":"connection","status":"connected","client_id":"abc"}"#)
                .unwrap();
        assert_eq!(
            frame,
            InboundFrame::Connection(ConnectionInfo {
                status: "connected".to_string(),
                client_id: Some("abc".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_subscription_confirmed() {
        let frame = InboundFrame::parse(
            r#"{"type":"subscription_confirmed","subscribed_events":["a","b"]}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::SubscriptionConfirmed { subscribed_events } => {
                assert_eq!(subscribed_events, vec![Channel::from("a"), Channel::from("b")]);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_parse_data_frame() {
        let frame = InboundFrame::parse(
            r#"{"type":"portfolio_update","timestamp":42,"data":{"total_value":100000}}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::Data(envelope) => {
                assert_eq!(envelope.channel, "portfolio_update");
                assert_eq!(envelope.data, json!({"total_value": 100000}));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            InboundFrame::parse("not json"),
            Err(RealtimeError::Serialization(_))
        ));
        assert!(matches!(
            InboundFrame::parse("[1,2,3]"),
            Err(RealtimeError::MalformedFrame(_))
        ));
        assert!(matches!(
            InboundFrame::parse(r#"{"data":{}}"#),
            Err(RealtimeError::MalformedFrame(_))
        ));
        assert!(matches!(
            InboundFrame::parse(r#"{"type":7}"#),
            Err(RealtimeError::MalformedFrame(_))
        ));
        assert!(InboundFrame::parse(r#"{"type":"x","timestamp":"yesterday"}"#).is_err());
    }
}
