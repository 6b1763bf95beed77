//! Channel names for the real-time stream.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A logical channel on the shared stream.
///
/// Channels are opaque: any string is valid and nothing is registered up
/// front. A channel exists only while it has at least one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    /// Create a channel from any string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The channel name as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Channel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for Channel {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl From<&Channel> for Channel {
    fn from(c: &Channel) -> Self {
        c.clone()
    }
}

impl Borrow<str> for Channel {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Channel {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Channel {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Well-known dashboard channels.
pub mod channels {
    use super::Channel;

    /// Portfolio totals.
    pub const PORTFOLIO_UPDATE: &str = "portfolio_update";
    /// Open positions.
    pub const POSITIONS_UPDATE: &str = "positions_update";
    /// Implied volatility surface.
    pub const VOLATILITY_SURFACE: &str = "volatility_surface";
    /// News headlines.
    pub const NEWS_UPDATE: &str = "news_update";
    /// Assistant-generated insights.
    pub const AI_INSIGHTS: &str = "ai_insights";
    /// Risk limit alerts.
    pub const RISK_ALERT: &str = "risk_alert";
    /// Prediction market odds.
    pub const PREDICTION_MARKETS: &str = "prediction_markets";

    /// Prefix of per-symbol market data channels.
    pub const MARKET_DATA_PREFIX: &str = "market_data_";

    /// Every fixed dashboard channel, excluding per-symbol market data.
    pub const DASHBOARD: &[&str] = &[
        PORTFOLIO_UPDATE,
        POSITIONS_UPDATE,
        VOLATILITY_SURFACE,
        NEWS_UPDATE,
        AI_INSIGHTS,
        RISK_ALERT,
        PREDICTION_MARKETS,
    ];

    /// Market data channel for a symbol, e.g. `market_data_BTC`.
    pub fn market_data(symbol: &str) -> Channel {
        Channel::new(format!("{}{}", MARKET_DATA_PREFIX, symbol.to_uppercase()))
    }
}
