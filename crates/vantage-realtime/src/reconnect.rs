//! Reconnect scheduling.
//!
//! There is no attempt limit: the client keeps retrying until `disconnect`.

use std::time::Duration;

/// Delay used when nothing else is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// How long to wait before each reconnect attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed {
        /// Delay between attempts.
        delay: Duration,
    },
    /// Growing delay, capped.
    Exponential {
        /// Delay before the first attempt.
        initial: Duration,
        /// Upper bound on the delay.
        max: Duration,
        /// Growth factor per attempt.
        multiplier: f64,
        /// Add up to 25% random jitter.
        jitter: bool,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Fixed-delay policy.
    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed { delay }
    }

    /// Exponential policy doubling from `initial` up to `max`, without jitter.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        ReconnectPolicy::Exponential {
            initial,
            max,
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            ReconnectPolicy::Fixed { delay } => *delay,
            ReconnectPolicy::Exponential {
                initial,
                max,
                multiplier,
                jitter,
            } => {
                let exponent = attempt.saturating_sub(1).min(64) as i32;
                let base_delay_ms = initial.as_millis() as f64;
                let delay_ms = base_delay_ms * multiplier.powi(exponent);
                let capped = Duration::from_millis(delay_ms.min(max.as_millis() as f64) as u64);

                if *jitter {
                    let jitter_factor = 1.0 + (rand::random::<f64>() * 0.25);
                    Duration::from_millis((capped.as_millis() as f64 * jitter_factor) as u64)
                } else {
                    capped
                }
            }
        }
    }
}

/// Tracks consecutive failed attempts for one connection session.
#[derive(Debug, Clone)]
pub struct ReconnectController {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl ReconnectController {
    /// Create a controller.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Register a failure and return the delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.policy.delay_for_attempt(self.attempt)
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive retries since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
