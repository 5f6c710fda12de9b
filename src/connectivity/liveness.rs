//! Pure liveness decisions for an established connection
//!
//! While `Connected`, the manager periodically checks that both the link and the
//! session are still live. The link is checked first: when both are down the
//! link has to come back before a session can.

use super::phase::ConnectivityState;
use crate::config::ConnectivityPolicy;
use crate::transport::LinkStatus;
use std::time::Duration;

/// Outcome of a liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    Healthy,
    /// Link dropped, recovery restarts at the normal link path
    LinkLost,
    /// Link up but the broker session dropped
    SessionLost,
}

/// Liveness check decision logic
pub struct LivenessMonitor;

impl LivenessMonitor {
    /// Whether a liveness check is due after `elapsed` in `Connected`
    pub fn is_due(elapsed: Duration, policy: &ConnectivityPolicy) -> bool {
        elapsed >= policy.liveness_interval()
    }

    /// Classify the current link and session signals
    pub fn check(link: LinkStatus, session_connected: bool) -> LivenessVerdict {
        if !link.is_up() {
            LivenessVerdict::LinkLost
        } else if !session_connected {
            LivenessVerdict::SessionLost
        } else {
            LivenessVerdict::Healthy
        }
    }

    /// Check if the coarse state allows publishing
    pub fn can_publish(state: ConnectivityState) -> bool {
        state == ConnectivityState::SessionUp
    }

    /// Check if the coarse state allows subscribing
    pub fn can_subscribe(state: ConnectivityState) -> bool {
        state == ConnectivityState::SessionUp
    }
}
