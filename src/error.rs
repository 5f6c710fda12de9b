//! Error taxonomy for the connectivity core
//!
//! Link and session failures are recovered inside the phase machine and only
//! recorded for diagnostics. `NotConnected` and `InvalidArgument` are returned
//! synchronously from the publish/subscribe surface.

use crate::connectivity::ConnectivityState;
use thiserror::Error;

/// Main error type for connectivity operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetError {
    #[error("Link association timed out after {elapsed_ms}ms ({path} path)")]
    LinkTimeout { path: &'static str, elapsed_ms: u64 },

    #[error("Link association failed: {message}")]
    LinkAssociationFailed { message: String },

    #[error("Session connect failed: {message}")]
    SessionConnectFailed { message: String },

    #[error("Session lost while connected")]
    SessionLost,

    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectivityState },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Publish to {topic} failed: {message}")]
    PublishFailed { topic: String, message: String },

    #[error("Subscribe to {topic} failed: {message}")]
    SubscribeFailed { topic: String, message: String },
}

impl NetError {
    /// Create link association error
    pub fn link_association_failed<S: Into<String>>(message: S) -> Self {
        Self::LinkAssociationFailed {
            message: message.into(),
        }
    }

    /// Create session connect error
    pub fn session_connect_failed<S: Into<String>>(message: S) -> Self {
        Self::SessionConnectFailed {
            message: message.into(),
        }
    }

    /// Create invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether the phase machine recovers from this error on its own
    pub fn is_recovered_locally(&self) -> bool {
        matches!(
            self,
            NetError::LinkTimeout { .. }
                | NetError::LinkAssociationFailed { .. }
                | NetError::SessionConnectFailed { .. }
                | NetError::SessionLost
        )
    }
}

/// Result type for connectivity operations
pub type NetResult<T> = Result<T, NetError>;
