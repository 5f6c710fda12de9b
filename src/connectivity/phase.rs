//! Phases, commands and the coarse externally visible state

use std::fmt;

/// Coarse connectivity as seen by callers, ordered `Disconnected < LinkUp < SessionUp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectivityState {
    Disconnected,
    LinkUp,
    SessionUp,
}

/// Fine grained controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    AwaitFastLink,
    BeginNormalLink,
    AwaitNormalLink,
    AwaitFastPathConfirm,
    AwaitSession,
    Connected,
    /// Waiting for in-flight session traffic to drain before closing
    AwaitDrain { erase: bool },
    /// Session closed, waiting for it to report down before dropping the link
    Teardown { erase: bool },
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::AwaitFastLink => "AwaitFastLink",
            Phase::BeginNormalLink => "BeginNormalLink",
            Phase::AwaitNormalLink => "AwaitNormalLink",
            Phase::AwaitFastPathConfirm => "AwaitFastPathConfirm",
            Phase::AwaitSession => "AwaitSession",
            Phase::Connected => "Connected",
            Phase::AwaitDrain { .. } => "AwaitDrain",
            Phase::Teardown { .. } => "Teardown",
        }
    }

    /// Phases that are part of an ongoing connection attempt
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            Phase::AwaitFastLink
                | Phase::BeginNormalLink
                | Phase::AwaitNormalLink
                | Phase::AwaitFastPathConfirm
                | Phase::AwaitSession
        )
    }

    pub fn is_shutting_down(self) -> bool {
        matches!(self, Phase::AwaitDrain { .. } | Phase::Teardown { .. })
    }

    /// Highest state this phase can carry. The actual state is at or below it.
    pub fn state_ceiling(self) -> ConnectivityState {
        match self {
            Phase::Idle | Phase::AwaitFastLink => ConnectivityState::Disconnected,
            Phase::BeginNormalLink
            | Phase::AwaitNormalLink
            | Phase::AwaitFastPathConfirm
            | Phase::AwaitSession => ConnectivityState::LinkUp,
            Phase::Connected | Phase::AwaitDrain { .. } | Phase::Teardown { .. } => {
                ConnectivityState::SessionUp
            }
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pending request from the caller. Only the latest one is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    None,
    Connect,
    Disconnect { erase: bool },
}
