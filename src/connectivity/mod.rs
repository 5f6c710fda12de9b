//! Connectivity state machine
//!
//! - [`phase`] - phases, commands and the coarse state
//! - [`transition`] - pure transition function
//! - [`liveness`] - pure liveness decisions while connected
//! - [`events`] - event sink for connect notifications and inbound messages
//! - [`manager`] - impure driver executing transitions against the adapters

pub mod events;
pub mod liveness;
pub mod manager;
pub mod phase;
pub mod transition;

pub use events::EventSink;
pub use liveness::{LivenessMonitor, LivenessVerdict};
pub use manager::ConnectivityManager;
pub use phase::{Command, ConnectivityState, Phase};
pub use transition::{step, Action, Inputs, Step, Transition};
