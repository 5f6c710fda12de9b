//! Observability for the connectivity manager
//!
//! Structured logging only. Phase changes, recovered failures and session
//! milestones are emitted as `tracing` events.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{net_span, session_span};
