//! Testing utilities and simulated adapters
//!
//! Deterministic fakes for the link layer, the session layer, the configuration
//! store and the clock, so the connectivity manager can be exercised without a
//! radio or a broker.

pub mod mocks;

pub use mocks::*;
