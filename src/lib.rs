//! HomeButtons connectivity manager
//!
//! Keeps a battery powered button panel connected: a Wi-Fi link layer, an MQTT
//! session on top of it, a cached fast-path reconnect with fallback to a full
//! credential association, and a drain-then-teardown shutdown.
//!
//! # Overview
//!
//! - [`connectivity::ConnectivityManager`] - the phase machine, driven by `tick()`
//! - [`transport::LinkLayer`] / [`transport::SessionLayer`] - adapter seams
//! - [`transport::HostLink`] / [`transport::MqttSession`] - host implementations
//! - [`store::FileStore`] - persisted fast-path hint
//! - [`config::PanelConfig`] - TOML configuration
//!
//! # Quick Start
//!
//! ```rust
//! use homebuttons_net::connectivity::{ConnectivityManager, ConnectivityState};
//! use homebuttons_net::config::ConnectivityPolicy;
//! use homebuttons_net::testing::{CallLog, ManualClock, MemoryStore, SimLink, SimSession};
//!
//! let log = CallLog::new();
//! let clock = ManualClock::new();
//! let mut manager = ConnectivityManager::new(
//!     SimLink::new(log.clone()),
//!     SimSession::new(log.clone()),
//!     MemoryStore::new(log.clone()),
//!     clock.clone(),
//!     ConnectivityPolicy::default(),
//! );
//!
//! manager.on_connected(|session| {
//!     session.subscribe("homebuttons/Hallway/cmd/#").ok();
//! });
//! manager.connect();
//! for _ in 0..10 {
//!     manager.tick();
//! }
//! assert_eq!(manager.state(), ConnectivityState::SessionUp);
//! ```

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod observability;
pub mod store;
pub mod testing;
pub mod topics;
pub mod transport;

pub use clock::{Clock, SystemClock};
pub use config::{BrokerConfig, ConfigError, ConnectivityPolicy, PanelConfig};
pub use connectivity::{Command, ConnectivityManager, ConnectivityState, Phase};
pub use error::{NetError, NetResult};
pub use store::{ConfigStore, FileStore, StoreError};
pub use topics::{ButtonAction, TopicBuilder};
pub use transport::{Credentials, LinkLayer, LinkStatus, MqttSession, PeerId, SessionLayer};
