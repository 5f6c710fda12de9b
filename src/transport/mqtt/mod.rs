//! MQTT session adapter
//!
//! Pure pieces are kept apart from the I/O:
//!
//! - [`connection`] - client options from broker settings
//! - [`message_handler`] - routing of event loop events
//! - [`client`] - the [`SessionLayer`](crate::transport::SessionLayer) implementation

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttSession;
pub use connection::configure_mqtt_options;
pub use message_handler::{EventRoute, MessageHandler};
