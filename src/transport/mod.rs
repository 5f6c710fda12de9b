//! Transport seams for the connectivity manager
//!
//! Two capability traits abstract the hardware: [`LinkLayer`] joins the wireless
//! network, [`SessionLayer`] carries the broker session over it. The manager only
//! talks to these traits so it can be driven by simulated adapters in tests.

use crate::clock::Clock;
use crate::config::BrokerConfig;
use crate::error::{NetError, NetResult};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

pub mod host_link;
pub mod link;
pub mod mqtt;

pub use host_link::HostLink;
pub use link::{Credentials, LinkStatus, PeerId};
pub use mqtt::MqttSession;

/// Wireless link capability.
///
/// Implementations carry no retry policy. A successful association updates the
/// platform cache that makes [`LinkLayer::begin_cached`] meaningful after a restart.
pub trait LinkLayer {
    /// Start associating with the parameters of the last successful association
    fn begin_cached(&mut self) -> NetResult<()>;

    /// Start a scan based association
    fn begin_with_credentials(&mut self, credentials: &Credentials) -> NetResult<()>;

    /// Start an association pinned to a known channel and access point
    fn begin_pinned(&mut self, credentials: &Credentials, channel: u8, peer: PeerId)
        -> NetResult<()>;

    fn status(&self) -> LinkStatus;

    fn local_address(&self) -> Option<IpAddr>;

    fn peer_identifier(&self) -> Option<PeerId>;

    fn channel(&self) -> Option<u8>;

    /// Credentials kept by the platform from a previous provisioning
    fn stored_credentials(&self) -> Option<Credentials>;

    /// Drop the association, optionally purging stored credentials and the cache
    fn disconnect(&mut self, erase_stored: bool);
}

/// Broker session capability
pub trait SessionLayer {
    /// Remember broker settings for the next [`SessionLayer::connect`]
    fn configure(&mut self, config: &BrokerConfig);

    /// Start opening the session. `false` means the attempt could not even be started.
    fn connect(&mut self) -> bool;

    fn connected(&self) -> bool;

    fn disconnect(&mut self);

    /// Push out anything still buffered for the transport
    fn flush(&mut self) {}

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> NetResult<()>;

    fn subscribe(&mut self, topic: &str) -> NetResult<()>;

    /// Drive the session and hand every inbound message to `deliver`.
    ///
    /// This is the only place inbound messages surface.
    fn poll(&mut self, deliver: &mut dyn FnMut(&str, &[u8]));
}

/// Publish/subscribe access to an established session.
///
/// Handed to the on-connected handler so it can subscribe without going back
/// through the manager.
pub struct SessionHandle<'a> {
    session: &'a mut dyn SessionLayer,
    clock: &'a dyn Clock,
    settle_delay: Duration,
}

impl<'a> SessionHandle<'a> {
    pub fn new(session: &'a mut dyn SessionLayer, clock: &'a dyn Clock, settle_delay: Duration) -> Self {
        Self {
            session,
            clock,
            settle_delay,
        }
    }

    /// Publish a text payload. Non-retained publishes are followed by the settle delay.
    pub fn publish(&mut self, topic: &str, payload: &str, retained: bool) -> NetResult<()> {
        if topic.is_empty() {
            warn!("Publish to empty topic blocked");
            return Err(NetError::invalid_argument("topic must not be empty"));
        }

        let result = self.session.publish(topic, payload.as_bytes(), retained);
        if !retained {
            self.clock.sleep(self.settle_delay);
        }

        match &result {
            Ok(()) => debug!(topic, retained, "Publish succeeded"),
            Err(e) => warn!(topic, error = %e, "Publish failed"),
        }
        result
    }

    /// Subscribe to a topic filter, followed by the settle delay
    pub fn subscribe(&mut self, topic: &str) -> NetResult<()> {
        if topic.is_empty() {
            warn!("Subscribe to empty topic blocked");
            return Err(NetError::invalid_argument("topic must not be empty"));
        }

        let result = self.session.subscribe(topic);
        self.clock.sleep(self.settle_delay);

        match &result {
            Ok(()) => debug!(topic, "Subscribe succeeded"),
            Err(e) => warn!(topic, error = %e, "Subscribe failed"),
        }
        result
    }
}
