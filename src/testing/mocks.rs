//! Simulated adapters for testing
//!
//! All fakes can share one [`CallLog`] so tests can assert the relative order of
//! link, session and store calls.

use crate::clock::Clock;
use crate::config::BrokerConfig;
use crate::error::{NetError, NetResult};
use crate::store::{ConfigStore, StoreError};
use crate::transport::{Credentials, LinkLayer, LinkStatus, PeerId, SessionLayer};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// One adapter or store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LinkBeginCached,
    LinkBeginCredentials { ssid: String },
    LinkBeginPinned { channel: u8, peer: PeerId },
    LinkDisconnect { erase: bool },
    SessionConfigure { client_id: String },
    SessionConnect,
    SessionDisconnect,
    SessionFlush,
    Publish { topic: String, payload: String, retained: bool },
    Subscribe { topic: String },
    Persist { fast_path_hint: bool },
}

impl Call {
    pub fn is_adapter_call(&self) -> bool {
        !matches!(self, Call::Persist { .. })
    }
}

/// Shared, ordered record of calls
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, call: Call) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Index of the first call matching `predicate`
    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.lock().iter().position(predicate)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Broker settings used by the fakes
pub fn test_broker_config() -> BrokerConfig {
    BrokerConfig {
        host: "broker.test".to_string(),
        port: 1883,
        tls: false,
        user: None,
        password: None,
        client_id: "hb-sim".to_string(),
        keep_alive: Duration::from_secs(60),
        max_packet_size: 1024,
    }
}

/// Simulated access point and radio.
///
/// Associations complete immediately unless the network is unreachable or the
/// specific path has been told to fail, in which case the link stays `Connecting`.
#[derive(Debug)]
pub struct SimLink {
    log: CallLog,
    status: LinkStatus,
    credentials: Option<Credentials>,
    /// Platform cache of the last successful association
    cache: Option<(u8, PeerId)>,
    association: Option<(u8, PeerId)>,
    ap_channel: u8,
    ap_peer: PeerId,
    local_address: IpAddr,
    reachable: bool,
    cache_valid: bool,
    pinned_ok: bool,
}

impl SimLink {
    pub const CHANNEL: u8 = 6;
    pub const PEER: PeerId = PeerId([0x24, 0x0a, 0xc4, 0x11, 0x22, 0x33]);

    /// Provisioned device without a fast-path cache
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            status: LinkStatus::Failed,
            credentials: Some(Credentials::new("home", "secret-pass")),
            cache: None,
            association: None,
            ap_channel: Self::CHANNEL,
            ap_peer: Self::PEER,
            local_address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40)),
            reachable: true,
            cache_valid: true,
            pinned_ok: true,
        }
    }

    /// Device that has completed a normal association before
    pub fn with_cache(log: CallLog) -> Self {
        let mut link = Self::new(log);
        link.cache = Some((Self::CHANNEL, Self::PEER));
        link
    }

    /// Whether the access point can be reached at all
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// A stale cache never completes a fast association
    pub fn set_cache_valid(&mut self, valid: bool) {
        self.cache_valid = valid;
    }

    pub fn set_pinned_ok(&mut self, ok: bool) {
        self.pinned_ok = ok;
    }

    /// Simulate losing the access point while associated
    pub fn drop_link(&mut self) {
        self.status = LinkStatus::Failed;
        self.association = None;
    }

    pub fn cache(&self) -> Option<(u8, PeerId)> {
        self.cache
    }

    fn complete(&mut self, channel: u8, peer: PeerId) {
        self.association = Some((channel, peer));
        self.cache = Some((channel, peer));
        self.status = LinkStatus::Connected;
    }
}

impl LinkLayer for SimLink {
    fn begin_cached(&mut self) -> NetResult<()> {
        self.log.record(Call::LinkBeginCached);
        match self.cache {
            Some((channel, peer)) if self.reachable && self.cache_valid => {
                self.complete(channel, peer);
                Ok(())
            }
            Some(_) => {
                self.status = LinkStatus::Connecting;
                Ok(())
            }
            None => {
                self.status = LinkStatus::Failed;
                Err(NetError::link_association_failed("no cached association"))
            }
        }
    }

    fn begin_with_credentials(&mut self, credentials: &Credentials) -> NetResult<()> {
        self.log.record(Call::LinkBeginCredentials {
            ssid: credentials.ssid.clone(),
        });
        if self.reachable {
            self.complete(self.ap_channel, self.ap_peer);
        } else {
            self.status = LinkStatus::Connecting;
        }
        Ok(())
    }

    fn begin_pinned(
        &mut self,
        _credentials: &Credentials,
        channel: u8,
        peer: PeerId,
    ) -> NetResult<()> {
        self.log.record(Call::LinkBeginPinned { channel, peer });
        if self.reachable && self.pinned_ok {
            self.complete(channel, peer);
        } else {
            self.status = LinkStatus::Connecting;
        }
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        self.status
    }

    fn local_address(&self) -> Option<IpAddr> {
        self.association.map(|_| self.local_address)
    }

    fn peer_identifier(&self) -> Option<PeerId> {
        self.association.map(|(_, peer)| peer)
    }

    fn channel(&self) -> Option<u8> {
        self.association.map(|(channel, _)| channel)
    }

    fn stored_credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }

    fn disconnect(&mut self, erase_stored: bool) {
        self.log.record(Call::LinkDisconnect {
            erase: erase_stored,
        });
        self.status = LinkStatus::Failed;
        self.association = None;
        if erase_stored {
            self.credentials = None;
            self.cache = None;
        }
    }
}

/// Simulated broker session.
///
/// `connect()` completes on the next poll when the broker accepts connections.
/// Queued inbound messages are delivered by polls made while connected.
#[derive(Debug)]
pub struct SimSession {
    log: CallLog,
    configured: Option<BrokerConfig>,
    accepting: bool,
    connecting: bool,
    connected: bool,
    close_on_disconnect: bool,
    fail_publish: bool,
    inbound: VecDeque<(String, Vec<u8>)>,
}

impl SimSession {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            configured: None,
            accepting: true,
            connecting: false,
            connected: false,
            close_on_disconnect: true,
            fail_publish: false,
            inbound: VecDeque::new(),
        }
    }

    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    /// When false the session keeps reporting connected after `disconnect()`
    pub fn set_close_on_disconnect(&mut self, close: bool) {
        self.close_on_disconnect = close;
    }

    pub fn set_fail_publish(&mut self, fail: bool) {
        self.fail_publish = fail;
    }

    /// Simulate the broker dropping the session
    pub fn drop_session(&mut self) {
        self.connected = false;
        self.connecting = false;
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back((topic.to_string(), payload.to_vec()));
    }

    pub fn configured(&self) -> Option<&BrokerConfig> {
        self.configured.as_ref()
    }
}

impl SessionLayer for SimSession {
    fn configure(&mut self, config: &BrokerConfig) {
        self.log.record(Call::SessionConfigure {
            client_id: config.client_id.clone(),
        });
        self.configured = Some(config.clone());
    }

    fn connect(&mut self) -> bool {
        self.log.record(Call::SessionConnect);
        if self.configured.is_none() {
            return false;
        }
        self.connected = false;
        self.connecting = true;
        true
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.log.record(Call::SessionDisconnect);
        self.connecting = false;
        if self.close_on_disconnect {
            self.connected = false;
        }
    }

    fn flush(&mut self) {
        self.log.record(Call::SessionFlush);
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> NetResult<()> {
        self.log.record(Call::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).to_string(),
            retained,
        });
        if self.fail_publish || !self.connected {
            return Err(NetError::PublishFailed {
                topic: topic.to_string(),
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> NetResult<()> {
        self.log.record(Call::Subscribe {
            topic: topic.to_string(),
        });
        if !self.connected {
            return Err(NetError::SubscribeFailed {
                topic: topic.to_string(),
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn poll(&mut self, deliver: &mut dyn FnMut(&str, &[u8])) {
        if self.connected {
            while let Some((topic, payload)) = self.inbound.pop_front() {
                deliver(&topic, &payload);
            }
        }
        if self.connecting && self.accepting {
            self.connecting = false;
            self.connected = true;
        }
    }
}

/// In-memory configuration store that tracks what has been persisted
#[derive(Debug)]
pub struct MemoryStore {
    log: CallLog,
    broker: BrokerConfig,
    hint: bool,
    persisted_hint: bool,
    local_address: Option<IpAddr>,
    fail_persist: bool,
}

impl MemoryStore {
    pub fn new(log: CallLog) -> Self {
        Self::with_hint(log, false)
    }

    pub fn with_hint(log: CallLog, hint: bool) -> Self {
        Self {
            log,
            broker: test_broker_config(),
            hint,
            persisted_hint: hint,
            local_address: None,
            fail_persist: false,
        }
    }

    /// Hint value as of the last successful persist
    pub fn persisted_hint(&self) -> bool {
        self.persisted_hint
    }

    pub fn local_address(&self) -> Option<IpAddr> {
        self.local_address
    }

    pub fn set_fail_persist(&mut self, fail: bool) {
        self.fail_persist = fail;
    }
}

impl ConfigStore for MemoryStore {
    fn broker_config(&self) -> BrokerConfig {
        self.broker.clone()
    }

    fn fast_path_hint(&self) -> bool {
        self.hint
    }

    fn set_fast_path_hint(&mut self, enabled: bool) {
        self.hint = enabled;
    }

    fn record_local_address(&mut self, address: IpAddr) {
        self.local_address = Some(address);
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        if self.fail_persist {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated persist failure",
            )));
        }
        self.log.record(Call::Persist {
            fast_path_hint: self.hint,
        });
        self.persisted_hint = self.hint;
        Ok(())
    }
}

/// Virtual clock. Clones share the same time; `sleep` advances it.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    fn offset(&self) -> MutexGuard<'_, Duration> {
        self.offset.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn advance(&self, by: Duration) {
        *self.offset() += by;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Virtual time since construction
    pub fn elapsed(&self) -> Duration {
        *self.offset()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let start = clock.now();

        other.advance_ms(250);
        clock.sleep(Duration::from_millis(10));

        assert_eq!(clock.now() - start, Duration::from_millis(260));
        assert_eq!(other.elapsed(), Duration::from_millis(260));
    }

    #[test]
    fn test_sim_link_fast_path_needs_cache() {
        let log = CallLog::new();
        let mut link = SimLink::new(log.clone());

        assert!(link.begin_cached().is_err());
        assert_eq!(link.status(), LinkStatus::Failed);

        let creds = link.stored_credentials().unwrap();
        link.begin_with_credentials(&creds).unwrap();
        assert_eq!(link.status(), LinkStatus::Connected);
        assert_eq!(link.cache(), Some((SimLink::CHANNEL, SimLink::PEER)));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_sim_link_erase_drops_cache_and_credentials() {
        let mut link = SimLink::with_cache(CallLog::new());

        link.disconnect(true);

        assert!(link.cache().is_none());
        assert!(link.stored_credentials().is_none());
    }

    #[test]
    fn test_sim_session_connects_on_poll() {
        let log = CallLog::new();
        let mut session = SimSession::new(log.clone());
        session.configure(&test_broker_config());
        session.push_inbound("t", b"early");

        assert!(session.connect());
        assert!(!session.connected());

        let mut seen = Vec::new();
        session.poll(&mut |topic, _| seen.push(topic.to_string()));
        assert!(session.connected());
        assert!(seen.is_empty());

        session.poll(&mut |topic, _| seen.push(topic.to_string()));
        assert_eq!(seen, vec!["t".to_string()]);
    }

    #[test]
    fn test_memory_store_tracks_persisted_hint() {
        let log = CallLog::new();
        let mut store = MemoryStore::new(log.clone());

        store.set_fast_path_hint(true);
        assert!(!store.persisted_hint());

        store.persist().unwrap();
        assert!(store.persisted_hint());
        assert_eq!(
            log.calls(),
            vec![Call::Persist {
                fast_path_hint: true
            }]
        );
    }
}
