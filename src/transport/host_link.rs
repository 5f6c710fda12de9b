//! Link adapter for a host that is already on a network
//!
//! On a workstation or gateway the operating system owns the Wi-Fi association,
//! so "associating" here means confirming that a route to the broker exists and
//! reading the local address that route uses. The adapter keeps the same contract
//! as a radio driver: it holds provisioned credentials, and every successful
//! association rewrites a cache file that [`LinkLayer::begin_cached`] replays.

use super::link::{Credentials, LinkStatus, PeerId};
use super::LinkLayer;
use crate::config::PanelConfig;
use crate::error::{NetError, NetResult};
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Parameters of the last successful association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LinkCache {
    ssid: String,
    password: String,
    channel: u8,
    peer: PeerId,
}

#[derive(Debug, Clone, Copy)]
struct Association {
    target: SocketAddr,
    local_address: IpAddr,
    channel: u8,
    peer: PeerId,
}

/// Route probing link adapter
#[derive(Debug)]
pub struct HostLink {
    credentials: Option<Credentials>,
    channel: u8,
    peer: PeerId,
    probe_target: String,
    cache_path: PathBuf,
    association: Option<Association>,
    status: LinkStatus,
}

impl HostLink {
    pub fn new(
        credentials: Option<Credentials>,
        channel: u8,
        peer: PeerId,
        probe_target: impl Into<String>,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            credentials,
            channel,
            peer,
            probe_target: probe_target.into(),
            cache_path: cache_path.into(),
            association: None,
            status: LinkStatus::Failed,
        }
    }

    /// Build from the `[wifi]`, `[mqtt]` and `[storage]` sections
    pub fn from_config(config: &PanelConfig) -> NetResult<Self> {
        let broker = config
            .broker()
            .map_err(|e| NetError::link_association_failed(e.to_string()))?;
        let peer = match &config.wifi.bssid {
            Some(text) => text
                .parse()
                .map_err(|e: super::link::PeerIdParseError| {
                    NetError::link_association_failed(e.to_string())
                })?,
            None => PeerId::default(),
        };
        let credentials = Some(Credentials::new(
            config.wifi.ssid.clone(),
            config.wifi.password.clone(),
        ))
        .filter(Credentials::is_usable);

        Ok(Self::new(
            credentials,
            config.wifi.channel,
            peer,
            format!("{}:{}", broker.host, broker.port),
            config.storage.link_cache_file.clone(),
        ))
    }

    fn read_cache(&self) -> Option<LinkCache> {
        let content = std::fs::read_to_string(&self.cache_path).ok()?;
        match toml::from_str(&content) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(path = %self.cache_path.display(), error = %e, "Ignoring unreadable link cache");
                None
            }
        }
    }

    fn write_cache(&self, credentials: &Credentials, association: &Association) {
        let cache = LinkCache {
            ssid: credentials.ssid.clone(),
            password: credentials.password.clone(),
            channel: association.channel,
            peer: association.peer,
        };
        let written = toml::to_string(&cache)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                write_atomic(&self.cache_path, text.as_bytes()).map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            warn!(path = %self.cache_path.display(), error = %e, "Failed to update link cache");
        }
    }

    fn resolve_target(&self) -> Option<SocketAddr> {
        self.probe_target.to_socket_addrs().ok()?.next()
    }

    fn associate(&mut self, credentials: &Credentials, channel: u8, peer: PeerId) -> NetResult<()> {
        validate_credentials(credentials)?;
        self.status = LinkStatus::Connecting;

        let route = self
            .resolve_target()
            .and_then(|target| route_to(target).map(|local| (target, local)));
        match route {
            Some((target, local_address)) => {
                let association = Association {
                    target,
                    local_address,
                    channel,
                    peer,
                };
                self.write_cache(credentials, &association);
                self.association = Some(association);
                self.credentials = Some(credentials.clone());
                self.status = LinkStatus::Connected;
                info!(ssid = %credentials.ssid, %local_address, "Host link associated");
                Ok(())
            }
            None => {
                self.association = None;
                self.status = LinkStatus::Failed;
                Err(NetError::link_association_failed(format!(
                    "no route to {}",
                    self.probe_target
                )))
            }
        }
    }
}

impl LinkLayer for HostLink {
    fn begin_cached(&mut self) -> NetResult<()> {
        match self.read_cache() {
            Some(cache) => {
                debug!(channel = cache.channel, peer = %cache.peer, "Associating from link cache");
                let credentials = Credentials::new(cache.ssid, cache.password);
                self.associate(&credentials, cache.channel, cache.peer)
            }
            None => {
                self.status = LinkStatus::Failed;
                Err(NetError::link_association_failed("no cached association"))
            }
        }
    }

    fn begin_with_credentials(&mut self, credentials: &Credentials) -> NetResult<()> {
        self.associate(credentials, self.channel, self.peer)
    }

    fn begin_pinned(
        &mut self,
        credentials: &Credentials,
        channel: u8,
        peer: PeerId,
    ) -> NetResult<()> {
        self.associate(credentials, channel, peer)
    }

    fn status(&self) -> LinkStatus {
        match (self.status, self.association) {
            // A vanished route is a lost link
            (LinkStatus::Connected, Some(association)) => match route_to(association.target) {
                Some(address) if address == association.local_address => LinkStatus::Connected,
                _ => LinkStatus::Failed,
            },
            (status, _) => status,
        }
    }

    fn local_address(&self) -> Option<IpAddr> {
        self.association.map(|a| a.local_address)
    }

    fn peer_identifier(&self) -> Option<PeerId> {
        self.association.map(|a| a.peer)
    }

    fn channel(&self) -> Option<u8> {
        self.association.map(|a| a.channel)
    }

    fn stored_credentials(&self) -> Option<Credentials> {
        self.credentials.clone()
    }

    fn disconnect(&mut self, erase_stored: bool) {
        self.association = None;
        self.status = LinkStatus::Failed;
        if erase_stored {
            self.credentials = None;
            match std::fs::remove_file(&self.cache_path) {
                Ok(()) => info!("Erased stored link credentials and cache"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, "Failed to remove link cache"),
            }
        }
    }
}

/// Ask the OS which local address routes to `target`. No packets are sent.
fn route_to(target: SocketAddr) -> Option<IpAddr> {
    let bind: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(bind).ok()?;
    socket.connect(target).ok()?;
    let local = socket.local_addr().ok()?.ip();
    (!local.is_unspecified()).then_some(local)
}

/// SSID 1-32 printable ASCII bytes, password empty (open) or 8-64 bytes
fn validate_credentials(credentials: &Credentials) -> NetResult<()> {
    let ssid = &credentials.ssid;
    if ssid.is_empty() || ssid.len() > 32 || !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(NetError::link_association_failed("invalid SSID"));
    }
    let password_len = credentials.password.len();
    if password_len != 0 && !(8..=64).contains(&password_len) {
        return Err(NetError::link_association_failed("invalid password length"));
    }
    Ok(())
}
