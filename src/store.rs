//! Persisted connectivity state
//!
//! The connectivity core owns two persisted fields: the fast-path hint and the
//! last local address. They live in their own file under a `[connectivity]` table,
//! apart from any user settings.

use crate::config::BrokerConfig;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse stored state: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration store as seen by the connectivity manager
pub trait ConfigStore {
    /// Broker settings read at session-open time
    fn broker_config(&self) -> BrokerConfig;

    /// Whether the next connection should try the cached fast path first
    fn fast_path_hint(&self) -> bool;

    fn set_fast_path_hint(&mut self, enabled: bool);

    fn record_local_address(&mut self, address: IpAddr);

    /// Write pending changes to durable storage
    fn persist(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityRecord {
    #[serde(default)]
    pub fast_path_hint: bool,
    pub local_address: Option<IpAddr>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    connectivity: ConnectivityRecord,
}

/// TOML file backed store
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    broker: BrokerConfig,
    record: ConnectivityRecord,
}

impl FileStore {
    /// Open the store, a missing file yields the defaults
    pub fn open(path: impl Into<PathBuf>, broker: BrokerConfig) -> Result<Self, StoreError> {
        let path = path.into();
        let record = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str::<StateFile>(&content)?.connectivity,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConnectivityRecord::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), hint = record.fast_path_hint, "Opened state store");
        Ok(Self {
            path,
            broker,
            record,
        })
    }

    pub fn record(&self) -> &ConnectivityRecord {
        &self.record
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileStore {
    fn broker_config(&self) -> BrokerConfig {
        self.broker.clone()
    }

    fn fast_path_hint(&self) -> bool {
        self.record.fast_path_hint
    }

    fn set_fast_path_hint(&mut self, enabled: bool) {
        self.record.fast_path_hint = enabled;
    }

    fn record_local_address(&mut self, address: IpAddr) {
        self.record.local_address = Some(address);
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let content = toml::to_string(&StateFile {
            connectivity: self.record.clone(),
        })?;
        write_atomic(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), "Persisted connectivity state");
        Ok(())
    }
}

/// Replace `path` with `content` through a sibling temp file and a rename
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}
