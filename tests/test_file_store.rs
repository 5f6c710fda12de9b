//! Persisted connectivity state across restarts

use homebuttons_net::config::{ConnectivityPolicy, PanelConfig};
use homebuttons_net::connectivity::{ConnectivityManager, Phase};
use homebuttons_net::store::{ConfigStore, FileStore};
use homebuttons_net::testing::{CallLog, ManualClock, SimLink, SimSession};
use homebuttons_net::BrokerConfig;
use std::path::Path;
use tempfile::TempDir;

fn broker() -> BrokerConfig {
    PanelConfig::from_toml(
        r#"
[device]
id = "hb-store-01"

[mqtt]
broker_url = "mqtt://localhost"
"#,
    )
    .and_then(|config| config.broker())
    .expect("broker settings")
}

fn manager_with_store(
    path: &Path,
    link: SimLink,
    log: &CallLog,
) -> ConnectivityManager<SimLink, SimSession, FileStore, ManualClock> {
    let store = FileStore::open(path, broker()).expect("open store");
    ConnectivityManager::new(
        link,
        SimSession::new(log.clone()),
        store,
        ManualClock::new(),
        ConnectivityPolicy::default(),
    )
}

#[test]
fn test_fast_path_hint_survives_restart() {
    // Arrange
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("state").join("homebuttons-state.toml");
    let log = CallLog::new();
    let mut first = manager_with_store(&path, SimLink::new(log.clone()), &log);

    // Act
    first.connect();
    for _ in 0..5 {
        first.tick();
    }
    assert_eq!(first.phase(), Phase::Connected);
    drop(first);

    let reopened = FileStore::open(&path, broker()).expect("reopen store");

    // Assert
    assert!(reopened.fast_path_hint());
    assert!(reopened.record().local_address.is_some());
    let content = std::fs::read_to_string(&path).expect("state file");
    assert!(content.contains("[connectivity]"));
}

#[test]
fn test_restarted_device_uses_fast_path() {
    // Arrange
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("homebuttons-state.toml");
    let log = CallLog::new();
    let mut first = manager_with_store(&path, SimLink::new(log.clone()), &log);
    first.connect();
    for _ in 0..5 {
        first.tick();
    }
    drop(first);

    // Act
    let mut second = manager_with_store(&path, SimLink::with_cache(log.clone()), &log);
    second.connect();
    second.tick();

    // Assert
    assert_eq!(second.phase(), Phase::AwaitFastLink);
}

#[test]
fn test_erase_clears_persisted_hint() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("homebuttons-state.toml");
    let log = CallLog::new();
    let mut manager = manager_with_store(&path, SimLink::new(log.clone()), &log);
    manager.connect();
    for _ in 0..5 {
        manager.tick();
    }

    manager.disconnect(true);
    manager.tick();
    manager.clock().advance_ms(manager.policy().drain_timeout_ms);
    manager.tick();
    manager.tick();

    assert_eq!(manager.phase(), Phase::Idle);
    let reopened = FileStore::open(&path, broker()).expect("reopen store");
    assert!(!reopened.fast_path_hint());
}
