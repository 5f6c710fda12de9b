//! Pure session configuration for the MQTT adapter

use crate::config::BrokerConfig;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;

/// Capacity of the request channel between client handle and event loop
pub const REQUEST_CAPACITY: usize = 16;

/// Upper bound on events handled by a single poll, keeps a tick bounded
pub const MAX_EVENTS_PER_POLL: usize = 32;

/// Upper bound on events driven while flushing a closing session
pub const MAX_FLUSH_EVENTS: usize = 8;

/// Build client options from the broker settings.
///
/// Credentials are only set when both user and password are present.
pub fn configure_mqtt_options(config: &BrokerConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);

    if config.tls {
        options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let (Some(user), Some(password)) = (&config.user, &config.password) {
        options.set_credentials(user.clone(), password.clone());
    }

    options.set_keep_alive(config.keep_alive);
    options.set_max_packet_size(Some(config.max_packet_size));
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use std::time::Duration;

    fn broker() -> BrokerConfig {
        PanelConfig::test_config().broker().unwrap()
    }

    #[test]
    fn test_configure_mqtt_options() {
        let options = configure_mqtt_options(&broker());

        assert_eq!(
            options.broker_address(),
            ("localhost".to_string(), 1883)
        );
        assert_eq!(options.client_id(), "hb-test-01");
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
    }

    #[test]
    fn test_configure_mqtt_options_tls() {
        let mut config = broker();
        config.tls = true;
        config.port = 8883;
        config.user = Some("panel".to_string());
        config.password = Some("pw".to_string());

        let options = configure_mqtt_options(&config);

        assert_eq!(options.broker_address().1, 8883);
    }
}
