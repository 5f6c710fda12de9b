//! Impure I/O for the broker session
//!
//! Wraps the synchronous rumqttc v5 client. Each session runs its event loop on a
//! dedicated thread that routes events and forwards them over a channel, so the
//! connect handshake is never cut short by a tick. [`SessionLayer::poll`] and
//! [`SessionLayer::flush`] only drain that channel, each bounded by a short
//! receive timeout.

use super::connection::{
    configure_mqtt_options, MAX_EVENTS_PER_POLL, MAX_FLUSH_EVENTS, REQUEST_CAPACITY,
};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::BrokerConfig;
use crate::error::{NetError, NetResult};
use crate::transport::SessionLayer;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, Connection};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the event loop thread reports to the session
#[derive(Debug)]
enum Notification {
    Route(EventRoute),
    /// The event loop stopped, the thread exits after sending this
    Failed(String),
}

/// MQTT session adapter
pub struct MqttSession {
    config: Option<BrokerConfig>,
    client: Option<Client>,
    events: Option<Receiver<Notification>>,
    connected: bool,
    poll_timeout: Duration,
}

impl MqttSession {
    pub fn new(poll_timeout: Duration) -> Self {
        Self {
            config: None,
            client: None,
            events: None,
            connected: false,
            poll_timeout,
        }
    }

    fn drop_connection(&mut self) {
        if let Some(client) = self.client.as_mut() {
            // Lets a still running event loop finish and its thread exit
            let _ = client.try_disconnect();
        }
        self.client = None;
        self.events = None;
        self.connected = false;
    }

    /// Apply a routed event, returning a delivered message if any
    fn handle_route(&mut self, route: EventRoute) -> Option<(String, Vec<u8>)> {
        if let Some(connected) = MessageHandler::connected_after(&route) {
            if connected != self.connected {
                debug!(connected, "Session connection flag changed");
            }
            self.connected = connected;
        }

        match route {
            EventRoute::MessageReceived { topic, payload, .. } => Some((topic, payload)),
            EventRoute::Disconnected => {
                warn!("Broker closed the session");
                None
            }
            EventRoute::SubscriptionConfirmed { packet_id, filters } => {
                debug!(packet_id, filters, "Subscription acknowledged");
                None
            }
            _ => None,
        }
    }
}

/// Drive the event loop until it fails, our DISCONNECT is sent or the session
/// stops listening
fn run_event_loop(mut connection: Connection, events: Sender<Notification>) {
    for notification in connection.iter() {
        let (notification, last) = match notification {
            Ok(event) => {
                let route = MessageHandler::route_mqtt_event(&event);
                let last = route == EventRoute::DisconnectSent;
                (Notification::Route(route), last)
            }
            Err(e) => (Notification::Failed(e.to_string()), true),
        };
        if events.send(notification).is_err() || last {
            break;
        }
    }
    debug!("Session event loop stopped");
}

impl SessionLayer for MqttSession {
    fn configure(&mut self, config: &BrokerConfig) {
        self.config = Some(config.clone());
    }

    fn connect(&mut self) -> bool {
        let Some(config) = self.config.as_ref() else {
            warn!("Session connect requested before configuration");
            return false;
        };

        let _span = crate::session_span!(client_id = %config.client_id).entered();
        let options = configure_mqtt_options(config);
        info!(host = %config.host, port = config.port, client_id = %config.client_id, "Opening broker session");

        self.drop_connection();
        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("mqtt-session".to_string())
            .spawn(move || run_event_loop(connection, tx));
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start session event loop");
            return false;
        }

        self.client = Some(client);
        self.events = Some(rx);
        true
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        if let Some(client) = self.client.as_mut() {
            if let Err(e) = client.try_disconnect() {
                debug!(error = %e, "Disconnect request not queued");
            }
        }
        self.connected = false;
    }

    fn flush(&mut self) {
        let Some(events) = self.events.as_ref() else {
            return;
        };

        for _ in 0..MAX_FLUSH_EVENTS {
            match events.recv_timeout(self.poll_timeout) {
                Ok(Notification::Route(EventRoute::DisconnectSent)) => break,
                Ok(Notification::Route(_)) => {}
                Ok(Notification::Failed(_)) | Err(_) => break,
            }
        }
        self.events = None;
        self.client = None;
        self.connected = false;
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> NetResult<()> {
        let client = self.client.as_mut().ok_or_else(|| NetError::PublishFailed {
            topic: topic.to_string(),
            message: "no session".to_string(),
        })?;
        client
            .try_publish(topic, QoS::AtMostOnce, retained, payload.to_vec())
            .map_err(|e| NetError::PublishFailed {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    fn subscribe(&mut self, topic: &str) -> NetResult<()> {
        let client = self.client.as_mut().ok_or_else(|| NetError::SubscribeFailed {
            topic: topic.to_string(),
            message: "no session".to_string(),
        })?;
        client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| NetError::SubscribeFailed {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    fn poll(&mut self, deliver: &mut dyn FnMut(&str, &[u8])) {
        for _ in 0..MAX_EVENTS_PER_POLL {
            let Some(events) = self.events.as_ref() else {
                return;
            };

            match events.recv_timeout(self.poll_timeout) {
                Ok(Notification::Route(route)) => {
                    if let Some((topic, payload)) = self.handle_route(route) {
                        deliver(&topic, &payload);
                    }
                }
                Ok(Notification::Failed(error)) => {
                    // Reconnecting is the state machine's decision, not the event loop's
                    warn!(%error, "Broker session error");
                    self.drop_connection();
                    return;
                }
                Err(RecvTimeoutError::Timeout) => return,
                Err(RecvTimeoutError::Disconnected) => {
                    self.drop_connection();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;

    #[test]
    fn test_connect_requires_configuration() {
        let mut session = MqttSession::new(Duration::from_millis(1));
        assert!(!session.connect());
        assert!(!session.connected());
    }

    #[test]
    fn test_publish_without_session_fails() {
        let mut session = MqttSession::new(Duration::from_millis(1));
        let result = session.publish("a/b", b"x", false);
        assert!(matches!(result, Err(NetError::PublishFailed { .. })));
        let result = session.subscribe("a/#");
        assert!(matches!(result, Err(NetError::SubscribeFailed { .. })));
    }

    #[test]
    fn test_connect_creates_client_without_blocking() {
        let mut session = MqttSession::new(Duration::from_millis(1));
        session.configure(&PanelConfig::test_config().broker().unwrap());

        assert!(session.connect());
        // Connected only once a ConnAck has come back through poll
        assert!(!session.connected());
    }

    #[test]
    fn test_poll_and_flush_without_connection_are_noops() {
        let mut session = MqttSession::new(Duration::from_millis(1));
        let mut delivered = 0;
        session.poll(&mut |_, _| delivered += 1);
        session.flush();
        session.disconnect();
        assert_eq!(delivered, 0);
        assert!(!session.connected());
    }
}
