//! Event sink: connect notifications and inbound messages for the rest of the panel

use crate::transport::SessionHandle;
use std::fmt;
use tracing::{debug, trace};

/// Called once per established session, with access to publish and subscribe
pub type ConnectedHandler = Box<dyn FnMut(&mut SessionHandle<'_>)>;

/// Called per inbound message with `(topic, payload)`
pub type InboundHandler = Box<dyn FnMut(&str, &str)>;

/// Holds at most one handler of each kind. Registering again replaces the old one.
#[derive(Default)]
pub struct EventSink {
    on_connected: Option<ConnectedHandler>,
    on_message: Option<InboundHandler>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_connected(&mut self, handler: ConnectedHandler) {
        self.on_connected = Some(handler);
    }

    pub fn set_on_message(&mut self, handler: InboundHandler) {
        self.on_message = Some(handler);
    }

    /// Fire the connected handler, returns whether one was registered
    pub fn notify_connected(&mut self, session: &mut SessionHandle<'_>) -> bool {
        match self.on_connected.as_mut() {
            Some(handler) => {
                handler(session);
                true
            }
            None => false,
        }
    }

    /// Deliver an inbound message.
    ///
    /// Empty payloads are dropped. Returns whether a handler saw the message.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) -> bool {
        let text = String::from_utf8_lossy(payload);
        trace!(topic, len = payload.len(), payload = %text, "Inbound message");

        if payload.is_empty() {
            debug!(topic, "Dropping empty payload");
            return false;
        }

        match self.on_message.as_mut() {
            Some(handler) => {
                handler(topic, &text);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("on_connected", &self.on_connected.is_some())
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_sink() -> (EventSink, Rc<RefCell<Vec<(String, String)>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sink = EventSink::new();
        let log = Rc::clone(&seen);
        sink.set_on_message(Box::new(move |topic, payload| {
            log.borrow_mut().push((topic.to_string(), payload.to_string()));
        }));
        (sink, seen)
    }

    #[test]
    fn test_deliver_forwards_text() {
        let (mut sink, seen) = recording_sink();

        assert!(sink.deliver("hb/cmd/awake_mode", b"ON"));

        assert_eq!(
            seen.borrow().as_slice(),
            &[("hb/cmd/awake_mode".to_string(), "ON".to_string())]
        );
    }

    #[test]
    fn test_empty_payload_dropped() {
        let (mut sink, seen) = recording_sink();

        assert!(!sink.deliver("hb/cmd/awake_mode", b""));

        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let (mut sink, seen) = recording_sink();

        sink.deliver("t", &[0x4f, 0xff, 0x4b]);

        assert_eq!(seen.borrow()[0].1, "O\u{fffd}K");
    }

    #[test]
    fn test_reregistering_replaces_handler() {
        let (mut sink, first) = recording_sink();
        let second = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&second);
        sink.set_on_message(Box::new(move |_, _| *counter.borrow_mut() += 1));

        sink.deliver("t", b"x");

        assert!(first.borrow().is_empty());
        assert_eq!(*second.borrow(), 1);
    }

    #[test]
    fn test_no_handler_registered() {
        let mut sink = EventSink::new();
        assert!(!sink.deliver("t", b"x"));
        assert_eq!(
            format!("{sink:?}"),
            "EventSink { on_connected: false, on_message: false }"
        );
    }
}
