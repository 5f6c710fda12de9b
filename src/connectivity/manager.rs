//! Connectivity manager: owns the phase machine and executes its side effects
//!
//! The manager is driven by [`ConnectivityManager::tick`] from a single control
//! loop. Each tick polls the session layer for inbound traffic, samples the link
//! and session signals, evaluates [`step`] and applies at most one transition.
//! Adapters, the configuration store and the clock are injected at construction.

use super::events::EventSink;
use super::liveness::LivenessMonitor;
use super::phase::{Command, ConnectivityState, Phase};
use super::transition::{step, Action, Inputs, Step, Transition};
use crate::clock::Clock;
use crate::config::ConnectivityPolicy;
use crate::error::{NetError, NetResult};
use crate::store::ConfigStore;
use crate::transport::{LinkLayer, SessionHandle, SessionLayer};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct ConnectivityManager<L, S, C, K> {
    link: L,
    session: S,
    store: C,
    clock: K,
    policy: ConnectivityPolicy,
    phase: Phase,
    state: ConnectivityState,
    command: Command,
    phase_started: Instant,
    sink: EventSink,
    connect_requested_at: Option<Instant>,
    connect_duration: Option<Duration>,
    last_failure: Option<NetError>,
}

impl<L, S, C, K> ConnectivityManager<L, S, C, K>
where
    L: LinkLayer,
    S: SessionLayer,
    C: ConfigStore,
    K: Clock,
{
    /// Create a manager in `Idle` / `Disconnected`
    pub fn new(link: L, session: S, store: C, clock: K, policy: ConnectivityPolicy) -> Self {
        let phase_started = clock.now();
        Self {
            link,
            session,
            store,
            clock,
            policy,
            phase: Phase::Idle,
            state: ConnectivityState::Disconnected,
            command: Command::None,
            phase_started,
            sink: EventSink::new(),
            connect_requested_at: None,
            connect_duration: None,
            last_failure: None,
        }
    }

    /// Request a connection. Picked up on the next tick.
    pub fn connect(&mut self) {
        debug!(phase = %self.phase, "Command: connect");
        if self.phase == Phase::Idle || self.phase.is_shutting_down() {
            self.connect_requested_at = Some(self.clock.now());
        }
        self.command = Command::Connect;
    }

    /// Request a disconnect, optionally erasing stored link credentials.
    /// Picked up on the next tick.
    pub fn disconnect(&mut self, erase: bool) {
        debug!(phase = %self.phase, erase, "Command: disconnect");
        self.command = Command::Disconnect { erase };
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pending_command(&self) -> Command {
        self.command
    }

    pub fn fast_path_hint(&self) -> bool {
        self.store.fast_path_hint()
    }

    /// Most recent failure the machine recovered from
    pub fn last_failure(&self) -> Option<&NetError> {
        self.last_failure.as_ref()
    }

    /// Time from the `connect()` that started the current session to its establishment
    pub fn connect_duration(&self) -> Option<Duration> {
        self.connect_duration
    }

    pub fn policy(&self) -> &ConnectivityPolicy {
        &self.policy
    }

    /// Register the session established handler, replacing any previous one
    pub fn on_connected<F>(&mut self, handler: F)
    where
        F: FnMut(&mut SessionHandle<'_>) + 'static,
    {
        self.sink.set_on_connected(Box::new(handler));
    }

    /// Register the inbound message handler, replacing any previous one
    pub fn on_message<F>(&mut self, handler: F)
    where
        F: FnMut(&str, &str) + 'static,
    {
        self.sink.set_on_message(Box::new(handler));
    }

    /// Publish a text payload. Fails with `NotConnected` unless the session is up.
    pub fn publish(&mut self, topic: &str, payload: &str, retained: bool) -> NetResult<()> {
        if !LivenessMonitor::can_publish(self.state) {
            debug!(topic, state = ?self.state, "Publish rejected");
            return Err(NetError::NotConnected { state: self.state });
        }
        self.session_handle().publish(topic, payload, retained)
    }

    /// Subscribe to a topic filter. Empty topics are rejected before anything else.
    pub fn subscribe(&mut self, topic: &str) -> NetResult<()> {
        if topic.is_empty() {
            warn!("Subscribe to empty topic blocked");
            return Err(NetError::invalid_argument("topic must not be empty"));
        }
        if !LivenessMonitor::can_subscribe(self.state) {
            debug!(topic, state = ?self.state, "Subscribe rejected");
            return Err(NetError::NotConnected { state: self.state });
        }
        self.session_handle().subscribe(topic)
    }

    /// Advance the machine by at most one transition
    pub fn tick(&mut self) {
        self.poll_session();

        let inputs = Inputs {
            command: self.command,
            link: self.link.status(),
            session_connected: self.session.connected(),
            elapsed: self.clock.elapsed_since(self.phase_started),
            fast_path_hint: self.store.fast_path_hint(),
        };

        match step(self.phase, &inputs, &self.policy) {
            Step::Stay => {}
            Step::ConsumeCommand => {
                debug!(phase = %self.phase, command = ?self.command, "Command has no effect");
                self.command = Command::None;
            }
            Step::Advance(transition) => self.apply(transition, &inputs),
        }
    }

    fn session_handle(&mut self) -> SessionHandle<'_> {
        SessionHandle::new(&mut self.session, &self.clock, self.policy.settle_delay())
    }

    fn poll_session(&mut self) {
        let Self {
            session,
            sink,
            state,
            ..
        } = self;
        // Handlers only see messages once on_connected has run for this session
        let deliverable = *state == ConnectivityState::SessionUp;
        session.poll(&mut |topic: &str, payload: &[u8]| {
            if deliverable {
                sink.deliver(topic, payload);
            } else {
                debug!(topic, "Dropping message received before session up");
            }
        });
    }

    fn apply(&mut self, transition: Transition, inputs: &Inputs) {
        if transition.consumes_command {
            self.command = Command::None;
        }

        if let Some(failure) = transition.failure {
            self.record_failure(failure);
        }

        if matches!(self.phase, Phase::Teardown { .. }) && inputs.session_connected {
            warn!(
                drain_timeout_ms = self.policy.drain_timeout_ms,
                "Session did not close in time, forcing teardown"
            );
        }

        if let Some(state) = transition.state {
            self.set_state(state);
        }

        if transition.next != self.phase {
            debug!(from = %self.phase, to = %transition.next, "Phase changed");
        }
        self.phase = transition.next;

        for action in transition.actions {
            self.execute(action);
        }

        // Pauses taken by the actions do not count against the new phase
        self.phase_started = self.clock.now();
    }

    fn set_state(&mut self, state: ConnectivityState) {
        if state == self.state {
            return;
        }
        match (self.state, state) {
            (_, ConnectivityState::SessionUp) => info!("Session established"),
            (ConnectivityState::Disconnected, ConnectivityState::LinkUp) => info!("Link up"),
            (ConnectivityState::SessionUp, ConnectivityState::LinkUp) => {
                warn!("Session down, link still up")
            }
            (_, ConnectivityState::Disconnected) => info!("Disconnected"),
            (from, to) => debug!(?from, ?to, "State changed"),
        }
        self.state = state;
    }

    fn record_failure(&mut self, failure: NetError) {
        if failure.is_recovered_locally() {
            warn!(phase = %self.phase, error = %failure, "Recovering from failure");
        } else {
            error!(phase = %self.phase, error = %failure, "Connectivity failure");
        }
        self.last_failure = Some(failure);
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::ConfigureSession => {
                let broker = self.store.broker_config();
                debug!(host = %broker.host, port = broker.port, client_id = %broker.client_id, "Configuring session");
                self.session.configure(&broker);
            }
            Action::BeginCachedLink => {
                info!("Associating link (fast path)");
                if let Err(e) = self.link.begin_cached() {
                    self.record_failure(e);
                }
            }
            Action::BeginCredentialLink => {
                let result = match self.link.stored_credentials() {
                    Some(credentials) => {
                        info!(ssid = %credentials.ssid, "Associating link (normal path)");
                        self.link.begin_with_credentials(&credentials)
                    }
                    None => Err(NetError::link_association_failed("no stored credentials")),
                };
                if let Err(e) = result {
                    self.record_failure(e);
                }
            }
            Action::PinLink => self.pin_link(),
            Action::ResetLink => {
                self.link.disconnect(false);
                self.clock.sleep(self.policy.link_reset_delay());
            }
            Action::RecordLinkIdentity => {
                let address = self.link.local_address();
                if let Some(address) = address {
                    self.store.record_local_address(address);
                }
                info!(
                    address = ?address,
                    channel = ?self.link.channel(),
                    peer = %self.link.peer_identifier().map(|p| p.to_string()).unwrap_or_default(),
                    "Link associated"
                );
            }
            Action::SetFastPathHint(enabled) => {
                debug!(enabled, "Fast path hint updated");
                self.store.set_fast_path_hint(enabled);
            }
            Action::Persist => {
                if let Err(e) = self.store.persist() {
                    warn!(error = %e, "Failed to persist connectivity state");
                }
            }
            Action::ConnectSession => {
                info!("Connecting session");
                if !self.session.connect() {
                    self.record_failure(NetError::session_connect_failed(
                        "session connect could not be started",
                    ));
                }
            }
            Action::NotifyConnected => self.notify_connected(),
            Action::CloseSession => self.session.disconnect(),
            Action::FlushSession => self.session.flush(),
            Action::DisconnectLink { erase } => {
                self.link.disconnect(erase);
                if erase {
                    info!("Link credentials erased");
                }
            }
        }
    }

    /// Re-associate pinned to the channel and peer of the current association
    fn pin_link(&mut self) {
        let params = (
            self.link.stored_credentials(),
            self.link.channel(),
            self.link.peer_identifier(),
        );
        // Drop the link either way so an unpinned association is never confirmed
        self.link.disconnect(false);

        let result = match params {
            (Some(credentials), Some(channel), Some(peer)) => {
                info!(channel, %peer, "Re-associating pinned to current access point");
                self.link.begin_pinned(&credentials, channel, peer)
            }
            _ => Err(NetError::link_association_failed(
                "association parameters unavailable",
            )),
        };
        if let Err(e) = result {
            self.record_failure(e);
        }
    }

    fn notify_connected(&mut self) {
        let now = self.clock.now();
        self.connect_duration = self
            .connect_requested_at
            .map(|requested| now.saturating_duration_since(requested));
        info!(
            connect_ms = self.connect_duration.map(|d| d.as_millis() as u64),
            "Connected"
        );

        let Self {
            session,
            clock,
            sink,
            policy,
            ..
        } = self;
        let mut handle = SessionHandle::new(session, &*clock, policy.settle_delay());
        sink.notify_connected(&mut handle);
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}
