//! Pure phase transition function
//!
//! `step` maps the current phase, the pending command, the adapter signals and
//! the time spent in the phase onto the next phase and an ordered list of side
//! effects. It never touches an adapter; the manager executes the actions.

use super::liveness::{LivenessMonitor, LivenessVerdict};
use super::phase::{Command, ConnectivityState, Phase};
use crate::config::ConnectivityPolicy;
use crate::error::NetError;
use crate::transport::LinkStatus;
use std::time::Duration;

/// Signals sampled at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inputs {
    pub command: Command,
    pub link: LinkStatus,
    pub session_connected: bool,
    /// Time since the current phase was entered
    pub elapsed: Duration,
    pub fast_path_hint: bool,
}

/// Side effect requested by a transition, executed in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Hand the broker settings from the store to the session layer
    ConfigureSession,
    /// Start associating from the cached fast-path parameters
    BeginCachedLink,
    /// Start a credential based association with the stored credentials
    BeginCredentialLink,
    /// Capture channel and peer, drop the link and re-associate pinned to them
    PinLink,
    /// Drop the link without erasing and pause before the next attempt
    ResetLink,
    /// Record the local address and log the association identity
    RecordLinkIdentity,
    SetFastPathHint(bool),
    Persist,
    ConnectSession,
    NotifyConnected,
    CloseSession,
    FlushSession,
    DisconnectLink { erase: bool },
}

/// A phase change with its side effects
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Phase,
    /// New coarse state, applied before any action runs
    pub state: Option<ConnectivityState>,
    pub actions: Vec<Action>,
    pub consumes_command: bool,
    /// Recovered failure behind this transition
    pub failure: Option<NetError>,
}

impl Transition {
    fn to(next: Phase) -> Self {
        Self {
            next,
            state: None,
            actions: Vec::new(),
            consumes_command: false,
            failure: None,
        }
    }

    fn state(mut self, state: ConnectivityState) -> Self {
        self.state = Some(state);
        self
    }

    fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    fn consuming(mut self) -> Self {
        self.consumes_command = true;
        self
    }

    fn failed(mut self, failure: NetError) -> Self {
        self.failure = Some(failure);
        self
    }
}

/// Result of evaluating one tick
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing to do, the phase timer keeps running
    Stay,
    /// Drop the pending command, nothing else changes
    ConsumeCommand,
    /// Enter `next` (possibly the same phase) and restart the phase timer
    Advance(Transition),
}

/// Evaluate one tick of the phase machine
pub fn step(phase: Phase, inputs: &Inputs, policy: &ConnectivityPolicy) -> Step {
    if phase.is_connecting() {
        match interrupt(inputs, phase == Phase::AwaitSession) {
            Some(step @ Step::Advance(_)) => return step,
            // BeginNormalLink takes a repeated connect along as it advances
            Some(step) if phase != Phase::BeginNormalLink => return step,
            _ => {}
        }
    }

    match phase {
        Phase::Idle => idle(inputs),
        Phase::AwaitFastLink => await_fast_link(inputs, policy),
        Phase::BeginNormalLink => begin_normal_link(inputs),
        Phase::AwaitNormalLink => await_normal_link(inputs, policy),
        Phase::AwaitFastPathConfirm => await_fast_path_confirm(inputs, policy),
        Phase::AwaitSession => await_session(inputs, policy),
        Phase::Connected => connected(inputs, policy),
        Phase::AwaitDrain { erase } => await_drain(erase, inputs, policy),
        Phase::Teardown { erase } => teardown(erase, inputs, policy),
    }
}

fn idle(inputs: &Inputs) -> Step {
    match inputs.command {
        Command::None => Step::Stay,
        Command::Connect if inputs.fast_path_hint => Step::Advance(
            Transition::to(Phase::AwaitFastLink)
                .actions([Action::ConfigureSession, Action::BeginCachedLink])
                .consuming(),
        ),
        Command::Connect => Step::Advance(
            Transition::to(Phase::BeginNormalLink)
                .actions([Action::ConfigureSession])
                .consuming(),
        ),
        // Already down, but an erase still purges credentials and the fast path
        Command::Disconnect { erase: true } => Step::Advance(
            Transition::to(Phase::Idle)
                .state(ConnectivityState::Disconnected)
                .actions(erase_actions(true))
                .consuming(),
        ),
        Command::Disconnect { erase: false } => Step::ConsumeCommand,
    }
}

/// Handle a command arriving while a connection attempt is in flight.
/// AwaitSession also closes the half-open session.
fn interrupt(inputs: &Inputs, close_session: bool) -> Option<Step> {
    match inputs.command {
        Command::Disconnect { erase } => {
            let mut actions = Vec::new();
            if close_session {
                actions.push(Action::CloseSession);
            }
            actions.extend(erase_actions(erase));
            Some(Step::Advance(
                Transition::to(Phase::Idle)
                    .state(ConnectivityState::Disconnected)
                    .actions(actions)
                    .consuming(),
            ))
        }
        Command::Connect => Some(Step::ConsumeCommand),
        Command::None => None,
    }
}

/// Drop the link and, when erasing, forget the fast path as well
fn erase_actions(erase: bool) -> Vec<Action> {
    let mut actions = vec![Action::DisconnectLink { erase }];
    if erase {
        actions.extend([Action::SetFastPathHint(false), Action::Persist]);
    }
    actions
}

fn link_timeout(path: &'static str, elapsed: Duration) -> NetError {
    NetError::LinkTimeout {
        path,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    }
}

fn await_fast_link(inputs: &Inputs, policy: &ConnectivityPolicy) -> Step {
    if inputs.link.is_up() {
        Step::Advance(
            Transition::to(Phase::AwaitSession)
                .state(ConnectivityState::LinkUp)
                .actions([
                    Action::RecordLinkIdentity,
                    Action::Persist,
                    Action::ConnectSession,
                ]),
        )
    } else if inputs.elapsed >= policy.fast_link_timeout() {
        Step::Advance(
            Transition::to(Phase::BeginNormalLink)
                .actions([
                    Action::SetFastPathHint(false),
                    Action::Persist,
                    Action::ResetLink,
                ])
                .failed(link_timeout("fast", inputs.elapsed)),
        )
    } else {
        Step::Stay
    }
}

fn begin_normal_link(inputs: &Inputs) -> Step {
    let mut transition =
        Transition::to(Phase::AwaitNormalLink).actions([Action::BeginCredentialLink]);
    transition.consumes_command = inputs.command == Command::Connect;
    Step::Advance(transition)
}

fn await_normal_link(inputs: &Inputs, policy: &ConnectivityPolicy) -> Step {
    if inputs.link.is_up() {
        Step::Advance(Transition::to(Phase::AwaitFastPathConfirm).actions([
            Action::RecordLinkIdentity,
            Action::Persist,
            Action::PinLink,
        ]))
    } else if inputs.elapsed >= policy.normal_link_timeout() {
        Step::Advance(
            Transition::to(Phase::BeginNormalLink)
                .actions([Action::ResetLink])
                .failed(link_timeout("normal", inputs.elapsed)),
        )
    } else {
        Step::Stay
    }
}

fn await_fast_path_confirm(inputs: &Inputs, policy: &ConnectivityPolicy) -> Step {
    if inputs.link.is_up() {
        Step::Advance(
            Transition::to(Phase::AwaitSession)
                .state(ConnectivityState::LinkUp)
                .actions([
                    Action::SetFastPathHint(true),
                    Action::RecordLinkIdentity,
                    Action::Persist,
                    Action::ConnectSession,
                ]),
        )
    } else if inputs.elapsed >= policy.normal_link_timeout() {
        Step::Advance(
            Transition::to(Phase::BeginNormalLink)
                .actions([Action::SetFastPathHint(false), Action::Persist])
                .failed(link_timeout("pinned", inputs.elapsed)),
        )
    } else {
        Step::Stay
    }
}

fn await_session(inputs: &Inputs, policy: &ConnectivityPolicy) -> Step {
    if inputs.session_connected {
        Step::Advance(
            Transition::to(Phase::Connected)
                .state(ConnectivityState::SessionUp)
                .actions([Action::NotifyConnected]),
        )
    } else if inputs.elapsed >= policy.session_timeout() {
        let failure = NetError::session_connect_failed(format!(
            "no session after {}ms",
            inputs.elapsed.as_millis()
        ));
        if inputs.link.is_up() {
            Step::Advance(
                Transition::to(Phase::AwaitSession)
                    .state(ConnectivityState::LinkUp)
                    .actions([Action::ConnectSession])
                    .failed(failure),
            )
        } else {
            Step::Advance(
                Transition::to(Phase::BeginNormalLink)
                    .state(ConnectivityState::Disconnected)
                    .actions([Action::CloseSession, Action::ResetLink])
                    .failed(failure),
            )
        }
    } else {
        Step::Stay
    }
}

fn connected(inputs: &Inputs, policy: &ConnectivityPolicy) -> Step {
    match inputs.command {
        Command::Disconnect { erase } => {
            return Step::Advance(Transition::to(Phase::AwaitDrain { erase }).consuming());
        }
        Command::Connect => return Step::ConsumeCommand,
        Command::None => {}
    }

    if !LivenessMonitor::is_due(inputs.elapsed, policy) {
        return Step::Stay;
    }

    match LivenessMonitor::check(inputs.link, inputs.session_connected) {
        LivenessVerdict::Healthy => Step::Advance(Transition::to(Phase::Connected)),
        LivenessVerdict::LinkLost => Step::Advance(
            Transition::to(Phase::BeginNormalLink)
                .state(ConnectivityState::Disconnected)
                .actions([Action::CloseSession, Action::ResetLink])
                .failed(NetError::link_association_failed("link lost while connected")),
        ),
        LivenessVerdict::SessionLost => Step::Advance(
            Transition::to(Phase::AwaitSession)
                .state(ConnectivityState::LinkUp)
                .actions([Action::ConnectSession])
                .failed(NetError::SessionLost),
        ),
    }
}

fn await_drain(erase: bool, inputs: &Inputs, policy: &ConnectivityPolicy) -> Step {
    // Commands wait until the machine is back in Idle
    if inputs.elapsed >= policy.drain_timeout() {
        Step::Advance(
            Transition::to(Phase::Teardown { erase })
                .actions([Action::CloseSession, Action::FlushSession]),
        )
    } else {
        Step::Stay
    }
}

fn teardown(erase: bool, inputs: &Inputs, policy: &ConnectivityPolicy) -> Step {
    if inputs.session_connected && inputs.elapsed < policy.drain_timeout() {
        return Step::Stay;
    }

    Step::Advance(
        Transition::to(Phase::Idle)
            .state(ConnectivityState::Disconnected)
            .actions(erase_actions(erase)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ConnectivityPolicy {
        ConnectivityPolicy::default()
    }

    fn inputs() -> Inputs {
        Inputs {
            command: Command::None,
            link: LinkStatus::Connecting,
            session_connected: false,
            elapsed: Duration::ZERO,
            fast_path_hint: false,
        }
    }

    fn advance(phase: Phase, inputs: &Inputs) -> Transition {
        match step(phase, inputs, &policy()) {
            Step::Advance(transition) => transition,
            other => panic!("expected a transition from {phase}, got {other:?}"),
        }
    }

    #[test]
    fn test_idle_waits_for_command() {
        assert_eq!(step(Phase::Idle, &inputs(), &policy()), Step::Stay);
    }

    #[test]
    fn test_idle_connect_with_hint_takes_fast_path() {
        let input = Inputs {
            command: Command::Connect,
            fast_path_hint: true,
            ..inputs()
        };

        let t = advance(Phase::Idle, &input);

        assert_eq!(t.next, Phase::AwaitFastLink);
        assert_eq!(
            t.actions,
            vec![Action::ConfigureSession, Action::BeginCachedLink]
        );
        assert!(t.consumes_command);
    }

    #[test]
    fn test_idle_connect_without_hint_takes_normal_path() {
        let input = Inputs {
            command: Command::Connect,
            ..inputs()
        };

        let t = advance(Phase::Idle, &input);

        assert_eq!(t.next, Phase::BeginNormalLink);
        assert_eq!(t.actions, vec![Action::ConfigureSession]);
    }

    #[test]
    fn test_idle_plain_disconnect_is_consumed() {
        let input = Inputs {
            command: Command::Disconnect { erase: false },
            ..inputs()
        };
        assert_eq!(step(Phase::Idle, &input, &policy()), Step::ConsumeCommand);
    }

    #[test]
    fn test_idle_erase_purges_link_and_hint() {
        let input = Inputs {
            command: Command::Disconnect { erase: true },
            ..inputs()
        };

        let t = advance(Phase::Idle, &input);

        assert_eq!(t.next, Phase::Idle);
        assert_eq!(
            t.actions,
            vec![
                Action::DisconnectLink { erase: true },
                Action::SetFastPathHint(false),
                Action::Persist
            ]
        );
    }

    #[test]
    fn test_fast_link_up_goes_to_session() {
        let input = Inputs {
            link: LinkStatus::Connected,
            ..inputs()
        };

        let t = advance(Phase::AwaitFastLink, &input);

        assert_eq!(t.next, Phase::AwaitSession);
        assert_eq!(t.state, Some(ConnectivityState::LinkUp));
        assert_eq!(
            t.actions,
            vec![
                Action::RecordLinkIdentity,
                Action::Persist,
                Action::ConnectSession
            ]
        );
    }

    #[test]
    fn test_fast_link_timeout_clears_hint_before_fallback() {
        let input = Inputs {
            link: LinkStatus::Failed,
            elapsed: Duration::from_millis(5_000),
            ..inputs()
        };

        let t = advance(Phase::AwaitFastLink, &input);

        assert_eq!(t.next, Phase::BeginNormalLink);
        assert_eq!(
            t.actions,
            vec![
                Action::SetFastPathHint(false),
                Action::Persist,
                Action::ResetLink
            ]
        );
        assert!(matches!(
            t.failure,
            Some(NetError::LinkTimeout { path: "fast", .. })
        ));
    }

    #[test]
    fn test_fast_link_before_timeout_stays() {
        let input = Inputs {
            elapsed: Duration::from_millis(4_999),
            ..inputs()
        };
        assert_eq!(step(Phase::AwaitFastLink, &input, &policy()), Step::Stay);
    }

    #[test]
    fn test_disconnect_during_link_attempt_tears_down() {
        for phase in [
            Phase::AwaitFastLink,
            Phase::BeginNormalLink,
            Phase::AwaitNormalLink,
            Phase::AwaitFastPathConfirm,
        ] {
            let input = Inputs {
                command: Command::Disconnect { erase: false },
                link: LinkStatus::Connected,
                ..inputs()
            };

            let t = advance(phase, &input);

            assert_eq!(t.next, Phase::Idle, "from {phase}");
            assert_eq!(t.state, Some(ConnectivityState::Disconnected));
            assert_eq!(t.actions, vec![Action::DisconnectLink { erase: false }]);
            assert!(t.consumes_command);
        }
    }

    #[test]
    fn test_disconnect_during_session_attempt_closes_session_first() {
        let input = Inputs {
            command: Command::Disconnect { erase: true },
            link: LinkStatus::Connected,
            ..inputs()
        };

        let t = advance(Phase::AwaitSession, &input);

        assert_eq!(
            t.actions,
            vec![
                Action::CloseSession,
                Action::DisconnectLink { erase: true },
                Action::SetFastPathHint(false),
                Action::Persist
            ]
        );
    }

    #[test]
    fn test_connect_while_connecting_is_consumed() {
        let input = Inputs {
            command: Command::Connect,
            ..inputs()
        };
        for phase in [
            Phase::AwaitFastLink,
            Phase::AwaitNormalLink,
            Phase::AwaitFastPathConfirm,
            Phase::AwaitSession,
            Phase::Connected,
        ] {
            assert_eq!(
                step(phase, &input, &policy()),
                Step::ConsumeCommand,
                "from {phase}"
            );
        }
    }

    #[test]
    fn test_begin_normal_link_always_advances() {
        let t = advance(Phase::BeginNormalLink, &inputs());
        assert_eq!(t.next, Phase::AwaitNormalLink);
        assert_eq!(t.actions, vec![Action::BeginCredentialLink]);
        assert!(!t.consumes_command);

        let input = Inputs {
            command: Command::Connect,
            ..inputs()
        };
        assert!(advance(Phase::BeginNormalLink, &input).consumes_command);
    }

    #[test]
    fn test_normal_link_up_pins_parameters() {
        let input = Inputs {
            link: LinkStatus::Connected,
            ..inputs()
        };

        let t = advance(Phase::AwaitNormalLink, &input);

        assert_eq!(t.next, Phase::AwaitFastPathConfirm);
        assert_eq!(t.state, None);
        assert_eq!(t.actions.last(), Some(&Action::PinLink));
    }

    #[test]
    fn test_normal_link_timeout_resets_and_retries() {
        let input = Inputs {
            elapsed: Duration::from_millis(20_000),
            ..inputs()
        };

        let t = advance(Phase::AwaitNormalLink, &input);

        assert_eq!(t.next, Phase::BeginNormalLink);
        assert_eq!(t.actions, vec![Action::ResetLink]);
    }

    #[test]
    fn test_confirm_sets_hint_before_session() {
        let input = Inputs {
            link: LinkStatus::Connected,
            ..inputs()
        };

        let t = advance(Phase::AwaitFastPathConfirm, &input);

        assert_eq!(t.next, Phase::AwaitSession);
        assert_eq!(t.state, Some(ConnectivityState::LinkUp));
        assert_eq!(t.actions[0], Action::SetFastPathHint(true));
        let persist = t.actions.iter().position(|a| *a == Action::Persist);
        let connect = t.actions.iter().position(|a| *a == Action::ConnectSession);
        assert!(persist < connect);
    }

    #[test]
    fn test_confirm_timeout_clears_hint() {
        let input = Inputs {
            elapsed: Duration::from_millis(20_000),
            ..inputs()
        };

        let t = advance(Phase::AwaitFastPathConfirm, &input);

        assert_eq!(t.next, Phase::BeginNormalLink);
        assert_eq!(
            t.actions,
            vec![Action::SetFastPathHint(false), Action::Persist]
        );
    }

    #[test]
    fn test_session_up_notifies() {
        let input = Inputs {
            link: LinkStatus::Connected,
            session_connected: true,
            ..inputs()
        };

        let t = advance(Phase::AwaitSession, &input);

        assert_eq!(t.next, Phase::Connected);
        assert_eq!(t.state, Some(ConnectivityState::SessionUp));
        assert_eq!(t.actions, vec![Action::NotifyConnected]);
    }

    #[test]
    fn test_session_timeout_with_link_retries_session() {
        let input = Inputs {
            link: LinkStatus::Connected,
            elapsed: Duration::from_millis(10_000),
            ..inputs()
        };

        let t = advance(Phase::AwaitSession, &input);

        assert_eq!(t.next, Phase::AwaitSession);
        assert_eq!(t.actions, vec![Action::ConnectSession]);
        assert!(matches!(
            t.failure,
            Some(NetError::SessionConnectFailed { .. })
        ));
    }

    #[test]
    fn test_session_timeout_without_link_restarts_link() {
        let input = Inputs {
            link: LinkStatus::Failed,
            elapsed: Duration::from_millis(10_000),
            ..inputs()
        };

        let t = advance(Phase::AwaitSession, &input);

        assert_eq!(t.next, Phase::BeginNormalLink);
        assert_eq!(t.state, Some(ConnectivityState::Disconnected));
        assert_eq!(t.actions, vec![Action::CloseSession, Action::ResetLink]);
    }

    #[test]
    fn test_connected_liveness_not_due() {
        let input = Inputs {
            link: LinkStatus::Failed,
            elapsed: Duration::from_millis(4_000),
            ..inputs()
        };
        assert_eq!(step(Phase::Connected, &input, &policy()), Step::Stay);
    }

    #[test]
    fn test_connected_healthy_check_rearms_timer() {
        let input = Inputs {
            link: LinkStatus::Connected,
            session_connected: true,
            elapsed: Duration::from_millis(5_000),
            ..inputs()
        };

        let t = advance(Phase::Connected, &input);

        assert_eq!(t.next, Phase::Connected);
        assert!(t.actions.is_empty());
        assert_eq!(t.state, None);
    }

    #[test]
    fn test_connected_link_loss_restarts_normal_path() {
        let input = Inputs {
            link: LinkStatus::Failed,
            session_connected: false,
            elapsed: Duration::from_millis(5_000),
            ..inputs()
        };

        let t = advance(Phase::Connected, &input);

        assert_eq!(t.next, Phase::BeginNormalLink);
        assert_eq!(t.state, Some(ConnectivityState::Disconnected));
    }

    #[test]
    fn test_connected_session_loss_reconnects_session() {
        let input = Inputs {
            link: LinkStatus::Connected,
            session_connected: false,
            elapsed: Duration::from_millis(5_000),
            ..inputs()
        };

        let t = advance(Phase::Connected, &input);

        assert_eq!(t.next, Phase::AwaitSession);
        assert_eq!(t.state, Some(ConnectivityState::LinkUp));
        assert_eq!(t.actions, vec![Action::ConnectSession]);
        assert_eq!(t.failure, Some(NetError::SessionLost));
    }

    #[test]
    fn test_connected_disconnect_starts_drain() {
        let input = Inputs {
            command: Command::Disconnect { erase: true },
            link: LinkStatus::Connected,
            session_connected: true,
            ..inputs()
        };

        let t = advance(Phase::Connected, &input);

        assert_eq!(t.next, Phase::AwaitDrain { erase: true });
        assert!(t.actions.is_empty());
        assert!(t.consumes_command);
    }

    #[test]
    fn test_drain_ignores_commands_until_timeout() {
        let phase = Phase::AwaitDrain { erase: false };
        let input = Inputs {
            command: Command::Connect,
            session_connected: true,
            elapsed: Duration::from_millis(499),
            ..inputs()
        };
        assert_eq!(step(phase, &input, &policy()), Step::Stay);

        let input = Inputs {
            elapsed: Duration::from_millis(500),
            ..input
        };
        let t = advance(phase, &input);
        assert_eq!(t.next, Phase::Teardown { erase: false });
        assert_eq!(t.actions, vec![Action::CloseSession, Action::FlushSession]);
        assert!(!t.consumes_command);
    }

    #[test]
    fn test_teardown_waits_for_session_close() {
        let phase = Phase::Teardown { erase: false };
        let input = Inputs {
            session_connected: true,
            elapsed: Duration::from_millis(100),
            ..inputs()
        };
        assert_eq!(step(phase, &input, &policy()), Step::Stay);

        let input = Inputs {
            session_connected: false,
            ..input
        };
        let t = advance(phase, &input);
        assert_eq!(t.next, Phase::Idle);
        assert_eq!(t.state, Some(ConnectivityState::Disconnected));
        assert_eq!(t.actions, vec![Action::DisconnectLink { erase: false }]);
    }

    #[test]
    fn test_teardown_forced_after_drain_timeout() {
        let input = Inputs {
            session_connected: true,
            elapsed: Duration::from_millis(500),
            ..inputs()
        };

        let t = advance(Phase::Teardown { erase: true }, &input);

        assert_eq!(t.next, Phase::Idle);
        assert_eq!(
            t.actions,
            vec![
                Action::DisconnectLink { erase: true },
                Action::SetFastPathHint(false),
                Action::Persist
            ]
        );
    }

    #[test]
    fn test_transitions_never_exceed_state_ceiling() {
        let phases = [
            Phase::Idle,
            Phase::AwaitFastLink,
            Phase::BeginNormalLink,
            Phase::AwaitNormalLink,
            Phase::AwaitFastPathConfirm,
            Phase::AwaitSession,
            Phase::Connected,
            Phase::AwaitDrain { erase: false },
            Phase::Teardown { erase: false },
        ];
        let commands = [
            Command::None,
            Command::Connect,
            Command::Disconnect { erase: false },
            Command::Disconnect { erase: true },
        ];
        let links = [LinkStatus::Connected, LinkStatus::Connecting, LinkStatus::Failed];

        for phase in phases {
            for command in commands {
                for link in links {
                    for session_connected in [false, true] {
                        for elapsed_ms in [0, 60_000] {
                            let input = Inputs {
                                command,
                                link,
                                session_connected,
                                elapsed: Duration::from_millis(elapsed_ms),
                                fast_path_hint: true,
                            };
                            if let Step::Advance(t) = step(phase, &input, &policy()) {
                                if let Some(state) = t.state {
                                    assert!(state <= t.next.state_ceiling());
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
