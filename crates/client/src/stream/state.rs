//! Connection state machine for the push channel.
//!
//! [`StreamMachine`] performs no I/O. The manager feeds it what happened
//! ([`Input`]) and performs whatever it answers ([`Step`]). Keeping the
//! transitions here makes the retry policy testable without sockets or timers.

use std::time::Duration;

/// Where the subscription currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and nothing scheduled (no credential, or the retry chain was abandoned).
    Idle,
    Connecting,
    Open,
    /// Waiting on the credential provider after repeated failures.
    Refreshing,
    /// Reconnect scheduled after `delay`.
    Backoff { delay: Duration },
    /// `stop()` was called; nothing happens until the next `start()`.
    Stopped,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Snapshot published to status subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failures since the last successful open.
    pub failures: u32,
}

/// Reconnect delay and refresh policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay added per consecutive failure.
    pub step: Duration,
    /// Upper bound on the delay.
    pub cap: Duration,
    /// Consecutive failures at which credentials are refreshed before reconnecting.
    pub refresh_after: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(5000),
            cap: Duration::from_millis(30000),
            refresh_after: 2,
        }
    }
}

impl BackoffPolicy {
    /// Linear backoff: `min(failures * step, cap)`.
    pub fn delay(&self, failures: u32) -> Duration {
        self.step.saturating_mul(failures).min(self.cap)
    }
}

/// Something the manager observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// `start()` was called; `credential` tells whether an access credential exists.
    Start { credential: bool },
    /// The channel opened.
    Opened,
    /// The channel failed to open, errored, or was closed by the server.
    Failed,
    /// The credential refresh finished.
    Refreshed { ok: bool },
    /// The reconnect delay elapsed; `credential` as for `Start`.
    TimerFired { credential: bool },
    Stop,
}

/// What the manager must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Close any existing channel and open a new one.
    Connect,
    /// Keep reading frames from the open channel.
    Read,
    /// Ask the credential provider for a new pair.
    Refresh,
    /// Sleep, then report [`Input::TimerFired`].
    Wait(Duration),
    /// Stop driving; the run is over.
    Halt,
    /// The input does not apply in the current state.
    Ignore,
}

#[derive(Debug, Clone)]
pub struct StreamMachine {
    state: ConnectionState,
    failures: u32,
    policy: BackoffPolicy,
}

impl StreamMachine {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            failures: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            failures: self.failures,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Apply one input and return the step to perform.
    pub fn apply(&mut self, input: Input) -> Step {
        use ConnectionState as S;

        match (self.state, input) {
            (_, Input::Stop) => {
                self.state = S::Stopped;
                Step::Halt
            }
            (_, Input::Start { credential: false }) => Step::Ignore,
            (_, Input::Start { credential: true }) => {
                self.state = S::Connecting;
                self.failures = 0;
                Step::Connect
            }
            (S::Connecting, Input::Opened) => {
                self.state = S::Open;
                self.failures = 0;
                Step::Read
            }
            (S::Connecting | S::Open, Input::Failed) => {
                self.failures = self.failures.saturating_add(1);
                if self.failures >= self.policy.refresh_after {
                    self.state = S::Refreshing;
                    Step::Refresh
                } else {
                    self.backoff()
                }
            }
            (S::Refreshing, Input::Refreshed { ok: true }) => self.backoff(),
            (S::Refreshing, Input::Refreshed { ok: false }) => {
                self.state = S::Idle;
                Step::Halt
            }
            (S::Backoff { .. }, Input::TimerFired { credential: true }) => {
                self.state = S::Connecting;
                Step::Connect
            }
            (S::Backoff { .. }, Input::TimerFired { credential: false }) => {
                self.state = S::Idle;
                Step::Halt
            }
            _ => Step::Ignore,
        }
    }

    fn backoff(&mut self) -> Step {
        let delay = self.policy.delay(self.failures);
        self.state = ConnectionState::Backoff { delay };
        Step::Wait(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StreamMachine {
        StreamMachine::new(BackoffPolicy::default())
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_backoff_delay_is_linear_and_capped() {
        let policy = BackoffPolicy::default();
        for n in 1..=20u32 {
            let expected = Duration::from_millis((n as u64 * 5000).min(30000));
            assert_eq!(policy.delay(n), expected, "failures = {n}");
        }
        assert_eq!(policy.delay(u32::MAX), secs(30));
    }

    #[test]
    fn test_start_without_credential_does_nothing() {
        let mut m = machine();
        assert_eq!(m.apply(Input::Start { credential: false }), Step::Ignore);
        assert_eq!(m.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_open_resets_failures() {
        let mut m = machine();
        m.apply(Input::Start { credential: true });
        m.apply(Input::Failed);
        m.apply(Input::TimerFired { credential: true });
        assert_eq!(m.failures(), 1);

        assert_eq!(m.apply(Input::Opened), Step::Read);
        assert_eq!(m.state(), ConnectionState::Open);
        assert_eq!(m.failures(), 0);
    }

    #[test]
    fn test_first_failure_backs_off_without_refresh() {
        let mut m = machine();
        m.apply(Input::Start { credential: true });
        m.apply(Input::Opened);

        assert_eq!(m.apply(Input::Failed), Step::Wait(secs(5)));
        assert_eq!(m.state(), ConnectionState::Backoff { delay: secs(5) });
        assert_eq!(m.failures(), 1);
    }

    #[test]
    fn test_second_failure_refreshes_then_backs_off() {
        let mut m = machine();
        m.apply(Input::Start { credential: true });
        m.apply(Input::Failed);
        m.apply(Input::TimerFired { credential: true });

        assert_eq!(m.apply(Input::Failed), Step::Refresh);
        assert_eq!(m.state(), ConnectionState::Refreshing);
        assert_eq!(m.apply(Input::Refreshed { ok: true }), Step::Wait(secs(10)));

        m.apply(Input::TimerFired { credential: true });
        assert_eq!(m.apply(Input::Failed), Step::Refresh);
        assert_eq!(m.apply(Input::Refreshed { ok: true }), Step::Wait(secs(15)));
    }

    #[test]
    fn test_rejected_refresh_abandons_chain() {
        let mut m = machine();
        m.apply(Input::Start { credential: true });
        m.apply(Input::Failed);
        m.apply(Input::TimerFired { credential: true });
        m.apply(Input::Failed);

        assert_eq!(m.apply(Input::Refreshed { ok: false }), Step::Halt);
        assert_eq!(m.state(), ConnectionState::Idle);
        // A late timer cannot revive an abandoned chain
        assert_eq!(m.apply(Input::TimerFired { credential: true }), Step::Ignore);
        assert_eq!(m.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_timer_without_credential_goes_idle() {
        let mut m = machine();
        m.apply(Input::Start { credential: true });
        m.apply(Input::Failed);
        assert_eq!(m.apply(Input::TimerFired { credential: false }), Step::Halt);
        assert_eq!(m.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_stop_ignores_late_inputs() {
        let mut m = machine();
        m.apply(Input::Start { credential: true });
        m.apply(Input::Failed);
        assert_eq!(m.apply(Input::Stop), Step::Halt);

        for input in [
            Input::Opened,
            Input::Failed,
            Input::Refreshed { ok: true },
            Input::TimerFired { credential: true },
        ] {
            assert_eq!(m.apply(input), Step::Ignore);
            assert_eq!(m.state(), ConnectionState::Stopped);
        }

        assert_eq!(m.apply(Input::Start { credential: true }), Step::Connect);
    }

    #[test]
    fn test_start_begins_a_fresh_lifecycle() {
        let mut m = machine();
        m.apply(Input::Start { credential: true });
        m.apply(Input::Failed);
        m.apply(Input::Stop);
        assert_eq!(m.failures(), 1);

        assert_eq!(m.apply(Input::Start { credential: true }), Step::Connect);
        assert_eq!(m.failures(), 0);
        assert_eq!(m.apply(Input::Failed), Step::Wait(secs(5)));
        assert_eq!(m.failures(), 1);

        // Restart after an abandoned chain
        m.apply(Input::TimerFired { credential: true });
        m.apply(Input::Failed);
        m.apply(Input::Refreshed { ok: false });
        assert_eq!(m.state(), ConnectionState::Idle);
        m.apply(Input::Start { credential: true });
        assert_eq!(m.apply(Input::Failed), Step::Wait(secs(5)));
    }

    #[test]
    fn test_out_of_order_inputs_are_ignored() {
        let mut m = machine();
        assert_eq!(m.apply(Input::Opened), Step::Ignore);
        assert_eq!(m.apply(Input::Failed), Step::Ignore);
        assert_eq!(m.failures(), 0);

        m.apply(Input::Start { credential: true });
        m.apply(Input::Opened);
        assert_eq!(m.apply(Input::Opened), Step::Ignore);
        assert_eq!(m.apply(Input::Refreshed { ok: true }), Step::Ignore);
    }

    #[test]
    fn test_custom_refresh_threshold() {
        let mut m = StreamMachine::new(BackoffPolicy {
            refresh_after: 3,
            ..BackoffPolicy::default()
        });
        m.apply(Input::Start { credential: true });
        assert_eq!(m.apply(Input::Failed), Step::Wait(secs(5)));
        m.apply(Input::TimerFired { credential: true });
        assert_eq!(m.apply(Input::Failed), Step::Wait(secs(10)));
        m.apply(Input::TimerFired { credential: true });
        assert_eq!(m.apply(Input::Failed), Step::Refresh);
    }
}
