//! State machine - hold windows, priority and inactivity
//!
//! The machine is a pure function of (current state, signal, now). It owns
//! two deadlines rather than live timers:
//! - the hold deadline, set when an accepted transition enters an
//!   expressive state
//! - the inactivity deadline, restarted by every discrete signal except
//!   `InactivityTimeout` and `Silence`
//!
//! The runtime sleeps until `inactivity_deadline()` and calls
//! `poll_inactivity`; nothing here spawns or blocks.

use std::time::{Duration, Instant};

use aura_core::{Signal, State};
use tracing::debug;

/// State machine configuration
#[derive(Clone, Debug)]
pub struct MachineConfig {
    /// How long an expressive state is held against weak signals
    pub hold_duration: Duration,
    /// Quiet period after which the agent falls asleep
    pub inactivity_timeout: Duration,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            hold_duration: Duration::from_millis(2500),
            inactivity_timeout: Duration::from_secs(30),
        }
    }
}

impl MachineConfig {
    /// Shorter holds and a quicker sleep, for kiosk-style deployments
    pub fn responsive() -> Self {
        MachineConfig {
            hold_duration: Duration::from_millis(1200),
            inactivity_timeout: Duration::from_secs(15),
        }
    }
}

/// Continuous values published alongside the state
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ContinuousValues {
    /// Audio amplitude [0.0 - 1.0]
    pub amplitude: f32,
    /// Eye offset x [-1.0 - 1.0]
    pub tilt_x: f32,
    /// Eye offset y [-1.0 - 1.0]
    pub tilt_y: f32,
    /// Head roll in degrees
    pub roll: f32,
}

/// Result of feeding one signal to the machine
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    /// State changed
    Transitioned { from: State, to: State },
    /// Table maps the signal back onto the current state
    Unchanged(State),
    /// A weak signal tried to leave a held state
    Suppressed { current: State, wanted: State },
    /// Continuous payload applied; state untouched
    Continuous,
}

impl Outcome {
    /// The (from, to) pair if the state changed
    pub fn state_change(&self) -> Option<(State, State)> {
        match *self {
            Outcome::Transitioned { from, to } => Some((from, to)),
            _ => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Outcome::Suppressed { .. })
    }
}

#[derive(Clone, Debug, Default)]
pub struct MachineStats {
    pub processed: u64,
    pub transitions: u64,
    pub suppressed: u64,
    pub continuous: u64,
    pub inactivity_timeouts: u64,
}

/// The authoritative emotional state machine
pub struct StateMachine {
    state: State,
    held_until: Option<Instant>,
    inactivity_deadline: Option<Instant>,
    continuous: ContinuousValues,
    config: MachineConfig,
    stats: MachineStats,
}

impl StateMachine {
    /// Create a machine in `Idle` with the inactivity countdown armed
    pub fn new(config: MachineConfig, now: Instant) -> Self {
        Self::with_state(State::Idle, config, now)
    }

    pub fn with_state(state: State, config: MachineConfig, now: Instant) -> Self {
        StateMachine {
            state,
            held_until: None,
            inactivity_deadline: Some(now + config.inactivity_timeout),
            continuous: ContinuousValues::default(),
            config,
            stats: MachineStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    pub fn continuous(&self) -> ContinuousValues {
        self.continuous
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn stats(&self) -> &MachineStats {
        &self.stats
    }

    /// Is a hold window in effect at `now`?
    pub fn is_held(&self, now: Instant) -> bool {
        self.held_until.map_or(false, |until| now < until)
    }

    /// Time left in the hold window
    pub fn hold_remaining(&self, now: Instant) -> Option<Duration> {
        self.held_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    /// When the inactivity countdown expires, if armed
    pub fn inactivity_deadline(&self) -> Option<Instant> {
        self.inactivity_deadline
    }

    /// Feed one signal
    pub fn on_signal(&mut self, signal: Signal, now: Instant) -> Outcome {
        self.stats.processed += 1;

        let signal = signal.normalized();
        match signal {
            Signal::AudioLevel(amplitude) => {
                self.continuous.amplitude = amplitude;
                self.stats.continuous += 1;
                return Outcome::Continuous;
            }
            Signal::TiltUpdate { x, y } => {
                self.continuous.tilt_x = x;
                self.continuous.tilt_y = y;
                self.stats.continuous += 1;
                return Outcome::Continuous;
            }
            Signal::HeadRollUpdate(degrees) => {
                self.continuous.roll = degrees;
                self.stats.continuous += 1;
                return Outcome::Continuous;
            }
            Signal::InactivityTimeout => {
                self.inactivity_deadline = None;
                self.stats.inactivity_timeouts += 1;
            }
            _ => {}
        }

        if signal.restarts_inactivity() {
            self.inactivity_deadline = Some(now + self.config.inactivity_timeout);
        }

        let next = self.state.next(signal);
        if next == self.state {
            return Outcome::Unchanged(self.state);
        }

        if self.is_held(now) && !signal.is_strong() {
            self.stats.suppressed += 1;
            debug!(
                "Suppressed {} during hold: {} -> {}",
                signal, self.state, next
            );
            return Outcome::Suppressed {
                current: self.state,
                wanted: next,
            };
        }

        let from = self.state;
        self.state = next;
        self.held_until = if next.is_expressive() {
            Some(now + self.config.hold_duration)
        } else {
            None
        };
        self.stats.transitions += 1;

        Outcome::Transitioned { from, to: next }
    }

    /// Inject `InactivityTimeout` if the countdown has expired at `now`
    pub fn poll_inactivity(&mut self, now: Instant) -> Option<Outcome> {
        match self.inactivity_deadline {
            Some(deadline) if deadline <= now => {
                Some(self.on_signal(Signal::InactivityTimeout, now))
            }
            _ => None,
        }
    }

    /// Disarm both deadlines (engine shutdown)
    pub fn cancel_timers(&mut self) {
        self.held_until = None;
        self.inactivity_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HOLD: Duration = Duration::from_millis(2500);
    const INACTIVITY: Duration = Duration::from_secs(30);

    fn machine_at(state: State) -> (StateMachine, Instant) {
        let now = Instant::now();
        (
            StateMachine::with_state(state, MachineConfig::default(), now),
            now,
        )
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_face_then_smile_is_held() {
        let (mut m, t0) = machine_at(State::Idle);

        assert_eq!(
            m.on_signal(Signal::FaceDetected, t0),
            Outcome::Transitioned { from: State::Idle, to: State::Curious }
        );
        assert!(!m.is_held(t0));

        let t1 = t0 + ms(100);
        assert_eq!(
            m.on_signal(Signal::SmileDetected, t1),
            Outcome::Transitioned { from: State::Curious, to: State::Happy }
        );
        assert!(m.is_held(t1));
        assert_eq!(m.hold_remaining(t1), Some(HOLD));

        // Happy has no FaceLost transition, held or not
        assert_eq!(m.on_signal(Signal::FaceLost, t1 + ms(500)), Outcome::Unchanged(State::Happy));
        assert!(!m.is_held(t1 + HOLD));
        assert_eq!(m.on_signal(Signal::FaceLost, t1 + HOLD), Outcome::Unchanged(State::Happy));
    }

    #[test]
    fn test_weak_signal_suppressed_during_hold() {
        let (mut m, t0) = machine_at(State::Idle);
        m.on_signal(Signal::SmileDetected, t0);

        let outcome = m.on_signal(Signal::SurpriseDetected, t0 + ms(1000));
        assert_eq!(
            outcome,
            Outcome::Suppressed { current: State::Happy, wanted: State::Surprised }
        );
        assert_eq!(m.state(), State::Happy);
        assert_eq!(m.stats().suppressed, 1);

        // Suppression does not restart the hold
        assert!(!m.is_held(t0 + HOLD));
        assert_eq!(
            m.on_signal(Signal::SurpriseDetected, t0 + HOLD),
            Outcome::Transitioned { from: State::Happy, to: State::Surprised }
        );
    }

    #[test]
    fn test_strong_signal_breaks_hold_and_restarts_it() {
        let (mut m, t0) = machine_at(State::Idle);
        m.on_signal(Signal::SmileDetected, t0);

        let t1 = t0 + ms(1000);
        assert_eq!(
            m.on_signal(Signal::Shake, t1),
            Outcome::Transitioned { from: State::Happy, to: State::Angry }
        );
        assert_eq!(m.hold_remaining(t1), Some(HOLD));
    }

    #[test]
    fn test_non_expressive_target_clears_hold() {
        let (mut m, t0) = machine_at(State::Idle);
        m.on_signal(Signal::SmileDetected, t0);
        m.on_signal(Signal::ProximityClose, t0 + ms(10));
        assert_eq!(m.state(), State::Sleep);
        assert!(!m.is_held(t0 + ms(20)));

        assert_eq!(
            m.on_signal(Signal::ProximityFar, t0 + ms(20)),
            Outcome::Transitioned { from: State::Sleep, to: State::Idle }
        );
    }

    #[test]
    fn test_repeated_signal_while_held_transitions_once() {
        let (mut m, t0) = machine_at(State::Curious);
        let first = m.on_signal(Signal::AngerDetected, t0);
        let second = m.on_signal(Signal::AngerDetected, t0 + ms(50));

        assert!(first.state_change().is_some());
        assert_eq!(second, Outcome::Unchanged(State::Angry));
        assert_eq!(m.stats().transitions, 1);
        // Re-entry did not extend the hold
        assert!(!m.is_held(t0 + HOLD));
    }

    #[test]
    fn test_audio_level_then_loud_sound() {
        let (mut m, t0) = machine_at(State::Idle);
        assert_eq!(m.on_signal(Signal::AudioLevel(0.9), t0), Outcome::Continuous);
        m.on_signal(Signal::LoudSound, t0 + ms(5));

        assert_eq!(m.continuous().amplitude, 0.9);
        assert_eq!(m.state(), State::Surprised);
    }

    #[test]
    fn test_continuous_applies_during_hold() {
        let (mut m, t0) = machine_at(State::Idle);
        m.on_signal(Signal::SmileDetected, t0);
        m.on_signal(Signal::TiltUpdate { x: 0.3, y: -0.4 }, t0 + ms(10));
        m.on_signal(Signal::HeadRollUpdate(12.5), t0 + ms(20));

        let values = m.continuous();
        assert_eq!((values.tilt_x, values.tilt_y, values.roll), (0.3, -0.4, 12.5));
        assert_eq!(m.state(), State::Happy);
    }

    #[test]
    fn test_out_of_range_payloads_are_clamped() {
        let (mut m, t0) = machine_at(State::Idle);
        m.on_signal(Signal::AudioLevel(5.0), t0);
        m.on_signal(Signal::TiltUpdate { x: -7.0, y: 3.0 }, t0);
        m.on_signal(Signal::HeadRollUpdate(f32::NAN), t0);

        let values = m.continuous();
        assert_eq!(values.amplitude, 1.0);
        assert_eq!((values.tilt_x, values.tilt_y), (-1.0, 1.0));
        assert_eq!(values.roll, 0.0);

        // NaN settles on a value that compares equal to itself
        m.on_signal(Signal::AudioLevel(f32::NAN), t0);
        assert_eq!(m.continuous(), m.continuous());
        assert_eq!(m.continuous().amplitude, 0.0);
    }

    #[test]
    fn test_inactivity_puts_agent_to_sleep() {
        let (mut m, t0) = machine_at(State::Idle);
        m.on_signal(Signal::FaceDetected, t0);

        assert_eq!(m.poll_inactivity(t0 + INACTIVITY - ms(1)), None);
        let outcome = m.poll_inactivity(t0 + INACTIVITY);
        assert_eq!(
            outcome,
            Some(Outcome::Transitioned { from: State::Curious, to: State::Sleep })
        );
        assert_eq!(m.inactivity_deadline(), None);
        assert_eq!(m.stats().inactivity_timeouts, 1);
    }

    #[test]
    fn test_silence_and_continuous_do_not_restart_inactivity() {
        let (mut m, t0) = machine_at(State::Idle);
        let deadline = m.inactivity_deadline();

        m.on_signal(Signal::Silence, t0 + ms(1000));
        m.on_signal(Signal::AudioLevel(0.2), t0 + ms(2000));
        assert_eq!(m.inactivity_deadline(), deadline);

        m.on_signal(Signal::FaceLost, t0 + ms(3000));
        assert_eq!(m.inactivity_deadline(), Some(t0 + ms(3000) + INACTIVITY));
    }

    #[test]
    fn test_suppressed_signal_still_restarts_inactivity() {
        let (mut m, t0) = machine_at(State::Idle);
        m.on_signal(Signal::SmileDetected, t0);
        let t1 = t0 + ms(200);
        assert!(m.on_signal(Signal::AngerDetected, t1).is_suppressed());
        assert_eq!(m.inactivity_deadline(), Some(t1 + INACTIVITY));
    }

    #[test]
    fn test_cancel_timers() {
        let (mut m, t0) = machine_at(State::Idle);
        m.on_signal(Signal::SmileDetected, t0);
        m.cancel_timers();
        assert!(!m.is_held(t0));
        assert_eq!(m.inactivity_deadline(), None);
        assert_eq!(m.poll_inactivity(t0 + INACTIVITY * 2), None);
    }

    fn any_state() -> impl Strategy<Value = State> {
        prop::sample::select(State::ALL.to_vec())
    }

    fn weak_signal() -> impl Strategy<Value = Signal> {
        prop::sample::select(
            Signal::DISCRETE
                .iter()
                .copied()
                .filter(|s| !s.is_strong())
                .collect::<Vec<_>>(),
        )
    }

    fn strong_signal() -> impl Strategy<Value = Signal> {
        prop::sample::select(vec![
            Signal::Shake,
            Signal::LoudSound,
            Signal::ProximityClose,
            Signal::UserTap,
        ])
    }

    proptest! {
        #[test]
        fn prop_weak_signals_never_move_a_held_state(
            entry in prop::sample::select(vec![
                Signal::SmileDetected,
                Signal::AngerDetected,
                Signal::SurpriseDetected,
            ]),
            weak in prop::collection::vec(weak_signal(), 1..20),
        ) {
            let (mut m, t0) = machine_at(State::Idle);
            m.on_signal(entry, t0);
            let held = m.state();

            for (i, signal) in weak.into_iter().enumerate() {
                let now = t0 + ms(i as u64 * 100);
                prop_assert!(m.is_held(now));
                m.on_signal(signal, now);
                prop_assert_eq!(m.state(), held);
            }
        }

        #[test]
        fn prop_strong_signal_always_applies_table(
            start in any_state(),
            strong in strong_signal(),
        ) {
            let (mut m, t0) = machine_at(start);
            m.on_signal(Signal::SmileDetected, t0);
            let expected = m.state().next(strong);
            m.on_signal(strong, t0 + ms(10));
            prop_assert_eq!(m.state(), expected);
        }

        #[test]
        fn prop_unheld_machine_follows_table(start in any_state(), signal in weak_signal()) {
            let (mut m, t0) = machine_at(start);
            m.on_signal(signal, t0);
            prop_assert_eq!(m.state(), start.next(signal));
        }

        #[test]
        fn prop_proximity_round_trip_returns_to_idle(start in any_state()) {
            prop_assume!(start != State::Sleep);
            let (mut m, t0) = machine_at(start);
            m.on_signal(Signal::ProximityClose, t0);
            m.on_signal(Signal::ProximityFar, t0 + ms(10));
            prop_assert_eq!(m.state(), State::Idle);
        }
    }
}
