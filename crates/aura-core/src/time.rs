//! Time primitives for AURA producers
//!
//! Collaborators deliver samples with a monotonically increasing timestamp.
//! Producers measure cooldowns and debounce windows against that timestamp,
//! never against the wall clock, so the same input always yields the same
//! signals.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Sense time - monotonic, collaborator-driven
/// Represented as microseconds since the collaborator's epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SenseTime(pub u64);

impl SenseTime {
    pub const ZERO: SenseTime = SenseTime(0);

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        SenseTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        SenseTime(millis.saturating_mul(1000))
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        SenseTime((secs.max(0.0) * 1_000_000.0) as u64)
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        SenseTime(self.0.saturating_add(duration.as_micros() as u64))
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    #[inline]
    pub fn since(self, earlier: SenseTime) -> Duration {
        self - earlier
    }
}

impl Add<Duration> for SenseTime {
    type Output = SenseTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<SenseTime> for SenseTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: SenseTime) -> Self::Output {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Debug for SenseTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}ms)", self.0 as f64 / 1000.0)
    }
}

/// A cooldown gate measured in sense time
#[derive(Clone, Copy, Debug)]
pub struct Cooldown {
    period: Duration,
    last: Option<SenseTime>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Cooldown { period, last: None }
    }

    /// Is the gate open at `now`?
    pub fn is_ready(&self, now: SenseTime) -> bool {
        match self.last {
            Some(last) => now.since(last) >= self.period,
            None => true,
        }
    }

    /// Fire the gate if open. Returns true if it fired.
    pub fn try_fire(&mut self, now: SenseTime) -> bool {
        if self.is_ready(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    /// Close the gate from `now` regardless of its current state
    pub fn trigger(&mut self, now: SenseTime) {
        self.last = Some(now);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
