//! Motion producer - accelerometer and proximity samples
//!
//! Axes follow the usual handheld convention in portrait: x to the right,
//! y up along the screen, z out of the screen, in m/s².

use std::collections::VecDeque;
use std::time::Duration;

use aura_core::{Cooldown, SenseTime, Signal};
use tracing::debug;

/// Standard gravity
pub const GRAVITY: f32 = 9.81;

/// Motion producer configuration
#[derive(Clone, Debug)]
pub struct MotionConfig {
    /// Low-pass factor for tilt and roll (0 = frozen, 1 = raw)
    pub smoothing: f32,
    /// Deviation of |a| from gravity that counts as a shake peak
    pub shake_threshold: f32,
    /// Peaks needed inside `shake_window`
    pub shake_peaks: usize,
    pub shake_window: Duration,
    pub shake_cooldown: Duration,
    /// Fraction of the sensor range below which an object is "near"
    pub near_ratio: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            smoothing: 0.15,
            shake_threshold: 12.0,
            shake_peaks: 3,
            shake_window: Duration::from_millis(800),
            shake_cooldown: Duration::from_millis(1500),
            near_ratio: 0.5,
        }
    }
}

/// One accelerometer reading
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct AccelSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub timestamp: SenseTime,
}

impl AccelSample {
    pub fn new(x: f32, y: f32, z: f32, timestamp: SenseTime) -> Self {
        Self { x, y, z, timestamp }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Converts raw motion samples into tilt, roll, shake and proximity signals
pub struct MotionProducer {
    config: MotionConfig,
    smoothed: Option<(f32, f32, f32)>,
    above_threshold: bool,
    peaks: VecDeque<SenseTime>,
    shake_gate: Cooldown,
    near: Option<bool>,
}

impl MotionProducer {
    pub fn new(config: MotionConfig) -> Self {
        let shake_gate = Cooldown::new(config.shake_cooldown);
        MotionProducer {
            config,
            smoothed: None,
            above_threshold: false,
            peaks: VecDeque::new(),
            shake_gate,
            near: None,
        }
    }

    /// Process one accelerometer sample.
    /// Always yields a tilt and a roll update; may add `Shake`.
    pub fn on_accel(&mut self, sample: AccelSample) -> Vec<Signal> {
        if !(sample.x.is_finite() && sample.y.is_finite() && sample.z.is_finite()) {
            return Vec::new();
        }

        let alpha = self.config.smoothing.clamp(0.0, 1.0);
        let (sx, sy, sz) = match self.smoothed {
            Some((px, py, pz)) => (
                px + (sample.x - px) * alpha,
                py + (sample.y - py) * alpha,
                pz + (sample.z - pz) * alpha,
            ),
            None => (sample.x, sample.y, sample.z),
        };
        self.smoothed = Some((sx, sy, sz));

        let roll = if sx == 0.0 && sy == 0.0 {
            0.0
        } else {
            sx.atan2(sy).to_degrees()
        };

        let mut signals = vec![
            Signal::tilt(-sx / GRAVITY, sz / GRAVITY),
            Signal::HeadRollUpdate(roll),
        ];

        if self.detect_shake(&sample) {
            signals.push(Signal::Shake);
        }
        signals
    }

    fn detect_shake(&mut self, sample: &AccelSample) -> bool {
        let now = sample.timestamp;
        let above = (sample.magnitude() - GRAVITY).abs() > self.config.shake_threshold;
        let rising = above && !self.above_threshold;
        self.above_threshold = above;

        while let Some(&oldest) = self.peaks.front() {
            if now.since(oldest) > self.config.shake_window {
                self.peaks.pop_front();
            } else {
                break;
            }
        }

        if !rising {
            return false;
        }
        self.peaks.push_back(now);

        if self.peaks.len() >= self.config.shake_peaks && self.shake_gate.try_fire(now) {
            debug!("Shake detected: {} peaks in window", self.peaks.len());
            self.peaks.clear();
            return true;
        }
        false
    }

    /// Process one proximity reading. Emits only on near/far edges;
    /// a first "far" reading says nothing.
    pub fn on_proximity(&mut self, distance: f32, max_range: f32) -> Option<Signal> {
        if !distance.is_finite() {
            return None;
        }
        let near = if max_range > 0.0 {
            distance < max_range * self.config.near_ratio
        } else {
            distance <= 0.0
        };

        let previous = self.near.replace(near);
        match (previous, near) {
            (Some(true), true) | (Some(false), false) | (None, false) => None,
            (_, true) => Some(Signal::ProximityClose),
            (Some(true), false) => Some(Signal::ProximityFar),
        }
    }
}

impl Default for MotionProducer {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64, x: f32, y: f32, z: f32) -> AccelSample {
        AccelSample::new(x, y, z, SenseTime::from_millis(ms))
    }

    #[test]
    fn test_upright_device_is_level() {
        let mut producer = MotionProducer::default();
        let signals = producer.on_accel(at(0, 0.0, GRAVITY, 0.0));
        assert_eq!(signals[0], Signal::TiltUpdate { x: 0.0, y: 0.0 });
        assert_eq!(signals[1], Signal::HeadRollUpdate(0.0));
    }

    #[test]
    fn test_tilt_is_smoothed() {
        let mut producer = MotionProducer::default();
        producer.on_accel(at(0, 0.0, GRAVITY, 0.0));
        let signals = producer.on_accel(at(20, -GRAVITY, 0.0, 0.0));

        match signals[0] {
            Signal::TiltUpdate { x, .. } => assert!((x - 0.15).abs() < 1e-4),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rolled_device() {
        let mut producer = MotionProducer::default();
        let signals = producer.on_accel(at(0, GRAVITY, GRAVITY, 0.0));
        match signals[1] {
            Signal::HeadRollUpdate(deg) => assert!((deg - 45.0).abs() < 1e-3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_three_peaks_make_a_shake() {
        let mut producer = MotionProducer::default();
        let hard = 30.0;
        let mut shakes = 0;
        for (i, ms) in [0u64, 100, 200, 300, 400, 500].iter().enumerate() {
            let x = if i % 2 == 0 { hard } else { 0.0 };
            let y = if i % 2 == 0 { 0.0 } else { GRAVITY };
            let signals = producer.on_accel(at(*ms, x, y, 0.0));
            shakes += signals.iter().filter(|s| **s == Signal::Shake).count();
        }
        assert_eq!(shakes, 1);
    }

    #[test]
    fn test_sustained_force_is_one_peak() {
        let mut producer = MotionProducer::default();
        for ms in 0..10 {
            let signals = producer.on_accel(at(ms * 10, 30.0, 0.0, 0.0));
            assert!(!signals.contains(&Signal::Shake));
        }
    }

    #[test]
    fn test_peaks_outside_window_expire() {
        let mut producer = MotionProducer::default();
        for ms in [0u64, 1000, 2000, 3000] {
            let signals = producer.on_accel(at(ms, 30.0, 0.0, 0.0));
            assert!(!signals.contains(&Signal::Shake));
            producer.on_accel(at(ms + 10, 0.0, GRAVITY, 0.0));
        }
    }

    #[test]
    fn test_proximity_edges() {
        let mut producer = MotionProducer::default();
        assert_eq!(producer.on_proximity(5.0, 5.0), None);
        assert_eq!(producer.on_proximity(0.0, 5.0), Some(Signal::ProximityClose));
        assert_eq!(producer.on_proximity(0.0, 5.0), None);
        assert_eq!(producer.on_proximity(5.0, 5.0), Some(Signal::ProximityFar));
    }

    #[test]
    fn test_first_near_reading_reports_close() {
        let mut producer = MotionProducer::default();
        assert_eq!(producer.on_proximity(1.0, 8.0), Some(Signal::ProximityClose));
    }

    #[test]
    fn test_non_finite_samples_ignored() {
        let mut producer = MotionProducer::default();
        assert!(producer.on_accel(at(0, f32::NAN, 0.0, 0.0)).is_empty());
        assert_eq!(producer.on_proximity(f32::INFINITY, 5.0), None);
    }
}
