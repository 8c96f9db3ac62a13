//! Audio producer - microphone loudness and voice activity
//!
//! Buffers arrive back to back at a fixed sample rate, so the producer keeps
//! its own clock from the number of samples it has seen.

use std::time::Duration;

use aura_core::{Cooldown, SenseTime, Signal};
use tracing::{debug, trace};

/// Audio producer configuration
#[derive(Clone, Debug)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Amplitude at or above which a buffer is a loud sound
    pub loud_threshold: f32,
    /// Amplitude at or above which a buffer counts as voiced
    pub speech_threshold: f32,
    /// Amplitude below which a buffer counts as quiet
    pub silence_threshold: f32,
    /// Consecutive voiced buffers needed for `SpeechDetected`
    pub speech_buffers: u32,
    /// Quiet time after activity before `Silence`
    pub silence_after: Duration,
    pub loud_cooldown: Duration,
    pub speech_cooldown: Duration,
    /// Multiplier applied to normalized RMS before clamping
    pub gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            sample_rate: 16_000,
            loud_threshold: 0.6,
            speech_threshold: 0.08,
            silence_threshold: 0.03,
            speech_buffers: 3,
            silence_after: Duration::from_secs(3),
            loud_cooldown: Duration::from_secs(2),
            speech_cooldown: Duration::from_secs(2),
            gain: 4.0,
        }
    }
}

/// Root-mean-square of 16-bit PCM, normalized to [0.0 - 1.0]
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / 32768.0;
            v * v
        })
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Converts PCM buffers into loudness and audio event signals
pub struct AudioProducer {
    config: AudioConfig,
    samples_seen: u64,
    voiced_run: u32,
    last_active: Option<SenseTime>,
    silence_reported: bool,
    loud_gate: Cooldown,
    speech_gate: Cooldown,
}

impl AudioProducer {
    pub fn new(config: AudioConfig) -> Self {
        let loud_gate = Cooldown::new(config.loud_cooldown);
        let speech_gate = Cooldown::new(config.speech_cooldown);
        AudioProducer {
            config,
            samples_seen: 0,
            voiced_run: 0,
            last_active: None,
            silence_reported: false,
            loud_gate,
            speech_gate,
        }
    }

    /// Stream time at the end of the last buffer
    pub fn elapsed(&self) -> SenseTime {
        let rate = self.config.sample_rate.max(1) as u64;
        SenseTime::from_micros(self.samples_seen.saturating_mul(1_000_000) / rate)
    }

    /// Normalized loudness of a buffer after gain
    pub fn amplitude(&self, samples: &[i16]) -> f32 {
        (rms(samples) * self.config.gain).clamp(0.0, 1.0)
    }

    /// Process one buffer. The first signal is always the `AudioLevel`.
    pub fn on_buffer(&mut self, samples: &[i16]) -> Vec<Signal> {
        self.samples_seen += samples.len() as u64;
        let now = self.elapsed();
        let amplitude = self.amplitude(samples);

        let mut signals = vec![Signal::audio_level(amplitude)];

        if amplitude >= self.config.loud_threshold {
            self.mark_active(now);
            self.voiced_run = 0;
            if self.loud_gate.try_fire(now) {
                debug!("Loud sound at {:?}: amplitude {:.2}", now, amplitude);
                signals.push(Signal::LoudSound);
            }
        } else if amplitude >= self.config.speech_threshold {
            self.mark_active(now);
            self.voiced_run = self.voiced_run.saturating_add(1);
            if self.voiced_run >= self.config.speech_buffers && self.speech_gate.try_fire(now) {
                debug!("Speech at {:?} after {} voiced buffers", now, self.voiced_run);
                signals.push(Signal::SpeechDetected);
            }
        } else {
            self.voiced_run = 0;
            if amplitude < self.config.silence_threshold && self.silence_due(now) {
                self.silence_reported = true;
                signals.push(Signal::Silence);
            }
        }

        trace!("Audio buffer at {:?}: {:?}", now, signals);
        signals
    }

    fn mark_active(&mut self, now: SenseTime) {
        self.last_active = Some(now);
        self.silence_reported = false;
    }

    fn silence_due(&self, now: SenseTime) -> bool {
        match self.last_active {
            Some(active) => !self.silence_reported && now.since(active) >= self.config.silence_after,
            None => false,
        }
    }
}

impl Default for AudioProducer {
    fn default() -> Self {
        Self::new(AudioConfig::default())
    }
}
