//! Face signal producer
//!
//! Turns the per-frame detection stream into presence and emotion signals:
//! - `FaceDetected` on the first usable frame after absence
//! - `FaceLost` once no usable face has been seen for `lost_after`
//! - one emotion signal per change of classified emotion, repeated at most
//!   every `emotion_repeat` while the expression persists

use std::time::Duration;

use aura_core::{Cooldown, SenseTime, Signal};
use tracing::trace;

use crate::classifier::{Emotion, EmotionClassifier, EmotionResult};
use crate::landmark::FaceFrame;

/// Face producer configuration
#[derive(Clone, Debug)]
pub struct FaceConfig {
    /// Grace period before a missing face is reported lost
    pub lost_after: Duration,
    /// Minimum classifier confidence to announce an emotion
    pub emotion_min_confidence: f32,
    /// Minimum spacing between repeats of the same emotion
    pub emotion_repeat: Duration,
}

impl Default for FaceConfig {
    fn default() -> Self {
        FaceConfig {
            lost_after: Duration::from_millis(400),
            emotion_min_confidence: 0.6,
            emotion_repeat: Duration::from_secs(1),
        }
    }
}

/// Everything one frame produced
#[derive(Debug, Clone, Default)]
pub struct FaceUpdate {
    /// Signals for the bus, in emission order
    pub signals: Vec<Signal>,
    /// Classification of this frame, None if no usable face
    pub result: Option<EmotionResult>,
}

/// Converts detection frames into signals
pub struct FaceSignalProducer {
    config: FaceConfig,
    classifier: EmotionClassifier,
    present: bool,
    last_seen: Option<SenseTime>,
    last_emotion: Option<Emotion>,
    repeat_gate: Cooldown,
}

impl FaceSignalProducer {
    pub fn new(config: FaceConfig) -> Self {
        let repeat_gate = Cooldown::new(config.emotion_repeat);
        FaceSignalProducer {
            config,
            classifier: EmotionClassifier::new(),
            present: false,
            last_seen: None,
            last_emotion: None,
            repeat_gate,
        }
    }

    /// Is a face currently considered present?
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Process one frame
    pub fn on_frame(&mut self, frame: &FaceFrame) -> FaceUpdate {
        let now = frame.timestamp;
        let mut update = FaceUpdate::default();

        match self.classifier.classify(frame) {
            Some(result) => {
                if !self.present {
                    self.present = true;
                    update.signals.push(Signal::FaceDetected);
                }
                self.last_seen = Some(now);

                if let Some(signal) = self.emotion_signal(&result, now) {
                    update.signals.push(signal);
                }
                update.result = Some(result);
            }
            None => {
                let expired = self
                    .last_seen
                    .map_or(true, |seen| now.since(seen) >= self.config.lost_after);
                if self.present && expired {
                    self.present = false;
                    self.last_emotion = None;
                    self.repeat_gate.reset();
                    update.signals.push(Signal::FaceLost);
                }
            }
        }

        if !update.signals.is_empty() {
            trace!("Frame {:?} produced {:?}", now, update.signals);
        }
        update
    }

    fn emotion_signal(&mut self, result: &EmotionResult, now: SenseTime) -> Option<Signal> {
        if result.emotion == Emotion::Neutral {
            self.last_emotion = Some(Emotion::Neutral);
            return None;
        }
        if result.confidence < self.config.emotion_min_confidence {
            return None;
        }

        let fresh = self.last_emotion != Some(result.emotion);
        if fresh {
            self.repeat_gate.trigger(now);
        } else if !self.repeat_gate.try_fire(now) {
            return None;
        }
        self.last_emotion = Some(result.emotion);
        result.emotion.signal()
    }
}

impl Default for FaceSignalProducer {
    fn default() -> Self {
        Self::new(FaceConfig::default())
    }
}
