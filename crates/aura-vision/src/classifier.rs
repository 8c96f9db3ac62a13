//! Heuristic emotion classifier
//!
//! Scores four emotions from face metrics with threshold-gated weighted sums,
//! then reports the winner with a normalized confidence.

use std::fmt;

use aura_core::Signal;

use crate::landmark::FaceFrame;
use crate::metrics::FaceMetrics;

/// Lowest confidence ever reported
pub const MIN_CONFIDENCE: f32 = 0.4;
/// Highest confidence ever reported
pub const MAX_CONFIDENCE: f32 = 0.99;
/// Confidence of the landmark-only path
pub const GEOMETRY_CONFIDENCE: f32 = 0.5;

/// Classified facial expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Surprised,
    Angry,
}

impl Emotion {
    /// Class order shared with learned backends
    pub const ALL: [Emotion; 4] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Surprised,
        Emotion::Angry,
    ];

    pub fn from_index(index: usize) -> Option<Emotion> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Surprised => "surprised",
            Emotion::Angry => "angry",
        }
    }

    /// Signal announcing this emotion. Neutral announces nothing.
    pub fn signal(self) -> Option<Signal> {
        match self {
            Emotion::Neutral => None,
            Emotion::Happy => Some(Signal::SmileDetected),
            Emotion::Surprised => Some(Signal::SurpriseDetected),
            Emotion::Angry => Some(Signal::AngerDetected),
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw non-negative scores per emotion
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmotionScores {
    pub neutral: f32,
    pub happy: f32,
    pub surprised: f32,
    pub angry: f32,
}

impl EmotionScores {
    pub fn get(&self, emotion: Emotion) -> f32 {
        match emotion {
            Emotion::Neutral => self.neutral,
            Emotion::Happy => self.happy,
            Emotion::Surprised => self.surprised,
            Emotion::Angry => self.angry,
        }
    }

    pub fn total(&self) -> f32 {
        self.neutral + self.happy + self.surprised + self.angry
    }

    /// Highest score wins; ties go to the earlier class.
    /// Confidence is the winner's share, clamped.
    pub fn winner(&self) -> (Emotion, f32) {
        let mut best = Emotion::Neutral;
        for emotion in Emotion::ALL {
            if self.get(emotion) > self.get(best) {
                best = emotion;
            }
        }

        let total = self.total();
        let share = if total > 0.0 { self.get(best) / total } else { 0.0 };
        (best, share.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
    }
}

/// One classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionResult {
    pub emotion: Emotion,
    /// [MIN_CONFIDENCE - MAX_CONFIDENCE]
    pub confidence: f32,
    pub scores: EmotionScores,
    pub metrics: FaceMetrics,
}

/// Score metrics with the fixed thresholds
pub fn score(m: &FaceMetrics) -> EmotionScores {
    let mut happy = 0.0;
    if m.smile > 0.15 {
        happy += m.smile * 0.6;
        if m.smile > 0.3 {
            happy += 0.2;
        }
        if m.smile > 0.5 {
            happy += 0.3;
        }
    }

    let mut surprised = 0.0;
    if m.eye_wide > 0.25 {
        surprised += m.eye_wide * 0.5;
    }
    if m.mouth_open > 0.25 {
        surprised += m.mouth_open * 0.5;
    }
    if m.eye_wide > 0.25 && m.mouth_open > 0.25 {
        surprised += 0.3;
    }
    if m.brow_up > 0.3 {
        surprised += m.brow_up * 0.2;
    }

    let mut angry = 0.0;
    if m.eye_squint > 0.25 && m.smile < 0.1 {
        angry += m.eye_squint * 0.6;
    }
    if m.brow_down > 0.25 {
        angry += m.brow_down * 0.7;
    }

    let mut neutral = 0.3;
    let all_low = m.smile < 0.1
        && m.eye_wide < 0.2
        && m.eye_squint < 0.2
        && m.mouth_open < 0.2
        && m.brow_down < 0.2
        && m.brow_up < 0.2;
    if all_low {
        neutral += 0.4;
    }
    if happy + surprised + angry > 0.4 {
        neutral *= 0.5;
    }

    EmotionScores {
        neutral,
        happy,
        surprised,
        angry,
    }
}

/// Heuristic classifier over face frames
#[derive(Debug, Clone, Default)]
pub struct EmotionClassifier;

impl EmotionClassifier {
    pub fn new() -> Self {
        EmotionClassifier
    }

    /// Classify a frame. None means "no face": absent, too few
    /// landmarks, or non-finite pose landmarks.
    pub fn classify(&self, frame: &FaceFrame) -> Option<EmotionResult> {
        let metrics = FaceMetrics::from_frame(frame)?;
        Some(self.classify_metrics(&metrics))
    }

    pub fn classify_metrics(&self, metrics: &FaceMetrics) -> EmotionResult {
        if !metrics.has_blendshapes {
            return EmotionResult {
                emotion: Emotion::Neutral,
                confidence: GEOMETRY_CONFIDENCE,
                scores: EmotionScores::default(),
                metrics: *metrics,
            };
        }

        let scores = score(metrics);
        let (emotion, confidence) = scores.winner();
        EmotionResult {
            emotion,
            confidence,
            scores,
            metrics: *metrics,
        }
    }
}
