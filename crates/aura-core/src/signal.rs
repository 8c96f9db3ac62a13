//! Signal definitions
//!
//! A signal is one immutable input event for the state machine. Signals are
//! grouped into classes that decide how the bus treats them under load:
//! - Presence, Emotion, Audio, Motion, System: discrete, never dropped
//! - Continuous: payload updates, the stale ones may be coalesced away

use std::fmt;

/// Signal class determines delivery guarantees on the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalClass {
    /// Face appeared / disappeared
    Presence,
    /// Classified facial expression
    Emotion,
    /// Discrete audio events
    Audio,
    /// Shake and proximity events
    Motion,
    /// Inactivity and user interaction
    System,
    /// Amplitude, tilt and roll payloads
    Continuous,
}

impl SignalClass {
    /// Can this class be dropped under congestion?
    pub fn is_droppable(self) -> bool {
        matches!(self, SignalClass::Continuous)
    }
}

/// An input event for the state machine
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Signal {
    // Presence
    FaceDetected,
    FaceLost,

    // Emotion
    SmileDetected,
    AngerDetected,
    SurpriseDetected,

    // Audio
    LoudSound,
    SpeechDetected,
    Silence,

    // Motion
    Shake,
    ProximityClose,
    ProximityFar,

    // System
    InactivityTimeout,
    UserTap,

    // Continuous payloads
    /// Microphone amplitude [0.0 - 1.0]
    AudioLevel(f32),
    /// Eye offset [-1.0 - 1.0] on both axes
    TiltUpdate { x: f32, y: f32 },
    /// Head roll in degrees
    HeadRollUpdate(f32),
}

impl Signal {
    /// Every discrete signal, in declaration order
    pub const DISCRETE: [Signal; 13] = [
        Signal::FaceDetected,
        Signal::FaceLost,
        Signal::SmileDetected,
        Signal::AngerDetected,
        Signal::SurpriseDetected,
        Signal::LoudSound,
        Signal::SpeechDetected,
        Signal::Silence,
        Signal::Shake,
        Signal::ProximityClose,
        Signal::ProximityFar,
        Signal::InactivityTimeout,
        Signal::UserTap,
    ];

    /// Build a tilt update, clamping both axes into [-1, 1]
    pub fn tilt(x: f32, y: f32) -> Self {
        Signal::TiltUpdate {
            x: clamp_unit(x, -1.0),
            y: clamp_unit(y, -1.0),
        }
    }

    /// Build an amplitude update, clamped into [0, 1]
    pub fn audio_level(amplitude: f32) -> Self {
        Signal::AudioLevel(clamp_unit(amplitude, 0.0))
    }

    /// Bring a continuous payload into its documented range. Non-finite
    /// roll becomes level. Discrete signals pass through.
    pub fn normalized(self) -> Self {
        match self {
            Signal::AudioLevel(amplitude) => Signal::audio_level(amplitude),
            Signal::TiltUpdate { x, y } => Signal::tilt(x, y),
            Signal::HeadRollUpdate(degrees) if !degrees.is_finite() => Signal::HeadRollUpdate(0.0),
            other => other,
        }
    }

    pub fn class(&self) -> SignalClass {
        match self {
            Signal::FaceDetected | Signal::FaceLost => SignalClass::Presence,
            Signal::SmileDetected | Signal::AngerDetected | Signal::SurpriseDetected => {
                SignalClass::Emotion
            }
            Signal::LoudSound | Signal::SpeechDetected | Signal::Silence => SignalClass::Audio,
            Signal::Shake | Signal::ProximityClose | Signal::ProximityFar => SignalClass::Motion,
            Signal::InactivityTimeout | Signal::UserTap => SignalClass::System,
            Signal::AudioLevel(_) | Signal::TiltUpdate { .. } | Signal::HeadRollUpdate(_) => {
                SignalClass::Continuous
            }
        }
    }

    /// Continuous payloads never change the emotional state
    #[inline]
    pub fn is_continuous(&self) -> bool {
        self.class() == SignalClass::Continuous
    }

    /// Strong signals break through a hold window
    pub fn is_strong(&self) -> bool {
        matches!(
            self,
            Signal::Shake | Signal::LoudSound | Signal::ProximityClose | Signal::UserTap
        )
    }

    /// Does this signal restart the inactivity countdown?
    pub fn restarts_inactivity(&self) -> bool {
        !self.is_continuous() && !matches!(self, Signal::InactivityTimeout | Signal::Silence)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Signal::FaceDetected => "FaceDetected",
            Signal::FaceLost => "FaceLost",
            Signal::SmileDetected => "SmileDetected",
            Signal::AngerDetected => "AngerDetected",
            Signal::SurpriseDetected => "SurpriseDetected",
            Signal::LoudSound => "LoudSound",
            Signal::SpeechDetected => "SpeechDetected",
            Signal::Silence => "Silence",
            Signal::Shake => "Shake",
            Signal::ProximityClose => "ProximityClose",
            Signal::ProximityFar => "ProximityFar",
            Signal::InactivityTimeout => "InactivityTimeout",
            Signal::UserTap => "UserTap",
            Signal::AudioLevel(_) => "AudioLevel",
            Signal::TiltUpdate { .. } => "TiltUpdate",
            Signal::HeadRollUpdate(_) => "HeadRollUpdate",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::AudioLevel(a) => write!(f, "AudioLevel({:.2})", a),
            Signal::TiltUpdate { x, y } => write!(f, "TiltUpdate({:.2}, {:.2})", x, y),
            Signal::HeadRollUpdate(d) => write!(f, "HeadRollUpdate({:.1}°)", d),
            other => f.write_str(other.name()),
        }
    }
}

// NaN collapses to the lower bound
fn clamp_unit(v: f32, lower: f32) -> f32 {
    if v.is_nan() {
        lower.max(0.0)
    } else {
        v.clamp(lower, 1.0)
    }
}
