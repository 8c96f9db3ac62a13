//! Emotional states and the transition table
//!
//! The table is total: every (state, signal) pair has a defined next state,
//! and every pair not named below keeps the current state.

use std::fmt;

use crate::Signal;

/// The closed set of emotional states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum State {
    #[default]
    Idle,
    Curious,
    Happy,
    Angry,
    Surprised,
    Sad,
    Listening,
    Sleep,
}

impl State {
    pub const ALL: [State; 8] = [
        State::Idle,
        State::Curious,
        State::Happy,
        State::Angry,
        State::Surprised,
        State::Sad,
        State::Listening,
        State::Sleep,
    ];

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            State::Idle => "Idle",
            State::Curious => "Curious",
            State::Happy => "Happy",
            State::Angry => "Angry",
            State::Surprised => "Surprised",
            State::Sad => "Sad",
            State::Listening => "Listening",
            State::Sleep => "Sleep",
        }
    }

    /// Display icon
    pub fn icon(self) -> &'static str {
        match self {
            State::Idle => "😐",
            State::Curious => "🤔",
            State::Happy => "😊",
            State::Angry => "😠",
            State::Surprised => "😲",
            State::Sad => "😢",
            State::Listening => "👂",
            State::Sleep => "😴",
        }
    }

    /// Display color as 0xRRGGBB
    pub fn color(self) -> u32 {
        match self {
            State::Idle => 0x9E9E9E,
            State::Curious => 0x42A5F5,
            State::Happy => 0xFFCA28,
            State::Angry => 0xEF5350,
            State::Surprised => 0xAB47BC,
            State::Sad => 0x5C6BC0,
            State::Listening => 0x26A69A,
            State::Sleep => 0x37474F,
        }
    }

    /// Entering an expressive state opens a hold window
    pub fn is_expressive(self) -> bool {
        matches!(
            self,
            State::Happy | State::Angry | State::Surprised | State::Listening | State::Sad
        )
    }

    /// Next state for a signal.
    /// Continuous payloads never change the state.
    pub fn next(self, signal: Signal) -> State {
        use State::*;

        match signal {
            Signal::FaceDetected => match self {
                Sleep | Idle | Sad => Curious,
                Happy | Angry | Surprised | Listening | Curious => self,
            },
            Signal::FaceLost => match self {
                Curious => Idle,
                _ => self,
            },
            Signal::SmileDetected => Happy,
            Signal::AngerDetected => Angry,
            Signal::SurpriseDetected => Surprised,
            Signal::LoudSound => Surprised,
            Signal::SpeechDetected => match self {
                Idle | Curious | Sad => Listening,
                _ => self,
            },
            Signal::Silence => match self {
                Angry | Listening | Surprised => Idle,
                _ => self,
            },
            Signal::Shake => Angry,
            Signal::ProximityClose => Sleep,
            Signal::ProximityFar => match self {
                Sleep => Idle,
                _ => self,
            },
            Signal::InactivityTimeout => Sleep,
            Signal::UserTap => match self {
                Sleep => Idle,
                _ => self,
            },
            Signal::AudioLevel(_) | Signal::TiltUpdate { .. } | Signal::HeadRollUpdate(_) => self,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
