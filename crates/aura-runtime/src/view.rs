//! Render view - the read-only snapshot handed to the renderer

use std::sync::Arc;

use aura_core::{BackendKind, State};
use aura_state::ContinuousValues;
use aura_vision::{EmotionResult, Landmark};

/// Last classified emotion, as shown to the user
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionReading {
    pub label: &'static str,
    pub confidence: f32,
}

impl From<&EmotionResult> for EmotionReading {
    fn from(result: &EmotionResult) -> Self {
        EmotionReading {
            label: result.emotion.label(),
            confidence: result.confidence,
        }
    }
}

/// Face data for the view. `None` fields mean no face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceReport {
    pub landmarks: Option<Arc<Vec<Landmark>>>,
    pub emotion: Option<EmotionReading>,
}

/// Everything the renderer reads
#[derive(Clone, Debug, PartialEq)]
pub struct RenderView {
    pub state: State,
    /// Audio amplitude [0.0 - 1.0]
    pub amplitude: f32,
    /// Eye offset [-1.0 - 1.0]
    pub eye_x: f32,
    pub eye_y: f32,
    /// Head roll in degrees
    pub roll: f32,
    /// Latency of the last inference pass
    pub latency_ms: f32,
    /// Name of the backend that ran the last pass
    pub backend: &'static str,
    /// Running on the simulated classifier after a failed backend init
    pub degraded: bool,
    pub landmarks: Option<Arc<Vec<Landmark>>>,
    pub emotion: Option<EmotionReading>,
}

impl Default for RenderView {
    fn default() -> Self {
        RenderView {
            state: State::Idle,
            amplitude: 0.0,
            eye_x: 0.0,
            eye_y: 0.0,
            roll: 0.0,
            latency_ms: 0.0,
            backend: BackendKind::default().name(),
            degraded: false,
            landmarks: None,
            emotion: None,
        }
    }
}

impl RenderView {
    pub fn apply_continuous(&mut self, values: ContinuousValues) {
        self.amplitude = values.amplitude;
        self.eye_x = values.tilt_x;
        self.eye_y = values.tilt_y;
        self.roll = values.roll;
    }

    pub fn apply_face(&mut self, report: FaceReport) {
        self.landmarks = report.landmarks;
        self.emotion = report.emotion;
    }

    /// State label with its icon, for logs
    pub fn headline(&self) -> String {
        format!("{} {}", self.state.icon(), self.state.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_view_is_idle_reference() {
        let view = RenderView::default();
        assert_eq!(view.state, State::Idle);
        assert_eq!(view.backend, "cpu");
        assert!(view.landmarks.is_none());
    }

    #[test]
    fn test_continuous_values_map_to_eyes() {
        let mut view = RenderView::default();
        view.apply_continuous(ContinuousValues {
            amplitude: 0.9,
            tilt_x: -0.5,
            tilt_y: 0.25,
            roll: 12.0,
        });
        assert_eq!(view.amplitude, 0.9);
        assert_eq!(view.eye_x, -0.5);
        assert_eq!(view.eye_y, 0.25);
        assert_eq!(view.roll, 12.0);
    }

    #[test]
    fn test_face_report_clears_on_absence() {
        let mut view = RenderView::default();
        view.apply_face(FaceReport {
            landmarks: Some(Arc::new(vec![Landmark::default()])),
            emotion: Some(EmotionReading { label: "happy", confidence: 0.8 }),
        });
        assert!(view.landmarks.is_some());

        view.apply_face(FaceReport::default());
        assert!(view.landmarks.is_none());
        assert!(view.emotion.is_none());
    }
}
