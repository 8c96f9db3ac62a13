//! Face metrics - blendshape scores and head pose for one frame

use crate::landmark::{index, FaceFrame, Landmark};

/// Length of the feature vector handed to learned backends
pub const FEATURE_COUNT: usize = 9;

/// Head pose derived from landmark geometry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadPose {
    /// Nose offset from the ear midpoint, as a fraction of half the ear span [-1.0 - 1.0]
    pub yaw: f32,
    /// Nose offset from the forehead/chin midpoint, as a fraction of half the face height [-1.0 - 1.0]
    pub pitch: f32,
    /// Inter-ear angle in degrees, positive when the right ear is lower
    pub roll: f32,
}

impl HeadPose {
    /// Compute pose from the five anatomical landmarks.
    /// Returns None if the landmark set is too short.
    pub fn from_landmarks(landmarks: &[Landmark], aspect_ratio: f32) -> Option<HeadPose> {
        let nose = landmarks.get(index::NOSE_TIP)?;
        let forehead = landmarks.get(index::FOREHEAD)?;
        let chin = landmarks.get(index::CHIN)?;
        let left = landmarks.get(index::LEFT_EAR)?;
        let right = landmarks.get(index::RIGHT_EAR)?;

        let ear_mid_x = (left.x + right.x) * 0.5;
        let half_span = (right.x - left.x) * 0.5;
        let yaw = ratio(nose.x - ear_mid_x, half_span);

        let face_mid_y = (forehead.y + chin.y) * 0.5;
        let half_height = (chin.y - forehead.y) * 0.5;
        let pitch = ratio(nose.y - face_mid_y, half_height);

        // Undo the normalization squash before measuring the angle
        let dx = (right.x - left.x) * aspect_ratio;
        let dy = right.y - left.y;
        let roll = if dx.abs() < f32::EPSILON && dy.abs() < f32::EPSILON {
            0.0
        } else {
            dy.atan2(dx).to_degrees()
        };

        Some(HeadPose { yaw, pitch, roll })
    }
}

fn ratio(offset: f32, half_extent: f32) -> f32 {
    if half_extent.abs() < 1e-4 {
        return 0.0;
    }
    (offset / half_extent).clamp(-1.0, 1.0)
}

/// Blendshape-derived expression scores plus head pose
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceMetrics {
    pub smile: f32,
    pub eye_wide: f32,
    pub eye_squint: f32,
    pub mouth_open: f32,
    pub brow_down: f32,
    pub brow_up: f32,
    pub pose: HeadPose,
    /// Were the scores computed from blendshapes?
    pub has_blendshapes: bool,
}

impl FaceMetrics {
    /// Compute metrics for a frame. None if no usable face is present.
    pub fn from_frame(frame: &FaceFrame) -> Option<FaceMetrics> {
        if !frame.is_usable() {
            return None;
        }

        let pose = HeadPose::from_landmarks(&frame.landmarks, frame.aspect_ratio())?;

        if frame.blendshapes.is_none() {
            return Some(FaceMetrics {
                pose,
                ..Default::default()
            });
        }

        let score = |name: &str| frame.blendshape(name).unwrap_or(0.0).clamp(0.0, 1.0);
        let pair = |left: &str, right: &str| (score(left) + score(right)) * 0.5;

        let outer_up = pair("browOuterUpLeft", "browOuterUpRight");

        Some(FaceMetrics {
            smile: pair("mouthSmileLeft", "mouthSmileRight"),
            eye_wide: pair("eyeWideLeft", "eyeWideRight"),
            eye_squint: pair("eyeSquintLeft", "eyeSquintRight"),
            mouth_open: score("jawOpen"),
            brow_down: pair("browDownLeft", "browDownRight"),
            brow_up: score("browInnerUp").max(outer_up),
            pose,
            has_blendshapes: true,
        })
    }

    /// Feature vector: six scores, yaw, pitch, roll / 90°
    pub fn features(&self) -> [f32; FEATURE_COUNT] {
        [
            self.smile,
            self.eye_wide,
            self.eye_squint,
            self.mouth_open,
            self.brow_down,
            self.brow_up,
            self.pose.yaw,
            self.pose.pitch,
            (self.pose.roll / 90.0).clamp(-1.0, 1.0),
        ]
    }
}
