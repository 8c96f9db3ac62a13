//! Landmarks and detection frames from the vision collaborator
//!
//! Coordinates are normalized to the frame: x and y in [0, 1] with the origin
//! at the top-left, z relative depth. Indices follow the 468-point face mesh.

use aura_core::SenseTime;

/// Anatomical landmark indices used for head pose
pub mod index {
    pub const NOSE_TIP: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const CHIN: usize = 152;
    pub const LEFT_EAR: usize = 234;
    pub const RIGHT_EAR: usize = 454;
}

/// Smallest landmark set that contains every pose index
pub const MIN_LANDMARKS: usize = index::RIGHT_EAR + 1;

/// One normalized landmark
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A named facial-muscle activation score [0.0 - 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct Blendshape {
    pub name: String,
    pub score: f32,
}

impl Blendshape {
    pub fn new(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// One processed camera frame as delivered by the vision collaborator
#[derive(Debug, Clone)]
pub struct FaceFrame {
    /// Collaborator timestamp, monotonically increasing
    pub timestamp: SenseTime,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Did the detector report a face?
    pub face_present: bool,
    /// Landmarks of the first face
    pub landmarks: Vec<Landmark>,
    /// Blendshape scores, if the model provides them
    pub blendshapes: Option<Vec<Blendshape>>,
}

impl FaceFrame {
    /// A frame with a detected face
    pub fn with_face(
        timestamp: SenseTime,
        width: u32,
        height: u32,
        landmarks: Vec<Landmark>,
        blendshapes: Option<Vec<Blendshape>>,
    ) -> Self {
        Self {
            timestamp,
            width,
            height,
            face_present: true,
            landmarks,
            blendshapes,
        }
    }

    /// A frame where no face was found
    pub fn absent(timestamp: SenseTime, width: u32, height: u32) -> Self {
        Self {
            timestamp,
            width,
            height,
            face_present: false,
            landmarks: Vec::new(),
            blendshapes: None,
        }
    }

    /// Present, with enough finite landmarks to compute pose
    pub fn is_usable(&self) -> bool {
        self.face_present
            && self.landmarks.len() >= MIN_LANDMARKS
            && [
                index::NOSE_TIP,
                index::FOREHEAD,
                index::CHIN,
                index::LEFT_EAR,
                index::RIGHT_EAR,
            ]
            .iter()
            .all(|&i| self.landmarks[i].is_finite())
    }

    /// Score of a blendshape by name, if present
    pub fn blendshape(&self, name: &str) -> Option<f32> {
        self.blendshapes
            .as_ref()?
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.score)
    }

    /// Width / height, 1.0 when dimensions are unknown
    pub fn aspect_ratio(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
