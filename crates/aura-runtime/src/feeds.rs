//! Producer feeds - one call per collaborator delivery
//!
//! Each feed owns a producer and a bus publisher. Publishing fails with
//! `EngineStopped` once the engine is gone, which tells the caller to stop
//! capturing.

use std::sync::Arc;

use aura_core::AuraResult;
use aura_sense::{AccelSample, AudioConfig, AudioProducer, MotionConfig, MotionProducer};
use aura_vision::{FaceConfig, FaceFrame, FaceSignalProducer};

use crate::bus::{BusMessage, BusPublisher};
use crate::inference::{InferenceInput, InputSlot};
use crate::view::{EmotionReading, FaceReport};

/// Camera frames: presence and emotion signals, the inference snapshot,
/// and the face report for the view
pub struct FaceFeed {
    producer: FaceSignalProducer,
    publisher: BusPublisher,
    slot: InputSlot,
    reported: bool,
}

impl FaceFeed {
    pub fn new(config: FaceConfig, publisher: BusPublisher, slot: InputSlot) -> Self {
        FaceFeed {
            producer: FaceSignalProducer::new(config),
            publisher,
            slot,
            reported: false,
        }
    }

    pub fn on_frame(&mut self, frame: &FaceFrame) -> AuraResult<()> {
        let update = self.producer.on_frame(frame);
        for signal in update.signals {
            self.publisher.publish(signal)?;
        }

        match update.result {
            Some(result) => {
                self.slot
                    .put(InferenceInput::from_metrics(&result.metrics, frame.timestamp));
                self.reported = true;
                self.publisher.send(BusMessage::Face(FaceReport {
                    landmarks: Some(Arc::new(frame.landmarks.clone())),
                    emotion: Some(EmotionReading::from(&result)),
                }))
            }
            // Keep the last face on screen until the producer calls it lost
            None if self.reported && !self.producer.is_present() => {
                self.reported = false;
                self.publisher.send(BusMessage::Face(FaceReport::default()))
            }
            None => Ok(()),
        }
    }
}

/// Accelerometer and proximity readings
pub struct MotionFeed {
    producer: MotionProducer,
    publisher: BusPublisher,
}

impl MotionFeed {
    pub fn new(config: MotionConfig, publisher: BusPublisher) -> Self {
        MotionFeed {
            producer: MotionProducer::new(config),
            publisher,
        }
    }

    pub fn on_accel(&mut self, sample: AccelSample) -> AuraResult<()> {
        for signal in self.producer.on_accel(sample) {
            self.publisher.publish(signal)?;
        }
        Ok(())
    }

    pub fn on_proximity(&mut self, distance: f32, max_range: f32) -> AuraResult<()> {
        match self.producer.on_proximity(distance, max_range) {
            Some(signal) => self.publisher.publish(signal),
            None => Ok(()),
        }
    }
}

/// Microphone PCM buffers
pub struct AudioFeed {
    producer: AudioProducer,
    publisher: BusPublisher,
}

impl AudioFeed {
    pub fn new(config: AudioConfig, publisher: BusPublisher) -> Self {
        AudioFeed {
            producer: AudioProducer::new(config),
            publisher,
        }
    }

    pub fn on_buffer(&mut self, samples: &[i16]) -> AuraResult<()> {
        for signal in self.producer.on_buffer(samples) {
            self.publisher.publish(signal)?;
        }
        Ok(())
    }
}
