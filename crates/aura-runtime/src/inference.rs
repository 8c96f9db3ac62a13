//! Inference scheduler - background classification loop
//!
//! Each iteration:
//! 1. Apply a pending backend switch
//! 2. If paused, idle at the coarse interval
//! 3. Take the latest input snapshot; if none, idle briefly
//! 4. Classify, map the class to a signal, publish it with telemetry
//! 5. Sleep the iteration interval
//!
//! Backends that fail to load are replaced by a simulated classifier that
//! cycles through the classes on a fixed period. Failures never end the loop.
//!
//! Passes run on the blocking pool. Every activation publishes a telemetry
//! sample, so the view learns about a switch before the first pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aura_core::{AuraError, AuraResult, BackendKind, SenseTime};
use aura_vision::{Emotion, FaceMetrics, FEATURE_COUNT};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::bus::{BusMessage, BusPublisher};

/// Name reported while running on the simulated classifier
pub const SIMULATED_BACKEND: &str = "simulated";

/// Scheduler configuration
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Pause after each classification pass
    pub iteration_interval: Duration,
    /// Retry delay when no input is available
    pub idle_retry: Duration,
    /// Retry delay while paused
    pub paused_interval: Duration,
    /// Time the simulated classifier spends on each class
    pub simulated_period: Duration,
    pub simulated_confidence: f32,
    /// Predictions below this publish telemetry only
    pub min_confidence: f32,
    pub initial_backend: BackendKind,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            iteration_interval: Duration::from_millis(33),
            idle_retry: Duration::from_millis(50),
            paused_interval: Duration::from_millis(250),
            simulated_period: Duration::from_secs(3),
            simulated_confidence: 0.92,
            min_confidence: 0.55,
            initial_backend: BackendKind::Reference,
        }
    }
}

impl SchedulerConfig {
    /// Roughly 5 passes per second, for battery-constrained devices
    pub fn low_power() -> Self {
        SchedulerConfig {
            iteration_interval: Duration::from_millis(200),
            idle_retry: Duration::from_millis(200),
            paused_interval: Duration::from_secs(1),
            ..Default::default()
        }
    }
}

/// One snapshot for the classifier
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceInput {
    pub features: [f32; FEATURE_COUNT],
    pub timestamp: SenseTime,
}

impl InferenceInput {
    pub fn from_metrics(metrics: &FaceMetrics, timestamp: SenseTime) -> Self {
        InferenceInput {
            features: metrics.features(),
            timestamp,
        }
    }
}

/// Backend output: winning class index into `Emotion::ALL`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub confidence: f32,
}

impl Prediction {
    /// Argmax over class probabilities
    pub fn from_probabilities(probabilities: &[f32]) -> Option<Prediction> {
        probabilities
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .fold(None, |best: Option<Prediction>, (i, p)| match best {
                Some(b) if b.confidence >= p => Some(b),
                _ => Some(Prediction {
                    class_index: i,
                    confidence: p,
                }),
            })
    }

    /// Signal for this prediction, if confident enough and not neutral
    pub fn signal(&self, min_confidence: f32) -> Option<aura_core::Signal> {
        if self.confidence < min_confidence {
            return None;
        }
        Emotion::from_index(self.class_index).and_then(Emotion::signal)
    }
}

/// Telemetry for one classification pass
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceSample {
    pub latency: Duration,
    pub backend: &'static str,
    pub degraded: bool,
    /// None if the pass failed, or if this sample announces a newly
    /// activated backend
    pub prediction: Option<Prediction>,
}

/// A compute implementation for classification
pub trait InferenceBackend: Send {
    fn name(&self) -> &'static str;

    /// Run one pass. Errors are treated as "no prediction this cycle".
    fn infer(&mut self, input: &InferenceInput) -> AuraResult<Prediction>;

    /// Free device resources. Called exactly once, before the backend is dropped.
    fn release(&mut self) {}
}

/// Resolves backend kinds to live backends
pub trait BackendLoader: Send + Sync {
    fn load(&self, kind: BackendKind) -> AuraResult<Box<dyn InferenceBackend>>;
}

/// Loader with only the reference CPU backend
#[derive(Debug, Default, Clone)]
pub struct DefaultLoader;

impl BackendLoader for DefaultLoader {
    fn load(&self, kind: BackendKind) -> AuraResult<Box<dyn InferenceBackend>> {
        match kind {
            BackendKind::Reference => Ok(Box::new(ReferenceBackend::new())),
            other => Err(AuraError::BackendUnavailable(other)),
        }
    }
}

const CLASS_COUNT: usize = Emotion::ALL.len();

/// Linear softmax over the face feature vector
pub struct ReferenceBackend {
    weights: [[f32; FEATURE_COUNT]; CLASS_COUNT],
    bias: [f32; CLASS_COUNT],
}

impl ReferenceBackend {
    pub fn new() -> Self {
        // smile, eye_wide, eye_squint, mouth_open, brow_down, brow_up, yaw, pitch, roll
        ReferenceBackend {
            weights: [
                [-1.5, -1.5, -1.0, -1.5, -1.5, -1.0, 0.0, 0.0, 0.0],
                [4.0, 0.0, 0.5, 0.3, -1.0, 0.0, 0.0, 0.0, 0.0],
                [-0.5, 2.5, -1.0, 2.5, -1.0, 1.0, 0.0, 0.0, 0.0],
                [-2.0, -0.5, 2.0, 0.0, 3.0, -0.5, 0.0, 0.0, 0.0],
            ],
            bias: [1.0, -0.5, -0.5, -0.5],
        }
    }

    pub fn probabilities(&self, features: &[f32; FEATURE_COUNT]) -> [f32; CLASS_COUNT] {
        let mut logits = self.bias;
        for (logit, weights) in logits.iter_mut().zip(self.weights.iter()) {
            *logit += weights.iter().zip(features).map(|(w, x)| w * x).sum::<f32>();
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut exp = logits.map(|l| (l - max).exp());
        let total: f32 = exp.iter().sum();
        for p in exp.iter_mut() {
            *p /= total;
        }
        exp
    }
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for ReferenceBackend {
    fn name(&self) -> &'static str {
        BackendKind::Reference.name()
    }

    fn infer(&mut self, input: &InferenceInput) -> AuraResult<Prediction> {
        if input.features.iter().any(|f| !f.is_finite()) {
            return Err(AuraError::InferenceFailed("non-finite feature".into()));
        }
        Prediction::from_probabilities(&self.probabilities(&input.features))
            .ok_or_else(|| AuraError::InferenceFailed("no finite class score".into()))
    }
}

/// Deterministic stand-in used when no real backend loads
pub struct SimulatedBackend {
    started: Instant,
    period: Duration,
    confidence: f32,
}

impl SimulatedBackend {
    pub fn new(period: Duration, confidence: f32) -> Self {
        SimulatedBackend {
            started: Instant::now(),
            period,
            confidence,
        }
    }

    /// Class at a point in time: advances one class per period
    pub fn class_at(&self, now: Instant) -> usize {
        let period = self.period.as_millis().max(1);
        let step = now.saturating_duration_since(self.started).as_millis() / period;
        (step % CLASS_COUNT as u128) as usize
    }
}

impl InferenceBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        SIMULATED_BACKEND
    }

    fn infer(&mut self, _input: &InferenceInput) -> AuraResult<Prediction> {
        Ok(Prediction {
            class_index: self.class_at(Instant::now()),
            confidence: self.confidence,
        })
    }
}

/// Single-slot latest-input holder. Writers overwrite, the loop takes.
#[derive(Clone, Default)]
pub struct InputSlot {
    inner: Arc<Mutex<Option<InferenceInput>>>,
}

impl InputSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot. Returns true if an unread one was replaced.
    pub fn put(&self, input: InferenceInput) -> bool {
        self.inner.lock().replace(input).is_some()
    }

    pub fn take(&self) -> Option<InferenceInput> {
        self.inner.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_none()
    }
}

/// Scheduler status snapshot
#[derive(Clone, Debug)]
pub struct SchedulerStatus {
    /// Most recently requested backend
    pub requested: BackendKind,
    /// Name of the backend actually running
    pub active: &'static str,
    pub degraded: bool,
    pub paused: bool,
    pub passes: u64,
    pub failures: u64,
}

struct Control {
    paused: AtomicBool,
    pending: Mutex<Option<BackendKind>>,
    status: Mutex<SchedulerStatus>,
}

/// Thread-safe control surface for a running scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    control: Arc<Control>,
    slot: InputSlot,
}

impl SchedulerHandle {
    /// Request a backend switch, applied at the next iteration boundary.
    /// A newer request replaces an unapplied one.
    pub fn set_backend(&self, kind: BackendKind) {
        *self.control.pending.lock() = Some(kind);
        self.control.status.lock().requested = kind;
    }

    /// Idempotent
    pub fn pause(&self) {
        if !self.control.paused.swap(true, Ordering::AcqRel) {
            debug!("Inference paused");
        }
    }

    /// Idempotent
    pub fn resume(&self) {
        if self.control.paused.swap(false, Ordering::AcqRel) {
            debug!("Inference resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.control.paused.load(Ordering::Acquire)
    }

    pub fn submit(&self, input: InferenceInput) {
        self.slot.put(input);
    }

    pub fn input_slot(&self) -> InputSlot {
        self.slot.clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        let mut status = self.control.status.lock().clone();
        status.paused = self.is_paused();
        status
    }
}

struct ActiveBackend {
    backend: Box<dyn InferenceBackend>,
    degraded: bool,
}

/// The inference loop. Build it, keep a handle, then `run` it on a task.
pub struct InferenceScheduler {
    config: SchedulerConfig,
    loader: Arc<dyn BackendLoader>,
    publisher: BusPublisher,
    handle: SchedulerHandle,
}

impl InferenceScheduler {
    pub fn new(
        config: SchedulerConfig,
        loader: Arc<dyn BackendLoader>,
        publisher: BusPublisher,
    ) -> Self {
        let control = Arc::new(Control {
            paused: AtomicBool::new(false),
            pending: Mutex::new(None),
            status: Mutex::new(SchedulerStatus {
                requested: config.initial_backend,
                active: config.initial_backend.name(),
                degraded: false,
                paused: false,
                passes: 0,
                failures: 0,
            }),
        });

        InferenceScheduler {
            config,
            loader,
            publisher,
            handle: SchedulerHandle {
                control,
                slot: InputSlot::new(),
            },
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    /// A pass in flight finishes first; the active backend is released
    /// before returning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut active = self.activate(self.config.initial_backend);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pending = self.handle.control.pending.lock().take();
            if let Some(kind) = pending {
                active.backend.release();
                active = self.activate(kind);
            }

            let wait = if self.handle.is_paused() {
                self.config.paused_interval
            } else {
                match self.handle.slot.take() {
                    Some(input) => {
                        let (next, published) = self.pass(active, input).await;
                        active = next;
                        if published.is_err() {
                            // Consumer gone; nothing left to publish to
                            break;
                        }
                        self.config.iteration_interval
                    }
                    None => self.config.idle_retry,
                }
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = sleep(wait) => {}
            }
        }

        active.backend.release();
        info!("Inference loop stopped, released {}", active.backend.name());
    }

    fn activate(&self, kind: BackendKind) -> ActiveBackend {
        let active = match self.loader.load(kind) {
            Ok(backend) => {
                info!("Inference backend {} ready", backend.name());
                ActiveBackend {
                    backend,
                    degraded: false,
                }
            }
            Err(e) => {
                warn!("Backend {} failed to load, using simulated classifier: {}", kind, e);
                ActiveBackend {
                    backend: Box::new(SimulatedBackend::new(
                        self.config.simulated_period,
                        self.config.simulated_confidence,
                    )),
                    degraded: true,
                }
            }
        };

        let mut status = self.handle.control.status.lock();
        status.active = active.backend.name();
        status.degraded = active.degraded;
        drop(status);

        let announced = self.publisher.send(BusMessage::Inference(InferenceSample {
            latency: Duration::ZERO,
            backend: active.backend.name(),
            degraded: active.degraded,
            prediction: None,
        }));
        if announced.is_err() {
            debug!("No consumer for the {} activation", active.backend.name());
        }

        active
    }

    /// Classify one snapshot on the blocking pool and hand the backend back
    async fn pass(
        &self,
        mut active: ActiveBackend,
        input: InferenceInput,
    ) -> (ActiveBackend, AuraResult<()>) {
        let started = Instant::now();
        let joined = task::spawn_blocking(move || {
            let result = active.backend.infer(&input);
            (active, result)
        })
        .await;
        let latency = started.elapsed();

        let (active, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                // The backend went down with the pass; load the requested kind again
                warn!("Inference pass aborted: {}", e);
                let requested = self.handle.control.status.lock().requested;
                (
                    self.activate(requested),
                    Err(AuraError::InferenceFailed("pass aborted".into())),
                )
            }
        };

        let prediction = match result {
            Ok(prediction) => Some(prediction),
            Err(e) => {
                warn!("Inference pass on {} failed: {}", active.backend.name(), e);
                None
            }
        };

        {
            let mut status = self.handle.control.status.lock();
            status.passes += 1;
            if prediction.is_none() {
                status.failures += 1;
            }
        }

        let published = self.publish_pass(&active, latency, prediction);
        (active, published)
    }

    fn publish_pass(
        &self,
        active: &ActiveBackend,
        latency: Duration,
        prediction: Option<Prediction>,
    ) -> AuraResult<()> {
        if let Some(signal) = prediction.and_then(|p| p.signal(self.config.min_confidence)) {
            self.publisher.publish(signal)?;
        }
        self.publisher.send(BusMessage::Inference(InferenceSample {
            latency,
            backend: active.backend.name(),
            degraded: active.degraded,
            prediction,
        }))
    }
}
