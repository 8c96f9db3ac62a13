//! AURA Engine - the single consumer and its control handle

use std::sync::Arc;

use aura_core::{AuraError, AuraResult, BackendKind, Signal, State};
use aura_sense::{AudioConfig, MotionConfig};
use aura_state::{MachineConfig, MachineStats, Outcome, StateMachine};
use aura_vision::FaceConfig;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::bus::{signal_bus, BusConfig, BusMessage, BusPublisher, BusReceiver, BusStats};
use crate::feeds::{AudioFeed, FaceFeed, MotionFeed};
use crate::inference::{
    BackendLoader, DefaultLoader, InferenceScheduler, InputSlot, SchedulerConfig, SchedulerHandle,
    SchedulerStatus,
};
use crate::view::RenderView;

/// Engine configuration
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    pub machine: MachineConfig,
    pub bus: BusConfig,
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Quicker state changes and a slower inference loop
    pub fn low_power() -> Self {
        EngineConfig {
            machine: MachineConfig::responsive(),
            bus: BusConfig::default(),
            scheduler: SchedulerConfig::low_power(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EngineStats {
    pub bus: BusStats,
    pub machine: MachineStats,
}

/// Engine entry point
pub struct Engine;

impl Engine {
    /// Start with the default backend loader. Must be called inside a
    /// tokio runtime.
    pub fn start(config: EngineConfig) -> EngineHandle {
        Self::start_with_loader(config, Arc::new(DefaultLoader))
    }

    pub fn start_with_loader(config: EngineConfig, loader: Arc<dyn BackendLoader>) -> EngineHandle {
        let (publisher, receiver) = signal_bus(config.bus.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut initial = RenderView::default();
        initial.backend = config.scheduler.initial_backend.name();
        let (view_tx, view_rx) = watch::channel(initial);

        let scheduler = InferenceScheduler::new(config.scheduler.clone(), loader, publisher.clone());
        let scheduler_handle = scheduler.handle();
        let machine_stats = Arc::new(Mutex::new(MachineStats::default()));

        let consumer = Consumer {
            machine: StateMachine::new(config.machine.clone(), now()),
            receiver,
            view_tx,
            scheduler: scheduler_handle.clone(),
            stats: machine_stats.clone(),
        };

        let tasks = vec![
            tokio::spawn(consumer.run(shutdown_rx.clone())),
            tokio::spawn(scheduler.run(shutdown_rx)),
        ];

        info!(
            "Engine started: hold {:?}, inactivity {:?}, backend {}",
            config.machine.hold_duration,
            config.machine.inactivity_timeout,
            config.scheduler.initial_backend
        );

        EngineHandle {
            publisher,
            scheduler: scheduler_handle,
            view_rx,
            shutdown: shutdown_tx,
            machine_stats,
            tasks,
        }
    }
}

/// Control surface for a running engine. Dropping it stops the engine.
pub struct EngineHandle {
    publisher: BusPublisher,
    scheduler: SchedulerHandle,
    view_rx: watch::Receiver<RenderView>,
    shutdown: watch::Sender<bool>,
    machine_stats: Arc<Mutex<MachineStats>>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Publish a signal from outside any producer
    pub fn on_signal(&self, signal: Signal) -> AuraResult<()> {
        self.ensure_running()?;
        self.publisher.publish(signal)
    }

    pub fn request_tap(&self) -> AuraResult<()> {
        self.on_signal(Signal::UserTap)
    }

    /// Switch the inference backend by name. Unknown names change nothing;
    /// known but unavailable backends degrade to the simulated classifier.
    pub fn set_backend(&self, name: &str) -> AuraResult<BackendKind> {
        self.ensure_running()?;
        let kind: BackendKind = name.parse()?;
        info!("Backend switch requested: {}", kind);
        self.scheduler.set_backend(kind);
        Ok(kind)
    }

    /// A publisher for custom producers
    pub fn publisher(&self) -> BusPublisher {
        self.publisher.clone()
    }

    /// The inference input slot
    pub fn input_slot(&self) -> InputSlot {
        self.scheduler.input_slot()
    }

    pub fn face_feed(&self, config: FaceConfig) -> FaceFeed {
        FaceFeed::new(config, self.publisher(), self.input_slot())
    }

    pub fn motion_feed(&self, config: MotionConfig) -> MotionFeed {
        MotionFeed::new(config, self.publisher())
    }

    pub fn audio_feed(&self, config: AudioConfig) -> AudioFeed {
        AudioFeed::new(config, self.publisher())
    }

    /// Current render view
    pub fn view(&self) -> RenderView {
        self.view_rx.borrow().clone()
    }

    /// Watch the render view
    pub fn subscribe(&self) -> watch::Receiver<RenderView> {
        self.view_rx.clone()
    }

    pub fn state(&self) -> State {
        self.view_rx.borrow().state
    }

    pub fn inference_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            bus: self.publisher.stats(),
            machine: self.machine_stats.lock().clone(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Signal every task to stop. Idempotent and callable from any thread.
    pub fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Engine stopping");
        }
    }

    /// Stop and wait for the consumer and inference loop to finish
    pub async fn shutdown(mut self) {
        self.stop();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
        info!("Engine stopped");
    }

    fn ensure_running(&self) -> AuraResult<()> {
        if self.is_stopped() || self.publisher.is_closed() {
            return Err(AuraError::EngineStopped);
        }
        Ok(())
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn sleep_until_deadline(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

struct Consumer {
    machine: StateMachine,
    receiver: BusReceiver,
    view_tx: watch::Sender<RenderView>,
    scheduler: SchedulerHandle,
    stats: Arc<Mutex<MachineStats>>,
}

impl Consumer {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut view = self.view_tx.borrow().clone();
        let mut batch = Vec::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let deadline = self.machine.inactivity_deadline();
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = self.receiver.recv_batch(&mut batch) => {
                    if !received {
                        break;
                    }
                    for message in batch.drain(..) {
                        self.apply(message, &mut view);
                    }
                }
                _ = sleep_until_deadline(deadline) => {
                    if let Some(outcome) = self.machine.poll_inactivity(now()) {
                        self.after_signal(Signal::InactivityTimeout, outcome, &mut view);
                    }
                }
            }

            *self.stats.lock() = self.machine.stats().clone();
            self.view_tx.send_if_modified(|current| {
                if *current == view {
                    return false;
                }
                *current = view.clone();
                true
            });
        }

        self.machine.cancel_timers();
        info!("Engine consumer stopped in state {}", self.machine.state());
    }

    fn apply(&mut self, message: BusMessage, view: &mut RenderView) {
        match message {
            BusMessage::Signal(signal) => {
                let outcome = self.machine.on_signal(signal, now());
                self.after_signal(signal, outcome, view);
            }
            BusMessage::Inference(sample) => {
                view.latency_ms = sample.latency.as_secs_f32() * 1000.0;
                view.backend = sample.backend;
                view.degraded = sample.degraded;
            }
            BusMessage::Face(report) => view.apply_face(report),
        }
    }

    fn after_signal(&mut self, signal: Signal, outcome: Outcome, view: &mut RenderView) {
        match outcome {
            Outcome::Continuous => view.apply_continuous(self.machine.continuous()),
            Outcome::Transitioned { from, to } => {
                info!("State {} -> {} on {}", from, to, signal);
                if to == State::Sleep {
                    self.scheduler.pause();
                } else if from == State::Sleep {
                    self.scheduler.resume();
                }
                view.state = to;
            }
            Outcome::Unchanged(state) => debug!("{} leaves {} unchanged", signal, state),
            // Logged by the machine
            Outcome::Suppressed { .. } => {}
        }
    }
}
