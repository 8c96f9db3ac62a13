//! Signal bus - many producers, one consumer
//!
//! Publishing never blocks: the channel is unbounded and a warning is logged
//! when the backlog crosses `warn_depth`. The consumer drains up to
//! `max_batch` messages at a time and drops continuous values superseded by a
//! newer value of the same kind in that batch. Discrete signals are always
//! delivered, in publish order per producer.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use aura_core::{AuraError, AuraResult, Signal};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::inference::InferenceSample;
use crate::view::FaceReport;

/// Signal bus configuration
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Most messages drained per consumer pass
    pub max_batch: usize,
    /// Backlog that triggers a back-pressure warning
    pub warn_depth: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            max_batch: 64,
            warn_depth: 256,
        }
    }
}

/// Everything that travels to the consumer
#[derive(Clone, Debug, PartialEq)]
pub enum BusMessage {
    Signal(Signal),
    /// Inference telemetry
    Inference(InferenceSample),
    /// Latest face data for the view
    Face(FaceReport),
}

impl BusMessage {
    /// Messages with the same key carry a value that replaces the older one
    fn coalesce_key(&self) -> Option<usize> {
        match self {
            BusMessage::Signal(signal) if !signal.class().is_droppable() => None,
            BusMessage::Signal(Signal::AudioLevel(_)) => Some(0),
            BusMessage::Signal(Signal::TiltUpdate { .. }) => Some(1),
            BusMessage::Signal(Signal::HeadRollUpdate(_)) => Some(2),
            BusMessage::Signal(_) => None,
            BusMessage::Inference(_) => Some(3),
            BusMessage::Face(_) => Some(4),
        }
    }
}

const COALESCE_KEYS: usize = 5;

#[derive(Clone, Debug, Default)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    /// Stale continuous values dropped in favor of newer ones
    pub coalesced: u64,
    pub depth: usize,
    pub peak_depth: usize,
}

struct Shared {
    config: BusConfig,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    published: AtomicU64,
    delivered: AtomicU64,
    coalesced: AtomicU64,
    backlog_warned: AtomicBool,
}

impl Shared {
    fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            depth: self.depth.load(Ordering::Relaxed),
            peak_depth: self.peak_depth.load(Ordering::Relaxed),
        }
    }
}

/// Create a connected publisher/receiver pair
pub fn signal_bus(config: BusConfig) -> (BusPublisher, BusReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        config,
        depth: AtomicUsize::new(0),
        peak_depth: AtomicUsize::new(0),
        published: AtomicU64::new(0),
        delivered: AtomicU64::new(0),
        coalesced: AtomicU64::new(0),
        backlog_warned: AtomicBool::new(false),
    });

    (
        BusPublisher {
            tx,
            shared: shared.clone(),
        },
        BusReceiver { rx, shared },
    )
}

/// Producer side. Cheap to clone; one clone per producer keeps its
/// messages in order.
#[derive(Clone)]
pub struct BusPublisher {
    tx: mpsc::UnboundedSender<BusMessage>,
    shared: Arc<Shared>,
}

impl BusPublisher {
    /// Publish one signal
    pub fn publish(&self, signal: Signal) -> AuraResult<()> {
        self.send(BusMessage::Signal(signal))
    }

    /// Publish any bus message. Fails only once the consumer is gone.
    pub fn send(&self, message: BusMessage) -> AuraResult<()> {
        let depth = self.shared.depth.fetch_add(1, Ordering::AcqRel) + 1;

        if self.tx.send(message).is_err() {
            self.shared.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(AuraError::EngineStopped);
        }

        self.shared.published.fetch_add(1, Ordering::Relaxed);
        self.shared.peak_depth.fetch_max(depth, Ordering::Relaxed);

        if depth >= self.shared.config.warn_depth
            && !self.shared.backlog_warned.swap(true, Ordering::AcqRel)
        {
            warn!("Signal bus backlog at {} messages", depth);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn stats(&self) -> BusStats {
        self.shared.stats()
    }
}

/// Consumer side. Exactly one exists per bus.
pub struct BusReceiver {
    rx: mpsc::UnboundedReceiver<BusMessage>,
    shared: Arc<Shared>,
}

impl BusReceiver {
    /// Wait for at least one message, then drain what is already queued
    /// into `out` and coalesce it. Returns false once every publisher is
    /// gone and the queue is empty.
    ///
    /// Messages already in `out` stay ahead of the new ones and take part
    /// in coalescing, but do not count against `max_batch`.
    ///
    /// Cancel safe: the only await point is the first receive.
    pub async fn recv_batch(&mut self, out: &mut Vec<BusMessage>) -> bool {
        let Some(first) = self.rx.recv().await else {
            return false;
        };
        let carried = out.len();
        out.push(first);

        let limit = self.shared.config.max_batch.max(1);
        while out.len() - carried < limit {
            match self.rx.try_recv() {
                Ok(message) => out.push(message),
                Err(_) => break,
            }
        }

        let drained = out.len() - carried;
        let remaining = self
            .shared
            .depth
            .fetch_sub(drained, Ordering::AcqRel)
            .saturating_sub(drained);
        if remaining < self.shared.config.warn_depth {
            self.shared.backlog_warned.store(false, Ordering::Release);
        }

        let dropped = coalesce(out);
        if dropped > 0 {
            debug!("Coalesced {} stale continuous messages", dropped);
            self.shared.coalesced.fetch_add(dropped as u64, Ordering::Relaxed);
        }
        self.shared
            .delivered
            .fetch_add(drained.saturating_sub(dropped) as u64, Ordering::Relaxed);
        true
    }

    pub fn stats(&self) -> BusStats {
        self.shared.stats()
    }
}

/// Keep only the newest message of each coalescing kind, at its own
/// position. Returns how many were dropped.
pub fn coalesce(messages: &mut Vec<BusMessage>) -> usize {
    let before = messages.len();
    let mut seen = [false; COALESCE_KEYS];
    let mut kept = Vec::with_capacity(before);

    for message in messages.drain(..).rev() {
        match message.coalesce_key() {
            Some(key) if seen[key] => {}
            Some(key) => {
                seen[key] = true;
                kept.push(message);
            }
            None => kept.push(message),
        }
    }

    kept.reverse();
    *messages = kept;
    before - messages.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signals(messages: &[BusMessage]) -> Vec<Signal> {
        messages
            .iter()
            .filter_map(|m| match m {
                BusMessage::Signal(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_single_message_delivered() {
        let (tx, mut rx) = signal_bus(BusConfig::default());
        tx.publish(Signal::FaceDetected).unwrap();

        let mut batch = Vec::new();
        assert!(rx.recv_batch(&mut batch).await);
        assert_eq!(signals(&batch), vec![Signal::FaceDetected]);

        let stats = rx.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.depth, 0);
    }

    #[tokio::test]
    async fn test_backlog_keeps_discrete_and_latest_continuous() {
        let (tx, mut rx) = signal_bus(BusConfig::default());

        tx.publish(Signal::audio_level(0.1)).unwrap();
        tx.publish(Signal::FaceDetected).unwrap();
        tx.publish(Signal::audio_level(0.5)).unwrap();
        tx.publish(Signal::tilt(0.2, 0.2)).unwrap();
        tx.publish(Signal::SmileDetected).unwrap();
        tx.publish(Signal::audio_level(0.9)).unwrap();
        tx.publish(Signal::LoudSound).unwrap();

        let mut batch = Vec::new();
        assert!(rx.recv_batch(&mut batch).await);

        assert_eq!(
            signals(&batch),
            vec![
                Signal::FaceDetected,
                Signal::TiltUpdate { x: 0.2, y: 0.2 },
                Signal::SmileDetected,
                Signal::AudioLevel(0.9),
                Signal::LoudSound,
            ]
        );
        assert_eq!(rx.stats().coalesced, 2);
        assert_eq!(rx.stats().peak_depth, 7);
    }

    #[tokio::test]
    async fn test_discrete_never_dropped_past_batch_limit() {
        let config = BusConfig {
            max_batch: 4,
            warn_depth: 8,
        };
        let (tx, mut rx) = signal_bus(config);
        for _ in 0..10 {
            tx.publish(Signal::UserTap).unwrap();
        }

        let mut received = 0;
        let mut batch = Vec::new();
        while received < 10 {
            assert!(rx.recv_batch(&mut batch).await);
            assert!(batch.len() <= 4);
            received += batch.len();
            batch.clear();
        }
        assert_eq!(rx.stats().delivered, 10);
    }

    #[tokio::test]
    async fn test_carried_messages_do_not_shrink_batch() {
        let config = BusConfig {
            max_batch: 2,
            ..Default::default()
        };
        let (tx, mut rx) = signal_bus(config);
        for signal in [Signal::Shake, Signal::UserTap, Signal::LoudSound] {
            tx.publish(signal).unwrap();
        }

        let mut batch = vec![BusMessage::Signal(Signal::FaceLost)];
        assert!(rx.recv_batch(&mut batch).await);
        assert_eq!(
            signals(&batch),
            vec![Signal::FaceLost, Signal::Shake, Signal::UserTap]
        );

        let stats = rx.stats();
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.delivered, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_keep_their_order() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;

        // Each producer cycles through its own three discrete signals
        fn pattern(producer: usize) -> [Signal; 3] {
            let base = producer * 3;
            [
                Signal::DISCRETE[base],
                Signal::DISCRETE[base + 1],
                Signal::DISCRETE[base + 2],
            ]
        }

        let (tx, mut rx) = signal_bus(BusConfig::default());
        for producer in 0..PRODUCERS {
            let tx = tx.clone();
            tokio::spawn(async move {
                let pattern = pattern(producer);
                for n in 0..PER_PRODUCER {
                    tx.publish(pattern[n % 3]).unwrap();
                    if n % 16 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            });
        }
        drop(tx);

        let mut received = Vec::new();
        let mut batch = Vec::new();
        while rx.recv_batch(&mut batch).await {
            received.extend(signals(&batch));
            batch.clear();
        }

        assert_eq!(received.len(), PRODUCERS * PER_PRODUCER);
        for producer in 0..PRODUCERS {
            let pattern = pattern(producer);
            let mine: Vec<Signal> = received
                .iter()
                .copied()
                .filter(|s| pattern.contains(s))
                .collect();
            let expected: Vec<Signal> = (0..PER_PRODUCER).map(|n| pattern[n % 3]).collect();
            assert_eq!(mine, expected, "producer {} out of order", producer);
        }
        assert_eq!(rx.stats().depth, 0);
    }

    #[tokio::test]
    async fn test_publish_after_consumer_gone() {
        let (tx, rx) = signal_bus(BusConfig::default());
        drop(rx);

        assert!(tx.is_closed());
        assert_eq!(tx.publish(Signal::Shake), Err(AuraError::EngineStopped));
        assert_eq!(tx.stats().depth, 0);
    }

    #[tokio::test]
    async fn test_receiver_ends_when_publishers_drop() {
        let (tx, mut rx) = signal_bus(BusConfig::default());
        tx.publish(Signal::Shake).unwrap();
        drop(tx);

        let mut batch = Vec::new();
        assert!(rx.recv_batch(&mut batch).await);
        batch.clear();
        assert!(!rx.recv_batch(&mut batch).await);
    }

    #[test]
    fn test_coalesce_telemetry_and_faces() {
        let mut messages = vec![
            BusMessage::Face(FaceReport::default()),
            BusMessage::Signal(Signal::HeadRollUpdate(3.0)),
            BusMessage::Face(FaceReport::default()),
            BusMessage::Signal(Signal::HeadRollUpdate(4.0)),
        ];
        assert_eq!(coalesce(&mut messages), 2);
        assert_eq!(
            messages,
            vec![
                BusMessage::Face(FaceReport::default()),
                BusMessage::Signal(Signal::HeadRollUpdate(4.0)),
            ]
        );
    }

    fn any_signal() -> impl Strategy<Value = Signal> {
        prop_oneof![
            prop::sample::select(Signal::DISCRETE.to_vec()),
            (0.0f32..=1.0).prop_map(Signal::audio_level),
            (-1.0f32..=1.0, -1.0f32..=1.0).prop_map(|(x, y)| Signal::tilt(x, y)),
            (-90.0f32..=90.0).prop_map(Signal::HeadRollUpdate),
        ]
    }

    proptest! {
        #[test]
        fn prop_coalesce_keeps_discrete_order_and_latest_values(
            input in proptest::collection::vec(any_signal(), 0..64)
        ) {
            let mut messages: Vec<BusMessage> = input.iter().copied().map(BusMessage::Signal).collect();
            coalesce(&mut messages);
            let output = signals(&messages);

            let discrete_in: Vec<Signal> = input.iter().copied().filter(|s| !s.is_continuous()).collect();
            let discrete_out: Vec<Signal> = output.iter().copied().filter(|s| !s.is_continuous()).collect();
            prop_assert_eq!(discrete_in, discrete_out);

            let last_level = input.iter().rev().find(|s| matches!(s, Signal::AudioLevel(_)));
            let kept_levels: Vec<&Signal> = output.iter().filter(|s| matches!(s, Signal::AudioLevel(_))).collect();
            prop_assert_eq!(kept_levels.len(), usize::from(last_level.is_some()));
            if let Some(last) = last_level {
                prop_assert_eq!(kept_levels[0], last);
            }
        }
    }
}
