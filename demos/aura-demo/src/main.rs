//! AURA Demo Application
//!
//! Drives the engine with synthetic producers:
//! - A face that drifts in and out of a smile, and leaves for a while
//! - A phone that is shaken every few seconds and briefly covered
//! - A microphone with background hiss and speech bursts
//! - A backend switch to an unavailable accelerator halfway through
//!
//! Usage: aura-demo [--seconds N] [--backend NAME]
//! Log level comes from RUST_LOG (default "info").

use std::time::Duration;

use aura_core::{AuraResult, SenseTime};
use aura_runtime::{Engine, EngineConfig, EngineHandle};
use aura_sense::{AccelSample, AudioConfig, MotionConfig, GRAVITY};
use aura_vision::{index, Blendshape, FaceConfig, FaceFrame, Landmark, MIN_LANDMARKS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{interval, sleep, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;
const SAMPLE_RATE: u32 = 16_000;
const AUDIO_BUFFER: usize = 1600;

struct Args {
    seconds: u64,
    backend: String,
}

fn parse_args() -> Args {
    let mut args = Args {
        seconds: 40,
        backend: "npu".to_string(),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--seconds" => {
                if let Some(n) = iter.next().and_then(|v| v.parse().ok()) {
                    args.seconds = n;
                }
            }
            "--backend" => {
                if let Some(name) = iter.next() {
                    args.backend = name;
                }
            }
            other => eprintln!("Ignoring argument: {}", other),
        }
    }
    args
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args();

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║           AURA Demo - Reactive Agent Engine                ║");
    println!("║     Synthetic face, motion and microphone session          ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let engine = Engine::start(EngineConfig::default());
    let started = Instant::now();

    tokio::spawn(run_face(engine.face_feed(FaceConfig::default()), started));
    tokio::spawn(run_motion(engine.motion_feed(MotionConfig::default()), started));
    tokio::spawn(run_audio(engine.audio_feed(AudioConfig {
        sample_rate: SAMPLE_RATE,
        ..Default::default()
    })));
    tokio::spawn(log_views(engine.subscribe()));

    let total = Duration::from_secs(args.seconds);
    sleep(total / 2).await;
    match engine.set_backend(&args.backend) {
        Ok(kind) => info!("Switched inference to {}", kind),
        Err(e) => warn!("Backend switch rejected: {}", e),
    }
    sleep(total - total / 2).await;

    print_summary(&engine);
    engine.shutdown().await;
}

async fn log_views(mut views: tokio::sync::watch::Receiver<aura_runtime::RenderView>) {
    let mut last = views.borrow().state;
    while views.changed().await.is_ok() {
        let view = views.borrow().clone();
        if view.state != last {
            last = view.state;
            println!(
                "{:<14} amp {:.2} eyes ({:+.2}, {:+.2}) roll {:+5.1}° | {} {:.1}ms{} | {}",
                view.headline(),
                view.amplitude,
                view.eye_x,
                view.eye_y,
                view.roll,
                view.backend,
                view.latency_ms,
                if view.degraded { " (degraded)" } else { "" },
                view.emotion
                    .map(|e| format!("{} {:.0}%", e.label, e.confidence * 100.0))
                    .unwrap_or_else(|| "no face".to_string()),
            );
        }
    }
}

fn print_summary(engine: &EngineHandle) {
    let stats = engine.stats();
    let inference = engine.inference_status();

    println!();
    println!("Final state:      {}", engine.view().headline());
    println!("Signals handled:  {}", stats.machine.processed);
    println!("Transitions:      {}", stats.machine.transitions);
    println!("Suppressed:       {}", stats.machine.suppressed);
    println!("Bus published:    {}", stats.bus.published);
    println!("Bus coalesced:    {}", stats.bus.coalesced);
    println!("Bus peak depth:   {}", stats.bus.peak_depth);
    println!(
        "Inference:        {} passes, {} failures on {}{}",
        inference.passes,
        inference.failures,
        inference.active,
        if inference.degraded { " (degraded)" } else { "" }
    );
}

fn sense_time(started: Instant) -> SenseTime {
    SenseTime::from_micros(started.elapsed().as_micros() as u64)
}

/// A frontal face mesh with the head rolled by `roll` degrees
fn face_mesh(roll: f32) -> Vec<Landmark> {
    let mut mesh = vec![Landmark::new(0.5, 0.5, 0.0); MIN_LANDMARKS];
    let lift = 0.2 * roll.to_radians().tan();
    mesh[index::NOSE_TIP] = Landmark::new(0.5, 0.52, -0.05);
    mesh[index::FOREHEAD] = Landmark::new(0.5, 0.25, 0.0);
    mesh[index::CHIN] = Landmark::new(0.5, 0.8, 0.0);
    mesh[index::LEFT_EAR] = Landmark::new(0.3, 0.5 - lift, 0.0);
    mesh[index::RIGHT_EAR] = Landmark::new(0.7, 0.5 + lift, 0.0);
    mesh
}

async fn run_face(mut feed: aura_runtime::FaceFeed, started: Instant) -> AuraResult<()> {
    let mut ticker = interval(Duration::from_millis(33));
    loop {
        ticker.tick().await;
        let t = started.elapsed().as_secs_f32();
        let now = sense_time(started);

        // Away for 4 s out of every 20
        let frame = if t % 20.0 > 16.0 {
            FaceFrame::absent(now, FRAME_WIDTH, FRAME_HEIGHT)
        } else {
            let smile = (0.5 + 0.5 * (t * 0.6).sin()).clamp(0.0, 1.0);
            let wonder = if t % 11.0 > 9.5 { 0.7 } else { 0.05 };
            FaceFrame::with_face(
                now,
                FRAME_WIDTH,
                FRAME_HEIGHT,
                face_mesh(10.0 * (t * 0.3).sin()),
                Some(vec![
                    Blendshape::new("mouthSmileLeft", smile),
                    Blendshape::new("mouthSmileRight", smile),
                    Blendshape::new("eyeWideLeft", wonder),
                    Blendshape::new("eyeWideRight", wonder),
                    Blendshape::new("jawOpen", wonder),
                ]),
            )
        };
        feed.on_frame(&frame)?;
    }
}

async fn run_motion(mut feed: aura_runtime::MotionFeed, started: Instant) -> AuraResult<()> {
    let mut ticker = interval(Duration::from_millis(20));
    let mut rng = StdRng::from_entropy();
    loop {
        ticker.tick().await;
        let t = started.elapsed().as_secs_f32();
        let now = sense_time(started);

        // Shake for half a second every 9 s
        let shaking = t % 9.0 > 8.5;
        let sample = if shaking {
            let jolt = if (t * 20.0) as u32 % 2 == 0 { 30.0 } else { 0.0 };
            AccelSample::new(jolt, GRAVITY, 0.0, now)
        } else {
            AccelSample::new(
                2.0 * (t * 0.5).sin() + rng.gen_range(-0.2..0.2),
                GRAVITY + rng.gen_range(-0.2..0.2),
                1.5 * (t * 0.4).cos(),
                now,
            )
        };
        feed.on_accel(sample)?;

        // Covered for 1 s every 25 s
        let covered = t % 25.0 > 24.0;
        feed.on_proximity(if covered { 0.0 } else { 5.0 }, 5.0)?;
    }
}

async fn run_audio(mut feed: aura_runtime::AudioFeed) -> AuraResult<()> {
    let cadence = Duration::from_secs_f64(AUDIO_BUFFER as f64 / SAMPLE_RATE as f64);
    let mut ticker = interval(cadence);
    let mut rng = StdRng::from_entropy();
    let mut buffer = vec![0i16; AUDIO_BUFFER];
    let mut elapsed = 0.0f32;

    loop {
        ticker.tick().await;
        elapsed += cadence.as_secs_f32();

        // Talk for 2 s out of every 7, with a clap every 13 s
        let peak: i16 = if elapsed % 13.0 < 0.2 {
            20_000
        } else if elapsed % 7.0 < 2.0 {
            2_500
        } else {
            150
        };
        for sample in buffer.iter_mut() {
            *sample = rng.gen_range(-peak..=peak);
        }
        feed.on_buffer(&buffer)?;
    }
}
