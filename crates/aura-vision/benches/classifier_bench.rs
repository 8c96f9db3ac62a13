//! Benchmarks for face metrics and classification

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use aura_core::SenseTime;
use aura_vision::{index, Blendshape, EmotionClassifier, FaceFrame, Landmark, MIN_LANDMARKS};

fn sample_frame() -> FaceFrame {
    let mut mesh = vec![Landmark::new(0.5, 0.5, 0.0); 468];
    mesh[index::FOREHEAD] = Landmark::new(0.5, 0.2, 0.0);
    mesh[index::CHIN] = Landmark::new(0.5, 0.8, 0.0);
    mesh[index::LEFT_EAR] = Landmark::new(0.3, 0.48, 0.0);
    mesh[index::RIGHT_EAR] = Landmark::new(0.7, 0.52, 0.0);
    assert!(mesh.len() >= MIN_LANDMARKS);

    let names = [
        "mouthSmileLeft",
        "mouthSmileRight",
        "eyeWideLeft",
        "eyeWideRight",
        "eyeSquintLeft",
        "eyeSquintRight",
        "jawOpen",
        "browDownLeft",
        "browDownRight",
        "browInnerUp",
        "browOuterUpLeft",
        "browOuterUpRight",
    ];
    let blendshapes = names
        .iter()
        .enumerate()
        .map(|(i, name)| Blendshape::new(*name, (i as f32 * 0.07) % 1.0))
        .collect();

    FaceFrame::with_face(SenseTime::ZERO, 640, 480, mesh, Some(blendshapes))
}

fn bench_classify_frame(c: &mut Criterion) {
    let classifier = EmotionClassifier::new();
    let frame = sample_frame();

    c.bench_function("classify_frame", |b| {
        b.iter(|| black_box(classifier.classify(black_box(&frame))))
    });
}

criterion_group!(benches, bench_classify_frame);
criterion_main!(benches);
