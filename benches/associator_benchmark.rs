use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trajtrack_rs::{AssociationMode, Associator, Detection};

const FRAMES: usize = 100;

/* ----------------------------------------------------------------------------
 * Synthetic crowd: objects walking in straight lines with pixel jitter
 * ---------------------------------------------------------------------------- */
fn synthetic_crowd(objects: usize, seed: u64) -> Vec<Vec<Detection>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let walkers: Vec<(f32, f32, f32, f32)> = (0..objects)
        .map(|_| {
            (
                rng.gen_range(0.0..1920.0),
                rng.gen_range(0.0..1080.0),
                rng.gen_range(-4.0..4.0),
                rng.gen_range(-4.0..4.0),
            )
        })
        .collect();

    (0..FRAMES)
        .map(|frame| {
            walkers
                .iter()
                .filter_map(|&(x, y, vx, vy)| {
                    // Drop a few detections to exercise the missed path.
                    if rng.gen_bool(0.05) {
                        return None;
                    }
                    let cx = (x + vx * frame as f32 + rng.gen_range(-1.0..1.0)) as i32;
                    let foot = (y + vy * frame as f32 + rng.gen_range(-1.0..1.0)) as i32;
                    Detection::from_raw(cx - 15, foot - 60, cx + 15, foot, 0, 0.9).ok()
                })
                .collect()
        })
        .collect()
}

fn bench_associator(c: &mut Criterion) {
    let mut group = c.benchmark_group("associator");
    for &objects in &[10usize, 50, 200] {
        let frames = synthetic_crowd(objects, 42);
        for mode in [AssociationMode::Optimal, AssociationMode::Greedy] {
            let id = BenchmarkId::new(format!("{:?}", mode), objects);
            group.bench_with_input(id, &frames, |b, frames| {
                b.iter(|| {
                    let mut associator = Associator::default().with_mode(mode);
                    for (i, detections) in frames.iter().enumerate() {
                        let _ = associator.update(detections, i as f64 / 25.0);
                    }
                });
            });
        }
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3));
    targets = bench_associator
}
criterion_main!(benches);
