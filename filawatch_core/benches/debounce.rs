use criterion::{Criterion, black_box, criterion_group, criterion_main};
use filawatch_core::sensor::{RATE_WINDOW_MS, SensorKind, SensorState};

// Worst-case flap: every sample differs from the tracked raw level, so the
// debounce branch runs on each update.
pub fn bench_update_flap(c: &mut Criterion) {
    c.bench_function("sensor_update_flap", |b| {
        let mut s = SensorState::new(0, SensorKind::Runout, false, 500, 0);
        let mut now = 0u64;
        let mut level = false;
        b.iter(|| {
            now += 5;
            level = !level;
            black_box(s.update(black_box(level), now));
        });
    });
}

// Rate scan over a saturated 100-entry pulse history.
pub fn bench_motion_rate(c: &mut Criterion) {
    c.bench_function("motion_rate_full_history", |b| {
        let mut s = SensorState::new(1, SensorKind::Motion, false, 0, 0);
        let mut now = 0u64;
        for _ in 0..200 {
            now += 100;
            s.update(true, now);
            now += 100;
            s.update(false, now);
        }
        b.iter(|| black_box(s.motion_rate(RATE_WINDOW_MS, now)));
    });
}

criterion_group!(benches, bench_update_flap, bench_motion_rate);
criterion_main!(benches);
