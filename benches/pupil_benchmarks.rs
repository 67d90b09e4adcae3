//! Benchmarks for eye-region extraction and pupil localization

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use opencv::{
    core::{Mat, Point, Scalar, CV_8UC3},
    imgproc,
    prelude::*,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use reading_monitor::{eye_region::EyeRegionExtractor, pupil::PupilLocalizer};

/// Noisy bright eye crop with a dark disc near the middle
fn eye_crop(side: i32, seed: u64) -> Mat {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut crop = Mat::new_rows_cols_with_default(side, side, CV_8UC3, Scalar::all(200.0)).unwrap();
    for _ in 0..side * 2 {
        let p = Point::new(rng.gen_range(0..side), rng.gen_range(0..side));
        let shade = f64::from(rng.gen_range(60u8..255));
        imgproc::circle(&mut crop, p, 1, Scalar::all(shade), imgproc::FILLED, imgproc::LINE_8, 0).unwrap();
    }
    let center = Point::new(side / 2 + rng.gen_range(-2..3), side / 2 + rng.gen_range(-2..3));
    imgproc::circle(&mut crop, center, side / 6, Scalar::all(10.0), imgproc::FILLED, imgproc::LINE_8, 0).unwrap();
    crop
}

fn bench_pupil_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("pupil_locate");
    let localizer = PupilLocalizer::default();

    for half_window in [10, 20, 40] {
        let crop = eye_crop(half_window * 2, 7);
        group.bench_with_input(BenchmarkId::from_parameter(half_window), &crop, |b, crop| {
            b.iter(|| localizer.locate(black_box(crop), Point::new(100, 100)).unwrap());
        });
    }

    group.finish();
}

fn bench_eye_extract(c: &mut Criterion) {
    let frame = Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(128.0)).unwrap();
    let points = [
        Point::new(300, 230),
        Point::new(320, 230),
        Point::new(320, 250),
        Point::new(300, 250),
        Point::new(305, 240),
        Point::new(315, 240),
    ];
    let extractor = EyeRegionExtractor::default();

    c.bench_function("eye_extract", |b| {
        b.iter(|| extractor.extract(black_box(&frame), black_box(&points)).unwrap());
    });
}

criterion_group!(benches, bench_pupil_locate, bench_eye_extract);
criterion_main!(benches);
