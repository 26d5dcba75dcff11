//! Pixel Scan Benchmarks
//!
//! Benchmarks for the strict, fuzzy and cluster scans and hint rendering.
//!
//! Run with: `cargo bench --bench pixel_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::Rgba;
use pixelcheck::check::{fuzzy_scan, get_clusters, has_clusters, strict_scan};
use pixelcheck::{HintMaskHelper, RasterImage};

fn pair(width: u32, height: u32) -> (RasterImage, RasterImage) {
    let saved = RasterImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
    });
    let mut current = saved.clone();
    // a text-cursor-like vertical stripe plus scattered noise
    for y in 0..height {
        current.put_pixel(width / 2, y, Rgba([255, 255, 255, 255]));
    }
    for i in 0..(width * height / 500) {
        let x = (i * 7919) % width;
        let y = (i * 104_729) % height;
        let Rgba([r, g, b, a]) = *current.get_pixel(x, y);
        current.put_pixel(x, y, Rgba([r.wrapping_add(6), g, b, a]));
    }
    (current, saved)
}

const SIZES: [(u32, u32, &str); 3] = [
    (320, 240, "320x240"),
    (1280, 720, "1280x720"),
    (1920, 1080, "1920x1080"),
];

fn bench_strict_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("strict_scan");
    for (w, h, name) in SIZES {
        let (current, saved) = pair(w, h);
        group.bench_with_input(BenchmarkId::from_parameter(name), &(current, saved), |bench, (cur, sav)| {
            bench.iter(|| black_box(strict_scan(black_box(cur), black_box(sav), &[])));
        });
    }
    group.finish();
}

fn bench_fuzzy_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuzzy_scan");
    for (w, h, name) in SIZES {
        let (current, saved) = pair(w, h);
        let strict = strict_scan(&current, &saved, &[]);
        group.bench_with_input(BenchmarkId::from_parameter(name), &strict, |bench, strict| {
            bench.iter(|| black_box(fuzzy_scan(&current, &saved, black_box(strict), 8)));
        });
    }
    group.finish();
}

fn bench_cluster_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster_scan");
    for (w, h, name) in SIZES {
        let (current, saved) = pair(w, h);
        let strict = strict_scan(&current, &saved, &[]);
        group.bench_with_input(BenchmarkId::new("has_clusters", name), &strict, |bench, s| {
            bench.iter(|| black_box(has_clusters(black_box(s), 2, 4)));
        });
        group.bench_with_input(BenchmarkId::new("get_clusters", name), &strict, |bench, s| {
            bench.iter(|| black_box(get_clusters(black_box(s), 2, 4, w, h)));
        });
    }
    group.finish();
}

fn bench_hint_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("hint_render");
    let (current, saved) = pair(1280, 720);
    let strict = strict_scan(&current, &saved, &[]);
    for (fast, name) in [(true, "fast"), (false, "precise")] {
        let helper = HintMaskHelper::new(fast, true, 2);
        group.bench_function(name, |bench| {
            bench.iter(|| black_box(helper.render(black_box(&strict), 1280, 720)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_strict_scan,
    bench_fuzzy_scan,
    bench_cluster_scan,
    bench_hint_render
);
criterion_main!(benches);
