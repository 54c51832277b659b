//! Benchmarks for the renderer crate - resampling, figure rendering and PNG encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use renderer::gradient::{resample, Interpolation};
use renderer::{encode_png, Render, RenderConfig, SliceRenderer};
use slice_common::Slice;

/// Uniform random slice, like the demo volume.
fn random_slice(rows: usize, cols: usize) -> Slice {
    let mut rng = rand::thread_rng();
    let data = (0..rows * cols).map(|_| rng.gen::<f32>()).collect();
    Slice::matrix(rows, cols, data).unwrap()
}

// ============================================================================
// Resampling
// ============================================================================

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");

    for (rows, cols) in [(100, 100), (1000, 1000)] {
        let slice = random_slice(rows, cols);
        let (dst_w, dst_h) = (393, 393);
        group.throughput(Throughput::Elements((dst_w * dst_h) as u64));

        for method in [Interpolation::Nearest, Interpolation::Bilinear] {
            group.bench_with_input(
                BenchmarkId::new(method.as_str(), format!("{}x{}", rows, cols)),
                &slice,
                |b, slice| {
                    b.iter(|| {
                        resample(black_box(slice.data()), cols, rows, dst_w, dst_h, method)
                    })
                },
            );
        }
    }

    group.finish();
}

// ============================================================================
// Full figure
// ============================================================================

fn bench_render_figure(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_figure");
    group.sample_size(20);

    let renderer = SliceRenderer::default();
    for size in [10, 250, 1000] {
        let slice = random_slice(size, size);
        group.bench_with_input(BenchmarkId::new("viridis", size), &slice, |b, slice| {
            b.iter(|| renderer.render(black_box(slice), "level_000").unwrap())
        });
    }

    group.finish();
}

// ============================================================================
// PNG encoding
// ============================================================================

fn bench_png_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encoding");
    group.sample_size(20);

    let renderer = SliceRenderer::new(RenderConfig {
        colorbar: true,
        ..RenderConfig::default()
    })
    .unwrap();
    let image = renderer.render(&random_slice(1000, 1000), "level_000").unwrap();
    let (w, h) = (image.width() as usize, image.height() as usize);
    group.throughput(Throughput::Bytes((w * h * 4) as u64));

    group.bench_function("figure_640x480", |b| {
        b.iter(|| encode_png(black_box(image.pixels()), w, h).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_resample, bench_render_figure, bench_png_encoding);
criterion_main!(benches);
