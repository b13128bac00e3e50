//! Benchmarks for rastile operations.
//!
//! Run with: `cargo bench`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use rastile_core::{PixelLayout, PixelRegion, PixelSurround, Processor, Rect, TileManager};
use rastile_math::Matrix3;
use rastile_ops::{ClipMode, Interpolation, Rotation, SourceKind, TransformOptions, rotate, transform_tiles};

fn gradient(size: u32, bpp: u32) -> TileManager {
    let tiles = TileManager::new(size, size, bpp).unwrap();
    let stride = (size * bpp) as usize;
    let data: Vec<u8> = (0..stride * size as usize).map(|i| (i % 251) as u8).collect();
    tiles.write_pixel_data(Rect::from_size(size, size), &data, stride);
    tiles
}

/// Benchmark lock-step region iteration.
fn bench_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("processor");

    for size in [256u32, 1024].iter() {
        let src = gradient(*size, 4);
        let dst = TileManager::new(*size, *size, 4).unwrap();
        group.throughput(Throughput::Elements((*size * *size) as u64));

        group.bench_with_input(BenchmarkId::new("copy_rgba", size), size, |b, _| {
            b.iter(|| {
                Processor::new([PixelRegion::full(&src, false), PixelRegion::full(&dst, true)])
                    .unwrap()
                    .for_each(|portion| {
                        if let [s, d] = portion.buffers_mut() {
                            for r in 0..s.height() {
                                d.row_mut(r).copy_from_slice(s.row(r));
                            }
                        }
                    })
            })
        });
    }

    group.finish();
}

/// Benchmark neighborhood access, inside tiles and across seams.
fn bench_surround(c: &mut Criterion) {
    let mut group = c.benchmark_group("surround");
    let tiles = gradient(512, 4);

    for &(w, h) in &[(2u32, 2u32), (4, 4)] {
        group.bench_function(BenchmarkId::new("scan", format!("{w}x{h}")), |b| {
            let mut surround = PixelSurround::new(&tiles, w, h, &[0; 4]).unwrap();
            b.iter(|| {
                let mut acc = 0u32;
                for y in (0..512).step_by(7) {
                    for x in (0..512).step_by(3) {
                        acc += surround.lock(black_box(x), black_box(y)).pixel(0, 0)[0] as u32;
                    }
                }
                acc
            })
        });
    }

    group.finish();
}

/// Benchmark transforms per reconstruction filter.
fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let src = gradient(256, 4);
    let kind = SourceKind::Layer(PixelLayout::RGBA);
    let m = Matrix3::IDENTITY
        .translate(-128.0, -128.0)
        .rotate(0.3)
        .scale(1.25, 1.25)
        .translate(128.0, 128.0);
    group.throughput(Throughput::Elements(256 * 256));

    for interpolation in [
        Interpolation::None,
        Interpolation::Linear,
        Interpolation::Cubic,
        Interpolation::Lanczos,
    ] {
        let opts = TransformOptions::default()
            .with_interpolation(interpolation)
            .with_clip(ClipMode::Clip);
        group.bench_with_input(
            BenchmarkId::new("rotate_scale", format!("{interpolation:?}")),
            &opts,
            |b, opts| b.iter(|| transform_tiles(&src, kind, black_box(&m), opts, &[0; 4], None).unwrap()),
        );
    }

    let opts = TransformOptions::default()
        .with_interpolation(Interpolation::Linear)
        .with_supersample(3);
    let shrink = Matrix3::IDENTITY.scale(0.3, 0.3);
    group.bench_function("supersample_shrink", |b| {
        b.iter(|| transform_tiles(&src, kind, black_box(&shrink), &opts, &[0; 4], None).unwrap())
    });

    group.bench_function("rotate_90", |b| {
        b.iter(|| rotate(&src, kind, Rotation::Rotate90, 128.0, 128.0, ClipMode::Adjust, &[]).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_processor, bench_surround, bench_transform);

criterion_main!(benches);
