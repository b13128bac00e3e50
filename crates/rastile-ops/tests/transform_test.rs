//! Integration tests for transforms, flips and rotations.

use std::io::Write;

use rastile_core::{PixelLayout, Rect, TileConfig, TileManager};
use rastile_math::Matrix3;
use rastile_ops::{
    ClipMode, Direction, Interpolation, Rotation, SourceKind, TransformOptions, rotate, transform_tiles,
};

const RGBA: SourceKind = SourceKind::Layer(PixelLayout::RGBA);

/// Routes `tracing` output to the test harness; `RUST_LOG=debug` shows
/// sampling decisions.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn noise(w: u32, h: u32, bpp: u32, config: TileConfig) -> TileManager {
    let tiles = TileManager::with_config(w, h, bpp, config).unwrap();
    let stride = (w * bpp) as usize;
    let mut state = 0x2545_f491u32;
    let data: Vec<u8> = (0..stride * h as usize)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect();
    tiles.write_pixel_data(Rect::from_size(w, h), &data, stride);
    tiles
}

fn pixels(tiles: &TileManager) -> Vec<u8> {
    let stride = (tiles.width() * tiles.bpp()) as usize;
    let mut data = vec![0u8; stride * tiles.height() as usize];
    tiles.read_pixel_data(Rect::from_size(tiles.width(), tiles.height()), &mut data, stride);
    data
}

#[test]
fn test_identity_nearest_is_exact() {
    init_tracing();
    for &(w, h, bpp) in &[(1, 1, 1), (64, 64, 4), (130, 71, 3), (33, 200, 2)] {
        let mut src = noise(w, h, bpp, TileConfig::default());
        src.set_offsets(-17, 42);
        let kind = match bpp {
            1 => SourceKind::Channel,
            2 => SourceKind::Layer(PixelLayout::GRAYA),
            3 => SourceKind::Layer(PixelLayout::RGB),
            _ => RGBA,
        };
        let opts = TransformOptions::default().with_interpolation(Interpolation::None);
        let dst = transform_tiles(&src, kind, &Matrix3::IDENTITY, &opts, &[], None).unwrap();
        assert_eq!((dst.width(), dst.height()), (w, h));
        assert_eq!(dst.offsets(), (-17, 42));
        assert_eq!(pixels(&dst), pixels(&src), "{w}x{h}x{bpp}");
    }
}

#[test]
fn test_rotate_90_then_270_is_exact() {
    let mut src = noise(150, 97, 4, TileConfig::new(32, 48).unwrap());
    src.set_offsets(7, -3);
    let once = rotate(&src, RGBA, Rotation::Rotate90, 40.0, 12.0, ClipMode::Adjust, &[]).unwrap();
    assert_eq!((once.width(), once.height()), (97, 150));
    let back = rotate(&once, RGBA, Rotation::Rotate270, 40.0, 12.0, ClipMode::Adjust, &[]).unwrap();
    assert_eq!(back.offsets(), (7, -3));
    assert_eq!(pixels(&back), pixels(&src));
}

#[test]
fn test_transparent_source_stays_zero() {
    init_tracing();
    let src = TileManager::new(90, 70, 4).unwrap();
    src.fill(&[255, 128, 64, 0]);
    let m = Matrix3::IDENTITY
        .translate(-45.0, -35.0)
        .rotate(0.3)
        .scale(1.7, 0.6)
        .translate(45.0, 35.0);

    for interpolation in [Interpolation::Linear, Interpolation::Cubic, Interpolation::Lanczos] {
        for supersample in [false, true] {
            let mut opts = TransformOptions::default().with_interpolation(interpolation);
            if supersample {
                opts = opts.with_supersample(3);
            }
            let dst = transform_tiles(&src, RGBA, &m, &opts, &[0; 4], None).unwrap();
            assert!(
                pixels(&dst).iter().all(|&b| b == 0),
                "{interpolation:?} supersample={supersample}"
            );
        }
    }
}

#[test]
fn test_supersample_extreme_scale() {
    init_tracing();
    let src = TileManager::new(8, 8, 4).unwrap();
    src.fill(&[255, 255, 255, 255]);
    let opts = TransformOptions::default()
        .with_direction(Direction::Backward)
        .with_clip(ClipMode::Clip)
        .with_interpolation(Interpolation::Linear)
        .with_supersample(3);

    for scale in [1e17, -1e17, 1e150] {
        let m = Matrix3::IDENTITY.scale(scale, scale);
        let dst = transform_tiles(&src, RGBA, &m, &opts, &[0; 4], None).unwrap();
        assert_eq!((dst.width(), dst.height()), (8, 8));
        // every leaf lands far outside the source
        assert!(pixels(&dst).iter().all(|&b| b == 0), "scale {scale}");
    }
}

#[test]
fn test_backward_matches_forward() {
    let src = noise(60, 40, 3, TileConfig::default());
    let m = Matrix3::IDENTITY.rotate(0.25).translate(3.0, -2.0);
    let inv = m.invert().unwrap();
    let kind = SourceKind::Layer(PixelLayout::RGB);

    let fwd = TransformOptions::default().with_clip(ClipMode::Clip);
    let bwd = fwd.with_direction(Direction::Backward);
    let a = transform_tiles(&src, kind, &m, &fwd, &[0, 0, 0], None).unwrap();
    let b = transform_tiles(&src, kind, &inv, &bwd, &[0, 0, 0], None).unwrap();
    assert_eq!(pixels(&a), pixels(&b));
}

#[test]
fn test_progress_reports_rows() {
    let src = noise(300, 260, 1, TileConfig::new(16, 16).unwrap());
    let opts = TransformOptions::default()
        .with_interpolation(Interpolation::Linear)
        .with_clip(ClipMode::Clip);
    let m = Matrix3::IDENTITY.scale(1.5, 1.5);

    let mut calls = Vec::new();
    let mut progress = |start: i32, end: i32, current: i32| calls.push((start, end, current));
    transform_tiles(&src, SourceKind::Channel, &m, &opts, &[], Some(&mut progress)).unwrap();

    assert!(calls.len() > 2);
    assert!(calls.iter().all(|&(s, e, _)| (s, e) == (0, 260)));
    // 19 portions per 16-row band: the 16th portion leaves band 0 unfinished
    assert_eq!(calls[0], (0, 260, 0));
    assert_eq!(calls[1], (0, 260, 16));
    assert!(calls.iter().all(|&(_, _, c)| c % 16 == 0 || c == 260));
    assert!(calls.windows(2).all(|w| w[0].2 <= w[1].2));
    assert_eq!(calls.last(), Some(&(0, 260, 260)));
}

#[test]
fn test_options_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "interpolation: none").unwrap();
    writeln!(file, "clip: clip").unwrap();
    let opts = TransformOptions::from_file(file.path()).unwrap();

    let src = noise(20, 20, 4, TileConfig::default());
    let m = Matrix3::IDENTITY.translate(-10.0, -10.0).rotate(0.7).translate(10.0, 10.0);
    let dst = transform_tiles(&src, RGBA, &m, &opts, &[], None).unwrap();
    assert_eq!((dst.width(), dst.height()), (20, 20));

    // nearest only copies source pixels or the transparent background
    let src_data = pixels(&src);
    let src_px: Vec<&[u8]> = src_data.chunks_exact(4).collect();
    for px in pixels(&dst).chunks_exact(4) {
        assert!(px == [0, 0, 0, 0] || src_px.contains(&px));
    }
}
