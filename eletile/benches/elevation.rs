use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eletile::{ElevationEngine, TileNaming};
use tempfile::TempDir;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const TILE_SAMPLES: u32 = 1201;

/// Create a synthetic 1 degree GeoTIFF tile with a simple elevation gradient.
fn create_tile(dir: &std::path::Path, lat: i32, lon: i32) {
    let res = 1.0 / f64::from(TILE_SAMPLES);
    let data: Vec<f32> = (0..TILE_SAMPLES)
        .flat_map(|row| (0..TILE_SAMPLES).map(move |col| ((row + col) % 4000) as f32))
        .collect();

    let path = dir.join(TileNaming::aster().filename(f64::from(lat), f64::from(lon)));
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(TILE_SAMPLES, TILE_SAMPLES)
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::Unknown(33922),
            &[0.0, 0.0, 0.0, f64::from(lon), f64::from(lat + 1), 0.0][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(33550), &[res, res, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(42113), "-9999")
        .unwrap();
    image.write_data(&data).unwrap();
}

fn bench_single_cached(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    create_tile(tmp.path(), 35, 138);
    let engine = ElevationEngine::builder(tmp.path())
        .cache_size(10)
        .build()
        .unwrap();

    // Warm the cache
    let _ = engine.lookup(35.5, 138.5);

    c.bench_function("single_lookup_cached", |b| {
        b.iter(|| {
            black_box(engine.lookup(black_box(35.3606), black_box(138.7274)));
        });
    });
}

fn bench_single_missing(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let engine = ElevationEngine::new(tmp.path()).unwrap();

    // Record the miss
    let _ = engine.lookup(35.5, 138.5);

    c.bench_function("single_lookup_missing", |b| {
        b.iter(|| {
            black_box(engine.lookup(black_box(35.3606), black_box(138.7274)));
        });
    });
}

fn bench_batch_same_tile(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    create_tile(tmp.path(), 35, 138);
    let engine = ElevationEngine::new(tmp.path()).unwrap();

    // Generate 1000 coords within the same tile
    let coords: Vec<(f64, f64)> = (0..1000)
        .map(|i| {
            let frac = i as f64 / 1000.0;
            (35.0 + frac * 0.99, 138.0 + frac * 0.99)
        })
        .collect();

    // Warm the cache
    let _ = engine.lookup(35.5, 138.5);

    c.bench_function("batch_1000_same_tile", |b| {
        b.iter(|| {
            black_box(engine.lookup_many(black_box(&coords)));
        });
    });
}

fn bench_batch_multi_tile(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    create_tile(tmp.path(), 35, 138);
    create_tile(tmp.path(), 36, 138);
    create_tile(tmp.path(), 35, 139);
    let engine = ElevationEngine::new(tmp.path()).unwrap();

    // Generate 1000 coords spread across 3 tiles
    let coords: Vec<(f64, f64)> = (0..1000)
        .map(|i| match i % 3 {
            0 => (35.0 + (i as f64 / 3000.0) * 0.99, 138.5),
            1 => (36.0 + (i as f64 / 3000.0) * 0.99, 138.5),
            _ => (35.0 + (i as f64 / 3000.0) * 0.99, 139.5),
        })
        .collect();

    // Warm the cache
    let _ = engine.lookup(35.5, 138.5);
    let _ = engine.lookup(36.5, 138.5);
    let _ = engine.lookup(35.5, 139.5);

    c.bench_function("batch_1000_multi_tile", |b| {
        b.iter(|| {
            black_box(engine.lookup_many(black_box(&coords)));
        });
    });
}

criterion_group!(
    benches,
    bench_single_cached,
    bench_single_missing,
    bench_batch_same_tile,
    bench_batch_multi_tile,
);
criterion_main!(benches);
