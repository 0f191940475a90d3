use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use imgly_inpaint::{BrushRadius, ImagePoint, MaskEncoder, StrokeEngine};

const CANVAS: (u32, u32) = (800, 600);

fn grey_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([180, 180, 180, 255]),
    ))
}

/// Zig-zag across the canvas the way a hand-drawn scribble does
fn scribble(engine: &mut StrokeEngine) {
    let (width, height) = engine.dimensions();
    engine.begin_stroke(ImagePoint::new(20.0, 20.0));
    for i in 1..40u32 {
        let x = (i * 37 % width) as f32;
        let y = (i * 53 % height) as f32;
        engine.continue_stroke(ImagePoint::new(x, y));
    }
    engine.end_stroke();
}

fn benchmark_mask_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask_encoding");
    group.sample_size(20);

    let mut engine = StrokeEngine::new(&grey_image(CANVAS.0, CANVAS.1), CANVAS, BrushRadius::default());
    scribble(&mut engine);
    let surface = engine.composite();
    let blank = RgbaImage::from_pixel(CANVAS.0, CANVAS.1, Rgba([180, 180, 180, 255]));

    group.bench_function("marked_800x600", |b| {
        b.iter(|| MaskEncoder::encode(black_box(&surface)))
    });
    group.bench_function("blank_800x600", |b| {
        b.iter(|| MaskEncoder::encode(black_box(&blank)))
    });
    group.finish();
}

fn benchmark_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");
    group.sample_size(20);

    let mut engine = StrokeEngine::new(&grey_image(CANVAS.0, CANVAS.1), CANVAS, BrushRadius::default());
    scribble(&mut engine);
    group.bench_function("800x600", |b| b.iter(|| black_box(&engine).composite()));
    group.finish();
}

fn benchmark_stroke_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("stroke_replay");
    group.sample_size(10);

    let image = grey_image(CANVAS.0, CANVAS.1);
    for radius in [BrushRadius::MIN, BrushRadius::DEFAULT, BrushRadius::MAX] {
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &radius| {
            b.iter(|| {
                let mut engine = StrokeEngine::new(&image, CANVAS, BrushRadius::new(radius));
                scribble(&mut engine);
                black_box(engine.mask())
            })
        });
    }
    group.finish();
}

criterion_group!(
    mask_benches,
    benchmark_mask_encoding,
    benchmark_composite,
    benchmark_stroke_replay
);
criterion_main!(mask_benches);
