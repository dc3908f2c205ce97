use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use markmeasure::marker::render_marker;
use markmeasure::{
    adaptive_threshold_inv, ArucoDetector, MarkerDictionary, MeasureConfig, Measurer,
    ObjectSegmenter, SegmentConfig,
};

/// 640×480 scene: one marker, a handful of dark boxes, mild noise.
fn make_scene(seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::from_fn(640, 480, |_, _| Luma([rng.gen_range(235..=255)]));

    let dict = MarkerDictionary::aruco_4x4();
    if let Some(marker) = render_marker(&dict, 0, 120) {
        image::imageops::replace(&mut img, &marker, 40, 40);
    }
    for _ in 0..6 {
        let w = rng.gen_range(40..120);
        let h = rng.gen_range(40..120);
        let x = rng.gen_range(200..640 - w);
        let y = rng.gen_range(20..480 - h);
        let v = rng.gen_range(0..60);
        for yy in y..y + h {
            for xx in x..x + w {
                img.put_pixel(xx, yy, Luma([v]));
            }
        }
    }
    img
}

fn to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}

fn bench_threshold(c: &mut Criterion) {
    let img = make_scene(7);
    c.bench_function("adaptive_threshold_640x480_b19", |b| {
        b.iter(|| black_box(adaptive_threshold_inv(black_box(&img), 19, 5.0)))
    });
}

fn bench_marker_detection(c: &mut Criterion) {
    let img = make_scene(11);
    let detector = ArucoDetector::default();
    c.bench_function("aruco_detect_640x480", |b| {
        b.iter(|| black_box(detector.detect_markers(black_box(&img)).len()))
    });
}

fn bench_segmentation(c: &mut Criterion) {
    let img = make_scene(13);
    let segmenter = ObjectSegmenter::new(SegmentConfig::default());
    c.bench_function("segment_640x480", |b| {
        b.iter(|| black_box(segmenter.segment_gray(black_box(&img)).count()))
    });
}

fn bench_process_frame(c: &mut Criterion) {
    let frame = to_rgb(&make_scene(17));
    let Ok(mut measurer) = Measurer::new(MeasureConfig::default()) else {
        return;
    };
    c.bench_function("process_frame_640x480", |b| {
        b.iter(|| black_box(measurer.process_frame(black_box(&frame)).objects.len()))
    });
}

criterion_group!(
    hotpaths,
    bench_threshold,
    bench_marker_detection,
    bench_segmentation,
    bench_process_frame
);
criterion_main!(hotpaths);
