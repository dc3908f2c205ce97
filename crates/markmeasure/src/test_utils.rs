//! Shared synthetic-scene helpers for unit tests.

use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::marker::{render_marker, MarkerDictionary};

pub(crate) fn white_gray(w: u32, h: u32) -> GrayImage {
    GrayImage::from_pixel(w, h, Luma([255]))
}

pub(crate) fn white_frame(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
}

/// Fill the `w × h` block with top-left pixel `(x, y)`.
pub(crate) fn fill_rect(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
    for yy in y..y + h {
        for xx in x..x + w {
            img.put_pixel(xx, yy, Luma([value]));
        }
    }
}

pub(crate) fn fill_rect_rgb(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
    for yy in y..y + h {
        for xx in x..x + w {
            img.put_pixel(xx, yy, Rgb(color));
        }
    }
}

/// Paste marker `id` rendered at `side` pixels with its top-left pixel at
/// `(x, y)`.
pub(crate) fn paste_marker_gray(
    img: &mut GrayImage,
    dict: &MarkerDictionary,
    id: usize,
    side: u32,
    x: u32,
    y: u32,
) {
    let marker = render_marker(dict, id, side).expect("valid marker id");
    image::imageops::replace(img, &marker, i64::from(x), i64::from(y));
}

/// Gaussian-blur a `GrayImage` via `imageproc`.
pub(crate) fn blur_gray(img: &GrayImage, sigma: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut f = image::ImageBuffer::<Luma<f32>, Vec<f32>>::new(w, h);
    for (x, y, p) in img.enumerate_pixels() {
        f.put_pixel(x, y, Luma([f32::from(p[0]) / 255.0]));
    }
    let blurred = imageproc::filter::gaussian_blur_f32(&f, sigma);
    GrayImage::from_fn(w, h, |x, y| {
        let v = blurred.get_pixel(x, y)[0].clamp(0.0, 1.0);
        Luma([(v * 255.0).round() as u8])
    })
}

/// Add seeded uniform noise in `[-amplitude, amplitude]`, saturating.
pub(crate) fn add_noise(img: &mut GrayImage, amplitude: i16, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for p in img.pixels_mut() {
        let n: i16 = rng.gen_range(-amplitude..=amplitude);
        p[0] = (i16::from(p[0]) + n).clamp(0, 255) as u8;
    }
}
