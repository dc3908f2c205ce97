//! Local-mean adaptive binarization.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::integral_image::integral_image;

/// Binarize with a local-mean threshold and inverse polarity.
///
/// A pixel becomes foreground (255) when `value - mean <= -ceil(bias)`, where
/// `mean` is the average over a `block_size × block_size` window centred on
/// the pixel, rounded to the nearest grey level. Darker-than-surroundings
/// structure therefore turns white regardless of the global illumination
/// level.
///
/// Near the image edges the window is clipped to the image and averaged over
/// the pixels it still covers. OpenCV replicates the border pixels instead, so
/// results can differ within `block_size / 2` of the edge.
pub fn adaptive_threshold_inv(gray: &GrayImage, block_size: u32, bias: f64) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    // integral(x, y) holds the sum of all pixels strictly above and left of (x, y).
    let integral: Image<Luma<u64>> = integral_image::<_, u64>(gray);
    let radius = block_size / 2;
    let offset = bias.ceil() as i32;

    for y in 0..h {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius).min(h - 1) + 1;
        for x in 0..w {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius).min(w - 1) + 1;

            let sum = (integral.get_pixel(x1, y1)[0] + integral.get_pixel(x0, y0)[0])
                - (integral.get_pixel(x0, y1)[0] + integral.get_pixel(x1, y0)[0]);
            let count = u64::from((x1 - x0) * (y1 - y0));
            let mean = (sum as f64 / count as f64).round() as i32;

            if i32::from(gray.get_pixel(x, y)[0]) - mean <= -offset {
                out.put_pixel(x, y, Luma([255]));
            }
        }
    }
    out
}
