//! Annotated copies of frames for display.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::api::FrameReport;

pub const MARKER_COLOR: Rgb<u8> = Rgb([0, 90, 255]);
pub const OBJECT_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const UNCALIBRATED_COLOR: Rgb<u8> = Rgb([255, 170, 0]);

fn draw_closed_polygon(img: &mut RgbImage, corners: &[[f64; 2]], color: Rgb<u8>) {
    for (i, a) in corners.iter().enumerate() {
        let b = corners[(i + 1) % corners.len()];
        draw_line_segment_mut(
            img,
            (a[0] as f32, a[1] as f32),
            (b[0] as f32, b[1] as f32),
            color,
        );
    }
}

/// Draw the reference marker outline and every object rectangle.
///
/// Rectangles use [`OBJECT_COLOR`] when their size is calibrated and
/// [`UNCALIBRATED_COLOR`] otherwise.
pub fn draw_overlay(frame: &RgbImage, report: &FrameReport) -> RgbImage {
    let mut out = frame.clone();
    for object in &report.objects {
        let color = if object.size.calibrated {
            OBJECT_COLOR
        } else {
            UNCALIBRATED_COLOR
        };
        draw_closed_polygon(&mut out, &object.rect.corners(), color);
    }
    if let Some(obs) = &report.observation {
        draw_closed_polygon(&mut out, &obs.corners, MARKER_COLOR);
    }
    out
}
