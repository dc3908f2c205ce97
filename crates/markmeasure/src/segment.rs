//! Object segmentation: adaptive binarization, external contours, area gate
//! and minimum-area rectangles.

use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};

use crate::config::SegmentConfig;
use crate::geometry::{min_area_rect, polygon_area, RotatedRect};
use crate::threshold::adaptive_threshold_inv;

/// One candidate object.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SegmentedRegion {
    /// Minimum-area rectangle measured to pixel edges.
    pub rect: RotatedRect,
    /// Shoelace area of the traced contour, px².
    pub area_px: f64,
    /// Outer contour through pixel centres.
    #[serde(skip)]
    pub contour: Vec<[f64; 2]>,
}

/// Lazy sequence of regions from one frame.
///
/// Contours are traced up front; the area gate and rectangle fitting run as
/// the iterator is consumed. Order follows contour discovery and carries no
/// meaning.
pub struct Regions {
    contours: std::vec::IntoIter<Contour<i32>>,
    min_area_px: f64,
}

impl Iterator for Regions {
    type Item = SegmentedRegion;

    fn next(&mut self) -> Option<SegmentedRegion> {
        for contour in self.contours.by_ref() {
            if contour.border_type != BorderType::Outer || contour.parent.is_some() {
                continue;
            }
            let points: Vec<[f64; 2]> = contour
                .points
                .iter()
                .map(|p| [f64::from(p.x), f64::from(p.y)])
                .collect();
            let area_px = polygon_area(&points);
            if area_px <= self.min_area_px {
                continue;
            }
            let Some(rect) = min_area_rect(&points) else {
                continue;
            };
            return Some(SegmentedRegion {
                rect: rect.expanded(1.0),
                area_px,
                contour: points,
            });
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.contours.len()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectSegmenter {
    config: SegmentConfig,
}

impl ObjectSegmenter {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SegmentConfig {
        &mut self.config
    }

    /// Foreground mask: dark-relative-to-surroundings pixels are 255.
    pub fn binarize(&self, gray: &GrayImage) -> GrayImage {
        adaptive_threshold_inv(gray, self.config.block_size, self.config.bias)
    }

    pub fn segment(&self, frame: &RgbImage) -> Regions {
        self.segment_gray(&image::imageops::grayscale(frame))
    }

    pub fn segment_gray(&self, gray: &GrayImage) -> Regions {
        let binary = self.binarize(gray);
        let contours = find_contours::<i32>(&binary);
        tracing::debug!(contours = contours.len(), "segmentation contours");
        Regions {
            contours: contours.into_iter(),
            min_area_px: self.config.min_area_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fill_rect, white_gray};
    use approx::assert_relative_eq;

    fn segmenter() -> ObjectSegmenter {
        ObjectSegmenter::new(SegmentConfig::default())
    }

    #[test]
    fn area_gate_is_exclusive() {
        // Traced outline of a 41×51 fill encloses exactly 40×50 = 2000 px².
        let mut img = white_gray(200, 120);
        fill_rect(&mut img, 20, 30, 41, 51, 0);
        assert_eq!(segmenter().segment_gray(&img).count(), 0);

        // 42×51 → 41×50 = 2050 px².
        let mut img = white_gray(200, 120);
        fill_rect(&mut img, 20, 30, 42, 51, 0);
        let regions: Vec<_> = segmenter().segment_gray(&img).collect();
        assert_eq!(regions.len(), 1);
        assert_relative_eq!(regions[0].area_px, 2050.0, epsilon = 1e-9);
    }

    #[test]
    fn small_region_dropped_large_region_kept() {
        let mut img = white_gray(300, 200);
        fill_rect(&mut img, 20, 20, 20, 20, 0);
        fill_rect(&mut img, 100, 50, 120, 80, 0);
        let regions: Vec<_> = segmenter().segment_gray(&img).collect();
        assert_eq!(regions.len(), 1);
        let rect = regions[0].rect;
        assert_relative_eq!(rect.width(), 120.0, epsilon = 1e-9);
        assert_relative_eq!(rect.height(), 80.0, epsilon = 1e-9);
        assert_relative_eq!(rect.center[0], 159.5, epsilon = 1e-9);
        assert_relative_eq!(rect.center[1], 89.5, epsilon = 1e-9);
    }

    #[test]
    fn rectangle_is_measured_to_pixel_edges() {
        let mut img = white_gray(160, 160);
        fill_rect(&mut img, 50, 40, 40, 60, 0);
        let regions: Vec<_> = segmenter().segment_gray(&img).collect();
        assert_eq!(regions.len(), 1);
        assert_relative_eq!(regions[0].rect.width(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(regions[0].rect.height(), 60.0, epsilon = 1e-9);
        assert_relative_eq!(regions[0].area_px, 39.0 * 59.0, epsilon = 1e-9);
    }

    #[test]
    fn nested_contours_are_not_reported() {
        // Dark frame with a dark blob inside its hole.
        let mut img = white_gray(300, 300);
        fill_rect(&mut img, 20, 20, 260, 260, 0);
        fill_rect(&mut img, 40, 40, 220, 220, 255);
        fill_rect(&mut img, 100, 100, 100, 100, 0);
        let regions: Vec<_> = segmenter().segment_gray(&img).collect();
        assert_eq!(regions.len(), 1);
        assert_relative_eq!(regions[0].rect.width(), 260.0, epsilon = 1e-9);
    }

    #[test]
    fn segmentation_is_idempotent() {
        let mut img = white_gray(240, 180);
        fill_rect(&mut img, 30, 30, 70, 50, 10);
        fill_rect(&mut img, 130, 60, 80, 90, 40);
        let seg = segmenter();
        let first: Vec<_> = seg.segment_gray(&img).collect();
        let second: Vec<_> = seg.segment_gray(&img).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn blank_frame_has_no_regions() {
        let frame = RgbImage::from_pixel(64, 48, image::Rgb([255, 255, 255]));
        assert_eq!(segmenter().segment(&frame).count(), 0);
    }
}
