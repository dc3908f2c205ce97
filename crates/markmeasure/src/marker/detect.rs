//! Built-in square marker detector.
//!
//! Pipeline per frame:
//! 1. inverse adaptive threshold for each configured window size,
//! 2. outer contours, perimeter gate relative to the larger image side,
//! 3. Douglas–Peucker to exactly four convex corners, clockwise,
//! 4. near-duplicate merge across window sizes,
//! 5. cell-grid decode and dictionary match with rotation.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};

use super::decode::{read_cell_grid, CellDecodeConfig, CellRejectReason};
use super::dictionary::MarkerDictionary;
use super::{DetectedMarker, FiducialDetector};
use crate::geometry::{
    approximate_polygon, arc_length, distance, is_convex, offset_quad, signed_area,
};
use crate::threshold::adaptive_threshold_inv;

/// Detector configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ArucoConfig {
    /// Window sizes (odd, pixels) for the adaptive threshold passes.
    pub threshold_windows: Vec<u32>,
    /// Grey levels below the local mean a pixel must be to count as dark.
    pub threshold_bias: f64,
    /// Minimum contour perimeter as a fraction of the larger image side.
    pub min_perimeter_rate: f64,
    /// Maximum contour perimeter as a fraction of the larger image side.
    pub max_perimeter_rate: f64,
    /// Douglas–Peucker epsilon as a fraction of the contour perimeter.
    pub polygon_accuracy_rate: f64,
    /// Minimum distance between quad corners as a fraction of its perimeter.
    pub min_corner_distance_rate: f64,
    /// Minimum distance of every corner from the image border, pixels.
    pub min_distance_to_border: f64,
    /// Candidates whose mean corner distance is below this fraction of the
    /// perimeter are merged.
    pub duplicate_distance_rate: f64,
    /// Maximum bit errors corrected during dictionary matching.
    pub max_correction_bits: u8,
    pub decode: CellDecodeConfig,
}

impl ArucoConfig {
    pub const DEFAULT_THRESHOLD_WINDOWS: [u32; 3] = [7, 13, 23];
    pub const DEFAULT_THRESHOLD_BIAS: f64 = 7.0;
    pub const DEFAULT_MIN_PERIMETER_RATE: f64 = 0.03;
    pub const DEFAULT_MAX_PERIMETER_RATE: f64 = 4.0;
    pub const DEFAULT_POLYGON_ACCURACY_RATE: f64 = 0.03;
    pub const DEFAULT_MIN_CORNER_DISTANCE_RATE: f64 = 0.05;
    pub const DEFAULT_MIN_DISTANCE_TO_BORDER: f64 = 3.0;
    pub const DEFAULT_DUPLICATE_DISTANCE_RATE: f64 = 0.05;
    pub const DEFAULT_MAX_CORRECTION_BITS: u8 = 1;
}

impl Default for ArucoConfig {
    fn default() -> Self {
        Self {
            threshold_windows: Self::DEFAULT_THRESHOLD_WINDOWS.to_vec(),
            threshold_bias: Self::DEFAULT_THRESHOLD_BIAS,
            min_perimeter_rate: Self::DEFAULT_MIN_PERIMETER_RATE,
            max_perimeter_rate: Self::DEFAULT_MAX_PERIMETER_RATE,
            polygon_accuracy_rate: Self::DEFAULT_POLYGON_ACCURACY_RATE,
            min_corner_distance_rate: Self::DEFAULT_MIN_CORNER_DISTANCE_RATE,
            min_distance_to_border: Self::DEFAULT_MIN_DISTANCE_TO_BORDER,
            duplicate_distance_rate: Self::DEFAULT_DUPLICATE_DISTANCE_RATE,
            max_correction_bits: Self::DEFAULT_MAX_CORRECTION_BITS,
            decode: CellDecodeConfig::default(),
        }
    }
}

/// Quad that passed the geometric gates but has not been decoded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerCandidate {
    /// Corners at pixel edges, clockwise on screen.
    pub corners: [[f64; 2]; 4],
    /// Perimeter of the traced contour, pixels.
    pub perimeter: f64,
    /// Threshold window that produced the candidate.
    pub window: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ArucoDetector {
    dictionary: MarkerDictionary,
    config: ArucoConfig,
}

impl ArucoDetector {
    pub fn new(dictionary: MarkerDictionary, config: ArucoConfig) -> Self {
        Self { dictionary, config }
    }

    pub fn with_config(config: ArucoConfig) -> Self {
        Self::new(MarkerDictionary::default(), config)
    }

    pub fn dictionary(&self) -> &MarkerDictionary {
        &self.dictionary
    }

    pub fn config(&self) -> &ArucoConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ArucoConfig {
        &mut self.config
    }

    /// Geometric candidates after duplicate merging, in discovery order:
    /// window by window, then by the raster position of each contour's
    /// topmost-leftmost pixel.
    pub fn candidates(&self, gray: &GrayImage) -> Vec<MarkerCandidate> {
        let (w, h) = gray.dimensions();
        let max_dim = f64::from(w.max(h));
        let min_perimeter = self.config.min_perimeter_rate * max_dim;
        let max_perimeter = self.config.max_perimeter_rate * max_dim;

        let mut candidates = Vec::new();
        for &window in &self.config.threshold_windows {
            let binary = adaptive_threshold_inv(gray, window, self.config.threshold_bias);
            let contours = find_contours::<i32>(&binary);
            let before = candidates.len();
            for contour in contours {
                if contour.border_type != BorderType::Outer || contour.points.len() < 4 {
                    continue;
                }
                let points: Vec<[f64; 2]> = contour
                    .points
                    .iter()
                    .map(|p| [f64::from(p.x), f64::from(p.y)])
                    .collect();
                let perimeter = arc_length(&points, true);
                if perimeter < min_perimeter || perimeter > max_perimeter {
                    continue;
                }
                if let Some(corners) = self.quad_from_contour(&points, perimeter, w, h) {
                    candidates.push(MarkerCandidate {
                        corners,
                        perimeter,
                        window,
                    });
                }
            }
            tracing::trace!(window, quads = candidates.len() - before, "threshold pass");
        }

        merge_near_duplicates(candidates, self.config.duplicate_distance_rate)
    }

    fn quad_from_contour(
        &self,
        points: &[[f64; 2]],
        perimeter: f64,
        width: u32,
        height: u32,
    ) -> Option<[[f64; 2]; 4]> {
        let poly = approximate_polygon(
            points,
            self.config.polygon_accuracy_rate * perimeter,
            true,
        );
        if poly.len() != 4 || !is_convex(&poly) {
            return None;
        }
        let mut quad = [poly[0], poly[1], poly[2], poly[3]];

        let min_corner = self.config.min_corner_distance_rate * arc_length(&quad, true);
        for i in 0..4 {
            for j in (i + 1)..4 {
                if distance(quad[i], quad[j]) < min_corner {
                    return None;
                }
            }
        }

        let margin = self.config.min_distance_to_border;
        let (max_x, max_y) = (f64::from(width) - 1.0 - margin, f64::from(height) - 1.0 - margin);
        if quad
            .iter()
            .any(|p| p[0] < margin || p[1] < margin || p[0] > max_x || p[1] > max_y)
        {
            return None;
        }

        if signed_area(&quad) < 0.0 {
            quad.swap(1, 3);
        }
        // Start at the corner nearest the image origin.
        let first = (0..4)
            .min_by(|&a, &b| (quad[a][0] + quad[a][1]).total_cmp(&(quad[b][0] + quad[b][1])))
            .unwrap_or(0);
        quad.rotate_left(first);
        offset_quad(&quad, 0.5)
    }

    /// Decode one candidate against the dictionary.
    pub fn decode_candidate(
        &self,
        gray: &GrayImage,
        candidate: &MarkerCandidate,
    ) -> Result<DetectedMarker, CellRejectReason> {
        let grid = read_cell_grid(
            gray,
            &candidate.corners,
            self.dictionary.bits_per_side(),
            &self.config.decode,
        )?;
        let m = self
            .dictionary
            .identify(grid.word, self.config.max_correction_bits)
            .ok_or(CellRejectReason::NoDictionaryMatch)?;

        let mut corners = candidate.corners;
        corners.rotate_left(usize::from(m.rotation));
        Ok(DetectedMarker {
            id: m.id,
            corners,
            hamming: m.distance,
            rotation: m.rotation,
        })
    }

    /// Detect and decode all markers in a grayscale frame.
    pub fn detect_markers(&self, gray: &GrayImage) -> Vec<DetectedMarker> {
        let candidates = self.candidates(gray);
        let mut markers = Vec::new();
        for candidate in &candidates {
            match self.decode_candidate(gray, candidate) {
                Ok(marker) => markers.push(marker),
                Err(reason) => tracing::trace!(
                    reason = reason.code(),
                    perimeter = candidate.perimeter,
                    "candidate rejected"
                ),
            }
        }
        tracing::debug!(
            candidates = candidates.len(),
            markers = markers.len(),
            "marker detection"
        );
        markers
    }
}

impl FiducialDetector for ArucoDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<DetectedMarker> {
        self.detect_markers(gray)
    }
}

/// Mean corner distance under the best cyclic alignment of `b` onto `a`.
fn quad_distance(a: &[[f64; 2]; 4], b: &[[f64; 2]; 4]) -> f64 {
    (0..4)
        .map(|shift| {
            (0..4)
                .map(|i| distance(a[i], b[(i + shift) % 4]))
                .sum::<f64>()
                / 4.0
        })
        .fold(f64::INFINITY, f64::min)
}

/// Collapse candidates that outline the same quad. The larger one survives
/// and takes the slot of the first one seen.
fn merge_near_duplicates(candidates: Vec<MarkerCandidate>, rate: f64) -> Vec<MarkerCandidate> {
    let mut kept: Vec<MarkerCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let duplicate = kept.iter().position(|k| {
            let scale = k.perimeter.max(candidate.perimeter);
            quad_distance(&k.corners, &candidate.corners) < rate * scale
        });
        match duplicate {
            Some(i) if candidate.perimeter > kept[i].perimeter => kept[i] = candidate,
            Some(_) => {}
            None => kept.push(candidate),
        }
    }
    kept
}
