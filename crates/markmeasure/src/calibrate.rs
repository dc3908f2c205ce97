//! Scale calibration from a reference marker of known physical size.

use image::{GrayImage, RgbImage};

use crate::config::{CalibrationConfig, DuplicateMarkerPolicy};
use crate::marker::{ArucoDetector, DetectedMarker, FiducialDetector};
use crate::scale::{side_length_from_corners, ScaleRatio};

/// The reference marker as seen in one frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarkerObservation {
    pub id: usize,
    /// Outer corners, clockwise on screen, corner 0 at the canonical top-left.
    pub corners: [[f64; 2]; 4],
    /// Mean of the four edge lengths, pixels.
    pub side_length_px: f64,
    pub scale: ScaleRatio,
}

/// Outcome of looking for the reference marker in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationAttempt {
    /// Markers of any id decoded in the frame.
    pub markers_seen: usize,
    /// Markers carrying the expected id.
    pub matching: usize,
    pub observation: Option<MarkerObservation>,
}

/// Finds the reference marker and turns its side length into a
/// [`ScaleRatio`].
#[derive(Debug, Clone)]
pub struct ScaleCalibrator<D = ArucoDetector> {
    detector: D,
    config: CalibrationConfig,
}

impl ScaleCalibrator<ArucoDetector> {
    pub fn new(config: CalibrationConfig) -> Self {
        Self::with_detector(ArucoDetector::default(), config)
    }
}

impl<D: FiducialDetector> ScaleCalibrator<D> {
    pub fn with_detector(detector: D, config: CalibrationConfig) -> Self {
        Self { detector, config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CalibrationConfig {
        &mut self.config
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Look for the expected marker; `None` when it is not visible.
    pub fn calibrate(&self, frame: &RgbImage) -> Option<MarkerObservation> {
        self.attempt(&image::imageops::grayscale(frame)).observation
    }

    /// Pixels per physical unit from the expected marker, if visible.
    pub fn calibrate_ratio(&self, frame: &RgbImage) -> Option<ScaleRatio> {
        self.calibrate(frame).map(|obs| obs.scale)
    }

    /// Full calibration attempt on a grayscale frame.
    pub fn attempt(&self, gray: &GrayImage) -> CalibrationAttempt {
        let markers = self.detector.detect(gray);
        let expected = self.config.expected_id;
        let matching: Vec<&DetectedMarker> = markers.iter().filter(|m| m.id == expected).collect();

        if matching.len() > 1 {
            tracing::warn!(
                id = expected,
                count = matching.len(),
                policy = ?self.config.duplicate_policy,
                "expected marker id detected more than once"
            );
        }

        let selected = match self.config.duplicate_policy {
            DuplicateMarkerPolicy::FirstDetected => matching.first().copied(),
            DuplicateMarkerPolicy::Largest => matching.iter().copied().max_by(|a, b| {
                side_length_from_corners(&a.corners).total_cmp(&side_length_from_corners(&b.corners))
            }),
        };

        let observation = selected.and_then(|marker| {
            let side_length_px = side_length_from_corners(&marker.corners);
            let scale = ScaleRatio::from_side_length(side_length_px, self.config.side_length)?;
            Some(MarkerObservation {
                id: marker.id,
                corners: marker.corners,
                side_length_px,
                scale,
            })
        });

        CalibrationAttempt {
            markers_seen: markers.len(),
            matching: matching.len(),
            observation,
        }
    }
}
