//! Square fiducial markers: dictionary, rendering, detection and decoding.

pub mod decode;
pub mod detect;
pub mod dictionary;
pub mod render;

use image::GrayImage;

pub use decode::{CellDecodeConfig, CellRejectReason};
pub use detect::{ArucoConfig, ArucoDetector, MarkerCandidate};
pub use dictionary::{DictionaryError, DictionaryMatch, DictionarySpec, MarkerDictionary};
pub use render::{render_marker, render_marker_with_quiet_zone};

/// A decoded marker in image coordinates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectedMarker {
    /// Dictionary id.
    pub id: usize,
    /// Outer corners at pixel edges, clockwise on screen, corner 0 at the
    /// marker's canonical top-left.
    pub corners: [[f64; 2]; 4],
    /// Bit errors corrected while matching.
    pub hamming: u8,
    /// Clockwise quarter turns of the marker relative to its upright pose.
    pub rotation: u8,
}

/// Source of marker detections for one grayscale frame.
///
/// Detections are returned in a deterministic order and
/// [`DuplicateMarkerPolicy::FirstDetected`](crate::DuplicateMarkerPolicy)
/// relies on it. [`ArucoDetector`] reports markers in discovery order, so the
/// topmost marker comes first regardless of size.
pub trait FiducialDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<DetectedMarker>;
}
