//! markmeasure: single-camera object dimensioning against a printed marker.
//!
//! A square fiducial marker of known physical side length fixes the image
//! scale; dark objects on a lighter background are segmented and their
//! minimum-area rectangles converted to physical width and height.
//!
//! Per frame:
//!
//! 1. **Calibrate** – detect markers, keep the expected id, mean side length
//!    in pixels divided by the physical side gives pixels per unit.
//! 2. **Segment** – inverse adaptive threshold, external contours, area gate.
//! 3. **Convert** – rectangle sides divided by the current ratio. The ratio
//!    persists across frames where the marker is not visible.
//!
//! # Public API
//! - [`Measurer`] and [`MeasureConfig`] as primary entry points
//! - [`ScaleCalibrator`], [`ObjectSegmenter`] and [`to_physical_dimensions`]
//!   for using the stages on their own
//! - [`marker`] for the built-in ArUco-style dictionary and detector

mod api;
mod calibrate;
mod config;
pub mod geometry;
mod homography;
pub mod marker;
mod overlay;
mod scale;
mod segment;
#[cfg(test)]
pub(crate) mod test_utils;
mod threshold;

pub use api::{FrameReport, MarkerStatus, Measurer, ObjectMeasurement};
pub use calibrate::{CalibrationAttempt, MarkerObservation, ScaleCalibrator};
pub use config::{CalibrationConfig, ConfigError, DuplicateMarkerPolicy, MeasureConfig, SegmentConfig};
pub use geometry::RotatedRect;
pub use marker::{ArucoConfig, ArucoDetector, DetectedMarker, FiducialDetector, MarkerDictionary};
pub use overlay::{draw_overlay, MARKER_COLOR, OBJECT_COLOR, UNCALIBRATED_COLOR};
pub use scale::{side_length_from_corners, to_physical_dimensions, PhysicalSize, ScaleRatio};
pub use segment::{ObjectSegmenter, Regions, SegmentedRegion};
pub use threshold::adaptive_threshold_inv;
