//! High-level measurement API.
//!
//! [`Measurer`] owns the scale ratio and runs calibration, segmentation and
//! conversion for each frame. Create once, feed frames in capture order.
//!
//! # Examples
//!
//! ```no_run
//! use markmeasure::{MeasureConfig, Measurer};
//!
//! let mut measurer = Measurer::new(MeasureConfig::default()).unwrap();
//! let frame = image::open("frame.png").unwrap().to_rgb8();
//! let report = measurer.process_frame(&frame);
//! for object in &report.objects {
//!     println!("{:.2} x {:.2}", object.size.width, object.size.height);
//! }
//! ```

use image::RgbImage;

use crate::calibrate::{MarkerObservation, ScaleCalibrator};
use crate::config::{ConfigError, MeasureConfig};
use crate::geometry::RotatedRect;
use crate::marker::{ArucoDetector, FiducialDetector};
use crate::scale::{to_physical_dimensions, PhysicalSize, ScaleRatio};
use crate::segment::ObjectSegmenter;

/// Reference marker state for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerStatus {
    /// The expected marker was found.
    Detected { id: usize },
    /// Markers were found, none with the expected id.
    WrongId,
    /// No marker of any id was found.
    NotDetected,
}

impl std::fmt::Display for MarkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detected { id } => write!(f, "Marker OK (ID {})", id),
            Self::WrongId => f.write_str("No marker"),
            Self::NotDetected => f.write_str("Marker not detected"),
        }
    }
}

/// One segmented object with its physical size.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectMeasurement {
    pub rect: RotatedRect,
    pub area_px: f64,
    pub size: PhysicalSize,
}

/// Everything measured in one frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameReport {
    /// Zero-based index in processing order.
    pub frame_index: u64,
    pub marker: MarkerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<MarkerObservation>,
    /// Ratio used for this frame's conversions.
    pub scale: Option<ScaleRatio>,
    /// `true` when `scale` came from this frame's marker.
    pub scale_fresh: bool,
    pub objects: Vec<ObjectMeasurement>,
}

impl FrameReport {
    pub fn is_calibrated(&self) -> bool {
        self.scale.is_some()
    }
}

/// Per-frame measurement pipeline with a persistent scale ratio.
///
/// The ratio starts unknown, is replaced on every frame where the expected
/// marker is seen, and otherwise keeps its last value.
pub struct Measurer<D = ArucoDetector> {
    calibrator: ScaleCalibrator<D>,
    segmenter: ObjectSegmenter,
    scale: Option<ScaleRatio>,
    frames_processed: u64,
}

impl Measurer<ArucoDetector> {
    /// Build the default pipeline from a validated configuration.
    pub fn new(config: MeasureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = ArucoDetector::new(config.marker_dictionary()?, config.detector);
        Ok(Self::with_parts(
            ScaleCalibrator::with_detector(detector, config.calibration),
            ObjectSegmenter::new(config.segment),
        ))
    }
}

impl<D: FiducialDetector> Measurer<D> {
    pub fn with_parts(calibrator: ScaleCalibrator<D>, segmenter: ObjectSegmenter) -> Self {
        Self {
            calibrator,
            segmenter,
            scale: None,
            frames_processed: 0,
        }
    }

    pub fn calibrator(&self) -> &ScaleCalibrator<D> {
        &self.calibrator
    }

    pub fn calibrator_mut(&mut self) -> &mut ScaleCalibrator<D> {
        &mut self.calibrator
    }

    pub fn segmenter(&self) -> &ObjectSegmenter {
        &self.segmenter
    }

    pub fn segmenter_mut(&mut self) -> &mut ObjectSegmenter {
        &mut self.segmenter
    }

    /// Ratio currently in effect.
    pub fn scale_ratio(&self) -> Option<ScaleRatio> {
        self.scale
    }

    /// Inject a ratio, e.g. from an earlier session.
    pub fn set_scale_ratio(&mut self, scale: Option<ScaleRatio>) {
        self.scale = scale;
    }

    /// Forget the ratio; measurements read zero until the marker is seen.
    pub fn reset_calibration(&mut self) {
        self.scale = None;
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Calibrate, segment and convert one frame.
    pub fn process_frame(&mut self, frame: &RgbImage) -> FrameReport {
        let frame_index = self.frames_processed;
        self.frames_processed += 1;

        let gray = image::imageops::grayscale(frame);
        let attempt = self.calibrator.attempt(&gray);
        let marker = match (&attempt.observation, attempt.markers_seen) {
            (Some(obs), _) => MarkerStatus::Detected { id: obs.id },
            (None, 0) => MarkerStatus::NotDetected,
            (None, _) => MarkerStatus::WrongId,
        };

        let scale_fresh = attempt.observation.is_some();
        if let Some(obs) = &attempt.observation {
            self.scale = Some(obs.scale);
        }

        let objects: Vec<ObjectMeasurement> = self
            .segmenter
            .segment_gray(&gray)
            .map(|region| ObjectMeasurement {
                size: to_physical_dimensions(region.rect.width(), region.rect.height(), self.scale),
                rect: region.rect,
                area_px: region.area_px,
            })
            .collect();

        tracing::debug!(
            frame = frame_index,
            marker = %marker,
            scale = ?self.scale.map(ScaleRatio::px_per_unit),
            fresh = scale_fresh,
            objects = objects.len(),
            "frame processed"
        );

        FrameReport {
            frame_index,
            marker,
            observation: attempt.observation,
            scale: self.scale,
            scale_fresh,
            objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CalibrationConfig, SegmentConfig};
    use crate::marker::DetectedMarker;
    use crate::test_utils::{fill_rect_rgb, white_frame};
    use approx::assert_relative_eq;
    use image::GrayImage;
    use std::cell::RefCell;

    /// Replays one scripted detection list per call.
    struct ScriptedDetector(RefCell<Vec<Vec<DetectedMarker>>>);

    impl FiducialDetector for ScriptedDetector {
        fn detect(&self, _gray: &GrayImage) -> Vec<DetectedMarker> {
            let mut script = self.0.borrow_mut();
            if script.is_empty() {
                Vec::new()
            } else {
                script.remove(0)
            }
        }
    }

    fn square(id: usize, side: f64) -> DetectedMarker {
        DetectedMarker {
            id,
            corners: [[0.0, 0.0], [side, 0.0], [side, side], [0.0, side]],
            hamming: 0,
            rotation: 0,
        }
    }

    fn scripted(script: Vec<Vec<DetectedMarker>>) -> Measurer<ScriptedDetector> {
        Measurer::with_parts(
            ScaleCalibrator::with_detector(
                ScriptedDetector(RefCell::new(script)),
                CalibrationConfig::default(),
            ),
            ObjectSegmenter::new(SegmentConfig::default()),
        )
    }

    fn scene() -> RgbImage {
        let mut frame = white_frame(200, 200);
        fill_rect_rgb(&mut frame, 50, 50, 40, 60, [0, 0, 0]);
        frame
    }

    #[test]
    fn uncalibrated_frames_report_zero_sizes() {
        let mut m = scripted(vec![]);
        let report = m.process_frame(&scene());
        assert_eq!(report.marker, MarkerStatus::NotDetected);
        assert!(!report.is_calibrated());
        assert_eq!(report.objects.len(), 1);
        assert_eq!(report.objects[0].size, PhysicalSize::UNCALIBRATED);
    }

    #[test]
    fn ratio_persists_across_frames_without_marker() {
        let mut m = scripted(vec![vec![square(0, 100.0)], vec![], vec![square(3, 50.0)]]);
        let frame = scene();

        let first = m.process_frame(&frame);
        assert_eq!(first.marker, MarkerStatus::Detected { id: 0 });
        assert!(first.scale_fresh);
        assert_eq!(m.scale_ratio(), ScaleRatio::new(20.0));
        assert_relative_eq!(first.objects[0].size.width, 2.0, epsilon = 1e-9);
        assert_relative_eq!(first.objects[0].size.height, 3.0, epsilon = 1e-9);

        let second = m.process_frame(&frame);
        assert_eq!(second.marker, MarkerStatus::NotDetected);
        assert!(!second.scale_fresh);
        assert_eq!(second.scale, ScaleRatio::new(20.0));
        assert_eq!(second.objects, first.objects);

        let third = m.process_frame(&frame);
        assert_eq!(third.marker, MarkerStatus::WrongId);
        assert_eq!(third.scale, ScaleRatio::new(20.0));
        assert_eq!(m.frames_processed(), 3);
        assert_eq!(third.frame_index, 2);
    }

    #[test]
    fn fresh_observation_replaces_ratio() {
        let mut m = scripted(vec![vec![square(0, 100.0)], vec![square(0, 50.0)]]);
        let frame = scene();
        m.process_frame(&frame);
        let report = m.process_frame(&frame);
        assert_eq!(report.scale, ScaleRatio::new(10.0));
        assert_relative_eq!(report.objects[0].size.width, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn ratio_can_be_injected_and_reset() {
        let mut m = scripted(vec![]);
        m.set_scale_ratio(ScaleRatio::new(10.0));
        let report = m.process_frame(&scene());
        assert!(!report.scale_fresh);
        assert_relative_eq!(report.objects[0].size.height, 6.0, epsilon = 1e-9);

        m.reset_calibration();
        assert!(m.scale_ratio().is_none());
        let report = m.process_frame(&scene());
        assert!(!report.objects[0].size.calibrated);
    }

    #[test]
    fn marker_status_messages() {
        assert_eq!(MarkerStatus::WrongId.to_string(), "No marker");
        assert_eq!(MarkerStatus::NotDetected.to_string(), "Marker not detected");
        assert_eq!(MarkerStatus::Detected { id: 4 }.to_string(), "Marker OK (ID 4)");
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = MeasureConfig::default();
        config.segment.block_size = 4;
        assert!(Measurer::new(config).is_err());
    }

    #[test]
    fn report_serializes_to_json() {
        let mut m = scripted(vec![vec![square(0, 100.0)]]);
        let report = m.process_frame(&scene());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["marker"]["kind"], "detected");
        assert_eq!(json["scale"], 20.0);
        assert_eq!(json["objects"][0]["size"]["calibrated"], true);
    }
}
