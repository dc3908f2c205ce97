//! Measurement configuration, JSON loading and validation.

use std::path::Path;

use crate::marker::{ArucoConfig, DictionarySpec, MarkerDictionary};

/// Which detection wins when several markers carry the expected id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMarkerPolicy {
    /// First in detector order. For the built-in detector that is the
    /// marker found first in raster order, not the largest one.
    #[default]
    FirstDetected,
    /// Largest measured side length.
    Largest,
}

/// Reference marker used for scale calibration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Dictionary id of the reference marker.
    pub expected_id: usize,
    /// Physical side length of the printed marker (outer black edge).
    /// Measurements are reported in the same unit.
    pub side_length: f64,
    pub duplicate_policy: DuplicateMarkerPolicy,
}

impl CalibrationConfig {
    pub const DEFAULT_EXPECTED_ID: usize = 0;
    pub const DEFAULT_SIDE_LENGTH: f64 = 5.0;
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            expected_id: Self::DEFAULT_EXPECTED_ID,
            side_length: Self::DEFAULT_SIDE_LENGTH,
            duplicate_policy: DuplicateMarkerPolicy::default(),
        }
    }
}

/// Object segmentation parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Regions with enclosed contour area at or below this are dropped (px²).
    pub min_area_px: f64,
    /// Adaptive threshold window (odd, pixels).
    pub block_size: u32,
    /// Grey levels below the local mean a pixel must be to count as object.
    pub bias: f64,
}

impl SegmentConfig {
    pub const DEFAULT_MIN_AREA_PX: f64 = 2000.0;
    pub const DEFAULT_BLOCK_SIZE: u32 = 19;
    pub const DEFAULT_BIAS: f64 = 5.0;
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_area_px: Self::DEFAULT_MIN_AREA_PX,
            block_size: Self::DEFAULT_BLOCK_SIZE,
            bias: Self::DEFAULT_BIAS,
        }
    }
}

/// Top-level configuration for [`crate::Measurer`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    pub calibration: CalibrationConfig,
    pub segment: SegmentConfig,
    pub detector: ArucoConfig,
    /// Custom marker dictionary; the built-in 4x4 set when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<DictionarySpec>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {}", e),
            Self::Parse(e) => write!(f, "cannot parse config: {}", e),
            Self::Invalid { field, reason } => write!(f, "invalid `{}`: {}", field, reason),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive and finite, got {}", value)))
    }
}

fn require_window(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value >= 3 && value % 2 == 1 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be an odd window of at least 3, got {}", value)))
    }
}

impl MeasureConfig {
    /// Load from a JSON file; missing fields take their defaults. The result
    /// is validated.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Marker dictionary selected by this configuration.
    pub fn marker_dictionary(&self) -> Result<MarkerDictionary, ConfigError> {
        match &self.dictionary {
            Some(spec) => {
                MarkerDictionary::from_spec(spec).map_err(|e| invalid("dictionary", e.to_string()))
            }
            None => Ok(MarkerDictionary::aruco_4x4()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("calibration.side_length", self.calibration.side_length)?;

        let seg = &self.segment;
        if !(seg.min_area_px.is_finite() && seg.min_area_px >= 0.0) {
            return Err(invalid(
                "segment.min_area_px",
                format!("must be non-negative and finite, got {}", seg.min_area_px),
            ));
        }
        require_window("segment.block_size", seg.block_size)?;
        if !seg.bias.is_finite() {
            return Err(invalid("segment.bias", "must be finite"));
        }

        let det = &self.detector;
        if det.threshold_windows.is_empty() {
            return Err(invalid("detector.threshold_windows", "must not be empty"));
        }
        for &w in &det.threshold_windows {
            require_window("detector.threshold_windows", w)?;
        }
        if !det.threshold_bias.is_finite() {
            return Err(invalid("detector.threshold_bias", "must be finite"));
        }
        require_positive("detector.min_perimeter_rate", det.min_perimeter_rate)?;
        require_positive("detector.max_perimeter_rate", det.max_perimeter_rate)?;
        if det.min_perimeter_rate >= det.max_perimeter_rate {
            return Err(invalid(
                "detector.min_perimeter_rate",
                "must be below detector.max_perimeter_rate",
            ));
        }
        require_positive("detector.polygon_accuracy_rate", det.polygon_accuracy_rate)?;
        if !(det.min_distance_to_border.is_finite() && det.min_distance_to_border >= 0.0) {
            return Err(invalid("detector.min_distance_to_border", "must be non-negative"));
        }
        if det.decode.samples_per_cell == 0 {
            return Err(invalid("detector.decode.samples_per_cell", "must be at least 1"));
        }
        if !(0.0..0.5).contains(&det.decode.cell_margin) {
            return Err(invalid("detector.decode.cell_margin", "must lie in [0, 0.5)"));
        }
        if !(0.0..=1.0).contains(&det.decode.max_border_error_rate) {
            return Err(invalid(
                "detector.decode.max_border_error_rate",
                "must lie in [0, 1]",
            ));
        }

        let dict = self.marker_dictionary()?;
        if self.calibration.expected_id >= dict.len() {
            return Err(invalid(
                "calibration.expected_id",
                format!("dictionary has {} ids, got {}", dict.len(), self.calibration.expected_id),
            ));
        }
        Ok(())
    }
}
