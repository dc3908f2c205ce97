//! Pixel-to-physical scale and dimension conversion.

use crate::geometry::distance;

/// Pixels per physical unit, derived from a marker of known size.
///
/// Always positive and finite. The unit is whatever the marker side length
/// was given in; measurements come back in the same unit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ScaleRatio(f64);

impl ScaleRatio {
    /// Wrap a pixels-per-unit value; `None` unless positive and finite.
    pub fn new(px_per_unit: f64) -> Option<Self> {
        (px_per_unit.is_finite() && px_per_unit > 0.0).then_some(Self(px_per_unit))
    }

    /// Ratio from a measured side length in pixels and the physical side
    /// length of the same edge.
    pub fn from_side_length(side_px: f64, physical_side: f64) -> Option<Self> {
        if !(physical_side.is_finite() && physical_side > 0.0) {
            return None;
        }
        Self::new(side_px / physical_side)
    }

    pub fn px_per_unit(self) -> f64 {
        self.0
    }

    /// Convert a pixel length to physical units.
    pub fn to_physical(self, px: f64) -> f64 {
        px / self.0
    }
}

impl std::fmt::Display for ScaleRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3} px/unit", self.0)
    }
}

/// Physical width and height of a region.
///
/// `calibrated == false` marks the zero-size placeholder reported while no
/// marker has ever been observed; it never describes a real object.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhysicalSize {
    pub width: f64,
    pub height: f64,
    pub calibrated: bool,
}

impl PhysicalSize {
    pub const UNCALIBRATED: Self = Self {
        width: 0.0,
        height: 0.0,
        calibrated: false,
    };
}

/// Convert pixel dimensions with the current ratio; `(0, 0)` and
/// `calibrated = false` when no ratio is known yet.
pub fn to_physical_dimensions(
    pixel_width: f64,
    pixel_height: f64,
    scale: Option<ScaleRatio>,
) -> PhysicalSize {
    match scale {
        Some(ratio) => PhysicalSize {
            width: ratio.to_physical(pixel_width),
            height: ratio.to_physical(pixel_height),
            calibrated: true,
        },
        None => PhysicalSize::UNCALIBRATED,
    }
}

/// Mean of the four edge lengths c0–c1, c1–c2, c2–c3, c3–c0.
pub fn side_length_from_corners(corners: &[[f64; 2]; 4]) -> f64 {
    let sum: f64 = (0..4)
        .map(|i| distance(corners[i], corners[(i + 1) % 4]))
        .sum();
    sum / 4.0
}
