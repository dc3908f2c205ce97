//! Cell-grid sampling and binarization of a candidate marker quad.
//!
//! The quad (pixel-edge corners, clockwise on screen) is mapped from the
//! canonical `(bits + 2) × (bits + 2)` cell grid with a DLT homography. Each
//! cell is averaged over a few interior samples, the cell intensities are
//! split by an iterative two-means threshold, and the outer ring of cells
//! must read black before the inner bits are packed into a word.

use image::GrayImage;

use crate::homography::{project, square_to_quad};

/// Configuration for cell sampling and binarization.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CellDecodeConfig {
    /// Samples per cell along each axis (`n²` bilinear samples per cell).
    pub samples_per_cell: u32,
    /// Fraction of the cell ignored on each side when sampling.
    pub cell_margin: f64,
    /// Minimum `max - min` of cell intensities, in grey levels.
    pub min_contrast: f64,
    /// Maximum fraction of border cells allowed to read white.
    pub max_border_error_rate: f64,
    /// Maximum iterations for the two-means threshold.
    pub threshold_max_iters: usize,
    /// Stop when the threshold moves by at most this many grey levels.
    pub threshold_convergence_eps: f64,
}

impl CellDecodeConfig {
    pub const DEFAULT_SAMPLES_PER_CELL: u32 = 3;
    pub const DEFAULT_CELL_MARGIN: f64 = 0.2;
    pub const DEFAULT_MIN_CONTRAST: f64 = 20.0;
    pub const DEFAULT_MAX_BORDER_ERROR_RATE: f64 = 0.35;
    pub const DEFAULT_THRESHOLD_MAX_ITERS: usize = 10;
    pub const DEFAULT_THRESHOLD_CONVERGENCE_EPS: f64 = 1e-3;
}

impl Default for CellDecodeConfig {
    fn default() -> Self {
        Self {
            samples_per_cell: Self::DEFAULT_SAMPLES_PER_CELL,
            cell_margin: Self::DEFAULT_CELL_MARGIN,
            min_contrast: Self::DEFAULT_MIN_CONTRAST,
            max_border_error_rate: Self::DEFAULT_MAX_BORDER_ERROR_RATE,
            threshold_max_iters: Self::DEFAULT_THRESHOLD_MAX_ITERS,
            threshold_convergence_eps: Self::DEFAULT_THRESHOLD_CONVERGENCE_EPS,
        }
    }
}

/// Stable reject code for a candidate that did not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellRejectReason {
    DegenerateQuad,
    OutOfBounds,
    LowContrast,
    BorderNotBlack,
    NoDictionaryMatch,
}

impl CellRejectReason {
    pub const fn code(self) -> &'static str {
        match self {
            Self::DegenerateQuad => "degenerate_quad",
            Self::OutOfBounds => "out_of_bounds",
            Self::LowContrast => "low_contrast",
            Self::BorderNotBlack => "border_not_black",
            Self::NoDictionaryMatch => "no_dictionary_match",
        }
    }
}

impl std::fmt::Display for CellRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Binarized cell grid of one candidate.
#[derive(Debug, Clone)]
pub struct CellGrid {
    /// Cells per side including the border ring.
    pub cells_per_side: u32,
    /// Mean intensity per cell, row-major, grey levels.
    pub intensities: Vec<f64>,
    pub threshold: f64,
    /// Inner `bits × bits` cells, row-major, MSB first, 1 = white.
    pub word: u64,
    /// Border cells that read white.
    pub border_errors: u32,
}

/// Sample a grayscale image at a sub-pixel position (pixel-centre
/// coordinates) using bilinear interpolation. Returns grey levels, or `None`
/// outside the image.
#[inline]
pub fn bilinear_sample(img: &GrayImage, x: f64, y: f64) -> Option<f64> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || !x.is_finite() || !y.is_finite() {
        return None;
    }
    let max_x = (w - 1) as f64;
    let max_y = (h - 1) as f64;
    // Allow the outer half pixel, clamped onto the last row/column.
    if x < -0.5 || y < -0.5 || x > max_x + 0.5 || y > max_y + 0.5 {
        return None;
    }
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p = |px: u32, py: u32| f64::from(img.get_pixel(px, py)[0]);
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    Some(top * (1.0 - fy) + bottom * fy)
}

/// Split values into dark and bright groups via 1D Lloyd updates and return
/// the midpoint between the group means.
pub fn iterative_two_means_threshold(values: &[f64], max_iters: usize, convergence_eps: f64) -> f64 {
    let (min_v, max_v) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !min_v.is_finite() {
        return 0.0;
    }
    let mut threshold = 0.5 * (min_v + max_v);
    let eps = if convergence_eps.is_finite() {
        convergence_eps.abs()
    } else {
        CellDecodeConfig::DEFAULT_THRESHOLD_CONVERGENCE_EPS
    };

    for _ in 0..max_iters {
        let (mut sum_lo, mut cnt_lo) = (0.0f64, 0u32);
        let (mut sum_hi, mut cnt_hi) = (0.0f64, 0u32);
        for &v in values {
            if v <= threshold {
                sum_lo += v;
                cnt_lo += 1;
            } else {
                sum_hi += v;
                cnt_hi += 1;
            }
        }
        if cnt_lo == 0 || cnt_hi == 0 {
            break;
        }
        let new_threshold = 0.5 * (sum_lo / f64::from(cnt_lo) + sum_hi / f64::from(cnt_hi));
        let converged = (new_threshold - threshold).abs() <= eps;
        threshold = new_threshold;
        if converged {
            break;
        }
    }
    threshold
}

/// Mean intensity of every cell of a `cells_per_side²` grid spanning `quad`.
pub fn sample_cells(
    gray: &GrayImage,
    quad: &[[f64; 2]; 4],
    cells_per_side: u32,
    config: &CellDecodeConfig,
) -> Result<Vec<f64>, CellRejectReason> {
    let h = square_to_quad(f64::from(cells_per_side), quad)
        .map_err(|_| CellRejectReason::DegenerateQuad)?;

    let n = config.samples_per_cell.max(1);
    let margin = config.cell_margin.clamp(0.0, 0.45);
    let span = 1.0 - 2.0 * margin;
    let offsets: Vec<f64> = (0..n)
        .map(|s| margin + span * (f64::from(s) + 0.5) / f64::from(n))
        .collect();

    let mut intensities = Vec::with_capacity((cells_per_side * cells_per_side) as usize);
    for row in 0..cells_per_side {
        for col in 0..cells_per_side {
            let mut sum = 0.0;
            for &dv in &offsets {
                for &du in &offsets {
                    let p = project(&h, f64::from(col) + du, f64::from(row) + dv);
                    sum += bilinear_sample(gray, p[0], p[1]).ok_or(CellRejectReason::OutOfBounds)?;
                }
            }
            intensities.push(sum / f64::from(n * n));
        }
    }
    Ok(intensities)
}

/// Sample, binarize and check the border of a marker candidate with
/// `bits × bits` data cells.
pub fn read_cell_grid(
    gray: &GrayImage,
    quad: &[[f64; 2]; 4],
    bits: u32,
    config: &CellDecodeConfig,
) -> Result<CellGrid, CellRejectReason> {
    let cells_per_side = bits + 2;
    let intensities = sample_cells(gray, quad, cells_per_side, config)?;

    let (min_v, max_v) = intensities
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max_v - min_v < config.min_contrast {
        return Err(CellRejectReason::LowContrast);
    }

    let threshold = iterative_two_means_threshold(
        &intensities,
        config.threshold_max_iters,
        config.threshold_convergence_eps,
    );

    let last = cells_per_side - 1;
    let mut border_errors = 0u32;
    let mut word = 0u64;
    for row in 0..cells_per_side {
        for col in 0..cells_per_side {
            let white = intensities[(row * cells_per_side + col) as usize] > threshold;
            let on_border = row == 0 || col == 0 || row == last || col == last;
            if on_border {
                border_errors += u32::from(white);
            } else {
                word = (word << 1) | u64::from(white);
            }
        }
    }

    let border_cells = 4 * (cells_per_side - 1);
    if f64::from(border_errors) > config.max_border_error_rate * f64::from(border_cells) {
        return Err(CellRejectReason::BorderNotBlack);
    }

    Ok(CellGrid {
        cells_per_side,
        intensities,
        threshold,
        word,
        border_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::dictionary::MarkerDictionary;
    use crate::marker::render::render_marker_with_quiet_zone;
    use approx::assert_relative_eq;
    use image::Luma;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = GrayImage::from_fn(2, 2, |x, _| Luma([if x == 0 { 0 } else { 200 }]));
        assert_relative_eq!(bilinear_sample(&img, 0.5, 0.5).unwrap(), 100.0);
        assert_relative_eq!(bilinear_sample(&img, 0.25, 0.0).unwrap(), 50.0);
        assert_relative_eq!(bilinear_sample(&img, -0.5, 1.0).unwrap(), 0.0);
        assert!(bilinear_sample(&img, -0.6, 0.0).is_none());
        assert!(bilinear_sample(&img, 0.0, 1.6).is_none());
    }

    #[test]
    fn two_means_separates_bimodal_values() {
        let values = [10.0, 12.0, 15.0, 200.0, 210.0, 190.0, 14.0];
        let t = iterative_two_means_threshold(&values, 10, 1e-6);
        assert!(t > 15.0 && t < 190.0);
        let dark_mean = (10.0 + 12.0 + 15.0 + 14.0) / 4.0;
        assert_relative_eq!(t, 0.5 * (dark_mean + 200.0), epsilon = 1e-9);

        // Constant input stays at its value.
        assert_relative_eq!(iterative_two_means_threshold(&[7.0; 5], 10, 1e-6), 7.0);
    }

    #[test]
    fn reads_back_a_rendered_marker() {
        let dict = MarkerDictionary::aruco_4x4();
        let img = render_marker_with_quiet_zone(&dict, 3, 120, 20).unwrap();
        let quad = [[19.5, 19.5], [139.5, 19.5], [139.5, 139.5], [19.5, 139.5]];
        let grid = read_cell_grid(&img, &quad, 4, &CellDecodeConfig::default()).unwrap();
        assert_eq!(grid.cells_per_side, 6);
        assert_eq!(grid.border_errors, 0);
        assert_eq!(grid.word, dict.codeword(3).unwrap());
    }

    #[test]
    fn rejects_uniform_quads() {
        let img = GrayImage::from_pixel(100, 100, Luma([30]));
        let quad = [[10.0, 10.0], [80.0, 10.0], [80.0, 80.0], [10.0, 80.0]];
        assert_eq!(
            read_cell_grid(&img, &quad, 4, &CellDecodeConfig::default()).unwrap_err(),
            CellRejectReason::LowContrast
        );
    }

    #[test]
    fn rejects_white_border() {
        // Dark square with a bright frame: the border ring reads white.
        let mut img = GrayImage::from_pixel(80, 80, Luma([240]));
        for y in 30..50 {
            for x in 30..50 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
        let quad = [[9.5, 9.5], [69.5, 9.5], [69.5, 69.5], [9.5, 69.5]];
        assert_eq!(
            read_cell_grid(&img, &quad, 4, &CellDecodeConfig::default()).unwrap_err(),
            CellRejectReason::BorderNotBlack
        );
    }

    #[test]
    fn rejects_quads_leaving_the_image() {
        let img = GrayImage::from_pixel(50, 50, Luma([128]));
        let quad = [[-20.0, -20.0], [40.0, -20.0], [40.0, 40.0], [-20.0, 40.0]];
        assert_eq!(
            sample_cells(&img, &quad, 6, &CellDecodeConfig::default()).unwrap_err(),
            CellRejectReason::OutOfBounds
        );
    }
}
