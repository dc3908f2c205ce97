//! Square-to-quad projective map for the marker cell grid.
//!
//! With `H[2][2] = 1` the four corner correspondences give an 8×8 linear
//! system, solved directly with an LU decomposition.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HomographyError {
    NonPositiveSide(f64),
    /// Three consecutive corners are collinear or coincide.
    DegenerateQuad,
    Singular,
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveSide(side) => write!(f, "square side must be positive, got {}", side),
            Self::DegenerateQuad => f.write_str("quad has collinear corners"),
            Self::Singular => f.write_str("homography system is singular"),
        }
    }
}

impl std::error::Error for HomographyError {}

/// Map `(x, y)` through `h`. Points on the line at infinity give NaN.
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

fn has_collinear_corners(quad: &[[f64; 2]; 4]) -> bool {
    let extent = quad
        .iter()
        .flat_map(|p| p.iter())
        .fold(1.0f64, |m, v| m.max(v.abs()));
    let eps = 1e-9 * extent * extent;
    (0..4).any(|i| {
        let [a, b, c] = [quad[i], quad[(i + 1) % 4], quad[(i + 2) % 4]];
        let cross = (b[0] - a[0]) * (c[1] - b[1]) - (b[1] - a[1]) * (c[0] - b[0]);
        cross.abs() <= eps
    })
}

/// Homography taking the axis-aligned square `[0, side]²` onto `quad`
/// (corner order: origin, +x, +x+y, +y).
pub fn square_to_quad(side: f64, quad: &[[f64; 2]; 4]) -> Result<Matrix3<f64>, HomographyError> {
    if !(side.is_finite() && side > 0.0) {
        return Err(HomographyError::NonPositiveSide(side));
    }
    if has_collinear_corners(quad) {
        return Err(HomographyError::DegenerateQuad);
    }

    // Solve on the unit square, then rescale the input.
    let unit = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (i, (&[x, y], &[u, v])) in unit.iter().zip(quad).enumerate() {
        let (ru, rv) = (2 * i, 2 * i + 1);
        a[(ru, 0)] = x;
        a[(ru, 1)] = y;
        a[(ru, 2)] = 1.0;
        a[(ru, 6)] = -x * u;
        a[(ru, 7)] = -y * u;
        b[ru] = u;

        a[(rv, 3)] = x;
        a[(rv, 4)] = y;
        a[(rv, 5)] = 1.0;
        a[(rv, 6)] = -x * v;
        a[(rv, 7)] = -y * v;
        b[rv] = v;
    }

    let sol = a.lu().solve(&b).ok_or(HomographyError::Singular)?;
    if sol.iter().any(|v| !v.is_finite()) {
        return Err(HomographyError::Singular);
    }

    #[rustfmt::skip]
    let unit_h = Matrix3::new(
        sol[0], sol[1], sol[2],
        sol[3], sol[4], sol[5],
        sol[6], sol[7], 1.0,
    );
    let inv_side = 1.0 / side;
    Ok(unit_h * Matrix3::new(inv_side, 0.0, 0.0, 0.0, inv_side, 0.0, 0.0, 0.0, 1.0))
}
