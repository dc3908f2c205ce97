//! Planar geometry on traced contours.
//!
//! Contour points are pixel centres in image coordinates (x right, y down).
//! Polygons with positive [`signed_area`] run clockwise on screen.

use std::cmp::Ordering;

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

#[inline]
fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Shoelace area, positive for clockwise-on-screen winding.
pub fn signed_area(points: &[[f64; 2]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        acc += p[0] * q[1] - q[0] * p[1];
    }
    0.5 * acc
}

/// Enclosed area of a closed polygon (shoelace formula).
pub fn polygon_area(points: &[[f64; 2]]) -> f64 {
    signed_area(points).abs()
}

/// Length of a polyline; `closed` adds the segment back to the first point.
pub fn arc_length(points: &[[f64; 2]], closed: bool) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut len: f64 = points.windows(2).map(|w| distance(w[0], w[1])).sum();
    if closed {
        len += distance(points[points.len() - 1], points[0]);
    }
    len
}

/// Arithmetic mean of a point set.
pub fn centroid(points: &[[f64; 2]]) -> Option<[f64; 2]> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let sx: f64 = points.iter().map(|p| p[0]).sum();
    let sy: f64 = points.iter().map(|p| p[1]).sum();
    Some([sx / n, sy / n])
}

/// Convex hull (Andrew's monotone chain), clockwise on screen, without
/// collinear points.
pub fn convex_hull(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| {
        a[0].partial_cmp(&b[0])
            .unwrap_or(Ordering::Equal)
            .then(a[1].partial_cmp(&b[1]).unwrap_or(Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<[f64; 2]> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<[f64; 2]> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Whether a closed polygon is strictly convex (all turns share one sign).
pub fn is_convex(points: &[[f64; 2]]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..n {
        let c = cross(points[i], points[(i + 1) % n], points[(i + 2) % n]);
        if c.abs() < 1e-12 {
            return false;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    true
}

/// Minimum-area enclosing rectangle of a point set.
///
/// `angle_deg` is normalised into (-45, 45] and `size[0]` is the extent
/// along the rectangle axis closest to the image x axis.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RotatedRect {
    /// Rectangle center in pixel coordinates.
    pub center: [f64; 2],
    /// `[width, height]` in pixels.
    pub size: [f64; 2],
    /// Rotation of the width axis relative to the image x axis, degrees.
    pub angle_deg: f64,
}

impl RotatedRect {
    pub fn width(&self) -> f64 {
        self.size[0]
    }

    pub fn height(&self) -> f64 {
        self.size[1]
    }

    pub fn area(&self) -> f64 {
        self.size[0] * self.size[1]
    }

    /// Grow both sides by `amount` pixels, keeping center and angle.
    pub fn expanded(self, amount: f64) -> Self {
        Self {
            size: [self.size[0] + amount, self.size[1] + amount],
            ..self
        }
    }

    /// Corner points, clockwise on screen starting from the top-left of the
    /// unrotated rectangle.
    pub fn corners(&self) -> [[f64; 2]; 4] {
        let (s, c) = self.angle_deg.to_radians().sin_cos();
        let hw = 0.5 * self.size[0];
        let hh = 0.5 * self.size[1];
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(x, y)| {
            [
                self.center[0] + x * c - y * s,
                self.center[1] + x * s + y * c,
            ]
        })
    }

    fn normalized(center: [f64; 2], width: f64, height: f64, angle_deg: f64) -> Self {
        let mut angle = angle_deg.rem_euclid(180.0);
        if angle > 90.0 {
            angle -= 180.0;
        }
        let (mut w, mut h) = (width, height);
        if angle > 45.0 {
            angle -= 90.0;
            std::mem::swap(&mut w, &mut h);
        } else if angle <= -45.0 {
            angle += 90.0;
            std::mem::swap(&mut w, &mut h);
        }
        Self {
            center,
            size: [w, h],
            angle_deg: angle,
        }
    }
}

/// Minimum-area rectangle via rotating calipers over the convex hull.
///
/// Degenerate inputs (collinear or repeated points) fall back to the
/// axis-aligned bounding box. Returns `None` for an empty slice.
pub fn min_area_rect(points: &[[f64; 2]]) -> Option<RotatedRect> {
    let first = *points.first()?;
    let hull = convex_hull(points);

    if hull.len() < 3 {
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first[0], first[0], first[1], first[1]);
        for p in points {
            min_x = min_x.min(p[0]);
            max_x = max_x.max(p[0]);
            min_y = min_y.min(p[1]);
            max_y = max_y.max(p[1]);
        }
        return Some(RotatedRect {
            center: [0.5 * (min_x + max_x), 0.5 * (min_y + max_y)],
            size: [max_x - min_x, max_y - min_y],
            angle_deg: 0.0,
        });
    }

    let n = hull.len();
    let mut best: Option<(f64, RotatedRect)> = None;
    for i in 0..n {
        let a = hull[i];
        let b = hull[(i + 1) % n];
        let len = distance(a, b);
        if len < f64::EPSILON {
            continue;
        }
        let (ux, uy) = ((b[0] - a[0]) / len, (b[1] - a[1]) / len);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u, mut min_v, mut max_v) =
            (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for p in &hull {
            let dx = p[0] - a[0];
            let dy = p[1] - a[1];
            let pu = dx * ux + dy * uy;
            let pv = dx * vx + dy * vy;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;
        if best.as_ref().is_some_and(|(best_area, _)| area >= *best_area) {
            continue;
        }

        let cu = 0.5 * (min_u + max_u);
        let cv = 0.5 * (min_v + max_v);
        let center = [a[0] + cu * ux + cv * vx, a[1] + cu * uy + cv * vy];
        let angle = uy.atan2(ux).to_degrees();
        best = Some((area, RotatedRect::normalized(center, width, height, angle)));
    }

    best.map(|(_, rect)| rect)
}

fn segment_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let len = distance(a, b);
    if len < f64::EPSILON {
        return distance(p, a);
    }
    cross(a, b, p).abs() / len
}

fn douglas_peucker(points: &[[f64; 2]], epsilon: f64, out: &mut Vec<[f64; 2]>) {
    let (first, last) = (points[0], points[points.len() - 1]);
    let mut max_dist = 0.0;
    let mut split = 0;
    for (i, &p) in points.iter().enumerate().take(points.len() - 1).skip(1) {
        let d = segment_distance(p, first, last);
        if d > max_dist {
            max_dist = d;
            split = i;
        }
    }
    if max_dist > epsilon {
        douglas_peucker(&points[..=split], epsilon, out);
        out.pop();
        douglas_peucker(&points[split..], epsilon, out);
    } else {
        out.push(first);
        out.push(last);
    }
}

/// Douglas–Peucker simplification.
///
/// For closed curves the first anchor is the point farthest from the
/// centroid and the second the point farthest from that anchor, so both
/// anchors land on true vertices of a polygonal outline. The result of a
/// closed simplification does not repeat its first vertex.
pub fn approximate_polygon(points: &[[f64; 2]], epsilon: f64, closed: bool) -> Vec<[f64; 2]> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = Vec::new();
    if !closed {
        douglas_peucker(points, epsilon, &mut out);
        return out;
    }

    let Some(c) = centroid(points) else {
        return Vec::new();
    };
    let farthest_from = |origin: [f64; 2], pts: &[[f64; 2]]| {
        pts.iter()
            .enumerate()
            .fold((0usize, -1.0f64), |(bi, bd), (i, &p)| {
                let d = distance(origin, p);
                if d > bd {
                    (i, d)
                } else {
                    (bi, bd)
                }
            })
            .0
    };
    let start = farthest_from(c, points);
    let mut ring: Vec<[f64; 2]> = points[start..].iter().chain(&points[..start]).copied().collect();
    let opposite = farthest_from(ring[0], &ring);
    if opposite == 0 {
        return vec![ring[0]];
    }
    ring.push(ring[0]);

    douglas_peucker(&ring[..=opposite], epsilon, &mut out);
    out.pop();
    douglas_peucker(&ring[opposite..], epsilon, &mut out);
    out.pop();
    out
}

/// Move every edge of a convex quad outward by `offset` and return the new
/// corners (intersections of consecutive offset edges), same winding.
pub fn offset_quad(quad: &[[f64; 2]; 4], offset: f64) -> Option<[[f64; 2]; 4]> {
    let orientation = signed_area(quad).signum();
    if orientation == 0.0 {
        return None;
    }

    let mut lines = [([0.0f64; 2], [0.0f64; 2]); 4];
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let len = distance(a, b);
        if len < f64::EPSILON {
            return None;
        }
        let e = [(b[0] - a[0]) / len, (b[1] - a[1]) / len];
        let n = [orientation * e[1], -orientation * e[0]];
        lines[i] = ([a[0] + offset * n[0], a[1] + offset * n[1]], e);
    }

    let mut out = [[0.0f64; 2]; 4];
    for (i, corner) in out.iter_mut().enumerate() {
        let (p1, e1) = lines[(i + 3) % 4];
        let (p2, e2) = lines[i];
        let denom = e1[0] * e2[1] - e1[1] * e2[0];
        if denom.abs() < 1e-12 {
            return None;
        }
        let d = [p2[0] - p1[0], p2[1] - p1[1]];
        let t = (d[0] * e2[1] - d[1] * e2[0]) / denom;
        *corner = [p1[0] + t * e1[0], p1[1] + t * e1[1]];
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect_outline(x0: i32, y0: i32, w: i32, h: i32) -> Vec<[f64; 2]> {
        let mut pts = Vec::new();
        for x in x0..x0 + w {
            pts.push([x as f64, y0 as f64]);
        }
        for y in y0 + 1..y0 + h {
            pts.push([(x0 + w - 1) as f64, y as f64]);
        }
        for x in (x0..x0 + w - 1).rev() {
            pts.push([x as f64, (y0 + h - 1) as f64]);
        }
        for y in (y0 + 1..y0 + h - 1).rev() {
            pts.push([x0 as f64, y as f64]);
        }
        pts
    }

    #[test]
    fn area_and_winding_of_unit_square() {
        let sq = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert_relative_eq!(signed_area(&sq), 1.0);
        let mut rev = sq;
        rev.reverse();
        assert_relative_eq!(signed_area(&rev), -1.0);
        assert_relative_eq!(polygon_area(&rev), 1.0);
        assert_relative_eq!(arc_length(&sq, true), 4.0);
        assert_relative_eq!(arc_length(&sq, false), 3.0);
    }

    #[test]
    fn hull_drops_interior_and_collinear_points() {
        let pts = [
            [0.0, 0.0],
            [2.0, 0.0],
            [4.0, 0.0],
            [4.0, 4.0],
            [0.0, 4.0],
            [2.0, 2.0],
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(signed_area(&hull) > 0.0);
    }

    #[test]
    fn min_area_rect_of_axis_aligned_outline() {
        let rect = min_area_rect(&rect_outline(10, 20, 40, 60)).unwrap();
        assert_relative_eq!(rect.width(), 39.0, epsilon = 1e-9);
        assert_relative_eq!(rect.height(), 59.0, epsilon = 1e-9);
        assert_relative_eq!(rect.center[0], 29.5, epsilon = 1e-9);
        assert_relative_eq!(rect.center[1], 49.5, epsilon = 1e-9);
        assert!(rect.angle_deg.abs() < 1e-9);
    }

    #[test]
    fn min_area_rect_of_rotated_rectangle() {
        let (s, c) = 30f64.to_radians().sin_cos();
        let pts: Vec<[f64; 2]> = [[-20.0, -10.0], [20.0, -10.0], [20.0, 10.0], [-20.0, 10.0]]
            .iter()
            .map(|p| [100.0 + p[0] * c - p[1] * s, 80.0 + p[0] * s + p[1] * c])
            .collect();
        let rect = min_area_rect(&pts).unwrap();
        assert_relative_eq!(rect.width(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(rect.height(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(rect.angle_deg, 30.0, epsilon = 1e-9);
        for (got, want) in rect.corners().iter().zip(&pts) {
            assert_relative_eq!(got[0], want[0], epsilon = 1e-9);
            assert_relative_eq!(got[1], want[1], epsilon = 1e-9);
        }
    }

    #[test]
    fn min_area_rect_degenerate_line() {
        let pts = [[0.0, 5.0], [3.0, 5.0], [7.0, 5.0]];
        let rect = min_area_rect(&pts).unwrap();
        assert_relative_eq!(rect.width(), 7.0);
        assert_relative_eq!(rect.height(), 0.0);
        assert!(min_area_rect(&[]).is_none());
    }

    #[test]
    fn closed_simplification_finds_rectangle_corners() {
        let outline = rect_outline(5, 7, 30, 20);
        let eps = 0.03 * arc_length(&outline, true);
        let poly = approximate_polygon(&outline, eps, true);
        assert_eq!(poly.len(), 4);
        for corner in [[5.0, 7.0], [34.0, 7.0], [34.0, 26.0], [5.0, 26.0]] {
            assert!(poly.contains(&corner), "missing corner {corner:?} in {poly:?}");
        }
        assert!(is_convex(&poly));
    }

    #[test]
    fn offset_quad_moves_edges_outward() {
        let quad = [[50.0, 50.0], [149.0, 50.0], [149.0, 149.0], [50.0, 149.0]];
        let grown = offset_quad(&quad, 0.5).unwrap();
        assert_relative_eq!(grown[0][0], 49.5, epsilon = 1e-12);
        assert_relative_eq!(grown[0][1], 49.5, epsilon = 1e-12);
        assert_relative_eq!(grown[2][0], 149.5, epsilon = 1e-12);
        assert_relative_eq!(grown[2][1], 149.5, epsilon = 1e-12);

        let mut ccw = quad;
        ccw.reverse();
        let grown_ccw = offset_quad(&ccw, 0.5).unwrap();
        assert_relative_eq!(polygon_area(&grown_ccw), 100.0 * 100.0, epsilon = 1e-9);
    }
}
