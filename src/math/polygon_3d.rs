use super::{Point2, Point3, Vector3};

/// Newell normal of a polygon loop (not normalized; length is twice the area).
///
/// Robust for non-triangular and slightly non-planar loops.
#[must_use]
pub fn newell_normal(points: &[Point3]) -> Vector3 {
    let n = points.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Arithmetic mean of a set of points.
#[must_use]
pub fn centroid(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return Point3::origin();
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / n)
}

/// Index of the largest absolute component of a normal.
#[must_use]
pub fn dominant_axis(normal: &Vector3) -> usize {
    let a = normal.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}

/// Projects a point onto the coordinate plane that drops `axis`.
///
/// The remaining axes are taken in cyclic order so the projection preserves
/// orientation when viewed from the positive `axis` direction.
#[must_use]
pub fn project_dropping_axis(point: &Point3, axis: usize) -> Point2 {
    let u = (axis + 1) % 3;
    let v = (axis + 2) % 3;
    Point2::new(point[u], point[v])
}

/// Signed area of a 2D polygon loop (positive for counter-clockwise).
#[must_use]
pub fn signed_area_2d(points: &[Point2]) -> f64 {
    let n = points.len();
    let mut twice = 0.0;
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        twice += a.x * b.y - b.x * a.y;
    }
    twice * 0.5
}
