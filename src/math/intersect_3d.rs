use super::{Point3, Vector3, TOLERANCE};

/// Relationship of a ray with a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayTriangleRelation {
    /// The ray crosses the triangle interior at parameter `t`.
    Hit { t: f64 },
    /// The ray crosses the triangle plane within `edge_tolerance` of an edge or
    /// vertex, or lies in the triangle plane. The caller should retry with
    /// another direction.
    Grazing { t: f64 },
    /// No intersection in front of the origin.
    Miss,
}

/// Intersects the ray `origin + t * dir` (`t > 0`) with triangle `[a, b, c]`.
///
/// Uses the Möller–Trumbore formulation. Barycentric coordinates within
/// `edge_tolerance` of zero classify the hit as [`RayTriangleRelation::Grazing`].
#[must_use]
pub fn ray_triangle(
    origin: &Point3,
    dir: &Vector3,
    [a, b, c]: [&Point3; 3],
    edge_tolerance: f64,
) -> RayTriangleRelation {
    let e1 = b - a;
    let e2 = c - a;
    let pvec = dir.cross(&e2);
    let det = e1.dot(&pvec);

    let scale = e1.norm() * e2.norm() * dir.norm();
    if det.abs() <= TOLERANCE * scale {
        // Ray parallel to the plane: only relevant if it lies in it.
        let normal = e1.cross(&e2);
        let n_len = normal.norm();
        if n_len > TOLERANCE && (normal.dot(&(origin - a)) / n_len).abs() < edge_tolerance {
            return RayTriangleRelation::Grazing { t: 0.0 };
        }
        return RayTriangleRelation::Miss;
    }

    let inv = 1.0 / det;
    let tvec = origin - a;
    let u = tvec.dot(&pvec) * inv;
    let qvec = tvec.cross(&e1);
    let v = dir.dot(&qvec) * inv;
    let t = e2.dot(&qvec) * inv;

    if u < -edge_tolerance || v < -edge_tolerance || u + v > 1.0 + edge_tolerance {
        return RayTriangleRelation::Miss;
    }
    if t <= 0.0 {
        return RayTriangleRelation::Miss;
    }
    if u < edge_tolerance || v < edge_tolerance || u + v > 1.0 - edge_tolerance {
        return RayTriangleRelation::Grazing { t };
    }
    RayTriangleRelation::Hit { t }
}

/// Closest point on triangle `[a, b, c]` to `p`.
///
/// Region-based evaluation over the Voronoi regions of the triangle's
/// vertices, edges and interior.
#[must_use]
pub fn closest_point_on_triangle(p: &Point3, [a, b, c]: [&Point3; 3]) -> Point3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn tri() -> [Point3; 3] {
        [p(0.0, 0.0, 1.0), p(2.0, 0.0, 1.0), p(0.0, 2.0, 1.0)]
    }

    #[test]
    fn ray_hits_interior() {
        let [a, b, c] = tri();
        let rel = ray_triangle(&p(0.5, 0.5, 0.0), &Vector3::z(), [&a, &b, &c], 1e-9);
        assert_eq!(rel, RayTriangleRelation::Hit { t: 1.0 });
    }

    #[test]
    fn ray_behind_origin_misses() {
        let [a, b, c] = tri();
        let rel = ray_triangle(&p(0.5, 0.5, 2.0), &Vector3::z(), [&a, &b, &c], 1e-9);
        assert_eq!(rel, RayTriangleRelation::Miss);
    }

    #[test]
    fn ray_through_edge_grazes() {
        let [a, b, c] = tri();
        let rel = ray_triangle(&p(1.0, 0.0, 0.0), &Vector3::z(), [&a, &b, &c], 1e-9);
        assert!(matches!(rel, RayTriangleRelation::Grazing { .. }));
    }

    #[test]
    fn ray_outside_misses() {
        let [a, b, c] = tri();
        let rel = ray_triangle(&p(3.0, 3.0, 0.0), &Vector3::z(), [&a, &b, &c], 1e-9);
        assert_eq!(rel, RayTriangleRelation::Miss);
    }

    #[test]
    fn closest_point_regions() {
        let [a, b, c] = tri();
        assert_eq!(closest_point_on_triangle(&p(0.5, 0.5, 3.0), [&a, &b, &c]), p(0.5, 0.5, 1.0));
        assert_eq!(closest_point_on_triangle(&p(-1.0, -1.0, 1.0), [&a, &b, &c]), a);
        assert_eq!(closest_point_on_triangle(&p(1.0, -1.0, 1.0), [&a, &b, &c]), p(1.0, 0.0, 1.0));
    }
}
