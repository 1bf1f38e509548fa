use tracing::warn;

use super::TriangleSolid;
use crate::error::{GeometryError, Result};
use crate::math::intersect_3d::{ray_triangle, RayTriangleRelation};
use crate::math::{Point3, Vector3};

/// Barycentric distance below which a ray hit counts as touching an edge.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Skewed ray directions, tried in order until one crosses the boundary
/// cleanly.
const RAY_DIRECTIONS: [[f64; 3]; 6] = [
    [0.801_7, 0.421_3, 0.423_9],
    [-0.312_7, 0.846_1, 0.431_4],
    [0.237_1, -0.351_9, 0.905_5],
    [-0.660_7, -0.531_4, 0.530_1],
    [0.571_3, 0.707_1, -0.416_9],
    [-0.196_1, 0.392_2, -0.898_7],
];

/// Whether `point` lies inside the closed triangle solid.
///
/// Counts boundary crossings along a ray; odd is inside. A ray that touches
/// a triangle edge or runs within a triangle plane is discarded and the next
/// direction is tried. `point` must not lie on the boundary itself.
///
/// # Errors
///
/// Returns [`GeometryError::Unclassified`] if every direction is degenerate.
pub fn point_in_solid(point: &Point3, solid: &TriangleSolid) -> Result<bool> {
    for (attempt, d) in RAY_DIRECTIONS.iter().enumerate() {
        let dir = Vector3::new(d[0], d[1], d[2]);
        match ray_cast_parity(point, &dir, solid) {
            RayCastResult::Clear(inside) => return Ok(inside),
            RayCastResult::Degenerate => {
                warn!(attempt, ?point, "ray grazes solid boundary, retrying");
            }
        }
    }
    Err(GeometryError::Unclassified(format!(
        "every ray from {point:?} grazes the solid boundary"
    ))
    .into())
}

enum RayCastResult {
    Clear(bool),
    Degenerate,
}

fn ray_cast_parity(point: &Point3, dir: &Vector3, solid: &TriangleSolid) -> RayCastResult {
    let mut crossings = 0u32;
    for tri in &solid.triangles {
        let [a, b, c] = *tri;
        let corners = [&solid.vertices[a], &solid.vertices[b], &solid.vertices[c]];
        match ray_triangle(point, dir, corners, EDGE_TOLERANCE) {
            RayTriangleRelation::Hit { .. } => crossings += 1,
            RayTriangleRelation::Grazing { .. } => return RayCastResult::Degenerate,
            RayTriangleRelation::Miss => {}
        }
    }
    RayCastResult::Clear(crossings % 2 == 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn center_is_inside() {
        let solid = TriangleSolid::make_box(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
        assert!(point_in_solid(&p(1.0, 1.0, 1.0), &solid).unwrap());
    }

    #[test]
    fn far_point_is_outside() {
        let solid = TriangleSolid::make_box(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
        assert!(!point_in_solid(&p(5.0, 5.0, 5.0), &solid).unwrap());
        assert!(!point_in_solid(&p(-0.5, 1.0, 1.0), &solid).unwrap());
    }

    #[test]
    fn near_wall_is_inside() {
        let solid = TriangleSolid::make_box(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
        assert!(point_in_solid(&p(0.01, 0.3, 1.7), &solid).unwrap());
    }
}
