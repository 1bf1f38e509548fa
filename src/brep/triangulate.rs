use std::collections::HashMap;

use spade::{
    ConstrainedDelaunayTriangulation, InsertionError, Point2 as SpadePoint2, Triangulation,
};

use crate::error::{GeometryError, Result};
use crate::math::polygon_3d::{
    dominant_axis, newell_normal, project_dropping_axis, signed_area_2d,
};
use crate::math::{Point2, Point3};

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Triangulates a closed planar loop, keeping the loop's winding.
///
/// Triangles pass through unchanged. Larger loops are projected onto the
/// coordinate plane of their dominant normal axis and triangulated with the
/// loop edges as constraints; triangles whose centroid the loop does not
/// wind around are dropped.
///
/// # Errors
///
/// Returns [`GeometryError::Degenerate`] if the loop has fewer than three
/// points or cannot be inserted into the triangulation.
pub fn triangulate_loop<K: Copy>(keys: &[K], points: &[Point3]) -> Result<Vec<[K; 3]>> {
    if keys.len() != points.len() || keys.len() < 3 {
        return Err(GeometryError::Degenerate("loop needs at least 3 points".into()).into());
    }
    if keys.len() == 3 {
        return Ok(vec![[keys[0], keys[1], keys[2]]]);
    }

    let axis = dominant_axis(&newell_normal(points));
    let flat: Vec<Point2> = points.iter().map(|p| project_dropping_axis(p, axis)).collect();
    let loop_ccw = signed_area_2d(&flat) > 0.0;

    let mut cdt = Cdt::new();
    let mut index_of: HashMap<usize, usize> = HashMap::new();
    let mut handles = Vec::with_capacity(flat.len());
    for (i, q) in flat.iter().enumerate() {
        let h = cdt
            .insert(SpadePoint2::new(q.x, q.y))
            .map_err(|e: InsertionError| GeometryError::Degenerate(format!("CDT insert: {e}")))?;
        index_of.entry(h.index()).or_insert(i);
        handles.push(h);
    }
    for i in 0..handles.len() {
        let from = handles[i];
        let to = handles[(i + 1) % handles.len()];
        if from != to {
            cdt.add_constraint(from, to);
        }
    }

    let mut triangles = Vec::with_capacity(keys.len() - 2);
    for face in cdt.inner_faces() {
        let mut corner = [0usize; 3];
        for (slot, vh) in face.vertices().iter().enumerate() {
            corner[slot] = *index_of
                .get(&vh.fix().index())
                .ok_or_else(|| GeometryError::Degenerate("CDT created a vertex".into()))?;
        }
        let centre = corner
            .iter()
            .fold(Point2::origin(), |acc, &i| acc + flat[i].coords / 3.0);
        if winding_number(&flat, &centre) == 0 {
            continue;
        }
        let tri_ccw = signed_area_2d(&[flat[corner[0]], flat[corner[1]], flat[corner[2]]]) > 0.0;
        if tri_ccw != loop_ccw {
            corner.swap(1, 2);
        }
        triangles.push([keys[corner[0]], keys[corner[1]], keys[corner[2]]]);
    }
    Ok(triangles)
}

/// Number of times `ring` winds counter-clockwise around `q`.
fn winding_number(ring: &[Point2], q: &Point2) -> i32 {
    let n = ring.len();
    let mut winding = 0;
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        let side = (b.x - a.x) * (q.y - a.y) - (q.x - a.x) * (b.y - a.y);
        if a.y <= q.y {
            if b.y > q.y && side > 0.0 {
                winding += 1;
            }
        } else if b.y <= q.y && side < 0.0 {
            winding -= 1;
        }
    }
    winding
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn normal_of(points: &[Point3], tri: [usize; 3]) -> Vector3 {
        let [a, b, c] = tri.map(|i| points[i]);
        (b - a).cross(&(c - a))
    }

    #[test]
    fn triangle_passes_through() {
        let pts = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        let tris = triangulate_loop(&[0, 1, 2], &pts).unwrap();
        assert_eq!(tris, vec![[0, 1, 2]]);
    }

    #[test]
    fn square_keeps_winding() {
        let pts = [
            p(0.0, 0.0, 1.0),
            p(0.0, 1.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(1.0, 0.0, 1.0),
        ];
        let tris = triangulate_loop(&[0, 1, 2, 3], &pts).unwrap();
        assert_eq!(tris.len(), 2);
        for t in tris {
            assert!(normal_of(&pts, t).z < 0.0);
        }
    }

    #[test]
    fn vertical_hexagon_keeps_winding() {
        let pts: Vec<Point3> = (0..6)
            .map(|i| {
                let a = f64::from(i) * std::f64::consts::TAU / 6.0;
                p(2.0, a.cos(), a.sin())
            })
            .collect();
        let keys: Vec<usize> = (0..6).collect();
        let tris = triangulate_loop(&keys, &pts).unwrap();
        assert_eq!(tris.len(), 4);
        let expected = newell_normal(&pts);
        for t in tris {
            assert!(normal_of(&pts, t).dot(&expected) > 0.0);
        }
    }

    #[test]
    fn notched_loop_skips_the_notch() {
        // L shape: unit squares at (0,0), (1,0) and (0,1).
        let pts = [
            p(0.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(2.0, 1.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(1.0, 2.0, 0.0),
            p(0.0, 2.0, 0.0),
        ];
        let keys: Vec<usize> = (0..6).collect();
        let tris = triangulate_loop(&keys, &pts).unwrap();
        assert_eq!(tris.len(), 4);
        let area: f64 = tris.iter().map(|t| normal_of(&pts, *t).z / 2.0).sum();
        assert!((area - 3.0).abs() < 1e-12);
        for t in tris {
            assert!(normal_of(&pts, t).z > 0.0);
        }
    }

    #[test]
    fn winding_distinguishes_inside_and_outside() {
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(winding_number(&square, &Point2::new(0.5, 0.5)), 1);
        assert_eq!(winding_number(&square, &Point2::new(1.5, 0.5)), 0);
        let reversed: Vec<Point2> = square.iter().rev().copied().collect();
        assert_eq!(winding_number(&reversed, &Point2::new(0.5, 0.5)), -1);
    }
}
