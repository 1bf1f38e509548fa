use crate::math::{Point3, Vector3, TOLERANCE};

/// Position of a point relative to a [`SplitPlane`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Above,
    On,
    Below,
}

/// An oriented plane `normal · x = offset` with a unit normal.
///
/// Planes are kept in canonical orientation (first significant normal
/// component positive) so that coincident planes compare equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPlane {
    pub normal: Vector3,
    pub offset: f64,
}

impl SplitPlane {
    /// Plane with the given normal passing through `point`.
    ///
    /// Returns `None` for a (near) zero normal.
    #[must_use]
    pub fn through(normal: &Vector3, point: &Point3) -> Option<Self> {
        let len = normal.norm();
        if len < TOLERANCE {
            return None;
        }
        let mut n = normal / len;
        let flip = n
            .iter()
            .find(|c| c.abs() > 1e-9)
            .is_some_and(|c| *c < 0.0);
        if flip {
            n = -n;
        }
        Some(Self {
            normal: n,
            offset: n.dot(&point.coords),
        })
    }

    /// Supporting plane of a triangle, or `None` if the triangle is degenerate.
    #[must_use]
    pub fn from_triangle(a: &Point3, b: &Point3, c: &Point3) -> Option<Self> {
        let n = (b - a).cross(&(c - a));
        let scale = (b - a).norm() * (c - a).norm();
        if n.norm() <= TOLERANCE * scale.max(1.0) {
            return None;
        }
        Self::through(&n, a)
    }

    /// Axis-aligned plane `x[axis] = value`.
    #[must_use]
    pub fn axis(axis: usize, value: f64) -> Self {
        let mut normal = Vector3::zeros();
        normal[axis] = 1.0;
        Self {
            normal,
            offset: value,
        }
    }

    #[must_use]
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }

    #[must_use]
    pub fn side(&self, p: &Point3, tolerance: f64) -> Side {
        let d = self.signed_distance(p);
        if d > tolerance {
            Side::Above
        } else if d < -tolerance {
            Side::Below
        } else {
            Side::On
        }
    }

    /// Whether both planes describe the same geometric plane, in either
    /// orientation.
    #[must_use]
    pub fn coincides(&self, other: &Self, tolerance: f64) -> bool {
        let dot = self.normal.dot(&other.normal);
        if dot >= 1.0 - 1e-9 {
            (self.offset - other.offset).abs() <= tolerance
        } else if dot <= -1.0 + 1e-9 {
            (self.offset + other.offset).abs() <= tolerance
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn canonical_orientation() {
        let a = SplitPlane::through(&Vector3::new(0.0, 0.0, -2.0), &p(0.0, 0.0, 1.0));
        let a = a.unwrap_or(SplitPlane::axis(0, 0.0));
        assert_eq!(a.normal, Vector3::z());
        assert!((a.offset - 1.0).abs() < 1e-12);
        assert_eq!(a.side(&p(0.0, 0.0, 2.0), 1e-9), Side::Above);
        assert_eq!(a.side(&p(5.0, 3.0, 1.0), 1e-9), Side::On);
    }

    #[test]
    fn coincidence_ignores_orientation() {
        let a = SplitPlane::axis(2, 1.0);
        let b = SplitPlane {
            normal: -Vector3::z(),
            offset: -1.0,
        };
        assert!(a.coincides(&b, 1e-9));
        assert!(!a.coincides(&SplitPlane::axis(2, 1.1), 1e-9));
    }

    #[test]
    fn degenerate_triangle_has_no_plane() {
        let plane =
            SplitPlane::from_triangle(&p(0.0, 0.0, 0.0), &p(1.0, 0.0, 0.0), &p(2.0, 0.0, 0.0));
        assert!(plane.is_none());
    }
}
