//! Point classification against an extracted boundary representation.

mod bvh;

pub use bvh::Bvh;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::attribute::AttributeBitset;
use crate::brep::{BoundaryRep, SurfaceId, VertexId, VolumeId};
use crate::error::{ConfigError, GeometryError, Result};
use crate::math::intersect_3d::{closest_point_on_triangle, ray_triangle, RayTriangleRelation};
use crate::math::{Point3, Vector3};

const LEAF_SIZE: usize = 4;
const EDGE_TOLERANCE: f64 = 1e-9;
const RAY_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Parameters controlling spatial queries.
#[derive(Debug, Clone, Copy)]
pub struct IndexParams {
    /// Absolute distance within which a point touches a surface or vertex.
    pub tolerance: f64,
    /// Ray directions tried before a point is reported unclassified.
    pub max_ray_attempts: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_ray_attempts: 16,
        }
    }
}

impl IndexParams {
    /// Sets the nearest-feature tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDistance`] if `tolerance` is negative or
    /// not finite.
    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::InvalidDistance { value: tolerance }.into());
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    #[must_use]
    pub fn with_max_ray_attempts(mut self, attempts: usize) -> Self {
        self.max_ray_attempts = attempts.max(1);
        self
    }
}

#[derive(Debug)]
struct IndexedTriangle {
    corners: [Point3; 3],
    normal: Vector3,
    surface: SurfaceId,
    volumes: [VolumeId; 2],
}

/// Spatial index over the triangulated surfaces of a [`BoundaryRep`].
///
/// Built once; the boundary representation is immutable afterwards.
#[derive(Debug)]
pub struct SpatialIndex {
    rep: BoundaryRep,
    params: IndexParams,
    triangles: Vec<IndexedTriangle>,
    bvh: Bvh,
}

impl SpatialIndex {
    /// Builds the index.
    ///
    /// # Errors
    ///
    /// Returns an error if a surface triangle references a missing vertex or
    /// has zero area.
    pub fn new(rep: BoundaryRep, params: IndexParams) -> Result<Self> {
        let mut triangles = Vec::new();
        for (sid, surface) in rep.surfaces() {
            for tri in &surface.triangles {
                triangles.push(IndexedTriangle {
                    corners: rep.triangle_points(tri)?,
                    normal: rep.triangle_normal(tri)?,
                    surface: sid,
                    volumes: surface.volumes,
                });
            }
        }
        let corners: Vec<[Point3; 3]> = triangles.iter().map(|t| t.corners).collect();
        let bvh = Bvh::build(&corners, LEAF_SIZE);
        debug!(triangles = triangles.len(), "built spatial index");
        Ok(Self {
            rep,
            params,
            triangles,
            bvh,
        })
    }

    #[must_use]
    pub fn rep(&self) -> &BoundaryRep {
        &self.rep
    }

    #[must_use]
    pub fn params(&self) -> IndexParams {
        self.params
    }

    /// Volume containing `point`.
    ///
    /// A ray is cast in a pseudo-random direction; the nearest triangle it
    /// crosses decides the side. Points on a surface may classify to either
    /// adjacent volume.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Unclassified`] if every ray attempt grazes an
    /// edge or lies in a triangle's plane.
    pub fn volume_containing(&self, point: &Point3) -> Result<VolumeId> {
        let mut rng = StdRng::seed_from_u64(RAY_SEED);
        for attempt in 0..self.params.max_ray_attempts {
            let dir = random_direction(&mut rng);
            if let Some(volume) = self.cast(point, &dir) {
                return Ok(volume);
            }
            warn!(attempt, ?point, "ray grazed a surface edge, retrying");
        }
        Err(GeometryError::Unclassified(format!(
            "no clean ray from {point:?} after {} attempts",
            self.params.max_ray_attempts
        ))
        .into())
    }

    /// Attributes of the volume containing `point`.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::volume_containing`] failures.
    pub fn volume_attributes_at(&self, point: &Point3) -> Result<AttributeBitset> {
        let id = self.volume_containing(point)?;
        Ok(self.rep.volume(id)?.attributes)
    }

    /// Surface with a triangle within the tolerance of `point`, the nearest
    /// one if several are.
    #[must_use]
    pub fn surface_containing(&self, point: &Point3) -> Option<SurfaceId> {
        let tol = self.params.tolerance;
        self.bvh
            .near_candidates(point, tol)
            .into_iter()
            .map(|i| {
                let t = &self.triangles[i];
                let [a, b, c] = &t.corners;
                let q = closest_point_on_triangle(point, [a, b, c]);
                ((q - point).norm(), t.surface)
            })
            .filter(|(d, _)| *d <= tol)
            .min_by(|x, y| x.0.total_cmp(&y.0))
            .map(|(_, s)| s)
    }

    /// Boundary vertex within the tolerance of `point`, the nearest one if
    /// several are.
    #[must_use]
    pub fn vertex_at(&self, point: &Point3) -> Option<VertexId> {
        let tol = self.params.tolerance;
        self.rep
            .vertices()
            .map(|(id, v)| ((v.point - point).norm(), id))
            .filter(|(d, _)| *d <= tol)
            .min_by(|x, y| x.0.total_cmp(&y.0))
            .map(|(_, id)| id)
    }

    /// Classifies along one ray. `None` when the nearest crossing is not clean.
    fn cast(&self, origin: &Point3, dir: &Vector3) -> Option<VolumeId> {
        let mut nearest_hit: Option<(f64, usize)> = None;
        let mut nearest_graze = f64::INFINITY;
        for i in self.bvh.ray_candidates(origin, dir) {
            let [a, b, c] = &self.triangles[i].corners;
            match ray_triangle(origin, dir, [a, b, c], EDGE_TOLERANCE) {
                RayTriangleRelation::Hit { t } => {
                    if nearest_hit.map_or(true, |(best, _)| t < best) {
                        nearest_hit = Some((t, i));
                    }
                }
                RayTriangleRelation::Grazing { t } => nearest_graze = nearest_graze.min(t),
                RayTriangleRelation::Miss => {}
            }
        }
        match nearest_hit {
            Some((t, _)) if nearest_graze <= t => None,
            Some((_, i)) => {
                let tri = &self.triangles[i];
                Some(if dir.dot(&tri.normal) < 0.0 {
                    tri.volumes[0]
                } else {
                    tri.volumes[1]
                })
            }
            None if nearest_graze.is_finite() => None,
            None => Some(self.rep.outside_volume()),
        }
    }
}

/// Uniformly distributed unit vector, by rejection from the unit ball.
fn random_direction(rng: &mut impl Rng) -> Vector3 {
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let n = v.norm();
        if n > 0.1 && n <= 1.0 {
            return v / n;
        }
    }
}
