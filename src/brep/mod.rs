//! Explicit boundary representation extracted from an attributed solid.

mod border;
mod extract;
mod surface;
mod triangulate;

pub use extract::Extract;
pub use triangulate::triangulate_loop;

use slotmap::SlotMap;

use crate::attribute::AttributeBitset;
use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3};

slotmap::new_key_type! {
    /// Unique identifier for a boundary vertex.
    pub struct VertexId;
    /// Unique identifier for a volume.
    pub struct VolumeId;
    /// Unique identifier for a surface.
    pub struct SurfaceId;
    /// Unique identifier for a border.
    pub struct BorderId;
}

/// A point of the boundary carrying its own attributes.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub point: Point3,
    pub attributes: AttributeBitset,
}

/// A maximal connected region of space with uniform attributes.
#[derive(Debug, Clone)]
pub struct Volume {
    pub attributes: AttributeBitset,
    /// `true` for the single unbounded volume.
    pub outside: bool,
}

/// A triangulated sheet separating `volumes[0]` from `volumes[1]`.
///
/// Triangles wind counter-clockwise seen from `volumes[0]`, so their
/// right-hand normals point into `volumes[0]`.
#[derive(Debug, Clone)]
pub struct Surface {
    pub triangles: Vec<[VertexId; 3]>,
    pub volumes: [VolumeId; 2],
    pub attributes: AttributeBitset,
}

/// A chain of edges where surfaces meet with differing attributes or
/// non-manifold connectivity.
#[derive(Debug, Clone)]
pub struct Border {
    pub vertices: Vec<VertexId>,
    /// Whether the last vertex connects back to the first.
    pub closed: bool,
    /// Surfaces meeting along any edge of the chain, sorted.
    pub surfaces: Vec<SurfaceId>,
    pub attributes: AttributeBitset,
}

/// Immutable boundary representation.
#[derive(Debug, Clone)]
pub struct BoundaryRep {
    vertices: SlotMap<VertexId, Vertex>,
    volumes: SlotMap<VolumeId, Volume>,
    surfaces: SlotMap<SurfaceId, Surface>,
    borders: SlotMap<BorderId, Border>,
    outside: VolumeId,
}

impl BoundaryRep {
    /// Returns the vertex, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found.
    pub fn vertex(&self, id: VertexId) -> Result<&Vertex> {
        self.vertices
            .get(id)
            .ok_or_else(|| GeometryError::EntityNotFound("vertex").into())
    }

    /// Returns the volume, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found.
    pub fn volume(&self, id: VolumeId) -> Result<&Volume> {
        self.volumes
            .get(id)
            .ok_or_else(|| GeometryError::EntityNotFound("volume").into())
    }

    /// Returns the surface, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found.
    pub fn surface(&self, id: SurfaceId) -> Result<&Surface> {
        self.surfaces
            .get(id)
            .ok_or_else(|| GeometryError::EntityNotFound("surface").into())
    }

    /// Returns the border, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found.
    pub fn border(&self, id: BorderId) -> Result<&Border> {
        self.borders
            .get(id)
            .ok_or_else(|| GeometryError::EntityNotFound("border").into())
    }

    /// The unbounded volume.
    #[must_use]
    pub fn outside_volume(&self) -> VolumeId {
        self.outside
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }

    pub fn volumes(&self) -> impl Iterator<Item = (VolumeId, &Volume)> {
        self.volumes.iter()
    }

    pub fn surfaces(&self) -> impl Iterator<Item = (SurfaceId, &Surface)> {
        self.surfaces.iter()
    }

    pub fn borders(&self) -> impl Iterator<Item = (BorderId, &Border)> {
        self.borders.iter()
    }

    /// Corner points of a surface triangle.
    ///
    /// # Errors
    ///
    /// Returns an error if a vertex is not found.
    pub fn triangle_points(&self, tri: &[VertexId; 3]) -> Result<[Point3; 3]> {
        Ok([
            self.vertex(tri[0])?.point,
            self.vertex(tri[1])?.point,
            self.vertex(tri[2])?.point,
        ])
    }

    /// Unit normal of a surface triangle, pointing into `volumes[0]`.
    ///
    /// # Errors
    ///
    /// Returns an error if a vertex is not found, or the triangle is degenerate.
    pub fn triangle_normal(&self, tri: &[VertexId; 3]) -> Result<Vector3> {
        let [a, b, c] = self.triangle_points(tri)?;
        (b - a)
            .cross(&(c - a))
            .try_normalize(0.0)
            .ok_or_else(|| GeometryError::Degenerate("zero-area surface triangle".into()).into())
    }

    /// Total area of a surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface or one of its vertices is not found.
    pub fn surface_area(&self, id: SurfaceId) -> Result<f64> {
        let mut area = 0.0;
        for tri in &self.surface(id)?.triangles {
            let [a, b, c] = self.triangle_points(tri)?;
            area += 0.5 * (b - a).cross(&(c - a)).norm();
        }
        Ok(area)
    }
}
