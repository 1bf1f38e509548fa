//! Mesh subsets and loads derived from a classified boundary representation.

mod load;

pub use load::{ConcentratedLoad, LoadDistribution};

use tracing::debug;

use crate::attribute::AttributeBitset;
use crate::error::Result;
use crate::index::SpatialIndex;
use crate::math::{within_cone, Vector3};
use crate::mesh::{ElementSet, FaceRef, FaceSet, Mesh, MeshAdjacency, NodeSet, ShapeRegistry};

/// Which element faces a surface selection considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    /// Faces on the mesh boundary, without a twin.
    External,
    /// Faces shared by two elements.
    Internal,
}

/// Maps mesh entities onto the attributes of the boundary representation
/// behind a [`SpatialIndex`].
#[derive(Debug, Clone, Copy)]
pub struct MeshAttributeDeriver<'a> {
    index: &'a SpatialIndex,
    shapes: &'a ShapeRegistry,
}

impl<'a> MeshAttributeDeriver<'a> {
    #[must_use]
    pub fn new(index: &'a SpatialIndex, shapes: &'a ShapeRegistry) -> Self {
        Self { index, shapes }
    }

    /// Elements whose centroid lies in a volume carrying `bit`.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::MeshError`] for malformed elements, or
    /// [`crate::error::GeometryError::Unclassified`] if a centroid cannot be
    /// placed in any volume.
    pub fn element_set_for_bit(&self, mesh: &Mesh, bit: usize) -> Result<ElementSet> {
        mesh.validate()?;
        let mut set = ElementSet::new();
        for id in 0..mesh.elements.len() {
            let centroid = mesh.element_centroid(id)?;
            if self.index.volume_attributes_at(&centroid)?.contains(bit) {
                set.insert(id);
            }
        }
        debug!(bit, elements = set.len(), "derived element set");
        Ok(set)
    }

    /// Element faces lying on a surface carrying `bit` whose own outward
    /// normal is within `tolerance_deg` of `direction`.
    ///
    /// The direction test is repeated per face because both faces of an
    /// internal cut sit on the same surface.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::MeshError`] for malformed elements.
    pub fn face_set_for_bit(
        &self,
        mesh: &Mesh,
        adjacency: &MeshAdjacency,
        bit: usize,
        direction: &Vector3,
        tolerance_deg: f64,
        mode: SurfaceMode,
    ) -> Result<FaceSet> {
        mesh.validate()?;
        let mut set = FaceSet::new();
        for (eid, element) in mesh.elements.iter().enumerate() {
            for face in 0..element.kind.face_count() {
                let f = FaceRef::new(eid, face);
                let considered = match mode {
                    SurfaceMode::External => adjacency.is_boundary(f),
                    SurfaceMode::Internal => !adjacency.is_boundary(f),
                };
                if !considered || !self.surface_attributes(mesh, f)?.contains(bit) {
                    continue;
                }
                if within_cone(&mesh.face_normal(f)?, direction, tolerance_deg) {
                    set.insert(f);
                }
            }
        }
        debug!(bit, ?mode, faces = set.len(), "derived face set");
        Ok(set)
    }

    /// Nodes coinciding with a boundary vertex carrying `bit`.
    #[must_use]
    pub fn node_set_for_bit(&self, mesh: &Mesh, bit: usize) -> NodeSet {
        let rep = self.index.rep();
        mesh.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                self.index
                    .vertex_at(&node.point)
                    .and_then(|v| rep.vertex(v).ok())
                    .is_some_and(|v| v.attributes.contains(bit))
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Writes classified bitsets onto every element, element face and node.
    ///
    /// Faces off any surface and nodes off any vertex get the empty set.
    ///
    /// # Errors
    ///
    /// Same as [`Self::element_set_for_bit`].
    pub fn annotate(&self, mesh: &mut Mesh) -> Result<()> {
        mesh.validate()?;
        for id in 0..mesh.elements.len() {
            let centroid = mesh.element_centroid(id)?;
            let attributes = self.index.volume_attributes_at(&centroid)?;
            let faces = (0..mesh.elements[id].kind.face_count())
                .map(|face| self.surface_attributes(mesh, FaceRef::new(id, face)))
                .collect::<Result<Vec<_>>>()?;
            let element = &mut mesh.elements[id];
            element.attributes = attributes;
            element.face_attributes = faces;
        }
        let rep = self.index.rep();
        for node in &mut mesh.nodes {
            node.attributes = self
                .index
                .vertex_at(&node.point)
                .and_then(|v| rep.vertex(v).ok())
                .map_or(AttributeBitset::empty(), |v| v.attributes);
        }
        Ok(())
    }

    fn surface_attributes(&self, mesh: &Mesh, face: FaceRef) -> Result<AttributeBitset> {
        let centroid = mesh.face_centroid(face)?;
        Ok(self
            .index
            .surface_containing(&centroid)
            .and_then(|s| self.index.rep().surface(s).ok())
            .map_or(AttributeBitset::empty(), |s| s.attributes))
    }
}

/// Union of the nodes of every element in `set`.
///
/// # Errors
///
/// Returns [`crate::error::MeshError::ElementOutOfRange`] for ids outside the
/// mesh.
pub fn node_set_from_element_set(mesh: &Mesh, set: &ElementSet) -> Result<NodeSet> {
    let mut nodes = NodeSet::new();
    for id in set.iter() {
        for &n in &mesh.element(id)?.nodes {
            nodes.insert(n);
        }
    }
    Ok(nodes)
}

/// Union of the nodes of every face in `set`.
///
/// # Errors
///
/// Returns a [`crate::error::MeshError`] for faces outside the mesh.
pub fn node_set_from_face_set(mesh: &Mesh, set: &FaceSet) -> Result<NodeSet> {
    let mut nodes = NodeSet::new();
    for face in set.iter() {
        for n in mesh.face_nodes(face)? {
            nodes.insert(n);
        }
    }
    Ok(nodes)
}
