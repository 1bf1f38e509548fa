use std::collections::HashMap;

use tracing::{debug, warn};

use super::{ElementId, FaceRef, Mesh, NodeId};
use crate::error::Result;

/// Face twins and node-to-element incidence of a mesh.
///
/// Any change to element connectivity (for example partitioning) makes an
/// existing adjacency stale; build a new one afterwards.
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    twins: HashMap<FaceRef, FaceRef>,
    node_elements: Vec<Vec<ElementId>>,
}

impl MeshAdjacency {
    /// Builds the adjacency.
    ///
    /// Faces are matched by their node sets. Faces shared by more than two
    /// elements stay unmatched.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::MeshError`] if the mesh is malformed.
    pub fn build(mesh: &Mesh) -> Result<Self> {
        mesh.validate()?;

        let mut node_elements = vec![Vec::new(); mesh.nodes.len()];
        let mut by_key: HashMap<Vec<NodeId>, Vec<FaceRef>> = HashMap::new();
        for (eid, element) in mesh.elements.iter().enumerate() {
            for &n in &element.nodes {
                if node_elements[n].last() != Some(&eid) {
                    node_elements[n].push(eid);
                }
            }
            for face in 0..element.kind.face_count() {
                let mut key = element.face_nodes(eid, face)?;
                key.sort_unstable();
                by_key.entry(key).or_default().push(FaceRef::new(eid, face));
            }
        }

        let mut twins = HashMap::new();
        for (key, faces) in by_key {
            match faces.as_slice() {
                [a, b] => {
                    twins.insert(*a, *b);
                    twins.insert(*b, *a);
                }
                [_] => {}
                _ => warn!(?key, count = faces.len(), "face shared by more than two elements"),
            }
        }
        debug!(
            elements = mesh.elements.len(),
            shared_faces = twins.len() / 2,
            "built mesh adjacency"
        );
        Ok(Self {
            twins,
            node_elements,
        })
    }

    /// The matching face of the neighbouring element.
    #[must_use]
    pub fn twin(&self, face: FaceRef) -> Option<FaceRef> {
        self.twins.get(&face).copied()
    }

    #[must_use]
    pub fn is_boundary(&self, face: FaceRef) -> bool {
        !self.twins.contains_key(&face)
    }

    /// Elements using `node`, in ascending order.
    #[must_use]
    pub fn elements_of(&self, node: NodeId) -> &[ElementId] {
        self.node_elements.get(node).map_or(&[], Vec::as_slice)
    }

    /// Every pair of twin faces, each pair once with the lower face first.
    pub fn shared_faces(&self) -> impl Iterator<Item = (FaceRef, FaceRef)> + '_ {
        self.twins
            .iter()
            .filter(|(a, b)| a < b)
            .map(|(a, b)| (*a, *b))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::test_support::hex_grid;

    #[test]
    fn grid_twins_and_boundary() {
        let mesh = hex_grid(Point3::origin(), Point3::new(2.0, 1.0, 1.0), [2, 1, 1]);
        let adj = MeshAdjacency::build(&mesh).unwrap();
        assert_eq!(adj.shared_faces().count(), 1);
        let (a, b) = adj.shared_faces().next().unwrap();
        assert_ne!(a.element, b.element);
        assert_eq!(adj.twin(a), Some(b));
        assert_eq!(adj.twin(b), Some(a));

        let boundary = (0..2)
            .flat_map(|e| (0..6).map(move |f| FaceRef::new(e, f)))
            .filter(|f| adj.is_boundary(*f))
            .count();
        assert_eq!(boundary, 10);
    }

    #[test]
    fn node_incidence() {
        let mesh = hex_grid(Point3::origin(), Point3::new(2.0, 2.0, 2.0), [2, 2, 2]);
        let adj = MeshAdjacency::build(&mesh).unwrap();
        let centre = mesh
            .nodes
            .iter()
            .position(|n| n.point == Point3::new(1.0, 1.0, 1.0))
            .unwrap();
        assert_eq!(adj.elements_of(centre).len(), 8);
        assert_eq!(adj.elements_of(0).len(), 1);
        assert!(adj.elements_of(10_000).is_empty());
    }
}
