use std::collections::BTreeMap;

use tracing::debug;

use super::MeshAttributeDeriver;
use crate::error::Result;
use crate::math::Vector3;
use crate::mesh::{ElementSet, FaceSet, Mesh, NodeId};

/// How a force applied to a set of elements or faces is specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDistribution {
    /// Force per unit volume or per unit area.
    PerUnit,
    /// Total force over the whole set.
    Total,
}

/// Nodal forces, zero for every node not present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConcentratedLoad {
    forces: BTreeMap<NodeId, Vector3>,
}

impl ConcentratedLoad {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force on `node`.
    #[must_use]
    pub fn force(&self, node: NodeId) -> Vector3 {
        self.forces.get(&node).copied().unwrap_or_else(Vector3::zeros)
    }

    pub fn add(&mut self, node: NodeId, force: Vector3) {
        *self.forces.entry(node).or_insert_with(Vector3::zeros) += force;
    }

    /// Sum of all nodal forces.
    #[must_use]
    pub fn total(&self) -> Vector3 {
        self.forces.values().sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.forces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Vector3)> {
        self.forces.iter().map(|(n, f)| (*n, f))
    }

    fn scale(&mut self, factor: f64) {
        for f in self.forces.values_mut() {
            *f *= factor;
        }
    }
}

impl MeshAttributeDeriver<'_> {
    /// Distributes `force` over the elements of `set`, weighting each node
    /// by its shape-function share of every element volume.
    ///
    /// With [`LoadDistribution::Total`] the result is normalised so that the
    /// nodal forces sum to `force`. An empty set yields an empty load.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is malformed or collapsed.
    pub fn load_from_element_set(
        &self,
        mesh: &Mesh,
        set: &ElementSet,
        force: &Vector3,
        distribution: LoadDistribution,
    ) -> Result<ConcentratedLoad> {
        let mut load = ConcentratedLoad::new();
        let mut weight = 0.0;
        for id in set.iter() {
            let element = mesh.element(id)?;
            let shares = self
                .shapes
                .node_volumes(element.kind, &mesh.element_points(id)?)?;
            for (&node, share) in element.nodes.iter().zip(shares) {
                load.add(node, force * share);
                weight += share;
            }
        }
        finish(&mut load, weight, distribution);
        debug!(elements = set.len(), nodes = load.len(), weight, "element load");
        Ok(load)
    }

    /// Distributes `force` over the faces of `set`, weighting each node by
    /// its shape-function share of every face area.
    ///
    /// # Errors
    ///
    /// Returns an error if a face is malformed.
    pub fn load_from_face_set(
        &self,
        mesh: &Mesh,
        set: &FaceSet,
        force: &Vector3,
        distribution: LoadDistribution,
    ) -> Result<ConcentratedLoad> {
        let mut load = ConcentratedLoad::new();
        let mut weight = 0.0;
        for face in set.iter() {
            let nodes = mesh.face_nodes(face)?;
            let shares = self.shapes.node_areas(&mesh.face_points(face)?)?;
            for (node, share) in nodes.into_iter().zip(shares) {
                load.add(node, force * share);
                weight += share;
            }
        }
        finish(&mut load, weight, distribution);
        debug!(faces = set.len(), nodes = load.len(), weight, "face load");
        Ok(load)
    }
}

fn finish(load: &mut ConcentratedLoad, weight: f64, distribution: LoadDistribution) {
    if distribution == LoadDistribution::Total {
        if weight > 0.0 {
            load.scale(1.0 / weight);
        } else {
            *load = ConcentratedLoad::new();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::brep::Extract;
    use crate::index::{IndexParams, SpatialIndex};
    use crate::math::Point3;
    use crate::mesh::{FaceRef, ShapeRegistry};
    use crate::solid::{ArrangementParams, AttributedSolid, TriangleSolid};
    use crate::test_support::hex_grid;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn box_index() -> SpatialIndex {
        let model = AttributedSolid::from_solid(
            &TriangleSolid::make_box(p(0.0, 0.0, 0.0), p(2.0, 1.0, 1.0)),
            ArrangementParams::default(),
        )
        .unwrap();
        SpatialIndex::new(Extract::new(model).execute().unwrap(), IndexParams::default()).unwrap()
    }

    #[test]
    fn uniform_body_force_sums_to_force_times_volume() {
        let index = box_index();
        let shapes = ShapeRegistry::new();
        let deriver = MeshAttributeDeriver::new(&index, &shapes);
        let mesh = hex_grid(p(0.0, 0.0, 0.0), p(2.0, 1.0, 1.0), [4, 2, 2]);
        let all = deriver.element_set_for_bit(&mesh, 0).unwrap();
        assert_eq!(all.len(), 16);

        let force = Vector3::new(0.0, 0.0, -9.81);
        let load = deriver
            .load_from_element_set(&mesh, &all, &force, LoadDistribution::PerUnit)
            .unwrap();
        assert_relative_eq!(load.total(), force * 2.0, epsilon = 1e-9);
        assert_eq!(load.len(), mesh.nodes.len());

        let total = deriver
            .load_from_element_set(&mesh, &all, &force, LoadDistribution::Total)
            .unwrap();
        assert_relative_eq!(total.total(), force, epsilon = 1e-9);
        assert_eq!(total.force(10_000), Vector3::zeros());
    }

    #[test]
    fn face_load_and_empty_sets() {
        let index = box_index();
        let shapes = ShapeRegistry::new();
        let deriver = MeshAttributeDeriver::new(&index, &shapes);
        let mesh = hex_grid(p(0.0, 0.0, 0.0), p(2.0, 1.0, 1.0), [1, 1, 1]);
        let top: FaceSet = [FaceRef::new(0, 1)].into_iter().collect();

        let pressure = Vector3::new(0.0, 0.0, -3.0);
        let load = deriver
            .load_from_face_set(&mesh, &top, &pressure, LoadDistribution::PerUnit)
            .unwrap();
        assert_eq!(load.len(), 4);
        assert_relative_eq!(load.total(), pressure * 2.0, epsilon = 1e-9);
        for (_, f) in load.iter() {
            assert_relative_eq!(*f, pressure * 0.5, epsilon = 1e-9);
        }

        let empty = deriver
            .load_from_face_set(&mesh, &FaceSet::new(), &pressure, LoadDistribution::Total)
            .unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.total(), Vector3::zeros());
    }

    #[test]
    fn warped_face_load_uses_projected_area() {
        let index = box_index();
        let shapes = ShapeRegistry::new();
        let deriver = MeshAttributeDeriver::new(&index, &shapes);
        let mut mesh = hex_grid(p(0.0, 0.0, 0.0), p(2.0, 1.0, 1.0), [1, 1, 1]);
        // Lift the top corner at (2, 1, 1) so the top face is z = 1 + xy / 4.
        mesh.nodes[7].point.z += 0.5;
        let top: FaceSet = [FaceRef::new(0, 1)].into_iter().collect();

        let pressure = Vector3::new(0.0, 0.0, -3.0);
        let load = deriver
            .load_from_face_set(&mesh, &top, &pressure, LoadDistribution::PerUnit)
            .unwrap();
        assert_eq!(load.len(), 4);
        // Net area vector of the bilinear patch is (-1/4, -1/2, 2).
        assert_relative_eq!(load.total(), pressure * 4.3125_f64.sqrt(), epsilon = 1e-9);
        assert!(load.iter().all(|(_, f)| f.z < 0.0));
        assert!(load.force(7).z.abs() > load.force(4).z.abs());

        let total = deriver
            .load_from_face_set(&mesh, &top, &pressure, LoadDistribution::Total)
            .unwrap();
        assert_relative_eq!(total.total(), pressure, epsilon = 1e-9);
    }
}
