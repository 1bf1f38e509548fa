//! End-to-end pipeline from solids and directives to mesh regions.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info_span};

use crate::brep::Extract;
use crate::derive::{
    node_set_from_element_set, node_set_from_face_set, ConcentratedLoad, LoadDistribution,
    MeshAttributeDeriver, SurfaceMode,
};
use crate::directive::{Directive, DirectiveKind, DirectiveSet};
use crate::error::{ConfigError, GeometryError, Result};
use crate::index::{IndexParams, SpatialIndex};
use crate::math::Vector3;
use crate::mesh::{ElementSet, FaceSet, Mesh, MeshAdjacency, NodeSet, ShapeRegistry};
use crate::slice::{Slice, SliceResult};
use crate::solid::{ArrangementParams, AttributedSolid, TriangleSolid};

/// A force applied over the region selected by a volume or surface
/// directive.
#[derive(Debug, Clone)]
pub struct LoadSpec {
    pub name: String,
    /// Name of the directive whose region carries the load.
    pub target: String,
    pub force: Vector3,
    pub distribution: LoadDistribution,
}

impl LoadSpec {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        force: Vector3,
        distribution: LoadDistribution,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            force,
            distribution,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectParams {
    pub arrangement: ArrangementParams,
    pub index: IndexParams,
}

/// Everything derived from one mesh, keyed by directive or load name.
#[derive(Debug, Clone, Default)]
pub struct MeshRegions {
    pub element_sets: BTreeMap<String, ElementSet>,
    pub face_sets: BTreeMap<String, FaceSet>,
    pub node_sets: BTreeMap<String, NodeSet>,
    pub loads: BTreeMap<String, ConcentratedLoad>,
    pub slices: BTreeMap<String, SliceResult>,
}

/// Solids, directives and loads of one analysis, with the boundary
/// representation and spatial index built from them.
#[derive(Debug)]
pub struct Project {
    directives: DirectiveSet,
    loads: Vec<LoadSpec>,
    index: SpatialIndex,
    shapes: ShapeRegistry,
}

impl Project {
    /// Validates the configuration, then unions the solids, encodes the
    /// directives, extracts the boundary and indexes it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] before any geometry is processed if the
    /// directives or loads are inconsistent, and a geometry error if the
    /// solids are malformed or degenerate.
    pub fn build(
        solids: &[TriangleSolid],
        directives: Vec<Directive>,
        loads: Vec<LoadSpec>,
        params: ProjectParams,
    ) -> Result<Self> {
        let directives = DirectiveSet::new(directives)?;
        check_loads(&directives, &loads)?;

        let _span = info_span!(
            "project",
            solids = solids.len(),
            directives = directives.len()
        )
        .entered();
        let mut solids = solids.iter();
        let first = solids
            .next()
            .ok_or_else(|| GeometryError::InvalidSolid("project has no solids".into()))?;
        let mut model = AttributedSolid::from_solid(first, params.arrangement)?;
        for solid in solids {
            model = model.or(&AttributedSolid::from_solid(solid, params.arrangement)?)?;
        }
        let model = directives.apply(model)?;
        let rep = Extract::new(model).execute()?;
        let index = SpatialIndex::new(rep, params.index)?;
        Ok(Self {
            directives,
            loads,
            index,
            shapes: ShapeRegistry::new(),
        })
    }

    #[must_use]
    pub fn directives(&self) -> &DirectiveSet {
        &self.directives
    }

    #[must_use]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    #[must_use]
    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    /// Derives every region, slice and load for `mesh`.
    ///
    /// The mesh is annotated in place and then partitioned by each slice
    /// directive in turn. Node sets and loads are computed on the
    /// partitioned mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is malformed or an entity cannot be
    /// classified.
    pub fn process(&self, mesh: &mut Mesh) -> Result<MeshRegions> {
        mesh.validate()?;
        let deriver = MeshAttributeDeriver::new(&self.index, &self.shapes);
        let mut regions = MeshRegions::default();
        deriver.annotate(mesh)?;

        let adjacency = MeshAdjacency::build(mesh)?;
        let mut cuts = Vec::new();
        for (directive, bit) in self.directives.iter() {
            let name = directive.name.clone();
            match &directive.kind {
                DirectiveKind::SelectVolume { .. } => {
                    regions
                        .element_sets
                        .insert(name, deriver.element_set_for_bit(mesh, bit)?);
                }
                DirectiveKind::SelectSurface {
                    direction,
                    tolerance_deg,
                    mode,
                    ..
                } => {
                    let faces = deriver.face_set_for_bit(
                        mesh,
                        &adjacency,
                        bit,
                        direction,
                        *tolerance_deg,
                        *mode,
                    )?;
                    regions.face_sets.insert(name, faces);
                }
                DirectiveKind::Slice {
                    direction,
                    tolerance_deg,
                    ..
                } => {
                    let faces = deriver.face_set_for_bit(
                        mesh,
                        &adjacency,
                        bit,
                        direction,
                        *tolerance_deg,
                        SurfaceMode::Internal,
                    )?;
                    cuts.push(name.clone());
                    regions.face_sets.insert(name, faces);
                }
                DirectiveKind::SelectNode { .. } => {}
            }
        }

        let mut adjacency = adjacency;
        for name in cuts {
            let Some(cut) = regions.face_sets.get(&name) else {
                continue;
            };
            let result = Slice::new(cut).execute(mesh, &adjacency)?;
            adjacency = MeshAdjacency::build(mesh)?;
            regions.slices.insert(name, result);
        }

        let mesh: &Mesh = mesh;
        for (directive, bit) in self.directives.iter() {
            let name = &directive.name;
            let nodes = match &directive.kind {
                DirectiveKind::SelectVolume { .. } => regions
                    .element_sets
                    .get(name)
                    .map(|set| node_set_from_element_set(mesh, set))
                    .transpose()?,
                DirectiveKind::SelectSurface { .. } | DirectiveKind::Slice { .. } => regions
                    .face_sets
                    .get(name)
                    .map(|set| node_set_from_face_set(mesh, set))
                    .transpose()?,
                DirectiveKind::SelectNode { .. } => Some(deriver.node_set_for_bit(mesh, bit)),
            };
            if let Some(nodes) = nodes {
                regions.node_sets.insert(name.clone(), nodes);
            }
        }

        for load in &self.loads {
            let concentrated = if let Some(set) = regions.element_sets.get(&load.target) {
                deriver.load_from_element_set(mesh, set, &load.force, load.distribution)?
            } else if let Some(set) = regions.face_sets.get(&load.target) {
                deriver.load_from_face_set(mesh, set, &load.force, load.distribution)?
            } else {
                ConcentratedLoad::new()
            };
            regions.loads.insert(load.name.clone(), concentrated);
        }

        debug!(
            element_sets = regions.element_sets.len(),
            face_sets = regions.face_sets.len(),
            node_sets = regions.node_sets.len(),
            loads = regions.loads.len(),
            slices = regions.slices.len(),
            "processed mesh"
        );
        Ok(regions)
    }
}

/// Loads must have unique names and target a volume or surface selection.
fn check_loads(directives: &DirectiveSet, loads: &[LoadSpec]) -> Result<()> {
    let mut names = HashSet::new();
    for load in loads {
        if !names.insert(load.name.as_str()) {
            return Err(ConfigError::DuplicateName(load.name.clone()).into());
        }
        let loadable = matches!(
            directives.get(&load.target).map(|(d, _)| &d.kind),
            Some(DirectiveKind::SelectVolume { .. } | DirectiveKind::SelectSurface { .. })
        );
        if !loadable {
            return Err(ConfigError::UnknownTarget {
                load: load.name.clone(),
                target: load.target.clone(),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use approx::assert_relative_eq;

    use super::*;
    use crate::error::MeshError;
    use crate::math::Point3;
    use crate::mesh::{Element, ElementId, ElementKind, FaceRef};
    use crate::test_support::{hex_grid, init_tracing};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn tall_box() -> TriangleSolid {
        TriangleSolid::make_box(p(0.0, 0.0, 0.0), p(1.0, 1.0, 2.0))
    }

    fn tall_mesh() -> Mesh {
        hex_grid(p(0.0, 0.0, 0.0), p(1.0, 1.0, 2.0), [2, 2, 4])
    }

    #[test]
    fn upper_half_volume_load() {
        init_tracing();
        let project = Project::build(
            &[tall_box()],
            vec![
                Directive::select_volume(
                    "upper",
                    TriangleSolid::make_box(p(0.0, 0.0, 1.0), p(1.0, 1.0, 3.0)),
                ),
                Directive::select_node("marker", p(0.5, 0.5, 0.5)),
            ],
            vec![LoadSpec::new(
                "push",
                "upper",
                Vector3::new(1.234, 0.0, 0.0),
                LoadDistribution::PerUnit,
            )],
            ProjectParams::default(),
        )
        .unwrap();

        let mut mesh = tall_mesh();
        let regions = project.process(&mut mesh).unwrap();

        let upper = &regions.element_sets["upper"];
        let bit = project.directives().bit("upper").unwrap();
        for (id, element) in mesh.elements.iter().enumerate() {
            let above = mesh.element_centroid(id).unwrap().z > 1.0;
            assert_eq!(upper.contains(&id), above);
            assert_eq!(element.attributes.contains(bit), above);
        }
        assert_eq!(regions.node_sets["upper"].len(), 27);

        let load = &regions.loads["push"];
        assert_relative_eq!(load.total(), Vector3::new(1.234, 0.0, 0.0), epsilon = 1e-9);

        let marker = &regions.node_sets["marker"];
        assert_eq!(marker.len(), 1);
        let node = marker.iter().next().unwrap();
        assert_eq!(mesh.nodes[node].point, p(0.5, 0.5, 0.5));
    }

    /// Elements reachable from `seed` across shared faces.
    fn component(adjacency: &MeshAdjacency, mesh: &Mesh, seed: ElementId) -> Vec<ElementId> {
        let mut seen = vec![false; mesh.elements.len()];
        seen[seed] = true;
        let mut queue = VecDeque::from([seed]);
        let mut out = Vec::new();
        while let Some(e) = queue.pop_front() {
            out.push(e);
            for face in 0..mesh.elements[e].kind.face_count() {
                if let Some(twin) = adjacency.twin(FaceRef::new(e, face)) {
                    if !seen[twin.element] {
                        seen[twin.element] = true;
                        queue.push_back(twin.element);
                    }
                }
            }
        }
        out
    }

    fn volume_of(project: &Project, mesh: &Mesh, elements: &[ElementId]) -> f64 {
        elements
            .iter()
            .map(|&e| {
                let shares = project
                    .shapes()
                    .node_volumes(mesh.elements[e].kind, &mesh.element_points(e).unwrap())
                    .unwrap();
                shares.iter().sum::<f64>()
            })
            .sum()
    }

    #[test]
    fn internal_slice_separates_halves() {
        init_tracing();
        let project = Project::build(
            &[tall_box()],
            vec![Directive::slice(
                "cut",
                TriangleSolid::make_box(p(-1.0, -1.0, 1.0), p(2.0, 2.0, 3.0)),
                Vector3::z(),
                45.0,
            )],
            vec![],
            ProjectParams::default(),
        )
        .unwrap();

        let mut mesh = tall_mesh();
        let original_nodes = mesh.nodes.len();
        let regions = project.process(&mut mesh).unwrap();
        assert_eq!(regions.face_sets["cut"].len(), 4);

        let slice = &regions.slices["cut"];
        assert_eq!(slice.cloned_nodes.len(), 9);
        assert_eq!(mesh.nodes.len(), original_nodes + 9);
        assert_eq!(slice.pairs.len(), 9);
        for pair in &slice.pairs {
            assert_eq!(mesh.nodes[pair.a].point, mesh.nodes[pair.b].point);
            assert_relative_eq!(pair.normal.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(pair.normal.z.abs(), 1.0, epsilon = 1e-9);
        }

        let adjacency = MeshAdjacency::build(&mesh).unwrap();
        let lower = component(&adjacency, &mesh, 0);
        assert_eq!(lower.len(), 8);
        let upper: Vec<ElementId> = (0..mesh.elements.len())
            .filter(|e| !lower.contains(e))
            .collect();
        assert_relative_eq!(volume_of(&project, &mesh, &lower), 1.0, epsilon = 1e-6);
        assert_relative_eq!(volume_of(&project, &mesh, &upper), 1.0, epsilon = 1e-6);
        for (f, g) in adjacency.shared_faces() {
            assert_eq!(lower.contains(&f.element), lower.contains(&g.element));
        }
    }

    /// Shears `z` along `x`, turning horizontal planes into tilted ones.
    fn shear(point: &mut Point3) {
        point.z += 0.3 * point.x;
    }

    fn sheared_box(min: Point3, max: Point3) -> TriangleSolid {
        let mut solid = TriangleSolid::make_box(min, max);
        solid.vertices.iter_mut().for_each(shear);
        solid
    }

    #[test]
    fn tilted_internal_slice_follows_the_plane() {
        init_tracing();
        let normal = Vector3::new(-0.3, 0.0, 1.0).normalize();
        let project = Project::build(
            &[sheared_box(p(0.0, 0.0, 0.0), p(1.0, 1.0, 2.0))],
            vec![Directive::slice(
                "cut",
                sheared_box(p(-1.0, -1.0, 1.0), p(2.0, 2.0, 3.0)),
                normal,
                20.0,
            )],
            vec![],
            ProjectParams::default(),
        )
        .unwrap();

        let mut mesh = tall_mesh();
        for node in &mut mesh.nodes {
            shear(&mut node.point);
        }
        let regions = project.process(&mut mesh).unwrap();
        assert_eq!(regions.face_sets["cut"].len(), 4);
        let slice = &regions.slices["cut"];
        assert_eq!(slice.pairs.len(), 9);
        for pair in &slice.pairs {
            assert!(pair.normal.cross(&normal).norm() < 1e-9);
        }

        let adjacency = MeshAdjacency::build(&mesh).unwrap();
        let lower = component(&adjacency, &mesh, 0);
        assert_eq!(lower.len(), 8);
        assert_relative_eq!(volume_of(&project, &mesh, &lower), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn bad_load_target_fails_before_geometry() {
        // The solid is malformed; a geometry error would surface if it were read.
        let broken = TriangleSolid::new(vec![], vec![[0, 1, 2]]);
        let err = Project::build(
            &[broken],
            vec![Directive::select_node("marker", p(0.0, 0.0, 0.0))],
            vec![LoadSpec::new("l", "marker", Vector3::x(), LoadDistribution::Total)],
            ProjectParams::default(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(
            err,
            crate::GeotagError::Config(ConfigError::UnknownTarget { ref target, .. })
                if target == "marker"
        ));
    }

    #[test]
    fn malformed_element_is_reported_not_panicked() {
        let project = Project::build(
            &[tall_box()],
            vec![Directive::select_volume("all", tall_box())],
            vec![],
            ProjectParams::default(),
        )
        .unwrap();
        let mut mesh = tall_mesh();
        mesh.elements
            .push(Element::new(ElementKind::Hexahedron, vec![0, 1, 2]));
        assert!(matches!(
            project.process(&mut mesh),
            Err(crate::GeotagError::Mesh(MeshError::ConnectivityMismatch { found: 3, .. }))
        ));
    }

    #[test]
    fn empty_project_is_invalid() {
        assert!(Project::build(&[], vec![], vec![], ProjectParams::default()).is_err());
    }
}
