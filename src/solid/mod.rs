//! Attribute-tagged solid algebra.
//!
//! An [`AttributedSolid`] partitions space into volumes, faces, edges and
//! vertices and attaches an [`AttributeBitset`] to each. Models are built from
//! triangle solids or isolated points and combined feature-wise with Boolean
//! operators. Internally the partition is a convex cell decomposition of a
//! padded bounding box, cut locally along each input triangle; every
//! decomposition feature records which algebra feature it belongs to after
//! simplification.

pub mod arrangement;
mod boolean;
mod classify;
pub mod plane;
mod simplify;

pub use arrangement::{Arrangement, Cut, FeatureRef};
pub use boolean::BooleanOp;
pub use classify::point_in_solid;
pub use plane::{Side, SplitPlane};

use tracing::debug;

use crate::attribute::AttributeBitset;
use crate::error::{GeometryError, Result};
use crate::math::{Aabb, Point3, Vector3};

/// Dimension of the algebra feature an arrangement feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Volume,
    Face,
    Edge,
    Vertex,
}

/// Tunables for building attributed solids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrangementParams {
    /// Distance below which a point counts as lying on a plane, and planes
    /// with offsets closer than this are merged.
    pub tolerance: f64,
    /// Padding of the bounding universe, relative to the diagonal of the
    /// input extent.
    pub margin: f64,
}

impl Default for ArrangementParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            margin: 0.25,
        }
    }
}

impl ArrangementParams {
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Absolute universe padding for an input extent with the given diagonal.
    #[must_use]
    pub fn padding(&self, diagonal: f64) -> f64 {
        (self.margin * diagonal.max(1.0)).max(self.cut_padding())
    }

    /// Growth of each cut region beyond the bounds of its source geometry.
    #[must_use]
    pub fn cut_padding(&self) -> f64 {
        1e3 * self.tolerance
    }
}

/// A closed triangle surface given as indexed triangles.
///
/// Triangle orientation is not used; membership is decided by ray parity.
#[derive(Debug, Clone, Default)]
pub struct TriangleSolid {
    pub vertices: Vec<Point3>,
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleSolid {
    #[must_use]
    pub fn new(vertices: Vec<Point3>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    /// Axis-aligned box with outward-wound triangles.
    #[must_use]
    pub fn make_box(min: Point3, max: Point3) -> Self {
        let vertices = (0..8)
            .map(|i| {
                Point3::new(
                    if i & 1 == 0 { min.x } else { max.x },
                    if i & 2 == 0 { min.y } else { max.y },
                    if i & 4 == 0 { min.z } else { max.z },
                )
            })
            .collect();
        let triangles = vec![
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
        ];
        Self {
            vertices,
            triangles,
        }
    }

    /// Checks that the solid is non-empty and every index is in range.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidSolid`] otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.triangles.is_empty() {
            return Err(GeometryError::InvalidSolid("solid has no triangles".into()).into());
        }
        let count = self.vertices.len();
        if let Some(bad) = self.triangles.iter().flatten().find(|&&i| i >= count) {
            return Err(GeometryError::InvalidSolid(format!(
                "triangle references vertex {bad} of {count}"
            ))
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.vertices)
    }
}

/// Geometric context handed to [`AttributedSolid::map_faces_with`].
#[derive(Debug, Clone, Copy)]
pub struct FaceView {
    pub attributes: AttributeBitset,
    /// Unit normal pointing into the `front` volume.
    pub normal: Vector3,
    pub front: AttributeBitset,
    pub back: AttributeBitset,
}

impl FaceView {
    /// Solid on exactly one side.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.front.is_solid() != self.back.is_solid()
    }

    /// Solid on both sides.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.front.is_solid() && self.back.is_solid()
    }

    /// Normal pointing away from the solid side of an external face.
    #[must_use]
    pub fn outward_normal(&self) -> Vector3 {
        if self.front.is_solid() {
            -self.normal
        } else {
            self.normal
        }
    }
}

/// A partition of space whose features carry attribute bitsets.
#[derive(Debug, Clone)]
pub struct AttributedSolid {
    arrangement: Arrangement,
    params: ArrangementParams,
}

impl AttributedSolid {
    /// Tags the closed solid bounded by `solid` with [`AttributeBitset::solid`]
    /// and everything else with the empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the solid is malformed, or if a cell cannot be
    /// classified.
    pub fn from_solid(solid: &TriangleSolid, params: ArrangementParams) -> Result<Self> {
        solid.validate()?;
        let bounds = solid.bounds();
        let universe = bounds.padded(params.padding(bounds.diagonal()));

        let cuts: Vec<Cut> = solid
            .triangles
            .iter()
            .filter_map(|&[a, b, c]| {
                let v = &solid.vertices;
                Cut::from_triangle(&v[a], &v[b], &v[c], params.cut_padding())
            })
            .collect();
        let mut arrangement = Arrangement::build(universe, &cuts, params.tolerance)?;

        let cell_keys: Vec<_> = arrangement.cells.keys().collect();
        for ck in cell_keys {
            let centre = arrangement.representative(FeatureRef::Cell(ck));
            if point_in_solid(&centre, solid)? {
                arrangement.cells[ck].attributes = AttributeBitset::solid();
            }
        }
        close_over_cells(&mut arrangement);
        simplify::simplify(&mut arrangement);
        debug!(
            triangles = solid.triangles.len(),
            cells = arrangement.cells.len(),
            "built attributed solid"
        );
        Ok(Self {
            arrangement,
            params,
        })
    }

    /// A model that is empty everywhere except for a single vertex at `point`
    /// tagged with [`AttributeBitset::solid`].
    ///
    /// # Errors
    ///
    /// Returns an error if the point arrangement cannot be built.
    pub fn from_point(point: &Point3, params: ArrangementParams) -> Result<Self> {
        let universe = Aabb::from_points([point]).padded(params.padding(0.0));
        let region = Aabb::from_points([point]).padded(params.cut_padding());
        let cuts: Vec<Cut> = (0..3)
            .map(|axis| Cut::new(SplitPlane::axis(axis, point[axis]), region))
            .collect();
        let mut arrangement = Arrangement::build(universe, &cuts, params.tolerance)?;
        let Some(feature @ FeatureRef::Vertex(_)) = arrangement.locate(point) else {
            return Err(GeometryError::Degenerate(format!("no vertex at {point:?}")).into());
        };
        arrangement.set_attributes(feature, AttributeBitset::solid());
        simplify::simplify(&mut arrangement);
        Ok(Self {
            arrangement,
            params,
        })
    }

    #[must_use]
    pub fn params(&self) -> ArrangementParams {
        self.params
    }

    /// Cuts the model is built from, in insertion order.
    #[must_use]
    pub fn cuts(&self) -> &[Cut] {
        &self.arrangement.cuts
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.arrangement.bounds
    }

    #[must_use]
    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    /// Attributes of the feature containing `point`.
    #[must_use]
    pub fn attribute_at(&self, point: &Point3) -> AttributeBitset {
        self.arrangement
            .locate(point)
            .map_or_else(|| self.outer_attributes(), |f| self.arrangement.attributes(f))
    }

    /// Attributes of the unbounded region.
    #[must_use]
    pub fn outer_attributes(&self) -> AttributeBitset {
        self.arrangement.cells[self.arrangement.outer_cell].attributes
    }

    /// Number of arrangement features currently belonging to `kind`.
    #[must_use]
    pub fn feature_count(&self, kind: FeatureKind) -> usize {
        let arr = &self.arrangement;
        match kind {
            FeatureKind::Volume => arr.cells.len(),
            FeatureKind::Face => arr.faces.values().filter(|f| f.kind == kind).count(),
            FeatureKind::Edge => arr.edges.values().filter(|e| e.kind == kind).count(),
            FeatureKind::Vertex => arr.vertices.values().filter(|v| v.kind == kind).count(),
        }
    }

    /// Applies `f` to every feature of every kind.
    pub fn map_everywhere(&mut self, f: impl Fn(AttributeBitset, FeatureKind) -> AttributeBitset) {
        let arr = &mut self.arrangement;
        for cell in arr.cells.values_mut() {
            cell.attributes = f(cell.attributes, cell.kind);
        }
        for face in arr.faces.values_mut() {
            face.attributes = f(face.attributes, face.kind);
        }
        for edge in arr.edges.values_mut() {
            edge.attributes = f(edge.attributes, edge.kind);
        }
        for vertex in arr.vertices.values_mut() {
            vertex.attributes = f(vertex.attributes, vertex.kind);
        }
    }

    /// Applies `f` to volumes only. Boundary features are left untouched.
    pub fn map_volumes(&mut self, f: impl Fn(AttributeBitset) -> AttributeBitset) {
        self.map_kind(FeatureKind::Volume, f);
    }

    pub fn map_faces(&mut self, f: impl Fn(AttributeBitset) -> AttributeBitset) {
        self.map_kind(FeatureKind::Face, f);
    }

    pub fn map_edges(&mut self, f: impl Fn(AttributeBitset) -> AttributeBitset) {
        self.map_kind(FeatureKind::Edge, f);
    }

    pub fn map_vertices(&mut self, f: impl Fn(AttributeBitset) -> AttributeBitset) {
        self.map_kind(FeatureKind::Vertex, f);
    }

    fn map_kind(&mut self, kind: FeatureKind, f: impl Fn(AttributeBitset) -> AttributeBitset) {
        self.map_everywhere(|a, k| if k == kind { f(a) } else { a });
    }

    /// Maps faces with access to their orientation and both adjacent volumes.
    ///
    /// Edges and vertices lying inside a face follow the new face value.
    pub fn map_faces_with(&mut self, f: impl Fn(&FaceView) -> AttributeBitset) {
        let arr = &self.arrangement;
        let updates: Vec<_> = arr
            .faces
            .iter()
            .filter(|(_, face)| face.kind == FeatureKind::Face)
            .filter_map(|(k, face)| {
                let view = FaceView {
                    attributes: face.attributes,
                    normal: arr.planes[face.plane].normal,
                    front: arr.cells[face.front?].attributes,
                    back: arr.cells[face.back?].attributes,
                };
                Some((k, f(&view)))
            })
            .collect();
        let arr = &mut self.arrangement;
        for (k, value) in updates {
            arr.faces[k].attributes = value;
        }

        let arr = &self.arrangement;
        let edge_updates: Vec<_> = arr
            .edges
            .iter()
            .filter(|(_, e)| e.kind == FeatureKind::Face)
            .filter_map(|(k, e)| live_face_value(arr, &e.faces).map(|v| (k, v)))
            .collect();
        let vertex_updates: Vec<_> = arr
            .vertices
            .iter()
            .filter(|(_, v)| v.kind == FeatureKind::Face)
            .filter_map(|(k, v)| live_face_value(arr, &v.faces).map(|value| (k, value)))
            .collect();
        let arr = &mut self.arrangement;
        for (k, value) in edge_updates {
            arr.edges[k].attributes = value;
        }
        for (k, value) in vertex_updates {
            arr.vertices[k].attributes = value;
        }
    }

    /// Maps non-empty bitsets to `one` and empty bitsets to `zero`.
    pub fn binarize(&mut self, one: AttributeBitset, zero: AttributeBitset) {
        self.map_everywhere(|a, _| if a.is_empty() { zero } else { one });
    }

    /// Copy with every bitset complemented.
    #[must_use]
    pub fn complement(&self) -> Self {
        let mut out = self.clone();
        out.map_everywhere(|a, _| a.complement());
        out
    }

    /// Recomputes feature kinds from the current attributes.
    pub fn simplify(&mut self) {
        simplify::simplify(&mut self.arrangement);
    }

    pub(crate) fn into_arrangement(self) -> Arrangement {
        self.arrangement
    }
}

fn live_face_value(arr: &Arrangement, faces: &[arrangement::FaceKey]) -> Option<AttributeBitset> {
    faces
        .iter()
        .map(|f| &arr.faces[*f])
        .find(|f| f.kind == FeatureKind::Face)
        .map(|f| f.attributes)
}

fn any_solid(arr: &Arrangement, cells: impl IntoIterator<Item = arrangement::CellKey>) -> bool {
    cells
        .into_iter()
        .any(|c| arr.cells[c].attributes.is_solid())
}

/// Marks every lower-dimensional feature solid when any incident cell is.
fn close_over_cells(arr: &mut Arrangement) {
    let faces: Vec<_> = arr
        .faces
        .iter()
        .filter(|(_, f)| any_solid(arr, f.cells()))
        .map(|(k, _)| k)
        .collect();
    let edges: Vec<_> = arr
        .edges
        .iter()
        .filter(|(_, e)| any_solid(arr, e.cells.iter().copied()))
        .map(|(k, _)| k)
        .collect();
    let vertices: Vec<_> = arr
        .vertices
        .iter()
        .filter(|(_, v)| any_solid(arr, v.cells.iter().copied()))
        .map(|(k, _)| k)
        .collect();
    for k in faces {
        arr.faces[k].attributes = AttributeBitset::solid();
    }
    for k in edges {
        arr.edges[k].attributes = AttributeBitset::solid();
    }
    for k in vertices {
        arr.vertices[k].attributes = AttributeBitset::solid();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn unit_box() -> AttributedSolid {
        let solid = TriangleSolid::make_box(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
        AttributedSolid::from_solid(&solid, ArrangementParams::default()).unwrap()
    }

    #[test]
    fn box_membership() {
        let model = unit_box();
        assert!(model.attribute_at(&p(0.5, 0.5, 0.5)).is_solid());
        assert!(model.attribute_at(&p(1.0, 0.5, 0.5)).is_solid());
        assert!(model.attribute_at(&p(1.0, 1.0, 1.0)).is_solid());
        assert!(!model.attribute_at(&p(1.5, 0.5, 0.5)).is_solid());
        assert!(!model.attribute_at(&p(50.0, 0.0, 0.0)).is_solid());
        assert!(model.outer_attributes().is_empty());
    }

    #[test]
    fn box_simplifies_to_its_boundary() {
        let model = unit_box();
        assert_eq!(model.feature_count(FeatureKind::Face), 6);
        assert_eq!(model.feature_count(FeatureKind::Edge), 12);
        assert_eq!(model.feature_count(FeatureKind::Vertex), 8);
    }

    #[test]
    fn point_model_has_one_vertex() {
        let model =
            AttributedSolid::from_point(&p(0.2, 0.3, 0.4), ArrangementParams::default()).unwrap();
        assert_eq!(model.feature_count(FeatureKind::Vertex), 1);
        assert_eq!(model.feature_count(FeatureKind::Face), 0);
        assert!(model.attribute_at(&p(0.2, 0.3, 0.4)).is_solid());
        assert!(model.attribute_at(&p(0.2, 0.3, 0.5)).is_empty());
    }

    #[test]
    fn map_volumes_leaves_boundary_alone() {
        let mut model = unit_box();
        model.map_volumes(|a| if a.is_solid() { a.with(3) } else { a });
        assert!(model.attribute_at(&p(0.5, 0.5, 0.5)).contains(3));
        assert!(!model.attribute_at(&p(1.0, 0.5, 0.5)).contains(3));
        assert!(!model.attribute_at(&p(2.0, 0.5, 0.5)).contains(3));
    }

    #[test]
    fn map_faces_with_sees_outward_normals() {
        let mut model = unit_box();
        model.map_faces_with(|view| {
            if view.is_external() && view.outward_normal().z > 0.5 {
                view.attributes.with(2)
            } else {
                view.attributes
            }
        });
        assert!(model.attribute_at(&p(0.5, 0.5, 1.0)).contains(2));
        assert!(model.attribute_at(&p(0.3, 0.7, 1.0)).contains(2));
        assert!(!model.attribute_at(&p(0.5, 0.5, 0.0)).contains(2));
        assert!(!model.attribute_at(&p(1.0, 0.5, 0.5)).contains(2));
    }

    #[test]
    fn binarize_is_idempotent() {
        let mut model = unit_box();
        model.map_volumes(|a| if a.is_solid() { a.with(5) } else { a });
        let one = AttributeBitset::all();
        let zero = AttributeBitset::empty();
        model.binarize(one, zero);
        let once: Vec<_> = [p(0.5, 0.5, 0.5), p(1.0, 0.5, 0.5), p(3.0, 0.0, 0.0)]
            .iter()
            .map(|q| model.attribute_at(q))
            .collect();
        model.binarize(one, zero);
        let twice: Vec<_> = [p(0.5, 0.5, 0.5), p(1.0, 0.5, 0.5), p(3.0, 0.0, 0.0)]
            .iter()
            .map(|q| model.attribute_at(q))
            .collect();
        assert_eq!(once, twice);
        assert_eq!(once, vec![one, one, zero]);
    }

    /// Closed UV sphere of unit radius around the origin.
    #[allow(clippy::cast_precision_loss)]
    fn uv_sphere(segments: usize, stacks: usize) -> TriangleSolid {
        let mut vertices = vec![p(0.0, 0.0, 1.0)];
        for r in 1..stacks {
            let theta = std::f64::consts::PI * r as f64 / stacks as f64;
            for s in 0..segments {
                let phi = std::f64::consts::TAU * s as f64 / segments as f64;
                vertices.push(p(
                    theta.sin() * phi.cos(),
                    theta.sin() * phi.sin(),
                    theta.cos(),
                ));
            }
        }
        let south = vertices.len();
        vertices.push(p(0.0, 0.0, -1.0));

        let ring = |r: usize, s: usize| 1 + (r - 1) * segments + s % segments;
        let mut triangles = Vec::new();
        for s in 0..segments {
            triangles.push([0, ring(1, s), ring(1, s + 1)]);
            for r in 1..stacks - 1 {
                let (a, b) = (ring(r, s), ring(r, s + 1));
                let (c, d) = (ring(r + 1, s), ring(r + 1, s + 1));
                triangles.push([a, c, d]);
                triangles.push([a, d, b]);
            }
            triangles.push([south, ring(stacks - 1, s + 1), ring(stacks - 1, s)]);
        }
        TriangleSolid::new(vertices, triangles)
    }

    #[test]
    fn faceted_solid_is_cut_locally() {
        let sphere = uv_sphere(8, 4);
        let params = ArrangementParams::default();
        let model = AttributedSolid::from_solid(&sphere, params).unwrap();
        assert!(model.attribute_at(&p(0.0, 0.0, 0.0)).is_solid());
        assert!(model.attribute_at(&p(0.1, -0.1, 0.8)).is_solid());
        assert!(model.attribute_at(&p(0.0, 0.0, 1.0)).is_solid());
        assert!(!model.attribute_at(&p(0.0, 0.0, 1.2)).is_solid());
        assert!(!model.attribute_at(&p(0.8, 0.8, 0.0)).is_solid());

        let planes: Vec<Cut> = model.arrangement().planes[arrangement::UNIVERSE_PLANES..]
            .iter()
            .map(|plane| Cut::unbounded(*plane))
            .collect();
        let global = Arrangement::build(model.bounds(), &planes, params.tolerance).unwrap();
        let local = model.feature_count(FeatureKind::Volume);
        assert!(
            local * 2 < global.cells.len(),
            "{local} local cells against {} for the full arrangement",
            global.cells.len()
        );
    }

    #[test]
    fn faceted_solid_extracts_one_closed_surface() {
        let sphere = uv_sphere(8, 4);
        let expected_area: f64 = sphere
            .triangles
            .iter()
            .map(|&[a, b, c]| {
                let v = &sphere.vertices;
                (v[b] - v[a]).cross(&(v[c] - v[a])).norm() / 2.0
            })
            .sum();
        let model = AttributedSolid::from_solid(&sphere, ArrangementParams::default()).unwrap();
        let rep = crate::brep::Extract::new(model).execute().unwrap();
        assert_eq!(rep.volumes().count(), 2);
        assert_eq!(rep.surfaces().count(), 1);
        assert_eq!(rep.borders().count(), 0);
        let (sid, _) = rep.surfaces().next().unwrap();
        assert!((rep.surface_area(sid).unwrap() - expected_area).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_bad_index() {
        let solid = TriangleSolid::new(vec![p(0.0, 0.0, 0.0)], vec![[0, 1, 2]]);
        assert!(solid.validate().is_err());
        assert!(TriangleSolid::default().validate().is_err());
    }
}
