use std::collections::{HashMap, HashSet};

use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, trace};

use super::plane::{Side, SplitPlane};
use super::FeatureKind;
use crate::attribute::AttributeBitset;
use crate::error::{GeometryError, Result};
use crate::math::polygon_3d::{centroid, newell_normal};
use crate::math::{Aabb, Point3};

slotmap::new_key_type! {
    /// Key of an arrangement vertex.
    pub struct VertexKey;
    /// Key of an arrangement edge.
    pub struct EdgeKey;
    /// Key of an arrangement face.
    pub struct FaceKey;
    /// Key of an arrangement cell.
    pub struct CellKey;
}

/// Number of leading planes that bound the universe box.
pub const UNIVERSE_PLANES: usize = 6;

#[derive(Debug, Clone)]
pub struct VertexRec {
    pub point: Point3,
    pub attributes: AttributeBitset,
    pub kind: FeatureKind,
    pub on_universe: bool,
    pub edges: Vec<EdgeKey>,
    pub faces: Vec<FaceKey>,
    pub cells: Vec<CellKey>,
}

impl VertexRec {
    fn new(point: Point3) -> Self {
        Self {
            point,
            attributes: AttributeBitset::empty(),
            kind: FeatureKind::Volume,
            on_universe: false,
            edges: Vec::new(),
            faces: Vec::new(),
            cells: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeRec {
    pub ends: [VertexKey; 2],
    pub faces: Vec<FaceKey>,
    pub cells: Vec<CellKey>,
    pub attributes: AttributeBitset,
    pub kind: FeatureKind,
    pub on_universe: bool,
}

/// A convex polygon of the arrangement.
///
/// `vertices` run counter-clockwise around the normal of `planes[plane]`;
/// `front` is the cell on the side that normal points to.
#[derive(Debug, Clone)]
pub struct FaceRec {
    pub vertices: Vec<VertexKey>,
    pub plane: usize,
    pub front: Option<CellKey>,
    pub back: Option<CellKey>,
    pub attributes: AttributeBitset,
    pub kind: FeatureKind,
}

impl FaceRec {
    #[must_use]
    pub fn on_universe(&self) -> bool {
        self.plane < UNIVERSE_PLANES
    }

    pub fn cells(&self) -> impl Iterator<Item = CellKey> {
        self.front.into_iter().chain(self.back)
    }

    /// Whether the face traverses `a -> b` in its stored loop order.
    #[must_use]
    pub fn traverses(&self, a: VertexKey, b: VertexKey) -> bool {
        let n = self.vertices.len();
        (0..n).any(|i| self.vertices[i] == a && self.vertices[(i + 1) % n] == b)
    }
}

#[derive(Debug, Clone)]
pub struct CellRec {
    pub faces: Vec<FaceKey>,
    pub attributes: AttributeBitset,
    pub kind: FeatureKind,
}

/// Reference to any feature of an [`Arrangement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureRef {
    Vertex(VertexKey),
    Edge(EdgeKey),
    Face(FaceKey),
    Cell(CellKey),
}

/// A plane that splits only the cells it crosses inside `region`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cut {
    pub plane: SplitPlane,
    pub region: Aabb,
}

impl Cut {
    #[must_use]
    pub fn new(plane: SplitPlane, region: Aabb) -> Self {
        Self { plane, region }
    }

    /// A cut through every cell the plane crosses.
    #[must_use]
    pub fn unbounded(plane: SplitPlane) -> Self {
        let far = f64::INFINITY;
        Self::new(
            plane,
            Aabb {
                min: Point3::new(-far, -far, -far),
                max: Point3::new(far, far, far),
            },
        )
    }

    /// Cut along the supporting plane of a triangle, confined to the
    /// triangle's bounds grown by `padding`. `None` for a degenerate triangle.
    pub fn from_triangle(a: &Point3, b: &Point3, c: &Point3, padding: f64) -> Option<Self> {
        let plane = SplitPlane::from_triangle(a, b, c)?;
        Some(Self::new(plane, Aabb::from_points([a, b, c]).padded(padding)))
    }
}

/// Node of the split tree recorded while cells are cut.
#[derive(Debug, Clone, Copy)]
enum SplitNode {
    Leaf(CellKey),
    Split {
        plane: usize,
        above: usize,
        below: usize,
    },
}

/// Convex cell decomposition of a bounding box by bounded plane cuts.
///
/// A cut splits every cell that it crosses and whose bounds overlap its
/// region. Vertices created on a split edge are threaded into every face
/// sharing that edge, so adjacent faces share vertices and edges exactly.
#[derive(Debug, Clone)]
pub struct Arrangement {
    pub planes: Vec<SplitPlane>,
    pub cuts: Vec<Cut>,
    pub bounds: Aabb,
    pub tolerance: f64,
    pub vertices: SlotMap<VertexKey, VertexRec>,
    pub edges: SlotMap<EdgeKey, EdgeRec>,
    pub faces: SlotMap<FaceKey, FaceRec>,
    pub cells: SlotMap<CellKey, CellRec>,
    pub outer_cell: CellKey,
    corner: VertexKey,
    tree: Vec<SplitNode>,
    leaf_of: SecondaryMap<CellKey, usize>,
}

impl Arrangement {
    /// Builds the decomposition of `bounds` by `cuts`, applied in order.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] if a cut produces a non-convex
    /// split, which indicates planes closer than `tolerance`.
    pub fn build(bounds: Aabb, cuts: &[Cut], tolerance: f64) -> Result<Self> {
        let mut arrangement = Self::universe(bounds, tolerance);
        for cut in cuts {
            arrangement.insert(*cut)?;
        }
        arrangement.finish()?;
        debug!(
            planes = arrangement.planes.len(),
            cuts = arrangement.cuts.len(),
            vertices = arrangement.vertices.len(),
            edges = arrangement.edges.len(),
            faces = arrangement.faces.len(),
            cells = arrangement.cells.len(),
            "built cell decomposition"
        );
        Ok(arrangement)
    }

    fn universe(bounds: Aabb, tolerance: f64) -> Self {
        let mut vertices = SlotMap::with_key();
        let corners: [VertexKey; 8] = std::array::from_fn(|i| {
            let pick = |bit: usize, axis: usize| {
                if i & bit == 0 {
                    bounds.min[axis]
                } else {
                    bounds.max[axis]
                }
            };
            vertices.insert(VertexRec::new(Point3::new(pick(1, 0), pick(2, 1), pick(4, 2))))
        });

        let mut cells = SlotMap::with_key();
        let cell = cells.insert(CellRec {
            faces: Vec::new(),
            attributes: AttributeBitset::empty(),
            kind: FeatureKind::Volume,
        });

        let sides: [(usize, f64, [usize; 4], bool); 6] = [
            (0, bounds.min.x, [0, 2, 6, 4], true),
            (0, bounds.max.x, [1, 3, 7, 5], false),
            (1, bounds.min.y, [0, 4, 5, 1], true),
            (1, bounds.max.y, [2, 6, 7, 3], false),
            (2, bounds.min.z, [0, 1, 3, 2], true),
            (2, bounds.max.z, [4, 5, 7, 6], false),
        ];

        let mut planes = Vec::with_capacity(UNIVERSE_PLANES);
        let mut faces = SlotMap::with_key();
        for (index, (axis, value, corner_ids, inside_above)) in sides.into_iter().enumerate() {
            let plane = SplitPlane::axis(axis, value);
            let mut loop_keys: Vec<VertexKey> = corner_ids.iter().map(|&c| corners[c]).collect();
            let points: Vec<Point3> = loop_keys.iter().map(|k| vertices[*k].point).collect();
            if newell_normal(&points).dot(&plane.normal) < 0.0 {
                loop_keys.reverse();
            }
            planes.push(plane);
            let (front, back) = if inside_above {
                (Some(cell), None)
            } else {
                (None, Some(cell))
            };
            let face = faces.insert(FaceRec {
                vertices: loop_keys,
                plane: index,
                front,
                back,
                attributes: AttributeBitset::empty(),
                kind: FeatureKind::Volume,
            });
            cells[cell].faces.push(face);
        }

        let mut leaf_of = SecondaryMap::new();
        leaf_of.insert(cell, 0);
        Self {
            planes,
            cuts: Vec::new(),
            bounds,
            tolerance,
            vertices,
            edges: SlotMap::with_key(),
            faces,
            cells,
            outer_cell: cell,
            corner: corners[0],
            tree: vec![SplitNode::Leaf(cell)],
            leaf_of,
        }
    }

    fn insert(&mut self, cut: Cut) -> Result<()> {
        let tol = self.tolerance;
        let plane_index = if let Some(i) = self
            .planes
            .iter()
            .position(|p| p.coincides(&cut.plane, tol))
        {
            i
        } else {
            self.planes.push(cut.plane);
            self.planes.len() - 1
        };
        let plane = self.planes[plane_index];
        self.cuts.push(cut);

        let mut sides: HashMap<VertexKey, Side> = self
            .vertices
            .iter()
            .map(|(k, v)| (k, plane.side(&v.point, tol)))
            .collect();
        let targets: Vec<CellKey> = self
            .cells
            .keys()
            .filter(|ck| {
                let keys = self.cell_vertices(*ck);
                let above = keys.iter().any(|v| side_of(&sides, *v) == Side::Above);
                let below = keys.iter().any(|v| side_of(&sides, *v) == Side::Below);
                above
                    && below
                    && Aabb::from_points(keys.iter().map(|v| &self.vertices[*v].point))
                        .overlaps(&cut.region)
            })
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        let target_set: HashSet<CellKey> = targets.iter().copied().collect();

        // Split the faces of crossed cells.
        let mut split_faces: Vec<FaceKey> = targets
            .iter()
            .flat_map(|ck| self.cells[*ck].faces.iter().copied())
            .collect();
        split_faces.sort_unstable();
        split_faces.dedup();

        let mut splits: HashMap<(VertexKey, VertexKey), VertexKey> = HashMap::new();
        let mut face_side: HashMap<FaceKey, Side> = HashMap::new();
        let mut lower_part: HashMap<FaceKey, FaceKey> = HashMap::new();
        for &fk in &split_faces {
            let original = self.faces[fk].vertices.clone();
            let n = original.len();
            let mut refined = Vec::with_capacity(n + 2);
            for i in 0..n {
                let a = original[i];
                let b = original[(i + 1) % n];
                refined.push(a);
                let (sa, sb) = (side_of(&sides, a), side_of(&sides, b));
                let crossing = matches!(
                    (sa, sb),
                    (Side::Above, Side::Below) | (Side::Below, Side::Above)
                );
                if !crossing {
                    continue;
                }
                let key = ordered(a, b);
                let w = if let Some(&w) = splits.get(&key) {
                    w
                } else {
                    let pa = self.vertices[key.0].point;
                    let pb = self.vertices[key.1].point;
                    let da = plane.signed_distance(&pa);
                    let db = plane.signed_distance(&pb);
                    let t = da / (da - db);
                    let w = self.vertices.insert(VertexRec::new(pa + (pb - pa) * t));
                    sides.insert(w, Side::On);
                    splits.insert(key, w);
                    w
                };
                refined.push(w);
            }

            let has_above = refined.iter().any(|v| side_of(&sides, *v) == Side::Above);
            let has_below = refined.iter().any(|v| side_of(&sides, *v) == Side::Below);
            match (has_above, has_below) {
                (false, false) => {
                    return Err(GeometryError::Degenerate(
                        "face lies within an inserted plane".into(),
                    )
                    .into());
                }
                (true, false) => {
                    face_side.insert(fk, Side::Above);
                }
                (false, true) => {
                    face_side.insert(fk, Side::Below);
                }
                (true, true) => {
                    let (upper, lower) = split_loop(&refined, &sides)?;
                    let mut lower_face = self.faces[fk].clone();
                    lower_face.vertices = lower;
                    self.faces[fk].vertices = upper;
                    let lk = self.faces.insert(lower_face);
                    face_side.insert(fk, Side::Above);
                    face_side.insert(lk, Side::Below);
                    lower_part.insert(fk, lk);
                }
            }
        }

        // Thread new vertices into untouched faces sharing a split edge.
        let untouched: Vec<FaceKey> = self
            .faces
            .keys()
            .filter(|fk| !face_side.contains_key(fk))
            .collect();
        for fk in untouched {
            let original = &self.faces[fk].vertices;
            let n = original.len();
            let mut refined = Vec::with_capacity(n + 1);
            for i in 0..n {
                refined.push(original[i]);
                if let Some(&w) = splits.get(&ordered(original[i], original[(i + 1) % n])) {
                    refined.push(w);
                }
            }
            if refined.len() != n {
                self.faces[fk].vertices = refined;
            }
        }

        // Split crossed cells.
        let cell_keys: Vec<CellKey> = self.cells.keys().collect();
        for ck in cell_keys {
            let mut faces = Vec::with_capacity(self.cells[ck].faces.len() + 2);
            for &f in &self.cells[ck].faces {
                faces.push(f);
                if let Some(&l) = lower_part.get(&f) {
                    faces.push(l);
                }
            }
            if !target_set.contains(&ck) {
                self.cells[ck].faces = faces;
                continue;
            }
            let (above, below): (Vec<FaceKey>, Vec<FaceKey>) = faces
                .iter()
                .copied()
                .partition(|f| face_side.get(f) == Some(&Side::Above));
            if above.is_empty() || below.is_empty() {
                return Err(GeometryError::Degenerate(
                    "crossed cell has no faces on one side".into(),
                )
                .into());
            }

            let section = self.section_loop(&above, &sides, &plane)?;
            let attributes = self.cells[ck].attributes;
            let lower_cell = self.cells.insert(CellRec {
                faces: below.clone(),
                attributes,
                kind: FeatureKind::Volume,
            });
            let section_face = self.faces.insert(FaceRec {
                vertices: section,
                plane: plane_index,
                front: Some(ck),
                back: Some(lower_cell),
                attributes,
                kind: FeatureKind::Volume,
            });
            for f in &below {
                let face = &mut self.faces[*f];
                if face.front == Some(ck) {
                    face.front = Some(lower_cell);
                }
                if face.back == Some(ck) {
                    face.back = Some(lower_cell);
                }
            }
            self.cells[lower_cell].faces.push(section_face);
            let mut upper_faces = above;
            upper_faces.push(section_face);
            self.cells[ck].faces = upper_faces;
            self.split_leaf(ck, lower_cell, plane_index);
        }
        trace!(
            plane = plane_index,
            split_faces = lower_part.len(),
            split_cells = targets.len(),
            "inserted cut"
        );
        Ok(())
    }

    /// Records that `upper` was cut by `plane`, leaving `lower` below it.
    fn split_leaf(&mut self, upper: CellKey, lower: CellKey, plane: usize) {
        let Some(&node) = self.leaf_of.get(upper) else {
            return;
        };
        let above = self.tree.len();
        self.tree.push(SplitNode::Leaf(upper));
        self.tree.push(SplitNode::Leaf(lower));
        self.tree[node] = SplitNode::Split {
            plane,
            above,
            below: above + 1,
        };
        self.leaf_of.insert(upper, above);
        self.leaf_of.insert(lower, above + 1);
    }

    /// Cross-section polygon of a cell, chained from the on-plane edges of its
    /// faces above the plane and oriented along the plane normal.
    fn section_loop(
        &self,
        above: &[FaceKey],
        sides: &HashMap<VertexKey, Side>,
        plane: &SplitPlane,
    ) -> Result<Vec<VertexKey>> {
        let mut adjacency: HashMap<VertexKey, Vec<VertexKey>> = HashMap::new();
        for f in above {
            let loop_keys = &self.faces[*f].vertices;
            let n = loop_keys.len();
            for i in 0..n {
                let a = loop_keys[i];
                let b = loop_keys[(i + 1) % n];
                if side_of(sides, a) == Side::On && side_of(sides, b) == Side::On {
                    adjacency.entry(a).or_default().push(b);
                    adjacency.entry(b).or_default().push(a);
                }
            }
        }
        let degenerate =
            || GeometryError::Degenerate("cell cross-section is not a simple loop".into());
        if adjacency.len() < 3 || adjacency.values().any(|n| n.len() != 2) {
            return Err(degenerate().into());
        }

        let start = *adjacency.keys().min().ok_or_else(degenerate)?;
        let mut chain = vec![start];
        let mut prev = start;
        let mut current = adjacency[&start][0];
        while current != start {
            if chain.len() > adjacency.len() {
                return Err(degenerate().into());
            }
            chain.push(current);
            let next = adjacency[&current]
                .iter()
                .copied()
                .find(|&v| v != prev)
                .ok_or_else(degenerate)?;
            prev = current;
            current = next;
        }
        if chain.len() != adjacency.len() {
            return Err(degenerate().into());
        }

        let points: Vec<Point3> = chain.iter().map(|k| self.vertices[*k].point).collect();
        if newell_normal(&points).dot(&plane.normal) < 0.0 {
            chain.reverse();
        }
        Ok(chain)
    }

    /// Derives edges, incidences and universe flags.
    fn finish(&mut self) -> Result<()> {
        self.edges.clear();
        for v in self.vertices.values_mut() {
            v.edges.clear();
            v.faces.clear();
            v.cells.clear();
            v.on_universe = false;
        }

        let mut by_ends: HashMap<(VertexKey, VertexKey), EdgeKey> = HashMap::new();
        for (fk, face) in &self.faces {
            let n = face.vertices.len();
            for i in 0..n {
                let a = face.vertices[i];
                let b = face.vertices[(i + 1) % n];
                let key = ordered(a, b);
                let ek = *by_ends.entry(key).or_insert_with(|| {
                    self.edges.insert(EdgeRec {
                        ends: [key.0, key.1],
                        faces: Vec::new(),
                        cells: Vec::new(),
                        attributes: AttributeBitset::empty(),
                        kind: FeatureKind::Volume,
                        on_universe: false,
                    })
                });
                let edge = &mut self.edges[ek];
                edge.faces.push(fk);
                edge.cells.extend(face.cells());
                edge.on_universe |= face.on_universe();

                let vertex = &mut self.vertices[a];
                vertex.faces.push(fk);
                vertex.cells.extend(face.cells());
                vertex.on_universe |= face.on_universe();
            }
        }
        for (ek, edge) in &mut self.edges {
            edge.cells.sort_unstable();
            edge.cells.dedup();
            for v in edge.ends {
                self.vertices[v].edges.push(ek);
            }
        }
        for v in self.vertices.values_mut() {
            v.cells.sort_unstable();
            v.cells.dedup();
        }

        self.outer_cell = self.vertices[self.corner]
            .cells
            .first()
            .copied()
            .ok_or_else(|| GeometryError::Degenerate("universe corner has no cell".into()))?;

        Ok(())
    }

    /// A point in the relative interior of `feature`.
    #[must_use]
    pub fn representative(&self, feature: FeatureRef) -> Point3 {
        match feature {
            FeatureRef::Vertex(k) => self.vertices[k].point,
            FeatureRef::Edge(k) => {
                let [a, b] = self.edges[k].ends;
                nalgebra::center(&self.vertices[a].point, &self.vertices[b].point)
            }
            FeatureRef::Face(k) => centroid(&self.face_points(k)),
            FeatureRef::Cell(k) => {
                let points: Vec<Point3> = self
                    .cell_vertices(k)
                    .iter()
                    .map(|v| self.vertices[*v].point)
                    .collect();
                centroid(&points)
            }
        }
    }

    /// Distinct vertices on the boundary of a cell.
    #[must_use]
    pub fn cell_vertices(&self, cell: CellKey) -> Vec<VertexKey> {
        let mut keys: Vec<VertexKey> = self.cells[cell]
            .faces
            .iter()
            .flat_map(|f| self.faces[*f].vertices.iter().copied())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    #[must_use]
    pub fn face_points(&self, face: FaceKey) -> Vec<Point3> {
        self.faces[face]
            .vertices
            .iter()
            .map(|v| self.vertices[*v].point)
            .collect()
    }

    /// The feature whose relative interior contains `p`, if `p` lies inside
    /// the bounds away from the universe boundary.
    #[must_use]
    pub fn locate(&self, p: &Point3) -> Option<FeatureRef> {
        let tol = self.tolerance;
        let inside = (0..3)
            .all(|i| p[i] > self.bounds.min[i] + tol && p[i] < self.bounds.max[i] - tol);
        if !inside {
            return None;
        }
        let mut node = 0;
        let cell = loop {
            match self.tree[node] {
                SplitNode::Leaf(cell) => break cell,
                SplitNode::Split {
                    plane,
                    above,
                    below,
                } => {
                    node = if self.planes[plane].side(p, tol) == Side::Below {
                        below
                    } else {
                        above
                    };
                }
            }
        };
        Some(self.feature_in_cell(cell, p))
    }

    /// Lowest-dimensional feature of the closure of `cell` containing `p`.
    fn feature_in_cell(&self, cell: CellKey, p: &Point3) -> FeatureRef {
        let tol = self.tolerance;
        let faces = &self.cells[cell].faces;
        let keys = self.cell_vertices(cell);
        if let Some(v) = keys
            .iter()
            .find(|v| (self.vertices[**v].point - *p).norm() <= tol)
        {
            return FeatureRef::Vertex(*v);
        }
        for fk in faces {
            let loop_keys = &self.faces[*fk].vertices;
            let n = loop_keys.len();
            for i in 0..n {
                let (a, b) = (loop_keys[i], loop_keys[(i + 1) % n]);
                let (pa, pb) = (&self.vertices[a].point, &self.vertices[b].point);
                if !on_segment(p, pa, pb, tol) {
                    continue;
                }
                if let Some(edge) = self.edge_between(a, b) {
                    return FeatureRef::Edge(edge);
                }
            }
        }
        for fk in faces {
            let face = &self.faces[*fk];
            let plane = &self.planes[face.plane];
            if plane.side(p, tol) == Side::On && self.face_contains(*fk, p) {
                return FeatureRef::Face(*fk);
            }
        }
        FeatureRef::Cell(cell)
    }

    fn edge_between(&self, a: VertexKey, b: VertexKey) -> Option<EdgeKey> {
        self.vertices[a]
            .edges
            .iter()
            .copied()
            .find(|e| self.edges[*e].ends.contains(&b))
    }

    /// Whether `p`, lying on the face plane, falls inside the convex loop.
    fn face_contains(&self, face: FaceKey, p: &Point3) -> bool {
        let normal = self.planes[self.faces[face].plane].normal;
        let points = self.face_points(face);
        let n = points.len();
        (0..n).all(|i| {
            let edge = points[(i + 1) % n] - points[i];
            normal.cross(&edge).dot(&(*p - points[i])) >= -self.tolerance * edge.norm()
        })
    }

    #[must_use]
    pub fn attributes(&self, feature: FeatureRef) -> AttributeBitset {
        match feature {
            FeatureRef::Vertex(k) => self.vertices[k].attributes,
            FeatureRef::Edge(k) => self.edges[k].attributes,
            FeatureRef::Face(k) => self.faces[k].attributes,
            FeatureRef::Cell(k) => self.cells[k].attributes,
        }
    }

    pub fn set_attributes(&mut self, feature: FeatureRef, attributes: AttributeBitset) {
        match feature {
            FeatureRef::Vertex(k) => self.vertices[k].attributes = attributes,
            FeatureRef::Edge(k) => self.edges[k].attributes = attributes,
            FeatureRef::Face(k) => self.faces[k].attributes = attributes,
            FeatureRef::Cell(k) => self.cells[k].attributes = attributes,
        }
    }

    /// Every feature, cells first.
    pub fn features(&self) -> impl Iterator<Item = FeatureRef> + '_ {
        self.cells
            .keys()
            .map(FeatureRef::Cell)
            .chain(self.faces.keys().map(FeatureRef::Face))
            .chain(self.edges.keys().map(FeatureRef::Edge))
            .chain(self.vertices.keys().map(FeatureRef::Vertex))
    }
}

fn side_of(sides: &HashMap<VertexKey, Side>, v: VertexKey) -> Side {
    sides.get(&v).copied().unwrap_or(Side::On)
}

fn ordered(a: VertexKey, b: VertexKey) -> (VertexKey, VertexKey) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Whether `p` lies within `tolerance` of the segment `a`-`b`.
fn on_segment(p: &Point3, a: &Point3, b: &Point3, tolerance: f64) -> bool {
    let ab = b - a;
    let length_squared = ab.norm_squared();
    if length_squared == 0.0 {
        return false;
    }
    let t = (p - a).dot(&ab) / length_squared;
    (0.0..=1.0).contains(&t) && (a + ab * t - p).norm() <= tolerance
}

/// Splits a convex loop whose vertices lie on both sides of a plane into the
/// part above and the part below. Both parts keep the loop orientation.
fn split_loop(
    refined: &[VertexKey],
    sides: &HashMap<VertexKey, Side>,
) -> Result<(Vec<VertexKey>, Vec<VertexKey>)> {
    let n = refined.len();
    let s = |i: usize| side_of(sides, refined[i % n]);
    let degenerate = || GeometryError::Degenerate("non-convex face split".into());

    let i0 = (0..n).find(|&i| s(i) == Side::Above).ok_or_else(degenerate)?;
    let j = (1..=n)
        .map(|d| (i0 + d) % n)
        .find(|&i| s(i) == Side::Below)
        .ok_or_else(degenerate)?;
    let k = (1..=n)
        .map(|d| (j + d) % n)
        .find(|&i| s(i) == Side::Above)
        .ok_or_else(degenerate)?;
    let c1 = (j + n - 1) % n;
    let c2 = (k + n - 1) % n;
    if s(c1) != Side::On || s(c2) != Side::On {
        return Err(degenerate().into());
    }

    let walk = |from: usize, to: usize| {
        let mut out = Vec::new();
        let mut i = from;
        loop {
            out.push(refined[i]);
            if i == to {
                break;
            }
            i = (i + 1) % n;
        }
        out
    };
    let upper = walk(c2, c1);
    let lower = walk(c1, c2);
    let clean = upper.iter().all(|v| side_of(sides, *v) != Side::Below)
        && lower.iter().all(|v| side_of(sides, *v) != Side::Above);
    if !clean || upper.len() < 3 || lower.len() < 3 {
        return Err(degenerate().into());
    }
    Ok((upper, lower))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn unit_bounds() -> Aabb {
        Aabb::from_points([p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)].iter())
    }

    fn everywhere(planes: &[SplitPlane]) -> Vec<Cut> {
        planes.iter().map(|plane| Cut::unbounded(*plane)).collect()
    }

    fn euler(arr: &Arrangement) -> i64 {
        let v = i64::try_from(arr.vertices.len()).unwrap();
        let e = i64::try_from(arr.edges.len()).unwrap();
        let f = i64::try_from(arr.faces.len()).unwrap();
        let c = i64::try_from(arr.cells.len()).unwrap();
        v - e + f - c
    }

    #[test]
    fn empty_universe_is_a_box() {
        let arr = Arrangement::build(unit_bounds(), &[], 1e-9).unwrap();
        assert_eq!(arr.vertices.len(), 8);
        assert_eq!(arr.edges.len(), 12);
        assert_eq!(arr.faces.len(), 6);
        assert_eq!(arr.cells.len(), 1);
        assert!(arr.edges.values().all(|e| e.faces.len() == 2));
    }

    #[test]
    fn one_plane_splits_the_box() {
        let cuts = everywhere(&[SplitPlane::axis(2, 0.5)]);
        let arr = Arrangement::build(unit_bounds(), &cuts, 1e-9).unwrap();
        assert_eq!(arr.vertices.len(), 12);
        assert_eq!(arr.edges.len(), 20);
        assert_eq!(arr.faces.len(), 11);
        assert_eq!(arr.cells.len(), 2);
        assert_eq!(euler(&arr), 1);

        let section = arr.faces.values().find(|f| f.plane == UNIVERSE_PLANES).unwrap();
        assert!(section.front.is_some() && section.back.is_some());
        let points: Vec<Point3> = section.vertices.iter().map(|v| arr.vertices[*v].point).collect();
        assert!(newell_normal(&points).dot(&Vector3::z()) > 0.0);
        let front = arr.representative(FeatureRef::Cell(section.front.unwrap()));
        assert!(front.z > 0.5);
    }

    #[test]
    fn oblique_planes_stay_conforming() {
        let planes = [
            SplitPlane::through(&Vector3::new(1.0, 1.0, 0.0), &p(0.5, 0.5, 0.5)).unwrap(),
            SplitPlane::through(&Vector3::new(0.0, 1.0, 1.0), &p(0.4, 0.4, 0.4)).unwrap(),
            SplitPlane::axis(0, 0.3),
        ];
        let arr = Arrangement::build(unit_bounds(), &everywhere(&planes), 1e-9).unwrap();
        assert_eq!(euler(&arr), 1);
        for edge in arr.edges.values() {
            let minimum = if edge.on_universe { 2 } else { 4 };
            assert!(edge.faces.len() >= minimum);
        }
        for (key, face) in &arr.faces {
            let n = newell_normal(&arr.face_points(key));
            assert!(n.dot(&arr.planes[face.plane].normal) > 0.0);
        }
    }

    #[test]
    fn locate_finds_every_feature_kind() {
        let planes = [SplitPlane::axis(0, 0.5), SplitPlane::axis(1, 0.5), SplitPlane::axis(2, 0.5)];
        let arr = Arrangement::build(unit_bounds(), &everywhere(&planes), 1e-9).unwrap();
        assert_eq!(arr.cells.len(), 8);
        assert!(matches!(arr.locate(&p(0.5, 0.5, 0.5)), Some(FeatureRef::Vertex(_))));
        assert!(matches!(arr.locate(&p(0.5, 0.5, 0.7)), Some(FeatureRef::Edge(_))));
        assert!(matches!(arr.locate(&p(0.5, 0.2, 0.7)), Some(FeatureRef::Face(_))));
        assert!(matches!(arr.locate(&p(0.1, 0.2, 0.7)), Some(FeatureRef::Cell(_))));
        assert_eq!(arr.locate(&p(2.0, 0.5, 0.5)), None);
        let outer = arr.representative(FeatureRef::Cell(arr.outer_cell));
        assert!(outer.x < 0.5 && outer.y < 0.5 && outer.z < 0.5);
    }

    #[test]
    fn located_cells_contain_the_point() {
        let planes = [
            SplitPlane::through(&Vector3::new(1.0, 2.0, 0.5), &p(0.5, 0.5, 0.5)).unwrap(),
            SplitPlane::axis(1, 0.3),
            SplitPlane::through(&Vector3::new(-1.0, 0.5, 1.0), &p(0.6, 0.4, 0.5)).unwrap(),
        ];
        let arr = Arrangement::build(unit_bounds(), &everywhere(&planes), 1e-9).unwrap();
        for ck in arr.cells.keys() {
            let centre = arr.representative(FeatureRef::Cell(ck));
            assert_eq!(arr.locate(&centre), Some(FeatureRef::Cell(ck)));
        }
    }

    #[test]
    fn bounded_cut_leaves_distant_cells_whole() {
        let region = Aabb::from_points([p(0.0, 0.0, 0.5), p(0.3, 1.0, 0.5)].iter());
        let cuts = [
            Cut::unbounded(SplitPlane::axis(0, 0.5)),
            Cut::new(SplitPlane::axis(2, 0.5), region),
        ];
        let arr = Arrangement::build(unit_bounds(), &cuts, 1e-9).unwrap();
        assert_eq!(arr.cells.len(), 3);
        assert_eq!(euler(&arr), 1);
        assert!(arr.edges.values().all(|e| e.faces.len() >= 2));

        // The whole half keeps its side faces, now with threaded vertices.
        let right = arr.locate(&p(0.8, 0.5, 0.5)).unwrap();
        let FeatureRef::Cell(right) = right else {
            panic!("expected a cell, found {right:?}");
        };
        assert_eq!(arr.cells[right].faces.len(), 7);
        assert!(matches!(arr.locate(&p(0.5, 0.5, 0.5)), Some(FeatureRef::Edge(_))));
        assert!(matches!(arr.locate(&p(0.2, 0.5, 0.5)), Some(FeatureRef::Face(_))));
        assert!(matches!(arr.locate(&p(0.2, 0.5, 0.2)), Some(FeatureRef::Cell(_))));
    }

    #[test]
    fn coincident_cut_extends_an_existing_plane() {
        let left = Aabb::from_points([p(0.0, 0.0, 0.5), p(0.3, 1.0, 0.5)].iter());
        let right = Aabb::from_points([p(0.7, 0.0, 0.5), p(1.0, 1.0, 0.5)].iter());
        let cuts = [
            Cut::unbounded(SplitPlane::axis(0, 0.5)),
            Cut::new(SplitPlane::axis(2, 0.5), left),
            Cut::new(SplitPlane::axis(2, 0.5), right),
        ];
        let arr = Arrangement::build(unit_bounds(), &cuts, 1e-9).unwrap();
        assert_eq!(arr.planes.len(), UNIVERSE_PLANES + 2);
        assert_eq!(arr.cuts.len(), 3);
        assert_eq!(arr.cells.len(), 4);
        assert_eq!(euler(&arr), 1);
        assert!(matches!(arr.locate(&p(0.5, 0.5, 0.5)), Some(FeatureRef::Edge(_))));
    }
}
