//! Element meshes supplied by an external mesher, and the subsets derived
//! from them.

mod adjacency;
mod shape;

pub use adjacency::MeshAdjacency;
pub use shape::{FaceShape, ShapeRegistry};

use std::collections::BTreeSet;

use crate::attribute::AttributeBitset;
use crate::error::{MeshError, Result};
use crate::math::polygon_3d::newell_normal;
use crate::math::{Point3, Vector3};

pub type NodeId = usize;
pub type ElementId = usize;

const TET_FACES: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const WEDGE_FACES: [&[usize]; 5] = [
    &[0, 2, 1],
    &[3, 4, 5],
    &[0, 1, 4, 3],
    &[1, 2, 5, 4],
    &[2, 0, 3, 5],
];
const HEX_FACES: [&[usize]; 6] = [
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
];

/// Linear solid element types.
///
/// Local face tables list node positions counter-clockwise seen from
/// outside the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Tetrahedron,
    Wedge,
    Hexahedron,
}

impl ElementKind {
    #[must_use]
    pub fn node_count(self) -> usize {
        match self {
            Self::Tetrahedron => 4,
            Self::Wedge => 6,
            Self::Hexahedron => 8,
        }
    }

    /// Local node positions of every face.
    #[must_use]
    pub fn faces(self) -> &'static [&'static [usize]] {
        match self {
            Self::Tetrahedron => &TET_FACES,
            Self::Wedge => &WEDGE_FACES,
            Self::Hexahedron => &HEX_FACES,
        }
    }

    #[must_use]
    pub fn face_count(self) -> usize {
        self.faces().len()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub point: Point3,
    pub attributes: AttributeBitset,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub kind: ElementKind,
    pub nodes: Vec<NodeId>,
    pub attributes: AttributeBitset,
    /// One bitset per local face.
    pub face_attributes: Vec<AttributeBitset>,
}

impl Element {
    #[must_use]
    pub fn new(kind: ElementKind, nodes: Vec<NodeId>) -> Self {
        Self {
            kind,
            nodes,
            attributes: AttributeBitset::empty(),
            face_attributes: vec![AttributeBitset::empty(); kind.face_count()],
        }
    }

    /// Global node ids of local face `face`, in outward order.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::FaceOutOfRange`] if the element has no such face,
    /// or [`MeshError::ConnectivityMismatch`] if it has too few nodes for its
    /// kind.
    pub fn face_nodes(&self, element: ElementId, face: usize) -> Result<Vec<NodeId>> {
        let local = self
            .kind
            .faces()
            .get(face)
            .ok_or(MeshError::FaceOutOfRange { element, face })?;
        local
            .iter()
            .map(|&i| {
                self.nodes.get(i).copied().ok_or_else(|| {
                    MeshError::ConnectivityMismatch {
                        element,
                        found: self.nodes.len(),
                        expected: self.kind.node_count(),
                    }
                    .into()
                })
            })
            .collect()
    }
}

/// One local face of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceRef {
    pub element: ElementId,
    pub face: usize,
}

impl FaceRef {
    #[must_use]
    pub fn new(element: ElementId, face: usize) -> Self {
        Self { element, face }
    }
}

/// A set of unique ids. Derived sets only grow by [`IdSet::union`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSet<T: Ord>(BTreeSet<T>);

pub type ElementSet = IdSet<ElementId>;
pub type FaceSet = IdSet<FaceRef>;
pub type NodeSet = IdSet<NodeId>;

impl<T: Ord> Default for IdSet<T> {
    fn default() -> Self {
        Self(BTreeSet::new())
    }
}

impl<T: Ord + Copy> IdSet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: T) -> bool {
        self.0.insert(id)
    }

    #[must_use]
    pub fn contains(&self, id: &T) -> bool {
        self.0.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.0.iter().copied()
    }

    pub fn union(&mut self, other: &Self) {
        self.0.extend(other.0.iter().copied());
    }
}

impl<T: Ord> FromIterator<T> for IdSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A linear element mesh.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub nodes: Vec<Node>,
    pub elements: Vec<Element>,
}

impl Mesh {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, point: Point3) -> NodeId {
        self.nodes.push(Node {
            point,
            attributes: AttributeBitset::empty(),
        });
        self.nodes.len() - 1
    }

    /// Appends an element.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] if the connectivity does not fit `kind` or
    /// references a missing node.
    pub fn add_element(&mut self, kind: ElementKind, nodes: Vec<NodeId>) -> Result<ElementId> {
        let id = self.elements.len();
        check_connectivity(id, kind, &nodes, self.nodes.len())?;
        self.elements.push(Element::new(kind, nodes));
        Ok(id)
    }

    /// Checks every element's connectivity and face bitset count.
    ///
    /// # Errors
    ///
    /// Returns the first [`MeshError`] found.
    pub fn validate(&self) -> Result<()> {
        for (id, e) in self.elements.iter().enumerate() {
            check_connectivity(id, e.kind, &e.nodes, self.nodes.len())?;
            if e.face_attributes.len() != e.kind.face_count() {
                return Err(MeshError::FaceOutOfRange {
                    element: id,
                    face: e.face_attributes.len(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Returns the element, or an error if out of range.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::ElementOutOfRange`] if `id` is not an element.
    pub fn element(&self, id: ElementId) -> Result<&Element> {
        self.elements.get(id).ok_or_else(|| {
            MeshError::ElementOutOfRange {
                element: id,
                count: self.elements.len(),
            }
            .into()
        })
    }

    /// Corner points of an element in local node order.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] if the element or one of its nodes is missing.
    pub fn element_points(&self, id: ElementId) -> Result<Vec<Point3>> {
        self.element(id)?
            .nodes
            .iter()
            .map(|&n| self.node_point(id, n))
            .collect()
    }

    /// Arithmetic mean of an element's nodes.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] if the element or one of its nodes is missing.
    pub fn element_centroid(&self, id: ElementId) -> Result<Point3> {
        Ok(mean(&self.element_points(id)?))
    }

    /// Node ids of a face in outward order.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] if the element or face is missing.
    pub fn face_nodes(&self, face: FaceRef) -> Result<Vec<NodeId>> {
        self.element(face.element)?.face_nodes(face.element, face.face)
    }

    /// Corner points of a face in outward order.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] if the element, face or a node is missing.
    pub fn face_points(&self, face: FaceRef) -> Result<Vec<Point3>> {
        self.face_nodes(face)?
            .into_iter()
            .map(|n| self.node_point(face.element, n))
            .collect()
    }

    /// # Errors
    ///
    /// Returns a [`MeshError`] if the element, face or a node is missing.
    pub fn face_centroid(&self, face: FaceRef) -> Result<Point3> {
        Ok(mean(&self.face_points(face)?))
    }

    /// Unit outward normal of a face, or zero for a collapsed face.
    ///
    /// # Errors
    ///
    /// Returns a [`MeshError`] if the element, face or a node is missing.
    pub fn face_normal(&self, face: FaceRef) -> Result<Vector3> {
        let n = newell_normal(&self.face_points(face)?);
        Ok(n.try_normalize(0.0).unwrap_or_else(Vector3::zeros))
    }

    fn node_point(&self, element: ElementId, node: NodeId) -> Result<Point3> {
        self.nodes.get(node).map(|n| n.point).ok_or_else(|| {
            MeshError::NodeOutOfRange {
                element,
                node,
                count: self.nodes.len(),
            }
            .into()
        })
    }
}

fn check_connectivity(
    id: ElementId,
    kind: ElementKind,
    nodes: &[NodeId],
    count: usize,
) -> Result<()> {
    if nodes.len() != kind.node_count() {
        return Err(MeshError::ConnectivityMismatch {
            element: id,
            found: nodes.len(),
            expected: kind.node_count(),
        }
        .into());
    }
    if let Some(&node) = nodes.iter().find(|&&n| n >= count) {
        return Err(MeshError::NodeOutOfRange {
            element: id,
            node,
            count,
        }
        .into());
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean(points: &[Point3]) -> Point3 {
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len().max(1) as f64)
}
