//! Node partitioning along internal cut faces.
//!
//! A slice splits a continuous mesh along a set of faces into regions that
//! are geometrically coincident but share no nodes across the cut. Every
//! duplicated node gets a [`Pair`] and a [`LinearEquation`] re-coupling the
//! two copies along the cut normal.

mod equation;

pub use equation::{order_for_elimination, LinearEquation, Term};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::math::Vector3;
use crate::mesh::{ElementId, FaceRef, FaceSet, Mesh, MeshAdjacency, Node, NodeId};

const CANCELLED_NORMAL: f64 = 1e-9;

/// Two node copies at the same position on opposite sides of a cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair {
    /// The lower node id.
    pub a: NodeId,
    pub b: NodeId,
    /// Unit normal of the cut, pointing out of the elements that use `a`.
    pub normal: Vector3,
}

#[derive(Debug, Clone, Default)]
pub struct SliceResult {
    pub pairs: Vec<Pair>,
    pub equations: Vec<LinearEquation>,
    /// Nodes created by the slice, in creation order.
    pub cloned_nodes: Vec<NodeId>,
}

/// Partitions mesh nodes along a face set.
///
/// A face counts as cut when it or its twin is in the set.
pub struct Slice<'a> {
    cut: &'a FaceSet,
}

impl<'a> Slice<'a> {
    #[must_use]
    pub fn new(cut: &'a FaceSet) -> Self {
        Self { cut }
    }

    /// Executes the slice, rewriting element connectivity in place.
    ///
    /// `adjacency` must describe `mesh` as it is before the call and is
    /// stale afterwards.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::MeshError`] if a cut face does not exist in
    /// the mesh.
    pub fn execute(self, mesh: &mut Mesh, adjacency: &MeshAdjacency) -> Result<SliceResult> {
        let mut cut: HashSet<FaceRef> = HashSet::new();
        let mut shared: BTreeMap<(FaceRef, FaceRef), Vec<NodeId>> = BTreeMap::new();
        let mut cut_nodes: BTreeSet<NodeId> = BTreeSet::new();
        for face in self.cut.iter() {
            let nodes = mesh.face_nodes(face)?;
            cut_nodes.extend(nodes.iter().copied());
            cut.insert(face);
            if let Some(twin) = adjacency.twin(face) {
                cut.insert(twin);
                let key = if face < twin { (face, twin) } else { (twin, face) };
                shared.insert(key, nodes);
            }
        }

        let mut copy_of: HashMap<(ElementId, NodeId), NodeId> = HashMap::new();
        let mut cloned_nodes = Vec::new();
        for &node in &cut_nodes {
            let components = partition_node(mesh, adjacency, &cut, node)?;
            trace!(node, partitions = components.len(), "partitioned node");
            for (index, component) in components.iter().enumerate() {
                let target = if index == 0 {
                    node
                } else {
                    let copy: Node = mesh.nodes[node].clone();
                    mesh.nodes.push(copy);
                    let id = mesh.nodes.len() - 1;
                    cloned_nodes.push(id);
                    id
                };
                for &element in component {
                    copy_of.insert((element, node), target);
                    if target != node {
                        for n in &mut mesh.elements[element].nodes {
                            if *n == node {
                                *n = target;
                            }
                        }
                    }
                }
            }
        }

        // Summed and first face normal per pair.
        let mut normals: BTreeMap<(NodeId, NodeId), (Vector3, Vector3)> = BTreeMap::new();
        for ((f, g), nodes) in &shared {
            let face_normal = mesh.face_normal(*f)?;
            for original in nodes {
                let (Some(&pf), Some(&pg)) = (
                    copy_of.get(&(f.element, *original)),
                    copy_of.get(&(g.element, *original)),
                ) else {
                    continue;
                };
                if pf == pg {
                    continue;
                }
                let (key, n) = if pf < pg {
                    ((pf, pg), face_normal)
                } else {
                    ((pg, pf), -face_normal)
                };
                normals.entry(key).or_insert((Vector3::zeros(), n)).0 += n;
            }
        }

        let pairs: Vec<Pair> = normals
            .into_iter()
            .map(|((a, b), (sum, first))| Pair {
                a,
                b,
                normal: pair_normal(a, b, &sum, &first),
            })
            .collect();
        let equations = pairs.iter().map(LinearEquation::coincidence).collect();
        debug!(
            cut_faces = self.cut.len(),
            cut_nodes = cut_nodes.len(),
            cloned = cloned_nodes.len(),
            pairs = pairs.len(),
            "sliced mesh"
        );
        Ok(SliceResult {
            pairs,
            equations,
            cloned_nodes,
        })
    }
}

/// Groups the elements around `node` into partitions connected through
/// faces that contain the node and are not cut. The partition holding the
/// lowest element id comes first.
fn partition_node(
    mesh: &Mesh,
    adjacency: &MeshAdjacency,
    cut: &HashSet<FaceRef>,
    node: NodeId,
) -> Result<Vec<Vec<ElementId>>> {
    let around = adjacency.elements_of(node);
    let mut seen: HashSet<ElementId> = HashSet::new();
    let mut components = Vec::new();
    for &seed in around {
        if !seen.insert(seed) {
            continue;
        }
        let mut component = vec![seed];
        let mut queue = VecDeque::from([seed]);
        while let Some(element) = queue.pop_front() {
            for face in faces_through(mesh, element, node)? {
                if cut.contains(&face) {
                    continue;
                }
                let Some(twin) = adjacency.twin(face) else {
                    continue;
                };
                if seen.insert(twin.element) {
                    component.push(twin.element);
                    queue.push_back(twin.element);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    Ok(components)
}

/// Local faces of `element` that contain `node`.
fn faces_through(mesh: &Mesh, element: ElementId, node: NodeId) -> Result<Vec<FaceRef>> {
    let e = mesh.element(element)?;
    Ok(e.kind
        .faces()
        .iter()
        .enumerate()
        .filter(|(_, local)| local.iter().any(|&i| e.nodes[i] == node))
        .map(|(face, _)| FaceRef::new(element, face))
        .collect())
}

/// Unit normal of a pair from its summed face normals, falling back to the
/// first contributing face when the sum cancels.
fn pair_normal(a: NodeId, b: NodeId, sum: &Vector3, first: &Vector3) -> Vector3 {
    if let Some(normal) = sum.try_normalize(CANCELLED_NORMAL) {
        return normal;
    }
    warn!(a, b, "face normals of a slice pair cancel, using the first face");
    first.try_normalize(0.0).unwrap_or(*first)
}
