use std::collections::{HashMap, HashSet};

use super::surface::{is_surface_internal, live_faces};
use crate::attribute::AttributeBitset;
use crate::solid::arrangement::{Arrangement, EdgeKey, EdgeRec, VertexKey};
use crate::solid::FeatureKind;

/// A maximal chain of border edges with uniform attributes.
#[derive(Debug)]
pub(super) struct BorderChain {
    pub vertices: Vec<VertexKey>,
    pub edges: Vec<EdgeKey>,
    pub closed: bool,
    pub attributes: AttributeBitset,
}

/// Edges where surface growth stops, plus isolated live edges.
pub(super) fn border_edges(arr: &Arrangement) -> Vec<EdgeKey> {
    arr.edges
        .iter()
        .filter(|(_, e)| {
            let live = live_faces(arr, e).len();
            if live == 0 {
                e.kind == FeatureKind::Edge
            } else {
                !is_surface_internal(arr, e)
            }
        })
        .map(|(k, _)| k)
        .collect()
}

/// Chains border edges through vertices of border degree two whose
/// attributes match the chain.
pub(super) fn chain_borders(arr: &Arrangement, edges: &[EdgeKey]) -> Vec<BorderChain> {
    let mut incident: HashMap<VertexKey, Vec<EdgeKey>> = HashMap::new();
    for &ek in edges {
        for v in arr.edges[ek].ends {
            incident.entry(v).or_default().push(ek);
        }
    }

    let mut consumed: HashSet<EdgeKey> = HashSet::new();
    let mut chains = Vec::new();
    for &seed in edges {
        if !consumed.insert(seed) {
            continue;
        }
        let attributes = arr.edges[seed].attributes;
        let [a, b] = arr.edges[seed].ends;
        let walk = Walk {
            arr,
            incident: &incident,
            seed,
            attributes,
        };

        let (forward_vertices, forward_edges, closed) = walk.extend(&mut consumed, b);
        let mut vertices = vec![a, b];
        let mut chain_edges = vec![seed];
        if closed {
            vertices.extend(&forward_vertices[..forward_vertices.len().saturating_sub(1)]);
            chain_edges.extend(forward_edges);
        } else {
            let (back_vertices, back_edges, _) = walk.extend(&mut consumed, a);
            let mut head: Vec<VertexKey> = back_vertices.into_iter().rev().collect();
            head.append(&mut vertices);
            head.extend(forward_vertices);
            vertices = head;
            let mut head_edges: Vec<EdgeKey> = back_edges.into_iter().rev().collect();
            head_edges.append(&mut chain_edges);
            head_edges.extend(forward_edges);
            chain_edges = head_edges;
        }
        chains.push(BorderChain {
            vertices,
            edges: chain_edges,
            closed,
            attributes,
        });
    }
    chains
}

struct Walk<'a> {
    arr: &'a Arrangement,
    incident: &'a HashMap<VertexKey, Vec<EdgeKey>>,
    seed: EdgeKey,
    attributes: AttributeBitset,
}

impl Walk<'_> {
    /// Extends away from the seed edge starting at `vertex`. Returns the
    /// vertices and edges added in walking order and whether the walk came
    /// back around to the seed.
    fn extend(
        &self,
        consumed: &mut HashSet<EdgeKey>,
        start: VertexKey,
    ) -> (Vec<VertexKey>, Vec<EdgeKey>, bool) {
        let mut vertices = Vec::new();
        let mut edges = Vec::new();
        let mut vertex = start;
        let mut via = self.seed;
        loop {
            let Some(around) = self.incident.get(&vertex) else {
                break;
            };
            if around.len() != 2 || self.arr.vertices[vertex].attributes != self.attributes {
                break;
            }
            let next = if around[0] == via { around[1] } else { around[0] };
            if next == self.seed {
                return (vertices, edges, true);
            }
            if consumed.contains(&next) || self.arr.edges[next].attributes != self.attributes {
                break;
            }
            consumed.insert(next);
            let other = other_end(&self.arr.edges[next], vertex);
            edges.push(next);
            vertices.push(other);
            vertex = other;
            via = next;
        }
        (vertices, edges, false)
    }
}

fn other_end(edge: &EdgeRec, v: VertexKey) -> VertexKey {
    if edge.ends[0] == v {
        edge.ends[1]
    } else {
        edge.ends[0]
    }
}
