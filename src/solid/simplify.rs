use tracing::debug;

use super::arrangement::{Arrangement, EdgeKey, EdgeRec, FaceKey, FaceRec, VertexKey, VertexRec};
use super::FeatureKind;

/// Recomputes the algebra feature kind of every arrangement feature.
///
/// A feature whose attributes agree with its whole neighbourhood merges into
/// the higher-dimensional feature around it. Faces are decided first, then
/// edges from their live faces, then vertices from their live edges and faces.
pub fn simplify(arr: &mut Arrangement) {
    for cell in arr.cells.values_mut() {
        cell.kind = FeatureKind::Volume;
    }

    let face_kinds: Vec<(FaceKey, FeatureKind)> =
        arr.faces.iter().map(|(k, f)| (k, face_kind(arr, f))).collect();
    for (k, kind) in face_kinds {
        arr.faces[k].kind = kind;
    }

    let edge_kinds: Vec<(EdgeKey, FeatureKind)> =
        arr.edges.iter().map(|(k, e)| (k, edge_kind(arr, e))).collect();
    for (k, kind) in edge_kinds {
        arr.edges[k].kind = kind;
    }

    let vertex_kinds: Vec<(VertexKey, FeatureKind)> = arr
        .vertices
        .iter()
        .map(|(k, v)| (k, vertex_kind(arr, k, v)))
        .collect();
    for (k, kind) in vertex_kinds {
        arr.vertices[k].kind = kind;
    }

    debug!(
        faces = arr.faces.values().filter(|f| f.kind == FeatureKind::Face).count(),
        edges = arr.edges.values().filter(|e| e.kind == FeatureKind::Edge).count(),
        vertices = arr.vertices.values().filter(|v| v.kind == FeatureKind::Vertex).count(),
        "simplified attributed solid"
    );
}

fn face_kind(arr: &Arrangement, face: &FaceRec) -> FeatureKind {
    match (face.front, face.back) {
        (Some(front), Some(back))
            if arr.cells[front].attributes != face.attributes
                || arr.cells[back].attributes != face.attributes =>
        {
            FeatureKind::Face
        }
        _ => FeatureKind::Volume,
    }
}

fn edge_kind(arr: &Arrangement, edge: &EdgeRec) -> FeatureKind {
    if edge.on_universe {
        return FeatureKind::Volume;
    }
    let live: Vec<&FaceRec> = edge
        .faces
        .iter()
        .map(|f| &arr.faces[*f])
        .filter(|f| f.kind == FeatureKind::Face)
        .collect();
    match live.as_slice() {
        [] => {
            if edge
                .cells
                .iter()
                .all(|c| arr.cells[*c].attributes == edge.attributes)
            {
                FeatureKind::Volume
            } else {
                FeatureKind::Edge
            }
        }
        [a, b]
            if a.plane == b.plane
                && a.attributes == edge.attributes
                && b.attributes == edge.attributes =>
        {
            FeatureKind::Face
        }
        _ => FeatureKind::Edge,
    }
}

fn vertex_kind(arr: &Arrangement, key: VertexKey, vertex: &VertexRec) -> FeatureKind {
    if vertex.on_universe {
        return FeatureKind::Volume;
    }
    let live_edges: Vec<EdgeKey> = vertex
        .edges
        .iter()
        .copied()
        .filter(|e| arr.edges[*e].kind == FeatureKind::Edge)
        .collect();
    let live_faces: Vec<FaceKey> = vertex
        .faces
        .iter()
        .copied()
        .filter(|f| arr.faces[*f].kind == FeatureKind::Face)
        .collect();

    if live_edges.is_empty() {
        if live_faces.is_empty() {
            let uniform = vertex
                .cells
                .iter()
                .all(|c| arr.cells[*c].attributes == vertex.attributes);
            return if uniform {
                FeatureKind::Volume
            } else {
                FeatureKind::Vertex
            };
        }
        let plane = arr.faces[live_faces[0]].plane;
        let flat = live_faces.iter().all(|f| {
            let face = &arr.faces[*f];
            face.plane == plane && face.attributes == vertex.attributes
        });
        return if flat {
            FeatureKind::Face
        } else {
            FeatureKind::Vertex
        };
    }

    if let [e1, e2] = live_edges[..] {
        let (a, b) = (&arr.edges[e1], &arr.edges[e2]);
        let d1 = (arr.vertices[other_end(a, key)].point - vertex.point).normalize();
        let d2 = (arr.vertices[other_end(b, key)].point - vertex.point).normalize();
        let straight = d1.dot(&d2) < -1.0 + 1e-9;
        let same = a.attributes == vertex.attributes && b.attributes == vertex.attributes;
        let covered = live_faces
            .iter()
            .all(|f| a.faces.contains(f) || b.faces.contains(f));
        if straight && same && covered {
            return FeatureKind::Edge;
        }
    }
    FeatureKind::Vertex
}

fn other_end(edge: &EdgeRec, v: VertexKey) -> VertexKey {
    if edge.ends[0] == v {
        edge.ends[1]
    } else {
        edge.ends[0]
    }
}
