use std::collections::{HashMap, VecDeque};

use super::VolumeId;
use crate::attribute::AttributeBitset;
use crate::error::{GeometryError, Result};
use crate::solid::arrangement::{Arrangement, CellKey, EdgeKey, EdgeRec, FaceKey, VertexKey};
use crate::solid::FeatureKind;

/// Faces of one surface before triangulation.
///
/// `flipped` faces are traversed against their stored loop order so that
/// every face normal points into `volumes[0]`.
#[derive(Debug)]
pub(super) struct SurfacePatch {
    pub faces: Vec<(FaceKey, bool)>,
    pub volumes: [VolumeId; 2],
    pub attributes: AttributeBitset,
}

/// Live faces of the algebra incident to `edge`.
pub(super) fn live_faces(arr: &Arrangement, edge: &EdgeRec) -> Vec<FaceKey> {
    edge.faces
        .iter()
        .copied()
        .filter(|f| arr.faces[*f].kind == FeatureKind::Face)
        .collect()
}

/// An edge continues a surface when exactly two live faces meet there and
/// both carry the edge's own attributes.
pub(super) fn is_surface_internal(arr: &Arrangement, edge: &EdgeRec) -> bool {
    let live = live_faces(arr, edge);
    live.len() == 2
        && live
            .iter()
            .all(|f| arr.faces[*f].attributes == edge.attributes)
}

/// Grows surfaces by breadth-first traversal over surface-internal edges.
///
/// Returns the patches and, for every live face, the index of its patch.
///
/// # Errors
///
/// Returns [`GeometryError::Degenerate`] if a live face lacks a volume on
/// either side, or if neighbouring faces disagree on the volumes they
/// separate.
pub(super) fn grow_surfaces(
    arr: &Arrangement,
    volume_of: &HashMap<CellKey, VolumeId>,
) -> Result<(Vec<SurfacePatch>, HashMap<FaceKey, usize>)> {
    let edge_of: HashMap<(VertexKey, VertexKey), EdgeKey> = arr
        .edges
        .iter()
        .map(|(k, e)| ((e.ends[0], e.ends[1]), k))
        .collect();

    let mut owner: HashMap<FaceKey, usize> = HashMap::new();
    let mut patches = Vec::new();
    let mut queue = VecDeque::new();

    for (seed, seed_face) in &arr.faces {
        if seed_face.kind != FeatureKind::Face || owner.contains_key(&seed) {
            continue;
        }
        let index = patches.len();
        let mut patch = SurfacePatch {
            faces: Vec::new(),
            volumes: face_volumes(arr, seed, false, volume_of)?,
            attributes: seed_face.attributes,
        };
        owner.insert(seed, index);
        queue.push_back((seed, false));

        while let Some((fk, flipped)) = queue.pop_front() {
            patch.faces.push((fk, flipped));
            let loop_keys = &arr.faces[fk].vertices;
            let n = loop_keys.len();
            for i in 0..n {
                let (a, b) = (loop_keys[i], loop_keys[(i + 1) % n]);
                let key = if a < b { (a, b) } else { (b, a) };
                let Some(&ek) = edge_of.get(&key) else {
                    continue;
                };
                let edge = &arr.edges[ek];
                if !is_surface_internal(arr, edge) {
                    continue;
                }
                let Some(g) = live_faces(arr, edge).into_iter().find(|g| *g != fk) else {
                    continue;
                };
                if owner.contains_key(&g) {
                    continue;
                }
                let g_flipped = if arr.faces[g].traverses(a, b) {
                    !flipped
                } else {
                    flipped
                };
                if face_volumes(arr, g, g_flipped, volume_of)? != patch.volumes {
                    return Err(GeometryError::Degenerate(
                        "adjacent faces of one surface separate different volumes".into(),
                    )
                    .into());
                }
                owner.insert(g, index);
                queue.push_back((g, g_flipped));
            }
        }
        patches.push(patch);
    }
    Ok((patches, owner))
}

/// `[into, other]` volumes of a face given its traversal direction.
fn face_volumes(
    arr: &Arrangement,
    face: FaceKey,
    flipped: bool,
    volume_of: &HashMap<CellKey, VolumeId>,
) -> Result<[VolumeId; 2]> {
    let rec = &arr.faces[face];
    let missing = || GeometryError::Degenerate("live face is not bounded by two volumes".into());
    let front = rec.front.and_then(|c| volume_of.get(&c)).ok_or_else(missing)?;
    let back = rec.back.and_then(|c| volume_of.get(&c)).ok_or_else(missing)?;
    Ok(if flipped {
        [*back, *front]
    } else {
        [*front, *back]
    })
}
