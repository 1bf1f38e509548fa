use std::collections::{HashMap, VecDeque};

use slotmap::SlotMap;
use tracing::debug;

use super::border::{border_edges, chain_borders};
use super::surface::grow_surfaces;
use super::triangulate::triangulate_loop;
use super::{Border, BoundaryRep, Surface, SurfaceId, Vertex, VertexId, Volume, VolumeId};
use crate::error::{GeometryError, Result};
use crate::math::Point3;
use crate::solid::arrangement::{Arrangement, CellKey, VertexKey};
use crate::solid::{AttributedSolid, FeatureKind};

/// Converts an attributed solid into an explicit boundary representation.
///
/// The solid is consumed: extraction happens once per model.
pub struct Extract {
    solid: AttributedSolid,
}

impl Extract {
    #[must_use]
    pub fn new(solid: AttributedSolid) -> Self {
        Self { solid }
    }

    /// Executes the extraction.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] if the model's attributes are
    /// inconsistent with its volumes, or a face cannot be triangulated.
    pub fn execute(self) -> Result<BoundaryRep> {
        let mut solid = self.solid;
        solid.simplify();
        let arr = solid.into_arrangement();

        let (volumes, volume_of) = collect_volumes(&arr)?;
        let outside = *volume_of
            .get(&arr.outer_cell)
            .ok_or(GeometryError::EntityNotFound("outer cell"))?;
        let mut volumes = volumes;
        if let Some(v) = volumes.get_mut(outside) {
            v.outside = true;
        }

        let (patches, owner) = grow_surfaces(&arr, &volume_of)?;
        let chains = chain_borders(&arr, &border_edges(&arr));

        let mut vertices = VertexTable::new(&arr);
        for (vk, v) in &arr.vertices {
            if v.kind == FeatureKind::Vertex {
                vertices.id(vk);
            }
        }

        let mut surfaces = SlotMap::with_key();
        let mut surface_ids: Vec<SurfaceId> = Vec::with_capacity(patches.len());
        for patch in &patches {
            let mut triangles = Vec::new();
            for &(fk, flipped) in &patch.faces {
                let mut keys = arr.faces[fk].vertices.clone();
                if flipped {
                    keys.reverse();
                }
                let points: Vec<Point3> = keys.iter().map(|k| arr.vertices[*k].point).collect();
                for tri in triangulate_loop(&keys, &points)? {
                    triangles.push(tri.map(|k| vertices.id(k)));
                }
            }
            surface_ids.push(surfaces.insert(Surface {
                triangles,
                volumes: patch.volumes,
                attributes: patch.attributes,
            }));
        }

        let mut borders = SlotMap::with_key();
        for chain in chains {
            let mut adjacent: Vec<SurfaceId> = chain
                .edges
                .iter()
                .flat_map(|e| arr.edges[*e].faces.iter())
                .filter_map(|f| owner.get(f))
                .map(|i| surface_ids[*i])
                .collect();
            adjacent.sort_unstable();
            adjacent.dedup();
            borders.insert(Border {
                vertices: chain.vertices.iter().map(|k| vertices.id(*k)).collect(),
                closed: chain.closed,
                surfaces: adjacent,
                attributes: chain.attributes,
            });
        }

        let rep = BoundaryRep {
            vertices: vertices.into_inner(),
            volumes,
            surfaces,
            borders,
            outside,
        };
        debug!(
            vertices = rep.vertices.len(),
            volumes = rep.volumes.len(),
            surfaces = rep.surfaces.len(),
            borders = rep.borders.len(),
            "extracted boundary representation"
        );
        Ok(rep)
    }
}

/// Groups cells into volumes across faces that belong to a volume.
fn collect_volumes(
    arr: &Arrangement,
) -> Result<(SlotMap<VolumeId, Volume>, HashMap<CellKey, VolumeId>)> {
    let mut volumes = SlotMap::with_key();
    let mut volume_of: HashMap<CellKey, VolumeId> = HashMap::new();
    let mut queue = VecDeque::new();

    for (seed, cell) in &arr.cells {
        if volume_of.contains_key(&seed) {
            continue;
        }
        let id = volumes.insert(Volume {
            attributes: cell.attributes,
            outside: false,
        });
        volume_of.insert(seed, id);
        queue.push_back(seed);
        while let Some(c) = queue.pop_front() {
            for f in &arr.cells[c].faces {
                let face = &arr.faces[*f];
                if face.kind != FeatureKind::Volume {
                    continue;
                }
                for n in face.cells() {
                    if volume_of.contains_key(&n) {
                        continue;
                    }
                    if arr.cells[n].attributes != cell.attributes {
                        return Err(GeometryError::Degenerate(format!(
                            "volume mixes attributes {:?} and {:?}",
                            cell.attributes, arr.cells[n].attributes
                        ))
                        .into());
                    }
                    volume_of.insert(n, id);
                    queue.push_back(n);
                }
            }
        }
    }
    Ok((volumes, volume_of))
}

/// Assigns boundary vertex ids to arrangement vertices on first use.
struct VertexTable<'a> {
    arr: &'a Arrangement,
    ids: HashMap<VertexKey, VertexId>,
    vertices: SlotMap<VertexId, Vertex>,
}

impl<'a> VertexTable<'a> {
    fn new(arr: &'a Arrangement) -> Self {
        Self {
            arr,
            ids: HashMap::new(),
            vertices: SlotMap::with_key(),
        }
    }

    fn id(&mut self, key: VertexKey) -> VertexId {
        let arr = self.arr;
        let vertices = &mut self.vertices;
        *self.ids.entry(key).or_insert_with(|| {
            let rec = &arr.vertices[key];
            vertices.insert(Vertex {
                point: rec.point,
                attributes: rec.attributes,
            })
        })
    }

    fn into_inner(self) -> SlotMap<VertexId, Vertex> {
        self.vertices
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attribute::AttributeBitset;
    use crate::math::Vector3;
    use crate::solid::{ArrangementParams, TriangleSolid};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn box_model(min: Point3, max: Point3) -> AttributedSolid {
        let solid = TriangleSolid::make_box(min, max);
        AttributedSolid::from_solid(&solid, ArrangementParams::default()).unwrap()
    }

    #[test]
    fn box_extracts_two_volumes_and_one_surface() {
        let rep = Extract::new(box_model(p(0.0, 0.0, 0.0), p(1.0, 1.0, 2.0)))
            .execute()
            .unwrap();
        assert_eq!(rep.volumes().count(), 2);
        assert_eq!(rep.volumes().filter(|(_, v)| v.outside).count(), 1);
        assert_eq!(rep.surfaces().count(), 1);
        assert_eq!(rep.borders().count(), 0);
        assert_eq!(rep.vertices().count(), 8);

        let (sid, surface) = rep.surfaces().next().unwrap();
        assert_eq!(surface.triangles.len(), 12);
        assert!((rep.surface_area(sid).unwrap() - 10.0).abs() < 1e-9);
        assert_ne!(surface.volumes[0], surface.volumes[1]);
    }

    #[test]
    fn surface_triangles_are_consistently_wound() {
        let rep = Extract::new(box_model(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)))
            .execute()
            .unwrap();
        let (_, surface) = rep.surfaces().next().unwrap();
        let into_outside = surface.volumes[0] == rep.outside_volume();
        let centre = p(0.5, 0.5, 0.5);
        for tri in &surface.triangles {
            let [a, _, _] = rep.triangle_points(tri).unwrap();
            let n = rep.triangle_normal(tri).unwrap();
            let points_out = n.dot(&(a - centre)) > 0.0;
            assert_eq!(points_out, into_outside);
        }

        // Every interior triangle edge is matched once in reverse.
        let mut directed = std::collections::HashMap::new();
        for tri in &surface.triangles {
            for i in 0..3 {
                *directed.entry((tri[i], tri[(i + 1) % 3])).or_insert(0) += 1;
            }
        }
        for ((a, b), count) in &directed {
            assert_eq!(*count, 1);
            assert_eq!(directed.get(&(*b, *a)), Some(&1));
        }
    }

    #[test]
    fn face_tag_produces_border_loop() {
        let mut model = box_model(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
        model.map_faces_with(|view| {
            if view.is_external() && view.outward_normal().dot(&Vector3::z()) > 0.9 {
                view.attributes.with(1)
            } else {
                view.attributes
            }
        });
        let rep = Extract::new(model).execute().unwrap();
        assert_eq!(rep.surfaces().count(), 2);
        let tagged: Vec<_> = rep.surfaces().filter(|(_, s)| s.attributes.contains(1)).collect();
        assert_eq!(tagged.len(), 1);
        assert_eq!(rep.borders().count(), 1);
        let (_, border) = rep.borders().next().unwrap();
        assert!(border.closed);
        assert_eq!(border.vertices.len(), 4);
        assert_eq!(border.surfaces.len(), 2);
        assert_eq!(border.attributes, AttributeBitset::solid());
    }

    #[test]
    fn mixed_volume_is_degenerate() {
        let model = box_model(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
        let mut arr = model.into_arrangement();
        let Some(crate::solid::FeatureRef::Cell(inside)) = arr.locate(&p(0.5, 0.5, 0.5)) else {
            panic!("centre of the box is not inside a cell");
        };
        // Re-tag the inside cell and merge one of its walls without simplifying.
        arr.cells[inside].attributes = AttributeBitset::single(3);
        let wall = arr.cells[inside].faces[0];
        arr.faces[wall].kind = FeatureKind::Volume;
        assert!(collect_volumes(&arr).is_err());
    }
}
