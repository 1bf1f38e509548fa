//! Encodings of the selection directives as attribute-solid operations.
//!
//! Each encoding owns one bit and leaves it only on the feature kind the
//! directive selects.

use crate::attribute::AttributeBitset;
use crate::error::Result;
use crate::math::{within_cone, Point3, Vector3};
use crate::solid::{ArrangementParams, AttributedSolid, FeatureKind, TriangleSolid};

/// Mask solid tagged all-ones on its closure and all-but-`bit` elsewhere,
/// so that AND-ing with it clears `bit` outside the mask only.
fn mask_tag(
    mask: &TriangleSolid,
    bit: usize,
    params: ArrangementParams,
) -> Result<AttributedSolid> {
    let mut tag = AttributedSolid::from_solid(mask, params)?;
    tag.binarize(AttributeBitset::all(), AttributeBitset::all().without(bit));
    Ok(tag)
}

/// Clears `bit` from every feature not of kind `keep`.
fn confine(model: &mut AttributedSolid, bit: usize, keep: FeatureKind) {
    model.map_everywhere(|a, kind| if kind == keep { a } else { a.without(bit) });
}

/// Sets `bit` on the solid volumes inside `mask`.
pub(super) fn select_volume(
    model: &AttributedSolid,
    mask: &TriangleSolid,
    bit: usize,
) -> Result<AttributedSolid> {
    let mut tagged = model.clone();
    tagged.map_volumes(|a| if a.is_solid() { a.with(bit) } else { a });
    let mut out = tagged.and(&mask_tag(mask, bit, model.params())?)?;
    confine(&mut out, bit, FeatureKind::Volume);
    Ok(out)
}

/// Sets `bit` on the external faces inside `mask` whose outward normal is
/// within `tolerance_deg` of `direction`.
pub(super) fn select_external_surface(
    model: &AttributedSolid,
    mask: &TriangleSolid,
    bit: usize,
    direction: &Vector3,
    tolerance_deg: f64,
) -> Result<AttributedSolid> {
    let mut tagged = model.clone();
    tagged.map_faces_with(|view| {
        if view.is_external() && within_cone(&view.outward_normal(), direction, tolerance_deg) {
            view.attributes.with(bit)
        } else {
            view.attributes
        }
    });
    let mut out = tagged.and(&mask_tag(mask, bit, model.params())?)?;
    confine(&mut out, bit, FeatureKind::Face);
    Ok(out)
}

/// Sets `bit` on internal faces inside the solid whose normal, either way
/// round, is within `tolerance_deg` of `direction`.
///
/// The mask boundary itself becomes such a face wherever it passes through
/// the solid. `tolerance_deg` must be below 90 degrees.
pub(super) fn select_internal_surface(
    model: &AttributedSolid,
    mask: &TriangleSolid,
    bit: usize,
    direction: &Vector3,
    tolerance_deg: f64,
) -> Result<AttributedSolid> {
    let mut tagged = model.clone();
    tagged.map_volumes(|a| if a.is_solid() { a.with(bit) } else { a });
    tagged.map_faces_with(|view| {
        if view.is_internal() {
            view.attributes.with(bit)
        } else {
            view.attributes
        }
    });
    let mut out = tagged.and(&mask_tag(mask, bit, model.params())?)?;
    out.map_faces_with(|view| {
        let aligned = within_cone(&view.normal, direction, tolerance_deg)
            || within_cone(&-view.normal, direction, tolerance_deg);
        if view.is_internal() && aligned {
            view.attributes
        } else {
            view.attributes.without(bit)
        }
    });
    confine(&mut out, bit, FeatureKind::Face);
    Ok(out)
}

/// Sets `bit` on an isolated vertex at `point` if it lies in the solid.
pub(super) fn select_node(
    model: &AttributedSolid,
    point: &Point3,
    bit: usize,
) -> Result<AttributedSolid> {
    let mut marker = AttributedSolid::from_point(point, model.params())?;
    marker.map_vertices(|_| AttributeBitset::single(bit));
    let mut out = model.or(&marker)?;
    out.map_everywhere(|a, _| if a.is_solid() { a } else { a.without(bit) });
    Ok(out)
}
