use super::arrangement::Arrangement;
use super::simplify::simplify;
use super::AttributedSolid;
use crate::attribute::AttributeBitset;
use crate::error::Result;

/// The Boolean combinator applied feature-wise to two attributed solids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Or,
    And,
    AndNot,
    Xor,
}

impl BooleanOp {
    #[must_use]
    pub fn apply(self, a: AttributeBitset, b: AttributeBitset) -> AttributeBitset {
        match self {
            Self::Or => a.union(b),
            Self::And => a.intersection(b),
            Self::AndNot => a.difference(b),
            Self::Xor => a.symmetric_difference(b),
        }
    }
}

impl AttributedSolid {
    /// Feature-wise union of attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay arrangement is degenerate.
    pub fn or(&self, other: &Self) -> Result<Self> {
        self.combine(other, BooleanOp::Or)
    }

    /// Feature-wise intersection of attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay arrangement is degenerate.
    pub fn and(&self, other: &Self) -> Result<Self> {
        self.combine(other, BooleanOp::And)
    }

    /// Attributes of `self` not present in `other`.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay arrangement is degenerate.
    pub fn and_not(&self, other: &Self) -> Result<Self> {
        self.combine(other, BooleanOp::AndNot)
    }

    /// Feature-wise symmetric difference of attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay arrangement is degenerate.
    pub fn xor(&self, other: &Self) -> Result<Self> {
        self.combine(other, BooleanOp::Xor)
    }

    /// Replays the cuts of both models over their joint bounds, evaluates `op`
    /// at a representative point of every resulting feature, then simplifies.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlay arrangement is degenerate.
    pub fn combine(&self, other: &Self, op: BooleanOp) -> Result<Self> {
        let tolerance = self.params.tolerance;
        let mut cuts = self.cuts().to_vec();
        for cut in other.cuts() {
            if !cuts.contains(cut) {
                cuts.push(*cut);
            }
        }
        let bounds = self.arrangement.bounds.union(&other.arrangement.bounds);

        let mut arrangement = Arrangement::build(bounds, &cuts, tolerance)?;
        let features: Vec<_> = arrangement.features().collect();
        for feature in features {
            let p = arrangement.representative(feature);
            let value = op.apply(self.attribute_at(&p), other.attribute_at(&p));
            arrangement.set_attributes(feature, value);
        }
        simplify(&mut arrangement);
        Ok(Self {
            arrangement,
            params: self.params,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::solid::{ArrangementParams, TriangleSolid};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn cube(min: f64, max: f64) -> AttributedSolid {
        let solid = TriangleSolid::make_box(p(min, min, min), p(max, max, max));
        AttributedSolid::from_solid(&solid, ArrangementParams::default()).unwrap()
    }

    fn samples() -> Vec<Point3> {
        let mut out = Vec::new();
        for &x in &[-0.5, 0.3, 1.0, 1.5, 2.0, 2.7, 3.5] {
            for &y in &[0.3, 1.0, 1.5, 2.7] {
                out.push(p(x, y, 1.5));
                out.push(p(x, 1.5, y));
            }
        }
        out
    }

    fn same_everywhere(a: &AttributedSolid, b: &AttributedSolid) -> bool {
        samples()
            .iter()
            .all(|q| a.attribute_at(q) == b.attribute_at(q))
    }

    #[test]
    fn or_with_self_is_identity() {
        let a = cube(0.0, 2.0);
        assert!(same_everywhere(&a.or(&a).unwrap(), &a));
        assert!(same_everywhere(&a.and(&a).unwrap(), &a));
    }

    #[test]
    fn and_not_is_and_with_complement() {
        let a = cube(0.0, 2.0);
        let b = cube(1.0, 3.0);
        let lhs = a.and_not(&b).unwrap();
        let rhs = a.and(&b.complement()).unwrap();
        assert!(same_everywhere(&lhs, &rhs));
    }

    #[test]
    fn combinators_commute() {
        let a = cube(0.0, 2.0);
        let b = cube(1.0, 3.0);
        assert!(same_everywhere(&a.or(&b).unwrap(), &b.or(&a).unwrap()));
        assert!(same_everywhere(&a.and(&b).unwrap(), &b.and(&a).unwrap()));
        assert!(same_everywhere(&a.xor(&b).unwrap(), &b.xor(&a).unwrap()));
    }

    #[test]
    fn xor_with_all_is_complement() {
        let a = cube(0.0, 2.0);
        let mut ones = a.clone();
        ones.map_everywhere(|_, _| AttributeBitset::all());
        let flipped = a.xor(&ones).unwrap();
        assert!(same_everywhere(&flipped, &a.complement()));
        let back = a.and(&flipped).unwrap();
        assert!(samples().iter().all(|q| back.attribute_at(q).is_empty()));
    }

    #[test]
    fn union_of_overlapping_cubes() {
        let u = cube(0.0, 2.0).or(&cube(1.0, 3.0)).unwrap();
        assert!(u.attribute_at(&p(0.5, 0.5, 0.5)).is_solid());
        assert!(u.attribute_at(&p(2.5, 2.5, 2.5)).is_solid());
        assert!(!u.attribute_at(&p(0.5, 2.5, 0.5)).is_solid());
        // The shared corner region is interior, so its planes merge away.
        assert!(u.attribute_at(&p(1.5, 1.5, 1.0)).is_solid());
    }

    #[test]
    fn intersection_keeps_only_overlap() {
        let i = cube(0.0, 2.0).and(&cube(1.0, 3.0)).unwrap();
        assert!(i.attribute_at(&p(1.5, 1.5, 1.5)).is_solid());
        assert!(!i.attribute_at(&p(0.5, 0.5, 0.5)).is_solid());
        assert!(!i.attribute_at(&p(2.5, 2.5, 2.5)).is_solid());
        // Closed: the overlap boundary belongs to the solid.
        assert!(i.attribute_at(&p(1.0, 1.5, 1.5)).is_solid());
    }
}
