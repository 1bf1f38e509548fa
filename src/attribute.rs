//! Fixed-width attribute bit vectors.
//!
//! Every feature of an attributed solid and every mesh entity carries an
//! [`AttributeBitset`]. Bit [`SOLID_BIT`] means "part of the solid"; the
//! remaining bits are handed out one per user directive.

use std::fmt;

/// Number of bits in an [`AttributeBitset`].
pub const BITSET_WIDTH: usize = 128;

/// Bit reserved for solid membership. Never assigned to a directive.
pub const SOLID_BIT: usize = 0;

/// Fixed-width set of attribute bits.
///
/// Combinators are named functions rather than operator overloads so that
/// propagation rules read explicitly at call sites.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeBitset(u128);

impl AttributeBitset {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every bit set.
    #[must_use]
    pub const fn all() -> Self {
        Self(u128::MAX)
    }

    /// Only [`SOLID_BIT`] set.
    #[must_use]
    pub const fn solid() -> Self {
        Self(1 << SOLID_BIT)
    }

    /// A set containing only `bit`. Bits beyond [`BITSET_WIDTH`] are ignored.
    #[must_use]
    pub fn single(bit: usize) -> Self {
        Self::empty().with(bit)
    }

    /// Whether `bit` is set.
    #[must_use]
    pub fn contains(self, bit: usize) -> bool {
        !self.intersection(Self::mask(bit)).is_empty()
    }

    /// Copy with `bit` set.
    #[must_use]
    pub fn with(self, bit: usize) -> Self {
        self.union(Self::mask(bit))
    }

    /// Copy with `bit` cleared.
    #[must_use]
    pub fn without(self, bit: usize) -> Self {
        self.difference(Self::mask(bit))
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Bits of `self` not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[must_use]
    pub const fn symmetric_difference(self, other: Self) -> Self {
        Self(self.0 ^ other.0)
    }

    #[must_use]
    pub const fn complement(self) -> Self {
        Self(!self.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether [`SOLID_BIT`] is set.
    #[must_use]
    pub fn is_solid(self) -> bool {
        self.contains(SOLID_BIT)
    }

    /// Number of set bits.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the indices of set bits in ascending order.
    pub fn bits(self) -> impl Iterator<Item = usize> {
        (0..BITSET_WIDTH).filter(move |&b| self.contains(b))
    }

    fn mask(bit: usize) -> Self {
        u32::try_from(bit)
            .ok()
            .and_then(|shift| 1u128.checked_shl(shift))
            .map_or(Self::empty(), Self)
    }
}

impl fmt::Debug for AttributeBitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.bits()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bits_and_membership() {
        let s = AttributeBitset::single(5);
        assert!(s.contains(5));
        assert!(!s.contains(4));
        assert_eq!(s.count(), 1);
        assert!(AttributeBitset::solid().is_solid());
        assert!(!s.is_solid());
    }

    #[test]
    fn out_of_range_bit_is_ignored() {
        assert!(AttributeBitset::single(BITSET_WIDTH).is_empty());
        assert!(!AttributeBitset::all().contains(BITSET_WIDTH + 3));
    }

    #[test]
    fn combinators() {
        let a = AttributeBitset::single(1).with(2);
        let b = AttributeBitset::single(2).with(3);
        assert_eq!(a.union(b).bits().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(a.intersection(b).bits().collect::<Vec<_>>(), vec![2]);
        assert_eq!(a.difference(b).bits().collect::<Vec<_>>(), vec![1]);
        assert_eq!(a.symmetric_difference(b).bits().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(a.complement().complement(), a);
        assert!(a.intersection(a.complement()).is_empty());
        assert_eq!(AttributeBitset::all().without(7).complement(), AttributeBitset::single(7));
    }

    #[test]
    fn debug_lists_bits() {
        let s = AttributeBitset::solid().with(4);
        assert_eq!(format!("{s:?}"), "{0, 4}");
    }
}
