//! Named selection directives and their attribute bits.

mod encode;

use std::collections::HashSet;

use tracing::debug;

use crate::attribute::{BITSET_WIDTH, SOLID_BIT};
use crate::derive::SurfaceMode;
use crate::error::{ConfigError, Result};
use crate::math::{Point3, Vector3};
use crate::solid::{AttributedSolid, TriangleSolid};

/// What a directive selects.
#[derive(Debug, Clone)]
pub enum DirectiveKind {
    /// Solid volumes inside the mask.
    SelectVolume { mask: TriangleSolid },
    /// Faces inside the mask whose normal is within `tolerance_deg` of
    /// `direction`. A zero `direction` accepts every normal.
    SelectSurface {
        mask: TriangleSolid,
        direction: Vector3,
        tolerance_deg: f64,
        mode: SurfaceMode,
    },
    /// An internal surface along which the mesh is partitioned.
    Slice {
        mask: TriangleSolid,
        direction: Vector3,
        tolerance_deg: f64,
    },
    /// The mesh node at a point.
    SelectNode { point: Point3 },
}

#[derive(Debug, Clone)]
pub struct Directive {
    pub name: String,
    pub kind: DirectiveKind,
}

impl Directive {
    #[must_use]
    pub fn select_volume(name: impl Into<String>, mask: TriangleSolid) -> Self {
        Self {
            name: name.into(),
            kind: DirectiveKind::SelectVolume { mask },
        }
    }

    #[must_use]
    pub fn select_surface(
        name: impl Into<String>,
        mask: TriangleSolid,
        direction: Vector3,
        tolerance_deg: f64,
        mode: SurfaceMode,
    ) -> Self {
        Self {
            name: name.into(),
            kind: DirectiveKind::SelectSurface {
                mask,
                direction,
                tolerance_deg,
                mode,
            },
        }
    }

    #[must_use]
    pub fn slice(
        name: impl Into<String>,
        mask: TriangleSolid,
        direction: Vector3,
        tolerance_deg: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: DirectiveKind::Slice {
                mask,
                direction,
                tolerance_deg,
            },
        }
    }

    #[must_use]
    pub fn select_node(name: impl Into<String>, point: Point3) -> Self {
        Self {
            name: name.into(),
            kind: DirectiveKind::SelectNode { point },
        }
    }

    /// Whether the selection needs faces on both sides of the solid.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            DirectiveKind::Slice { .. }
                | DirectiveKind::SelectSurface {
                    mode: SurfaceMode::Internal,
                    ..
                }
        )
    }

    fn validate(&self) -> Result<()> {
        let (mask, tolerance) = match &self.kind {
            DirectiveKind::SelectVolume { mask } => (Some(mask), None),
            DirectiveKind::SelectSurface {
                mask, tolerance_deg, ..
            }
            | DirectiveKind::Slice {
                mask, tolerance_deg, ..
            } => (Some(mask), Some(*tolerance_deg)),
            DirectiveKind::SelectNode { .. } => (None, None),
        };
        if let Some(degrees) = tolerance {
            if !degrees.is_finite() || !(0.0..=180.0).contains(&degrees) {
                return Err(ConfigError::InvalidTolerance { degrees }.into());
            }
            if self.is_internal() && degrees >= 90.0 {
                return Err(ConfigError::InternalTolerance { degrees }.into());
            }
        }
        if let Some(mask) = mask {
            mask.validate()?;
        }
        Ok(())
    }
}

/// A validated list of directives, each owning one attribute bit.
///
/// Bits are handed out in order starting after [`SOLID_BIT`].
#[derive(Debug, Clone)]
pub struct DirectiveSet {
    entries: Vec<(Directive, usize)>,
}

impl DirectiveSet {
    /// Validates every directive and allocates bits.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for duplicate names, out-of-range tolerances
    /// or more directives than free bits, and
    /// [`crate::error::GeometryError::InvalidSolid`] for malformed masks.
    pub fn new(directives: Vec<Directive>) -> Result<Self> {
        let available = BITSET_WIDTH - 1;
        if directives.len() > available {
            return Err(ConfigError::BitBudgetExceeded {
                requested: directives.len(),
                available,
            }
            .into());
        }
        let mut names = HashSet::new();
        for d in &directives {
            if !names.insert(d.name.as_str()) {
                return Err(ConfigError::DuplicateName(d.name.clone()).into());
            }
            d.validate()?;
        }
        let entries = directives
            .into_iter()
            .enumerate()
            .map(|(i, d)| (d, SOLID_BIT + 1 + i))
            .collect();
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Directive, usize)> {
        self.entries.iter().map(|(d, bit)| (d, *bit))
    }

    /// The directive named `name` and its bit.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<(&Directive, usize)> {
        self.iter().find(|(d, _)| d.name == name)
    }

    #[must_use]
    pub fn bit(&self, name: &str) -> Option<usize> {
        self.get(name).map(|(_, bit)| bit)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes every directive into `model`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a mask solid or an overlay is degenerate.
    pub fn apply(&self, model: AttributedSolid) -> Result<AttributedSolid> {
        let mut model = model;
        for (directive, bit) in self.iter() {
            model = match &directive.kind {
                DirectiveKind::SelectVolume { mask } => encode::select_volume(&model, mask, bit)?,
                DirectiveKind::SelectSurface {
                    mask,
                    direction,
                    tolerance_deg,
                    mode: SurfaceMode::External,
                } => encode::select_external_surface(&model, mask, bit, direction, *tolerance_deg)?,
                DirectiveKind::SelectSurface {
                    mask,
                    direction,
                    tolerance_deg,
                    mode: SurfaceMode::Internal,
                }
                | DirectiveKind::Slice {
                    mask,
                    direction,
                    tolerance_deg,
                } => encode::select_internal_surface(&model, mask, bit, direction, *tolerance_deg)?,
                DirectiveKind::SelectNode { point } => encode::select_node(&model, point, bit)?,
            };
            debug!(name = %directive.name, bit, "applied directive");
        }
        Ok(model)
    }
}
