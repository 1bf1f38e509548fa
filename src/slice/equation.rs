use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use super::Pair;
use crate::math::Vector3;
use crate::mesh::NodeId;

const COEFFICIENT_EPSILON: f64 = 1e-12;

/// One coefficient of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Term {
    pub node: NodeId,
    /// Spatial direction, `0..3`.
    pub dof: usize,
    pub coefficient: f64,
}

/// Homogeneous linear constraint `sum(coefficient * u[node][dof]) = 0` over
/// nodal displacements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearEquation {
    coefficients: BTreeMap<(NodeId, usize), f64>,
}

impl LinearEquation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `normal . (u[a] - u[b]) = 0`: the pair may slide but not separate or
    /// interpenetrate along the normal.
    #[must_use]
    pub fn coincidence(pair: &Pair) -> Self {
        let mut eq = Self::new();
        for dof in 0..3 {
            eq.add(pair.a, dof, pair.normal[dof]);
            eq.add(pair.b, dof, -pair.normal[dof]);
        }
        eq
    }

    /// Adds to a coefficient. Coefficients that end up negligible are dropped.
    pub fn add(&mut self, node: NodeId, dof: usize, coefficient: f64) {
        let entry = self.coefficients.entry((node, dof)).or_insert(0.0);
        *entry += coefficient;
        if entry.abs() < COEFFICIENT_EPSILON {
            self.coefficients.remove(&(node, dof));
        }
    }

    #[must_use]
    pub fn coefficient(&self, node: NodeId, dof: usize) -> f64 {
        self.coefficients.get(&(node, dof)).copied().unwrap_or(0.0)
    }

    pub fn terms(&self) -> impl Iterator<Item = Term> + '_ {
        self.coefficients.iter().map(|(&(node, dof), &coefficient)| Term {
            node,
            dof,
            coefficient,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Left-hand side for the given nodal displacements.
    #[must_use]
    pub fn residual(&self, displacement: impl Fn(NodeId) -> Vector3) -> f64 {
        self.terms()
            .map(|t| t.coefficient * displacement(t.node)[t.dof])
            .sum()
    }
}

/// Orders each equation's terms for a solver that eliminates the first term.
///
/// The first term is the largest-magnitude one whose variable no earlier
/// equation already eliminates. When every variable is taken, the largest
/// term goes first and the conflict is logged.
#[must_use]
pub fn order_for_elimination(equations: &[LinearEquation]) -> Vec<Vec<Term>> {
    let mut dependent: HashSet<(NodeId, usize)> = HashSet::new();
    equations
        .iter()
        .enumerate()
        .map(|(index, eq)| {
            let mut terms: Vec<Term> = eq.terms().collect();
            terms.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
            let pick = terms
                .iter()
                .position(|t| !dependent.contains(&(t.node, t.dof)))
                .unwrap_or_else(|| {
                    warn!(equation = index, "every variable is already eliminated elsewhere");
                    0
                });
            if let Some(t) = terms.get(pick).copied() {
                dependent.insert((t.node, t.dof));
                terms.remove(pick);
                terms.insert(0, t);
            }
            terms
        })
        .collect()
}
