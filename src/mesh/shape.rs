//! Shape functions and quadrature for linear elements.
//!
//! The registry is built eagerly once and passed by reference to the load
//! computations.

use nalgebra::Matrix3;

use super::ElementKind;
use crate::error::{GeometryError, Result};
use crate::math::{Aabb, Point3, Vector3};

const GAUSS_2: f64 = 0.577_350_269_189_625_8;

/// Face types of linear elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceShape {
    Tri3,
    Quad4,
}

impl FaceShape {
    #[must_use]
    pub fn for_node_count(count: usize) -> Option<Self> {
        match count {
            3 => Some(Self::Tri3),
            4 => Some(Self::Quad4),
            _ => None,
        }
    }
}

/// Shape function values and parametric gradients at one quadrature point.
#[derive(Debug, Clone)]
struct Sample<const D: usize> {
    weight: f64,
    values: Vec<f64>,
    gradients: Vec<[f64; D]>,
}

#[derive(Debug, Clone)]
struct Rule<const D: usize> {
    samples: Vec<Sample<D>>,
}

impl<const D: usize> Rule<D> {
    fn build(
        points: &[([f64; D], f64)],
        shape: fn(&[f64; D]) -> (Vec<f64>, Vec<[f64; D]>),
    ) -> Self {
        let samples = points
            .iter()
            .map(|(xi, weight)| {
                let (values, gradients) = shape(xi);
                Sample {
                    weight: *weight,
                    values,
                    gradients,
                }
            })
            .collect();
        Self { samples }
    }
}

/// Quadrature rules and shape functions of every supported element and
/// face type.
#[derive(Debug, Clone)]
pub struct ShapeRegistry {
    tetrahedron: Rule<3>,
    wedge: Rule<3>,
    hexahedron: Rule<3>,
    tri3: Rule<2>,
    quad4: Rule<2>,
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeRegistry {
    #[must_use]
    pub fn new() -> Self {
        let g = GAUSS_2;
        let tri_points = [[1.0 / 6.0, 1.0 / 6.0], [2.0 / 3.0, 1.0 / 6.0], [1.0 / 6.0, 2.0 / 3.0]];

        let mut hex_points = Vec::with_capacity(8);
        for z in [-g, g] {
            for y in [-g, g] {
                for x in [-g, g] {
                    hex_points.push(([x, y, z], 1.0));
                }
            }
        }
        let mut wedge_points = Vec::with_capacity(6);
        for z in [-g, g] {
            for [x, y] in tri_points {
                wedge_points.push(([x, y, z], 1.0 / 6.0));
            }
        }
        let mut quad_points = Vec::with_capacity(4);
        for y in [-g, g] {
            for x in [-g, g] {
                quad_points.push(([x, y], 1.0));
            }
        }
        let tri: Vec<([f64; 2], f64)> = tri_points.iter().map(|p| (*p, 1.0 / 6.0)).collect();

        Self {
            tetrahedron: Rule::build(&[([0.25, 0.25, 0.25], 1.0 / 6.0)], tet4),
            wedge: Rule::build(&wedge_points, wedge6),
            hexahedron: Rule::build(&hex_points, hex8),
            tri3: Rule::build(&tri, tri3),
            quad4: Rule::build(&quad_points, quad4),
        }
    }

    /// Shape-function-weighted share of the element volume attributed to
    /// each node. The shares sum to the element volume.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] if the point count does not
    /// match `kind` or the element is collapsed at a quadrature point. An
    /// element counts as collapsed when its Jacobian falls to rounding level
    /// relative to the cube of its extent.
    pub fn node_volumes(&self, kind: ElementKind, points: &[Point3]) -> Result<Vec<f64>> {
        if points.len() != kind.node_count() {
            return Err(GeometryError::Degenerate(format!(
                "{kind:?} needs {} points, got {}",
                kind.node_count(),
                points.len()
            ))
            .into());
        }
        let rule = match kind {
            ElementKind::Tetrahedron => &self.tetrahedron,
            ElementKind::Wedge => &self.wedge,
            ElementKind::Hexahedron => &self.hexahedron,
        };

        let collapsed = f64::EPSILON * Aabb::from_points(points).diagonal().powi(3);
        let mut shares = vec![0.0; points.len()];
        for sample in &rule.samples {
            let mut jacobian = Matrix3::zeros();
            for (x, grad) in points.iter().zip(&sample.gradients) {
                jacobian += x.coords * Vector3::from(*grad).transpose();
            }
            let det = jacobian.determinant();
            if det.abs() <= collapsed {
                return Err(
                    GeometryError::Degenerate(format!("collapsed {kind:?} element")).into(),
                );
            }
            // Orientation of the node numbering does not matter for weights.
            let dv = det.abs() * sample.weight;
            for (share, n) in shares.iter_mut().zip(&sample.values) {
                *share += n * dv;
            }
        }
        Ok(shares)
    }

    /// Shape-function-weighted area vector attributed to each node of a face.
    /// The vectors sum to the face's area-weighted normal.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] if the face has neither three nor
    /// four points.
    pub fn node_area_vectors(&self, points: &[Point3]) -> Result<Vec<Vector3>> {
        let rule = match FaceShape::for_node_count(points.len()) {
            Some(FaceShape::Tri3) => &self.tri3,
            Some(FaceShape::Quad4) => &self.quad4,
            None => {
                return Err(GeometryError::Degenerate(format!(
                    "face with {} points has no shape functions",
                    points.len()
                ))
                .into())
            }
        };

        let mut shares = vec![Vector3::zeros(); points.len()];
        for sample in &rule.samples {
            let mut d_xi = Vector3::zeros();
            let mut d_eta = Vector3::zeros();
            for (x, [g_xi, g_eta]) in points.iter().zip(&sample.gradients) {
                d_xi += x.coords * *g_xi;
                d_eta += x.coords * *g_eta;
            }
            let da = d_xi.cross(&d_eta) * sample.weight;
            for (share, n) in shares.iter_mut().zip(&sample.values) {
                *share += da * *n;
            }
        }
        Ok(shares)
    }

    /// Per-node area shares of a face, each taken as the magnitude of its
    /// projection onto the face's net normal so that warped corners add to
    /// the total instead of cancelling it.
    ///
    /// # Errors
    ///
    /// See [`Self::node_area_vectors`].
    pub fn node_areas(&self, points: &[Point3]) -> Result<Vec<f64>> {
        let vectors = self.node_area_vectors(points)?;
        let net: Vector3 = vectors.iter().sum();
        let Some(axis) = net.try_normalize(0.0) else {
            return Ok(vectors.iter().map(Vector3::norm).collect());
        };
        Ok(vectors.iter().map(|a| a.dot(&axis).abs()).collect())
    }
}

fn tet4(xi: &[f64; 3]) -> (Vec<f64>, Vec<[f64; 3]>) {
    let [r, s, t] = *xi;
    (
        vec![1.0 - r - s - t, r, s, t],
        vec![[-1.0, -1.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    )
}

fn wedge6(xi: &[f64; 3]) -> (Vec<f64>, Vec<[f64; 3]>) {
    let [r, s, t] = *xi;
    let tri = [1.0 - r - s, r, s];
    let tri_grad = [[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]];
    let mut values = Vec::with_capacity(6);
    let mut gradients = Vec::with_capacity(6);
    for (sign, height) in [(-1.0, 0.5 * (1.0 - t)), (1.0, 0.5 * (1.0 + t))] {
        for (l, [gr, gs]) in tri.iter().zip(tri_grad) {
            values.push(l * height);
            gradients.push([gr * height, gs * height, 0.5 * sign * l]);
        }
    }
    (values, gradients)
}

const HEX_CORNERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

fn hex8(xi: &[f64; 3]) -> (Vec<f64>, Vec<[f64; 3]>) {
    let [r, s, t] = *xi;
    HEX_CORNERS
        .iter()
        .map(|[a, b, c]| {
            let (fr, fs, ft) = (1.0 + a * r, 1.0 + b * s, 1.0 + c * t);
            (
                0.125 * fr * fs * ft,
                [0.125 * a * fs * ft, 0.125 * b * fr * ft, 0.125 * c * fr * fs],
            )
        })
        .unzip()
}

fn tri3(xi: &[f64; 2]) -> (Vec<f64>, Vec<[f64; 2]>) {
    let [r, s] = *xi;
    (vec![1.0 - r - s, r, s], vec![[-1.0, -1.0], [1.0, 0.0], [0.0, 1.0]])
}

const QUAD_CORNERS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

fn quad4(xi: &[f64; 2]) -> (Vec<f64>, Vec<[f64; 2]>) {
    let [r, s] = *xi;
    QUAD_CORNERS
        .iter()
        .map(|[a, b]| {
            let (fr, fs) = (1.0 + a * r, 1.0 + b * s);
            (0.25 * fr * fs, [0.25 * a * fs, 0.25 * b * fr])
        })
        .unzip()
}
