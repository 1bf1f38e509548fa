pub mod aabb;
pub mod intersect_3d;
pub mod polygon_3d;

pub use aabb::Aabb;

/// 2D point type.
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Returns `true` if `normal` lies within `tolerance_deg` degrees of `direction`.
///
/// A zero `direction` disables the test and always passes.
#[must_use]
pub fn within_cone(normal: &Vector3, direction: &Vector3, tolerance_deg: f64) -> bool {
    let d_len = direction.norm();
    if d_len < TOLERANCE {
        return true;
    }
    let n_len = normal.norm();
    if n_len < TOLERANCE {
        return false;
    }
    let cos = (normal.dot(direction) / (n_len * d_len)).clamp(-1.0, 1.0);
    cos.acos().to_degrees() <= tolerance_deg + 1e-9
}
