//! Attribute-tagged solid modelling for assigning named regions, loads and
//! cuts to finite element meshes.

pub mod attribute;
pub mod brep;
pub mod derive;
pub mod directive;
pub mod error;
pub mod index;
pub mod math;
pub mod mesh;
pub mod project;
pub mod slice;
pub mod solid;

#[cfg(test)]
mod test_support;

pub use error::{GeotagError, Result};
