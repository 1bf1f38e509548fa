//! Fixtures shared by unit tests.

#![allow(clippy::unwrap_used)]

use crate::math::Point3;
use crate::mesh::{ElementKind, Mesh};

/// Installs a log subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Structured hexahedral mesh of the box `[min, max]` with `cells[axis]`
/// divisions per axis.
#[allow(clippy::cast_precision_loss)]
pub fn hex_grid(min: Point3, max: Point3, cells: [usize; 3]) -> Mesh {
    let [nx, ny, nz] = cells;
    let mut mesh = Mesh::new();
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                let t = [i as f64 / nx as f64, j as f64 / ny as f64, k as f64 / nz as f64];
                mesh.add_node(Point3::new(
                    min.x + t[0] * (max.x - min.x),
                    min.y + t[1] * (max.y - min.y),
                    min.z + t[2] * (max.z - min.z),
                ));
            }
        }
    }
    let id = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let nodes = vec![
                    id(i, j, k),
                    id(i + 1, j, k),
                    id(i + 1, j + 1, k),
                    id(i, j + 1, k),
                    id(i, j, k + 1),
                    id(i + 1, j, k + 1),
                    id(i + 1, j + 1, k + 1),
                    id(i, j + 1, k + 1),
                ];
                mesh.add_element(ElementKind::Hexahedron, nodes).unwrap();
            }
        }
    }
    mesh
}
