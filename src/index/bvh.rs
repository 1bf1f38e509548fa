//! Bounding volume hierarchy over triangles.

use crate::math::{Aabb, Point3, Vector3};

/// BVH node containing either leaf triangles or child nodes.
#[derive(Debug)]
enum BvhNode {
    Leaf {
        bbox: Aabb,
        triangles: Vec<usize>,
    },
    Internal {
        bbox: Aabb,
        left: Box<Self>,
        right: Box<Self>,
    },
}

impl BvhNode {
    fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Bounding volume hierarchy answering ray and proximity candidate queries.
#[derive(Debug)]
pub struct Bvh {
    root: Option<BvhNode>,
    triangle_count: usize,
}

impl Bvh {
    /// Builds a BVH, splitting at the median along the longest axis.
    #[must_use]
    pub fn build(triangles: &[[Point3; 3]], max_leaf_size: usize) -> Self {
        if triangles.is_empty() {
            return Self {
                root: None,
                triangle_count: 0,
            };
        }
        let boxes: Vec<Aabb> = triangles.iter().map(|t| Aabb::from_points(t)).collect();
        let indices: Vec<usize> = (0..triangles.len()).collect();
        Self {
            root: Some(Self::build_recursive(&boxes, indices, max_leaf_size.max(1))),
            triangle_count: triangles.len(),
        }
    }

    fn build_recursive(boxes: &[Aabb], mut indices: Vec<usize>, max_leaf_size: usize) -> BvhNode {
        let mut bbox = Aabb::empty();
        for &i in &indices {
            bbox.expand(&boxes[i]);
        }
        if indices.len() <= max_leaf_size {
            return BvhNode::Leaf {
                bbox,
                triangles: indices,
            };
        }

        let axis = bbox.longest_axis();
        indices.sort_by(|&a, &b| boxes[a].center()[axis].total_cmp(&boxes[b].center()[axis]));
        let right_indices = indices.split_off(indices.len() / 2);
        BvhNode::Internal {
            bbox,
            left: Box::new(Self::build_recursive(boxes, indices, max_leaf_size)),
            right: Box::new(Self::build_recursive(boxes, right_indices, max_leaf_size)),
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Triangles whose bounding boxes the ray `origin + t * dir` (`t >= 0`)
    /// passes through.
    #[must_use]
    pub fn ray_candidates(&self, origin: &Point3, dir: &Vector3) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            if node.bbox().ray_entry(origin, dir).is_none() {
                continue;
            }
            match node {
                BvhNode::Leaf { triangles, .. } => out.extend_from_slice(triangles),
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        out
    }

    /// Triangles whose bounding boxes lie within `radius` of `point`.
    #[must_use]
    pub fn near_candidates(&self, point: &Point3, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        let r2 = radius * radius;
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            if node.bbox().distance_squared(point) > r2 {
                continue;
            }
            match node {
                BvhNode::Leaf { triangles, .. } => out.extend_from_slice(triangles),
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        out
    }
}
