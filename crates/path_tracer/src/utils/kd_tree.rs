//! Kd-tree for fixed-radius neighbor queries.
//!
//! Alternative to [`crate::utils::hash_grid::HashGrid`] for unevenly
//! distributed point sets. Nodes pack the split axis into 2 bits next to a
//! 30-bit point index.

use glam::Vec3A;
use tracing::info;

use crate::utils::timer::Timer;

const INVALID_NODE: u32 = u32::MAX;

#[derive(Clone, Copy)]
struct Node {
  // 2-bit split axis | 30-bit point index
  axis_and_point: u32,
  left: u32,
  right: u32,
}

impl Node {
  #[inline]
  fn axis(&self) -> usize {
    (self.axis_and_point >> 30) as usize
  }

  #[inline]
  fn point_index(&self) -> u32 {
    self.axis_and_point & 0x3fff_ffff
  }
}

pub struct KdTree {
  nodes: Vec<Node>,
  root: u32,
}

impl KdTree {
  /// Build the tree by recursive median split along the widest axis.
  pub fn build(points: &[Vec3A]) -> Self {
    let timer = Timer::start();

    let mut indices: Vec<u32> = (0..points.len() as u32).collect();
    let mut tree = Self {
      nodes: Vec::with_capacity(points.len()),
      root: INVALID_NODE,
    };
    tree.root = tree.build_recursive(points, &mut indices);

    info!(
      points = points.len(),
      elapsed_ms = timer.elapsed_ms(),
      "kd-tree built"
    );

    tree
  }

  fn build_recursive(&mut self, points: &[Vec3A], indices: &mut [u32]) -> u32 {
    if indices.is_empty() {
      return INVALID_NODE;
    }

    // split along the widest extent of this subset
    let mut min = Vec3A::splat(f32::INFINITY);
    let mut max = Vec3A::splat(f32::NEG_INFINITY);
    for &i in indices.iter() {
      min = min.min(points[i as usize]);
      max = max.max(points[i as usize]);
    }
    let size = max - min;
    let axis = if size.x >= size.y && size.x >= size.z {
      0
    } else if size.y >= size.z {
      1
    } else {
      2
    };

    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
      points[a as usize][axis].total_cmp(&points[b as usize][axis])
    });
    let median = indices[mid];

    let node_index = self.nodes.len() as u32;
    debug_assert!(median < (1 << 30), "point index exceeds 30 bits");
    self.nodes.push(Node {
      axis_and_point: ((axis as u32) << 30) | median,
      left: INVALID_NODE,
      right: INVALID_NODE,
    });

    let (left_set, rest) = indices.split_at_mut(mid);
    let right_set = &mut rest[1..];

    let left = self.build_recursive(points, left_set);
    let right = self.build_recursive(points, right_set);
    self.nodes[node_index as usize].left = left;
    self.nodes[node_index as usize].right = right;

    node_index
  }

  /// Invoke `visit` with the index of every point within `radius` of
  /// `query`.
  pub fn for_each_neighbor(
    &self,
    query: Vec3A,
    radius: f32,
    points: &[Vec3A],
    mut visit: impl FnMut(u32),
  ) {
    if self.root == INVALID_NODE {
      return;
    }

    let radius_sqr = radius * radius;
    let mut stack = [INVALID_NODE; 64];
    let mut stack_size = 1;
    stack[0] = self.root;

    while stack_size > 0 {
      stack_size -= 1;
      let node = &self.nodes[stack[stack_size] as usize];
      let point = points[node.point_index() as usize];

      if (point - query).length_squared() <= radius_sqr {
        visit(node.point_index());
      }

      let axis = node.axis();
      let delta = query[axis] - point[axis];

      // the near side always descends; the far side only when the splitting
      // plane is within the query radius
      let (near, far) = if delta <= 0.0 {
        (node.left, node.right)
      } else {
        (node.right, node.left)
      };

      if far != INVALID_NODE && delta.abs() <= radius && stack_size < stack.len() {
        stack[stack_size] = far;
        stack_size += 1;
      }
      if near != INVALID_NODE && stack_size < stack.len() {
        stack[stack_size] = near;
        stack_size += 1;
      }
    }
  }
}

#[cfg(test)]
#[path = "kd_tree_test.rs"]
mod kd_tree_test;
