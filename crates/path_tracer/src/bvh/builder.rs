//! Top-down SAH construction.
//!
//! The builder keeps three centroid-sorted index permutations (one per axis)
//! and evaluates the surface-area heuristic at every split position of every
//! axis, emitting a leaf whenever no split beats the single-leaf cost. The
//! final leaf permutation is returned so callers can reorder their primitive
//! arrays into leaf-contiguous layout.

use rayon::prelude::*;
use tracing::info;

use crate::error::RtResult;
use crate::math::aabb::Aabb;
use crate::utils::timer::Timer;

use super::{Bvh, BvhNode, BVH_MAX_DEPTH};

/// SAH build parameters.
#[derive(Clone, Copy, Debug)]
pub struct BuildingParams {
  /// Maximum number of primitives referenced by one leaf.
  pub max_leaf_size: u32,
}

impl Default for BuildingParams {
  fn default() -> Self {
    Self { max_leaf_size: 2 }
  }
}

// per-node working set: the same leaf subset sorted along each axis
struct WorkSet {
  sorted: [Vec<u32>; 3],
}

impl WorkSet {
  fn len(&self) -> usize {
    self.sorted[0].len()
  }
}

/// Surface-area-heuristic BVH builder.
pub struct BvhBuilder<'a> {
  leaf_boxes: &'a [Aabb],
  params: BuildingParams,
  nodes: Vec<BvhNode>,
  leaves_order: Vec<u32>,
  // scratch reused across recursion levels
  area_cache: Vec<f32>,
}

impl<'a> BvhBuilder<'a> {
  /// Build a BVH over `leaf_boxes`; returns the tree and the new leaf order.
  pub fn build(leaf_boxes: &'a [Aabb], params: BuildingParams) -> RtResult<(Bvh, Vec<u32>)> {
    let timer = Timer::start();

    debug_assert!((leaf_boxes.len() as u64) < (1 << 30), "leaf count exceeds 30 bits");

    if leaf_boxes.is_empty() {
      return Ok((Bvh::new(), Vec::new()));
    }

    let mut builder = Self {
      leaf_boxes,
      params,
      nodes: Vec::with_capacity(2 * leaf_boxes.len()),
      leaves_order: Vec::with_capacity(leaf_boxes.len()),
      area_cache: vec![0.0; 2 * leaf_boxes.len()],
    };

    // one centroid-sorted permutation per axis; stable sort keeps ties in
    // input order so rebuilds are bit-identical
    let mut sorted: [Vec<u32>; 3] =
      std::array::from_fn(|_| (0..leaf_boxes.len() as u32).collect());
    sorted.par_iter_mut().enumerate().for_each(|(axis, indices)| {
      indices.sort_by(|&a, &b| {
        let ca = leaf_boxes[a as usize].center()[axis];
        let cb = leaf_boxes[b as usize].center()[axis];
        ca.total_cmp(&cb)
      });
    });

    builder.nodes.push(BvhNode::new_leaf(&Aabb::empty(), 0, 1)); // placeholder
    builder.build_node(0, WorkSet { sorted }, 0);

    let nodes = builder.nodes;
    let order = builder.leaves_order;
    debug_assert_eq!(order.len(), leaf_boxes.len());

    info!(
      leaves = leaf_boxes.len(),
      nodes = nodes.len(),
      elapsed_ms = timer.elapsed_ms(),
      "BVH built"
    );

    Ok((Bvh::from_nodes(nodes), order))
  }

  fn subset_bounds(&self, indices: &[u32]) -> Aabb {
    let mut bounds = Aabb::empty();
    for &i in indices {
      bounds = bounds.union(&self.leaf_boxes[i as usize]);
    }
    bounds
  }

  fn emit_leaf(&mut self, node_index: usize, work: &WorkSet, bounds: &Aabb) {
    let first = self.leaves_order.len() as u32;
    self.leaves_order.extend_from_slice(&work.sorted[0]);
    self.nodes[node_index] = BvhNode::new_leaf(bounds, first, work.len() as u32);
  }

  fn build_node(&mut self, node_index: usize, work: WorkSet, depth: u32) {
    let count = work.len();
    let bounds = self.subset_bounds(&work.sorted[0]);

    // the traversal stack depth is a hard cap
    if count <= self.params.max_leaf_size as usize || depth as usize >= BVH_MAX_DEPTH - 1 {
      self.emit_leaf(node_index, &work, &bounds);
      return;
    }

    // evaluate SAH cost at every split of every axis
    let mut best_axis = usize::MAX;
    let mut best_split = 0usize;
    let mut best_cost = f32::MAX;

    let (left_areas, right_areas) = self.area_cache.split_at_mut(self.leaf_boxes.len());
    for axis in 0..3 {
      let indices = &work.sorted[axis];

      // prefix-union areas
      let mut left_box = Aabb::empty();
      for (i, &leaf) in indices.iter().enumerate() {
        left_box = left_box.union(&self.leaf_boxes[leaf as usize]);
        left_areas[i] = left_box.surface_area();
      }

      // suffix-union areas
      let mut right_box = Aabb::empty();
      for (i, &leaf) in indices.iter().enumerate().rev() {
        right_box = right_box.union(&self.leaf_boxes[leaf as usize]);
        right_areas[i] = right_box.surface_area();
      }

      for split in 1..count {
        let cost =
          left_areas[split - 1] * split as f32 + right_areas[split] * (count - split) as f32;
        if cost < best_cost {
          best_cost = cost;
          best_axis = axis;
          best_split = split;
        }
      }
    }

    // no split beats keeping everything in one leaf
    let leaf_cost = bounds.surface_area() * count as f32;
    if best_axis == usize::MAX || best_cost >= leaf_cost {
      self.emit_leaf(node_index, &work, &bounds);
      return;
    }

    // membership of the left child, then stable partition of every axis
    let mut goes_left = vec![false; self.leaf_boxes.len()];
    for &leaf in &work.sorted[best_axis][..best_split] {
      goes_left[leaf as usize] = true;
    }

    let mut left = WorkSet {
      sorted: std::array::from_fn(|_| Vec::with_capacity(best_split)),
    };
    let mut right = WorkSet {
      sorted: std::array::from_fn(|_| Vec::with_capacity(count - best_split)),
    };
    for axis in 0..3 {
      for &leaf in &work.sorted[axis] {
        if goes_left[leaf as usize] {
          left.sorted[axis].push(leaf);
        } else {
          right.sorted[axis].push(leaf);
        }
      }
    }

    let first_child = self.nodes.len() as u32;
    self.nodes.push(BvhNode::new_leaf(&Aabb::empty(), 0, 1)); // placeholders
    self.nodes.push(BvhNode::new_leaf(&Aabb::empty(), 0, 1));
    self.nodes[node_index] = BvhNode::new_inner(&bounds, first_child, best_axis as u32);

    self.build_node(first_child as usize, left, depth + 1);
    self.build_node(first_child as usize + 1, right, depth + 1);
  }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod builder_test;
