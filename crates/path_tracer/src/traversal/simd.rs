//! 8-wide coherent ray walker.
//!
//! All eight rays descend together; a node is entered while at least one
//! lane survives its box test. No per-lane masking is carried down, the
//! per-lane hit distances provide the culling.

use crate::bvh::BVH_MAX_DEPTH;
use crate::math::geometry::intersect_box_ray8;

use super::{SimdTraversalContext, TraversableObject};

/// Walk the object's BVH with eight coherent rays.
pub fn traverse_simd8<T: TraversableObject>(
  object: &T,
  object_id: u32,
  ctx: &mut SimdTraversalContext,
) {
  let bvh = object.bvh();
  if bvh.num_nodes() == 0 {
    return;
  }
  let nodes = bvh.nodes();

  let inv_dir = ctx.ray.inv_dir;
  let origin_div_dir = ctx.ray.origin.mul(&inv_dir);

  let mut stack = [0u32; BVH_MAX_DEPTH];
  let mut stack_size = 0usize;
  let mut current = 0u32;

  loop {
    let node = &nodes[current as usize];
    if node.is_leaf() {
      object.traverse_leaf_simd8(ctx, object_id, node);
    } else {
      let mut index_a = node.child_index;
      let mut index_b = node.child_index + 1;

      let (dist_a, mask_a) = intersect_box_ray8(
        &inv_dir,
        &origin_div_dir,
        &nodes[index_a as usize].aabb8(),
        ctx.hit.distance,
      );
      let (dist_b, mask_b) = intersect_box_ray8(
        &inv_dir,
        &origin_div_dir,
        &nodes[index_b as usize].aabb8(),
        ctx.hit.distance,
      );

      let bits_a = mask_a.to_bitmask() as u32;
      let bits_b = mask_b.to_bitmask() as u32;

      ctx.context.counters.num_ray_box_tests += 16;
      ctx.context.counters.num_passed_ray_box_tests +=
        (bits_a.count_ones() + bits_b.count_ones()) as u64;

      let bits_ab = bits_a & bits_b;
      if bits_ab != 0 {
        // enter the child that the majority of surviving lanes reaches
        // first
        use std::simd::cmp::SimdPartialOrd;
        let order = dist_a.simd_lt(dist_b).to_bitmask() as u32;
        let votes_a = (order & bits_ab).count_ones();
        let votes_b = ((!order) & bits_ab).count_ones();
        if votes_b > votes_a {
          std::mem::swap(&mut index_a, &mut index_b);
        }

        debug_assert!(stack_size < BVH_MAX_DEPTH);
        stack[stack_size] = index_b;
        stack_size += 1;
        current = index_a;
        continue;
      }
      if bits_a != 0 {
        current = index_a;
        continue;
      }
      if bits_b != 0 {
        current = index_b;
        continue;
      }
    }

    if stack_size == 0 {
      break;
    }
    stack_size -= 1;
    current = stack[stack_size];
  }
}
