//! Single-ray BVH walker.

use crate::bvh::BVH_MAX_DEPTH;
use crate::math::geometry::intersect_box_ray;

use super::{SingleTraversalContext, TraversableObject};

/// Walk the object's BVH with one ray, invoking the leaf handler on every
/// reached leaf. Children are visited front to back; a child is skipped when
/// its entry distance is already beyond the current best hit.
pub fn traverse_single<T: TraversableObject>(
  object: &T,
  object_id: u32,
  ctx: &mut SingleTraversalContext,
) {
  let bvh = object.bvh();
  if bvh.num_nodes() == 0 {
    return;
  }
  let nodes = bvh.nodes();

  let mut stack = [0u32; BVH_MAX_DEPTH];
  let mut stack_size = 0usize;
  let mut current = 0u32;

  loop {
    let node = &nodes[current as usize];
    if node.is_leaf() {
      object.traverse_leaf_single(ctx, object_id, node);
    } else {
      let mut index_a = node.child_index;
      let mut index_b = node.child_index + 1;

      let mut dist_a = intersect_box_ray(&ctx.ray, &nodes[index_a as usize].aabb());
      let mut dist_b = intersect_box_ray(&ctx.ray, &nodes[index_b as usize].aabb());

      // box occlusion: beyond the current best hit means no closer hit
      // can be found inside
      let mut hit_a = dist_a.is_some_and(|d| d < ctx.hit.distance);
      let mut hit_b = dist_b.is_some_and(|d| d < ctx.hit.distance);

      ctx.context.counters.num_ray_box_tests += 2;
      ctx.context.counters.num_passed_ray_box_tests += hit_a as u64 + hit_b as u64;

      if hit_a && hit_b {
        // descend into the nearer child, push the farther one
        if dist_b < dist_a {
          std::mem::swap(&mut index_a, &mut index_b);
          std::mem::swap(&mut dist_a, &mut dist_b);
          std::mem::swap(&mut hit_a, &mut hit_b);
        }
        debug_assert!(stack_size < BVH_MAX_DEPTH);
        stack[stack_size] = index_b;
        stack_size += 1;
        current = index_a;
        continue;
      }
      if hit_a {
        current = index_a;
        continue;
      }
      if hit_b {
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

/// Shadow walker: stops as soon as any leaf reports an occluder.
pub fn traverse_shadow_single<T: TraversableObject>(
  object: &T,
  ctx: &mut SingleTraversalContext,
) -> bool {
  let bvh = object.bvh();
  if bvh.num_nodes() == 0 {
    return false;
  }
  let nodes = bvh.nodes();

  let mut stack = [0u32; BVH_MAX_DEPTH];
  let mut stack_size = 0usize;
  let mut current = 0u32;

  loop {
    let node = &nodes[current as usize];
    if node.is_leaf() {
      if object.traverse_leaf_shadow(ctx, node) {
        return true;
      }
    } else {
      let index_a = node.child_index;
      let index_b = node.child_index + 1;

      let hit_a = intersect_box_ray(&ctx.ray, &nodes[index_a as usize].aabb())
        .is_some_and(|d| d < ctx.hit.distance);
      let hit_b = intersect_box_ray(&ctx.ray, &nodes[index_b as usize].aabb())
        .is_some_and(|d| d < ctx.hit.distance);

      ctx.context.counters.num_ray_box_tests += 2;
      ctx.context.counters.num_passed_ray_box_tests += hit_a as u64 + hit_b as u64;

      if hit_a && hit_b {
        debug_assert!(stack_size < BVH_MAX_DEPTH);
        stack[stack_size] = index_b;
        stack_size += 1;
        current = index_a;
        continue;
      }
      if hit_a {
        current = index_a;
        continue;
      }
      if hit_b {
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

  false
}
