//! Ray-packet walker.
//!
//! A packet carries up to [`MAX_RAY_PACKET_SIZE`](super::MAX_RAY_PACKET_SIZE)
//! coherent rays in groups of eight. At each node the whole list of active
//! groups is box-tested; groups with no surviving lane are compacted away
//! before descending. Child order comes from the node's stored split axis
//! and the packet's ray octant, so no per-ray distance comparison is needed.

use std::simd::f32x8;

use crate::bvh::BVH_MAX_DEPTH;
use crate::math::geometry::intersect_box_ray8;
use crate::math::ray::Ray8;
use crate::math::simd::Vec3x8;
use crate::rendering::context::RenderingContext;

use super::{PacketTraversalContext, TraversableObject, MAX_RAY_GROUPS, MAX_RAY_PACKET_SIZE};

/// Pixel coordinates a ray contributes to.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageLocation {
  pub x: u16,
  pub y: u16,
}

/// Eight coherent rays plus their per-lane distance limits.
#[derive(Clone, Copy)]
pub struct RayGroup {
  pub rays: Ray8,
  pub max_distances: f32x8,
}

/// Packet of coherent rays, filled by the viewport tile loop.
pub struct RayPacket {
  pub groups: Vec<RayGroup>,
  /// Per-group color weight of the carried rays.
  pub weights: Vec<Vec3x8>,
  /// Image pixel of every ray.
  pub image_locations: Vec<ImageLocation>,
  /// Number of rays (not groups).
  pub num_rays: u32,
}

impl RayPacket {
  pub fn new() -> Self {
    Self {
      groups: Vec::with_capacity(MAX_RAY_GROUPS),
      weights: Vec::with_capacity(MAX_RAY_GROUPS),
      image_locations: Vec::with_capacity(MAX_RAY_PACKET_SIZE),
      num_rays: 0,
    }
  }

  #[inline]
  pub fn num_groups(&self) -> u32 {
    (self.num_rays + 7) / 8
  }

  /// Append a full group of eight rays sharing one weight.
  pub fn push_group(&mut self, rays: Ray8, weight: Vec3x8, locations: [ImageLocation; 8]) {
    debug_assert!((self.num_rays as usize) < MAX_RAY_PACKET_SIZE);
    self.groups.push(RayGroup {
      rays,
      max_distances: f32x8::splat(f32::MAX),
    });
    self.weights.push(weight);
    self.image_locations.extend_from_slice(&locations);
    self.num_rays += 8;
  }

  pub fn clear(&mut self) {
    self.groups.clear();
    self.weights.clear();
    self.image_locations.clear();
    self.num_rays = 0;
  }
}

impl Default for RayPacket {
  fn default() -> Self {
    Self::new()
  }
}

// Box-test all active groups against one node; records each group's lane
// mask and returns the total number of surviving rays.
fn test_ray_packet(
  packet: &RayPacket,
  num_groups: u32,
  node_box: &crate::math::simd::Box3x8,
  context: &mut RenderingContext,
) -> u32 {
  let mut rays_hit = 0u32;

  for i in 0..num_groups as usize {
    let group = &packet.groups[context.active_groups_indices[i] as usize];
    let origin_div_dir = group.rays.origin.mul(&group.rays.inv_dir);

    let (_, mask) = intersect_box_ray8(
      &group.rays.inv_dir,
      &origin_div_dir,
      node_box,
      group.max_distances,
    );
    let bits = mask.to_bitmask() as u8;
    context.active_rays_mask[i] = bits;
    rays_hit += bits.count_ones();
  }

  context.counters.num_ray_box_tests += 8 * num_groups as u64;
  context.counters.num_passed_ray_box_tests += rays_hit as u64;

  rays_hit
}

// Compact groups whose lane mask came out empty.
fn remove_missed_groups(context: &mut RenderingContext, num_groups: &mut u32) {
  let mut i = 0usize;
  while i < *num_groups as usize {
    if context.active_rays_mask[i] != 0 {
      i += 1;
      continue;
    }
    let last = *num_groups as usize - 1;
    context.active_groups_indices.swap(i, last);
    context.active_rays_mask.swap(i, last);
    *num_groups -= 1;
  }
}

struct StackFrame {
  node: u32,
  num_active_groups: u32,
  num_active_rays: u32,
}

/// Walk the object's BVH with a whole ray packet.
pub fn traverse_packet<T: TraversableObject>(
  object: &T,
  object_id: u32,
  ctx: &mut PacketTraversalContext,
) {
  let bvh = object.bvh();
  if bvh.num_nodes() == 0 || ctx.packet.num_rays == 0 {
    return;
  }
  let nodes = bvh.nodes();

  let total_groups = ctx.packet.num_groups();
  for i in 0..total_groups as usize {
    ctx.context.active_groups_indices[i] = i as u16;
  }

  // packet octant from the first ray; packets are built coherent so all
  // rays share direction signs
  let first = &ctx.packet.groups[0].rays;
  let mut octant = 0u32;
  if first.dir.x[0] < 0.0 {
    octant |= 1;
  }
  if first.dir.y[0] < 0.0 {
    octant |= 2;
  }
  if first.dir.z[0] < 0.0 {
    octant |= 4;
  }

  let mut stack: Vec<StackFrame> = Vec::with_capacity(BVH_MAX_DEPTH);
  stack.push(StackFrame {
    node: 0,
    num_active_groups: total_groups,
    num_active_rays: ctx.packet.num_rays,
  });

  while let Some(frame) = stack.pop() {
    let node = &nodes[frame.node as usize];

    let mut num_groups = frame.num_active_groups;
    let rays_hit = test_ray_packet(ctx.packet, num_groups, &node.aabb8(), ctx.context);
    if rays_hit == 0 {
      continue;
    }

    if rays_hit < frame.num_active_rays {
      remove_missed_groups(ctx.context, &mut num_groups);
    }

    if node.is_leaf() {
      object.traverse_leaf_packet(ctx, object_id, node, num_groups);
    } else {
      // stored-split-axis trick: the octant sign along the split axis
      // gives the fixed front-to-back order
      let first_index = (octant >> node.split_axis()) & 1;
      let second_index = first_index ^ 1;

      stack.push(StackFrame {
        node: node.child_index + second_index,
        num_active_groups: num_groups,
        num_active_rays: rays_hit,
      });
      stack.push(StackFrame {
        node: node.child_index + first_index,
        num_active_groups: num_groups,
        num_active_rays: rays_hit,
      });
    }
  }
}
