//! Generic BVH walkers.
//!
//! Both walkers are parameterized by the traversed object (the scene walks
//! into objects, a mesh walks into triangles) via [`TraversableObject`]; the
//! object provides its BVH and the leaf handlers.

pub mod packet;
pub mod simd;
pub mod single;

pub use packet::{traverse_packet, RayGroup, RayPacket};
pub use simd::traverse_simd8;
pub use single::{traverse_shadow_single, traverse_single};

use std::simd::{f32x8, u32x8};

use crate::bvh::{Bvh, BvhNode};
use crate::math::ray::{Ray, Ray8};
use crate::rendering::context::RenderingContext;

/// Sentinel object id of a miss.
pub const INVALID_OBJECT: u32 = u32::MAX;

/// Sentinel triangle id marking a hit on a light proxy object; shading skips
/// BSDF evaluation for these.
pub const LIGHT_OBJECT: u32 = 0xffff_fffe;

/// Largest number of rays a packet can carry.
pub const MAX_RAY_PACKET_SIZE: usize = 4096;

/// Largest number of 8-ray groups in a packet.
pub const MAX_RAY_GROUPS: usize = MAX_RAY_PACKET_SIZE / 8;

/// Ray-scene intersection result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitPoint {
  pub distance: f32,
  pub u: f32,
  pub v: f32,
  pub triangle_id: u32,
  pub object_id: u32,
}

impl HitPoint {
  /// A miss: infinite distance, no object.
  #[inline]
  pub fn none() -> Self {
    Self {
      distance: f32::MAX,
      u: 0.0,
      v: 0.0,
      triangle_id: u32::MAX,
      object_id: INVALID_OBJECT,
    }
  }

  #[inline]
  pub fn is_miss(&self) -> bool {
    self.object_id == INVALID_OBJECT
  }

  #[inline]
  pub fn is_light(&self) -> bool {
    self.triangle_id == LIGHT_OBJECT
  }
}

impl Default for HitPoint {
  fn default() -> Self {
    Self::none()
  }
}

/// Eight hit points in SoA layout.
#[derive(Clone, Copy, Debug)]
pub struct HitPoint8 {
  pub distance: f32x8,
  pub u: f32x8,
  pub v: f32x8,
  pub triangle_id: u32x8,
  pub object_id: u32x8,
}

impl HitPoint8 {
  #[inline]
  pub fn none() -> Self {
    Self {
      distance: f32x8::splat(f32::MAX),
      u: f32x8::splat(0.0),
      v: f32x8::splat(0.0),
      triangle_id: u32x8::splat(u32::MAX),
      object_id: u32x8::splat(INVALID_OBJECT),
    }
  }

  /// Extract lane `i` as a scalar hit point.
  #[inline]
  pub fn get(&self, i: usize) -> HitPoint {
    debug_assert!(i < 8);
    HitPoint {
      distance: self.distance[i],
      u: self.u[i],
      v: self.v[i],
      triangle_id: self.triangle_id[i],
      object_id: self.object_id[i],
    }
  }
}

impl Default for HitPoint8 {
  fn default() -> Self {
    Self::none()
  }
}

/// Traversal state of one ray: the (possibly object-local) ray, the running
/// best hit and the per-thread context.
pub struct SingleTraversalContext<'a> {
  pub ray: Ray,
  pub hit: &'a mut HitPoint,
  pub context: &'a mut RenderingContext,
}

/// Traversal state of eight coherent rays.
pub struct SimdTraversalContext<'a> {
  pub ray: Ray8,
  pub hit: &'a mut HitPoint8,
  pub context: &'a mut RenderingContext,
}

/// Traversal state of a whole ray packet; hits are indexed by group.
pub struct PacketTraversalContext<'a> {
  pub packet: &'a RayPacket,
  pub hits: &'a mut [HitPoint8],
  pub context: &'a mut RenderingContext,
}

/// An object a generic walker can descend into.
///
/// `object_id` is the id the leaf handler stores into hit points: the scene
/// passes the index of the hit scene object, a mesh passes its own id
/// through unchanged.
pub trait TraversableObject {
  fn bvh(&self) -> &Bvh;

  fn traverse_leaf_single(
    &self,
    ctx: &mut SingleTraversalContext,
    object_id: u32,
    node: &BvhNode,
  );

  /// Shadow variant: `true` means any hit was found and the walker may stop.
  fn traverse_leaf_shadow(&self, ctx: &mut SingleTraversalContext, node: &BvhNode) -> bool;

  fn traverse_leaf_simd8(&self, ctx: &mut SimdTraversalContext, object_id: u32, node: &BvhNode);

  fn traverse_leaf_packet(
    &self,
    ctx: &mut PacketTraversalContext,
    object_id: u32,
    node: &BvhNode,
    num_active_groups: u32,
  );
}
