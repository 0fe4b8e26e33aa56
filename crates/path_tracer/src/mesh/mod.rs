//! Triangle mesh with its own BVH.

pub mod vertex_buffer;

pub use vertex_buffer::{VertexBuffer, VertexBufferDesc, VertexDataFormat};

use std::simd::cmp::SimdPartialOrd;
use std::simd::num::SimdFloat;
use std::simd::{f32x8, u32x8, Select};

use glam::{Vec2, Vec3A};
use tracing::info;

use crate::bvh::{Bvh, BvhNode, BuildingParams, BvhBuilder};
use crate::error::RtResult;
use crate::material::MaterialId;
use crate::math::aabb::Aabb;
use crate::math::geometry::{intersect_triangle_ray8, PackedTriangle, Triangle8};
use crate::math::simd::Vec3x8;
use crate::traversal::{
  PacketTraversalContext, SimdTraversalContext, SingleTraversalContext, TraversableObject,
};

/// External mesh description; the vertex data contract of the OBJ loader.
pub struct MeshDesc<'a> {
  pub vertex_buffer: VertexBufferDesc<'a>,
  /// Applied to all positions at build time.
  pub scale: f32,
  pub name: String,
}

/// Tangent frame and material of a mesh surface point.
#[derive(Clone, Copy, Debug)]
pub struct MeshShadingData {
  pub normal: Vec3A,
  pub tangent: Vec3A,
  pub bitangent: Vec3A,
  pub tex_coord: Vec2,
  pub material: MaterialId,
}

/// Immutable triangle soup with a SAH BVH over its triangles.
pub struct Mesh {
  vertex_buffer: VertexBuffer,
  bvh: Bvh,
  bounds: Aabb,
  // edge-cached triangles in BVH leaf order; index == hit triangle_id
  triangles: Vec<PackedTriangle>,
  name: String,
}

impl Mesh {
  /// Build a mesh: validates the descriptor, builds the triangle BVH and
  /// reorders per-triangle data into leaf order.
  pub fn new(desc: &MeshDesc) -> RtResult<Self> {
    let scale = desc.scale;
    let source = &desc.vertex_buffer;
    source.validate()?;

    // temporary triangle list in source order for box computation
    let mut boxes = Vec::with_capacity(source.num_triangles as usize);
    for t in 0..source.num_triangles as usize {
      let mut aabb = Aabb::empty();
      for corner in 0..3 {
        let v = source.vertex_indices[t * 3 + corner] as usize;
        let p = Vec3A::new(
          source.positions[v * 3],
          source.positions[v * 3 + 1],
          source.positions[v * 3 + 2],
        ) * scale;
        aabb.add_point(p);
      }
      boxes.push(aabb);
    }

    let (bvh, order) = BvhBuilder::build(&boxes, BuildingParams::default())?;
    let vertex_buffer = VertexBuffer::new(source, &order, scale)?;

    let mut bounds = Aabb::empty();
    for aabb in &boxes {
      bounds = bounds.union(aabb);
    }

    // leaf-ordered edge cache for the intersection hot path
    let triangles = (0..vertex_buffer.num_triangles())
      .map(|t| {
        let [v0, v1, v2] = vertex_buffer.positions(vertex_buffer.vertex_indices(t));
        PackedTriangle::new(v0, v1, v2)
      })
      .collect();

    info!(
      name = desc.name,
      triangles = source.num_triangles,
      vertices = source.num_vertices,
      "mesh created"
    );

    Ok(Self {
      vertex_buffer,
      bvh,
      bounds,
      triangles,
      name: desc.name.clone(),
    })
  }

  #[inline]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[inline]
  pub fn bounds(&self) -> &Aabb {
    &self.bounds
  }

  #[inline]
  pub fn vertex_buffer(&self) -> &VertexBuffer {
    &self.vertex_buffer
  }

  #[inline]
  pub fn bvh(&self) -> &Bvh {
    &self.bvh
  }

  /// Interpolate the tangent frame and texture coordinate at a hit.
  pub fn evaluate_shading_data(&self, triangle_id: u32, u: f32, v: f32) -> MeshShadingData {
    let indices = self.vertex_buffer.vertex_indices(triangle_id);
    let w = 1.0 - u - v;

    let tri = &self.triangles[triangle_id as usize];
    let geometric_normal = tri.edge1.cross(tri.edge2).normalize_or_zero();

    let normal = match self.vertex_buffer.normals(indices) {
      Some([n0, n1, n2]) => (n0 * w + n1 * u + n2 * v).normalize_or_zero(),
      None => geometric_normal,
    };

    let tangent = match self.vertex_buffer.tangents(indices) {
      Some([t0, t1, t2]) => {
        let t = t0 * w + t1 * u + t2 * v;
        // Gram-Schmidt against the interpolated normal
        (t - normal * normal.dot(t)).normalize_or_zero()
      }
      None => {
        let helper = if normal.x.abs() < 0.9 { Vec3A::X } else { Vec3A::Y };
        normal.cross(helper).normalize_or_zero()
      }
    };

    let bitangent = normal.cross(tangent);

    let tex_coord = match self.vertex_buffer.tex_coords(indices) {
      Some([t0, t1, t2]) => t0 * w + t1 * u + t2 * v,
      None => Vec2::ZERO,
    };

    MeshShadingData {
      normal,
      tangent,
      bitangent,
      tex_coord,
      material: self.vertex_buffer.material(triangle_id),
    }
  }
}

impl TraversableObject for Mesh {
  fn bvh(&self) -> &Bvh {
    &self.bvh
  }

  fn traverse_leaf_single(
    &self,
    ctx: &mut SingleTraversalContext,
    object_id: u32,
    node: &BvhNode,
  ) {
    let first = node.child_index as usize;
    let count = node.leaf_count() as usize;

    let origin8 = Vec3x8::broadcast(ctx.ray.origin);
    let dir8 = Vec3x8::broadcast(ctx.ray.dir);

    // leaf triangles are contiguous; batch them 8 at a time
    let mut offset = 0;
    while offset < count {
      let batch = (count - offset).min(8);
      let tris = &self.triangles[first + offset..first + offset + batch];
      let packed = Triangle8::pack(tris);

      let (u, v, t, mut mask) = intersect_triangle_ray8(&origin8, &dir8, &packed);

      // drop the lanes that repeat the first triangle as padding
      if batch < 8 {
        let lane_index = u32x8::from_array(std::array::from_fn(|i| i as u32));
        mask &= lane_index.simd_lt(u32x8::splat(batch as u32));
      }
      mask &= t.simd_lt(f32x8::splat(ctx.hit.distance));

      ctx.context.counters.num_ray_triangle_tests += batch as u64;

      if mask.any() {
        let dist = mask.select(t, f32x8::splat(f32::MAX));
        let best = dist.reduce_min();
        // first lane attaining the minimum
        for lane in 0..batch {
          if mask.test(lane) && dist[lane] == best {
            ctx.context.counters.num_passed_ray_triangle_tests += 1;
            ctx.hit.distance = best;
            ctx.hit.u = u[lane];
            ctx.hit.v = v[lane];
            ctx.hit.triangle_id = (first + offset + lane) as u32;
            ctx.hit.object_id = object_id;
            break;
          }
        }
      }

      offset += batch;
    }
  }

  fn traverse_leaf_shadow(&self, ctx: &mut SingleTraversalContext, node: &BvhNode) -> bool {
    let first = node.child_index as usize;
    let count = node.leaf_count() as usize;

    let origin8 = Vec3x8::broadcast(ctx.ray.origin);
    let dir8 = Vec3x8::broadcast(ctx.ray.dir);

    let mut offset = 0;
    while offset < count {
      let batch = (count - offset).min(8);
      let tris = &self.triangles[first + offset..first + offset + batch];
      let packed = Triangle8::pack(tris);

      let (_, _, t, mut mask) = intersect_triangle_ray8(&origin8, &dir8, &packed);
      if batch < 8 {
        let lane_index = u32x8::from_array(std::array::from_fn(|i| i as u32));
        mask &= lane_index.simd_lt(u32x8::splat(batch as u32));
      }
      mask &= t.simd_lt(f32x8::splat(ctx.hit.distance));

      ctx.context.counters.num_ray_triangle_tests += batch as u64;

      if mask.any() {
        ctx.context.counters.num_passed_ray_triangle_tests += 1;
        return true;
      }

      offset += batch;
    }
    false
  }

  fn traverse_leaf_simd8(&self, ctx: &mut SimdTraversalContext, object_id: u32, node: &BvhNode) {
    let first = node.child_index as usize;
    let count = node.leaf_count() as usize;

    // eight rays against each leaf triangle in turn
    for t_index in first..first + count {
      let packed = Triangle8::broadcast(&self.triangles[t_index]);
      let (u, v, t, mut mask) = intersect_triangle_ray8(&ctx.ray.origin, &ctx.ray.dir, &packed);
      mask &= t.simd_lt(ctx.hit.distance);

      ctx.context.counters.num_ray_triangle_tests += 8;
      ctx.context.counters.num_passed_ray_triangle_tests += mask.to_bitmask().count_ones() as u64;

      ctx.hit.distance = mask.select(t, ctx.hit.distance);
      ctx.hit.u = mask.select(u, ctx.hit.u);
      ctx.hit.v = mask.select(v, ctx.hit.v);
      ctx.hit.triangle_id = mask.select(u32x8::splat(t_index as u32), ctx.hit.triangle_id);
      ctx.hit.object_id = mask.select(u32x8::splat(object_id), ctx.hit.object_id);
    }
  }

  fn traverse_leaf_packet(
    &self,
    ctx: &mut PacketTraversalContext,
    object_id: u32,
    node: &BvhNode,
    num_active_groups: u32,
  ) {
    let first = node.child_index as usize;
    let count = node.leaf_count() as usize;

    for g in 0..num_active_groups as usize {
      let group_index = ctx.context.active_groups_indices[g] as usize;
      let group = &ctx.packet.groups[group_index];
      let hit = &mut ctx.hits[group_index];

      for t_index in first..first + count {
        let packed = Triangle8::broadcast(&self.triangles[t_index]);
        let (u, v, t, mut mask) =
          intersect_triangle_ray8(&group.rays.origin, &group.rays.dir, &packed);
        mask &= t.simd_lt(hit.distance);

        ctx.context.counters.num_ray_triangle_tests += 8;

        hit.distance = mask.select(t, hit.distance);
        hit.u = mask.select(u, hit.u);
        hit.v = mask.select(v, hit.v);
        hit.triangle_id = mask.select(u32x8::splat(t_index as u32), hit.triangle_id);
        hit.object_id = mask.select(u32x8::splat(object_id), hit.object_id);
      }
    }
  }
}
