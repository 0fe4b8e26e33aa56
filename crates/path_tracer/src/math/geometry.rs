//! Ray intersection kernels: slab-method box tests and Moller-Trumbore
//! triangle tests, in scalar and 8-wide variants.

use std::simd::cmp::SimdPartialOrd;
use std::simd::num::SimdFloat;
use std::simd::f32x8;

use glam::Vec3A;

use super::aabb::Aabb;
use super::ray::Ray;
use super::simd::{Box3x8, Mask8, Vec3x8};

/// Triangle with cached edge vectors for the intersection hot path.
#[derive(Clone, Copy, Debug)]
pub struct PackedTriangle {
  pub v0: Vec3A,
  pub edge1: Vec3A,
  pub edge2: Vec3A,
}

impl PackedTriangle {
  #[inline]
  pub fn new(v0: Vec3A, v1: Vec3A, v2: Vec3A) -> Self {
    Self {
      v0,
      edge1: v1 - v0,
      edge2: v2 - v0,
    }
  }
}

/// Up to eight triangles in SoA layout, padded with degenerate triangles.
#[derive(Clone, Copy, Debug)]
pub struct Triangle8 {
  pub v0: Vec3x8,
  pub edge1: Vec3x8,
  pub edge2: Vec3x8,
}

impl Triangle8 {
  /// Broadcast one triangle across all lanes.
  #[inline]
  pub fn broadcast(tri: &PackedTriangle) -> Self {
    Self {
      v0: Vec3x8::broadcast(tri.v0),
      edge1: Vec3x8::broadcast(tri.edge1),
      edge2: Vec3x8::broadcast(tri.edge2),
    }
  }

  /// Pack a slice of up to eight triangles; missing lanes repeat the first
  /// entry (callers mask them out by lane index).
  pub fn pack(tris: &[PackedTriangle]) -> Self {
    debug_assert!(!tris.is_empty() && tris.len() <= 8);
    let pick = |i: usize| tris[i.min(tris.len() - 1)];
    Self {
      v0: Vec3x8::from_vectors(&std::array::from_fn(|i| pick(i).v0)),
      edge1: Vec3x8::from_vectors(&std::array::from_fn(|i| pick(i).edge1)),
      edge2: Vec3x8::from_vectors(&std::array::from_fn(|i| pick(i).edge2)),
    }
  }
}

/// Barycentric hit record of a ray-triangle test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleHit {
  pub u: f32,
  pub v: f32,
  pub distance: f32,
}

/// Slab-method ray-box test.
///
/// Returns the entry distance on hit (negative when the origin is inside the
/// box but the exit is ahead of the ray).
#[inline]
pub fn intersect_box_ray(ray: &Ray, aabb: &Aabb) -> Option<f32> {
  let t1 = (aabb.min - ray.origin) * ray.inv_dir;
  let t2 = (aabb.max - ray.origin) * ray.inv_dir;

  let t_min = t1.min(t2).max_element();
  let t_max = t1.max(t2).min_element();

  // hit iff the slabs overlap ahead of the origin
  (t_max >= t_min && t_max >= 0.0).then_some(t_min)
}

/// Two-sided slab test returning both entry and exit distances.
#[inline]
pub fn intersect_box_ray_two_sided(ray: &Ray, aabb: &Aabb) -> Option<(f32, f32)> {
  let t1 = (aabb.min - ray.origin) * ray.inv_dir;
  let t2 = (aabb.max - ray.origin) * ray.inv_dir;

  let near = t1.min(t2).max_element();
  let far = t1.max(t2).min_element();

  (near < far).then_some((near, far))
}

/// Moller-Trumbore ray-triangle test (two-sided).
#[inline]
pub fn intersect_triangle_ray(ray: &Ray, tri: &PackedTriangle) -> Option<TriangleHit> {
  let pvec = ray.dir.cross(tri.edge2);
  let det = tri.edge1.dot(pvec);

  let tvec = ray.origin - tri.v0;
  let qvec = tvec.cross(tri.edge1);

  let inv_det = 1.0 / det;
  let u = tvec.dot(pvec) * inv_det;
  let v = ray.dir.dot(qvec) * inv_det;
  let distance = tri.edge2.dot(qvec) * inv_det;

  (u >= 0.0 && v >= 0.0 && u + v <= 1.0 && distance > 0.0).then_some(TriangleHit {
    u,
    v,
    distance,
  })
}

/// 8-wide slab test of one (broadcast) box against eight rays.
///
/// `origin_div_dir` must hold `origin * inv_dir` so the per-node work is two
/// fused multiply-subtracts per axis. The returned mask is the set of lanes
/// that hit the box closer than `max_distance`.
#[inline]
pub fn intersect_box_ray8(
  inv_dir: &Vec3x8,
  origin_div_dir: &Vec3x8,
  aabb: &Box3x8,
  max_distance: f32x8,
) -> (f32x8, Mask8) {
  // (min - origin) * inv_dir == min * inv_dir - origin * inv_dir
  let t1 = aabb.min.mul_sub(inv_dir, origin_div_dir);
  let t2 = aabb.max.mul_sub(inv_dir, origin_div_dir);

  let lmin = t1.min(&t2);
  let lmax = t1.max(&t2);

  let t_min = lmin.x.simd_max(lmin.y).simd_max(lmin.z);
  let t_max = lmax.x.simd_min(lmax.y).simd_min(lmax.z);

  let mask = t_max.simd_ge(t_min.simd_max(f32x8::splat(0.0))) & t_min.simd_lt(max_distance);
  (t_min, mask)
}

/// 8-wide Moller-Trumbore: eight (ray, triangle) lane pairs at once.
///
/// Used both ways round: one ray broadcast against eight packed triangles,
/// or eight packet rays against one broadcast triangle.
#[inline]
pub fn intersect_triangle_ray8(
  origin: &Vec3x8,
  dir: &Vec3x8,
  tri: &Triangle8,
) -> (f32x8, f32x8, f32x8, Mask8) {
  let pvec = dir.cross(&tri.edge2);
  let det = tri.edge1.dot(&pvec);

  let tvec = origin.sub(&tri.v0);
  let qvec = tvec.cross(&tri.edge1);

  let inv_det = f32x8::splat(1.0) / det;
  let u = tvec.dot(&pvec) * inv_det;
  let v = dir.dot(&qvec) * inv_det;
  let t = tri.edge2.dot(&qvec) * inv_det;

  let zero = f32x8::splat(0.0);
  let mask = u.simd_ge(zero)
    & v.simd_ge(zero)
    & (u + v).simd_le(f32x8::splat(1.0))
    & t.simd_gt(zero);
  (u, v, t, mask)
}

/// Quadratic ray-sphere intersection (sphere at the local origin).
///
/// Returns the near and far roots; callers decide which side is valid.
#[inline]
pub fn intersect_sphere_ray(ray: &Ray, radius: f32) -> Option<(f32, f32)> {
  let d = -ray.origin;
  let v = ray.dir.dot(d) as f64;
  let det = (radius as f64) * (radius as f64) - (d.dot(d) as f64) + v * v;
  if det <= 0.0 {
    return None;
  }
  let sqrt_det = det.sqrt();
  Some(((v - sqrt_det) as f32, (v + sqrt_det) as f32))
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;
