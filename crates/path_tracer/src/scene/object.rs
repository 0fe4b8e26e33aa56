//! Scene objects: primitives answering ray queries in their local frame.
//!
//! The scene transforms rays into object space before calling the local
//! traversal entry points, and transforms the resulting tangent frame back
//! to world space after shading evaluation.

use std::simd::cmp::SimdPartialOrd;
use std::simd::num::SimdFloat;
use std::simd::{f32x8, u32x8, Select};

use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Vec2, Vec3A};

use crate::material::MaterialId;
use crate::math::aabb::Aabb;
use crate::math::geometry::intersect_sphere_ray;
use crate::math::simd::Vec3x8;
use crate::math::transcendental::{fast_acos, fast_atan2};
use crate::math::transform::Transform;
use crate::math::Ray;
use crate::mesh::Mesh;
use crate::traversal::{
  traverse_shadow_single, traverse_simd8, traverse_single, SimdTraversalContext,
  SingleTraversalContext, LIGHT_OBJECT,
};

use super::light::Light;
use super::ShadingData;

const RAY_EPSILON: f32 = 1.0e-6;

/// Geometric variant of a scene object.
pub enum Shape {
  Mesh(Arc<Mesh>),
  Sphere {
    radius: f32,
    material: MaterialId,
  },
  Box {
    half_size: Vec3A,
    material: MaterialId,
  },
  /// Infinite plane at local y = 0; uv is the xz position times the scale.
  Plane {
    texture_scale: Vec2,
    material: MaterialId,
  },
  /// Routes primary rays to a finite light's surface; hits carry the
  /// light-object sentinel so shading skips BSDF evaluation.
  LightProxy {
    light_index: u32,
  },
}

/// A placed object: shape plus recorded start/end transforms.
pub struct SceneObject {
  pub shape: Shape,
  transform_start: Transform,
  transform_end: Transform,
}

impl SceneObject {
  pub fn new(shape: Shape, transform: Transform) -> Self {
    Self {
      shape,
      transform_start: transform,
      transform_end: transform,
    }
  }

  /// Object with motion: transforms are interpolated by the query time.
  pub fn with_motion(shape: Shape, start: Transform, end: Transform) -> Self {
    Self {
      shape,
      transform_start: start,
      transform_end: end,
    }
  }

  /// Object moving at constant `velocity` over the frame interval.
  pub fn with_velocity(shape: Shape, transform: Transform, velocity: Vec3A) -> Self {
    let end = Transform::new(transform.translation + velocity, transform.rotation);
    Self {
      shape,
      transform_start: transform,
      transform_end: end,
    }
  }

  #[inline]
  pub fn transform(&self, time: f32) -> Transform {
    self.transform_start.interpolate(&self.transform_end, time)
  }

  #[inline]
  pub fn inverse_transform(&self, time: f32) -> Transform {
    self.transform(time).inverse()
  }

  /// World-space box covering the whole motion interval.
  pub fn bounding_box(&self, lights: &[Light]) -> Aabb {
    let local = match &self.shape {
      Shape::Mesh(mesh) => *mesh.bounds(),
      Shape::Sphere { radius, .. } => {
        Aabb::new(Vec3A::splat(-radius), Vec3A::splat(*radius))
      }
      Shape::Box { half_size, .. } => Aabb::new(-*half_size, *half_size),
      Shape::Plane { .. } => Aabb::full(),
      Shape::LightProxy { light_index } => {
        // the light stores its geometry in world space already
        return lights[*light_index as usize].bounding_box();
      }
    };

    let at_start = self.transform_start.transform_box(&local);
    let at_end = self.transform_end.transform_box(&local);
    at_start.union(&at_end)
  }

  /// Closest-hit query in local space.
  pub fn traverse_single_local(
    &self,
    ctx: &mut SingleTraversalContext,
    object_id: u32,
    lights: &[Light],
  ) {
    match &self.shape {
      Shape::Mesh(mesh) => traverse_single(mesh.as_ref(), object_id, ctx),
      Shape::Sphere { radius, .. } => {
        if let Some((near, far)) = intersect_sphere_ray(&ctx.ray, *radius) {
          // near and far roots recorded separately so a ray starting on
          // the surface cannot re-hit the same root
          for (root, root_id) in [(near, 0u32), (far, 1u32)] {
            if root > 0.0
              && root < ctx.hit.distance
              && (ctx.hit.object_id != object_id || ctx.hit.triangle_id != root_id)
            {
              ctx.hit.distance = root;
              ctx.hit.u = 0.0;
              ctx.hit.v = 0.0;
              ctx.hit.triangle_id = root_id;
              ctx.hit.object_id = object_id;
              return;
            }
          }
        }
      }
      Shape::Box { half_size, .. } => {
        let aabb = Aabb::new(-*half_size, *half_size);
        if let Some((near, far)) =
          crate::math::geometry::intersect_box_ray_two_sided(&ctx.ray, &aabb)
        {
          let t = if near > RAY_EPSILON { near } else { far };
          if t > RAY_EPSILON && t < ctx.hit.distance {
            ctx.hit.distance = t;
            ctx.hit.u = 0.0;
            ctx.hit.v = 0.0;
            ctx.hit.triangle_id = 0;
            ctx.hit.object_id = object_id;
          }
        }
      }
      Shape::Plane { .. } => {
        if ctx.ray.dir.y.abs() > RAY_EPSILON {
          let t = -ctx.ray.origin.y * ctx.ray.inv_dir.y;
          if t > 0.0 && t < ctx.hit.distance {
            ctx.hit.distance = t;
            ctx.hit.u = 0.0;
            ctx.hit.v = 0.0;
            ctx.hit.triangle_id = 0;
            ctx.hit.object_id = object_id;
          }
        }
      }
      Shape::LightProxy { light_index } => {
        if let Some(distance) = lights[*light_index as usize].test_ray_hit(&ctx.ray) {
          if distance > 0.0 && distance < ctx.hit.distance {
            ctx.hit.distance = distance;
            ctx.hit.u = 0.0;
            ctx.hit.v = 0.0;
            ctx.hit.triangle_id = LIGHT_OBJECT;
            ctx.hit.object_id = object_id;
          }
        }
      }
    }
  }

  /// Any-hit query in local space.
  pub fn traverse_shadow_local(&self, ctx: &mut SingleTraversalContext, lights: &[Light]) -> bool {
    match &self.shape {
      Shape::Mesh(mesh) => traverse_shadow_single(mesh.as_ref(), ctx),
      Shape::Sphere { radius, .. } => {
        if let Some((near, far)) = intersect_sphere_ray(&ctx.ray, *radius) {
          for root in [near, far] {
            if root > 0.0 && root < ctx.hit.distance {
              ctx.hit.distance = root;
              return true;
            }
          }
        }
        false
      }
      Shape::Box { half_size, .. } => {
        let aabb = Aabb::new(-*half_size, *half_size);
        if let Some((near, far)) =
          crate::math::geometry::intersect_box_ray_two_sided(&ctx.ray, &aabb)
        {
          let t = if near > RAY_EPSILON { near } else { far };
          if t > RAY_EPSILON && t < ctx.hit.distance {
            ctx.hit.distance = t;
            return true;
          }
        }
        false
      }
      Shape::Plane { .. } => {
        if ctx.ray.dir.y.abs() > RAY_EPSILON {
          let t = -ctx.ray.origin.y * ctx.ray.inv_dir.y;
          if t > 0.0 && t < ctx.hit.distance {
            ctx.hit.distance = t;
            return true;
          }
        }
        false
      }
      // lights do not occlude shadow rays
      Shape::LightProxy { .. } => false,
    }
  }

  /// 8-wide closest-hit query in local space.
  pub fn traverse_simd8_local(
    &self,
    ctx: &mut SimdTraversalContext,
    object_id: u32,
    lights: &[Light],
  ) {
    match &self.shape {
      Shape::Mesh(mesh) => traverse_simd8(mesh.as_ref(), object_id, ctx),
      Shape::Sphere { radius, .. } => {
        // per-lane scalar fallback: the quadratic needs the double-precision
        // discriminant of the single-ray kernel, and packet hits must agree
        // with it bit for bit
        for lane in 0..8 {
          let ray = ctx.ray.extract(lane);
          if let Some((near, far)) = intersect_sphere_ray(&ray, *radius) {
            for (root, root_id) in [(near, 0u32), (far, 1u32)] {
              if root > 0.0
                && root < ctx.hit.distance[lane]
                && (ctx.hit.object_id[lane] != object_id
                  || ctx.hit.triangle_id[lane] != root_id)
              {
                ctx.hit.distance.as_mut_array()[lane] = root;
                ctx.hit.u.as_mut_array()[lane] = 0.0;
                ctx.hit.v.as_mut_array()[lane] = 0.0;
                ctx.hit.triangle_id.as_mut_array()[lane] = root_id;
                ctx.hit.object_id.as_mut_array()[lane] = object_id;
                break;
              }
            }
          }
        }
      }
      Shape::Box { half_size, .. } => {
        let min = Vec3x8::broadcast(-*half_size);
        let max = Vec3x8::broadcast(*half_size);

        let t1 = min.sub(&ctx.ray.origin).mul(&ctx.ray.inv_dir);
        let t2 = max.sub(&ctx.ray.origin).mul(&ctx.ray.inv_dir);
        let lmin = t1.min(&t2);
        let lmax = t1.max(&t2);
        let near = lmin.x.simd_max(lmin.y).simd_max(lmin.z);
        let far = lmax.x.simd_min(lmax.y).simd_min(lmax.z);

        let eps = f32x8::splat(RAY_EPSILON);
        let t = near.simd_gt(eps).select(near, far);
        let mask = near.simd_lt(far) & t.simd_gt(eps) & t.simd_lt(ctx.hit.distance);

        let zero = f32x8::splat(0.0);
        ctx.hit.distance = mask.select(t, ctx.hit.distance);
        ctx.hit.u = mask.select(zero, ctx.hit.u);
        ctx.hit.v = mask.select(zero, ctx.hit.v);
        ctx.hit.triangle_id = mask.select(u32x8::splat(0), ctx.hit.triangle_id);
        ctx.hit.object_id = mask.select(u32x8::splat(object_id), ctx.hit.object_id);
      }
      Shape::Plane { .. } => {
        let t = -ctx.ray.origin.y * (f32x8::splat(1.0) / ctx.ray.dir.y);
        let dir_ok = ctx.ray.dir.y.abs().simd_gt(f32x8::splat(RAY_EPSILON));
        let mask = dir_ok & t.simd_gt(f32x8::splat(0.0)) & t.simd_lt(ctx.hit.distance);

        let zero = f32x8::splat(0.0);
        ctx.hit.distance = mask.select(t, ctx.hit.distance);
        ctx.hit.u = mask.select(zero, ctx.hit.u);
        ctx.hit.v = mask.select(zero, ctx.hit.v);
        ctx.hit.triangle_id = mask.select(u32x8::splat(0), ctx.hit.triangle_id);
        ctx.hit.object_id = mask.select(u32x8::splat(object_id), ctx.hit.object_id);
      }
      Shape::LightProxy { light_index } => {
        // per-lane scalar fallback; light surfaces are cheap to test
        let light = &lights[*light_index as usize];
        for lane in 0..8 {
          let ray = ctx.ray.extract(lane);
          if let Some(distance) = light.test_ray_hit(&ray) {
            if distance > 0.0 && distance < ctx.hit.distance[lane] {
              ctx.hit.distance.as_mut_array()[lane] = distance;
              ctx.hit.u.as_mut_array()[lane] = 0.0;
              ctx.hit.v.as_mut_array()[lane] = 0.0;
              ctx.hit.triangle_id.as_mut_array()[lane] = LIGHT_OBJECT;
              ctx.hit.object_id.as_mut_array()[lane] = object_id;
            }
          }
        }
      }
    }
  }

  /// Tangent frame, uv and material at a local-space hit. `local_position`
  /// is the hit point in the object's frame; the scene converts the frame
  /// to world space afterwards.
  pub fn evaluate_shading_data(
    &self,
    triangle_id: u32,
    u: f32,
    v: f32,
    local_position: Vec3A,
  ) -> ShadingData {
    match &self.shape {
      Shape::Mesh(mesh) => {
        let mesh_data = mesh.evaluate_shading_data(triangle_id, u, v);
        ShadingData {
          position: local_position,
          normal: mesh_data.normal,
          tangent: mesh_data.tangent,
          bitangent: mesh_data.bitangent,
          tex_coord: mesh_data.tex_coord,
          material: mesh_data.material,
        }
      }
      Shape::Sphere { radius, material } => {
        let normal = (local_position / *radius).normalize_or_zero();
        let tangent = normal.cross(Vec3A::Y).normalize_or_zero();
        let tangent = if tangent.length_squared() < 0.5 {
          // poles: pick an arbitrary tangent
          normal.cross(Vec3A::X).normalize()
        } else {
          tangent
        };
        let bitangent = normal.cross(tangent);

        let phi = fast_atan2(normal.z, normal.x);
        let theta = fast_acos(normal.y.clamp(-1.0, 1.0));
        ShadingData {
          position: local_position,
          normal,
          tangent,
          bitangent,
          tex_coord: Vec2::new(phi / (2.0 * PI) + 0.5, theta / PI),
          material: *material,
        }
      }
      Shape::Box { half_size, material } => {
        // face from the largest relative component of the hit point
        let relative = local_position / *half_size;
        let abs = relative.abs();
        let (axis, sign) = if abs.x >= abs.y && abs.x >= abs.z {
          (0, relative.x.signum())
        } else if abs.y >= abs.z {
          (1, relative.y.signum())
        } else {
          (2, relative.z.signum())
        };

        // per-face frame: normal along the face axis, tangent along the
        // next axis, uv from the remaining two coordinates
        let (normal, tangent, uv) = match axis {
          0 => (
            Vec3A::X * sign,
            Vec3A::Y,
            Vec2::new(relative.y, relative.z * sign),
          ),
          1 => (
            Vec3A::Y * sign,
            Vec3A::Z,
            Vec2::new(relative.z, relative.x * sign),
          ),
          _ => (
            Vec3A::Z * sign,
            Vec3A::X,
            Vec2::new(relative.x, relative.y * sign),
          ),
        };
        let bitangent = normal.cross(tangent);

        ShadingData {
          position: local_position,
          normal,
          tangent,
          bitangent,
          tex_coord: uv * 0.5 + Vec2::splat(0.5),
          material: *material,
        }
      }
      Shape::Plane {
        texture_scale,
        material,
      } => ShadingData {
        position: local_position,
        normal: Vec3A::Y,
        tangent: Vec3A::X,
        bitangent: Vec3A::Y.cross(Vec3A::X),
        tex_coord: Vec2::new(local_position.x, local_position.z) * *texture_scale,
        material: *material,
      },
      Shape::LightProxy { .. } => {
        debug_assert!(false, "light hits are shaded through the light itself");
        ShadingData {
          position: local_position,
          normal: Vec3A::Y,
          tangent: Vec3A::X,
          bitangent: Vec3A::Z,
          tex_coord: Vec2::ZERO,
          material: crate::material::DEFAULT_MATERIAL,
        }
      }
    }
  }
}

// a shadow test needs the ray in the object frame too
pub(crate) fn transform_ray(transform: &Transform, ray: &Ray) -> Ray {
  let dir = transform.transform_vector(ray.dir);
  Ray {
    origin: transform.transform_point(ray.origin),
    dir,
    inv_dir: dir.recip(),
  }
}
