//! Light sources.

use glam::{Vec2, Vec3A};

use crate::math::aabb::Aabb;
use crate::math::geometry::{intersect_triangle_ray, PackedTriangle};
use crate::math::random::Random;
use crate::math::ray::Ray;

const COS_EPSILON: f32 = 1.0e-5;

/// Result of sampling a light from a scene point.
#[derive(Clone, Copy, Debug)]
pub struct IlluminateResult {
  /// Unit direction from the scene point toward the light sample.
  pub dir_to_light: Vec3A,
  pub distance: f32,
  /// Direct-sampling PDF; point lights fold the inverse-square falloff in
  /// here so callers never special-case it.
  pub pdf: f32,
  pub radiance: Vec3A,
}

/// Parallelogram or triangle emitter given by an origin and two edges.
#[derive(Clone, Copy, Debug)]
pub struct AreaLight {
  pub p0: Vec3A,
  pub edge0: Vec3A,
  pub edge1: Vec3A,
  pub color: Vec3A,
  pub is_triangle: bool,
  inv_area: f32,
}

impl AreaLight {
  pub fn new(p0: Vec3A, edge0: Vec3A, edge1: Vec3A, color: Vec3A, is_triangle: bool) -> Self {
    let mut surface_area = edge0.cross(edge1).length();
    if is_triangle {
      surface_area *= 0.5;
    }
    Self {
      p0,
      edge0,
      edge1,
      color,
      is_triangle,
      inv_area: 1.0 / surface_area,
    }
  }

  fn normal(&self) -> Vec3A {
    self.edge1.cross(self.edge0).normalize()
  }
}

/// Polymorphic light source.
#[derive(Clone, Copy, Debug)]
pub enum Light {
  Point { position: Vec3A, color: Vec3A },
  Directional { direction: Vec3A, color: Vec3A },
  Area(AreaLight),
}

impl Light {
  /// Sample the light from `scene_point`; `None` when the point is outside
  /// the emission region (behind an area light).
  pub fn illuminate(&self, scene_point: Vec3A, rng: &mut Random) -> Option<IlluminateResult> {
    match self {
      Light::Point { position, color } => {
        let to_light = *position - scene_point;
        let sqr_distance = to_light.length_squared();
        let distance = sqr_distance.sqrt();
        Some(IlluminateResult {
          dir_to_light: to_light / distance,
          distance,
          pdf: sqr_distance,
          radiance: *color,
        })
      }
      Light::Directional { direction, color } => Some(IlluminateResult {
        dir_to_light: -*direction,
        distance: 1.0,
        pdf: 1.0,
        radiance: *color,
      }),
      Light::Area(area) => {
        let uv = if area.is_triangle {
          rng.triangle()
        } else {
          rng.vec2()
        };
        let light_point = area.p0 + area.edge0 * uv.x + area.edge1 * uv.y;

        let to_light = light_point - scene_point;
        let sqr_distance = to_light.length_squared();
        let distance = sqr_distance.sqrt();
        let dir = to_light / distance;

        let cos_normal_dir = area.normal().dot(-dir);
        if cos_normal_dir < COS_EPSILON {
          return None;
        }

        Some(IlluminateResult {
          dir_to_light: dir,
          distance,
          pdf: area.inv_area * sqr_distance / cos_normal_dir,
          radiance: area.color,
        })
      }
    }
  }

  /// Radiance seen along a ray that hit the light's surface. Delta lights
  /// cannot be hit; hitting one is a programmer error.
  pub fn radiance(&self, ray: &Ray) -> Vec3A {
    match self {
      Light::Point { .. } | Light::Directional { .. } => {
        debug_assert!(false, "delta lights cannot be hit by rays");
        Vec3A::ZERO
      }
      Light::Area(area) => {
        let cos_normal_dir = area.normal().dot(-ray.dir);
        if cos_normal_dir < COS_EPSILON {
          Vec3A::ZERO
        } else {
          area.color
        }
      }
    }
  }

  pub fn bounding_box(&self) -> Aabb {
    match self {
      Light::Point { position, .. } => Aabb::from_point(*position, 1.0e-3),
      Light::Directional { .. } => Aabb::empty(),
      Light::Area(area) => {
        let mut aabb = Aabb::from_points([area.p0, area.p0 + area.edge0, area.p0 + area.edge1]);
        if !area.is_triangle {
          aabb.add_point(area.p0 + area.edge0 + area.edge1);
        }
        aabb
      }
    }
  }

  /// Ray intersection against the light surface; delta lights never hit.
  pub fn test_ray_hit(&self, ray: &Ray) -> Option<f32> {
    match self {
      Light::Point { .. } | Light::Directional { .. } => None,
      Light::Area(area) => {
        let tri = PackedTriangle {
          v0: area.p0,
          edge1: area.edge0,
          edge2: area.edge1,
        };
        if let Some(hit) = intersect_triangle_ray(ray, &tri) {
          return Some(hit.distance);
        }
        if !area.is_triangle {
          // second half of the parallelogram
          let opposite = PackedTriangle {
            v0: area.p0 + area.edge0 + area.edge1,
            edge1: -area.edge0,
            edge2: -area.edge1,
          };
          if let Some(hit) = intersect_triangle_ray(ray, &opposite) {
            return Some(hit.distance);
          }
        }
        None
      }
    }
  }

  pub fn is_finite(&self) -> bool {
    !matches!(self, Light::Directional { .. })
  }

  pub fn is_delta(&self) -> bool {
    !matches!(self, Light::Area(_))
  }

  /// Uniform surface sample of an area light, exposed for tests.
  pub fn sample_surface(&self, rng: &mut Random) -> Option<Vec3A> {
    match self {
      Light::Area(area) => {
        let uv: Vec2 = if area.is_triangle {
          rng.triangle()
        } else {
          rng.vec2()
        };
        Some(area.p0 + area.edge0 * uv.x + area.edge1 * uv.y)
      }
      _ => None,
    }
  }
}

#[cfg(test)]
#[path = "light_test.rs"]
mod light_test;
