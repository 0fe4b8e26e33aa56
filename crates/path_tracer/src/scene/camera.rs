//! Perspective camera with thin-lens depth of field.

use glam::{Vec2, Vec3A};

use crate::math::ray::Ray;
use crate::rendering::context::RenderingContext;

/// Thin-lens parameters; zero aperture disables depth of field.
#[derive(Clone, Copy, Debug)]
pub struct DepthOfField {
  pub aperture: f32,
  pub focal_plane_distance: f32,
}

impl Default for DepthOfField {
  fn default() -> Self {
    Self {
      aperture: 0.0,
      focal_plane_distance: 2.0,
    }
  }
}

/// Perspective camera. Call [`Camera::update`] after changing parameters to
/// refresh the cached internal frame.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
  pub position: Vec3A,
  pub forward: Vec3A,
  pub up: Vec3A,
  pub aspect_ratio: f32,
  /// Vertical field of view in radians.
  pub field_of_view: f32,
  pub barrel_distortion_factor: f32,
  pub dof: DepthOfField,
  /// Position change over the frame interval (motion blur).
  pub position_delta: Vec3A,

  // cached by update()
  forward_internal: Vec3A,
  right_internal: Vec3A,
  up_internal: Vec3A,
  right_scaled: Vec3A,
  up_scaled: Vec3A,
}

impl Default for Camera {
  fn default() -> Self {
    let mut camera = Self {
      position: Vec3A::ZERO,
      forward: -Vec3A::Z,
      up: Vec3A::Y,
      aspect_ratio: 1.0,
      field_of_view: 80.0_f32.to_radians(),
      barrel_distortion_factor: 0.0,
      dof: DepthOfField::default(),
      position_delta: Vec3A::ZERO,
      forward_internal: -Vec3A::Z,
      right_internal: Vec3A::X,
      up_internal: Vec3A::Y,
      right_scaled: Vec3A::X,
      up_scaled: Vec3A::Y,
    };
    camera.update();
    camera
  }
}

impl Camera {
  pub fn set_perspective(
    &mut self,
    position: Vec3A,
    forward: Vec3A,
    up: Vec3A,
    aspect_ratio: f32,
    field_of_view: f32,
  ) {
    self.position = position;
    self.forward = forward;
    self.up = up;
    self.aspect_ratio = aspect_ratio;
    self.field_of_view = field_of_view;
  }

  /// Refresh the cached orthonormal frame and fov-scaled axes.
  pub fn update(&mut self) {
    self.forward_internal = self.forward.normalize();
    self.right_internal = self.up.cross(self.forward_internal).normalize();
    self.up_internal = self.forward_internal.cross(self.right_internal).normalize();

    let tan_half_fov = (self.field_of_view * 0.5).tan();
    self.up_scaled = self.up_internal * tan_half_fov;
    self.right_scaled = self.right_internal * (tan_half_fov * self.aspect_ratio);
  }

  /// Generate a primary ray for image coordinates `uv` in `[0, 1]^2`.
  pub fn generate_ray(&self, uv: Vec2, context: &mut RenderingContext) -> Ray {
    let mut origin = self.position + self.position_delta * context.time;
    let mut offset = uv * 2.0 - Vec2::ONE;

    if self.barrel_distortion_factor != 0.0 {
      let radius_sq = offset.dot(offset);
      offset += offset * (radius_sq * self.barrel_distortion_factor);
    }

    let mut direction =
      self.forward_internal + self.right_scaled * offset.x + self.up_scaled * offset.y;

    if self.dof.aperture > 0.001 {
      let focus_point = origin + direction * self.dof.focal_plane_distance;
      let lens_point = context.rng.disk() * self.dof.aperture;
      origin += self.right_internal * lens_point.x + self.up_internal * lens_point.y;
      direction = focus_point - origin;
    }

    Ray::new(origin, direction)
  }
}
