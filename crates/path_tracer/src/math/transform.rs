//! Rigid motion (translation + rotation) with interpolation support.

use glam::{Mat3A, Quat, Vec3A};

use super::aabb::Aabb;
use super::simd::Vec3x8;

/// Rigid transform: translation applied after a unit-quaternion rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
  pub translation: Vec3A,
  pub rotation: Quat,
}

impl Default for Transform {
  fn default() -> Self {
    Self::IDENTITY
  }
}

impl Transform {
  pub const IDENTITY: Self = Self {
    translation: Vec3A::ZERO,
    rotation: Quat::IDENTITY,
  };

  #[inline]
  pub fn new(translation: Vec3A, rotation: Quat) -> Self {
    debug_assert!(rotation.is_normalized());
    Self {
      translation,
      rotation,
    }
  }

  #[inline]
  pub fn from_translation(translation: Vec3A) -> Self {
    Self {
      translation,
      rotation: Quat::IDENTITY,
    }
  }

  /// Composition: `self` applied after `other`.
  #[inline]
  pub fn compose(&self, other: &Transform) -> Self {
    Self {
      translation: self.translation + Vec3A::from(self.rotation * other.translation),
      rotation: (self.rotation * other.rotation).normalize(),
    }
  }

  #[inline]
  pub fn inverse(&self) -> Self {
    let inv_rotation = self.rotation.conjugate();
    Self {
      translation: -Vec3A::from(inv_rotation * self.translation),
      rotation: inv_rotation,
    }
  }

  #[inline]
  pub fn transform_point(&self, point: Vec3A) -> Vec3A {
    Vec3A::from(self.rotation * point) + self.translation
  }

  #[inline]
  pub fn transform_vector(&self, vector: Vec3A) -> Vec3A {
    Vec3A::from(self.rotation * vector)
  }

  /// Tight box containing `aabb` after transformation.
  pub fn transform_box(&self, aabb: &Aabb) -> Aabb {
    if aabb.is_empty() {
      return *aabb;
    }

    let m = Mat3A::from_quat(self.rotation);
    let abs = Mat3A::from_cols(m.x_axis.abs(), m.y_axis.abs(), m.z_axis.abs());

    let center = self.transform_point(aabb.center());
    let half = abs * (aabb.size() * 0.5);
    Aabb {
      min: center - half,
      max: center + half,
    }
  }

  /// Rotate eight vectors at once.
  pub fn transform_vector8(&self, v: &Vec3x8) -> Vec3x8 {
    let m = Mat3A::from_quat(self.rotation);
    let x = Vec3x8::broadcast(m.x_axis).scale(v.x);
    let y = Vec3x8::broadcast(m.y_axis).scale(v.y);
    let z = Vec3x8::broadcast(m.z_axis).scale(v.z);
    x.add(&y).add(&z)
  }

  /// Transform eight points at once.
  pub fn transform_point8(&self, p: &Vec3x8) -> Vec3x8 {
    self
      .transform_vector8(p)
      .add(&Vec3x8::broadcast(self.translation))
  }

  /// Interpolate between two transforms: linear translation, normalized
  /// quaternion lerp (sufficient for the small per-frame motion we record).
  #[inline]
  pub fn interpolate(&self, other: &Transform, t: f32) -> Self {
    Self {
      translation: self.translation.lerp(other.translation, t),
      rotation: self.rotation.lerp(other.rotation, t).normalize(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::Vec3;

  fn assert_close(a: Vec3A, b: Vec3A) {
    assert!((a - b).length() < 1.0e-5, "{a:?} != {b:?}");
  }

  #[test]
  fn inverse_roundtrip() {
    let t = Transform::new(
      Vec3A::new(1.0, -2.0, 3.0),
      Quat::from_axis_angle(Vec3::new(0.3, 0.9, 0.1).normalize(), 1.1),
    );
    let p = Vec3A::new(0.5, 4.0, -2.5);
    assert_close(t.inverse().transform_point(t.transform_point(p)), p);
  }

  #[test]
  fn compose_matches_sequential_application() {
    let a = Transform::new(Vec3A::X, Quat::from_rotation_y(0.7));
    let b = Transform::new(Vec3A::Y * 2.0, Quat::from_rotation_x(-0.3));
    let p = Vec3A::new(1.0, 2.0, 3.0);
    assert_close(
      a.compose(&b).transform_point(p),
      a.transform_point(b.transform_point(p)),
    );
  }

  #[test]
  fn transformed_box_contains_transformed_corners() {
    let t = Transform::new(Vec3A::new(0.0, 5.0, 0.0), Quat::from_rotation_z(0.8));
    let aabb = Aabb::new(Vec3A::new(-1.0, -2.0, -3.0), Vec3A::new(2.0, 1.0, 0.5));
    let out = t.transform_box(&aabb);

    for ix in 0..2 {
      for iy in 0..2 {
        for iz in 0..2 {
          let corner = Vec3A::new(
            if ix == 0 { aabb.min.x } else { aabb.max.x },
            if iy == 0 { aabb.min.y } else { aabb.max.y },
            if iz == 0 { aabb.min.z } else { aabb.max.z },
          );
          let p = t.transform_point(corner);
          assert!(out.contains_point(p + Vec3A::splat(1.0e-4)) || out.contains_point(p - Vec3A::splat(1.0e-4)) || out.contains_point(p));
        }
      }
    }
  }

  #[test]
  fn interpolate_endpoints() {
    let a = Transform::from_translation(Vec3A::ZERO);
    let b = Transform::from_translation(Vec3A::new(2.0, 0.0, 0.0));
    assert_close(a.interpolate(&b, 0.5).translation, Vec3A::new(1.0, 0.0, 0.0));
  }
}
