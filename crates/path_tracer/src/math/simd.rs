//! 8-lane SoA vector types used by packet traversal.
//!
//! A [`Vec3x8`] holds eight 3-vectors with each component packed into one
//! `f32x8` lane register, so a single box test or triangle test runs for
//! eight rays (or eight triangles) at once.

use std::simd::num::SimdFloat;
use std::simd::{f32x8, u32x8, Mask, Select, StdFloat};

use glam::Vec3A;

use super::aabb::Aabb;

pub type Mask8 = Mask<i32, 8>;

/// Reciprocal estimate (magic constant) refined by one Newton-Raphson step.
///
/// Relative error is below 0.5%; traversal uses the exact division instead.
#[inline]
pub fn fast_recip_8(x: f32x8) -> f32x8 {
  let est = f32x8::from_bits(u32x8::splat(0x7ef3_11c2) - x.to_bits());
  est * (f32x8::splat(2.0) - x * est)
}

/// 8x8 transpose: eight rows of eight floats become eight columns.
///
/// Used when converting eight AoS rays into the SoA layout of a ray group.
#[inline]
pub fn transpose8(rows: &[[f32; 8]; 8]) -> [f32x8; 8] {
  std::array::from_fn(|i| f32x8::from_array(std::array::from_fn(|j| rows[j][i])))
}

/// Eight 2-vectors, components packed per lane.
#[derive(Clone, Copy, Debug)]
pub struct Vec2x8 {
  pub x: f32x8,
  pub y: f32x8,
}

impl Vec2x8 {
  #[inline]
  pub fn new(x: f32x8, y: f32x8) -> Self {
    Self { x, y }
  }

  #[inline]
  pub fn splat(x: f32, y: f32) -> Self {
    Self {
      x: f32x8::splat(x),
      y: f32x8::splat(y),
    }
  }

  #[inline]
  pub fn dot(&self, other: &Vec2x8) -> f32x8 {
    self.x.mul_add(other.x, self.y * other.y)
  }
}

/// Eight 3-vectors, components packed per lane.
#[derive(Clone, Copy, Debug)]
pub struct Vec3x8 {
  pub x: f32x8,
  pub y: f32x8,
  pub z: f32x8,
}

impl Vec3x8 {
  #[inline]
  pub fn new(x: f32x8, y: f32x8, z: f32x8) -> Self {
    Self { x, y, z }
  }

  #[inline]
  pub fn zero() -> Self {
    Self::broadcast(Vec3A::ZERO)
  }

  /// All eight lanes set to `v`.
  #[inline]
  pub fn broadcast(v: Vec3A) -> Self {
    Self {
      x: f32x8::splat(v.x),
      y: f32x8::splat(v.y),
      z: f32x8::splat(v.z),
    }
  }

  /// Transpose eight AoS vectors into SoA lanes.
  pub fn from_vectors(v: &[Vec3A; 8]) -> Self {
    Self {
      x: f32x8::from_array(std::array::from_fn(|i| v[i].x)),
      y: f32x8::from_array(std::array::from_fn(|i| v[i].y)),
      z: f32x8::from_array(std::array::from_fn(|i| v[i].z)),
    }
  }

  /// Extract lane `i` as a scalar vector.
  #[inline]
  pub fn extract(&self, i: usize) -> Vec3A {
    Vec3A::new(self.x[i], self.y[i], self.z[i])
  }

  /// Scatter back to eight AoS vectors.
  pub fn unpack(&self) -> [Vec3A; 8] {
    std::array::from_fn(|i| self.extract(i))
  }

  #[inline]
  pub fn add(&self, other: &Vec3x8) -> Self {
    Self {
      x: self.x + other.x,
      y: self.y + other.y,
      z: self.z + other.z,
    }
  }

  #[inline]
  pub fn sub(&self, other: &Vec3x8) -> Self {
    Self {
      x: self.x - other.x,
      y: self.y - other.y,
      z: self.z - other.z,
    }
  }

  #[inline]
  pub fn mul(&self, other: &Vec3x8) -> Self {
    Self {
      x: self.x * other.x,
      y: self.y * other.y,
      z: self.z * other.z,
    }
  }

  #[inline]
  pub fn scale(&self, s: f32x8) -> Self {
    Self {
      x: self.x * s,
      y: self.y * s,
      z: self.z * s,
    }
  }

  /// `self * b + c` componentwise (fused).
  #[inline]
  pub fn mul_add(&self, b: &Vec3x8, c: &Vec3x8) -> Self {
    Self {
      x: self.x.mul_add(b.x, c.x),
      y: self.y.mul_add(b.y, c.y),
      z: self.z.mul_add(b.z, c.z),
    }
  }

  /// `-(self * b) + c` componentwise.
  #[inline]
  pub fn neg_mul_add(&self, b: &Vec3x8, c: &Vec3x8) -> Self {
    Self {
      x: c.x - self.x * b.x,
      y: c.y - self.y * b.y,
      z: c.z - self.z * b.z,
    }
  }

  /// `self * b - c` componentwise.
  #[inline]
  pub fn mul_sub(&self, b: &Vec3x8, c: &Vec3x8) -> Self {
    Self {
      x: self.x.mul_add(b.x, -c.x),
      y: self.y.mul_add(b.y, -c.y),
      z: self.z.mul_add(b.z, -c.z),
    }
  }

  #[inline]
  pub fn dot(&self, other: &Vec3x8) -> f32x8 {
    self.x.mul_add(other.x, self.y.mul_add(other.y, self.z * other.z))
  }

  #[inline]
  pub fn cross(&self, other: &Vec3x8) -> Self {
    Self {
      x: self.y.mul_add(other.z, -(self.z * other.y)),
      y: self.z.mul_add(other.x, -(self.x * other.z)),
      z: self.x.mul_add(other.y, -(self.y * other.x)),
    }
  }

  #[inline]
  pub fn min(&self, other: &Vec3x8) -> Self {
    Self {
      x: self.x.simd_min(other.x),
      y: self.y.simd_min(other.y),
      z: self.z.simd_min(other.z),
    }
  }

  #[inline]
  pub fn max(&self, other: &Vec3x8) -> Self {
    Self {
      x: self.x.simd_max(other.x),
      y: self.y.simd_max(other.y),
      z: self.z.simd_max(other.z),
    }
  }

  /// Exact componentwise reciprocal.
  #[inline]
  pub fn recip(&self) -> Self {
    let one = f32x8::splat(1.0);
    Self {
      x: one / self.x,
      y: one / self.y,
      z: one / self.z,
    }
  }

  /// Approximate reciprocal, see [`fast_recip_8`].
  #[inline]
  pub fn fast_recip(&self) -> Self {
    Self {
      x: fast_recip_8(self.x),
      y: fast_recip_8(self.y),
      z: fast_recip_8(self.z),
    }
  }

  #[inline]
  pub fn length_squared(&self) -> f32x8 {
    self.dot(self)
  }

  #[inline]
  pub fn normalized(&self) -> Self {
    let inv_len = f32x8::splat(1.0) / self.length_squared().sqrt();
    self.scale(inv_len)
  }

  /// Per-lane select: lane from `a` where the mask is set, else from `b`.
  #[inline]
  pub fn select(mask: Mask8, a: &Vec3x8, b: &Vec3x8) -> Self {
    Self {
      x: mask.select(a.x, b.x),
      y: mask.select(a.y, b.y),
      z: mask.select(a.z, b.z),
    }
  }
}

/// One box broadcast across eight lanes, ready for an 8-ray slab test.
#[derive(Clone, Copy, Debug)]
pub struct Box3x8 {
  pub min: Vec3x8,
  pub max: Vec3x8,
}

impl Box3x8 {
  #[inline]
  pub fn broadcast(aabb: &Aabb) -> Self {
    Self {
      min: Vec3x8::broadcast(aabb.min),
      max: Vec3x8::broadcast(aabb.max),
    }
  }
}
