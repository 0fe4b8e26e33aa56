//! Ray representations: scalar and 8-wide.

use glam::Vec3A;

use super::simd::Vec3x8;

/// A ray with cached reciprocal direction.
///
/// The direction is kept normalized and `inv_dir` always matches it, so the
/// slab-method box test can reuse the reciprocal for every node visited.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
  pub origin: Vec3A,
  pub dir: Vec3A,
  pub inv_dir: Vec3A,
}

impl Ray {
  /// Create a ray from an origin and a (not necessarily normalized)
  /// direction.
  #[inline]
  pub fn new(origin: Vec3A, dir: Vec3A) -> Self {
    let dir = dir.normalize();
    Self {
      origin,
      dir,
      inv_dir: dir.recip(),
    }
  }

  /// Create a ray from an origin and an already-normalized direction.
  #[inline]
  pub fn new_unit(origin: Vec3A, dir: Vec3A) -> Self {
    debug_assert!((dir.length() - 1.0).abs() < 1.0e-4);
    Self {
      origin,
      dir,
      inv_dir: dir.recip(),
    }
  }

  /// Point along the ray at parameter `t`.
  #[inline]
  pub fn at(&self, t: f32) -> Vec3A {
    self.origin + self.dir * t
  }
}

/// Eight rays in SoA layout for coherent traversal.
#[derive(Clone, Copy, Debug)]
pub struct Ray8 {
  pub origin: Vec3x8,
  pub dir: Vec3x8,
  pub inv_dir: Vec3x8,
}

impl Ray8 {
  /// Transpose eight scalar rays into lanes.
  pub fn from_rays(rays: &[Ray; 8]) -> Self {
    let dir = Vec3x8::from_vectors(&std::array::from_fn(|i| rays[i].dir));
    Self {
      origin: Vec3x8::from_vectors(&std::array::from_fn(|i| rays[i].origin)),
      inv_dir: dir.recip(),
      dir,
    }
  }

  /// One scalar ray broadcast to all lanes.
  pub fn broadcast(ray: &Ray) -> Self {
    Self {
      origin: Vec3x8::broadcast(ray.origin),
      dir: Vec3x8::broadcast(ray.dir),
      inv_dir: Vec3x8::broadcast(ray.inv_dir),
    }
  }

  /// Extract lane `i` as a scalar ray.
  pub fn extract(&self, i: usize) -> Ray {
    let dir = self.dir.extract(i);
    Ray {
      origin: self.origin.extract(i),
      dir,
      inv_dir: dir.recip(),
    }
  }
}
