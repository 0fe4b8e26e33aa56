//! Axis-aligned bounding box.

use glam::Vec3A;

/// Axis-aligned bounding box given by two corners.
///
/// The empty box (`min = +inf`, `max = -inf`) is the identity of
/// [`Aabb::union`] and is produced by [`Aabb::empty`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  pub min: Vec3A,
  pub max: Vec3A,
}

impl Aabb {
  /// The empty box, identity of `union`.
  #[inline]
  pub fn empty() -> Self {
    Self {
      min: Vec3A::splat(f32::INFINITY),
      max: Vec3A::splat(f32::NEG_INFINITY),
    }
  }

  /// The all-encompassing box (used by unbounded primitives).
  #[inline]
  pub fn full() -> Self {
    Self {
      min: Vec3A::splat(f32::NEG_INFINITY),
      max: Vec3A::splat(f32::INFINITY),
    }
  }

  #[inline]
  pub fn new(min: Vec3A, max: Vec3A) -> Self {
    debug_assert!(min.x <= max.x && min.y <= max.y && min.z <= max.z);
    Self { min, max }
  }

  /// Box containing a single point, optionally inflated by `radius`.
  #[inline]
  pub fn from_point(point: Vec3A, radius: f32) -> Self {
    Self {
      min: point - Vec3A::splat(radius),
      max: point + Vec3A::splat(radius),
    }
  }

  /// Smallest box containing all `points`.
  pub fn from_points(points: impl IntoIterator<Item = Vec3A>) -> Self {
    let mut result = Self::empty();
    for p in points {
      result.add_point(p);
    }
    result
  }

  /// Union of two boxes.
  #[inline]
  pub fn union(&self, other: &Aabb) -> Self {
    Self {
      min: self.min.min(other.min),
      max: self.max.max(other.max),
    }
  }

  /// Grow the box to contain `point`.
  #[inline]
  pub fn add_point(&mut self, point: Vec3A) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }

  /// Corner of the box furthest along `dir` (support vertex).
  #[inline]
  pub fn support_vertex(&self, dir: Vec3A) -> Vec3A {
    Vec3A::select(dir.cmpge(Vec3A::ZERO), self.max, self.min)
  }

  #[inline]
  pub fn size(&self) -> Vec3A {
    self.max - self.min
  }

  #[inline]
  pub fn center(&self) -> Vec3A {
    (self.min + self.max) * 0.5
  }

  /// Total surface area; zero for the empty box.
  #[inline]
  pub fn surface_area(&self) -> f32 {
    if self.is_empty() {
      return 0.0;
    }
    let s = self.size();
    2.0 * (s.x * s.y + s.y * s.z + s.z * s.x)
  }

  #[inline]
  pub fn volume(&self) -> f32 {
    if self.is_empty() {
      return 0.0;
    }
    let s = self.size();
    s.x * s.y * s.z
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.min.cmpgt(self.max).any()
  }

  #[inline]
  pub fn contains_point(&self, point: Vec3A) -> bool {
    point.cmpge(self.min).all() && point.cmple(self.max).all()
  }

  /// Shift the box by `offset`.
  #[inline]
  pub fn translated(&self, offset: Vec3A) -> Self {
    Self {
      min: self.min + offset,
      max: self.max + offset,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_box_is_union_identity() {
    let b = Aabb::new(Vec3A::new(-1.0, 0.0, 2.0), Vec3A::new(3.0, 4.0, 5.0));
    assert_eq!(Aabb::empty().union(&b), b);
    assert_eq!(b.union(&Aabb::empty()), b);
    assert!(Aabb::empty().is_empty());
    assert_eq!(Aabb::empty().surface_area(), 0.0);
    assert_eq!(Aabb::empty().volume(), 0.0);
  }

  #[test]
  fn surface_area_and_volume() {
    let b = Aabb::new(Vec3A::ZERO, Vec3A::new(1.0, 2.0, 3.0));
    assert_eq!(b.surface_area(), 2.0 * (2.0 + 6.0 + 3.0));
    assert_eq!(b.volume(), 6.0);
  }

  #[test]
  fn support_vertex_picks_extreme_corner() {
    let b = Aabb::new(Vec3A::new(-1.0, -2.0, -3.0), Vec3A::new(1.0, 2.0, 3.0));
    assert_eq!(
      b.support_vertex(Vec3A::new(1.0, -1.0, 1.0)),
      Vec3A::new(1.0, -2.0, 3.0)
    );
  }

  #[test]
  fn union_covers_both() {
    let a = Aabb::new(Vec3A::ZERO, Vec3A::ONE);
    let b = Aabb::new(Vec3A::splat(2.0), Vec3A::splat(3.0));
    let u = a.union(&b);
    assert!(u.contains_point(Vec3A::splat(0.5)));
    assert!(u.contains_point(Vec3A::splat(2.5)));
  }
}
