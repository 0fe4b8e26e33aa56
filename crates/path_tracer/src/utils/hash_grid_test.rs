use std::collections::BTreeSet;

use glam::Vec3A;

use super::*;
use crate::math::random::Random;

fn random_points(rng: &mut Random, count: usize, scale: f32) -> Vec<Vec3A> {
  (0..count)
    .map(|_| {
      Vec3A::new(
        rng.f32_bipolar() * scale,
        rng.f32_bipolar() * scale,
        rng.f32_bipolar() * scale,
      )
    })
    .collect()
}

fn brute_force(points: &[Vec3A], query: Vec3A, radius: f32) -> BTreeSet<u32> {
  points
    .iter()
    .enumerate()
    .filter(|(_, p)| (**p - query).length_squared() <= radius * radius)
    .map(|(i, _)| i as u32)
    .collect()
}

/// For random query points, the grid returns exactly the brute-force
/// neighbor set.
#[test]
fn test_matches_brute_force() {
  let mut rng = Random::with_seed(200);
  let radius = 0.35;
  let points = random_points(&mut rng, 2_000, 2.0);
  let grid = HashGrid::build(&points, radius);

  for _ in 0..500 {
    let query = Vec3A::new(
      rng.f32_bipolar() * 2.2,
      rng.f32_bipolar() * 2.2,
      rng.f32_bipolar() * 2.2,
    );

    let mut found = BTreeSet::new();
    grid.for_each_neighbor(query, &points, |i| {
      found.insert(i);
    });

    assert_eq!(found, brute_force(&points, query, radius));
  }
}

#[test]
fn test_empty_grid() {
  let grid = HashGrid::build(&[], 1.0);
  let mut count = 0;
  grid.for_each_neighbor(Vec3A::ZERO, &[], |_| count += 1);
  assert_eq!(count, 0);
}

#[test]
fn test_bounds_cover_points() {
  let points = vec![Vec3A::new(-1.0, 0.0, 2.0), Vec3A::new(3.0, -4.0, 1.0)];
  let grid = HashGrid::build(&points, 0.5);
  for p in &points {
    assert!(grid.bounds().contains_point(*p));
  }
}
