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

/// For random query points, the tree returns exactly the brute-force
/// neighbor set.
#[test]
fn test_matches_brute_force() {
  let mut rng = Random::with_seed(201);
  let points = random_points(&mut rng, 2_000, 2.0);
  let tree = KdTree::build(&points);

  for _ in 0..500 {
    let query = Vec3A::new(
      rng.f32_bipolar() * 2.2,
      rng.f32_bipolar() * 2.2,
      rng.f32_bipolar() * 2.2,
    );
    let radius = 0.1 + rng.f32() * 0.5;

    let mut found = BTreeSet::new();
    tree.for_each_neighbor(query, radius, &points, |i| {
      found.insert(i);
    });

    assert_eq!(found, brute_force(&points, query, radius));
  }
}

#[test]
fn test_empty_tree() {
  let tree = KdTree::build(&[]);
  let mut count = 0;
  tree.for_each_neighbor(Vec3A::ZERO, 1.0, &[], |_| count += 1);
  assert_eq!(count, 0);
}

#[test]
fn test_single_point() {
  let points = vec![Vec3A::new(1.0, 2.0, 3.0)];
  let tree = KdTree::build(&points);
  let mut found = Vec::new();
  tree.for_each_neighbor(Vec3A::new(1.0, 2.0, 3.1), 0.2, &points, |i| found.push(i));
  assert_eq!(found, vec![0]);
}
