use glam::Vec3A;

use super::*;
use crate::math::random::Random;

fn random_boxes(rng: &mut Random, count: usize, scale: f32) -> Vec<Aabb> {
  (0..count)
    .map(|_| {
      let center = Vec3A::new(
        rng.f32_bipolar() * scale,
        rng.f32_bipolar() * scale,
        rng.f32_bipolar() * scale,
      );
      let half = Vec3A::new(
        rng.f32() * 0.5 + 0.01,
        rng.f32() * 0.5 + 0.01,
        rng.f32() * 0.5 + 0.01,
      );
      Aabb::new(center - half, center + half)
    })
    .collect()
}

/// Every source box's centroid lands in a leaf whose bounds contain it, and
/// every inner node's box equals the union of its children.
#[test]
fn test_coverage_invariants() {
  let mut rng = Random::with_seed(300);
  let boxes = random_boxes(&mut rng, 500, 10.0);
  let (bvh, order) = BvhBuilder::build(&boxes, BuildingParams::default()).unwrap();

  assert_eq!(order.len(), boxes.len());

  // leaf membership: walk all leaves; leaf bounds must contain the
  // centroid of every referenced primitive
  let mut covered = vec![false; boxes.len()];
  for node in bvh.nodes() {
    if !node.is_leaf() {
      let left = &bvh.nodes()[node.child_index as usize];
      let right = &bvh.nodes()[node.child_index as usize + 1];
      let union = left.aabb().union(&right.aabb());
      assert!(
        (union.min - node.aabb().min).abs().max_element() < 1.0e-5
          && (union.max - node.aabb().max).abs().max_element() < 1.0e-5,
        "inner node bounds differ from child union"
      );
      continue;
    }
    let aabb = node.aabb();
    for i in 0..node.leaf_count() {
      let leaf = order[(node.child_index + i) as usize] as usize;
      assert!(!covered[leaf], "leaf referenced twice");
      covered[leaf] = true;
      assert!(
        aabb.contains_point(boxes[leaf].center()),
        "leaf centroid outside its node"
      );
    }
  }
  assert!(covered.iter().all(|&c| c), "some primitive not referenced");
}

/// Building twice from the same input is bit-identical.
#[test]
fn test_deterministic_build() {
  let mut rng = Random::with_seed(301);
  let boxes = random_boxes(&mut rng, 300, 5.0);

  let (bvh_a, order_a) = BvhBuilder::build(&boxes, BuildingParams::default()).unwrap();
  let (bvh_b, order_b) = BvhBuilder::build(&boxes, BuildingParams::default()).unwrap();

  assert_eq!(order_a, order_b);
  assert_eq!(bvh_a.num_nodes(), bvh_b.num_nodes());
  for (a, b) in bvh_a.nodes().iter().zip(bvh_b.nodes()) {
    assert_eq!(a, b);
  }
}

/// 1000 random boxes: bounded depth, positive area, leaf sizes within the
/// configured maximum.
#[test]
fn test_stats_of_large_build() {
  let mut rng = Random::with_seed(302);
  let boxes = random_boxes(&mut rng, 1000, 20.0);
  let params = BuildingParams::default();
  let (bvh, _) = BvhBuilder::build(&boxes, params).unwrap();

  let stats = bvh.calculate_stats();
  assert!(stats.max_depth <= BVH_MAX_DEPTH as u32);
  assert!(stats.total_area > 0.0);
  assert!(stats.num_nodes > 0);
  for (size, &count) in stats.leaf_size_histogram.iter().enumerate() {
    if size > params.max_leaf_size as usize {
      assert_eq!(count, 0, "leaf of size {size} exceeds the maximum");
    }
  }
}

#[test]
fn test_single_leaf_build() {
  let boxes = vec![Aabb::new(Vec3A::ZERO, Vec3A::ONE)];
  let (bvh, order) = BvhBuilder::build(&boxes, BuildingParams::default()).unwrap();
  assert_eq!(bvh.num_nodes(), 1);
  assert!(bvh.nodes()[0].is_leaf());
  assert_eq!(order, vec![0]);
}

#[test]
fn test_empty_build() {
  let (bvh, order) = BvhBuilder::build(&[], BuildingParams::default()).unwrap();
  assert_eq!(bvh.num_nodes(), 0);
  assert!(order.is_empty());
}

/// Larger leaves are allowed when configured.
#[test]
fn test_max_leaf_size_respected() {
  let mut rng = Random::with_seed(303);
  let boxes = random_boxes(&mut rng, 64, 4.0);
  let (bvh, _) = BvhBuilder::build(&boxes, BuildingParams { max_leaf_size: 8 }).unwrap();
  let stats = bvh.calculate_stats();
  for (size, &count) in stats.leaf_size_histogram.iter().enumerate() {
    if size > 8 {
      assert_eq!(count, 0);
    }
  }
}
