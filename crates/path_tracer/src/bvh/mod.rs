//! Binary bounding volume hierarchy.
//!
//! Nodes are 32-byte records stored in one contiguous array with the root at
//! index 0. Inner nodes keep their two children adjacent, so traversal needs
//! only the first child index; the 2-bit split axis enables octant-based
//! front-to-back ordering in the packet walker.

pub mod builder;

pub use builder::{BuildingParams, BvhBuilder};

use std::io::Write;
use std::path::Path;

use glam::Vec3A;
use tracing::{error, info, warn};

use crate::error::{RtError, RtResult};
use crate::math::aabb::Aabb;
use crate::math::simd::Box3x8;

/// Traversal stack capacity; the builder never exceeds this depth.
pub const BVH_MAX_DEPTH: usize = 64;

const BVH_FILE_MAGIC: u32 = u32::from_le_bytes(*b"bvhc");
const BVH_FILE_VERSION: u32 = 0;

/// One BVH node: bounds, first-child (or first-leaf) index, and the packed
/// split-axis / leaf-count word. A node is a leaf iff its leaf count is
/// non-zero.
#[repr(C, align(32))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BvhNode {
  pub min: [f32; 3],
  pub child_index: u32,
  pub max: [f32; 3],
  // 30-bit leaf count | 2-bit split axis
  axis_and_count: u32,
}

// SAFETY: repr(C), exactly 32 bytes of plain floats/ints, no padding
unsafe impl bytemuck::Zeroable for BvhNode {}
unsafe impl bytemuck::Pod for BvhNode {}

impl BvhNode {
  #[inline]
  pub fn new_leaf(aabb: &Aabb, first_leaf: u32, leaf_count: u32) -> Self {
    debug_assert!(leaf_count > 0 && leaf_count < (1 << 30));
    Self {
      min: aabb.min.to_array(),
      child_index: first_leaf,
      max: aabb.max.to_array(),
      axis_and_count: leaf_count << 2,
    }
  }

  #[inline]
  pub fn new_inner(aabb: &Aabb, first_child: u32, split_axis: u32) -> Self {
    debug_assert!(split_axis < 3);
    Self {
      min: aabb.min.to_array(),
      child_index: first_child,
      max: aabb.max.to_array(),
      axis_and_count: split_axis,
    }
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.leaf_count() != 0
  }

  #[inline]
  pub fn leaf_count(&self) -> u32 {
    self.axis_and_count >> 2
  }

  #[inline]
  pub fn split_axis(&self) -> u32 {
    self.axis_and_count & 0x3
  }

  #[inline]
  pub fn aabb(&self) -> Aabb {
    Aabb {
      min: Vec3A::from_array(self.min),
      max: Vec3A::from_array(self.max),
    }
  }

  /// Bounds broadcast across eight SIMD lanes for packet tests.
  #[inline]
  pub fn aabb8(&self) -> Box3x8 {
    Box3x8::broadcast(&self.aabb())
  }
}

/// Aggregate statistics of a built tree.
#[derive(Clone, Debug, Default)]
pub struct BvhStats {
  pub num_nodes: u32,
  pub max_depth: u32,
  pub total_area: f64,
  pub total_volume: f64,
  /// `histogram[k]` = number of leaves holding exactly `k` primitives.
  pub leaf_size_histogram: Vec<u32>,
}

/// Immutable bounding volume hierarchy.
#[derive(Default)]
pub struct Bvh {
  nodes: Vec<BvhNode>,
}

impl Bvh {
  pub fn new() -> Self {
    Self { nodes: Vec::new() }
  }

  pub(crate) fn from_nodes(nodes: Vec<BvhNode>) -> Self {
    Self { nodes }
  }

  #[inline]
  pub fn nodes(&self) -> &[BvhNode] {
    &self.nodes
  }

  #[inline]
  pub fn num_nodes(&self) -> u32 {
    self.nodes.len() as u32
  }

  /// Walk the whole tree once, collecting statistics.
  pub fn calculate_stats(&self) -> BvhStats {
    let mut stats = BvhStats::default();
    if !self.nodes.is_empty() {
      self.stats_for_node(0, 0, &mut stats);
    }
    stats
  }

  fn stats_for_node(&self, index: u32, depth: u32, stats: &mut BvhStats) {
    let node = &self.nodes[index as usize];
    let aabb = node.aabb();

    stats.num_nodes += 1;
    stats.total_area += aabb.surface_area() as f64;
    stats.total_volume += aabb.volume() as f64;

    if node.is_leaf() {
      stats.max_depth = stats.max_depth.max(depth);
      let count = node.leaf_count() as usize;
      if stats.leaf_size_histogram.len() <= count {
        stats.leaf_size_histogram.resize(count + 1, 0);
      }
      stats.leaf_size_histogram[count] += 1;
    } else {
      self.stats_for_node(node.child_index, depth + 1, stats);
      self.stats_for_node(node.child_index + 1, depth + 1, stats);
    }
  }

  /// Persist the tree: `{magic, version, node count}` header followed by the
  /// raw node records, all little-endian.
  pub fn save_to_file(&self, path: &Path) -> RtResult<()> {
    let mut file = std::fs::File::create(path).inspect_err(|e| {
      error!(path = %path.display(), error = %e, "failed to create BVH file");
    })?;

    file.write_all(&BVH_FILE_MAGIC.to_le_bytes())?;
    file.write_all(&BVH_FILE_VERSION.to_le_bytes())?;
    file.write_all(&(self.nodes.len() as u32).to_le_bytes())?;
    file.write_all(bytemuck::cast_slice(&self.nodes))?;
    Ok(())
  }

  /// Load a tree saved by [`Bvh::save_to_file`], verifying magic, version
  /// and payload length.
  pub fn load_from_file(path: &Path) -> RtResult<Self> {
    let bytes = std::fs::read(path).inspect_err(|e| {
      error!(path = %path.display(), error = %e, "failed to read BVH file");
    })?;

    if bytes.len() < 12 {
      error!(path = %path.display(), "truncated BVH header");
      return Err(RtError::CorruptFile("truncated BVH header".into()));
    }

    let u32_at = |o: usize| u32::from_le_bytes(bytes[o..o + 4].try_into().unwrap());

    if u32_at(0) != BVH_FILE_MAGIC {
      error!(path = %path.display(), "bad BVH magic");
      return Err(RtError::CorruptFile("bad BVH magic".into()));
    }
    let version = u32_at(4);
    if version != BVH_FILE_VERSION {
      error!(path = %path.display(), version, "unsupported BVH version");
      return Err(RtError::VersionMismatch { found: version });
    }

    let count = u32_at(8) as usize;
    let payload = &bytes[12..];
    if payload.len() != count * std::mem::size_of::<BvhNode>() {
      error!(path = %path.display(), "BVH payload length mismatch");
      return Err(RtError::CorruptFile("BVH payload length mismatch".into()));
    }

    let nodes = payload
      .chunks_exact(std::mem::size_of::<BvhNode>())
      .map(bytemuck::pod_read_unaligned::<BvhNode>)
      .collect::<Vec<_>>();

    info!(path = %path.display(), nodes = count, "BVH loaded");
    Ok(Self { nodes })
  }

  /// Load a cached tree, rebuilding from `leaf_boxes` when the file is
  /// missing or rejected. Returns the new leaf permutation only when a
  /// rebuild happened (a cached tree matches the already-reordered data).
  pub fn load_or_rebuild(
    path: &Path,
    leaf_boxes: &[crate::math::aabb::Aabb],
    params: builder::BuildingParams,
  ) -> RtResult<(Self, Option<Vec<u32>>)> {
    match Self::load_from_file(path) {
      Ok(bvh) => Ok((bvh, None)),
      Err(err) => {
        warn!(path = %path.display(), error = %err, "BVH cache rejected, rebuilding");
        let (bvh, order) = builder::BvhBuilder::build(leaf_boxes, params)?;
        Ok((bvh, Some(order)))
      }
    }
  }
}
