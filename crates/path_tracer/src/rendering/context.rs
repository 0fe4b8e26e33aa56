//! Per-thread rendering state.
//!
//! All global singletons of a classic renderer (profiler registry, shared
//! RNG, parameter blocks) are folded into an explicit context that is passed
//! down the call graph; one context exists per worker thread.

use crate::math::random::Random;
use crate::traversal::MAX_RAY_GROUPS;

/// Global raytracing parameters, shared read-only by all threads.
#[derive(Clone, Copy, Debug)]
pub struct RaytracingParams {
  /// Maximum number of path segments (bounces + 1).
  pub max_ray_depth: u32,
  /// Pixel jitter amplitude for anti-aliasing.
  pub anti_aliasing_spread: f32,
  /// Offset applied along the new direction when spawning secondary rays.
  pub ray_epsilon: f32,
}

impl Default for RaytracingParams {
  fn default() -> Self {
    Self {
      max_ray_depth: 6,
      anti_aliasing_spread: 0.65,
      ray_epsilon: 1.0e-4,
    }
  }
}

/// Ray and intersection counters, accumulated per thread and published per
/// frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct RayTracingCounters {
  pub num_primary_rays: u64,
  pub num_shadow_rays: u64,
  pub num_diffuse_rays: u64,
  pub num_glossy_rays: u64,
  pub num_specular_rays: u64,
  pub num_transmission_rays: u64,
  pub num_ray_box_tests: u64,
  pub num_passed_ray_box_tests: u64,
  pub num_ray_triangle_tests: u64,
  pub num_passed_ray_triangle_tests: u64,
}

impl RayTracingCounters {
  pub fn reset(&mut self) {
    *self = Self::default();
  }

  pub fn append(&mut self, other: &RayTracingCounters) {
    self.num_primary_rays += other.num_primary_rays;
    self.num_shadow_rays += other.num_shadow_rays;
    self.num_diffuse_rays += other.num_diffuse_rays;
    self.num_glossy_rays += other.num_glossy_rays;
    self.num_specular_rays += other.num_specular_rays;
    self.num_transmission_rays += other.num_transmission_rays;
    self.num_ray_box_tests += other.num_ray_box_tests;
    self.num_passed_ray_box_tests += other.num_passed_ray_box_tests;
    self.num_ray_triangle_tests += other.num_ray_triangle_tests;
    self.num_passed_ray_triangle_tests += other.num_passed_ray_triangle_tests;
  }
}

/// Hub for all per-thread state: the PRNG, the read-only parameters, the
/// counters and the packet-traversal scratch lists.
pub struct RenderingContext {
  pub rng: Random,
  pub params: RaytracingParams,
  /// Scene time of the frame being rendered, in 0..1.
  pub time: f32,
  pub counters: RayTracingCounters,
  /// Packet traversal scratch: positions into the packet's group array.
  pub active_groups_indices: Vec<u16>,
  /// Packet traversal scratch: per-active-group 8-bit lane masks.
  pub active_rays_mask: Vec<u8>,
}

impl RenderingContext {
  pub fn new(params: RaytracingParams) -> Self {
    Self {
      rng: Random::new(),
      params,
      time: 0.0,
      counters: RayTracingCounters::default(),
      active_groups_indices: vec![0; MAX_RAY_GROUPS],
      active_rays_mask: vec![0; MAX_RAY_GROUPS],
    }
  }

  /// Context with a deterministic PRNG stream.
  pub fn with_seed(params: RaytracingParams, seed: u64) -> Self {
    let mut ctx = Self::new(params);
    ctx.rng.seed(seed);
    ctx
  }
}
