//! Tiled parallel viewport.
//!
//! Owns the render targets, the accumulation buffer, the thread pool and
//! the postprocess chain. Every `render` call adds one sample per pixel to
//! the accumulation sum and refreshes the tone-mapped front buffer.

use std::sync::Mutex;

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::{Vec2, Vec3A, Vec4};
use tracing::{error, info};

use crate::bitmap::{blur, Bitmap, Format};
use crate::error::{RtError, RtResult};
use crate::math::random::Random;
use crate::math::ray::Ray8;
use crate::math::simd::Vec3x8;
use crate::scene::camera::Camera;
use crate::scene::Scene;
use crate::traversal::packet::ImageLocation;
use crate::traversal::{HitPoint8, PacketTraversalContext, RayPacket, MAX_RAY_GROUPS};
use crate::utils::timer::Timer;

use super::context::{RayTracingCounters, RaytracingParams, RenderingContext};
use super::integrator;
use super::postprocess::{self, PostprocessParams};
use super::thread_pool::ThreadPool;

const TILE_SIZE: u32 = 32;

/// Primary-ray dispatch strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderingMode {
  /// One ray at a time through the single-ray walker.
  #[default]
  SingleRay,
  /// Coherent primary rays resolved through the packet walker, then shaded
  /// with the single-ray model.
  Packet,
}

/// Per-frame statistics published to the stats channel.
#[derive(Clone, Copy, Debug)]
pub struct FrameStats {
  pub frame_id: u32,
  pub num_samples: u32,
  pub render_time_ms: f64,
  pub counters: RayTracingCounters,
}

/// Monte-Carlo accumulation viewport.
pub struct Viewport {
  render_target: Bitmap,
  sum: Bitmap,
  blurred: Bitmap,
  blur_scratch: Bitmap,
  front_buffer: Bitmap,

  thread_pool: ThreadPool,
  params: RaytracingParams,
  postprocess: PostprocessParams,
  rendering_mode: RenderingMode,

  rng: Random,
  frame_id: u32,
  num_samples: u32,

  stats_tx: Sender<FrameStats>,
  stats_rx: Receiver<FrameStats>,
}

impl Viewport {
  pub fn new() -> Self {
    let (stats_tx, stats_rx) = bounded(64);
    Self {
      render_target: Bitmap::empty(),
      sum: Bitmap::empty(),
      blurred: Bitmap::empty(),
      blur_scratch: Bitmap::empty(),
      front_buffer: Bitmap::empty(),
      thread_pool: ThreadPool::new(),
      params: RaytracingParams::default(),
      postprocess: PostprocessParams::default(),
      rendering_mode: RenderingMode::default(),
      rng: Random::new(),
      frame_id: 0,
      num_samples: 0,
      stats_tx,
      stats_rx,
    }
  }

  #[inline]
  pub fn width(&self) -> u32 {
    self.render_target.width()
  }

  #[inline]
  pub fn height(&self) -> u32 {
    self.render_target.height()
  }

  #[inline]
  pub fn num_samples(&self) -> u32 {
    self.num_samples
  }

  #[inline]
  pub fn front_buffer(&self) -> &Bitmap {
    &self.front_buffer
  }

  /// Counter stream consumed by whatever sits behind the GUI boundary.
  pub fn stats_receiver(&self) -> Receiver<FrameStats> {
    self.stats_rx.clone()
  }

  pub fn set_raytracing_params(&mut self, params: RaytracingParams) {
    self.params = params;
  }

  pub fn set_postprocess_params(&mut self, params: PostprocessParams) {
    self.postprocess = params;
  }

  pub fn postprocess_params(&self) -> &PostprocessParams {
    &self.postprocess
  }

  pub fn set_rendering_mode(&mut self, mode: RenderingMode) {
    self.rendering_mode = mode;
  }

  /// Reallocate all buffers; accumulation restarts.
  pub fn resize(&mut self, width: u32, height: u32) -> RtResult<()> {
    if width == 0 || height == 0 {
      error!(width, height, "invalid viewport size");
      return Err(RtError::InvalidArgument("invalid viewport size".into()));
    }
    if width == self.width() && height == self.height() {
      return Ok(());
    }

    self.render_target = Bitmap::init(width, height, Format::Rgba32F, true, None)?;
    self.sum = Bitmap::init(width, height, Format::Rgba32F, true, None)?;
    self.blurred = Bitmap::init(width, height, Format::Rgba32F, true, None)?;
    self.blur_scratch = Bitmap::init(width, height, Format::Rgba32F, true, None)?;
    self.front_buffer = Bitmap::init(width, height, Format::Bgra8, false, None)?;

    self.reset();
    Ok(())
  }

  /// Drop the accumulated samples; the next frame starts a fresh estimate.
  pub fn reset(&mut self) {
    self.num_samples = 0;
    self.sum.clear();
  }

  /// Render one sample per pixel and refresh the front buffer.
  pub fn render(&mut self, scene: &Scene, camera: &Camera) -> RtResult<()> {
    let width = self.width();
    let height = self.height();
    if width == 0 || height == 0 {
      return Err(RtError::InvalidArgument("viewport was never resized".into()));
    }

    let timer = Timer::start();

    let rows = height.div_ceil(TILE_SIZE);
    let columns = width.div_ceil(TILE_SIZE);

    let params = self.params;
    let frame_id = self.frame_id;
    let mode = self.rendering_mode;
    let target = Mutex::new(&mut self.render_target);
    let total_counters = Mutex::new(RayTracingCounters::default());

    let task = |tile_x: u32, tile_y: u32, thread_id: u32| {
      let mut context =
        RenderingContext::with_seed(params, (frame_id as u64) ^ ((thread_id as u64) << 16));

      let x0 = tile_x * TILE_SIZE;
      let y0 = tile_y * TILE_SIZE;
      let x1 = (x0 + TILE_SIZE).min(width);
      let y1 = (y0 + TILE_SIZE).min(height);

      let tile = match mode {
        RenderingMode::SingleRay => {
          render_tile_single(scene, camera, &mut context, width, height, x0, y0, x1, y1)
        }
        RenderingMode::Packet => {
          render_tile_packet(scene, camera, &mut context, width, height, x0, y0, x1, y1)
        }
      };

      // tiles own disjoint pixels; the lock only serializes the blit
      {
        let mut target = target.lock().unwrap();
        let mut row_index = 0usize;
        for y in y0..y1 {
          for x in x0..x1 {
            target.set_pixel(x, y, tile[row_index]);
            row_index += 1;
          }
        }
      }
      total_counters.lock().unwrap().append(&context.counters);
    };

    self.thread_pool.run_parallel_task(&task, rows, columns);

    drop(target);

    self.num_samples += 1;
    self.accumulate_and_present()?;
    self.frame_id += 1;

    let counters = total_counters.into_inner().unwrap();
    let stats = FrameStats {
      frame_id: self.frame_id,
      num_samples: self.num_samples,
      render_time_ms: timer.elapsed_ms(),
      counters,
    };
    // a slow or absent consumer must never stall rendering
    let _ = self.stats_tx.try_send(stats);

    info!(
      frame = self.frame_id,
      samples = self.num_samples,
      elapsed_ms = stats.render_time_ms,
      "frame rendered"
    );
    Ok(())
  }

  // accumulate the fresh sample image and rebuild the display buffer
  fn accumulate_and_present(&mut self) -> RtResult<()> {
    let width = self.width() as usize;
    let height = self.height();
    let scaling = 1.0 / self.num_samples as f32;

    // sum += render target
    let mut sum_line = vec![Vec4::ZERO; width];
    let mut sample_line = vec![Vec4::ZERO; width];
    for y in 0..height {
      self.sum.read_scanline(y, &mut sum_line);
      self.render_target.read_scanline(y, &mut sample_line);
      for (acc, sample) in sum_line.iter_mut().zip(&sample_line) {
        *acc += *sample;
      }
      self.sum.write_scanline(y, &sum_line);
    }

    let bloom = self.postprocess.bloom_strength > 0.0;
    if bloom {
      blur::gaussian_blur(
        &mut self.blurred,
        &mut self.blur_scratch,
        &self.sum,
        self.postprocess.bloom_size,
        3,
      )?;
    }

    let mut blurred_line = vec![Vec4::ZERO; width];
    let mut out_line = vec![0u8; width * 4];
    for y in 0..height {
      self.sum.read_scanline(y, &mut sum_line);
      if bloom {
        self.blurred.read_scanline(y, &mut blurred_line);
      }

      for x in 0..width {
        let mut color = sum_line[x];
        if bloom {
          color += blurred_line[x] * self.postprocess.bloom_strength;
        }

        let hdr = Vec3A::new(color.x, color.y, color.z) * scaling;
        let dither = Vec3A::new(
          self.rng.f32_bipolar(),
          self.rng.f32_bipolar(),
          self.rng.f32_bipolar(),
        );
        let display = postprocess::apply(hdr, &self.postprocess, dither);

        // BGRA byte order
        out_line[x * 4] = (display.z * 255.0 + 0.5) as u8;
        out_line[x * 4 + 1] = (display.y * 255.0 + 0.5) as u8;
        out_line[x * 4 + 2] = (display.x * 255.0 + 0.5) as u8;
        out_line[x * 4 + 3] = 255;
      }

      let stride = width * 4;
      self.front_buffer.data_mut()[y as usize * stride..(y as usize + 1) * stride]
        .copy_from_slice(&out_line);
    }

    Ok(())
  }
}

impl Default for Viewport {
  fn default() -> Self {
    Self::new()
  }
}

// render one tile with the single-ray integrator; returns row-major pixels
#[allow(clippy::too_many_arguments)]
fn render_tile_single(
  scene: &Scene,
  camera: &Camera,
  context: &mut RenderingContext,
  width: u32,
  height: u32,
  x0: u32,
  y0: u32,
  x1: u32,
  y1: u32,
) -> Vec<Vec4> {
  let inv_size = Vec2::new(1.0 / width as f32, 1.0 / height as f32);
  let mut tile = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);

  for y in y0..y1 {
    for x in x0..x1 {
      let jitter = (context.rng.vec2() - Vec2::splat(0.5)) * context.params.anti_aliasing_spread;
      let coords = (Vec2::new(x as f32, y as f32) + jitter) * inv_size;

      let ray = camera.generate_ray(coords, context);
      context.counters.num_primary_rays += 1;

      let radiance = integrator::trace_ray(scene, ray, context);
      tile.push(Vec4::new(radiance.x, radiance.y, radiance.z, 1.0));
    }
  }
  tile
}

// render one tile through the packet walker: primary hits are resolved for
// the whole tile at once, then every ray continues with the single-ray
// shading model
#[allow(clippy::too_many_arguments)]
fn render_tile_packet(
  scene: &Scene,
  camera: &Camera,
  context: &mut RenderingContext,
  width: u32,
  height: u32,
  x0: u32,
  y0: u32,
  x1: u32,
  y1: u32,
) -> Vec<Vec4> {
  let inv_size = Vec2::new(1.0 / width as f32, 1.0 / height as f32);

  let mut packet = RayPacket::new();
  let mut rays = Vec::new();
  let mut pending: [crate::math::ray::Ray; 8] =
    [crate::math::ray::Ray::new(Vec3A::ZERO, Vec3A::Z); 8];
  let mut pending_locations = [ImageLocation::default(); 8];
  let mut pending_count = 0usize;

  for y in y0..y1 {
    for x in x0..x1 {
      let jitter = (context.rng.vec2() - Vec2::splat(0.5)) * context.params.anti_aliasing_spread;
      let coords = (Vec2::new(x as f32, y as f32) + jitter) * inv_size;

      let ray = camera.generate_ray(coords, context);
      context.counters.num_primary_rays += 1;

      pending[pending_count] = ray;
      pending_locations[pending_count] = ImageLocation {
        x: (x - x0) as u16,
        y: (y - y0) as u16,
      };
      pending_count += 1;

      if pending_count == 8 {
        packet.push_group(Ray8::from_rays(&pending), Vec3x8::broadcast(Vec3A::ONE), pending_locations);
        rays.extend_from_slice(&pending);
        pending_count = 0;
      }
    }
  }
  // tiles are multiples of 8 pixels wide except at the image border; pad
  // the last group by repeating its first ray with zero contribution
  if pending_count > 0 {
    for i in pending_count..8 {
      pending[i] = pending[0];
      pending_locations[i] = pending_locations[0];
    }
    packet.push_group(Ray8::from_rays(&pending), Vec3x8::broadcast(Vec3A::ONE), pending_locations);
    rays.extend_from_slice(&pending[..pending_count]);
  }

  debug_assert!((packet.num_groups() as usize) <= MAX_RAY_GROUPS);

  let mut hits = vec![HitPoint8::none(); packet.num_groups() as usize];
  {
    let mut packet_ctx = PacketTraversalContext {
      packet: &packet,
      hits: &mut hits,
      context,
    };
    scene.traverse_packet(&mut packet_ctx);
  }

  let tile_width = (x1 - x0) as usize;
  let tile_height = (y1 - y0) as usize;
  let mut tile = vec![Vec4::ZERO; tile_width * tile_height];

  for (ray_index, ray) in rays.iter().enumerate() {
    let group = ray_index / 8;
    let lane = ray_index % 8;
    let hit = hits[group].get(lane);

    let radiance = integrator::trace_ray_from_hit(scene, *ray, hit, context);
    let location = packet.image_locations[group * 8 + lane];
    tile[location.y as usize * tile_width + location.x as usize] =
      Vec4::new(radiance.x, radiance.y, radiance.z, 1.0);
  }

  tile
}

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;
