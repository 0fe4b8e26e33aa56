//! Offline demo: renders a showcase scene and writes the tone-mapped image.

mod scenes;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use path_tracer::prelude::*;
use path_tracer::rendering::RenderingMode;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SceneChoice {
  /// Sphere grid with varying roughness over a textured floor.
  Spheres,
  /// Closed box lit by a ceiling area light.
  Cornell,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TonemapChoice {
  Clamped,
  Reinhard,
  Filmic,
  Aces,
}

impl From<TonemapChoice> for Tonemapper {
  fn from(choice: TonemapChoice) -> Self {
    match choice {
      TonemapChoice::Clamped => Tonemapper::Clamped,
      TonemapChoice::Reinhard => Tonemapper::Reinhard,
      TonemapChoice::Filmic => Tonemapper::Filmic,
      TonemapChoice::Aces => Tonemapper::Aces,
    }
  }
}

#[derive(Parser, Debug)]
#[command(about = "CPU path tracer demo")]
struct Args {
  #[arg(long, default_value_t = 512)]
  width: u32,

  #[arg(long, default_value_t = 512)]
  height: u32,

  /// Samples per pixel.
  #[arg(long, default_value_t = 64)]
  samples: u32,

  /// Maximum path depth.
  #[arg(long, default_value_t = 6)]
  max_depth: u32,

  #[arg(long, value_enum, default_value_t = SceneChoice::Spheres)]
  scene: SceneChoice,

  #[arg(long, value_enum, default_value_t = TonemapChoice::Filmic)]
  tonemapper: TonemapChoice,

  /// Exposure in stops.
  #[arg(long, default_value_t = 0.0)]
  exposure: f32,

  /// Bloom strength; 0 disables bloom.
  #[arg(long, default_value_t = 0.0)]
  bloom: f32,

  /// Resolve primary rays through the packet walker.
  #[arg(long, default_value_t = false)]
  packets: bool,

  /// Output image (PNG or BMP by extension).
  #[arg(long, default_value = "render.png")]
  output: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into()),
    )
    .init();

  let args = Args::parse();

  let (scene, camera) = match args.scene {
    SceneChoice::Spheres => scenes::sphere_grid(args.width, args.height)?,
    SceneChoice::Cornell => scenes::cornell_box(args.width, args.height)?,
  };

  let mut viewport = Viewport::new();
  viewport.resize(args.width, args.height)?;
  viewport.set_raytracing_params(RaytracingParams {
    max_ray_depth: args.max_depth,
    ..Default::default()
  });
  viewport.set_postprocess_params(PostprocessParams {
    tonemapper: args.tonemapper.into(),
    exposure: args.exposure,
    bloom_strength: args.bloom,
    ..Default::default()
  });
  if args.packets {
    viewport.set_rendering_mode(RenderingMode::Packet);
  }

  let stats = viewport.stats_receiver();
  for sample in 1..=args.samples {
    viewport.render(&scene, &camera)?;

    if let Ok(frame) = stats.try_recv() {
      if sample % 16 == 0 || sample == args.samples {
        info!(
          sample,
          total = args.samples,
          frame_ms = format!("{:.1}", frame.render_time_ms),
          primary_rays = frame.counters.num_primary_rays,
          "progress"
        );
      }
    }
  }

  save_front_buffer(&viewport, &args.output)?;
  info!(path = %args.output.display(), "image written");
  Ok(())
}

fn save_front_buffer(viewport: &Viewport, path: &std::path::Path) -> Result<()> {
  let width = viewport.width();
  let height = viewport.height();
  let bgra = viewport.front_buffer().data();

  let mut rgba = Vec::with_capacity(bgra.len());
  for px in bgra.chunks_exact(4) {
    rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
  }

  let image = image::RgbaImage::from_raw(width, height, rgba)
    .context("front buffer size mismatch")?;
  image
    .save(path)
    .with_context(|| format!("failed to write {}", path.display()))?;
  Ok(())
}
