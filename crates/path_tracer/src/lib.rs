#![feature(portable_simd)]

//! path_tracer - framework-independent CPU path tracing core
//!
//! This crate implements an offline, physically based path tracer: given
//! geometry, materials, lights and a camera it produces a high-dynamic-range
//! radiance image and a tone-mapped display image.
//!
//! # Features
//!
//! - **SAH BVH**: binary bounding volume hierarchy with surface-area-heuristic
//!   construction and versioned binary persistence
//! - **SIMD traversal**: single-ray and 8-wide coherent ray-packet BVH walkers
//!   built on `std::simd`
//! - **Physically based shading**: diffuse, specular, GGX microfacet and
//!   transmissive BSDFs over a local tangent frame
//! - **Tiled parallel rendering**: a worker pool renders 32x32 tiles into a
//!   Monte-Carlo accumulation buffer with bloom and filmic tonemapping
//!
//! # Example
//!
//! ```ignore
//! use path_tracer::prelude::*;
//!
//! let mut scene = Scene::new();
//! scene.set_environment(Environment::constant(Vec3A::splat(0.5)));
//! scene.build()?;
//!
//! let mut camera = Camera::default();
//! camera.set_perspective(Vec3A::new(0.0, 1.0, 5.0), -Vec3A::Z, Vec3A::Y, 1.0, 1.2);
//! camera.update();
//!
//! let mut viewport = Viewport::new();
//! viewport.resize(512, 512)?;
//! viewport.render(&scene, &camera);
//! ```

pub mod bitmap;
pub mod bvh;
pub mod error;
pub mod material;
pub mod math;
pub mod mesh;
pub mod rendering;
pub mod scene;
pub mod traversal;
pub mod utils;

pub use error::RtError;

/// Commonly used items.
pub mod prelude {
  pub use glam::{Vec2, Vec3A, Vec4};

  pub use crate::bitmap::{Bitmap, Format, SamplingFilter};
  pub use crate::bvh::{Bvh, BvhBuilder, BvhStats, BuildingParams};
  pub use crate::error::RtError;
  pub use crate::material::{Material, MaterialId};
  pub use crate::math::aabb::Aabb;
  pub use crate::math::random::Random;
  pub use crate::math::ray::Ray;
  pub use crate::math::transform::Transform;
  pub use crate::rendering::context::{RaytracingParams, RenderingContext};
  pub use crate::rendering::postprocess::{PostprocessParams, Tonemapper};
  pub use crate::rendering::viewport::Viewport;
  pub use crate::scene::camera::Camera;
  pub use crate::scene::light::Light;
  pub use crate::scene::object::SceneObject;
  pub use crate::scene::{Environment, Scene};
}
