//! Materials: texturable surface parameters plus a list of enabled BSDF
//! components.

pub mod bsdf;
pub mod microfacet;

pub use bsdf::{Bsdf, BsdfEvent, SamplingContext};

use std::sync::Arc;

use glam::{Vec2, Vec3A};
use smallvec::SmallVec;

use crate::bitmap::{Bitmap, SamplingFilter};

/// Index into the scene's material arena.
pub type MaterialId = u32;

/// Sentinel id resolved to the scene's default material.
pub const DEFAULT_MATERIAL: MaterialId = u32::MAX;

/// Material parameters resolved at one shading point (textures sampled,
/// scalars applied).
#[derive(Clone, Copy, Debug)]
pub struct MaterialParams {
  pub base_color: Vec3A,
  pub roughness: f32,
}

/// Surface description shared by any number of scene objects.
pub struct Material {
  pub name: String,
  /// Radiance added at every hit of this surface.
  pub emission: Vec3A,
  /// Base color multiplier; multiplied into the texture when present.
  pub base_color: Vec3A,
  pub base_color_texture: Option<Arc<Bitmap>>,
  pub roughness: f32,
  pub roughness_texture: Option<Arc<Bitmap>>,
  /// 0 = dielectric (diffuse lobe), 1 = metal (glossy lobe).
  pub metalness: f32,
  pub ior: f32,
  pub dispersive: bool,
  pub transparent: bool,

  bsdfs: SmallVec<[Bsdf; 2]>,
}

impl Default for Material {
  fn default() -> Self {
    Self::new("default")
  }
}

impl Material {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_owned(),
      emission: Vec3A::ZERO,
      base_color: Vec3A::ONE,
      base_color_texture: None,
      roughness: 0.1,
      roughness_texture: None,
      metalness: 0.0,
      ior: 1.5,
      dispersive: false,
      transparent: false,
      bsdfs: SmallVec::new(),
    }
  }

  /// Compose the enabled BSDF list from the parameter set. Must run before
  /// rendering (the scene does it during `build`).
  pub fn compile(&mut self) {
    self.bsdfs.clear();

    if self.transparent {
      self.bsdfs.push(Bsdf::Transparency);
    } else if self.metalness > 0.0 {
      self.bsdfs.push(Bsdf::GlossyReflective);
    } else {
      self.bsdfs.push(Bsdf::Diffuse);
    }
  }

  #[inline]
  pub fn bsdfs(&self) -> &[Bsdf] {
    &self.bsdfs
  }

  /// Resolve textured parameters at a texture coordinate and cache them in
  /// a per-shading-point record.
  pub fn evaluate_params(&self, tex_coord: Vec2) -> MaterialParams {
    let mut base_color = self.base_color;
    if let Some(texture) = &self.base_color_texture {
      let texel = texture.sample(tex_coord, SamplingFilter::Bilinear);
      base_color *= Vec3A::new(texel.x, texel.y, texel.z);
    }

    let mut roughness = self.roughness;
    if let Some(texture) = &self.roughness_texture {
      roughness *= texture.sample(tex_coord, SamplingFilter::Bilinear).x;
    }

    MaterialParams {
      base_color,
      roughness,
    }
  }

  /// Sample the material's BSDF stack; multiple components are chosen
  /// uniformly with the weight compensated by the component count.
  pub fn sample_bsdf(&self, params: &MaterialParams, ctx: &mut SamplingContext) -> bool {
    debug_assert!(!self.bsdfs.is_empty(), "material was not compiled");
    if self.bsdfs.is_empty() {
      return false;
    }

    ctx.roughness = params.roughness;
    ctx.ior = self.ior;

    let bsdf = if self.bsdfs.len() == 1 {
      self.bsdfs[0]
    } else {
      let pick = (ctx.rng.f32() * self.bsdfs.len() as f32) as usize;
      self.bsdfs[pick.min(self.bsdfs.len() - 1)]
    };

    if !bsdf.sample(ctx) {
      return false;
    }

    // uniform component selection: the effective pdf shrinks by the count
    if self.bsdfs.len() > 1 {
      ctx.out_pdf /= self.bsdfs.len() as f32;
    }
    true
  }

  /// Evaluate the summed non-delta components for a direction pair.
  pub fn evaluate_bsdf(
    &self,
    params: &MaterialParams,
    outgoing_dir: Vec3A,
    incoming_dir: Vec3A,
  ) -> (Vec3A, f32) {
    let mut value = Vec3A::ZERO;
    let mut pdf = 0.0;
    for bsdf in &self.bsdfs {
      let (v, p) = bsdf.evaluate(outgoing_dir, incoming_dir, params.roughness);
      value += v;
      pdf += p;
    }
    if self.bsdfs.len() > 1 {
      pdf /= self.bsdfs.len() as f32;
    }
    (value, pdf)
  }
}

#[cfg(test)]
mod tests {
  use glam::Vec4;

  use super::*;
  use crate::bitmap::Format;

  #[test]
  fn compile_picks_components() {
    let mut m = Material::new("diffuse");
    m.compile();
    assert_eq!(m.bsdfs(), &[Bsdf::Diffuse]);

    let mut m = Material::new("metal");
    m.metalness = 1.0;
    m.compile();
    assert_eq!(m.bsdfs(), &[Bsdf::GlossyReflective]);

    let mut m = Material::new("glass");
    m.transparent = true;
    m.compile();
    assert_eq!(m.bsdfs(), &[Bsdf::Transparency]);
  }

  #[test]
  fn params_multiply_texture_and_tint() {
    let mut texture = Bitmap::init(1, 1, Format::Rgba32F, true, None).unwrap();
    texture.set_pixel(0, 0, Vec4::new(0.5, 0.5, 0.5, 1.0));

    let mut m = Material::new("textured");
    m.base_color = Vec3A::new(1.0, 0.5, 0.25);
    m.base_color_texture = Some(Arc::new(texture));

    let params = m.evaluate_params(Vec2::new(0.5, 0.5));
    assert!((params.base_color - Vec3A::new(0.5, 0.25, 0.125)).length() < 1.0e-5);
  }

  #[test]
  fn sampling_uncompiled_material_is_rejected_in_release() {
    let m = Material::new("empty");
    assert!(m.bsdfs().is_empty());
  }
}
