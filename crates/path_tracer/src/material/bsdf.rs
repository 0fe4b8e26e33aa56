//! BSDF sampling and evaluation.
//!
//! All directions are unit vectors in the local tangent frame (surface
//! normal = +Z) pointing away from the surface. `sample` fills the sampling
//! context with the incoming direction, the BSDF value (cosine excluded),
//! the solid-angle PDF and the event kind; the integrator multiplies
//! `weight * |cos| / pdf` into the path throughput.

use std::f32::consts::PI;

use glam::Vec3A;

use crate::math::random::Random;

use super::microfacet::Microfacet;

/// Outgoing directions closer to the horizon than this are rejected.
pub const COS_EPSILON: f32 = 1.0e-5;

// below this roughness the GGX lobe degenerates into a mirror
const SPECULAR_ROUGHNESS_THRESHOLD: f32 = 0.01;

/// What kind of scattering a sample produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BsdfEvent {
  SpecularReflection,
  GlossyReflection,
  DiffuseReflection,
  Transmission,
}

/// One scattering component of a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bsdf {
  /// Cosine-sampled diffuse lobe (Lambert sampling, Oren-Nayar-style
  /// roughness correction on evaluate).
  Diffuse,
  /// Ideal mirror.
  SpecularReflective,
  /// GGX microfacet reflection.
  GlossyReflective,
  /// Ideal refraction through the material's IOR.
  Transparency,
}

/// In/out parameter block of a BSDF sample.
pub struct SamplingContext<'a> {
  /// Direction toward the viewer, local frame.
  pub outgoing_dir: Vec3A,
  /// Material roughness at the shading point.
  pub roughness: f32,
  /// Index of refraction.
  pub ior: f32,
  pub rng: &'a mut Random,

  // outputs
  pub out_incoming_dir: Vec3A,
  pub out_weight: Vec3A,
  pub out_pdf: f32,
  pub out_event: BsdfEvent,
}

impl<'a> SamplingContext<'a> {
  pub fn new(outgoing_dir: Vec3A, roughness: f32, ior: f32, rng: &'a mut Random) -> Self {
    Self {
      outgoing_dir,
      roughness,
      ior,
      rng,
      out_incoming_dir: Vec3A::Z,
      out_weight: Vec3A::ZERO,
      out_pdf: 0.0,
      out_event: BsdfEvent::DiffuseReflection,
    }
  }
}

// mirror `v` about the half-vector `m`
#[inline]
fn reflect(v: Vec3A, m: Vec3A) -> Vec3A {
  2.0 * v.dot(m) * m - v
}

// refract `incident` (pointing toward the surface) through the +Z plane
fn refract(incident: Vec3A, mut eta: f32) -> Option<Vec3A> {
  let n_dot_v = incident.z;
  if n_dot_v < 0.0 {
    eta = 1.0 / eta;
  }

  let k = 1.0 - eta * eta * (1.0 - n_dot_v * n_dot_v);
  if k < 0.0 {
    // total internal reflection: no transmitted solution
    return None;
  }

  let mut transmitted = incident * eta - (eta * n_dot_v + k.sqrt()) * Vec3A::Z;
  if n_dot_v > 0.0 {
    transmitted.z = -transmitted.z;
  }
  Some(transmitted.normalize())
}

impl Bsdf {
  /// Draw an incoming direction. Returns `false` when no valid sample
  /// exists (grazing outgoing direction, total internal reflection).
  pub fn sample(&self, ctx: &mut SamplingContext) -> bool {
    match self {
      Bsdf::Diffuse => Self::sample_diffuse(ctx),
      Bsdf::SpecularReflective => Self::sample_specular(ctx),
      Bsdf::GlossyReflective => Self::sample_glossy(ctx),
      Bsdf::Transparency => Self::sample_transparency(ctx),
    }
  }

  fn sample_diffuse(ctx: &mut SamplingContext) -> bool {
    if ctx.outgoing_dir.z < COS_EPSILON {
      return false;
    }

    let incoming = ctx.rng.hemisphere_cos();
    if incoming.z < COS_EPSILON {
      return false;
    }

    ctx.out_incoming_dir = incoming;
    ctx.out_weight = Vec3A::splat(1.0 / PI);
    ctx.out_pdf = incoming.z / PI;
    ctx.out_event = BsdfEvent::DiffuseReflection;
    true
  }

  fn sample_specular(ctx: &mut SamplingContext) -> bool {
    let n_dot_v = ctx.outgoing_dir.z;
    if n_dot_v < COS_EPSILON {
      return false;
    }

    ctx.out_incoming_dir = reflect(ctx.outgoing_dir, Vec3A::Z);
    ctx.out_weight = Vec3A::splat(1.0 / n_dot_v);
    ctx.out_pdf = 1.0;
    ctx.out_event = BsdfEvent::SpecularReflection;
    true
  }

  fn sample_glossy(ctx: &mut SamplingContext) -> bool {
    let n_dot_v = ctx.outgoing_dir.z;
    if n_dot_v < COS_EPSILON {
      return false;
    }

    // near-zero roughness degenerates into the mirror path
    if ctx.roughness < SPECULAR_ROUGHNESS_THRESHOLD {
      let ok = Self::sample_specular(ctx);
      ctx.out_event = BsdfEvent::SpecularReflection;
      return ok;
    }

    let alpha = ctx.roughness * ctx.roughness;
    let microfacet = Microfacet::new(alpha);

    let m = microfacet.sample(ctx.rng);
    let incoming = reflect(ctx.outgoing_dir, m);
    if incoming.z < COS_EPSILON {
      return false;
    }

    let n_dot_h = m.z;
    let n_dot_l = incoming.z;
    let v_dot_h = m.dot(ctx.outgoing_dir);
    if v_dot_h < COS_EPSILON {
      return false;
    }

    let d = microfacet.d(m);
    let g = microfacet.g(n_dot_v, n_dot_l);

    ctx.out_incoming_dir = incoming;
    ctx.out_weight = Vec3A::splat(g * d / (4.0 * n_dot_v * n_dot_l));
    // half-vector pdf divided by the reflection Jacobian
    ctx.out_pdf = microfacet.pdf(m) / (4.0 * v_dot_h);
    ctx.out_event = BsdfEvent::GlossyReflection;
    true
  }

  fn sample_transparency(ctx: &mut SamplingContext) -> bool {
    let Some(transmitted) = refract(-ctx.outgoing_dir, ctx.ior) else {
      return false;
    };

    let cos = transmitted.z.abs().max(COS_EPSILON);
    ctx.out_incoming_dir = transmitted;
    ctx.out_weight = Vec3A::splat(1.0 / cos);
    ctx.out_pdf = 1.0;
    ctx.out_event = BsdfEvent::Transmission;
    true
  }

  /// Evaluate the BSDF value and PDF for a given direction pair. Delta
  /// distributions evaluate to zero.
  pub fn evaluate(
    &self,
    outgoing_dir: Vec3A,
    incoming_dir: Vec3A,
    roughness: f32,
  ) -> (Vec3A, f32) {
    match self {
      Bsdf::Diffuse => {
        let n_dot_l = incoming_dir.z;
        let n_dot_v = outgoing_dir.z;
        if n_dot_l < COS_EPSILON || n_dot_v < COS_EPSILON {
          return (Vec3A::ZERO, 0.0);
        }

        // Oren-Nayar A/B correction; roughness 0 reduces to Lambert
        let r2 = roughness * roughness;
        let a = 1.0 - 0.5 * r2 / (0.33 + r2);
        let b = 0.45 * r2 / (0.09 + r2);

        let i_dot_o = (incoming_dir.dot(outgoing_dir)).max(0.0);
        let s = i_dot_o - n_dot_l * n_dot_v;
        let t = if s < 0.0 { n_dot_l.max(n_dot_v) } else { 1.0 };

        let value = (a + b * s / t.max(COS_EPSILON)) / PI;
        (Vec3A::splat(value.max(0.0)), n_dot_l / PI)
      }
      Bsdf::SpecularReflective | Bsdf::Transparency => (Vec3A::ZERO, 0.0),
      Bsdf::GlossyReflective => {
        if roughness < SPECULAR_ROUGHNESS_THRESHOLD {
          return (Vec3A::ZERO, 0.0);
        }

        let n_dot_v = outgoing_dir.z;
        let n_dot_l = incoming_dir.z;
        if n_dot_v < COS_EPSILON || n_dot_l < COS_EPSILON {
          return (Vec3A::ZERO, 0.0);
        }

        let m = (outgoing_dir + incoming_dir).normalize();
        let v_dot_h = m.dot(outgoing_dir);
        if v_dot_h < COS_EPSILON {
          return (Vec3A::ZERO, 0.0);
        }

        let microfacet = Microfacet::new(roughness * roughness);
        let d = microfacet.d(m);
        let g = microfacet.g(n_dot_v, n_dot_l);

        let value = g * d / (4.0 * n_dot_v * n_dot_l);
        let pdf = microfacet.pdf(m) / (4.0 * v_dot_h);
        (Vec3A::splat(value), pdf)
      }
    }
  }

  /// Whether the component is a delta distribution.
  pub fn is_delta(&self, roughness: f32) -> bool {
    match self {
      Bsdf::Diffuse => false,
      Bsdf::SpecularReflective | Bsdf::Transparency => true,
      Bsdf::GlossyReflective => roughness < SPECULAR_ROUGHNESS_THRESHOLD,
    }
  }
}

#[cfg(test)]
#[path = "bsdf_test.rs"]
mod bsdf_test;
