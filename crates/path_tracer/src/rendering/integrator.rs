//! Unidirectional path integrator.
//!
//! BSDF-sampled paths with Russian-roulette termination; light-proxy hits
//! contribute emitter radiance directly, so area lights are picked up by
//! plain BSDF sampling without next-event estimation.

use glam::Vec3A;

use crate::material::{BsdfEvent, SamplingContext};
use crate::math::ray::Ray;
use crate::scene::Scene;
use crate::traversal::HitPoint;

use super::context::RenderingContext;

/// Estimate the radiance arriving along `ray`.
pub fn trace_ray(scene: &Scene, ray: Ray, context: &mut RenderingContext) -> Vec3A {
  path_radiance(scene, ray, None, context)
}

/// Same estimator, but the first hit is already known (packet rendering
/// resolves primary hits in bulk before shading).
pub fn trace_ray_from_hit(
  scene: &Scene,
  ray: Ray,
  first_hit: HitPoint,
  context: &mut RenderingContext,
) -> Vec3A {
  path_radiance(scene, ray, Some(first_hit), context)
}

fn path_radiance(
  scene: &Scene,
  primary_ray: Ray,
  first_hit: Option<HitPoint>,
  context: &mut RenderingContext,
) -> Vec3A {
  let mut result = Vec3A::ZERO;
  let mut throughput = Vec3A::ONE;
  let mut ray = primary_ray;

  for depth in 0..context.params.max_ray_depth {
    let hit = match (depth, first_hit) {
      (0, Some(hit)) => hit,
      _ => scene.intersect(&ray, context),
    };

    // a light surface ends the path with its radiance
    if !hit.is_miss() && hit.is_light() {
      result += throughput * scene.light_radiance(&hit, &ray);
      break;
    }

    // escaped into the environment
    if hit.is_miss() {
      result += throughput * scene.background_color(&ray);
      break;
    }

    let time = context.time;
    let shading = scene.extract_shading_data(&ray, &hit, time);
    let material = scene.material(shading.material);
    let params = material.evaluate_params(shading.tex_coord);

    result += throughput * material.emission;

    throughput *= params.base_color;
    if throughput == Vec3A::ZERO {
      break;
    }

    let outgoing_local = shading.world_to_local(-ray.dir);

    // delta lights can never be hit by a sampled ray, so they are the one
    // place where explicit light sampling is required
    result += throughput
      * sample_delta_lights(scene, &shading, outgoing_local, material, &params, context);

    // Russian roulette on the brightest channel; survivors are boosted to
    // keep the estimator unbiased
    let threshold = throughput.max_element();
    if context.rng.f32() > threshold {
      break;
    }
    throughput /= threshold.min(1.0);

    // BSDF sampling happens in the tangent frame
    let mut sampling = SamplingContext::new(
      outgoing_local,
      params.roughness,
      material.ior,
      &mut context.rng,
    );
    if !material.sample_bsdf(&params, &mut sampling) {
      break;
    }

    let weight =
      sampling.out_weight * sampling.out_incoming_dir.z.abs() / sampling.out_pdf.max(1.0e-20);
    let event = sampling.out_event;
    let incoming_world = shading
      .local_to_world(sampling.out_incoming_dir)
      .normalize();

    throughput *= weight;

    // numerical anomalies truncate the path, never reach the framebuffer
    if !throughput.is_finite() {
      return result;
    }

    match event {
      BsdfEvent::DiffuseReflection => context.counters.num_diffuse_rays += 1,
      BsdfEvent::GlossyReflection => context.counters.num_glossy_rays += 1,
      BsdfEvent::SpecularReflection => context.counters.num_specular_rays += 1,
      BsdfEvent::Transmission => context.counters.num_transmission_rays += 1,
    }

    ray = Ray::new_unit(
      shading.position + incoming_world * context.params.ray_epsilon,
      incoming_world,
    );
  }

  if result.is_finite() {
    result
  } else {
    Vec3A::ZERO
  }
}

// direct contribution of the delta lights at one path vertex
fn sample_delta_lights(
  scene: &Scene,
  shading: &crate::scene::ShadingData,
  outgoing_local: Vec3A,
  material: &crate::material::Material,
  params: &crate::material::MaterialParams,
  context: &mut RenderingContext,
) -> Vec3A {
  let mut result = Vec3A::ZERO;

  for light in scene.lights() {
    if !light.is_delta() {
      continue;
    }
    let Some(sample) = light.illuminate(shading.position, &mut context.rng) else {
      continue;
    };

    let incoming_local = shading.world_to_local(sample.dir_to_light);
    if incoming_local.z <= 0.0 {
      continue;
    }

    let (value, _) = material.evaluate_bsdf(params, outgoing_local, incoming_local);
    if value == Vec3A::ZERO {
      continue;
    }

    let shadow_ray = Ray::new_unit(
      shading.position + sample.dir_to_light * context.params.ray_epsilon,
      sample.dir_to_light,
    );
    context.counters.num_shadow_rays += 1;
    if scene.is_occluded(&shadow_ray, sample.distance - context.params.ray_epsilon, context) {
      continue;
    }

    result += value * incoming_local.z * sample.radiance / sample.pdf;
  }

  result
}

#[cfg(test)]
#[path = "integrator_test.rs"]
mod integrator_test;
