use glam::{Quat, Vec3A};

use super::postprocess::{self, PostprocessParams, Tonemapper};
use super::*;
use crate::material::Material;
use crate::math::ray::Ray;
use crate::math::transform::Transform;
use crate::scene::camera::Camera;
use crate::scene::light::AreaLight;
use crate::scene::{Environment, Light, Scene, SceneObject, Shape};

fn build_test_scene() -> Scene {
  let mut scene = Scene::new();
  scene.set_environment(Environment::constant(Vec3A::splat(0.2)));

  let mut white = Material::new("white");
  white.base_color = Vec3A::splat(0.7);
  let white_id = scene.add_material(white);

  scene.add_object(SceneObject::new(
    Shape::Sphere {
      radius: 1.0,
      material: white_id,
    },
    Transform::from_translation(Vec3A::new(0.0, 1.0, -4.0)),
  ));
  scene.add_object(SceneObject::new(
    Shape::Box {
      half_size: Vec3A::new(0.5, 0.5, 0.5),
      material: white_id,
    },
    Transform::new(
      Vec3A::new(1.8, 0.5, -5.0),
      Quat::from_rotation_y(0.4),
    ),
  ));
  scene.add_object(SceneObject::new(
    Shape::Plane {
      texture_scale: glam::Vec2::splat(1.0),
      material: white_id,
    },
    Transform::IDENTITY,
  ));
  scene.add_light(Light::Area(AreaLight::new(
    Vec3A::new(-1.0, 4.0, -6.0),
    Vec3A::new(0.0, 0.0, 2.0),
    Vec3A::new(2.0, 0.0, 0.0),
    Vec3A::splat(6.0),
    false,
  )));
  scene.build().unwrap();
  scene
}

fn camera_for(width: u32, height: u32) -> Camera {
  let mut camera = Camera::default();
  camera.set_perspective(
    Vec3A::new(0.0, 1.5, 2.0),
    Vec3A::new(0.0, -0.2, -1.0),
    Vec3A::Y,
    width as f32 / height as f32,
    1.1,
  );
  camera.update();
  camera
}

/// Rendering an empty scene with a constant environment produces a constant
/// image equal to the tonemapped environment color within 1 LSB.
#[test]
fn test_empty_scene_constant_image() {
  let mut scene = Scene::new();
  scene.set_environment(Environment::constant(Vec3A::splat(0.5)));
  scene.build().unwrap();

  let mut viewport = Viewport::new();
  viewport.resize(64, 64).unwrap();
  viewport.set_postprocess_params(PostprocessParams {
    tonemapper: Tonemapper::Aces,
    noise_strength: 0.0,
    ..Default::default()
  });

  let camera = camera_for(64, 64);
  viewport.render(&scene, &camera).unwrap();
  assert_eq!(viewport.num_samples(), 1);

  let expected = postprocess::apply(
    Vec3A::splat(0.5),
    viewport.postprocess_params(),
    Vec3A::ZERO,
  );
  let expected_bytes = [
    (expected.z * 255.0 + 0.5) as u8,
    (expected.y * 255.0 + 0.5) as u8,
    (expected.x * 255.0 + 0.5) as u8,
  ];

  let front = viewport.front_buffer();
  for y in 0..64 {
    for x in 0..64 {
      let o = (y * 64 + x) * 4;
      let pixel = &front.data()[o..o + 4];
      for c in 0..3 {
        assert!(
          (pixel[c] as i32 - expected_bytes[c] as i32).abs() <= 1,
          "pixel ({x},{y}) channel {c}: {} vs {}",
          pixel[c],
          expected_bytes[c]
        );
      }
      assert_eq!(pixel[3], 255);
    }
  }
}

/// Accumulation: a constant scene rendered repeatedly keeps the same mean,
/// and reset starts over.
#[test]
fn test_accumulation_and_reset() {
  let mut scene = Scene::new();
  scene.set_environment(Environment::constant(Vec3A::splat(0.3)));
  scene.build().unwrap();

  let mut viewport = Viewport::new();
  viewport.resize(16, 16).unwrap();
  viewport.set_postprocess_params(PostprocessParams {
    noise_strength: 0.0,
    ..Default::default()
  });
  let camera = camera_for(16, 16);

  viewport.render(&scene, &camera).unwrap();
  let first = viewport.front_buffer().data().to_vec();

  viewport.render(&scene, &camera).unwrap();
  viewport.render(&scene, &camera).unwrap();
  assert_eq!(viewport.num_samples(), 3);
  // constant radiance: the running mean is unchanged up to rounding
  let within_one_lsb = |data: &[u8]| {
    data
      .iter()
      .zip(&first)
      .all(|(a, b)| (*a as i32 - *b as i32).abs() <= 1)
  };
  assert!(within_one_lsb(viewport.front_buffer().data()));

  viewport.reset();
  assert_eq!(viewport.num_samples(), 0);
  viewport.render(&scene, &camera).unwrap();
  assert_eq!(viewport.num_samples(), 1);
  assert_eq!(viewport.front_buffer().data(), &first[..]);
}

#[test]
fn test_resize_validation() {
  let mut viewport = Viewport::new();
  assert!(viewport.resize(0, 32).is_err());
  assert!(viewport.resize(32, 0).is_err());
  assert!(viewport.resize(32, 32).is_ok());
  assert_eq!(viewport.width(), 32);
}

/// Packet and single-ray dispatch find the same primary hits pixel for
/// pixel.
#[test]
fn test_packet_vs_single_hit_parity() {
  use crate::rendering::context::{RaytracingParams, RenderingContext};
  use crate::traversal::{HitPoint8, PacketTraversalContext, RayPacket};

  // translation-only transforms: the scalar and 8-wide transform paths are
  // then bit-identical, so hits must match exactly
  let mut scene = Scene::new();
  scene.set_environment(Environment::constant(Vec3A::splat(0.2)));
  let mut white = Material::new("white");
  white.base_color = Vec3A::splat(0.7);
  let white_id = scene.add_material(white);
  scene.add_object(SceneObject::new(
    Shape::Sphere {
      radius: 1.0,
      material: white_id,
    },
    Transform::from_translation(Vec3A::new(0.0, 1.0, -4.0)),
  ));
  scene.add_object(SceneObject::new(
    Shape::Box {
      half_size: Vec3A::new(0.5, 0.5, 0.5),
      material: white_id,
    },
    Transform::from_translation(Vec3A::new(1.8, 0.5, -5.0)),
  ));
  scene.add_object(SceneObject::new(
    Shape::Plane {
      texture_scale: glam::Vec2::splat(1.0),
      material: white_id,
    },
    Transform::IDENTITY,
  ));
  scene.add_light(Light::Area(AreaLight::new(
    Vec3A::new(-1.0, 4.0, -6.0),
    Vec3A::new(0.0, 0.0, 2.0),
    Vec3A::new(2.0, 0.0, 0.0),
    Vec3A::splat(6.0),
    false,
  )));
  scene.build().unwrap();

  let camera = camera_for(128, 128);

  let mut context = RenderingContext::with_seed(RaytracingParams::default(), 99);

  for row in 0..128u32 {
    // deterministic rays, no jitter: both paths see identical input
    let rays: Vec<Ray> = (0..128u32)
      .map(|col| {
        let uv = glam::Vec2::new(
          (col as f32 + 0.5) / 128.0,
          (row as f32 + 0.5) / 128.0,
        );
        camera.generate_ray(uv, &mut context)
      })
      .collect();

    // single-ray reference
    let single_hits: Vec<_> = rays
      .iter()
      .map(|ray| scene.intersect(ray, &mut context))
      .collect();

    // packet version, 16 groups of 8
    let mut packet = RayPacket::new();
    for group in rays.chunks_exact(8) {
      let group_rays: [Ray; 8] = group.try_into().unwrap();
      packet.push_group(
        crate::math::ray::Ray8::from_rays(&group_rays),
        crate::math::simd::Vec3x8::broadcast(Vec3A::ONE),
        [crate::traversal::packet::ImageLocation::default(); 8],
      );
    }
    let mut hits = vec![HitPoint8::none(); packet.num_groups() as usize];
    {
      let mut packet_ctx = PacketTraversalContext {
        packet: &packet,
        hits: &mut hits,
        context: &mut context,
      };
      scene.traverse_packet(&mut packet_ctx);
    }

    for (i, reference) in single_hits.iter().enumerate() {
      let packet_hit = hits[i / 8].get(i % 8);
      assert_eq!(
        packet_hit.object_id, reference.object_id,
        "row {row} pixel {i}: object id mismatch"
      );
      assert_eq!(
        packet_hit.triangle_id, reference.triangle_id,
        "row {row} pixel {i}: primitive id mismatch"
      );
      if !reference.is_miss() {
        assert!((packet_hit.distance - reference.distance).abs() < 1.0e-3);
      }
    }
  }
}

/// The packet rendering mode produces an image close to the single-ray one.
#[test]
fn test_packet_mode_renders_similar_image() {
  let scene = build_test_scene();
  let camera = camera_for(64, 64);

  let mut render_with = |mode: RenderingMode| {
    let mut viewport = Viewport::new();
    viewport.resize(64, 64).unwrap();
    viewport.set_rendering_mode(mode);
    viewport.set_postprocess_params(PostprocessParams {
      noise_strength: 0.0,
      ..Default::default()
    });
    for _ in 0..8 {
      viewport.render(&scene, &camera).unwrap();
    }
    viewport.front_buffer().data().to_vec()
  };

  let single = render_with(RenderingMode::SingleRay);
  let packet = render_with(RenderingMode::Packet);

  // Monte-Carlo noise differs; the mean absolute difference must be small
  let mut total_diff = 0u64;
  for (a, b) in single.iter().zip(&packet) {
    total_diff += (*a as i64 - *b as i64).unsigned_abs();
  }
  let mean_diff = total_diff as f64 / single.len() as f64;
  assert!(mean_diff < 20.0, "packet image diverges: mean diff {mean_diff}");
}

/// Bloom pass smoke test: a bright spot bleeds into its neighborhood.
#[test]
fn test_bloom_spreads_highlights() {
  let mut scene = Scene::new();
  // small, very bright emitter on black background
  // edge order picked so the emitter faces the camera (+Z normal)
  scene.add_light(Light::Area(AreaLight::new(
    Vec3A::new(-0.2, -0.2, -5.0),
    Vec3A::new(0.0, 0.4, 0.0),
    Vec3A::new(0.4, 0.0, 0.0),
    Vec3A::splat(200.0),
    false,
  )));
  scene.build().unwrap();

  let mut camera = Camera::default();
  camera.set_perspective(Vec3A::ZERO, -Vec3A::Z, Vec3A::Y, 1.0, 0.9);
  camera.update();

  let mut render_with = |bloom: f32| {
    let mut viewport = Viewport::new();
    viewport.resize(64, 64).unwrap();
    viewport.set_postprocess_params(PostprocessParams {
      bloom_strength: bloom,
      bloom_size: 4.0,
      noise_strength: 0.0,
      tonemapper: Tonemapper::Reinhard,
      ..Default::default()
    });
    viewport.render(&scene, &camera).unwrap();
    viewport.front_buffer().data().to_vec()
  };

  let without = render_with(0.0);
  let with = render_with(0.5);

  // compare a pixel well outside the emitter's footprint but inside the
  // blur radius
  let probe = ((20 * 64) + 20) * 4;
  assert!(
    with[probe + 1] >= without[probe + 1],
    "bloom must not darken the surroundings"
  );
  let brighter = with
    .iter()
    .zip(&without)
    .filter(|(a, b)| a > b)
    .count();
  assert!(brighter > 50, "bloom changed almost nothing");
}

#[test]
fn test_stats_channel_publishes() {
  let mut scene = Scene::new();
  scene.set_environment(Environment::constant(Vec3A::splat(0.1)));
  scene.build().unwrap();

  let mut viewport = Viewport::new();
  viewport.resize(16, 16).unwrap();
  let stats_rx = viewport.stats_receiver();
  let camera = camera_for(16, 16);

  viewport.render(&scene, &camera).unwrap();

  let stats = stats_rx.try_recv().expect("stats must be published");
  assert_eq!(stats.num_samples, 1);
  assert_eq!(stats.counters.num_primary_rays, 16 * 16);
}
