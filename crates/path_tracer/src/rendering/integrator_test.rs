use glam::Vec3A;

use super::*;
use crate::rendering::context::RaytracingParams;
use crate::material::Material;
use crate::math::transform::Transform;
use crate::scene::light::AreaLight;
use crate::scene::{Environment, Light, Scene, SceneObject, Shape};
use crate::traversal::HitPoint;

fn context(seed: u64, max_depth: u32) -> RenderingContext {
  let params = RaytracingParams {
    max_ray_depth: max_depth,
    ..Default::default()
  };
  RenderingContext::with_seed(params, seed)
}

fn luminance(c: Vec3A) -> f32 {
  c.dot(Vec3A::new(0.2126, 0.7152, 0.0722))
}

/// Empty scene: every ray returns exactly the environment color.
#[test]
fn test_empty_scene_returns_background() {
  let mut scene = Scene::new();
  scene.set_environment(Environment::constant(Vec3A::splat(0.5)));
  scene.build().unwrap();

  let mut ctx = context(1, 5);
  for _ in 0..32 {
    let dir = ctx.rng.sphere();
    let radiance = trace_ray(&scene, Ray::new(Vec3A::ZERO, dir), &mut ctx);
    assert_eq!(radiance, Vec3A::splat(0.5));
  }
}

/// Diffuse unit sphere lit by a point light: after averaging samples, the
/// sphere's center (facing the light) is brighter than its edge.
#[test]
fn test_sphere_point_light_shading() {
  let mut scene = Scene::new();

  let mut white = Material::new("white");
  white.base_color = Vec3A::ONE;
  white.roughness = 0.0;
  let white_id = scene.add_material(white);

  scene.add_object(SceneObject::new(
    Shape::Sphere {
      radius: 1.0,
      material: white_id,
    },
    Transform::IDENTITY,
  ));
  scene.add_light(Light::Point {
    position: Vec3A::new(0.0, 10.0, 0.0),
    color: Vec3A::splat(1000.0),
  });
  scene.build().unwrap();

  // orthographic probe rays along -Y from above: the pole faces the light,
  // the rim grazes it
  let mut ctx = context(2, 4);
  let samples = 256;

  let mut average = |origin: Vec3A| {
    let mut sum = Vec3A::ZERO;
    for _ in 0..samples {
      sum += trace_ray(&scene, Ray::new(origin, -Vec3A::Y), &mut ctx);
    }
    luminance(sum / samples as f32)
  };

  let center = average(Vec3A::new(0.0, 5.0, 0.0));
  let edge = average(Vec3A::new(0.95, 5.0, 0.0));
  assert!(
    center > edge,
    "center luminance {center} must exceed edge luminance {edge}"
  );
  assert!(center > 0.0, "point light contributed nothing");
}

/// Floor plus an area light above it: average luminance of points on the
/// floor grows monotonically with the bounce budget.
#[test]
fn test_indirect_light_grows_with_depth() {
  let mut scene = Scene::new();

  let mut white = Material::new("floor");
  white.base_color = Vec3A::splat(0.8);
  let white_id = scene.add_material(white);

  // floor quad from two triangles via the mesh path; winding chosen so the
  // geometric normal points up
  let indices = vec![0u32, 2, 1, 0, 3, 2];
  let positions = vec![
    -2.0f32, 0.0, -2.0, //
    2.0, 0.0, -2.0, //
    2.0, 0.0, 2.0, //
    -2.0, 0.0, 2.0,
  ];
  let material_indices = vec![0u32, 0];
  let mesh = crate::mesh::Mesh::new(&crate::mesh::MeshDesc {
    vertex_buffer: crate::mesh::VertexBufferDesc {
      num_vertices: 4,
      num_triangles: 2,
      vertex_indices: &indices,
      positions: &positions,
      normals: None,
      tangents: None,
      tex_coords: None,
      material_indices: Some(&material_indices),
      materials: vec![white_id],
    },
    scale: 1.0,
    name: "floor".into(),
  })
  .unwrap();
  scene.add_object(SceneObject::new(
    Shape::Mesh(std::sync::Arc::new(mesh)),
    Transform::IDENTITY,
  ));

  // emitter above the floor, facing down
  scene.add_light(Light::Area(AreaLight::new(
    Vec3A::new(-0.5, 2.0, -0.5),
    Vec3A::new(0.0, 0.0, 1.0),
    Vec3A::new(1.0, 0.0, 0.0),
    Vec3A::splat(5.0),
    false,
  )));
  scene.build().unwrap();

  let samples = 8000;
  let mut lum_by_depth = Vec::new();
  for depth in 1..=5 {
    let mut ctx = context(40, depth);
    let mut sum = Vec3A::ZERO;
    for _ in 0..samples {
      // probe the floor center from a fixed viewpoint
      let origin = Vec3A::new(0.0, 1.0, 3.0);
      let target = Vec3A::new(0.0, 0.0, 0.0);
      sum += trace_ray(&scene, Ray::new(origin, target - origin), &mut ctx);
    }
    lum_by_depth.push(luminance(sum / samples as f32));
  }

  // deeper budgets only add bounce contributions; each depth is an
  // independent Monte-Carlo estimate, so allow noise-sized dips
  for pair in lum_by_depth.windows(2) {
    assert!(
      pair[1] >= pair[0] * 0.85 - 5.0e-3,
      "luminance dropped with depth: {lum_by_depth:?}"
    );
  }
  assert!(
    lum_by_depth[4] > lum_by_depth[0] + 1.0e-2,
    "no indirect light accumulated: {lum_by_depth:?}"
  );
}

/// Hitting an area light's proxy directly returns its radiance.
#[test]
fn test_light_proxy_hit_radiance() {
  let mut scene = Scene::new();
  scene.add_light(Light::Area(AreaLight::new(
    Vec3A::new(-1.0, 3.0, -1.0),
    Vec3A::new(0.0, 0.0, 2.0),
    Vec3A::new(2.0, 0.0, 0.0),
    Vec3A::splat(4.0),
    false,
  )));
  scene.build().unwrap();

  let mut ctx = context(3, 5);
  let radiance = trace_ray(&scene, Ray::new(Vec3A::ZERO, Vec3A::Y), &mut ctx);
  assert_eq!(radiance, Vec3A::splat(4.0));
}

/// Emissive materials terminate paths with their emission added once.
#[test]
fn test_emissive_surface() {
  let mut scene = Scene::new();

  let mut glow = Material::new("glow");
  glow.emission = Vec3A::new(2.0, 1.0, 0.5);
  glow.base_color = Vec3A::ZERO;
  let glow_id = scene.add_material(glow);

  scene.add_object(SceneObject::new(
    Shape::Sphere {
      radius: 1.0,
      material: glow_id,
    },
    Transform::from_translation(Vec3A::new(0.0, 0.0, -3.0)),
  ));
  scene.build().unwrap();

  let mut ctx = context(4, 5);
  let radiance = trace_ray(&scene, Ray::new(Vec3A::ZERO, -Vec3A::Z), &mut ctx);
  assert_eq!(radiance, Vec3A::new(2.0, 1.0, 0.5));
}

/// `trace_ray_from_hit` with the precomputed hit matches a fresh trace on
/// the first segment.
#[test]
fn test_trace_from_precomputed_hit() {
  let mut scene = Scene::new();
  let mut glow = Material::new("glow");
  glow.emission = Vec3A::splat(3.0);
  glow.base_color = Vec3A::ZERO;
  let glow_id = scene.add_material(glow);
  scene.add_object(SceneObject::new(
    Shape::Sphere {
      radius: 1.0,
      material: glow_id,
    },
    Transform::from_translation(Vec3A::new(0.0, 0.0, -3.0)),
  ));
  scene.build().unwrap();

  let ray = Ray::new(Vec3A::ZERO, -Vec3A::Z);
  let mut ctx = context(5, 5);
  let hit = scene.intersect(&ray, &mut ctx);
  let from_hit = trace_ray_from_hit(&scene, ray, hit, &mut ctx);
  let fresh = trace_ray(&scene, ray, &mut ctx);
  assert_eq!(from_hit, fresh);
}

/// A miss with a precomputed miss record returns the background.
#[test]
fn test_trace_from_miss() {
  let mut scene = Scene::new();
  scene.set_environment(Environment::constant(Vec3A::splat(0.25)));
  scene.build().unwrap();

  let mut ctx = context(6, 5);
  let radiance = trace_ray_from_hit(
    &scene,
    Ray::new(Vec3A::ZERO, Vec3A::X),
    HitPoint::none(),
    &mut ctx,
  );
  assert_eq!(radiance, Vec3A::splat(0.25));
}
