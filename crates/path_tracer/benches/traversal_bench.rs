//! Single-ray vs 8-wide BVH traversal over a random sphere field.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec3A;
use path_tracer::material::DEFAULT_MATERIAL;
use path_tracer::math::random::Random;
use path_tracer::math::ray::{Ray, Ray8};
use path_tracer::math::transform::Transform;
use path_tracer::rendering::context::{RaytracingParams, RenderingContext};
use path_tracer::scene::{Scene, SceneObject, Shape};
use path_tracer::traversal::{HitPoint8, SimdTraversalContext};

fn build_sphere_field() -> Scene {
  let mut rng = Random::with_seed(9000);
  let mut scene = Scene::new();
  for _ in 0..512 {
    let center = Vec3A::new(
      rng.f32_bipolar() * 20.0,
      rng.f32_bipolar() * 20.0,
      rng.f32_bipolar() * 20.0,
    );
    scene.add_object(SceneObject::new(
      Shape::Sphere {
        radius: 0.2 + rng.f32() * 0.5,
        material: DEFAULT_MATERIAL,
      },
      Transform::from_translation(center),
    ));
  }
  scene.build().unwrap();
  scene
}

fn bench_traversal(c: &mut Criterion) {
  let scene = build_sphere_field();
  let mut rng = Random::with_seed(9001);
  let rays: Vec<Ray> = (0..4096)
    .map(|_| {
      Ray::new(
        Vec3A::new(
          rng.f32_bipolar() * 25.0,
          rng.f32_bipolar() * 25.0,
          rng.f32_bipolar() * 25.0,
        ),
        rng.sphere(),
      )
    })
    .collect();

  let mut group = c.benchmark_group("traversal");

  group.bench_function("single_ray", |b| {
    let mut context = RenderingContext::with_seed(RaytracingParams::default(), 1);
    b.iter(|| {
      let mut hits = 0u32;
      for ray in &rays {
        if !scene.intersect(black_box(ray), &mut context).is_miss() {
          hits += 1;
        }
      }
      hits
    })
  });

  group.bench_function("simd8", |b| {
    let mut context = RenderingContext::with_seed(RaytracingParams::default(), 2);
    b.iter(|| {
      let mut hits = 0u32;
      for chunk in rays.chunks_exact(8) {
        let group_rays: [Ray; 8] = chunk.try_into().unwrap();
        let mut hit8 = HitPoint8::none();
        let mut ctx = SimdTraversalContext {
          ray: Ray8::from_rays(&group_rays),
          hit: &mut hit8,
          context: &mut context,
        };
        scene.traverse_simd8(&mut ctx);
        for lane in 0..8 {
          if !hit8.get(lane).is_miss() {
            hits += 1;
          }
        }
      }
      hits
    })
  });

  group.finish();
}

criterion_group!(benches, bench_traversal);
criterion_main!(benches);
