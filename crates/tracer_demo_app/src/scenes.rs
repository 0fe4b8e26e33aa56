//! Showcase scene construction.

use anyhow::Result;
use glam::{Vec2, Vec3A};

use path_tracer::prelude::*;
use path_tracer::scene::light::AreaLight;
use path_tracer::scene::{Environment, Shape};

/// Grid of spheres with roughness sweeping from mirror to diffuse, over a
/// ground plane, lit by an area light and a bright environment.
pub fn sphere_grid(width: u32, height: u32) -> Result<(Scene, Camera)> {
  let mut scene = Scene::new();
  scene.set_environment(Environment::constant(Vec3A::new(0.6, 0.7, 0.9)));

  let mut floor = Material::new("floor");
  floor.base_color = Vec3A::splat(0.6);
  floor.roughness = 0.4;
  let floor_id = scene.add_material(floor);
  scene.add_object(SceneObject::new(
    Shape::Plane {
      texture_scale: Vec2::splat(0.25),
      material: floor_id,
    },
    Transform::IDENTITY,
  ));

  const COLUMNS: u32 = 5;
  for i in 0..COLUMNS {
    let t = i as f32 / (COLUMNS - 1) as f32;

    let mut metal = Material::new(&format!("metal_{i}"));
    metal.base_color = Vec3A::new(0.9, 0.7, 0.4);
    metal.metalness = 1.0;
    metal.roughness = 0.02 + 0.5 * t;
    let metal_id = scene.add_material(metal);

    scene.add_object(SceneObject::new(
      Shape::Sphere {
        radius: 0.8,
        material: metal_id,
      },
      Transform::from_translation(Vec3A::new(
        (i as f32 - (COLUMNS - 1) as f32 * 0.5) * 2.0,
        0.8,
        0.0,
      )),
    ));
  }

  // one glass sphere in front of the row
  let mut glass = Material::new("glass");
  glass.transparent = true;
  glass.ior = 1.5;
  let glass_id = scene.add_material(glass);
  scene.add_object(SceneObject::new(
    Shape::Sphere {
      radius: 0.6,
      material: glass_id,
    },
    Transform::from_translation(Vec3A::new(0.0, 0.6, 2.2)),
  ));

  // key light above, facing down
  scene.add_light(Light::Area(AreaLight::new(
    Vec3A::new(-2.0, 6.0, -2.0),
    Vec3A::new(0.0, 0.0, 4.0),
    Vec3A::new(4.0, 0.0, 0.0),
    Vec3A::splat(8.0),
    false,
  )));

  scene.build()?;

  let mut camera = Camera::default();
  camera.set_perspective(
    Vec3A::new(0.0, 2.5, 7.0),
    Vec3A::new(0.0, -0.25, -1.0),
    Vec3A::Y,
    width as f32 / height as f32,
    60.0_f32.to_radians(),
  );
  camera.update();

  Ok((scene, camera))
}

/// Closed box with colored side walls and a ceiling emitter.
pub fn cornell_box(width: u32, height: u32) -> Result<(Scene, Camera)> {
  let mut scene = Scene::new();

  let mut white = Material::new("white");
  white.base_color = Vec3A::splat(0.73);
  let white_id = scene.add_material(white);

  let mut red = Material::new("red");
  red.base_color = Vec3A::new(0.65, 0.05, 0.05);
  let red_id = scene.add_material(red);

  let mut green = Material::new("green");
  green.base_color = Vec3A::new(0.12, 0.45, 0.15);
  let green_id = scene.add_material(green);

  // walls are thin boxes; the box spans [-2, 2] on x/z, [0, 4] on y
  let mut wall = |center: Vec3A, half: Vec3A, material: MaterialId| {
    scene.add_object(SceneObject::new(
      Shape::Box {
        half_size: half,
        material,
      },
      Transform::from_translation(center),
    ));
  };
  wall(Vec3A::new(0.0, -0.05, 0.0), Vec3A::new(2.0, 0.05, 2.0), white_id); // floor
  wall(Vec3A::new(0.0, 4.05, 0.0), Vec3A::new(2.0, 0.05, 2.0), white_id); // ceiling
  wall(Vec3A::new(0.0, 2.0, -2.05), Vec3A::new(2.0, 2.0, 0.05), white_id); // back
  wall(Vec3A::new(-2.05, 2.0, 0.0), Vec3A::new(0.05, 2.0, 2.0), red_id); // left
  wall(Vec3A::new(2.05, 2.0, 0.0), Vec3A::new(0.05, 2.0, 2.0), green_id); // right

  // the classic pair of blocks
  wall(
    Vec3A::new(-0.7, 1.2, -0.6),
    Vec3A::new(0.55, 1.2, 0.55),
    white_id,
  );
  wall(
    Vec3A::new(0.8, 0.6, 0.6),
    Vec3A::new(0.55, 0.6, 0.55),
    white_id,
  );

  // ceiling emitter, facing down
  scene.add_light(Light::Area(AreaLight::new(
    Vec3A::new(-0.6, 3.98, -0.6),
    Vec3A::new(0.0, 0.0, 1.2),
    Vec3A::new(1.2, 0.0, 0.0),
    Vec3A::splat(12.0),
    false,
  )));

  scene.build()?;

  let mut camera = Camera::default();
  camera.set_perspective(
    Vec3A::new(0.0, 2.0, 7.5),
    -Vec3A::Z,
    Vec3A::Y,
    width as f32 / height as f32,
    50.0_f32.to_radians(),
  );
  camera.update();

  Ok((scene, camera))
}
