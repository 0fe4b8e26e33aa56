//! Scene: object arena, top-level BVH and traversal dispatch.
//!
//! The scene is the single owner of objects, lights and materials; hot loops
//! refer to all of them by index. Per-object transforms are applied here:
//! rays are moved into object space before the object's local traversal and
//! shading frames are moved back to world space afterwards.

pub mod camera;
pub mod light;
pub mod object;

pub use light::Light;
pub use object::{SceneObject, Shape};

use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Vec2, Vec3A};
use tracing::info;

use crate::bitmap::{Bitmap, SamplingFilter};
use crate::bvh::{Bvh, BvhNode, BuildingParams, BvhBuilder};
use crate::error::RtResult;
use crate::material::{Material, MaterialId};
use crate::math::aabb::Aabb;
use crate::math::ray::Ray;
use crate::math::transcendental::{fast_acos, fast_atan2};
use crate::rendering::context::RenderingContext;
use crate::traversal::{
  HitPoint, HitPoint8, PacketTraversalContext, SimdTraversalContext, SingleTraversalContext,
  TraversableObject,
};

use object::transform_ray;

/// Scene background: constant color, optionally modulated by a spherical
/// environment texture.
#[derive(Clone, Default)]
pub struct Environment {
  pub background_color: Vec3A,
  pub texture: Option<Arc<Bitmap>>,
}

impl Environment {
  pub fn constant(color: Vec3A) -> Self {
    Self {
      background_color: color,
      texture: None,
    }
  }
}

/// World-space tangent frame, uv and material at a hit point.
#[derive(Clone, Copy, Debug)]
pub struct ShadingData {
  pub position: Vec3A,
  pub normal: Vec3A,
  pub tangent: Vec3A,
  pub bitangent: Vec3A,
  pub tex_coord: Vec2,
  pub material: MaterialId,
}

impl ShadingData {
  /// World direction into the tangent frame (normal becomes +Z).
  #[inline]
  pub fn world_to_local(&self, v: Vec3A) -> Vec3A {
    Vec3A::new(v.dot(self.tangent), v.dot(self.bitangent), v.dot(self.normal))
  }

  /// Tangent-frame direction back to world space.
  #[inline]
  pub fn local_to_world(&self, v: Vec3A) -> Vec3A {
    self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
  }
}

/// Scene container and traversal dispatcher.
pub struct Scene {
  objects: Vec<SceneObject>,
  lights: Vec<Light>,
  materials: Vec<Material>,
  default_material: Material,
  environment: Environment,
  bvh: Bvh,
  light_proxies_built: bool,
}

impl Default for Scene {
  fn default() -> Self {
    Self::new()
  }
}

impl Scene {
  pub fn new() -> Self {
    let mut default_material = Material::default();
    default_material.compile();
    Self {
      objects: Vec::new(),
      lights: Vec::new(),
      materials: Vec::new(),
      default_material,
      environment: Environment::default(),
      bvh: Bvh::new(),
      light_proxies_built: false,
    }
  }

  pub fn set_environment(&mut self, environment: Environment) {
    self.environment = environment;
  }

  pub fn environment(&self) -> &Environment {
    &self.environment
  }

  pub fn add_object(&mut self, object: SceneObject) -> u32 {
    debug_assert!(!self.light_proxies_built, "objects added after build");
    self.objects.push(object);
    self.objects.len() as u32 - 1
  }

  pub fn add_light(&mut self, light: Light) -> u32 {
    debug_assert!(!self.light_proxies_built, "lights added after build");
    self.lights.push(light);
    self.lights.len() as u32 - 1
  }

  pub fn add_material(&mut self, material: Material) -> MaterialId {
    self.materials.push(material);
    self.materials.len() as u32 - 1
  }

  #[inline]
  pub fn material(&self, id: MaterialId) -> &Material {
    self
      .materials
      .get(id as usize)
      .unwrap_or(&self.default_material)
  }

  #[inline]
  pub fn lights(&self) -> &[Light] {
    &self.lights
  }

  #[inline]
  pub fn objects(&self) -> &[SceneObject] {
    &self.objects
  }

  /// Capture world-space bounding boxes, wrap finite lights into proxy
  /// objects and build the object BVH. Must run before rendering.
  pub fn build(&mut self) -> RtResult<()> {
    if !self.light_proxies_built {
      for index in 0..self.lights.len() {
        if self.lights[index].is_finite() && !self.lights[index].is_delta() {
          self.objects.push(SceneObject::new(
            Shape::LightProxy {
              light_index: index as u32,
            },
            crate::math::transform::Transform::IDENTITY,
          ));
        }
      }
      self.light_proxies_built = true;
    }

    for material in &mut self.materials {
      material.compile();
    }

    let boxes: Vec<Aabb> = self
      .objects
      .iter()
      .map(|o| o.bounding_box(&self.lights))
      .collect();

    let (bvh, order) = BvhBuilder::build(&boxes, BuildingParams::default())?;

    // reorder objects into leaf-contiguous layout
    let mut slots: Vec<Option<SceneObject>> = self.objects.drain(..).map(Some).collect();
    self.objects = order
      .iter()
      .map(|&source| {
        slots[source as usize]
          .take()
          .expect("leaf order is a permutation")
      })
      .collect();
    self.bvh = bvh;

    info!(
      objects = self.objects.len(),
      lights = self.lights.len(),
      materials = self.materials.len(),
      "scene built"
    );
    Ok(())
  }

  // -- single-ray dispatch ------------------------------------------------

  fn traverse_object_single(&self, ctx: &mut SingleTraversalContext, object_index: u32) {
    let object = &self.objects[object_index as usize];
    let inv_transform = object.inverse_transform(ctx.context.time);

    let mut local_ctx = SingleTraversalContext {
      ray: transform_ray(&inv_transform, &ctx.ray),
      hit: &mut *ctx.hit,
      context: &mut *ctx.context,
    };
    object.traverse_single_local(&mut local_ctx, object_index, &self.lights);
  }

  fn traverse_object_shadow(&self, ctx: &mut SingleTraversalContext, object_index: u32) -> bool {
    let object = &self.objects[object_index as usize];
    let inv_transform = object.inverse_transform(ctx.context.time);

    let mut local_ctx = SingleTraversalContext {
      ray: transform_ray(&inv_transform, &ctx.ray),
      hit: &mut *ctx.hit,
      context: &mut *ctx.context,
    };
    object.traverse_shadow_local(&mut local_ctx, &self.lights)
  }

  /// Closest-hit query against the whole scene.
  pub fn traverse_single(&self, ctx: &mut SingleTraversalContext) {
    match self.objects.len() {
      0 => {}
      // bypass the BVH for a single object
      1 => self.traverse_object_single(ctx, 0),
      _ => crate::traversal::traverse_single(self, 0, ctx),
    }
  }

  /// Any-hit query against the whole scene.
  pub fn traverse_shadow(&self, ctx: &mut SingleTraversalContext) -> bool {
    match self.objects.len() {
      0 => false,
      1 => self.traverse_object_shadow(ctx, 0),
      _ => crate::traversal::traverse_shadow_single(self, ctx),
    }
  }

  /// Convenience wrapper allocating the hit point.
  pub fn intersect(&self, ray: &Ray, context: &mut RenderingContext) -> HitPoint {
    let mut hit = HitPoint::none();
    let mut ctx = SingleTraversalContext {
      ray: *ray,
      hit: &mut hit,
      context,
    };
    self.traverse_single(&mut ctx);
    hit
  }

  /// Occlusion query up to `max_distance`.
  pub fn is_occluded(&self, ray: &Ray, max_distance: f32, context: &mut RenderingContext) -> bool {
    let mut hit = HitPoint::none();
    hit.distance = max_distance;
    let mut ctx = SingleTraversalContext {
      ray: *ray,
      hit: &mut hit,
      context,
    };
    self.traverse_shadow(&mut ctx)
  }

  // -- wide dispatch ------------------------------------------------------

  /// Closest-hit query for eight coherent rays.
  pub fn traverse_simd8(&self, ctx: &mut SimdTraversalContext) {
    match self.objects.len() {
      0 => {}
      1 => self.traverse_object_simd8(ctx, 0),
      _ => crate::traversal::traverse_simd8(self, 0, ctx),
    }
  }

  fn traverse_object_simd8(&self, ctx: &mut SimdTraversalContext, object_index: u32) {
    let object = &self.objects[object_index as usize];
    let inv_transform = object.inverse_transform(ctx.context.time);

    let dir = inv_transform.transform_vector8(&ctx.ray.dir);
    let local_ray = crate::math::ray::Ray8 {
      origin: inv_transform.transform_point8(&ctx.ray.origin),
      inv_dir: dir.recip(),
      dir,
    };

    let mut local_ctx = SimdTraversalContext {
      ray: local_ray,
      hit: &mut *ctx.hit,
      context: &mut *ctx.context,
    };
    object.traverse_simd8_local(&mut local_ctx, object_index, &self.lights);
  }

  /// Closest-hit query for a whole packet; `hits` are reset first.
  pub fn traverse_packet(&self, ctx: &mut PacketTraversalContext) {
    for i in 0..ctx.packet.num_groups() as usize {
      ctx.hits[i] = HitPoint8::none();
    }
    if self.objects.is_empty() {
      return;
    }
    crate::traversal::traverse_packet(self, 0, ctx);
  }

  // -- shading ------------------------------------------------------------

  /// Background radiance along a missed ray.
  pub fn background_color(&self, ray: &Ray) -> Vec3A {
    let mut rgb = self.environment.background_color;

    if let Some(texture) = &self.environment.texture {
      let theta = fast_acos(ray.dir.y.clamp(-1.0, 1.0));
      let phi = fast_atan2(ray.dir.z, ray.dir.x);
      let uv = Vec2::new(phi / (2.0 * PI) + 0.5, theta / PI);
      let texel = texture.sample(uv, SamplingFilter::Bilinear);
      rgb *= Vec3A::new(texel.x, texel.y, texel.z);
    }

    rgb
  }

  /// Radiance of the light behind a light-proxy hit.
  pub fn light_radiance(&self, hit: &HitPoint, ray: &Ray) -> Vec3A {
    debug_assert!(hit.is_light());
    match &self.objects[hit.object_id as usize].shape {
      Shape::LightProxy { light_index } => self.lights[*light_index as usize].radiance(ray),
      _ => {
        debug_assert!(false, "light sentinel on a non-light object");
        Vec3A::ZERO
      }
    }
  }

  /// Build the world-space shading frame for a hit.
  pub fn extract_shading_data(&self, ray: &Ray, hit: &HitPoint, time: f32) -> ShadingData {
    debug_assert!(!hit.is_miss() && !hit.is_light());

    let object = &self.objects[hit.object_id as usize];
    let world_position = ray.at(hit.distance);
    let local_position = object
      .inverse_transform(time)
      .transform_point(world_position);

    let mut data = object.evaluate_shading_data(hit.triangle_id, hit.u, hit.v, local_position);

    let transform = object.transform(time);
    data.position = world_position;
    data.normal = transform.transform_vector(data.normal);
    data.tangent = transform.transform_vector(data.tangent);
    data.bitangent = transform.transform_vector(data.bitangent);
    data
  }
}

// scene as a traversable object: leaves reference scene objects
impl TraversableObject for Scene {
  fn bvh(&self) -> &Bvh {
    &self.bvh
  }

  fn traverse_leaf_single(
    &self,
    ctx: &mut SingleTraversalContext,
    _object_id: u32,
    node: &BvhNode,
  ) {
    for i in 0..node.leaf_count() {
      self.traverse_object_single(ctx, node.child_index + i);
    }
  }

  fn traverse_leaf_shadow(&self, ctx: &mut SingleTraversalContext, node: &BvhNode) -> bool {
    for i in 0..node.leaf_count() {
      if self.traverse_object_shadow(ctx, node.child_index + i) {
        return true;
      }
    }
    false
  }

  fn traverse_leaf_simd8(
    &self,
    ctx: &mut SimdTraversalContext,
    _object_id: u32,
    node: &BvhNode,
  ) {
    for i in 0..node.leaf_count() {
      self.traverse_object_simd8(ctx, node.child_index + i);
    }
  }

  fn traverse_leaf_packet(
    &self,
    ctx: &mut PacketTraversalContext,
    _object_id: u32,
    node: &BvhNode,
    num_active_groups: u32,
  ) {
    for i in 0..node.leaf_count() {
      let object_index = node.child_index + i;
      let object = &self.objects[object_index as usize];
      let inv_transform = object.inverse_transform(ctx.context.time);

      // per active group: transform into object space, then reuse the
      // 8-wide leaf logic
      for g in 0..num_active_groups as usize {
        let group_index = ctx.context.active_groups_indices[g] as usize;
        let group = &ctx.packet.groups[group_index];

        let dir = inv_transform.transform_vector8(&group.rays.dir);
        let local_ray = crate::math::ray::Ray8 {
          origin: inv_transform.transform_point8(&group.rays.origin),
          inv_dir: dir.recip(),
          dir,
        };

        let mut group_ctx = SimdTraversalContext {
          ray: local_ray,
          hit: &mut ctx.hits[group_index],
          context: &mut *ctx.context,
        };
        object.traverse_simd8_local(&mut group_ctx, object_index, &self.lights);
      }
    }
  }
}
