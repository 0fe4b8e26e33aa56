//! Tone mapping and display postprocessing.

use glam::Vec3A;

/// Display transfer curve choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tonemapper {
  /// Hard clip to [0, 1] followed by the sRGB transfer.
  Clamped,
  /// `c / (1 + c)` followed by the sRGB transfer.
  Reinhard,
  /// Hejl-Burgess-Dawson filmic fit (output is already display-ready).
  #[default]
  Filmic,
  /// ACES fit followed by the sRGB transfer.
  Aces,
}

/// Postprocess parameter block.
#[derive(Clone, Copy, Debug)]
pub struct PostprocessParams {
  /// Per-channel multiplier applied after tonemapping.
  pub color_filter: Vec3A,
  /// Exposure in stops; the linear scale is `2^exposure`.
  pub exposure: f32,
  /// 0 = grayscale, 1 = unchanged.
  pub saturation: f32,
  /// 1 = unchanged; applied around mid-gray.
  pub contrast: f32,
  /// Dithering noise amplitude in display space.
  pub noise_strength: f32,
  /// Bloom mix-in factor; zero disables the blur pass entirely.
  pub bloom_strength: f32,
  /// Gaussian sigma of the bloom blur, in pixels.
  pub bloom_size: f32,
  pub tonemapper: Tonemapper,
}

impl Default for PostprocessParams {
  fn default() -> Self {
    Self {
      color_filter: Vec3A::ONE,
      exposure: 0.0,
      saturation: 1.0,
      contrast: 1.0,
      noise_strength: 0.004,
      bloom_strength: 0.0,
      bloom_size: 8.0,
      tonemapper: Tonemapper::default(),
    }
  }
}

// square-root approximation of the linear -> sRGB transfer; the inverse of
// the square approximation used on texture reads
#[inline]
fn linear_to_srgb_approx(c: Vec3A) -> Vec3A {
  Vec3A::new(c.x.max(0.0).sqrt(), c.y.max(0.0).sqrt(), c.z.max(0.0).sqrt())
}

/// Map linear HDR radiance to a display color in [0, 1].
pub fn tonemap(color: Vec3A, tonemapper: Tonemapper) -> Vec3A {
  let mapped = match tonemapper {
    Tonemapper::Clamped => linear_to_srgb_approx(color.clamp(Vec3A::ZERO, Vec3A::ONE)),
    Tonemapper::Reinhard => {
      let c = color.max(Vec3A::ZERO);
      linear_to_srgb_approx(c / (Vec3A::ONE + c))
    }
    Tonemapper::Filmic => {
      // Jim Hejl and Richard Burgess-Dawson fit with the 0.004 black clip
      let c = (color - Vec3A::splat(0.004)).max(Vec3A::ZERO);
      (c * (6.2 * c + Vec3A::splat(0.5))) / (c * (6.2 * c + Vec3A::splat(1.7)) + Vec3A::splat(0.06))
    }
    Tonemapper::Aces => {
      let c = color.max(Vec3A::ZERO);
      let mapped =
        (c * (2.51 * c + Vec3A::splat(0.03))) / (c * (2.43 * c + Vec3A::splat(0.59)) + Vec3A::splat(0.14));
      linear_to_srgb_approx(mapped)
    }
  };
  mapped.clamp(Vec3A::ZERO, Vec3A::ONE)
}

/// Full display pipeline for one pixel: exposure, tonemap, grade, dither.
/// Output is clamped into [0, 1].
pub fn apply(color: Vec3A, params: &PostprocessParams, dither: Vec3A) -> Vec3A {
  let exposed = color * params.exposure.exp2();
  let mut c = tonemap(exposed, params.tonemapper);

  c *= params.color_filter;

  if params.saturation != 1.0 {
    let luminance = c.dot(Vec3A::new(0.2126, 0.7152, 0.0722));
    c = Vec3A::splat(luminance).lerp(c, params.saturation);
  }
  if params.contrast != 1.0 {
    c = Vec3A::splat(0.5) + (c - Vec3A::splat(0.5)) * params.contrast;
  }

  (c + dither * params.noise_strength).clamp(Vec3A::ZERO, Vec3A::ONE)
}
