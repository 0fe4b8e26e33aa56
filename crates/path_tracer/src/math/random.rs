//! Pseudo-random source for Monte-Carlo sampling.
//!
//! The scalar stream is xoroshiro128+; the 4-wide and 8-wide streams run
//! xorshift128+ in independent 64-bit lanes so a whole `f32x8` of uniforms
//! comes out of one step. Each rendering thread owns its own `Random`, so no
//! state is ever shared.

use std::f32::consts::PI;
use std::simd::num::SimdFloat;
use std::simd::{f32x8, u32x8, u64x2, u64x4, StdFloat};

use glam::{Vec2, Vec3A, Vec4};

use super::simd::Vec2x8;
use super::transcendental::{fast_log, fast_sin_8, fast_sin_cos};

#[inline(always)]
fn rotl64(x: u64, k: u32) -> u64 {
  (x << k) | (x >> (64 - k))
}

// splitmix64, used to expand small seeds into full state
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
  *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
  let mut z = *state;
  z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
  z ^ (z >> 31)
}

// [1, 2) from 23 mantissa bits, shifted down to [0, 1)
#[inline(always)]
fn mantissa_to_unit(bits: u32) -> f32 {
  f32::from_bits((bits & 0x007f_ffff) | 0x3f80_0000) - 1.0
}

// [2, 4) from 23 mantissa bits, shifted down to [-1, 1)
#[inline(always)]
fn mantissa_to_bipolar(bits: u32) -> f32 {
  f32::from_bits((bits & 0x007f_ffff) | 0x4000_0000) - 3.0
}

/// Per-thread pseudo-random number generator.
pub struct Random {
  state: [u64; 2],
  state4: [u64x2; 2],
  state8: [u64x4; 2],
}

impl Random {
  /// A generator seeded from the platform CSPRNG.
  pub fn new() -> Self {
    let mut rng = Self {
      state: [0; 2],
      state4: [u64x2::splat(0); 2],
      state8: [u64x4::splat(0); 2],
    };
    rng.reset();
    rng
  }

  /// A generator with a deterministic state derived from `seed`.
  pub fn with_seed(seed: u64) -> Self {
    let mut rng = Self {
      state: [0; 2],
      state4: [u64x2::splat(0); 2],
      state8: [u64x4::splat(0); 2],
    };
    rng.seed(seed);
    rng
  }

  /// Reseed all streams from the platform CSPRNG. Streams reset this way
  /// are independent across threads.
  pub fn reset(&mut self) {
    let mut bytes = [0u8; 16 * (1 + 2 + 4)];
    // getrandom only fails on broken platforms; fall back to a fixed seed
    // so rendering still proceeds
    if getrandom::fill(&mut bytes).is_err() {
      self.seed(0x9e37_79b9_7f4a_7c15);
      return;
    }

    let mut words = bytes
      .chunks_exact(8)
      .map(|c| u64::from_le_bytes(c.try_into().unwrap()));
    let mut next = || words.next().unwrap();

    self.state = [next(), next()];
    self.state4 = [
      u64x2::from_array([next(), next()]),
      u64x2::from_array([next(), next()]),
    ];
    self.state8 = [
      u64x4::from_array([next(), next(), next(), next()]),
      u64x4::from_array([next(), next(), next(), next()]),
    ];
  }

  /// Deterministically derive all stream states from a single word.
  pub fn seed(&mut self, seed: u64) {
    let mut s = seed;
    let mut next = || splitmix64(&mut s);

    self.state = [next(), next()];
    self.state4 = [
      u64x2::from_array([next(), next()]),
      u64x2::from_array([next(), next()]),
    ];
    self.state8 = [
      u64x4::from_array([next(), next(), next(), next()]),
      u64x4::from_array([next(), next(), next(), next()]),
    ];
  }

  /// xoroshiro128+ step.
  #[inline]
  pub fn u64(&mut self) -> u64 {
    let s0 = self.state[0];
    let mut s1 = self.state[1];
    let result = s0.wrapping_add(s1);

    s1 ^= s0;
    self.state[0] = rotl64(s0, 24) ^ s1 ^ (s1 << 16);
    self.state[1] = rotl64(s1, 37);

    result
  }

  #[inline]
  pub fn u32(&mut self) -> u32 {
    self.u64() as u32
  }

  /// Uniform float in `[0, 1)`.
  #[inline]
  pub fn f32(&mut self) -> f32 {
    mantissa_to_unit(self.u32())
  }

  /// Uniform float in `[-1, 1)`.
  #[inline]
  pub fn f32_bipolar(&mut self) -> f32 {
    mantissa_to_bipolar(self.u32())
  }

  // xorshift128+ over two 64-bit lanes; one step yields four 32-bit values
  #[inline]
  fn step4(&mut self) -> [u32; 4] {
    let mut s1 = self.state4[0];
    let s0 = self.state4[1];
    let result = s0 + s1;
    self.state4[0] = s0;
    s1 ^= s1 << u64x2::splat(23);
    self.state4[1] = s1 ^ s0 ^ (s1 >> u64x2::splat(18)) ^ (s0 >> u64x2::splat(5));

    let lanes = result.to_array();
    [
      lanes[0] as u32,
      (lanes[0] >> 32) as u32,
      lanes[1] as u32,
      (lanes[1] >> 32) as u32,
    ]
  }

  // xorshift128+ over four 64-bit lanes; one step yields eight 32-bit values
  #[inline]
  fn step8(&mut self) -> u32x8 {
    let mut s1 = self.state8[0];
    let s0 = self.state8[1];
    let result = s0 + s1;
    self.state8[0] = s0;
    s1 ^= s1 << u64x4::splat(23);
    self.state8[1] = s1 ^ s0 ^ (s1 >> u64x4::splat(18)) ^ (s0 >> u64x4::splat(5));

    let lanes = result.to_array();
    u32x8::from_array([
      lanes[0] as u32,
      (lanes[0] >> 32) as u32,
      lanes[1] as u32,
      (lanes[1] >> 32) as u32,
      lanes[2] as u32,
      (lanes[2] >> 32) as u32,
      lanes[3] as u32,
      (lanes[3] >> 32) as u32,
    ])
  }

  /// Four uniform floats in `[0, 1)` from the 4-wide stream.
  #[inline]
  pub fn vec4(&mut self) -> Vec4 {
    let v = self.step4();
    Vec4::new(
      mantissa_to_unit(v[0]),
      mantissa_to_unit(v[1]),
      mantissa_to_unit(v[2]),
      mantissa_to_unit(v[3]),
    )
  }

  /// Four uniform floats in `[-1, 1)`.
  #[inline]
  pub fn vec4_bipolar(&mut self) -> Vec4 {
    let v = self.step4();
    Vec4::new(
      mantissa_to_bipolar(v[0]),
      mantissa_to_bipolar(v[1]),
      mantissa_to_bipolar(v[2]),
      mantissa_to_bipolar(v[3]),
    )
  }

  #[inline]
  pub fn vec2(&mut self) -> Vec2 {
    let v = self.step4();
    Vec2::new(mantissa_to_unit(v[0]), mantissa_to_unit(v[1]))
  }

  /// Eight uniform floats in `[0, 1)` from the 8-wide stream.
  #[inline]
  pub fn f32x8(&mut self) -> f32x8 {
    let v = self.step8();
    let bits = (v & u32x8::splat(0x007f_ffff)) | u32x8::splat(0x3f80_0000);
    f32x8::from_bits(bits) - f32x8::splat(1.0)
  }

  /// Eight uniform floats in `[-1, 1)`.
  #[inline]
  pub fn f32x8_bipolar(&mut self) -> f32x8 {
    let v = self.step8();
    let bits = (v & u32x8::splat(0x007f_ffff)) | u32x8::splat(0x4000_0000);
    f32x8::from_bits(bits) - f32x8::splat(3.0)
  }

  /// Uniform-area point on the unit disk.
  #[inline]
  pub fn disk(&mut self) -> Vec2 {
    let v = self.vec2();
    let theta = 2.0 * PI * v.x;
    let r = v.y.sqrt();
    let (sin, cos) = fast_sin_cos(theta);
    Vec2::new(r * cos, r * sin)
  }

  /// Eight uniform-area points on the unit disk.
  #[inline]
  pub fn disk_8(&mut self) -> Vec2x8 {
    let theta = f32x8::splat(2.0 * PI) * self.f32x8();
    let r = self.f32x8().sqrt();
    let sin = fast_sin_8(theta);
    let cos = fast_sin_8(theta + f32x8::splat(PI * 0.5));
    Vec2x8::new(r * cos, r * sin)
  }

  /// Uniform point inside a unit hexagon.
  pub fn hexagon(&mut self) -> Vec2 {
    const HEX_VECTORS: [Vec2; 4] = [
      Vec2::new(-1.0, 0.0),
      Vec2::new(0.5, 0.866_025_4),
      Vec2::new(0.5, -0.866_025_4),
      Vec2::new(-1.0, 0.0),
    ];

    let u = self.vec2();
    let i = (self.u32() % 3) as usize;
    HEX_VECTORS[i] * u.x + HEX_VECTORS[i + 1] * u.y
  }

  /// Uniform-area point on the unit sphere.
  #[inline]
  pub fn sphere(&mut self) -> Vec3A {
    // http://mathworld.wolfram.com/SpherePointPicking.html
    let u = self.vec4_bipolar();
    let t = (1.0 - u.y * u.y).max(0.0).sqrt();
    let theta = PI * u.x;
    let (sin, cos) = fast_sin_cos(theta);
    Vec3A::new(t * cos, t * sin, u.y)
  }

  /// Uniform-area point on the upper (`z >= 0`) hemisphere.
  #[inline]
  pub fn hemisphere(&mut self) -> Vec3A {
    let mut p = self.sphere();
    p.z = p.z.abs();
    p
  }

  /// Cosine-weighted direction on the upper hemisphere.
  #[inline]
  pub fn hemisphere_cos(&mut self) -> Vec3A {
    let u = self.vec2();
    let theta = 2.0 * PI * u.y;
    let r = u.x.sqrt();
    let (sin, cos) = fast_sin_cos(theta);
    Vec3A::new(r * cos, r * sin, (1.0 - u.x).max(0.0).sqrt())
  }

  /// Uniform barycentric coordinates on a triangle.
  #[inline]
  pub fn triangle(&mut self) -> Vec2 {
    let uv = self.vec2();
    let u = uv.x.sqrt();
    Vec2::new(1.0 - u, uv.y * u)
  }

  /// Two independent standard-normal values (Box-Muller).
  #[inline]
  pub fn normal2(&mut self) -> Vec2 {
    let uv = self.vec2();
    let r = (-2.0 * fast_log(uv.x.max(f32::MIN_POSITIVE))).sqrt();
    let (sin, cos) = fast_sin_cos(2.0 * PI * uv.y);
    Vec2::new(r * cos, r * sin)
  }
}

impl Default for Random {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
#[path = "random_test.rs"]
mod random_test;
