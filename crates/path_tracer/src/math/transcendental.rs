//! Polynomial approximations of transcendental functions.
//!
//! Accuracy on the intervals the renderer actually uses:
//!
//! - `fast_sin` / `fast_cos`: < 5.0e-7 absolute on -PI..PI
//! - `fast_asin` / `fast_acos`: < 2.0e-7 absolute on -1..1
//! - `fast_exp`: < 0.2% relative
//! - `fast_log`: < 0.07% relative
//! - `log`: < 2.0e-7 relative

use std::f32::consts::{FRAC_PI_2, PI};
use std::simd::num::{SimdFloat, SimdInt};
use std::simd::{f32x8, i32x8, StdFloat};

/// Sine via a 6-term odd polynomial with PI-periodic range reduction.
pub fn fast_sin(x: f32) -> f32 {
  // range reduction to -PI/2..PI/2
  let i = (x * (1.0 / PI)).round() as i32;
  let x = x - (i as f32) * PI;

  let x2 = x * x;

  const C0: f32 = 9.999_997e-1;
  const C1: f32 = -1.666_657_8e-1;
  const C2: f32 = 8.332_558e-3;
  const C3: f32 = -1.981_257_7e-4;
  const C4: f32 = 2.704_052e-6;
  const C5: f32 = -2.053_299e-8;

  let y = x * (C0 + x2 * (C1 + x2 * (C2 + x2 * (C3 + x2 * (C4 + x2 * C5)))));

  if i & 1 != 0 {
    -y
  } else {
    y
  }
}

#[inline]
pub fn fast_cos(x: f32) -> f32 {
  fast_sin(x + FRAC_PI_2)
}

/// `(sin x, cos x)` in one call.
#[inline]
pub fn fast_sin_cos(x: f32) -> (f32, f32) {
  (fast_sin(x), fast_sin(x + FRAC_PI_2))
}

/// 8-wide counterpart of [`fast_sin`].
pub fn fast_sin_8(x: f32x8) -> f32x8 {
  let i = (x * f32x8::splat(1.0 / PI)).round().cast::<i32>();
  let x = x - i.cast::<f32>() * f32x8::splat(PI);

  let x2 = x * x;

  let mut y = f32x8::splat(-2.053_299e-8);
  y = y.mul_add(x2, f32x8::splat(2.704_052e-6));
  y = y.mul_add(x2, f32x8::splat(-1.981_257_7e-4));
  y = y.mul_add(x2, f32x8::splat(8.332_558e-3));
  y = y.mul_add(x2, f32x8::splat(-1.666_657_8e-1));
  y = y.mul_add(x2, f32x8::splat(9.999_997e-1));
  y *= x;

  // negate odd half-periods via the sign bit
  let sign = (i & i32x8::splat(1)) << i32x8::splat(31);
  f32x8::from_bits(y.to_bits() ^ sign.cast::<u32>())
}

// acos(|x|), DirectXMath-style 7-term polynomial times sqrt(1 - |x|)
fn acos_abs(x: f32) -> f32 {
  let x = x.abs();
  let root = (1.0 - x).max(0.0).sqrt();

  const C0: f32 = 1.570_796_3;
  const C1: f32 = -0.214_598_8;
  const C2: f32 = 0.088_978_99;
  const C3: f32 = -0.050_174_305;
  const C4: f32 = 0.030_891_88;
  const C5: f32 = -0.017_088_126;
  const C6: f32 = 0.006_670_09;
  const C7: f32 = -0.001_262_491_1;

  root * (C0 + x * (C1 + x * (C2 + x * (C3 + x * (C4 + x * (C5 + x * (C6 + x * C7)))))))
}

pub fn fast_acos(x: f32) -> f32 {
  let a = acos_abs(x);
  // acos(x) = pi - acos(-x) for x < 0
  if x >= 0.0 {
    a
  } else {
    PI - a
  }
}

pub fn fast_asin(x: f32) -> f32 {
  let a = acos_abs(x);
  if x >= 0.0 {
    FRAC_PI_2 - a
  } else {
    a - FRAC_PI_2
  }
}

/// Arctangent via an 8-term minimax polynomial on 0..1 with reciprocal
/// range reduction.
pub fn fast_atan(x: f32) -> f32 {
  let t = x.abs();
  let z = if t > 1.0 { 1.0 / t } else { t };

  let x2 = z * z;
  let mut y = 2.785_698_3e-3;
  y = y * x2 - 1.586_602_3e-2;
  y = y * x2 + 4.247_223e-2;
  y = y * x2 - 7.497_531e-2;
  y = y * x2 + 1.064_488e-1;
  y = y * x2 - 1.420_703e-1;
  y = y * x2 + 1.999_345_4e-1;
  y = y * x2 - 3.333_314_7e-1;
  y *= x2;
  y = y * z + z;

  // atan(x) = pi/2 - atan(1/x)
  if t > 1.0 {
    y = FRAC_PI_2 - y;
  }

  y.copysign(x)
}

pub fn fast_atan2(y: f32, x: f32) -> f32 {
  if x == 0.0 && y == 0.0 {
    return 0.0;
  }
  let a = fast_atan(y / x);
  if x >= 0.0 {
    a
  } else if y >= 0.0 {
    a + PI
  } else {
    a - PI
  }
}

/// Exponential based on njuffa's performance-competitive expf.
pub fn fast_exp(x: f32) -> f32 {
  if x >= 87.0 {
    return f32::INFINITY;
  }
  if x <= -87.0 {
    return 0.0;
  }

  let t = x * std::f32::consts::LOG2_E;
  let fi = t.floor();
  let i = fi as i32;
  let f = t - fi;

  let p = (0.337_189_43 * f + 0.657_636_3) * f + 1.001_724_8;
  f32::from_bits((p.to_bits() as i32).wrapping_add(i << 23) as u32)
}

// shared range reduction for the natural-log variants
#[inline]
fn log_reduce(x: f32) -> (f32, f32) {
  let e = (x.to_bits() as i32).wrapping_sub(0x3f2a_aaab) & 0xff80_0000u32 as i32;
  let m = f32::from_bits(((x.to_bits() as i32).wrapping_sub(e)) as u32);
  let i = 1.192_092_9e-7 * e as f32;
  (m - 1.0, i)
}

/// Natural logarithm, near-full float precision.
pub fn log(x: f32) -> f32 {
  let (f, i) = log_reduce(x);
  let s = f * f;

  // log1p(f) for f in [-1/3, 1/3]
  let mut r = -0.130_187_99 * f + 0.140_889_58;
  let t = -0.121_489_584 * f + 0.139_809_53;
  r = r * s + t;
  r = r * f - 0.166_845_02;
  r = r * f + 0.200_121_15;
  r = r * f - 0.249_996_364;
  r = r * f + 0.333_331_94;
  r = r * f - 0.5;
  r = r * s + f;
  i * std::f32::consts::LN_2 + r
}

/// Cheaper natural logarithm with a shorter polynomial.
pub fn fast_log(x: f32) -> f32 {
  let (f, i) = log_reduce(x);
  let s = f * f;

  let mut r = 0.230_836_75 * f - 0.279_208_57;
  let t = 0.331_826_03 * f - 0.498_910_34;
  r = r * s + t;
  r = r * s + f;
  i * std::f32::consts::LN_2 + r
}

#[cfg(test)]
#[path = "transcendental_test.rs"]
mod transcendental_test;
