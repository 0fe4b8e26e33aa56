//! Separable box blur and the 3-pass gaussian approximation used by bloom.

use glam::Vec4;
use tracing::error;

use crate::error::{RtError, RtResult};

use super::{Bitmap, Format};

// Per-pass box widths approximating a gaussian of `sigma`, following
// Ivan Kutskir's derivation: w_ideal = sqrt(12 sigma^2 / n + 1).
fn boxes_for_gauss(sigma: f32, passes: u32) -> Vec<u32> {
  let n = passes as f32;
  let w_ideal = (12.0 * sigma * sigma / n + 1.0).sqrt();
  let mut wl = w_ideal.floor() as u32;
  if wl % 2 == 0 {
    wl = wl.saturating_sub(1);
  }
  let wl = wl.max(1);
  let wu = wl + 2;

  let wl_f = wl as f32;
  let m_ideal = (12.0 * sigma * sigma - n * wl_f * wl_f - 4.0 * n * wl_f - 3.0 * n)
    / (-4.0 * wl_f - 4.0);
  let m = m_ideal.round().clamp(0.0, n) as u32;

  (0..passes).map(|i| if i < m { wl } else { wu }).collect()
}

fn check_blur_targets(dst: &Bitmap, src: &Bitmap) -> RtResult<()> {
  if dst.format() != Format::Rgba32F || src.format() != Format::Rgba32F {
    error!("blur requires Rgba32F bitmaps");
    return Err(RtError::InvalidBitmap("blur requires Rgba32F".into()));
  }
  if dst.width() != src.width() || dst.height() != src.height() {
    error!("blur size mismatch");
    return Err(RtError::InvalidBitmap("blur size mismatch".into()));
  }
  Ok(())
}

/// Horizontal box blur of width `2 * radius + 1` with clamp-to-edge rows.
pub fn blur_horizontal(dst: &mut Bitmap, src: &Bitmap, radius: u32) -> RtResult<()> {
  check_blur_targets(dst, src)?;

  let width = src.width() as i64;
  let norm = 1.0 / (2 * radius + 1) as f32;
  let r = radius as i64;

  let mut line = vec![Vec4::ZERO; width as usize];
  for y in 0..src.height() {
    src.read_scanline(y, &mut line);

    let fetch = |x: i64| line[x.clamp(0, width - 1) as usize];

    // sliding window
    let mut sum = Vec4::ZERO;
    for x in -r..=r {
      sum += fetch(x);
    }

    let mut out = vec![Vec4::ZERO; width as usize];
    for x in 0..width {
      out[x as usize] = sum * norm;
      sum += fetch(x + r + 1) - fetch(x - r);
    }
    dst.write_scanline(y, &out);
  }
  Ok(())
}

/// Vertical box blur of width `2 * radius + 1` with clamp-to-edge columns.
pub fn blur_vertical(dst: &mut Bitmap, src: &Bitmap, radius: u32) -> RtResult<()> {
  check_blur_targets(dst, src)?;

  let width = src.width() as usize;
  let height = src.height() as i64;
  let norm = 1.0 / (2 * radius + 1) as f32;
  let r = radius as i64;

  let mut rows: Vec<Vec<Vec4>> = Vec::with_capacity(src.height() as usize);
  for y in 0..src.height() {
    let mut line = vec![Vec4::ZERO; width];
    src.read_scanline(y, &mut line);
    rows.push(line);
  }

  let fetch = |y: i64, x: usize| rows[y.clamp(0, height - 1) as usize][x];

  let mut sums = vec![Vec4::ZERO; width];
  for y in -r..=r {
    for (x, sum) in sums.iter_mut().enumerate() {
      *sum += fetch(y, x);
    }
  }

  let mut out = vec![Vec4::ZERO; width];
  for y in 0..height {
    for x in 0..width {
      out[x] = sums[x] * norm;
      sums[x] += fetch(y + r + 1, x) - fetch(y - r, x);
    }
    dst.write_scanline(y as u32, &out);
  }
  Ok(())
}

/// Gaussian-approximating blur: `passes` iterations of a separable box blur
/// with widths chosen by [`boxes_for_gauss`]. `scratch` must match the
/// source size and format.
pub fn gaussian_blur(
  dst: &mut Bitmap,
  scratch: &mut Bitmap,
  src: &Bitmap,
  sigma: f32,
  passes: u32,
) -> RtResult<()> {
  check_blur_targets(dst, src)?;
  check_blur_targets(scratch, src)?;

  Bitmap::copy(dst, src)?;

  for width in boxes_for_gauss(sigma, passes.max(1)) {
    let radius = (width - 1) / 2;
    blur_horizontal(scratch, dst, radius)?;
    blur_vertical(dst, scratch, radius)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn constant_bitmap(value: Vec4, w: u32, h: u32) -> Bitmap {
    let mut bmp = Bitmap::init(w, h, Format::Rgba32F, true, None).unwrap();
    for y in 0..h {
      for x in 0..w {
        bmp.set_pixel(x, y, value);
      }
    }
    bmp
  }

  #[test]
  fn box_widths_are_odd_and_grow_with_sigma() {
    for sigma in [0.5, 1.0, 3.0, 8.0] {
      let widths = boxes_for_gauss(sigma, 3);
      assert_eq!(widths.len(), 3);
      for w in &widths {
        assert!(w % 2 == 1, "width {w} not odd");
      }
    }
    assert!(boxes_for_gauss(8.0, 3)[0] > boxes_for_gauss(1.0, 3)[0]);
  }

  #[test]
  fn blur_preserves_constant_images() {
    let src = constant_bitmap(Vec4::new(0.25, 0.5, 0.75, 1.0), 16, 16);
    let mut dst = constant_bitmap(Vec4::ZERO, 16, 16);
    let mut scratch = constant_bitmap(Vec4::ZERO, 16, 16);

    gaussian_blur(&mut dst, &mut scratch, &src, 2.0, 3).unwrap();

    let c = dst.get(8, 8, true);
    assert!((c - Vec4::new(0.25, 0.5, 0.75, 1.0)).abs().max_element() < 1.0e-4);
  }

  #[test]
  fn blur_spreads_impulse_but_preserves_energy() {
    let mut src = constant_bitmap(Vec4::ZERO, 33, 33);
    src.set_pixel(16, 16, Vec4::new(100.0, 0.0, 0.0, 0.0));
    let mut dst = constant_bitmap(Vec4::ZERO, 33, 33);
    let mut scratch = constant_bitmap(Vec4::ZERO, 33, 33);

    gaussian_blur(&mut dst, &mut scratch, &src, 2.0, 3).unwrap();

    let center = dst.get(16, 16, true).x;
    let neighbor = dst.get(18, 16, true).x;
    assert!(center < 100.0 && center > neighbor && neighbor > 0.0);

    let mut total = 0.0;
    for y in 0..33 {
      for x in 0..33 {
        total += dst.get(x, y, true).x;
      }
    }
    // interior impulse: energy preserved up to edge clamping
    assert!((total - 100.0).abs() < 1.0, "total = {total}");
  }

  #[test]
  fn mismatched_formats_are_rejected() {
    let src = constant_bitmap(Vec4::ZERO, 8, 8);
    let mut dst = Bitmap::init(8, 8, Format::Bgra8, false, None).unwrap();
    assert!(blur_horizontal(&mut dst, &src, 1).is_err());
  }
}
