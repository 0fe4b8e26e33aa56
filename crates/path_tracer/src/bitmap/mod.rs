//! 2D image container used for render targets and textures.
//!
//! Storage is row-major, tightly packed and cache-line aligned. Block
//! compressed formats (BC1/BC4/BC5) stay compressed in memory and are decoded
//! on read.

pub mod block_compression;
pub mod blur;
mod loader;

pub use blur::{blur_horizontal, blur_vertical, gaussian_blur};

use glam::{Vec2, Vec4};
use half::f16;
use tracing::error;

use crate::error::{RtError, RtResult};
use crate::math::smoothstep;
use crate::utils::aligned::AlignedBuffer;

/// Largest accepted width/height.
pub const MAX_BITMAP_SIZE: u32 = 8192;

/// Pixel format of a [`Bitmap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
  R8,
  Bgr8,
  Bgra8,
  Rgb16F,
  Rgba16F,
  Rgb32F,
  Rgba32F,
  /// 4x4 blocks, 8 bytes each, RGB + 1-bit alpha.
  Bc1,
  /// 4x4 blocks, 8 bytes each, single channel.
  Bc4,
  /// 4x4 blocks, 16 bytes each, two channels.
  Bc5,
}

impl Format {
  /// Bits per pixel (block formats average their block size).
  pub fn bits_per_pixel(&self) -> u32 {
    match self {
      Format::R8 => 8,
      Format::Bgr8 => 24,
      Format::Bgra8 => 32,
      Format::Rgb16F => 48,
      Format::Rgba16F => 64,
      Format::Rgb32F => 96,
      Format::Rgba32F => 128,
      Format::Bc1 => 4,
      Format::Bc4 => 4,
      Format::Bc5 => 8,
    }
  }

  pub fn is_block_compressed(&self) -> bool {
    matches!(self, Format::Bc1 | Format::Bc4 | Format::Bc5)
  }

  /// Whether reads should be treated as HDR linear data regardless of the
  /// bitmap's linear flag.
  fn is_float(&self) -> bool {
    matches!(
      self,
      Format::Rgb16F | Format::Rgba16F | Format::Rgb32F | Format::Rgba32F
    )
  }
}

/// Texture sampling filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SamplingFilter {
  Nearest,
  #[default]
  Bilinear,
  /// Bilinear with smoothstep-shaped fractions.
  BilinearSmoothstep,
}

// square approximation of the sRGB EOTF
#[inline]
fn srgb_to_linear_approx(c: Vec4) -> Vec4 {
  Vec4::new(c.x * c.x, c.y * c.y, c.z * c.z, c.w)
}

/// 2D pixel container.
pub struct Bitmap {
  data: AlignedBuffer,
  width: u32,
  height: u32,
  format: Format,
  linear_space: bool,
}

impl Bitmap {
  /// An empty 0x0 bitmap (reads are invalid, writes impossible).
  pub fn empty() -> Self {
    Self {
      data: AlignedBuffer::new(0).expect("zero-size alloc"),
      width: 0,
      height: 0,
      format: Format::Rgba32F,
      linear_space: true,
    }
  }

  /// Allocate a bitmap. `initial` (if given) must match the computed data
  /// size exactly. On error the returned bitmap is not created and the
  /// failure is logged.
  pub fn init(
    width: u32,
    height: u32,
    format: Format,
    linear_space: bool,
    initial: Option<&[u8]>,
  ) -> RtResult<Self> {
    if width == 0 || height == 0 || width > MAX_BITMAP_SIZE || height > MAX_BITMAP_SIZE {
      error!(width, height, "invalid bitmap size");
      return Err(RtError::InvalidBitmap(format!(
        "invalid size {width}x{height}"
      )));
    }
    if format.is_block_compressed() && (width % 4 != 0 || height % 4 != 0) {
      error!(width, height, "block compressed sizes must be multiples of 4");
      return Err(RtError::InvalidBitmap(
        "block compressed size must be a multiple of 4".into(),
      ));
    }

    let data_size = (width as usize * height as usize * format.bits_per_pixel() as usize) / 8;
    let mut data = AlignedBuffer::new(data_size)?;

    if let Some(bytes) = initial {
      if bytes.len() != data_size {
        error!(
          expected = data_size,
          got = bytes.len(),
          "initial data size mismatch"
        );
        return Err(RtError::InvalidBitmap("initial data size mismatch".into()));
      }
      data.as_mut_slice().copy_from_slice(bytes);
    }

    Ok(Self {
      data,
      width,
      height,
      format,
      linear_space,
    })
  }

  #[inline]
  pub fn width(&self) -> u32 {
    self.width
  }

  #[inline]
  pub fn height(&self) -> u32 {
    self.height
  }

  #[inline]
  pub fn format(&self) -> Format {
    self.format
  }

  #[inline]
  pub fn is_linear_space(&self) -> bool {
    self.linear_space
  }

  #[inline]
  pub fn data(&self) -> &[u8] {
    self.data.as_slice()
  }

  #[inline]
  pub fn data_mut(&mut self) -> &mut [u8] {
    self.data.as_mut_slice()
  }

  /// Zero all pixel bytes.
  pub fn clear(&mut self) {
    self.data.clear();
  }

  /// Copy `source` into `target`; sizes and formats must match.
  pub fn copy(target: &mut Bitmap, source: &Bitmap) -> RtResult<()> {
    if target.width != source.width
      || target.height != source.height
      || target.format != source.format
    {
      error!("bitmap copy size/format mismatch");
      return Err(RtError::InvalidBitmap("copy size/format mismatch".into()));
    }
    target
      .data
      .as_mut_slice()
      .copy_from_slice(source.data.as_slice());
    Ok(())
  }

  // raw (no color-space conversion) texel fetch
  fn get_raw(&self, x: u32, y: u32) -> Vec4 {
    debug_assert!(x < self.width && y < self.height, "texel out of bounds");
    let data = self.data.as_slice();
    let w = self.width as usize;
    let (x, y) = (x as usize, y as usize);

    match self.format {
      Format::R8 => {
        let v = data[y * w + x] as f32 / 255.0;
        Vec4::new(v, v, v, 1.0)
      }
      Format::Bgr8 => {
        let o = (y * w + x) * 3;
        Vec4::new(
          data[o + 2] as f32 / 255.0,
          data[o + 1] as f32 / 255.0,
          data[o] as f32 / 255.0,
          1.0,
        )
      }
      Format::Bgra8 => {
        let o = (y * w + x) * 4;
        Vec4::new(
          data[o + 2] as f32 / 255.0,
          data[o + 1] as f32 / 255.0,
          data[o] as f32 / 255.0,
          data[o + 3] as f32 / 255.0,
        )
      }
      Format::Rgb16F => {
        let o = (y * w + x) * 6;
        let h = |i: usize| f16::from_le_bytes([data[o + i], data[o + i + 1]]).to_f32();
        Vec4::new(h(0), h(2), h(4), 1.0)
      }
      Format::Rgba16F => {
        let o = (y * w + x) * 8;
        let h = |i: usize| f16::from_le_bytes([data[o + i], data[o + i + 1]]).to_f32();
        Vec4::new(h(0), h(2), h(4), h(6))
      }
      Format::Rgb32F => {
        let o = (y * w + x) * 12;
        let f = |i: usize| f32::from_le_bytes(data[o + i..o + i + 4].try_into().unwrap());
        Vec4::new(f(0), f(4), f(8), 1.0)
      }
      Format::Rgba32F => {
        let o = (y * w + x) * 16;
        let f = |i: usize| f32::from_le_bytes(data[o + i..o + i + 4].try_into().unwrap());
        Vec4::new(f(0), f(4), f(8), f(12))
      }
      Format::Bc1 => {
        let blocks_per_row = (w / 4).max(1);
        let block = ((y / 4) * blocks_per_row + x / 4) * 8;
        block_compression::decode_bc1_texel(
          data[block..block + 8].try_into().unwrap(),
          x % 4,
          y % 4,
        )
      }
      Format::Bc4 => {
        let blocks_per_row = (w / 4).max(1);
        let block = ((y / 4) * blocks_per_row + x / 4) * 8;
        block_compression::decode_bc4_texel(
          data[block..block + 8].try_into().unwrap(),
          x % 4,
          y % 4,
        )
      }
      Format::Bc5 => {
        let blocks_per_row = (w / 4).max(1);
        let block = ((y / 4) * blocks_per_row + x / 4) * 16;
        block_compression::decode_bc5_texel(
          data[block..block + 16].try_into().unwrap(),
          x % 4,
          y % 4,
        )
      }
    }
  }

  /// Fetch one texel, converting into linear space unless the bitmap is
  /// already linear or `force_linear` requests raw values.
  #[inline]
  pub fn get(&self, x: u32, y: u32, force_linear: bool) -> Vec4 {
    let c = self.get_raw(x, y);
    if self.linear_space || force_linear || self.format.is_float() {
      c
    } else {
      srgb_to_linear_approx(c)
    }
  }

  /// The four texels of a bilinear quad: `(x0, y0), (x1, y0), (x0, y1),
  /// (x1, y1)`.
  pub fn get_block(
    &self,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    force_linear: bool,
  ) -> [Vec4; 4] {
    [
      self.get(x0, y0, force_linear),
      self.get(x1, y0, force_linear),
      self.get(x0, y1, force_linear),
      self.get(x1, y1, force_linear),
    ]
  }

  /// Sample the bitmap at `uv` with wrap addressing.
  pub fn sample(&self, uv: Vec2, filter: SamplingFilter) -> Vec4 {
    debug_assert!(self.width > 0 && self.height > 0, "sampling empty bitmap");

    // wrap uv into [0, 1)
    let uv = uv - uv.floor();
    let size = Vec2::new(self.width as f32, self.height as f32);
    let coords = uv * size;

    let wrap = |v: i64, n: u32| -> u32 { (v.rem_euclid(n as i64)) as u32 };

    match filter {
      SamplingFilter::Nearest => {
        let x = (coords.x as u32).min(self.width - 1);
        let y = (coords.y as u32).min(self.height - 1);
        self.get(x, y, false)
      }
      SamplingFilter::Bilinear | SamplingFilter::BilinearSmoothstep => {
        let coords = coords - Vec2::splat(0.5);
        let base = coords.floor();
        let mut frac = coords - base;
        if filter == SamplingFilter::BilinearSmoothstep {
          frac = Vec2::new(smoothstep(frac.x), smoothstep(frac.y));
        }

        let x0 = wrap(base.x as i64, self.width);
        let x1 = wrap(base.x as i64 + 1, self.width);
        let y0 = wrap(base.y as i64, self.height);
        let y1 = wrap(base.y as i64 + 1, self.height);

        let [c00, c10, c01, c11] = self.get_block(x0, y0, x1, y1, false);
        let top = c00.lerp(c10, frac.x);
        let bottom = c01.lerp(c11, frac.x);
        top.lerp(bottom, frac.y)
      }
    }
  }

  /// Write one pixel of an `Rgba32F` bitmap.
  #[inline]
  pub fn set_pixel(&mut self, x: u32, y: u32, value: Vec4) {
    debug_assert_eq!(self.format, Format::Rgba32F);
    debug_assert!(x < self.width && y < self.height);
    let o = (y as usize * self.width as usize + x as usize) * 16;
    let bytes = self.data.as_mut_slice();
    for (i, c) in value.to_array().iter().enumerate() {
      bytes[o + i * 4..o + i * 4 + 4].copy_from_slice(&c.to_le_bytes());
    }
  }

  /// Add into one pixel of an `Rgba32F` bitmap.
  #[inline]
  pub fn add_pixel(&mut self, x: u32, y: u32, value: Vec4) {
    let current = self.get_raw(x, y);
    self.set_pixel(x, y, current + value);
  }

  /// Read a horizontal line of an `Rgba32F` bitmap into `out`.
  pub fn read_scanline(&self, y: u32, out: &mut [Vec4]) {
    debug_assert_eq!(self.format, Format::Rgba32F);
    debug_assert!(out.len() >= self.width as usize);
    let row = self.row_f32(y);
    for (x, pixel) in out.iter_mut().take(self.width as usize).enumerate() {
      *pixel = Vec4::from_slice(&row[x * 4..x * 4 + 4]);
    }
  }

  /// Write a horizontal line of an `Rgba32F` bitmap from `values`.
  pub fn write_scanline(&mut self, y: u32, values: &[Vec4]) {
    debug_assert_eq!(self.format, Format::Rgba32F);
    debug_assert!(values.len() >= self.width as usize);
    let width = self.width as usize;
    let row = self.row_f32_mut(y);
    for (x, value) in values.iter().take(width).enumerate() {
      row[x * 4..x * 4 + 4].copy_from_slice(&value.to_array());
    }
  }

  pub(crate) fn row_f32(&self, y: u32) -> &[f32] {
    debug_assert!(matches!(self.format, Format::Rgba32F));
    let stride = self.width as usize * 4;
    let bytes = &self.data.as_slice()[y as usize * stride * 4..(y as usize + 1) * stride * 4];
    bytemuck::cast_slice(bytes)
  }

  pub(crate) fn row_f32_mut(&mut self, y: u32) -> &mut [f32] {
    debug_assert!(matches!(self.format, Format::Rgba32F));
    let stride = self.width as usize * 4;
    let bytes =
      &mut self.data.as_mut_slice()[y as usize * stride * 4..(y as usize + 1) * stride * 4];
    bytemuck::cast_slice_mut(bytes)
  }
}
