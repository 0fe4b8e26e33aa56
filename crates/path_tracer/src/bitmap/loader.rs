//! Image file loading: the header magic picks the decoder.
//!
//! BMP decoding is delegated to the `image` crate; DDS is parsed here because
//! block-compressed payloads stay compressed in the bitmap. Anything else
//! (EXR included) is reported as unsupported.

use std::path::Path;

use tracing::{error, info};

use crate::error::{RtError, RtResult};
use crate::utils::timer::Timer;

use super::{Bitmap, Format};

const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;

impl Bitmap {
  /// Load an image file, dispatching on the header magic.
  pub fn load(path: &Path) -> RtResult<Self> {
    let timer = Timer::start();
    let bytes = std::fs::read(path).inspect_err(|e| {
      error!(path = %path.display(), error = %e, "failed to read image file");
    })?;

    let bitmap = if bytes.starts_with(b"BM") {
      Self::load_bmp(&bytes)
    } else if bytes.starts_with(b"DDS ") {
      Self::load_dds(&bytes)
    } else {
      error!(path = %path.display(), "unrecognized image header");
      Err(RtError::UnsupportedFormat(
        "only BMP and DDS files are supported".into(),
      ))
    }?;

    info!(
      path = %path.display(),
      width = bitmap.width(),
      height = bitmap.height(),
      format = ?bitmap.format(),
      elapsed_ms = timer.elapsed_ms(),
      "bitmap loaded"
    );
    Ok(bitmap)
  }

  fn load_bmp(bytes: &[u8]) -> RtResult<Self> {
    let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Bmp)
      .map_err(|e| {
        error!(error = %e, "BMP decode failed");
        RtError::CorruptFile(format!("BMP decode failed: {e}"))
      })?
      .to_rgba8();

    let (width, height) = decoded.dimensions();
    let mut bgra = decoded.into_raw();
    for px in bgra.chunks_exact_mut(4) {
      px.swap(0, 2);
    }

    Self::init(width, height, Format::Bgra8, false, Some(&bgra))
  }

  fn load_dds(bytes: &[u8]) -> RtResult<Self> {
    if bytes.len() < 128 {
      return Err(RtError::CorruptFile("truncated DDS header".into()));
    }

    let u32_at = |o: usize| u32::from_le_bytes(bytes[o..o + 4].try_into().unwrap());

    let header_size = u32_at(4);
    if header_size != 124 {
      return Err(RtError::CorruptFile("bad DDS header size".into()));
    }
    let height = u32_at(12);
    let width = u32_at(16);

    // pixel format block starts at offset 76
    let pf_flags = u32_at(80);
    let four_cc = &bytes[84..88];
    let bit_count = u32_at(88);

    let data = &bytes[128..];

    if pf_flags & DDPF_FOURCC != 0 {
      let (format, block_bytes) = match four_cc {
        b"DXT1" => (Format::Bc1, 8usize),
        b"ATI1" | b"BC4U" => (Format::Bc4, 8),
        b"ATI2" | b"BC5U" => (Format::Bc5, 16),
        other => {
          error!(four_cc = ?other, "unsupported DDS fourCC");
          return Err(RtError::UnsupportedFormat(format!(
            "DDS fourCC {:?}",
            String::from_utf8_lossy(other)
          )));
        }
      };

      let blocks = (width.div_ceil(4) * height.div_ceil(4)) as usize;
      let payload = blocks * block_bytes;
      if data.len() < payload {
        return Err(RtError::CorruptFile("truncated DDS payload".into()));
      }
      Self::init(width, height, format, false, Some(&data[..payload]))
    } else if pf_flags & DDPF_RGB != 0 && bit_count == 32 {
      let payload = (width * height * 4) as usize;
      if data.len() < payload {
        return Err(RtError::CorruptFile("truncated DDS payload".into()));
      }
      Self::init(width, height, Format::Bgra8, false, Some(&data[..payload]))
    } else {
      Err(RtError::UnsupportedFormat(
        "uncompressed DDS must be 32-bit RGB".into(),
      ))
    }
  }
}
