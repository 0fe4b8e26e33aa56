//! Error type shared across the tracing core.
//!
//! Input validation failures are reported through [`RtError`] and leave the
//! target object untouched; callers decide whether to continue with a default
//! resource. Programmer errors (invalid indices, impossible branches) are
//! `debug_assert!`s instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtError {
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("invalid bitmap: {0}")]
  InvalidBitmap(String),

  #[error("unsupported format: {0}")]
  UnsupportedFormat(String),

  #[error("invalid mesh descriptor: {0}")]
  InvalidMesh(String),

  #[error("distribution requires at least one non-negative weight")]
  EmptyDistribution,

  #[error("allocation of {0} bytes failed")]
  AllocationFailed(usize),

  #[error("corrupt file: {0}")]
  CorruptFile(String),

  #[error("file version mismatch (found {found})")]
  VersionMismatch { found: u32 },

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

pub type RtResult<T> = Result<T, RtError>;
