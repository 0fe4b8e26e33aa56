//! Piecewise-constant 1D distribution for importance sampling.

use tracing::error;

use crate::error::{RtError, RtResult};

/// Piecewise-constant PDF with its normalized CDF.
///
/// Built once from a vector of non-negative weights; used for
/// importance-sampling environment textures and light choices.
pub struct Distribution {
  pdf: Vec<f32>,
  cdf: Vec<f32>,
}

impl Distribution {
  pub fn new(weights: &[f32]) -> RtResult<Self> {
    if weights.is_empty() {
      error!("cannot build a distribution from an empty weight vector");
      return Err(RtError::EmptyDistribution);
    }

    let mut cdf = Vec::with_capacity(weights.len() + 1);
    let mut accumulated = 0.0f32;
    cdf.push(0.0);
    for &w in weights {
      debug_assert!(w.is_finite(), "corrupted distribution weight");
      if w < 0.0 || !w.is_finite() {
        error!("distribution weight must be finite and non-negative");
        return Err(RtError::InvalidArgument("negative distribution weight".into()));
      }
      accumulated += w;
      cdf.push(accumulated);
    }

    if accumulated <= 0.0 {
      error!("distribution weights sum to zero");
      return Err(RtError::EmptyDistribution);
    }

    let cdf_norm = 1.0 / accumulated;
    let pdf_norm = cdf_norm * weights.len() as f32;
    for c in cdf.iter_mut() {
      *c *= cdf_norm;
    }
    let pdf = weights.iter().map(|w| w * pdf_norm).collect();

    Ok(Self { pdf, cdf })
  }

  #[inline]
  pub fn size(&self) -> usize {
    self.pdf.len()
  }

  #[inline]
  pub fn pdf(&self, index: usize) -> f32 {
    self.pdf[index]
  }

  /// Sample a bucket index given a uniform `u` in `[0, 1)`; returns the
  /// index and its PDF value.
  pub fn sample_discrete(&self, u: f32) -> (usize, f32) {
    // binary search for the last cdf entry <= u
    let mut low = 0usize;
    let mut high = self.pdf.len();
    while low < high {
      let mid = (low + high) / 2;
      if u >= self.cdf[mid] {
        low = mid + 1;
      } else {
        high = mid;
      }
    }
    let offset = low.saturating_sub(1).min(self.pdf.len() - 1);
    (offset, self.pdf[offset])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::math::random::Random;

  #[test]
  fn empty_input_is_rejected() {
    assert!(Distribution::new(&[]).is_err());
    assert!(Distribution::new(&[0.0, 0.0]).is_err());
  }

  #[test]
  fn sampling_respects_weights() {
    let dist = Distribution::new(&[1.0, 0.0, 3.0]).unwrap();
    let mut rng = Random::with_seed(11);
    let mut counts = [0usize; 3];
    let n = 100_000;
    for _ in 0..n {
      let (i, pdf) = dist.sample_discrete(rng.f32());
      assert!(pdf > 0.0);
      counts[i] += 1;
    }
    assert_eq!(counts[1], 0);
    let p0 = counts[0] as f32 / n as f32;
    assert!((p0 - 0.25).abs() < 0.01, "p0 = {p0}");
  }

  #[test]
  fn pdf_is_normalized() {
    let dist = Distribution::new(&[2.0, 2.0, 2.0, 2.0]).unwrap();
    for i in 0..4 {
      assert!((dist.pdf(i) - 1.0).abs() < 1.0e-6);
    }
  }

  #[test]
  fn extreme_u_values_stay_in_range() {
    let dist = Distribution::new(&[1.0, 2.0]).unwrap();
    assert!(dist.sample_discrete(0.0).0 < 2);
    assert!(dist.sample_discrete(0.999_999).0 < 2);
  }
}
