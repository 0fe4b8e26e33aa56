//! Polynomial approximations vs libm.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use path_tracer::math::transcendental;

fn bench_sin(c: &mut Criterion) {
  let inputs: Vec<f32> = (0..1024)
    .map(|i| -3.1 + 6.2 * (i as f32) / 1024.0)
    .collect();

  let mut group = c.benchmark_group("sin");
  group.bench_function("fast_sin", |b| {
    b.iter(|| {
      let mut acc = 0.0f32;
      for &x in &inputs {
        acc += transcendental::fast_sin(black_box(x));
      }
      acc
    })
  });
  group.bench_function("std_sin", |b| {
    b.iter(|| {
      let mut acc = 0.0f32;
      for &x in &inputs {
        acc += black_box(x).sin();
      }
      acc
    })
  });
  group.finish();
}

fn bench_log_exp(c: &mut Criterion) {
  let inputs: Vec<f32> = (1..1025).map(|i| i as f32 * 0.37).collect();

  let mut group = c.benchmark_group("log_exp");
  group.bench_function("fast_log", |b| {
    b.iter(|| {
      let mut acc = 0.0f32;
      for &x in &inputs {
        acc += transcendental::fast_log(black_box(x));
      }
      acc
    })
  });
  group.bench_function("std_ln", |b| {
    b.iter(|| {
      let mut acc = 0.0f32;
      for &x in &inputs {
        acc += black_box(x).ln();
      }
      acc
    })
  });
  group.bench_function("fast_exp", |b| {
    b.iter(|| {
      let mut acc = 0.0f32;
      for &x in &inputs {
        acc += transcendental::fast_exp(black_box(x * 0.01));
      }
      acc
    })
  });
  group.finish();
}

criterion_group!(benches, bench_sin, bench_log_exp);
criterion_main!(benches);
