//! Hash grid for fixed-radius neighbor queries.
//!
//! Groundwork for photon-map style lookups: points are binned into a
//! power-of-two hash table over cells of `2 * radius`, so a query only has to
//! visit a 2x2x2 cell neighborhood.

use glam::Vec3A;
use tracing::info;

use crate::math::aabb::Aabb;
use crate::utils::timer::Timer;

pub struct HashGrid {
  bounds: Aabb,
  radius_sqr: f32,
  inv_cell_size: f32,
  hash_table_mask: u32,
  // prefix-summed bucket boundaries; bucket h spans
  // cell_ends[h-1]..cell_ends[h] (0.. for the first bucket)
  cell_ends: Vec<u32>,
  indices: Vec<u32>,
}

#[inline]
fn hash_cell(x: i32, y: i32, z: i32, mask: u32) -> u32 {
  let h = (x as u32).wrapping_mul(73_856_093)
    ^ (y as u32).wrapping_mul(19_349_663)
    ^ (z as u32).wrapping_mul(83_492_791);
  h & mask
}

impl HashGrid {
  /// Build the grid over `points` for queries of exactly `radius`.
  pub fn build(points: &[Vec3A], radius: f32) -> Self {
    let timer = Timer::start();

    let cell_size = radius * 2.0;
    let inv_cell_size = 1.0 / cell_size;

    let mut bounds = Aabb::empty();
    for &p in points {
      bounds.add_point(p);
    }

    let hash_table_size = (points.len().max(1) as u32).next_power_of_two();
    let hash_table_mask = hash_table_size - 1;

    let mut grid = Self {
      bounds,
      radius_sqr: radius * radius,
      inv_cell_size,
      hash_table_mask,
      cell_ends: vec![0; hash_table_size as usize],
      indices: vec![0; points.len()],
    };

    // count per bucket
    for &p in points {
      let cell = grid.cell_index_of(p) as usize;
      grid.cell_ends[cell] += 1;
    }

    // exclusive prefix sum turns counts into bucket starts
    let mut sum = 0;
    for end in grid.cell_ends.iter_mut() {
      let count = *end;
      *end = sum;
      sum += count;
    }

    // fill; each insert advances its bucket start toward the bucket end
    for (i, &p) in points.iter().enumerate() {
      let cell = grid.cell_index_of(p) as usize;
      grid.indices[grid.cell_ends[cell] as usize] = i as u32;
      grid.cell_ends[cell] += 1;
    }

    info!(
      points = points.len(),
      table_size = hash_table_size,
      elapsed_ms = timer.elapsed_ms(),
      "hash grid built"
    );

    grid
  }

  #[inline]
  pub fn bounds(&self) -> &Aabb {
    &self.bounds
  }

  #[inline]
  fn cell_index_of(&self, p: Vec3A) -> u32 {
    let rel = (p - self.bounds.min) * self.inv_cell_size;
    hash_cell(
      rel.x.floor() as i32,
      rel.y.floor() as i32,
      rel.z.floor() as i32,
      self.hash_table_mask,
    )
  }

  /// Invoke `visit` with the index of every point within the build radius of
  /// `query`.
  pub fn for_each_neighbor(
    &self,
    query: Vec3A,
    points: &[Vec3A],
    mut visit: impl FnMut(u32),
  ) {
    if self.indices.is_empty() {
      return;
    }

    let rel = (query - self.bounds.min) * self.inv_cell_size;
    // the -0.5 shift reduces the search from 3x3x3 to 2x2x2 cells
    let base = (rel - Vec3A::splat(0.5)).floor();
    let (bx, by, bz) = (base.x as i32, base.y as i32, base.z as i32);

    let mut visited = [u32::MAX; 8];
    let mut num_visited = 0;

    for dz in 0..2 {
      for dy in 0..2 {
        for dx in 0..2 {
          let cell = hash_cell(bx + dx, by + dy, bz + dz, self.hash_table_mask);
          if visited[..num_visited].contains(&cell) {
            continue;
          }
          visited[num_visited] = cell;
          num_visited += 1;

          let start = if cell == 0 {
            0
          } else {
            self.cell_ends[cell as usize - 1]
          };
          let end = self.cell_ends[cell as usize];
          for &index in &self.indices[start as usize..end as usize] {
            let d = points[index as usize] - query;
            if d.length_squared() <= self.radius_sqr {
              visit(index);
            }
          }
        }
      }
    }
  }
}

#[cfg(test)]
#[path = "hash_grid_test.rs"]
mod hash_grid_test;
