//! Persistent worker pool for tile rendering.
//!
//! One worker per hardware thread, started once and joined on drop. The
//! submitter publishes a single task function plus the tile grid dimensions;
//! workers compete for `(x, y)` tile coordinates under the pool mutex and
//! the submitter blocks until the outstanding-tile counter reaches zero.
//! The lock is uncontended enough that a lock-free queue would buy nothing.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// `(tile_x, tile_y, thread_id)` callback run for every tile.
pub type ParallelTask<'a> = &'a (dyn Fn(u32, u32, u32) + Sync);

// lifetime-erased task pointer; sound because run_parallel_task does not
// return until every tile completed (the barrier below)
type ErasedTask = &'static (dyn Fn(u32, u32, u32) + Sync);

struct PoolState {
  task: Option<ErasedTask>,
  rows: u32,
  columns: u32,
  current_x: u32,
  current_y: u32,
  tiles_left: u32,
  finishing: bool,
}

struct Shared {
  state: Mutex<PoolState>,
  new_task: Condvar,
  tiles_finished: Condvar,
}

/// Tile-parallel thread pool.
pub struct ThreadPool {
  shared: Arc<Shared>,
  threads: Vec<JoinHandle<()>>,
}

impl ThreadPool {
  /// Spawn one worker per hardware thread.
  pub fn new() -> Self {
    let num_threads = std::thread::available_parallelism()
      .map(|n| n.get())
      .unwrap_or(1);
    Self::with_threads(num_threads)
  }

  pub fn with_threads(num_threads: usize) -> Self {
    let shared = Arc::new(Shared {
      state: Mutex::new(PoolState {
        task: None,
        rows: 0,
        columns: 0,
        current_x: 0,
        current_y: 0,
        tiles_left: 0,
        finishing: false,
      }),
      new_task: Condvar::new(),
      tiles_finished: Condvar::new(),
    });

    let threads = (0..num_threads.max(1))
      .map(|id| {
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || worker_loop(&shared, id as u32))
      })
      .collect();

    Self { shared, threads }
  }

  #[inline]
  pub fn num_threads(&self) -> usize {
    self.threads.len()
  }

  /// Run `task` for every tile of a `columns x rows` grid and block until
  /// all tiles completed.
  pub fn run_parallel_task(&self, task: ParallelTask, rows: u32, columns: u32) {
    if rows == 0 || columns == 0 {
      return;
    }

    let mut state = self.shared.state.lock().unwrap();
    debug_assert!(state.tiles_left == 0, "previous task still running");

    // SAFETY: the barrier below outlives every use of the reference
    state.task = Some(unsafe { std::mem::transmute::<ParallelTask<'_>, ErasedTask>(task) });
    state.rows = rows;
    state.columns = columns;
    state.current_x = 0;
    state.current_y = 0;
    state.tiles_left = rows * columns;

    self.shared.new_task.notify_all();

    while state.tiles_left > 0 {
      state = self.shared.tiles_finished.wait(state).unwrap();
    }
    state.task = None;
  }
}

impl Default for ThreadPool {
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for ThreadPool {
  fn drop(&mut self) {
    {
      let mut state = self.shared.state.lock().unwrap();
      state.finishing = true;
      self.shared.new_task.notify_all();
    }
    for handle in self.threads.drain(..) {
      let _ = handle.join();
    }
  }
}

fn worker_loop(shared: &Shared, thread_id: u32) {
  loop {
    let (task, x, y) = {
      let mut state = shared.state.lock().unwrap();
      // wait for work or shutdown
      while !state.finishing && (state.rows == 0 || state.columns == 0) {
        state = shared.new_task.wait(state).unwrap();
      }
      if state.finishing {
        return;
      }

      let x = state.current_x;
      let y = state.current_y;
      state.current_x += 1;
      if state.current_x >= state.columns {
        state.current_x = 0;
        state.current_y += 1;
      }
      // last tile claimed: stop handing out work
      if state.current_y >= state.rows {
        state.rows = 0;
        state.columns = 0;
      }

      (state.task.expect("task published with the grid"), x, y)
    };

    task(x, y, thread_id);

    let mut state = shared.state.lock().unwrap();
    state.tiles_left -= 1;
    if state.tiles_left == 0 {
      shared.tiles_finished.notify_all();
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  #[test]
  fn all_tiles_run_exactly_once() {
    let pool = ThreadPool::with_threads(4);
    let grid: Vec<AtomicU32> = (0..8 * 6).map(|_| AtomicU32::new(0)).collect();

    let task = |x: u32, y: u32, _thread: u32| {
      grid[(y * 8 + x) as usize].fetch_add(1, Ordering::Relaxed);
    };
    pool.run_parallel_task(&task, 6, 8);

    for cell in &grid {
      assert_eq!(cell.load(Ordering::Relaxed), 1);
    }
  }

  #[test]
  fn pool_is_reusable() {
    let pool = ThreadPool::with_threads(2);
    let counter = AtomicU32::new(0);

    let task = |_x: u32, _y: u32, _t: u32| {
      counter.fetch_add(1, Ordering::Relaxed);
    };
    pool.run_parallel_task(&task, 4, 4);
    pool.run_parallel_task(&task, 4, 4);

    assert_eq!(counter.load(Ordering::Relaxed), 32);
  }

  #[test]
  fn thread_ids_are_in_range() {
    let pool = ThreadPool::with_threads(3);
    let seen = Mutex::new(Vec::new());

    let task = |_x: u32, _y: u32, thread: u32| {
      seen.lock().unwrap().push(thread);
    };
    pool.run_parallel_task(&task, 10, 10);

    for &id in seen.lock().unwrap().iter() {
      assert!(id < 3);
    }
  }

  #[test]
  fn empty_grid_returns_immediately() {
    let pool = ThreadPool::with_threads(2);
    let task = |_x: u32, _y: u32, _t: u32| panic!("must not run");
    pool.run_parallel_task(&task, 0, 5);
    pool.run_parallel_task(&task, 5, 0);
  }

  #[test]
  fn drop_joins_workers() {
    let pool = ThreadPool::with_threads(2);
    drop(pool);
  }
}
