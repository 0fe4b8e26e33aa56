//! Rendering: per-thread contexts, the path integrator, postprocessing and
//! the tiled parallel viewport.

pub mod context;
pub mod integrator;
pub mod postprocess;
pub mod thread_pool;
pub mod viewport;

pub use context::{RayTracingCounters, RaytracingParams, RenderingContext};
pub use postprocess::{PostprocessParams, Tonemapper};
pub use thread_pool::ThreadPool;
pub use viewport::{FrameStats, RenderingMode, Viewport};
