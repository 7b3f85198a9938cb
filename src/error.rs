//! Error types surfaced by the allocator and the pass driver.

use thiserror::Error;

/// Failure to obtain backing memory for an arena.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("out of memory: failed to allocate a {bytes} byte arena block")]
    OutOfMemory { bytes: usize },

    #[error("arena request of {bytes} bytes overflows the allocator layout")]
    LayoutOverflow { bytes: usize },
}

pub type ArenaResult<T> = Result<T, ArenaError>;

/// Errors reported to whoever drives a render.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("a render is already in progress on this session")]
    AlreadyInProgress,

    #[error("no surface integrator was installed")]
    MissingIntegrator,

    #[error("integrator '{integrator}' failed to preprocess the scene")]
    PreprocessFailed { integrator: String },

    #[error("scratch memory exhausted while rendering: {0}")]
    Arena(#[from] ArenaError),

    #[error("could not build the render thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write the rendered image: {0}")]
    Image(#[from] image::ImageError),
}
