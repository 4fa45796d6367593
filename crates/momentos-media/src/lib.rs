//! Image optimization for gallery uploads.
//!
//! Provides the [`ImageOptimizer`] seam and a JPEG implementation that
//! downscales to a maximum edge and recompresses at a given quality.

pub mod error;
pub mod optimizer;

pub use error::{MediaError, MediaResult};
pub use optimizer::{ImageOptimizer, JpegOptimizer, OptimizeOptions, OptimizedImage};
