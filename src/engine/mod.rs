//! Media engine: capture loop, rasterization and job plumbing

pub mod audio;
pub mod cancel;
pub mod progress;
pub mod raster;
pub mod scoped;
pub mod transcode;

pub use cancel::CancelToken;
pub use progress::{ProgressCallback, ProgressInfo, ProgressPhase, ProgressTracker};
pub use scoped::{Scoped, ScopedCamera, ScopedElement};
