//! StoryTrim library
//!
//! Trims user-picked videos down to story-sized segments by playing the
//! selected range into a stream recorder, samples timeline thumbnails, keeps
//! text overlays, and records takes from a camera.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::errors::DomainError;
pub use error::{StoryTrimError, StoryTrimResult};

/// Initialize FFmpeg, including capture devices
pub fn init() -> StoryTrimResult<()> {
    ffmpeg_next::init().map_err(|e| StoryTrimError::FFmpegInitError {
        message: e.to_string(),
    })?;
    ffmpeg_next::device::register_all();
    ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Error);
    Ok(())
}
