// Adapters - External system implementations

pub mod ffmpeg_camera;
pub mod ffmpeg_capture;
pub mod ffmpeg_media;
pub mod toml_config;

// Re-export adapters
pub use ffmpeg_camera::FfmpegCameraAdapter;
pub use ffmpeg_capture::FfmpegCaptureAdapter;
pub use ffmpeg_media::FfmpegPlaybackAdapter;
pub use toml_config::TomlConfigAdapter;
