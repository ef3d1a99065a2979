// Ports - Interface definitions (contracts)

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::errors::*;
use crate::domain::model::*;
use async_trait::async_trait;

/// Port for opening detached playback elements
#[async_trait]
pub trait PlaybackPort: Send + Sync {
    /// Load a source into a fresh element; resolves once metadata is known
    async fn open(&self, source: &MediaSource) -> Result<Box<dyn MediaElement>, DomainError>;
}

/// A playing (or paused) media element
#[async_trait]
pub trait MediaElement: Send {
    /// Metadata known since load
    fn metadata(&self) -> MediaMetadata;

    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Seek; resolves when the seek has settled
    async fn seek(&mut self, time: f64) -> Result<(), DomainError>;

    /// Start or resume playback
    async fn play(&mut self) -> Result<(), DomainError>;

    /// Pause playback
    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Rasterize the frame at the current position
    async fn snapshot(&mut self) -> Result<RgbaFrame, DomainError>;

    /// Live stream of what the element renders from the current position
    fn capture_stream(&self) -> Result<CaptureStream, DomainError>;

    /// Free decoder state and backing buffers; idempotent
    fn release(&mut self);
}

/// Where a capture stream pulls frames from
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSource {
    /// Rendered output of an element playing a file from `start`
    File { path: PathBuf, start: f64 },
    /// Live capture device
    Device { format: String, url: String },
}

/// Live media stream handed to a recorder
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureStream {
    pub source: StreamSource,
    pub has_audio: bool,
}

/// Options passed when creating a recorder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecorderOptions {
    /// `None` lets the recorder pick its own default
    pub format: Option<CaptureFormat>,
    pub video_bits_per_second: Option<u64>,
}

/// Port for capability probing and recorder creation
pub trait CapturePort: Send + Sync {
    /// Whether a recorder can produce this MIME type
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Build a recorder on a stream; rejected options yield `BadArgs`
    fn create_recorder(
        &self,
        stream: CaptureStream,
        options: RecorderOptions,
    ) -> Result<Box<dyn StreamRecorder>, DomainError>;
}

/// Streaming recorder buffering encoded chunks
#[async_trait]
pub trait StreamRecorder: Send {
    /// Format actually produced
    fn format(&self) -> &CaptureFormat;

    fn state(&self) -> RecorderState;

    /// Begin recording, flushing a chunk every `timeslice`
    async fn start(&mut self, timeslice: Duration) -> Result<(), DomainError>;

    /// Stop and finalize; returns buffered chunks in order
    async fn stop(&mut self) -> Result<Vec<Vec<u8>>, DomainError>;
}

/// Port for camera acquisition
#[async_trait]
pub trait CameraPort: Send + Sync {
    /// Acquire a camera; denial yields `PermissionDenied`
    async fn acquire(&self, facing: CameraFacing) -> Result<Box<dyn CameraHandle>, DomainError>;
}

/// An acquired camera
pub trait CameraHandle: Send {
    fn facing(&self) -> CameraFacing;

    fn capture_stream(&self) -> Result<CaptureStream, DomainError>;

    /// Stop every track; idempotent
    fn release(&mut self);
}

/// Port for configuration management
#[async_trait]
pub trait ConfigPort: Send + Sync {
    /// Current effective configuration
    async fn get_config(&self) -> Result<EditorConfig, DomainError>;

    /// Get a single value by key
    async fn get_value(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Set a single value by key
    async fn set_value(&self, key: &str, value: &str) -> Result<(), DomainError>;

    /// Load configuration from file
    async fn load_config(&self, file_path: &str) -> Result<(), DomainError>;

    /// Save configuration to file
    async fn save_config(&self, file_path: &str) -> Result<(), DomainError>;

    /// Validate configuration
    async fn validate_config(&self) -> Result<(), DomainError>;

    /// Get configuration file path
    async fn get_config_file_path(&self) -> Result<String, DomainError>;
}
