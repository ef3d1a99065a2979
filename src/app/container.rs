use std::sync::Arc;

use crate::adapters::{FfmpegCameraAdapter, FfmpegCaptureAdapter, FfmpegPlaybackAdapter};
use crate::app::{EditSession, RecordSession, RecordSettings, ThumbnailSampler};
use crate::domain::errors::DomainError;
use crate::domain::model::{CameraFacing, EditorConfig};
use crate::ports::{CameraPort, CapturePort, PlaybackPort};

pub trait AppContainer: Send + Sync {
    fn config(&self) -> &EditorConfig;
    fn playback_port(&self) -> Arc<dyn PlaybackPort>;
    fn capture_port(&self) -> Arc<dyn CapturePort>;
    fn camera_port(&self) -> Arc<dyn CameraPort>;

    fn edit_session(&self) -> EditSession {
        EditSession::new(self.playback_port(), self.capture_port(), self.config().clone())
    }

    fn thumbnail_sampler(&self) -> ThumbnailSampler {
        ThumbnailSampler::from_config(self.playback_port(), self.config())
    }

    fn record_session(&self, facing: CameraFacing) -> RecordSession {
        RecordSession::spawn(
            self.camera_port(),
            self.capture_port(),
            RecordSettings::from_config(self.config()),
            facing,
        )
    }
}

pub struct DefaultAppContainer {
    config: EditorConfig,
    playback_port: Arc<dyn PlaybackPort>,
    capture_port: Arc<dyn CapturePort>,
    camera_port: Arc<dyn CameraPort>,
}

impl DefaultAppContainer {
    /// FFmpeg-backed adapters over an already resolved configuration
    pub fn new(config: EditorConfig) -> Result<Self, DomainError> {
        config.validate()?;
        let playback_port = Arc::new(FfmpegPlaybackAdapter::new()?);
        let capture_port = Arc::new(FfmpegCaptureAdapter::new()?);
        let camera_port = Arc::new(FfmpegCameraAdapter::new(config.camera.clone())?);

        Ok(Self::with_ports(
            config,
            playback_port as Arc<dyn PlaybackPort>,
            capture_port as Arc<dyn CapturePort>,
            camera_port as Arc<dyn CameraPort>,
        ))
    }

    /// Container over caller-supplied ports
    pub fn with_ports(
        config: EditorConfig,
        playback_port: Arc<dyn PlaybackPort>,
        capture_port: Arc<dyn CapturePort>,
        camera_port: Arc<dyn CameraPort>,
    ) -> Self {
        Self {
            config,
            playback_port,
            capture_port,
            camera_port,
        }
    }
}

impl AppContainer for DefaultAppContainer {
    fn config(&self) -> &EditorConfig {
        &self.config
    }

    fn playback_port(&self) -> Arc<dyn PlaybackPort> {
        Arc::clone(&self.playback_port)
    }

    fn capture_port(&self) -> Arc<dyn CapturePort> {
        Arc::clone(&self.capture_port)
    }

    fn camera_port(&self) -> Arc<dyn CameraPort> {
        Arc::clone(&self.camera_port)
    }
}
