// FFmpeg camera adapter - Camera devices through libavdevice

use async_trait::async_trait;
use ffmpeg_next as ffmpeg;
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::engine::transcode::open_device;
use crate::ports::*;

/// Acquires cameras named in the camera configuration
pub struct FfmpegCameraAdapter {
    config: CameraConfig,
}

impl FfmpegCameraAdapter {
    /// Create new camera adapter
    pub fn new(config: CameraConfig) -> Result<Self, DomainError> {
        Ok(Self { config })
    }

}

/// Device url for `facing`, with the microphone folded in where the input
/// format can open both from one url. Returns whether audio was included.
fn device_input(config: &CameraConfig, facing: CameraFacing) -> (String, bool) {
    let camera = match facing {
        CameraFacing::Front => config.front_camera.clone(),
        CameraFacing::Back => config.back_camera.clone(),
    };
    let microphone = config.microphone.trim();
    if microphone.is_empty() {
        return (camera, false);
    }
    match config.camera_format.as_str() {
        "avfoundation" => (format!("{}:{}", camera, microphone), true),
        "dshow" => (format!("{}:audio={}", camera, microphone), true),
        other => {
            warn!(
                format = other,
                microphone, "Microphone cannot be opened with this camera format; recording without audio"
            );
            (camera, false)
        }
    }
}

/// Open and immediately close the device to surface access errors early
fn probe_device(format_name: &str, url: &str) -> Result<(), DomainError> {
    match open_device(format_name, url) {
        Ok(_) => Ok(()),
        Err(ffmpeg::Error::Other { errno })
            if std::io::Error::from_raw_os_error(errno).kind()
                == std::io::ErrorKind::PermissionDenied =>
        {
            Err(DomainError::PermissionDenied(format!(
                "Access to camera {} was refused",
                url
            )))
        }
        Err(e) => Err(DomainError::CaptureFailure(format!(
            "Failed to open camera {} ({}): {}",
            url, format_name, e
        ))),
    }
}

#[async_trait]
impl CameraPort for FfmpegCameraAdapter {
    async fn acquire(&self, facing: CameraFacing) -> Result<Box<dyn CameraHandle>, DomainError> {
        let (url, has_audio) = device_input(&self.config, facing);
        let format = self.config.camera_format.clone();

        let (format, url) = tokio::task::spawn_blocking(move || {
            probe_device(&format, &url).map(|_| (format, url))
        })
        .await
        .map_err(|e| DomainError::InternalError(format!("Camera probe failed: {}", e)))??;

        info!(?facing, %url, has_audio, "Camera acquired");
        Ok(Box::new(FfmpegCameraHandle {
            facing,
            format,
            url,
            has_audio,
            released: false,
        }))
    }
}

/// Acquired camera device
pub struct FfmpegCameraHandle {
    facing: CameraFacing,
    format: String,
    url: String,
    has_audio: bool,
    released: bool,
}

impl CameraHandle for FfmpegCameraHandle {
    fn facing(&self) -> CameraFacing {
        self.facing
    }

    fn capture_stream(&self) -> Result<CaptureStream, DomainError> {
        if self.released {
            return Err(DomainError::InvalidState("Camera was released".to_string()));
        }
        Ok(CaptureStream {
            source: StreamSource::Device {
                format: self.format.clone(),
                url: self.url.clone(),
            },
            has_audio: self.has_audio,
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            debug!(url = %self.url, "Camera released");
        }
    }
}
