//! In-memory ports for driving the editor without FFmpeg or devices

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use storytrim::domain::errors::DomainError;
use storytrim::domain::model::*;
use storytrim::ports::*;

/// Counters shared between a fake port and the elements it hands out
#[derive(Default)]
pub struct PlaybackStats {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub snapshots: AtomicUsize,
}

pub struct FakePlayback {
    pub metadata: MediaMetadata,
    pub fail_open: bool,
    pub fail_play: bool,
    /// Snapshots taken at or after this time fail
    pub snapshot_fails_from: Option<f64>,
    pub stats: Arc<PlaybackStats>,
}

impl FakePlayback {
    pub fn new(duration: f64) -> Self {
        Self {
            metadata: MediaMetadata {
                duration_seconds: duration,
                width: 1080,
                height: 1920,
                has_audio: true,
            },
            fail_open: false,
            fail_play: false,
            snapshot_fails_from: None,
            stats: Arc::new(PlaybackStats::default()),
        }
    }
}

#[async_trait]
impl PlaybackPort for FakePlayback {
    async fn open(&self, source: &MediaSource) -> Result<Box<dyn MediaElement>, DomainError> {
        if self.fail_open {
            return Err(DomainError::UnsupportedSource(format!(
                "cannot decode {}",
                source.name
            )));
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeElement {
            metadata: self.metadata,
            position: 0.0,
            playing_since: None,
            fail_play: self.fail_play,
            snapshot_fails_from: self.snapshot_fails_from,
            stats: Arc::clone(&self.stats),
            released: false,
        }))
    }
}

/// Element whose clock follows tokio time while playing
pub struct FakeElement {
    metadata: MediaMetadata,
    position: f64,
    playing_since: Option<Instant>,
    fail_play: bool,
    snapshot_fails_from: Option<f64>,
    stats: Arc<PlaybackStats>,
    released: bool,
}

impl FakeElement {
    fn fold_clock(&mut self) {
        self.position = self.current_time();
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    fn metadata(&self) -> MediaMetadata {
        self.metadata
    }

    fn current_time(&self) -> f64 {
        let played = self
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.position + played).min(self.metadata.duration_seconds)
    }

    async fn seek(&mut self, time: f64) -> Result<(), DomainError> {
        self.fold_clock();
        self.position = time.clamp(0.0, self.metadata.duration_seconds);
        Ok(())
    }

    async fn play(&mut self) -> Result<(), DomainError> {
        if self.fail_play {
            return Err(DomainError::ProcessingError("playback blocked".to_string()));
        }
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.fold_clock();
        self.playing_since = None;
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none()
    }

    async fn snapshot(&mut self) -> Result<RgbaFrame, DomainError> {
        let time = self.current_time();
        if self.snapshot_fails_from.is_some_and(|from| time >= from) {
            return Err(DomainError::ProcessingError(format!("no frame at {}", time)));
        }
        self.stats.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(RgbaFrame {
            width: 4,
            height: 4,
            data: [200u8, 40, 40, 255].repeat(16),
        })
    }

    fn capture_stream(&self) -> Result<CaptureStream, DomainError> {
        Ok(CaptureStream {
            source: StreamSource::File {
                path: PathBuf::from("fake.mp4"),
                start: self.current_time(),
            },
            has_audio: self.metadata.has_audio,
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.playing_since = None;
            self.stats.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// What a fake recorder saw
#[derive(Debug, Clone)]
pub struct RecorderLog {
    pub mime_type: String,
    pub bits_per_second: Option<u64>,
    pub recorded: Option<Duration>,
}

#[derive(Default)]
pub struct FakeCapture {
    pub supported: Vec<String>,
    pub reject_bitrate: bool,
    pub fail_create: bool,
    pub empty_output: bool,
    pub log: Arc<Mutex<Vec<RecorderLog>>>,
}

impl FakeCapture {
    pub fn supporting(mimes: &[&str]) -> Self {
        Self {
            supported: mimes.iter().map(|m| m.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn logs(&self) -> Vec<RecorderLog> {
        self.log.lock().unwrap().clone()
    }
}

impl CapturePort for FakeCapture {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|m| m == mime_type)
    }

    fn create_recorder(
        &self,
        _stream: CaptureStream,
        options: RecorderOptions,
    ) -> Result<Box<dyn StreamRecorder>, DomainError> {
        if self.fail_create {
            return Err(DomainError::CaptureFailure("no encoder".to_string()));
        }
        if self.reject_bitrate && options.video_bits_per_second.is_some() {
            return Err(DomainError::BadArgs("bitrate not supported".to_string()));
        }
        let format = options
            .format
            .unwrap_or_else(|| CaptureFormat::new("video/webm"));
        let index = {
            let mut log = self.log.lock().unwrap();
            log.push(RecorderLog {
                mime_type: format.mime_type.clone(),
                bits_per_second: options.video_bits_per_second,
                recorded: None,
            });
            log.len() - 1
        };
        Ok(Box::new(FakeRecorder {
            format,
            state: RecorderState::Inactive,
            started_at: None,
            empty_output: self.empty_output,
            log: Arc::clone(&self.log),
            index,
        }))
    }
}

pub struct FakeRecorder {
    format: CaptureFormat,
    state: RecorderState,
    started_at: Option<Instant>,
    empty_output: bool,
    log: Arc<Mutex<Vec<RecorderLog>>>,
    index: usize,
}

#[async_trait]
impl StreamRecorder for FakeRecorder {
    fn format(&self) -> &CaptureFormat {
        &self.format
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    async fn start(&mut self, _timeslice: Duration) -> Result<(), DomainError> {
        self.state = RecorderState::Recording;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<Vec<u8>>, DomainError> {
        let started = self
            .started_at
            .take()
            .ok_or_else(|| DomainError::InvalidState("not recording".to_string()))?;
        self.state = RecorderState::Stopped;
        self.log.lock().unwrap()[self.index].recorded = Some(started.elapsed());
        if self.empty_output {
            return Ok(Vec::new());
        }
        Ok(vec![b"chunk-1".to_vec(), b"chunk-2".to_vec()])
    }
}

#[derive(Default)]
pub struct CameraStats {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

#[derive(Default)]
pub struct FakeCamera {
    pub deny: AtomicBool,
    pub stats: Arc<CameraStats>,
    pub facings: Mutex<Vec<CameraFacing>>,
}

impl FakeCamera {
    pub fn denying() -> Self {
        let camera = Self::default();
        camera.deny.store(true, Ordering::SeqCst);
        camera
    }
}

#[async_trait]
impl CameraPort for FakeCamera {
    async fn acquire(&self, facing: CameraFacing) -> Result<Box<dyn CameraHandle>, DomainError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(DomainError::PermissionDenied("camera access denied".to_string()));
        }
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        self.facings.lock().unwrap().push(facing);
        Ok(Box::new(FakeCameraHandle {
            facing,
            stats: Arc::clone(&self.stats),
            released: false,
        }))
    }
}

pub struct FakeCameraHandle {
    facing: CameraFacing,
    stats: Arc<CameraStats>,
    released: bool,
}

impl CameraHandle for FakeCameraHandle {
    fn facing(&self) -> CameraFacing {
        self.facing
    }

    fn capture_stream(&self) -> Result<CaptureStream, DomainError> {
        Ok(CaptureStream {
            source: StreamSource::Device {
                format: "fake".to_string(),
                url: format!("{:?}", self.facing),
            },
            has_audio: false,
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub fn video_source(name: &str) -> MediaSource {
    MediaSource::new(name, vec![0u8; 64], "video/mp4").unwrap()
}

pub fn image_source(name: &str) -> MediaSource {
    MediaSource::new(name, vec![0xFFu8; 32], "image/jpeg").unwrap()
}

/// A decodable PNG of the given size
pub fn png_source(name: &str, width: u32, height: u32) -> MediaSource {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    MediaSource::new(name, bytes.into_inner(), "image/png").unwrap()
}
