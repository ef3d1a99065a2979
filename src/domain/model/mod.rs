// Domain models - Core types and data structures

use std::fmt;
use std::ops::{Add, Sub};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Time specification with precision - represents time in seconds with fractional precision
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeSpec {
    pub seconds: f64,
}

impl TimeSpec {
    /// Create a new TimeSpec from seconds
    pub fn from_seconds(seconds: f64) -> Self {
        Self { seconds }
    }

    /// Convert to Duration
    pub fn to_duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds.max(0.0))
    }

    /// Parse time string in various formats
    pub fn parse(time_str: &str) -> Result<Self, DomainError> {
        let trimmed = time_str.trim();

        // Try parsing as seconds (float)
        if let Ok(seconds) = trimmed.parse::<f64>() {
            if seconds < 0.0 || !seconds.is_finite() {
                return Err(DomainError::BadArgs("Time cannot be negative".to_string()));
            }
            return Ok(Self::from_seconds(seconds));
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.as_slice() {
            [minutes, seconds] => {
                let minutes = minutes
                    .parse::<u32>()
                    .map_err(|_| DomainError::BadArgs("Invalid minutes format".to_string()))?;
                let seconds = Self::parse_seconds_part(seconds)?;
                Ok(Self::from_seconds(minutes as f64 * 60.0 + seconds))
            }
            [hours, minutes, seconds] => {
                let hours = hours
                    .parse::<u32>()
                    .map_err(|_| DomainError::BadArgs("Invalid hours format".to_string()))?;
                let minutes = minutes
                    .parse::<u32>()
                    .map_err(|_| DomainError::BadArgs("Invalid minutes format".to_string()))?;
                if minutes >= 60 {
                    return Err(DomainError::BadArgs("Minutes must be less than 60".to_string()));
                }
                let seconds = Self::parse_seconds_part(seconds)?;
                Ok(Self::from_seconds(
                    hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds,
                ))
            }
            _ => Err(DomainError::BadArgs(
                "Invalid time format. Supported formats: seconds (e.g., 12.5), MM:SS.ms (e.g., 0:12.5), HH:MM:SS.ms".to_string(),
            )),
        }
    }

    fn parse_seconds_part(part: &str) -> Result<f64, DomainError> {
        let seconds = part
            .parse::<f64>()
            .map_err(|_| DomainError::BadArgs("Invalid seconds format".to_string()))?;
        if !(0.0..60.0).contains(&seconds) {
            return Err(DomainError::BadArgs("Seconds must be less than 60".to_string()));
        }
        Ok(seconds)
    }

    /// Format as H:MM:SS.mmm, or M:SS.mmm under an hour
    pub fn format_hms(&self) -> String {
        let total_ms = (self.seconds * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let seconds = (total_ms % 60_000) / 1000;
        let milliseconds = total_ms % 1000;

        if hours > 0 {
            format!("{}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
        } else {
            format!("{}:{:02}.{:03}", minutes, seconds, milliseconds)
        }
    }

    /// Format whole seconds as a `mm:ss` recording clock
    pub fn format_clock(elapsed_secs: u64) -> String {
        format!("{:02}:{:02}", elapsed_secs / 60, elapsed_secs % 60)
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_hms())
    }
}

/// Length limits a trim range must respect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimConstraints {
    /// Shortest allowed segment, in seconds
    pub min_segment: f64,
    /// Longest allowed segment, in seconds; `None` leaves it unbounded
    pub max_segment: Option<f64>,
}

impl Default for TrimConstraints {
    fn default() -> Self {
        Self {
            min_segment: 1.0,
            max_segment: Some(30.0),
        }
    }
}

impl TrimConstraints {
    /// Minimum segment for a given source; a source shorter than the minimum
    /// can only be kept whole.
    pub fn effective_min(&self, total_duration: f64) -> f64 {
        self.min_segment.min(total_duration)
    }

    /// Whether a source of this length exceeds the cap and must be trimmed
    pub fn exceeds_cap(&self, total_duration: f64) -> bool {
        self.max_segment.is_some_and(|max| total_duration > max)
    }
}

/// Selected `[start, end)` sub-interval of a source's timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    start: f64,
    end: f64,
    total_duration: f64,
}

impl TimeRange {
    /// Initial selection once the duration is known: `[0, min(total, max_segment)]`
    pub fn initial(total_duration: f64, constraints: &TrimConstraints) -> Result<Self, DomainError> {
        if !(total_duration > 0.0) || !total_duration.is_finite() {
            return Err(DomainError::UnsupportedSource(format!(
                "Media duration must be positive, got {}",
                total_duration
            )));
        }
        let end = match constraints.max_segment {
            Some(max) => total_duration.min(max),
            None => total_duration,
        };
        Ok(Self {
            start: 0.0,
            end,
            total_duration,
        })
    }

    /// Build an explicit range, validating it against the constraints
    pub fn new(
        start: f64,
        end: f64,
        total_duration: f64,
        constraints: &TrimConstraints,
    ) -> Result<Self, DomainError> {
        let range = Self {
            start,
            end,
            total_duration,
        };
        if !range.satisfies(constraints) {
            return Err(DomainError::BadArgs(format!(
                "Range {:.3}-{:.3}s violates constraints for a {:.3}s source",
                start, end, total_duration
            )));
        }
        Ok(range)
    }

    /// Construct without validation; only transition functions use this
    pub(crate) fn from_bounds(start: f64, end: f64, total_duration: f64) -> Self {
        Self {
            start,
            end,
            total_duration,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Segment length `end - start`
    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the selection covers the whole source
    pub fn is_full(&self) -> bool {
        self.start <= f64::EPSILON && self.span() >= self.total_duration - f64::EPSILON
    }

    /// Whether playback time `t` is inside the loop window
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    /// Check every invariant, with a small tolerance for float rounding
    pub fn satisfies(&self, constraints: &TrimConstraints) -> bool {
        const EPS: f64 = 1e-9;
        let min = constraints.effective_min(self.total_duration);
        let span = self.span();
        self.total_duration > 0.0
            && self.start >= -EPS
            && self.end <= self.total_duration + EPS
            && span >= min - EPS
            && constraints.max_segment.map_or(true, |max| span <= max + EPS)
    }

    /// Descriptor handed downstream with the produced file
    pub fn descriptor(&self) -> TrimDescriptor {
        TrimDescriptor {
            start: self.start,
            end: self.end,
        }
    }
}

/// Which part of the selection a gesture grabbed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragHandle {
    /// Left handle, moves `start`
    Start,
    /// Right handle, moves `end`
    End,
    /// The selection bar, pans both bounds
    Bar,
}

impl DragHandle {
    pub fn parse(handle: &str) -> Result<Self, DomainError> {
        match handle.to_lowercase().as_str() {
            "left" | "start" => Ok(DragHandle::Start),
            "right" | "end" => Ok(DragHandle::End),
            "bar" | "pan" => Ok(DragHandle::Bar),
            _ => Err(DomainError::BadArgs(format!(
                "Invalid handle: {}. Valid handles: left, right, bar",
                handle
            ))),
        }
    }
}

/// Pointer or item position in container pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Kind of media carried by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Classify a MIME type; anything that is neither video nor image is rejected
    pub fn from_mime(mime_type: &str) -> Result<Self, DomainError> {
        let mime = mime_type.trim().to_lowercase();
        if mime.starts_with("video/") {
            Ok(MediaKind::Video)
        } else if mime.starts_with("image/") {
            Ok(MediaKind::Image)
        } else {
            Err(DomainError::UnsupportedSource(format!(
                "Unsupported media type: {}",
                mime_type
            )))
        }
    }
}

/// Metadata known once a source finished loading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// User-picked or recorder-produced blob
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
    pub kind: MediaKind,
}

impl MediaSource {
    pub fn new(
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let mime_type = mime_type.into();
        let kind = MediaKind::from_mime(&mime_type)?;
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(DomainError::UnsupportedSource("Source is empty".to_string()));
        }
        Ok(Self {
            name: name.into(),
            bytes,
            mime_type,
            kind,
        })
    }

    /// Wrap a produced file so it can be edited again
    pub fn from_produced(file: &ProducedFile) -> Result<Self, DomainError> {
        Self::new(file.file_name.clone(), file.bytes.clone(), file.mime_type.clone())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Recorder output container and codec, expressed as a MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFormat {
    pub mime_type: String,
}

impl CaptureFormat {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }

    /// MIME type with parameters such as `;codecs=` stripped
    pub fn simple_mime(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or(&self.mime_type)
            .trim()
    }

    /// File extension inferred from the MIME type
    pub fn extension(&self) -> &'static str {
        let simple = self.simple_mime();
        if simple.contains("mp4") {
            "mp4"
        } else if simple.contains("quicktime") {
            "mov"
        } else {
            "webm"
        }
    }
}

/// A finalized output file
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
}

impl ProducedFile {
    /// Concatenate recorder chunks into one file named `<stem>.<ext>`
    pub fn from_chunks(stem: &str, chunks: Vec<Vec<u8>>, format: &CaptureFormat) -> Self {
        let extension = format.extension().to_string();
        Self {
            file_name: format!("{}.{}", stem, extension),
            bytes: chunks.concat(),
            mime_type: format.simple_mime().to_string(),
            extension,
        }
    }

    /// Pass a source through untouched
    pub fn from_source(source: &MediaSource) -> Self {
        let format = CaptureFormat::new(source.mime_type.clone());
        let extension = std::path::Path::new(&source.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_else(|| format.extension().to_string());
        Self {
            file_name: source.name.clone(),
            bytes: source.bytes.to_vec(),
            mime_type: format.simple_mime().to_string(),
            extension,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// `{start, end}` handed to the publisher alongside the file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimDescriptor {
    pub start: f64,
    pub end: f64,
}

/// Preset overlay colors
pub const OVERLAY_COLORS: [&str; 7] = [
    "#FFFFFF", "#000000", "#FF3B30", "#34C759", "#007AFF", "#FFCC00", "#AF52DE",
];

/// Text placed on top of the video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayItem {
    pub id: i64,
    pub text: String,
    pub position: Point,
    pub scale: f64,
    pub color: String,
}

/// Partial update applied to an overlay item
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayUpdate {
    pub position: Option<Point>,
    pub scale: Option<f64>,
}

/// Which camera feeds a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// Selfie camera
    Front,
    /// Environment camera
    Back,
}

impl CameraFacing {
    pub fn parse(facing: &str) -> Result<Self, DomainError> {
        match facing.to_lowercase().as_str() {
            "front" | "user" => Ok(CameraFacing::Front),
            "back" | "environment" => Ok(CameraFacing::Back),
            _ => Err(DomainError::BadArgs(format!(
                "Invalid camera: {}. Valid cameras: front, back",
                facing
            ))),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }
}

/// Live recording session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Seconds left before recording starts
    CountingDown(u32),
    /// Whole seconds recorded so far
    Recording(u64),
    Stopped,
    /// Camera or microphone refused; outside the recording cycle
    NoPermission,
}

impl SessionState {
    /// Countdown or recording in progress
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::CountingDown(_) | SessionState::Recording(_))
    }

    /// States the hosting view may close from without cancelling work
    pub fn can_close(&self) -> bool {
        !self.is_busy()
    }
}

/// Lifecycle of a stream recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
    Stopped,
}

/// Decoded frame in tightly packed RGBA
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// One entry of the thumbnail strip
#[derive(Debug, Clone, PartialEq)]
pub enum Thumbnail {
    /// JPEG-encoded preview frame
    Frame { timestamp: f64, jpeg: Vec<u8> },
    /// Sample failed; shown as an empty tile
    Placeholder { timestamp: f64 },
}

impl Thumbnail {
    pub fn timestamp(&self) -> f64 {
        match self {
            Thumbnail::Frame { timestamp, .. } | Thumbnail::Placeholder { timestamp } => *timestamp,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Thumbnail::Placeholder { .. })
    }
}

/// Camera device mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device url for the front camera
    pub front_camera: String,
    /// Device url for the back camera
    pub back_camera: String,
    /// libavdevice input format name
    pub camera_format: String,
    /// Audio device recorded with the camera; empty records video only
    pub microphone: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self {
                front_camera: "0".to_string(),
                back_camera: "1".to_string(),
                camera_format: "avfoundation".to_string(),
                microphone: "0".to_string(),
            }
        } else if cfg!(windows) {
            Self {
                front_camera: "video=Integrated Camera".to_string(),
                back_camera: "video=USB Camera".to_string(),
                camera_format: "dshow".to_string(),
                microphone: String::new(),
            }
        } else {
            Self {
                front_camera: "/dev/video0".to_string(),
                back_camera: "/dev/video2".to_string(),
                camera_format: "v4l2".to_string(),
                microphone: String::new(),
            }
        }
    }
}

/// Every tunable of the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub min_segment_secs: f64,
    /// `0` leaves segments uncapped
    pub max_segment_secs: f64,
    pub min_selection_px: f64,
    pub thumbnail_steps: usize,
    pub thumbnail_size: u32,
    pub thumbnail_quality: u8,
    pub capture_timeslice_ms: u64,
    pub guard_margin_ms: u64,
    pub progress_interval_ms: u64,
    pub countdown_secs: u32,
    pub recording_bitrate: u64,
    /// `0` records until stopped
    pub max_recording_secs: u64,
    pub overlay_min_scale: f64,
    pub overlay_max_scale: f64,
    #[serde(flatten)]
    pub camera: CameraConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_segment_secs: 1.0,
            max_segment_secs: 30.0,
            min_selection_px: 20.0,
            thumbnail_steps: 5,
            thumbnail_size: 80,
            thumbnail_quality: 50,
            capture_timeslice_ms: 200,
            guard_margin_ms: 500,
            progress_interval_ms: 100,
            countdown_secs: 3,
            recording_bitrate: 2_500_000,
            max_recording_secs: 0,
            overlay_min_scale: 0.5,
            overlay_max_scale: 3.0,
            camera: CameraConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn constraints(&self) -> TrimConstraints {
        TrimConstraints {
            min_segment: self.min_segment_secs,
            max_segment: (self.max_segment_secs > 0.0).then_some(self.max_segment_secs),
        }
    }

    pub fn guard_margin(&self) -> Duration {
        Duration::from_millis(self.guard_margin_ms)
    }

    pub fn capture_timeslice(&self) -> Duration {
        Duration::from_millis(self.capture_timeslice_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn max_recording(&self) -> Option<Duration> {
        (self.max_recording_secs > 0).then(|| Duration::from_secs(self.max_recording_secs))
    }

    /// Reject combinations the editor cannot honor
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(self.min_segment_secs > 0.0) {
            return Err(DomainError::BadArgs(
                "min_segment_secs must be positive".to_string(),
            ));
        }
        if self.max_segment_secs < 0.0 {
            return Err(DomainError::BadArgs(
                "max_segment_secs cannot be negative".to_string(),
            ));
        }
        if self.max_segment_secs > 0.0 && self.max_segment_secs < self.min_segment_secs {
            return Err(DomainError::BadArgs(format!(
                "max_segment_secs ({}) is below min_segment_secs ({})",
                self.max_segment_secs, self.min_segment_secs
            )));
        }
        if self.thumbnail_steps == 0 {
            return Err(DomainError::BadArgs("thumbnail_steps must be at least 1".to_string()));
        }
        if self.thumbnail_size == 0 {
            return Err(DomainError::BadArgs("thumbnail_size must be at least 1".to_string()));
        }
        if !(1..=100).contains(&self.thumbnail_quality) {
            return Err(DomainError::BadArgs(
                "thumbnail_quality must be between 1 and 100".to_string(),
            ));
        }
        if self.min_selection_px < 0.0 {
            return Err(DomainError::BadArgs(
                "min_selection_px cannot be negative".to_string(),
            ));
        }
        if !(self.overlay_min_scale > 0.0) || self.overlay_min_scale > self.overlay_max_scale {
            return Err(DomainError::BadArgs(format!(
                "Invalid overlay scale bounds: {}..{}",
                self.overlay_min_scale, self.overlay_max_scale
            )));
        }
        Ok(())
    }

    /// Apply a single `key = value` override from the environment or CLI
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), DomainError> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DomainError>
        where
            T::Err: fmt::Display,
        {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| DomainError::BadArgs(format!("Invalid value for {}: {}", key, e)))
        }

        match key {
            "min_segment_secs" => self.min_segment_secs = parse(key, value)?,
            "max_segment_secs" => self.max_segment_secs = parse(key, value)?,
            "min_selection_px" => self.min_selection_px = parse(key, value)?,
            "thumbnail_steps" => self.thumbnail_steps = parse(key, value)?,
            "thumbnail_size" => self.thumbnail_size = parse(key, value)?,
            "thumbnail_quality" => self.thumbnail_quality = parse(key, value)?,
            "capture_timeslice_ms" => self.capture_timeslice_ms = parse(key, value)?,
            "guard_margin_ms" => self.guard_margin_ms = parse(key, value)?,
            "progress_interval_ms" => self.progress_interval_ms = parse(key, value)?,
            "countdown_secs" => self.countdown_secs = parse(key, value)?,
            "recording_bitrate" => self.recording_bitrate = parse(key, value)?,
            "max_recording_secs" => self.max_recording_secs = parse(key, value)?,
            "overlay_min_scale" => self.overlay_min_scale = parse(key, value)?,
            "overlay_max_scale" => self.overlay_max_scale = parse(key, value)?,
            "front_camera" => self.camera.front_camera = value.to_string(),
            "back_camera" => self.camera.back_camera = value.to_string(),
            "camera_format" => self.camera.camera_format = value.to_string(),
            "microphone" => self.camera.microphone = value.trim().to_string(),
            _ => {
                return Err(DomainError::BadArgs(format!(
                    "Unknown configuration key: {}",
                    key
                )))
            }
        }
        Ok(())
    }

    /// Keys accepted by `apply_override`
    pub const KEYS: [&'static str; 18] = [
        "min_segment_secs",
        "max_segment_secs",
        "min_selection_px",
        "thumbnail_steps",
        "thumbnail_size",
        "thumbnail_quality",
        "capture_timeslice_ms",
        "guard_margin_ms",
        "progress_interval_ms",
        "countdown_secs",
        "recording_bitrate",
        "max_recording_secs",
        "overlay_min_scale",
        "overlay_max_scale",
        "front_camera",
        "back_camera",
        "camera_format",
        "microphone",
    ];
}
