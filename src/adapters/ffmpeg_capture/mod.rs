// FFmpeg capture adapter - Stream recorders encoding through libav

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ffmpeg_next as ffmpeg;
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::engine::transcode::{run_capture, CaptureJob, CaptureSummary};
use crate::ports::*;

/// H.264 encoders, hardware first
const H264_ENCODERS: &[&str] = &[
    "h264_videotoolbox",
    "h264_nvenc",
    "h264_qsv",
    "libx264",
    "libopenh264",
];

const VP8_ENCODERS: &[&str] = &["libvpx", "libvpx-vp9"];

/// Opus first: webm takes nothing else and matroska prefers it
const OPUS_ENCODERS: &[&str] = &["libopus", "opus"];

const AAC_ENCODERS: &[&str] = &["aac", "libfdk_aac"];

/// Formats tried, in order, when the caller leaves the choice to the recorder
const DEFAULT_MIMES: &[&str] = &["video/webm", "video/mp4"];

/// Muxer, video encoder candidates and audio encoder candidates for a MIME type
struct Plan {
    muxer: &'static str,
    video: &'static [&'static str],
    audio: &'static [&'static str],
}

fn plan_for(mime_type: &str) -> Option<Plan> {
    let normalized = mime_type.to_lowercase().replace(' ', "");
    let plan = |muxer, video, audio| Some(Plan { muxer, video, audio });
    match normalized.as_str() {
        "video/mp4" | "video/mp4;codecs=h264" | "video/mp4;codecs=avc1" => {
            plan("mp4", H264_ENCODERS, AAC_ENCODERS)
        }
        "video/quicktime" => plan("mov", H264_ENCODERS, AAC_ENCODERS),
        "video/webm;codecs=h264" => plan("matroska", H264_ENCODERS, OPUS_ENCODERS),
        "video/webm" | "video/webm;codecs=vp8" | "video/webm;codecs=vp8,opus" => {
            plan("webm", VP8_ENCODERS, OPUS_ENCODERS)
        }
        _ => None,
    }
}

fn first_available(names: &'static [&'static str]) -> Option<&'static str> {
    names
        .iter()
        .find(|name| ffmpeg::encoder::find_by_name(name).is_some())
        .copied()
}

/// What this libav build can actually produce for a MIME type
struct Resolved {
    muxer: &'static str,
    video_encoder: &'static str,
    audio_encoder: Option<&'static str>,
}

fn resolve(mime_type: &str) -> Option<Resolved> {
    let plan = plan_for(mime_type)?;
    Some(Resolved {
        muxer: plan.muxer,
        video_encoder: first_available(plan.video)?,
        audio_encoder: first_available(plan.audio),
    })
}

/// Capability probing and recorder creation backed by libav
pub struct FfmpegCaptureAdapter;

impl FfmpegCaptureAdapter {
    /// Create new capture adapter
    pub fn new() -> Result<Self, DomainError> {
        Ok(Self)
    }
}

impl CapturePort for FfmpegCaptureAdapter {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        resolve(mime_type).is_some()
    }

    fn create_recorder(
        &self,
        stream: CaptureStream,
        options: RecorderOptions,
    ) -> Result<Box<dyn StreamRecorder>, DomainError> {
        let format = match options.format {
            Some(format) => format,
            None => DEFAULT_MIMES
                .iter()
                .find(|mime| self.is_type_supported(mime))
                .map(|mime| CaptureFormat::new(*mime))
                .ok_or_else(|| {
                    DomainError::CaptureFailure("No usable video encoder in this build".to_string())
                })?,
        };
        let resolved = resolve(&format.mime_type).ok_or_else(|| {
            DomainError::BadArgs(format!("Unsupported recorder type: {}", format.mime_type))
        })?;
        if options.video_bits_per_second == Some(0) {
            return Err(DomainError::BadArgs(
                "Video bitrate must be positive".to_string(),
            ));
        }

        let output = tempfile::Builder::new()
            .prefix("storytrim-capture-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile()
            .map_err(|e| DomainError::FsFail(format!("Failed to create capture file: {}", e)))?;

        let job = CaptureJob {
            source: stream.source,
            has_audio: stream.has_audio,
            output_path: output.path().to_path_buf(),
            muxer: resolved.muxer,
            video_encoder: resolved.video_encoder,
            audio_encoder: resolved.audio_encoder,
            bit_rate: options.video_bits_per_second,
        };
        debug!(?job, "Created recorder");

        Ok(Box::new(FfmpegStreamRecorder {
            job: Some(job),
            format,
            output,
            state: RecorderState::Inactive,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }))
    }
}

/// Recorder running the capture loop on the blocking pool
pub struct FfmpegStreamRecorder {
    job: Option<CaptureJob>,
    format: CaptureFormat,
    output: NamedTempFile,
    state: RecorderState,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<CaptureSummary, DomainError>>>,
}

#[async_trait]
impl StreamRecorder for FfmpegStreamRecorder {
    fn format(&self) -> &CaptureFormat {
        &self.format
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    async fn start(&mut self, timeslice: Duration) -> Result<(), DomainError> {
        let job = match (self.state, self.job.take()) {
            (RecorderState::Inactive, Some(job)) => job,
            _ => {
                return Err(DomainError::InvalidState(
                    "Recorder was already started".to_string(),
                ))
            }
        };

        let stop = Arc::clone(&self.stop);
        let poll = timeslice.max(Duration::from_millis(10));
        self.worker = Some(tokio::task::spawn_blocking(move || {
            run_capture(&job, &stop, poll)
        }));
        self.state = RecorderState::Recording;
        info!(mime = %self.format.mime_type, "Recorder started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<Vec<u8>>, DomainError> {
        if self.state != RecorderState::Recording {
            return Err(DomainError::InvalidState(
                "Recorder is not recording".to_string(),
            ));
        }
        self.stop.store(true, Ordering::Relaxed);
        self.state = RecorderState::Stopped;

        let worker = self
            .worker
            .take()
            .ok_or_else(|| DomainError::InternalError("Recorder worker missing".to_string()))?;
        let summary = worker
            .await
            .map_err(|e| DomainError::InternalError(format!("Capture task failed: {}", e)))?
            .map_err(|e| match e {
                DomainError::ProcessingError(msg) => DomainError::CaptureFailure(msg),
                other => other,
            })?;

        let bytes = tokio::fs::read(self.output.path())
            .await
            .map_err(|e| DomainError::FsFail(format!("Failed to read capture output: {}", e)))?;
        info!(
            frames = summary.frames,
            media_secs = summary.media_secs,
            audio_samples = summary.audio_samples,
            bytes = bytes.len(),
            "Recorder finalized"
        );

        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![bytes])
    }
}

impl Drop for FfmpegStreamRecorder {
    fn drop(&mut self) {
        if self.state == RecorderState::Recording {
            warn!("Recorder dropped while recording; stopping capture");
            self.stop.store(true, Ordering::Relaxed);
        }
    }
}
