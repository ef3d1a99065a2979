// FFmpeg media adapter - Detached playback elements backed by libav decoding

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::{codec, format, media};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// Opens sources into temp-file-backed elements
pub struct FfmpegPlaybackAdapter;

impl FfmpegPlaybackAdapter {
    /// Create new playback adapter
    pub fn new() -> Result<Self, DomainError> {
        Ok(Self)
    }

    /// Temp file suffix so libavformat can guess the container
    fn suffix_for(source: &MediaSource) -> String {
        let extension = Path::new(&source.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_else(|| CaptureFormat::new(source.mime_type.clone()).extension().to_string());
        format!(".{}", extension)
    }
}

#[async_trait]
impl PlaybackPort for FfmpegPlaybackAdapter {
    async fn open(&self, source: &MediaSource) -> Result<Box<dyn MediaElement>, DomainError> {
        let suffix = Self::suffix_for(source);
        let bytes = source.bytes.clone();

        let (file, metadata) = tokio::task::spawn_blocking(move || {
            let mut file = tempfile::Builder::new()
                .prefix("storytrim-")
                .suffix(&suffix)
                .tempfile()
                .map_err(|e| DomainError::FsFail(format!("Failed to create temp file: {}", e)))?;
            file.write_all(&bytes)
                .and_then(|_| file.flush())
                .map_err(|e| DomainError::FsFail(format!("Failed to write temp file: {}", e)))?;
            let metadata = probe_metadata(file.path())?;
            Ok::<_, DomainError>((file, metadata))
        })
        .await
        .map_err(|e| DomainError::InternalError(format!("Probe task failed: {}", e)))??;

        info!(
            name = %source.name,
            duration = metadata.duration_seconds,
            width = metadata.width,
            height = metadata.height,
            "Loaded media element"
        );
        Ok(Box::new(FfmpegMediaElement::new(file, metadata)))
    }
}

/// Read duration, dimensions and audio presence
pub fn probe_metadata(path: &Path) -> Result<MediaMetadata, DomainError> {
    let ictx = format::input(&path)
        .map_err(|e| DomainError::UnsupportedSource(format!("Failed to open media: {}", e)))?;

    let stream = ictx
        .streams()
        .best(media::Type::Video)
        .ok_or_else(|| DomainError::UnsupportedSource("No video stream found".to_string()))?;
    let decoder = codec::context::Context::from_parameters(stream.parameters())
        .and_then(|ctx| ctx.decoder().video())
        .map_err(|e| DomainError::UnsupportedSource(format!("Undecodable video stream: {}", e)))?;

    let mut duration = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
    if !(duration > 0.0) {
        duration = stream.duration() as f64 * f64::from(stream.time_base());
    }
    if !(duration > 0.0) || !duration.is_finite() {
        return Err(DomainError::UnsupportedSource(
            "Media duration is unknown".to_string(),
        ));
    }

    Ok(MediaMetadata {
        duration_seconds: duration,
        width: decoder.width(),
        height: decoder.height(),
        has_audio: ictx.streams().best(media::Type::Audio).is_some(),
    })
}

/// Decode the frame shown at `time` into packed RGBA
pub fn decode_frame_at(path: &Path, time: f64) -> Result<RgbaFrame, DomainError> {
    let ff = |context: &'static str| {
        move |e: ffmpeg::Error| DomainError::ProcessingError(format!("{}: {}", context, e))
    };

    let mut ictx = format::input(&path).map_err(ff("Failed to open media"))?;
    let (video_index, time_base, params) = {
        let stream = ictx
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| DomainError::UnsupportedSource("No video stream found".to_string()))?;
        (stream.index(), stream.time_base(), stream.parameters())
    };
    let mut decoder = codec::context::Context::from_parameters(params)
        .map_err(ff("Failed to create decoder context"))?
        .decoder()
        .video()
        .map_err(ff("Failed to create video decoder"))?;

    let ts = (time.max(0.0) * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    ictx.seek(ts, ..ts).map_err(ff("Failed to seek"))?;

    let half_frame = decoder
        .frame_rate()
        .map(|r| 0.5 / f64::from(r).max(1.0))
        .unwrap_or(0.02);
    let mut shown: Option<VideoFrame> = None;
    let mut decoded = VideoFrame::empty();

    'packets: for (stream, packet) in ictx.packets() {
        if stream.index() != video_index {
            continue;
        }
        decoder
            .send_packet(&packet)
            .map_err(ff("Failed to send packet to decoder"))?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            let frame_secs = decoded
                .timestamp()
                .map(|ts| ts as f64 * f64::from(time_base))
                .unwrap_or(time);
            let reached = frame_secs >= time - half_frame;
            shown = Some(decoded.clone());
            if reached {
                break 'packets;
            }
        }
    }
    if shown.is_none() {
        // Seek landed past the last packet; flush what the decoder still holds
        let _ = decoder.send_eof();
        while decoder.receive_frame(&mut decoded).is_ok() {
            shown = Some(decoded.clone());
        }
    }
    let frame = shown.ok_or_else(|| {
        DomainError::ProcessingError(format!("No frame decoded at {:.3}s", time))
    })?;

    let mut scaler = scaling::Context::get(
        frame.format(),
        frame.width(),
        frame.height(),
        Pixel::RGBA,
        frame.width(),
        frame.height(),
        scaling::Flags::BILINEAR,
    )
    .map_err(ff("Failed to create scaler"))?;
    let mut rgba = VideoFrame::empty();
    scaler.run(&frame, &mut rgba).map_err(ff("Failed to convert frame"))?;

    let width = rgba.width();
    let height = rgba.height();
    let stride = rgba.stride(0);
    let row = width as usize * 4;
    let plane = rgba.data(0);
    let mut data = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        data.extend_from_slice(&plane[y * stride..y * stride + row]);
    }

    Ok(RgbaFrame {
        width,
        height,
        data,
    })
}

/// Element playing a temp-file copy of the source against the wall clock
pub struct FfmpegMediaElement {
    file: Option<NamedTempFile>,
    path: PathBuf,
    metadata: MediaMetadata,
    position: f64,
    playing_since: Option<Instant>,
}

impl FfmpegMediaElement {
    fn new(file: NamedTempFile, metadata: MediaMetadata) -> Self {
        let path = file.path().to_path_buf();
        Self {
            file: Some(file),
            path,
            metadata,
            position: 0.0,
            playing_since: None,
        }
    }

    fn ensure_loaded(&self) -> Result<(), DomainError> {
        if self.file.is_none() {
            return Err(DomainError::InvalidState(
                "Media element was released".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaElement for FfmpegMediaElement {
    fn metadata(&self) -> MediaMetadata {
        self.metadata
    }

    fn current_time(&self) -> f64 {
        match self.playing_since {
            Some(since) => {
                (self.position + since.elapsed().as_secs_f64()).min(self.metadata.duration_seconds)
            }
            None => self.position,
        }
    }

    async fn seek(&mut self, time: f64) -> Result<(), DomainError> {
        self.ensure_loaded()?;
        self.position = time.clamp(0.0, self.metadata.duration_seconds);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    async fn play(&mut self) -> Result<(), DomainError> {
        self.ensure_loaded()?;
        if self.playing_since.is_none() {
            if self.position >= self.metadata.duration_seconds {
                self.position = 0.0;
            }
            self.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.position = self.current_time();
        self.playing_since = None;
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none()
    }

    async fn snapshot(&mut self) -> Result<RgbaFrame, DomainError> {
        self.ensure_loaded()?;
        let path = self.path.clone();
        let time = self.current_time();
        tokio::task::spawn_blocking(move || decode_frame_at(&path, time))
            .await
            .map_err(|e| DomainError::InternalError(format!("Decode task failed: {}", e)))?
    }

    fn capture_stream(&self) -> Result<CaptureStream, DomainError> {
        self.ensure_loaded()?;
        Ok(CaptureStream {
            source: StreamSource::File {
                path: self.path.clone(),
                start: self.current_time(),
            },
            has_audio: self.metadata.has_audio,
        })
    }

    fn release(&mut self) {
        self.playing_since = None;
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "Released media element");
        }
    }
}
