// Capture recorder - Re-encodes a selected range by playing it into a recorder

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::engine::{CancelToken, ProgressPhase, ProgressTracker, ScopedElement};
use crate::ports::*;

/// Play-and-capture trimmer
pub struct CaptureRecorder {
    playback: Arc<dyn PlaybackPort>,
    capture: Arc<dyn CapturePort>,
    timeslice: Duration,
    guard_margin: Duration,
    progress_interval: Duration,
}

impl CaptureRecorder {
    pub fn new(
        playback: Arc<dyn PlaybackPort>,
        capture: Arc<dyn CapturePort>,
        config: &EditorConfig,
    ) -> Self {
        Self {
            playback,
            capture,
            timeslice: config.capture_timeslice(),
            guard_margin: config.guard_margin(),
            progress_interval: config.progress_interval(),
        }
    }

    /// Output format for this capture backend
    pub fn select_format(&self) -> CaptureFormat {
        FormatSelector::select(&FormatSelector::TRIM_CANDIDATES, |mime| {
            self.capture.is_type_supported(mime)
        })
    }

    /// Re-encode `[start, end)` of `source` into a new file
    pub async fn trim(
        &self,
        source: &MediaSource,
        start: f64,
        end: f64,
        progress: &ProgressTracker,
        cancel: &CancelToken,
    ) -> Result<ProducedFile, DomainError> {
        if source.kind != MediaKind::Video {
            return Err(DomainError::BadArgs(format!(
                "Only video sources can be trimmed, got {}",
                source.mime_type
            )));
        }
        if !(start >= 0.0) || !(end > start) || !end.is_finite() {
            return Err(DomainError::BadArgs(format!(
                "Invalid capture window {:.3}-{:.3}s",
                start, end
            )));
        }

        let span = Duration::from_secs_f64(end - start);
        progress.start("trim", span);

        let result = self.run(source, start, span, progress, cancel).await;
        match &result {
            Ok(file) => progress.complete(Some(format!(
                "{} ({} bytes)",
                file.file_name,
                file.len()
            ))),
            Err(DomainError::Cancelled) => progress.cancel(),
            Err(e) => progress.error(&e.to_string()),
        }
        result
    }

    async fn run(
        &self,
        source: &MediaSource,
        start: f64,
        span: Duration,
        progress: &ProgressTracker,
        cancel: &CancelToken,
    ) -> Result<ProducedFile, DomainError> {
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        let mut element = ScopedElement::new(self.playback.open(source).await?);
        let duration = element.metadata().duration_seconds;
        if start >= duration {
            return Err(DomainError::BadArgs(format!(
                "Capture start {:.3}s is past the end of a {:.3}s source",
                start, duration
            )));
        }
        element.seek(start).await?;

        let stream = element
            .capture_stream()
            .map_err(|e| DomainError::CaptureFailure(format!("No capture stream: {}", e)))?;
        let format = self.select_format();
        let options = RecorderOptions {
            format: Some(format.clone()),
            video_bits_per_second: None,
        };
        let mut recorder = self
            .capture
            .create_recorder(stream, options)
            .map_err(|e| DomainError::CaptureFailure(format!("Recorder unavailable: {}", e)))?;

        recorder.start(self.timeslice).await?;
        if let Err(e) = element.play().await {
            if let Err(stop_err) = recorder.stop().await {
                debug!("Recorder stop after failed playback failed: {}", stop_err);
            }
            return Err(DomainError::CaptureFailure(format!(
                "Playback did not start: {}",
                e
            )));
        }
        progress.set_phase(ProgressPhase::Capturing);
        info!(
            mime = %recorder.format().mime_type,
            start,
            span_secs = span.as_secs_f64(),
            "Capturing range"
        );

        let started = Instant::now();
        let deadline = started + span + self.guard_margin;
        let mut ticker = interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                _ = ticker.tick() => progress.update(started.elapsed()),
                _ = cancel.cancelled() => {
                    if recorder.state() == RecorderState::Recording {
                        if let Err(e) = recorder.stop().await {
                            debug!("Recorder stop after cancel failed: {}", e);
                        }
                    }
                    element.pause();
                    warn!("Capture cancelled");
                    return Err(DomainError::Cancelled);
                }
            }
        }

        element.pause();
        progress.set_phase(ProgressPhase::Finalizing);
        let chunks = recorder.stop().await?;
        let file = ProducedFile::from_chunks(
            &format!("story_trimmed_{}", chrono::Utc::now().timestamp_millis()),
            chunks,
            recorder.format(),
        );
        if file.is_empty() {
            return Err(DomainError::CaptureFailure(
                "Recorder finalized without any output".to_string(),
            ));
        }

        info!(
            file = %file.file_name,
            bytes = file.len(),
            captured_secs = started.elapsed().as_secs_f64(),
            "Capture finished"
        );
        Ok(file)
    }
}
