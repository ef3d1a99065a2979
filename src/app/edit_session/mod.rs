// Edit session - Owns one source at a time from load to commit

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::capture_recorder::CaptureRecorder;
use crate::app::overlay_layer::OverlayLayer;
use crate::app::thumbnail_sampler::ThumbnailSampler;
use crate::app::trim_controller::{apply_preview_commands, PreviewCommand, TrimController};
use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::engine::raster::image_dimensions;
use crate::engine::{CancelToken, ProgressTracker, ScopedElement};
use crate::ports::*;

/// Overlay canvas for images whose header cannot be read
const STORY_FRAME: (u32, u32) = (1080, 1920);

/// How the editor presents the loaded source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Source exceeds the segment cap; trimming is required
    Trim,
    /// Source can be published as is
    Media,
}

/// Result handed to the publishing collaborator
#[derive(Debug, Clone)]
pub struct EditOutput {
    pub file: ProducedFile,
    pub trim: Option<TrimDescriptor>,
    /// True only when the file was actually re-encoded
    pub trim_applied: bool,
    pub overlays: Vec<OverlayItem>,
    pub metadata: Option<MediaMetadata>,
}

/// JSON-friendly view of an `EditOutput`, without the bytes
#[derive(Debug, Clone, Serialize)]
pub struct OutputManifest {
    pub file_name: String,
    pub mime_type: String,
    pub extension: String,
    pub size_bytes: usize,
    pub trim: Option<TrimDescriptor>,
    pub trim_applied: bool,
    pub overlays: Vec<OverlayItem>,
    pub metadata: Option<MediaMetadata>,
}

impl EditOutput {
    pub fn manifest(&self) -> OutputManifest {
        OutputManifest {
            file_name: self.file.file_name.clone(),
            mime_type: self.file.mime_type.clone(),
            extension: self.file.extension.clone(),
            size_bytes: self.file.len(),
            trim: self.trim,
            trim_applied: self.trim_applied,
            overlays: self.overlays.clone(),
            metadata: self.metadata,
        }
    }
}

/// Editing flow for a single source
pub struct EditSession {
    playback: Arc<dyn PlaybackPort>,
    recorder: CaptureRecorder,
    sampler: ThumbnailSampler,
    config: EditorConfig,
    source: Option<MediaSource>,
    metadata: Option<MediaMetadata>,
    preview: Option<ScopedElement>,
    controller: Option<TrimController>,
    overlays: OverlayLayer,
    thumbnails: Option<JoinHandle<Vec<Thumbnail>>>,
    mode: Option<EditMode>,
}

impl EditSession {
    pub fn new(
        playback: Arc<dyn PlaybackPort>,
        capture: Arc<dyn CapturePort>,
        config: EditorConfig,
    ) -> Self {
        let recorder = CaptureRecorder::new(Arc::clone(&playback), capture, &config);
        let sampler = ThumbnailSampler::from_config(Arc::clone(&playback), &config);
        let overlays = OverlayLayer::from_config(0.0, 0.0, &config);
        Self {
            playback,
            recorder,
            sampler,
            config,
            source: None,
            metadata: None,
            preview: None,
            controller: None,
            overlays,
            thumbnails: None,
            mode: None,
        }
    }

    pub fn mode(&self) -> Option<EditMode> {
        self.mode
    }

    pub fn metadata(&self) -> Option<MediaMetadata> {
        self.metadata
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.controller.as_ref().map(|c| c.range())
    }

    pub fn controller(&self) -> Option<&TrimController> {
        self.controller.as_ref()
    }

    pub fn overlays(&self) -> &OverlayLayer {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut OverlayLayer {
        &mut self.overlays
    }

    /// Load a source, releasing whatever the previous one held
    pub async fn open_source(
        &mut self,
        source: MediaSource,
        geometry: TimelineGeometry,
    ) -> Result<EditMode, DomainError> {
        self.release_current();

        if source.kind == MediaKind::Image {
            let (width, height) = image_dimensions(&source.bytes).unwrap_or_else(|e| {
                warn!("{}; placing overlays on a {}x{} frame", e, STORY_FRAME.0, STORY_FRAME.1);
                STORY_FRAME
            });
            self.overlays =
                OverlayLayer::from_config(f64::from(width), f64::from(height), &self.config);
            info!(name = %source.name, width, height, "Image source opened");
            self.source = Some(source);
            self.mode = Some(EditMode::Media);
            return Ok(EditMode::Media);
        }

        let element = self.playback.open(&source).await.map_err(|e| match e {
            DomainError::UnsupportedSource(msg) => DomainError::UnsupportedSource(msg),
            other => DomainError::UnsupportedSource(other.to_string()),
        })?;
        let preview = ScopedElement::new(element);
        let metadata = preview.metadata();

        let constraints = self.config.constraints();
        let controller = TrimController::new(metadata.duration_seconds, constraints, geometry)?;
        let mode = if constraints.exceeds_cap(metadata.duration_seconds) {
            EditMode::Trim
        } else {
            EditMode::Media
        };

        self.thumbnails = Some(self.sampler.spawn(source.clone(), metadata.duration_seconds));
        self.overlays = OverlayLayer::from_config(
            f64::from(metadata.width),
            f64::from(metadata.height),
            &self.config,
        );
        info!(
            name = %source.name,
            duration = metadata.duration_seconds,
            ?mode,
            "Video source opened"
        );

        self.preview = Some(preview);
        self.controller = Some(controller);
        self.metadata = Some(metadata);
        self.source = Some(source);
        self.mode = Some(mode);
        Ok(mode)
    }

    fn video_parts(&mut self) -> Result<(&mut TrimController, &mut dyn MediaElement), DomainError> {
        match (self.controller.as_mut(), self.preview.as_mut()) {
            (Some(controller), Some(preview)) => Ok((controller, &mut ***preview)),
            _ => Err(DomainError::InvalidState(
                "No video source is open".to_string(),
            )),
        }
    }

    pub fn set_geometry(&mut self, geometry: TimelineGeometry) {
        if let Some(controller) = self.controller.as_mut() {
            controller.set_geometry(geometry);
        }
    }

    pub async fn pointer_down(
        &mut self,
        handle: DragHandle,
        pointer: Point,
    ) -> Result<Vec<PreviewCommand>, DomainError> {
        let (controller, preview) = self.video_parts()?;
        let commands = controller.pointer_down(handle, pointer, !preview.is_paused());
        apply_preview_commands(preview, &commands).await?;
        Ok(commands)
    }

    pub async fn pointer_move(&mut self, pointer: Point) -> Result<Vec<PreviewCommand>, DomainError> {
        let (controller, preview) = self.video_parts()?;
        let commands = controller.pointer_move(pointer);
        apply_preview_commands(preview, &commands).await?;
        Ok(commands)
    }

    pub async fn pointer_up(&mut self) -> Result<Vec<PreviewCommand>, DomainError> {
        let (controller, preview) = self.video_parts()?;
        let commands = controller.pointer_up();
        apply_preview_commands(preview, &commands).await?;
        Ok(commands)
    }

    /// Media time update from the preview; keeps playback inside the range
    pub async fn time_update(&mut self) -> Result<Vec<PreviewCommand>, DomainError> {
        let (controller, preview) = self.video_parts()?;
        let commands = controller.on_time_update(preview.current_time(), preview.is_paused());
        apply_preview_commands(preview, &commands).await?;
        Ok(commands)
    }

    /// Select a range directly and move the preview to its start
    pub async fn select_range(&mut self, start: f64, end: f64) -> Result<TimeRange, DomainError> {
        let (controller, preview) = self.video_parts()?;
        let range = controller.select(start, end);
        preview.seek(range.start()).await?;
        if (range.start() - start).abs() > 1e-6 || (range.end() - end).abs() > 1e-6 {
            info!(
                requested_start = start,
                requested_end = end,
                start = range.start(),
                end = range.end(),
                "Requested range was clamped"
            );
        }
        Ok(range)
    }

    /// Start looped preview playback from the selection start
    pub async fn play_preview(&mut self) -> Result<(), DomainError> {
        let (controller, preview) = self.video_parts()?;
        let commands = controller.start_looping();
        apply_preview_commands(preview, &commands).await
    }

    /// Pause the preview and keep the loop check from restarting it
    pub async fn pause_preview(&mut self) -> Result<(), DomainError> {
        let (controller, preview) = self.video_parts()?;
        let commands = controller.stop_looping();
        apply_preview_commands(preview, &commands).await
    }

    /// Wait for the background strip; empty when none was started
    pub async fn thumbnails(&mut self) -> Vec<Thumbnail> {
        match self.thumbnails.take() {
            Some(job) => job.await.unwrap_or_else(|e| {
                warn!("Thumbnail job failed: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    /// Produce the output, trimming when needed and falling back to the source otherwise
    pub async fn commit(
        &mut self,
        progress: &ProgressTracker,
        cancel: &CancelToken,
    ) -> Result<EditOutput, DomainError> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| DomainError::InvalidState("No source is open".to_string()))?;
        let overlays = self.overlays.items().to_vec();

        let range = match (&self.controller, source.kind) {
            (Some(controller), MediaKind::Video) => {
                Some((controller.range(), controller.needs_trim(source.kind)))
            }
            _ => None,
        };
        let Some((range, needs_trim)) = range else {
            return Ok(EditOutput {
                file: ProducedFile::from_source(&source),
                trim: None,
                trim_applied: false,
                overlays,
                metadata: self.metadata,
            });
        };

        if let Some(preview) = self.preview.as_mut() {
            preview.pause();
        }

        let (file, trim_applied) = if needs_trim {
            match self
                .recorder
                .trim(&source, range.start(), range.end(), progress, cancel)
                .await
            {
                Ok(file) => (file, true),
                Err(DomainError::Cancelled) => return Err(DomainError::Cancelled),
                Err(e) => {
                    warn!("Trimming did not apply, using the original source: {}", e);
                    (ProducedFile::from_source(&source), false)
                }
            }
        } else {
            debug!("Selection covers the whole source; nothing to re-encode");
            (ProducedFile::from_source(&source), false)
        };

        Ok(EditOutput {
            file,
            trim: Some(range.descriptor()),
            trim_applied,
            overlays,
            metadata: self.metadata,
        })
    }

    /// Release the preview and abort background sampling
    pub fn close(&mut self) {
        self.release_current();
        self.source = None;
    }

    fn release_current(&mut self) {
        if let Some(job) = self.thumbnails.take() {
            job.abort();
        }
        self.preview = None;
        self.controller = None;
        self.metadata = None;
        self.mode = None;
        self.overlays = OverlayLayer::from_config(0.0, 0.0, &self.config);
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        if let Some(job) = self.thumbnails.take() {
            job.abort();
        }
    }
}
