//! Command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::app::{AppContainer, EditSession};
use crate::cli::args::{InspectArgs, RecordArgs, ThumbnailsArgs, TrimArgs};
use crate::domain::model::{
    CameraFacing, MediaKind, MediaMetadata, MediaSource, OverlayUpdate, Point, ProducedFile,
    SessionState, Thumbnail, TimeSpec, OVERLAY_COLORS,
};
use crate::domain::rules::TimelineGeometry;
use crate::engine::progress::{JsonProgressCallback, LogProgressCallback};
use crate::engine::{CancelToken, ProgressTracker, ScopedElement};
use crate::error::StoryTrimError;
use crate::utils::path::{default_output_path, load_media_source, sidecar_path, write_output};
use crate::utils::Utils;

/// Width the CLI pretends the timeline widget has
const TIMELINE_WIDTH_PX: f64 = 1000.0;

/// Inspect output
#[derive(Debug, Serialize)]
struct InspectReport {
    file: String,
    mime_type: String,
    kind: String,
    size_bytes: usize,
    metadata: Option<MediaMetadata>,
    exceeds_segment_cap: bool,
}

/// One overlay entry of `trim --overlays`
#[derive(Debug, Deserialize)]
struct OverlaySpec {
    text: String,
    color: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    scale: Option<f64>,
}

fn parse_time(value: &str) -> Result<f64> {
    let spec = TimeSpec::parse(value).map_err(|_| StoryTrimError::InvalidTimeFormat {
        time: value.to_string(),
    })?;
    Ok(spec.seconds)
}

/// Execute the inspect command
pub async fn inspect(container: &dyn AppContainer, args: InspectArgs) -> Result<()> {
    info!("Inspecting {}", args.input.display());
    let source = load_media_source(&args.input).await?;

    let metadata = if source.kind == MediaKind::Video {
        let element = container
            .playback_port()
            .open(&source)
            .await
            .context("Failed to load video metadata")?;
        let element = ScopedElement::new(element);
        Some(element.metadata())
    } else {
        None
    };

    let report = InspectReport {
        file: source.name.clone(),
        mime_type: source.mime_type.clone(),
        kind: format!("{:?}", source.kind).to_lowercase(),
        size_bytes: source.bytes.len(),
        metadata,
        exceeds_segment_cap: metadata
            .map(|m| container.config().constraints().exceeds_cap(m.duration_seconds))
            .unwrap_or(false),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File:      {}", report.file);
    println!("Type:      {} ({})", report.mime_type, report.kind);
    println!("Size:      {}", Utils::format_file_size(report.size_bytes as u64));
    if let Some(metadata) = report.metadata {
        println!(
            "Duration:  {}",
            TimeSpec::from_seconds(metadata.duration_seconds).format_hms()
        );
        println!("Frame:     {}x{}", metadata.width, metadata.height);
        println!("Audio:     {}", if metadata.has_audio { "yes" } else { "no" });
        if report.exceeds_segment_cap {
            println!("Needs trimming to fit a story segment");
        }
    }
    Ok(())
}

/// Execute the thumbnails command
pub async fn thumbnails(container: &dyn AppContainer, args: ThumbnailsArgs) -> Result<()> {
    let source = load_media_source(&args.input).await?;
    if source.kind != MediaKind::Video {
        anyhow::bail!("Thumbnails need a video source, got {}", source.mime_type);
    }

    let duration = {
        let element = container
            .playback_port()
            .open(&source)
            .await
            .context("Failed to load video metadata")?;
        ScopedElement::new(element).metadata().duration_seconds
    };

    let sampler = container.thumbnail_sampler();
    info!(steps = sampler.steps(), duration, "Sampling thumbnails");
    let strip = sampler.sample(&source, duration).await;

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let mut written = 0;
    for (index, thumbnail) in strip.iter().enumerate() {
        match thumbnail {
            Thumbnail::Frame { timestamp, jpeg } => {
                let path = args.out_dir.join(format!("thumb_{}.jpg", index));
                write_output(&path, jpeg).await?;
                debug!(timestamp, path = %path.display(), "Thumbnail written");
                written += 1;
            }
            Thumbnail::Placeholder { timestamp } => {
                warn!("No frame at {:.2}s, thumbnail {} skipped", timestamp, index);
            }
        }
    }

    println!(
        "Wrote {} of {} thumbnails to {}",
        written,
        strip.len(),
        args.out_dir.display()
    );
    Ok(())
}

/// Execute the trim command
pub async fn trim(container: &dyn AppContainer, args: TrimArgs) -> Result<()> {
    let source = load_media_source(&args.input).await?;
    let overlays: Vec<OverlaySpec> = match &args.overlays {
        Some(json) => serde_json::from_str(json).context("Invalid --overlays JSON")?,
        None => Vec::new(),
    };

    let mut session = container.edit_session();
    let mode = session
        .open_source(source, timeline_geometry(container))
        .await
        .context("Failed to open source")?;
    info!(?mode, "Source loaded");

    if args.start.is_some() || args.end.is_some() {
        match session.range() {
            None => warn!("Images cannot be trimmed; --start and --end are ignored"),
            Some(range) => {
                let start = match &args.start {
                    Some(value) => parse_time(value)?,
                    None => range.start(),
                };
                let end = match &args.end {
                    Some(value) => parse_time(value)?,
                    None => range.end(),
                };
                if end <= start {
                    anyhow::bail!("Start time must be before end time");
                }
                let selected = session.select_range(start, end).await?;
                info!(
                    start = selected.start(),
                    end = selected.end(),
                    "Selected {}",
                    Utils::format_duration(Duration::from_secs_f64(selected.span()))
                );
            }
        }
    }

    for (index, spec) in overlays.iter().enumerate() {
        let color = spec
            .color
            .clone()
            .unwrap_or_else(|| OVERLAY_COLORS[index % OVERLAY_COLORS.len()].to_string());
        let layer = session.overlays_mut();
        let item = layer.add(&spec.text, &color)?;
        let position = match (spec.x, spec.y) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            (Some(x), None) => Some(Point::new(x, item.position.y)),
            (None, Some(y)) => Some(Point::new(item.position.x, y)),
            (None, None) => None,
        };
        layer.update(
            item.id,
            OverlayUpdate {
                position,
                scale: spec.scale,
            },
        )?;
    }
    session.overlays_mut().click_empty();

    let input = args.input.clone();
    commit_story(&mut session, args.progress_json, |file| {
        args.output
            .clone()
            .unwrap_or_else(|| default_output_path(&input, file))
    })
    .await
}

fn timeline_geometry(container: &dyn AppContainer) -> TimelineGeometry {
    TimelineGeometry::new(0.0, TIMELINE_WIDTH_PX, container.config().min_selection_px)
}

/// Commit the open source, then write the story file and its `.json` sidecar
async fn commit_story(
    session: &mut EditSession,
    progress_json: bool,
    output_path: impl FnOnce(&ProducedFile) -> PathBuf,
) -> Result<()> {
    let progress = ProgressTracker::new("trim");
    if progress_json {
        progress.add_callback(Arc::new(JsonProgressCallback));
    } else {
        progress.add_callback(Arc::new(LogProgressCallback::new(10.0)));
    }

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        })
    };

    let result = session.commit(&progress, &cancel).await;
    ctrl_c.abort();
    session.close();
    let output = result.context("Failed to produce the story")?;

    if !output.trim_applied && output.trim.is_some() {
        warn!("Output is the original source; the selection is recorded in the sidecar only");
    }

    let output_path = output_path(&output.file);
    write_output(&output_path, &output.file.bytes).await?;

    let manifest = serde_json::to_vec_pretty(&output.manifest())?;
    let sidecar = sidecar_path(&output_path);
    write_output(&sidecar, &manifest).await?;

    if !progress_json {
        println!(
            "Wrote {} ({})",
            output_path.display(),
            Utils::format_file_size(output.file.len() as u64)
        );
    }
    info!(output = %output_path.display(), sidecar = %sidecar.display(), "Story written");
    Ok(())
}

/// Resolves when a line is read; never resolves once stdin is closed
async fn enter_pressed() {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match lines.next_line().await {
        Ok(Some(_)) => {}
        _ => std::future::pending::<()>().await,
    }
}

/// Execute the record command
pub async fn record(container: &dyn AppContainer, args: RecordArgs) -> Result<()> {
    let facing = CameraFacing::parse(&args.camera)?;
    let mut session = container.record_session(facing);

    let mut states = session.subscribe();
    let reporter = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow();
            match state {
                SessionState::CountingDown(left) => println!("Recording in {}...", left),
                SessionState::Recording(0) => println!("Recording, press Enter to stop"),
                SessionState::Recording(secs) => debug!("Recording {}", TimeSpec::format_clock(secs)),
                other => debug!(state = ?other, "Record session state"),
            }
        }
    });

    if let Err(e) = session.init().await {
        reporter.abort();
        let _ = session.close().await;
        return Err(e).context("Camera is not available");
    }
    session.start().await?;

    let take = tokio::select! {
        take = session.next_take() => take,
        _ = enter_pressed() => None,
        _ = tokio::signal::ctrl_c() => None,
    };

    let take = match take {
        Some(take) => take,
        None => {
            if !matches!(session.state(), SessionState::Recording(_)) {
                reporter.abort();
                let _ = session.close().await;
                anyhow::bail!("Stopped before recording started");
            }
            session.stop().await?;
            session
                .next_take()
                .await
                .context("Record session ended without a take")?
        }
    };

    reporter.abort();
    session.close().await?;

    if args.edit {
        let source = MediaSource::from_produced(&take)?;
        let mut editor = container.edit_session();
        let mode = editor
            .open_source(source, timeline_geometry(container))
            .await
            .context("Failed to open the take in the editor")?;
        info!(?mode, "Take handed to the editor");
        let output = args.output;
        return commit_story(&mut editor, args.progress_json, |file| {
            output.unwrap_or_else(|| PathBuf::from(&file.file_name))
        })
        .await;
    }

    let output_path = args
        .output
        .unwrap_or_else(|| PathBuf::from(&take.file_name));
    write_output(&output_path, &take.bytes).await?;
    println!(
        "Wrote {} ({})",
        output_path.display(),
        Utils::format_file_size(take.len() as u64)
    );
    Ok(())
}
