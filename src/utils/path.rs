//! Source loading and output placement

use std::path::{Path, PathBuf};

use crate::domain::model::{MediaSource, ProducedFile};
use crate::error::{StoryTrimError, StoryTrimResult};

/// MIME type for a media file extension
pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    let mime = match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime)
}

/// Read a file into a media source, guessing the MIME type from its extension
pub async fn load_media_source(path: &Path) -> StoryTrimResult<MediaSource> {
    if !path.exists() {
        return Err(StoryTrimError::InputFileNotFound {
            path: path.display().to_string(),
        });
    }
    let mime = mime_from_path(path).ok_or_else(|| StoryTrimError::ConfigError {
        message: format!("Cannot tell the media type of {}", path.display()),
    })?;
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "source".to_string());
    Ok(MediaSource::new(name, bytes, mime)?)
}

/// Where a produced file goes when the caller did not say
pub fn default_output_path(input: &Path, file: &ProducedFile) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = format!("{}_story.{}", stem, file.extension);
    match input.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// JSON sidecar next to an output file
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

/// Write bytes, creating missing parent directories
pub async fn write_output(path: &Path, bytes: &[u8]) -> StoryTrimResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoryTrimError::OutputError {
                message: format!("Failed to create {}: {}", parent.display(), e),
            })?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| StoryTrimError::OutputError {
            message: format!("Failed to write {}: {}", path.display(), e),
        })
}
