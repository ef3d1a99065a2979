//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;
use clap_num::number_range;

fn thumbnail_steps(s: &str) -> Result<usize, String> {
    number_range(s, 1, 60)
}

fn thumbnail_size(s: &str) -> Result<u32, String> {
    number_range(s, 16, 1024)
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input media file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the thumbnails command
#[derive(Args, Debug)]
pub struct ThumbnailsArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Number of evenly spaced thumbnails (1-60)
    #[arg(long, value_parser = thumbnail_steps)]
    pub steps: Option<usize>,

    /// Directory for thumb_<i>.jpg files
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Thumbnail edge length in pixels (16-1024)
    #[arg(long, value_parser = thumbnail_size)]
    pub size: Option<u32>,
}

/// Arguments for the trim command
#[derive(Args, Debug)]
pub struct TrimArgs {
    /// Input video or image file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Start time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub start: Option<String>,

    /// End time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub end: Option<String>,

    /// Output file path (default: <input>_story.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Text overlays as a JSON array of {"text", "color", "x", "y", "scale"}
    #[arg(long)]
    pub overlays: Option<String>,

    /// Longest allowed segment in seconds (0 = uncapped)
    #[arg(long)]
    pub max_segment: Option<f64>,

    /// Report progress as JSON lines on stdout
    #[arg(long)]
    pub progress_json: bool,
}

/// Arguments for the record command
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Camera to record from (front or back)
    #[arg(long, default_value = "front")]
    pub camera: String,

    /// Stop automatically after this many seconds
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// Countdown before recording starts, in seconds
    #[arg(long)]
    pub countdown: Option<u32>,

    /// Output file path (default: recorded-video.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pass the take through the editor: cap it to one story segment and write a sidecar
    #[arg(long)]
    pub edit: bool,

    /// Emit editor progress as JSON lines on stdout (with --edit)
    #[arg(long, requires = "edit")]
    pub progress_json: bool,
}
