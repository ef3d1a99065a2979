//! CLI module for StoryTrim
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

pub use args::{InspectArgs, RecordArgs, ThumbnailsArgs, TrimArgs};

/// StoryTrim
///
/// Trim, preview and re-encode short video stories, with text overlays and
/// camera recording.
#[derive(Parser, Debug)]
#[command(name = "storytrim")]
#[command(about = "StoryTrim - Trim and record short video stories")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format (pretty, compact, json)
    #[arg(long, default_value = "compact", global = true)]
    pub log_format: String,

    /// Configuration file (defaults to storytrim.toml when present)
    #[arg(long, global = true, env = "STORYTRIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show duration, dimensions and audio presence of a media file
    Inspect(args::InspectArgs),
    /// Write the timeline thumbnail strip as JPEG files
    Thumbnails(args::ThumbnailsArgs),
    /// Trim a video to a story-sized segment, with optional text overlays
    Trim(args::TrimArgs),
    /// Record a take from a camera
    Record(args::RecordArgs),
}
