//! StoryTrim
//!
//! Trim, preview and record short video stories from the command line.
//!
//! # Usage
//!
//! ```bash
//! storytrim inspect --input clip.mp4
//! storytrim thumbnails --input clip.mp4 --steps 8 --out-dir thumbs
//! storytrim trim --input clip.mp4 --start 0:05 --end 0:12 --overlays '[{"text":"Hi"}]'
//! storytrim record --camera back --max-duration 15
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::info;

use storytrim::app::DefaultAppContainer;
use storytrim::cli::{commands, Cli, Commands};
use storytrim::config_initialization::initialize_configuration_hierarchy;
use storytrim::utils::logging::{LogFormat, LogLevel, LoggingConfig, LoggingSystem};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = LoggingSystem::new(LoggingConfig {
        level: LogLevel::parse(&cli.log_level)?,
        format: LogFormat::parse(&cli.log_format)?,
        ..LoggingConfig::default()
    });
    logging.initialize()?;
    logging.log_system_info();

    storytrim::init()?;

    let config = initialize_configuration_hierarchy(&cli).await?;
    let container = DefaultAppContainer::new(config)?;

    match cli.command {
        Commands::Inspect(args) => {
            info!("Executing inspect command");
            commands::inspect(&container, args).await?;
        }
        Commands::Thumbnails(args) => {
            info!("Executing thumbnails command");
            commands::thumbnails(&container, args).await?;
        }
        Commands::Trim(args) => {
            info!("Executing trim command");
            commands::trim(&container, args).await?;
        }
        Commands::Record(args) => {
            info!("Executing record command");
            commands::record(&container, args).await?;
        }
    }

    Ok(())
}
