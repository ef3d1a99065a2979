//! Configuration initialization and hierarchy management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::adapters::TomlConfigAdapter;
use crate::cli::{Cli, Commands};
use crate::domain::model::EditorConfig;
use crate::ports::ConfigPort;

const ENV_PREFIX: &str = "STORYTRIM_";

const CONFIG_CANDIDATES: [&str; 2] = ["storytrim.toml", "config/storytrim.toml"];

/// Resolve the effective configuration: CLI > Env > File > Defaults
pub async fn initialize_configuration_hierarchy(cli: &Cli) -> Result<EditorConfig> {
    info!("Initializing configuration hierarchy");
    let adapter = TomlConfigAdapter::new()?;

    match config_file_path(cli.config.as_deref())? {
        Some(path) => {
            adapter
                .load_config(&path.to_string_lossy())
                .await
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
        }
        None => debug!("No configuration file found, using defaults"),
    }

    let env_count = apply_environment(&adapter, std::env::vars()).await?;
    if env_count > 0 {
        info!("Applied {} environment variable overrides", env_count);
    }

    let cli_count = apply_cli_overrides(&adapter, &cli.command).await?;
    if cli_count > 0 {
        info!("Applied {} CLI configuration overrides", cli_count);
    }

    adapter.validate_config().await?;
    Ok(adapter.get_config().await?)
}

/// An explicit `--config` must exist; otherwise the first present candidate wins
fn config_file_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file does not exist: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }
    Ok(CONFIG_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

/// Apply `STORYTRIM_<KEY>` variables for known keys; returns how many applied
async fn apply_environment(
    adapter: &dyn ConfigPort,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<usize> {
    let mut applied = 0;
    for (name, value) in vars {
        let Some(key) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key = key.to_lowercase();
        if !EditorConfig::KEYS.contains(&key.as_str()) {
            continue;
        }
        adapter
            .set_value(&key, &value)
            .await
            .with_context(|| format!("Invalid environment override {}", name))?;
        debug!("Environment override: {} = {}", key, value);
        applied += 1;
    }
    Ok(applied)
}

/// Command flags that double as configuration keys
fn cli_overrides(command: &Commands) -> Vec<(&'static str, String)> {
    let mut overrides = Vec::new();
    match command {
        Commands::Trim(args) => {
            if let Some(max_segment) = args.max_segment {
                overrides.push(("max_segment_secs", max_segment.to_string()));
            }
        }
        Commands::Thumbnails(args) => {
            if let Some(steps) = args.steps {
                overrides.push(("thumbnail_steps", steps.to_string()));
            }
            if let Some(size) = args.size {
                overrides.push(("thumbnail_size", size.to_string()));
            }
        }
        Commands::Record(args) => {
            if let Some(max_duration) = args.max_duration {
                overrides.push(("max_recording_secs", max_duration.to_string()));
            }
            if let Some(countdown) = args.countdown {
                overrides.push(("countdown_secs", countdown.to_string()));
            }
        }
        Commands::Inspect(_) => {}
    }
    overrides
}

async fn apply_cli_overrides(adapter: &dyn ConfigPort, command: &Commands) -> Result<usize> {
    let overrides = cli_overrides(command);
    for (key, value) in &overrides {
        adapter
            .set_value(key, value)
            .await
            .with_context(|| format!("Invalid value for {}", key))?;
        debug!("CLI override: {} = {}", key, value);
    }
    Ok(overrides.len())
}
