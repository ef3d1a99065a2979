// TOML config adapter - Configuration management using TOML files

use crate::domain::errors::*;
use crate::domain::model::EditorConfig;
use crate::ports::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{debug, info};

/// On-disk layout: every key lives under `[storytrim]`
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    storytrim: EditorConfig,
}

/// TOML configuration adapter
pub struct TomlConfigAdapter {
    config: RwLock<EditorConfig>,
    config_file_path: RwLock<Option<PathBuf>>,
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::InternalError("Configuration lock poisoned".to_string())
}

impl TomlConfigAdapter {
    /// Create new TOML config adapter holding the defaults
    pub fn new() -> Result<Self, DomainError> {
        Ok(Self::with_config(EditorConfig::default()))
    }

    /// Adapter seeded with an already resolved configuration
    pub fn with_config(config: EditorConfig) -> Self {
        Self {
            config: RwLock::new(config),
            config_file_path: RwLock::new(None),
        }
    }

    /// Per-user config location
    pub fn get_default_config_path() -> PathBuf {
        if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config_home).join("storytrim").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("storytrim")
                .join("config.toml")
        } else {
            PathBuf::from("storytrim.toml")
        }
    }

    /// Parse a TOML document into a configuration
    pub fn parse(toml_content: &str) -> Result<EditorConfig, DomainError> {
        let parsed: ConfigFile = toml::from_str(toml_content)
            .map_err(|e| DomainError::BadArgs(format!("Failed to parse TOML config: {}", e)))?;
        Ok(parsed.storytrim)
    }

    /// Serialize a configuration to a TOML document
    pub fn render(config: &EditorConfig) -> Result<String, DomainError> {
        let file = ConfigFile {
            storytrim: config.clone(),
        };
        toml::to_string_pretty(&file)
            .map_err(|e| DomainError::InternalError(format!("Failed to serialize config: {}", e)))
    }
}

#[async_trait]
impl ConfigPort for TomlConfigAdapter {
    async fn get_config(&self) -> Result<EditorConfig, DomainError> {
        Ok(self.config.read().map_err(poisoned)?.clone())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, DomainError> {
        let config = self.config.read().map_err(poisoned)?.clone();
        let value = toml::Value::try_from(&config)
            .map_err(|e| DomainError::InternalError(format!("Failed to serialize config: {}", e)))?;
        Ok(value.get(key).map(|v| match v {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), DomainError> {
        let mut config = self.config.write().map_err(poisoned)?;
        let mut updated = config.clone();
        updated.apply_override(key, value)?;
        updated.validate()?;
        *config = updated;
        info!("Set config {} = {}", key, value);
        Ok(())
    }

    async fn load_config(&self, file_path: &str) -> Result<(), DomainError> {
        let path = PathBuf::from(file_path);

        if !path.exists() {
            return Err(DomainError::FsFail(format!(
                "Config file does not exist: {}",
                file_path
            )));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DomainError::FsFail(format!("Failed to read config file: {}", e)))?;
        let loaded = Self::parse(&content)?;
        loaded.validate()?;

        *self.config.write().map_err(poisoned)? = loaded;
        *self.config_file_path.write().map_err(poisoned)? = Some(path);
        debug!("Loaded configuration from {}", file_path);
        Ok(())
    }

    async fn save_config(&self, file_path: &str) -> Result<(), DomainError> {
        let path = PathBuf::from(file_path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::FsFail(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = {
            let config = self.config.read().map_err(poisoned)?;
            Self::render(&config)?
        };
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| DomainError::FsFail(format!("Failed to write config file: {}", e)))?;

        *self.config_file_path.write().map_err(poisoned)? = Some(path);
        Ok(())
    }

    async fn validate_config(&self) -> Result<(), DomainError> {
        self.config.read().map_err(poisoned)?.validate()
    }

    async fn get_config_file_path(&self) -> Result<String, DomainError> {
        let config_path = self.config_file_path.read().map_err(poisoned)?;
        let path = config_path
            .clone()
            .unwrap_or_else(Self::get_default_config_path);
        Ok(path.to_string_lossy().to_string())
    }
}
