use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::SimoConfig;

/// Reads `simo.toml` once at startup.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config path: explicit path > SIMO_CONFIG env > ~/.simo/simo.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("SIMO_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".simo")
            .join("simo.toml")
    }

    /// Load the config from disk, falling back to defaults, then apply env
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> simo_core::Result<SimoConfig> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            SimoConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        // Validate config; log warnings, fail on errors
        let warnings = config.validate().map_err(simo_core::SimoError::Config)?;
        for w in &warnings {
            warn!("{}", w);
        }
        Ok(config)
    }

    fn read(path: &Path) -> simo_core::Result<SimoConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<SimoConfig>(&raw).map_err(|e| {
            simo_core::SimoError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply env var overrides (SIMO_LOG_LEVEL, SIMO_DEVICE_LINK, etc.)
    fn apply_env_overrides(config: SimoConfig) -> SimoConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Override logic with an injectable lookup, so tests never touch the
    /// process environment.
    pub fn apply_overrides(
        mut config: SimoConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SimoConfig {
        if let Some(v) = lookup("SIMO_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = lookup("SIMO_DEVICE_LINK") {
            config.device.link = Some(v);
        }
        if let Some(v) = lookup("SIMO_LLM_MODEL") {
            config.nlu.llm.model = v;
        }
        // API key: env var fills in when the config file doesn't have one.
        if config.nlu.llm.api_key.is_none() {
            if let Some(v) = lookup("SIMO_LLM_API_KEY") {
                config.nlu.llm.api_key = Some(v);
            }
        }
        config
    }
}
