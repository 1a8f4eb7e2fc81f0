use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::MaiConfig;

/// Loads the Mai configuration from disk and the environment.
pub struct ConfigLoader {
    config: MaiConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > MAI_CONFIG env > ~/.mai/mai.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("MAI_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mai")
            .join("mai.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> mai_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            MaiConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(mai_core::MaiError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse a TOML document into a config.
    pub fn parse(raw: &str, origin: &Path) -> mai_core::Result<MaiConfig> {
        toml::from_str::<MaiConfig>(raw).map_err(|e| {
            mai_core::MaiError::Config(format!("failed to parse {}: {}", origin.display(), e))
        })
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> MaiConfig {
        self.config.clone()
    }

    /// Path the config was resolved from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (MAI_LOG_LEVEL, MAI_DATABASE, MAI_OBSERVATION_WINDOW).
    fn apply_env_overrides(mut config: MaiConfig) -> MaiConfig {
        if let Ok(v) = std::env::var("MAI_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("MAI_DATABASE") {
            config.database.sqlite_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MAI_OBSERVATION_WINDOW") {
            match v.parse::<usize>() {
                Ok(size) => config.thinking.observation_window_size = size,
                Err(_) => warn!(value = %v, "ignoring non-numeric MAI_OBSERVATION_WINDOW"),
            }
        }
        config
    }
}
