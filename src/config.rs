use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory; defaults to ~/.heron
    pub data_dir: Option<PathBuf>,
    /// Database file; defaults to <data_dir>/heron.db
    pub database_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// bcrypt work factor for password hashing
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    /// Load from a TOML file if one exists at `config_path`, otherwise use
    /// defaults. Unset paths are resolved relative to the data directory.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            _ => Config::default(),
        };

        let data_dir = config
            .storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir);
        if config.storage.data_dir.is_none() {
            config.storage.data_dir = Some(data_dir.clone());
        }
        if config.storage.database_path.is_none() {
            config.storage.database_path = Some(data_dir.join("heron.db"));
        }

        Ok(config)
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".heron")
    }

    pub fn db_path(&self) -> anyhow::Result<&PathBuf> {
        self.storage
            .database_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("database path not resolved; call Config::load"))
    }
}
