use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::errors::{NebulaError, NebulaResult};

/// Config file read from the working directory unless `NEBULA_CONFIG` names another.
pub const DEFAULT_CONFIG_FILE: &str = "nebula.toml";
const CONFIG_PATH_VAR: &str = "NEBULA_CONFIG";
const ENV_PREFIX: &str = "NEBULA_";

/// Runtime configuration for the action log and its front end
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NebulaConfig {
    /// Directory of the sled event database
    pub db_path: PathBuf,
    /// Where exports land when no explicit destination is given
    pub export_dir: PathBuf,
    /// Minimum tracing level: trace, debug, info, warn or error
    pub log_level: String,
    /// Echo requests sent by the ping entries of the command catalog
    pub ping_count: u32,
}

impl Default for NebulaConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            export_dir: PathBuf::from("."),
            log_level: "info".to_string(),
            ping_count: 4,
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("nebula").join("logs.sled"))
        .unwrap_or_else(|| PathBuf::from("nebula_logs.sled"))
}

impl NebulaConfig {
    /// Defaults, then the TOML file, then `NEBULA_*` environment variables.
    pub fn figment(config_file: Option<PathBuf>) -> Figment {
        let file = config_file
            .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(NebulaConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
    }

    pub fn load(config_file: Option<PathBuf>) -> NebulaResult<Self> {
        Self::from_figment(Self::figment(config_file))
    }

    pub fn from_figment(figment: Figment) -> NebulaResult<Self> {
        let config: NebulaConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NebulaResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(NebulaError::config("db_path must not be empty"));
        }
        if self.ping_count == 0 {
            return Err(NebulaError::config("ping_count must be at least 1"));
        }
        self.tracing_level()?;
        Ok(())
    }

    pub fn tracing_level(&self) -> NebulaResult<tracing::Level> {
        self.log_level.parse().map_err(|_| {
            NebulaError::config(format!("log_level '{}' is not a tracing level", self.log_level))
        })
    }
}
