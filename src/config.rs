//! Configuration from `modlink.toml`.
//!
//! The file is looked up in the entry file's directory and its ancestors;
//! without one, defaults apply. Every key is optional:
//!
//! ```toml
//! [cache]
//! dir = ".modlink-cache"          # relative to this file
//!
//! [oci]
//! plain_http = ["localhost:5000"] # registries reached over http://
//! timeout_secs = 30
//!
//! [log]
//! filter = "modlink=debug"
//! ```
//!
//! Cache location priority:
//! 1. `$MODLINK_CACHE_DIR`
//! 2. `[cache] dir`
//! 3. `~/.modlink/cache/`

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "modlink.toml";
pub const CACHE_DIR_ENV: &str = "MODLINK_CACHE_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {message}")]
    Read { path: PathBuf, message: String },

    #[error("invalid configuration in '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("no module cache directory: set MODLINK_CACHE_DIR or HOME")]
    NoCacheDir,

    #[error("cannot create the registry client: {0}")]
    Client(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cache: CacheConfig,
    pub oci: OciConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OciConfig {
    pub plain_http: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for OciConfig {
    fn default() -> Self {
        Self {
            plain_http: Vec::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub filter: Option<String>,
}

impl Config {
    /// Load a config file. A relative `[cache] dir` is resolved against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;

        if let (Some(dir), Some(base)) = (config.cache.dir.as_mut(), path.parent()) {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(config)
    }

    /// Find `modlink.toml` in `start` or one of its ancestors.
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// The nearest config above `start`, or defaults when there is none.
    pub fn discover(start: &Path) -> Result<Config, ConfigError> {
        match Self::find(start) {
            Some(path) => Self::load(&path),
            None => Ok(Config::default()),
        }
    }

    /// Resolve the module cache directory.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir_from(
            std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        )
    }

    fn cache_dir_from(&self, env: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
        env.or_else(|| self.cache.dir.clone())
            .or_else(|| home.map(|h| h.join(".modlink").join("cache")))
    }
}
