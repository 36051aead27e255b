//! Configuration management with environment variable support.
//!
//! This module provides [`Config`] for loading and validating SafeWipe settings
//! from JSON files and environment variables.
//!
//! ## Environment Variables
//!
//! - `SAFEWIPE_CONFIG`: Override config file path
//! - `SAFEWIPE_WORKERS`: Override worker count
//! - `SAFEWIPE_CHUNK_SIZE`: Override overwrite chunk size in bytes
//! - `SAFEWIPE_PATTERN`: Override fill pattern (`zeros` or `random`)
//! - `SAFEWIPE_MAX_DEPTH`: Override recursive folder depth

use crate::eraser::BUFFER_SIZE;
use crate::replacement::FillPattern;
use crate::targets::DEFAULT_RECURSIVE_DEPTH;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Environment variable names for configuration overrides
pub const ENV_CONFIG_PATH: &str = "SAFEWIPE_CONFIG";
pub const ENV_WORKERS: &str = "SAFEWIPE_WORKERS";
pub const ENV_CHUNK_SIZE: &str = "SAFEWIPE_CHUNK_SIZE";
pub const ENV_PATTERN: &str = "SAFEWIPE_PATTERN";
pub const ENV_MAX_DEPTH: &str = "SAFEWIPE_MAX_DEPTH";

/// Chunk sizes below this make erasing large files needlessly slow
const SMALL_CHUNK_WARN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Concurrent erase jobs; `None` uses available parallelism
    pub workers: Option<usize>,
    pub chunk_size: usize,
    pub pattern: FillPattern,
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: None,
            chunk_size: BUFFER_SIZE,
            pattern: FillPattern::Zeros,
            max_depth: DEFAULT_RECURSIVE_DEPTH,
        }
    }
}

impl Config {
    /// Load config from file path
    pub fn load(path: &str) -> Result<Self> {
        let s =
            fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
        let mut config: Config =
            serde_json::from_str(&s).with_context(|| format!("parsing config file {}", path))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config with environment variable overrides
    /// Priority: ENV vars > config file > defaults
    ///
    /// An explicit `path` must exist; a missing `SAFEWIPE_CONFIG` file falls
    /// back to defaults.
    pub fn load_with_env(path: Option<&str>) -> Result<Self> {
        if let Some(p) = path {
            if !Path::new(p).exists() {
                anyhow::bail!("config file {} does not exist", p);
            }
        }

        let config_path = path
            .map(String::from)
            .or_else(|| env::var(ENV_CONFIG_PATH).ok());

        let mut config = match config_path {
            Some(ref p) if Path::new(p).exists() => {
                info!(path = p, "loading config from file");
                let s = fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p))?;
                serde_json::from_str(&s).with_context(|| format!("parsing config file {}", p))?
            }
            Some(ref p) => {
                warn!(path = p, "config file from environment not found, using defaults");
                Config::default()
            }
            None => {
                debug!("using default configuration");
                Config::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(workers) = env_parse::<usize>(ENV_WORKERS)? {
            debug!(workers, "overriding workers from environment");
            self.workers = Some(workers);
        }

        if let Some(chunk_size) = env_parse::<usize>(ENV_CHUNK_SIZE)? {
            debug!(chunk_size, "overriding chunk_size from environment");
            self.chunk_size = chunk_size;
        }

        if let Ok(pattern) = env::var(ENV_PATTERN) {
            self.pattern = pattern
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}: {}", ENV_PATTERN, e))?;
            debug!(pattern = %self.pattern, "overriding pattern from environment");
        }

        if let Some(max_depth) = env_parse::<usize>(ENV_MAX_DEPTH)? {
            debug!(max_depth, "overriding max_depth from environment");
            self.max_depth = max_depth;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }

        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than 0");
        }

        if self.max_depth == 0 {
            anyhow::bail!("max_depth must be at least 1");
        }

        if self.chunk_size < SMALL_CHUNK_WARN {
            warn!(
                chunk_size = self.chunk_size,
                "very small chunk size - erasing large files will be slow"
            );
        }

        Ok(())
    }

    /// Worker count to run with.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }
}

/// Available hardware parallelism, at least 1.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("parsing {}={}", name, raw))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.chunk_size, 1024 * 1024);
        assert_eq!(cfg.max_depth, 5);
        assert!(cfg.effective_workers() >= 1);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let cfg = Config {
            workers: Some(0),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("safewipe.json");
        fs::write(&path, r#"{ "workers": 3, "pattern": "random" }"#).unwrap();

        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.workers, Some(3));
        assert_eq!(cfg.pattern, FillPattern::Random);
        assert_eq!(cfg.chunk_size, BUFFER_SIZE);
        assert_eq!(cfg.effective_workers(), 3);
    }

    #[test]
    fn test_load_with_env_explicit_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.json");
        let err = Config::load_with_env(path.to_str()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_with_env_explicit_file_is_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("safewipe.json");
        fs::write(&path, r#"{ "max_depth": 2 }"#).unwrap();

        let cfg = Config::load_with_env(path.to_str()).unwrap();
        assert_eq!(cfg.max_depth, 2);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{ workers: ").unwrap();
        assert!(Config::load(path.to_str().unwrap()).is_err());
    }
}
