//! Configuration management for mediabox
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mediabox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `MEDIABOX__<section>__<key>`, for example
//! `MEDIABOX__JOBS__WORKERS=8` or `MEDIABOX__DOWNLOAD__BUFFER_SIZE=8MB`.
//!
//! # Configuration File
//!
//! By default the file is read from `config/mediabox.toml`; point
//! `MEDIABOX_CONFIG` elsewhere to override.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    AdmissionPolicy, Config, DownloadConfig, JobsConfig, RetentionConfig, ServerConfig,
    StorageConfig, StreamingConfig, TelemetryConfig, ToolsConfig,
};
pub use validation::{ARIA2C_MAX_CONNECTIONS, ValidationError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or a value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
