use super::models::Config;
use thiserror::Error;

/// Highest per-server connection count stock aria2c builds accept
pub const ARIA2C_MAX_CONNECTIONS: u32 = 16;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("jobs.workers must be at least 1")]
    NoWorkers,

    #[error("jobs.queue_capacity must be at least 1")]
    NoQueueCapacity,

    #[error("download.aria2c_connections must be between 1 and {max}, got {value}")]
    Aria2cConnectionsOutOfRange { value: u32, max: u32 },

    #[error("{field} must be positive")]
    NonPositive { field: &'static str },

    #[error("tools.{tool} must name an executable")]
    EmptyToolName { tool: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_jobs(config)?;
    validate_download(config)?;
    validate_timeouts(config)?;
    validate_tools(config)?;
    Ok(())
}

fn validate_jobs(config: &Config) -> Result<(), ValidationError> {
    if config.jobs.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.jobs.queue_capacity == 0 {
        return Err(ValidationError::NoQueueCapacity);
    }
    Ok(())
}

fn validate_download(config: &Config) -> Result<(), ValidationError> {
    let download = &config.download;

    if !(1..=ARIA2C_MAX_CONNECTIONS).contains(&download.aria2c_connections) {
        return Err(ValidationError::Aria2cConnectionsOutOfRange {
            value: download.aria2c_connections,
            max: ARIA2C_MAX_CONNECTIONS,
        });
    }
    if download.aria2c_splits == 0 {
        return Err(ValidationError::NonPositive {
            field: "download.aria2c_splits",
        });
    }
    if download.concurrent_fragments == 0 {
        return Err(ValidationError::NonPositive {
            field: "download.concurrent_fragments",
        });
    }
    if download.buffer_size.as_u64() == 0 {
        return Err(ValidationError::NonPositive {
            field: "download.buffer_size",
        });
    }
    if download.http_chunk_size.as_u64() == 0 {
        return Err(ValidationError::NonPositive {
            field: "download.http_chunk_size",
        });
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let checks = [
        ("streaming.metadata_timeout_secs", config.streaming.metadata_timeout_secs),
        ("streaming.download_timeout_secs", config.streaming.download_timeout_secs),
        ("retention.job_ttl_secs", config.retention.job_ttl_secs),
        ("retention.sweep_interval_secs", config.retention.sweep_interval_secs),
    ];

    for (field, value) in checks {
        if value == 0 {
            return Err(ValidationError::NonPositive { field });
        }
    }
    Ok(())
}

fn validate_tools(config: &Config) -> Result<(), ValidationError> {
    let tools = &config.tools;
    let names = [
        ("ytdlp", &tools.ytdlp),
        ("ffmpeg", &tools.ffmpeg),
        ("aria2c", &tools.aria2c),
        ("spotdl", &tools.spotdl),
        ("python", &tools.python),
    ];

    for (tool, name) in names {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyToolName { tool });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_defaults() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_zero_workers() {
        let mut config = Config::default();
        config.jobs.workers = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));
    }

    #[test]
    fn rejects_aria2c_above_ceiling() {
        let mut config = Config::default();
        config.download.aria2c_connections = 32;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::Aria2cConnectionsOutOfRange { value: 32, max: 16 })
        ));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = Config::default();
        config.streaming.download_timeout_secs = 0;
        let err = validate(&config).unwrap_err();
        assert_eq!(err.to_string(), "streaming.download_timeout_secs must be positive");
    }

    #[test]
    fn rejects_blank_tool_name() {
        let mut config = Config::default();
        config.tools.ytdlp = "  ".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyToolName { tool: "ytdlp" })
        ));
    }
}
