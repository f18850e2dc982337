// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_INFLUXDB_ORG, DEFAULT_INFLUXDB_URL, DEFAULT_STORAGE_TIMEOUT_SECS,
    FLUSH_SCAN_INTERVAL, FLUSH_THRESHOLD, FLUSH_WORKERS,
};
use crate::errors::ConfigError;
use crate::flusher::FlushWorkerConfig;
use crate::influxdb::InfluxDbConfig;

/// Process configuration, read from the environment
#[derive(Clone)]
pub struct CollectorConfig {
    /// Key for player pseudonyms
    pub username_hash_secret: String,
    /// Tagged on every system point
    pub machine_name: String,
    pub influxdb_token: String,
    pub influxdb_url: String,
    pub influxdb_org: String,
    /// Directory holding the client's `output_log_*.txt` files
    pub log_dir: PathBuf,
    pub flush_workers: usize,
    pub flush_threshold: usize,
    /// Drop-oldest bound per destination queue, unbounded when `None`
    pub max_queue_len: Option<usize>,
    pub storage_timeout: Duration,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            username_hash_secret: String::new(),
            machine_name: String::new(),
            influxdb_token: String::new(),
            influxdb_url: DEFAULT_INFLUXDB_URL.to_string(),
            influxdb_org: DEFAULT_INFLUXDB_ORG.to_string(),
            log_dir: PathBuf::new(),
            flush_workers: FLUSH_WORKERS,
            flush_threshold: FLUSH_THRESHOLD,
            max_queue_len: None,
            storage_timeout: Duration::from_secs(DEFAULT_STORAGE_TIMEOUT_SECS),
            log_level: "info".to_string(),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("username_hash_secret", &"<redacted>")
            .field("machine_name", &self.machine_name)
            .field("influxdb_token", &"<redacted>")
            .field("influxdb_url", &self.influxdb_url)
            .field("influxdb_org", &self.influxdb_org)
            .field("log_dir", &self.log_dir)
            .field("flush_workers", &self.flush_workers)
            .field("flush_threshold", &self.flush_threshold)
            .field("max_queue_len", &self.max_queue_len)
            .field("storage_timeout", &self.storage_timeout)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{name} has invalid value '{value}'"))),
        Err(_) => Ok(None),
    }
}

impl CollectorConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            username_hash_secret: required("USERNAME_HASH_SECRET")?,
            machine_name: required("MACHINE_NAME")?,
            influxdb_token: required("INFLUXDB2_ADMIN_TOKEN")?,
            influxdb_url: env::var("INFLUXDB_URL").unwrap_or(defaults.influxdb_url),
            influxdb_org: env::var("INFLUXDB_ORG").unwrap_or(defaults.influxdb_org),
            log_dir: PathBuf::from(required("DC_LOG_DIR")?),
            flush_workers: parsed("DC_FLUSH_WORKERS")?.unwrap_or(defaults.flush_workers),
            flush_threshold: parsed("DC_FLUSH_THRESHOLD")?.unwrap_or(defaults.flush_threshold),
            max_queue_len: parsed("DC_MAX_QUEUE_LEN")?,
            storage_timeout: parsed("DC_STORAGE_TIMEOUT_SECS")?
                .map_or(defaults.storage_timeout, Duration::from_secs),
            log_level: env::var("DC_LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username_hash_secret.is_empty() {
            return Err(ConfigError::Missing("USERNAME_HASH_SECRET"));
        }
        if self.machine_name.trim().is_empty() {
            return Err(ConfigError::Missing("MACHINE_NAME"));
        }
        if self.influxdb_token.trim().is_empty() {
            return Err(ConfigError::Missing("INFLUXDB2_ADMIN_TOKEN"));
        }
        if self.influxdb_url.trim().is_empty() {
            return Err(ConfigError::Invalid("INFLUXDB_URL cannot be empty".to_string()));
        }
        if self.influxdb_org.trim().is_empty() {
            return Err(ConfigError::Invalid("INFLUXDB_ORG cannot be empty".to_string()));
        }
        if self.flush_workers == 0 {
            return Err(ConfigError::Invalid(
                "Flush worker count must be greater than 0".to_string(),
            ));
        }
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid(
                "Flush threshold must be greater than 0".to_string(),
            ));
        }
        // A bounded queue has to be able to reach the flush threshold.
        if let Some(max) = self.max_queue_len {
            if max < self.flush_threshold {
                return Err(ConfigError::Invalid(format!(
                    "Queue bound {max} is below the flush threshold {}",
                    self.flush_threshold
                )));
            }
        }
        if self.storage_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "Storage timeout must be greater than 0".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    pub fn influxdb(&self) -> InfluxDbConfig {
        InfluxDbConfig {
            url: self.influxdb_url.clone(),
            token: self.influxdb_token.clone(),
            org: self.influxdb_org.clone(),
            timeout: self.storage_timeout,
        }
    }

    pub fn flush_workers(&self) -> FlushWorkerConfig {
        FlushWorkerConfig {
            workers: self.flush_workers,
            threshold: self.flush_threshold,
            scan_interval: FLUSH_SCAN_INTERVAL,
        }
    }
}
