//! Environment-driven configuration
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_DSN` | required, `mysql://` or `mariadb://` |
//! | `BULK_BATCH_SIZE` | 200 |
//! | `BULK_COMMAND_TIMEOUT_SECS` | none |
//! | `BULK_MAX_CONNECTIONS` | 10 |
//! | `BULK_MIN_CONNECTIONS` | 1 |
//! | `BULK_ACQUIRE_TIMEOUT_SECS` | 30 |
//! | `BULK_SCHEMA_PATH` | none |

use crate::dsn::{safe_dsn, validate_dsn};
use crate::metadata::EntityRegistry;
use crate::options::{BulkOption, DEFAULT_BATCH_SIZE};
use crate::types::DatabaseType;
use anyhow::{Context, Result, bail};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Connection, pool and default call settings
#[derive(Debug, Clone)]
pub struct BulkConfig {
    pub dsn: SecretString,
    pub database_type: DatabaseType,
    pub batch_size: usize,
    pub command_timeout: Option<Duration>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    /// JSON schema descriptor loaded by [`BulkConfig::load_registry`]
    pub schema_path: Option<PathBuf>,
}

impl BulkConfig {
    /// Read configuration from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, one call per variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let dsn = lookup("DATABASE_DSN")
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_DSN is not set")?;
        let dsn = SecretString::from(dsn);
        let database_type = validate_dsn(dsn.expose_secret())
            .with_context(|| format!("Invalid DATABASE_DSN {}", safe_dsn(&dsn)))?;

        let batch_size = parse_var(&lookup, "BULK_BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            bail!("BULK_BATCH_SIZE must be at least 1");
        }

        let command_timeout =
            parse_var::<u64>(&lookup, "BULK_COMMAND_TIMEOUT_SECS")?.map(Duration::from_secs);
        let max_connections = parse_var(&lookup, "BULK_MAX_CONNECTIONS")?.unwrap_or(10);
        let min_connections = parse_var(&lookup, "BULK_MIN_CONNECTIONS")?.unwrap_or(1);
        if min_connections > max_connections {
            bail!(
                "BULK_MIN_CONNECTIONS ({}) exceeds BULK_MAX_CONNECTIONS ({})",
                min_connections,
                max_connections
            );
        }
        let acquire_timeout = Duration::from_secs(
            parse_var(&lookup, "BULK_ACQUIRE_TIMEOUT_SECS")?.unwrap_or(30),
        );
        let schema_path = lookup("BULK_SCHEMA_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            dsn,
            database_type,
            batch_size,
            command_timeout,
            max_connections,
            min_connections,
            acquire_timeout,
            schema_path,
        })
    }

    /// Options applied to calls that pass none
    pub fn default_option(&self) -> BulkOption {
        let option = BulkOption::new().batch_size(self.batch_size);
        match self.command_timeout {
            Some(timeout) => option.command_timeout(timeout),
            None => option,
        }
    }

    /// Registry from `schema_path`, or an empty one when unset
    pub fn load_registry(&self) -> Result<EntityRegistry> {
        match &self.schema_path {
            Some(path) => EntityRegistry::from_json_file(path)
                .with_context(|| format!("Failed to load schema descriptor {}", path.display())),
            None => Ok(EntityRegistry::new()),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} is not a valid number: '{}'", key, raw)),
        _ => Ok(None),
    }
}
