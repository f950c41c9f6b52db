//! Runtime configuration for the wallet core.
//!
//! # Responsibility
//! - Load issuer, store and logging settings from JSON or the environment.
//! - Validate settings before any connection or logger is created.
//!
//! # Invariants
//! - A loaded `WalletConfig` always carries a digits-only issuer id.
//! - `log_level`, when present, is one of the levels accepted by logging.

use crate::db::{open_db, DbResult};
use crate::gateway::resolver::IdentifierResolver;
use crate::gateway::PassGateway;
use crate::logging::{self, LoggingError};
use rusqlite::Connection;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

pub const ENV_ISSUER_ID: &str = "WALLETPASS_ISSUER_ID";
pub const ENV_DB_PATH: &str = "WALLETPASS_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "WALLETPASS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "WALLETPASS_LOG_DIR";

const DEFAULT_DB_FILE: &str = "walletpass.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    /// Required setting is absent.
    Missing(&'static str),
    Invalid {
        field: &'static str,
        message: String,
    },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "missing required setting `{field}`"),
            Self::Invalid { field, message } => write!(f, "invalid `{field}`: {message}"),
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Missing(_) | Self::Invalid { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletConfig {
    /// Numeric issuer account; prefixes every remote id.
    pub issuer_id: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_FILE)
}

impl WalletConfig {
    pub fn new(issuer_id: impl Into<String>) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            db_path: default_db_path(),
            log_level: None,
            log_dir: None,
        }
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let issuer_id = read(ENV_ISSUER_ID).ok_or(ConfigError::Missing("issuer_id"))?;
        let mut config = Self {
            issuer_id,
            db_path: read(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            log_level: read(ENV_LOG_LEVEL),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
        };
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.issuer_id.is_empty() {
            return Err(ConfigError::Missing("issuer_id"));
        }
        if !self.issuer_id.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                field: "issuer_id",
                message: format!("expected ASCII digits only, got `{}`", self.issuer_id),
            });
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("db_path"));
        }
        if let Some(level) = &self.log_level {
            logging::normalize_level(level).map_err(|err| ConfigError::Invalid {
                field: "log_level",
                message: err.to_string(),
            })?;
        }
        Ok(())
    }

    /// Configured level, or the build-mode default.
    pub fn effective_log_level(&self) -> &str {
        match self.log_level.as_deref() {
            Some(level) => level,
            None => logging::default_log_level(),
        }
    }

    /// Starts file logging when `log_dir` is set.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        match &self.log_dir {
            Some(dir) => {
                logging::init_logging(self.effective_log_level(), dir)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn open_db(&self) -> DbResult<Connection> {
        open_db(&self.db_path)
    }

    pub fn resolver(&self, gateway: Arc<dyn PassGateway>) -> IdentifierResolver {
        IdentifierResolver::new(gateway, self.issuer_id.clone())
    }

    fn normalize(&mut self) {
        self.issuer_id = self.issuer_id.trim().to_string();
        self.log_level = self
            .log_level
            .take()
            .map(|level| level.trim().to_string())
            .filter(|level| !level.is_empty());
    }
}
