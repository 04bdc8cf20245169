//! Centralized configuration for ledger-cli.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than in the middle of a command.

use std::env;
use std::fmt;
use std::path::PathBuf;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on exit)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite") {
            Some(Self::Sqlite)
        } else if s.eq_ignore_ascii_case("memory") {
            Some(Self::Memory)
        } else {
            None
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage provider (default: sqlite)
    pub storage_provider: StorageProvider,
    /// SQLite database path (default: ./data/bankaccount.db)
    pub db_path: PathBuf,
    /// Log format
    pub log_format: LogFormat,
    /// Optional CSV dataset loaded into the store before the command runs
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        // Storage provider
        let provider_str = lookup("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into());
        let storage_provider =
            StorageProvider::parse(&provider_str).ok_or_else(|| ConfigError {
                field: "STORAGE_PROVIDER",
                message: format!("Unknown provider '{}', expected memory or sqlite", provider_str),
            })?;

        // DB path (for sqlite)
        let db_path = lookup("DB_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/bankaccount.db"));

        // Log format
        let log_format =
            LogFormat::from_str(&lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        // Seed dataset
        let seed_file = lookup("SEED_FILE")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        if let Some(ref path) = seed_file {
            if !path.is_file() {
                return Err(ConfigError {
                    field: "SEED_FILE",
                    message: format!("No such file: {}", path.display()),
                });
            }
        }

        Ok(Self {
            storage_provider,
            db_path,
            log_format,
            seed_file,
        })
    }

    /// Log warnings about configurations that silently lose data.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: changes are discarded when the command exits."
            );
        }
    }
}
