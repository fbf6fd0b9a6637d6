//! Backend and logging configuration resolved from the environment.
//!
//! # Responsibility
//! - Turn `LAWVIKSH_*` variables into typed [`AppConfig`] values.
//! - Reject unknown backends and malformed numbers before anything connects.
//!
//! Parsing goes through a lookup closure so callers (and tests) can supply
//! variables without touching the process environment.

use crate::logging::{default_log_level, LoggingConfig};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_BACKEND: &str = "LAWVIKSH_DB_BACKEND";
pub const ENV_DB_PATH: &str = "LAWVIKSH_DB_PATH";
pub const ENV_DB_HOST: &str = "LAWVIKSH_DB_HOST";
pub const ENV_DB_PORT: &str = "LAWVIKSH_DB_PORT";
pub const ENV_DB_NAME: &str = "LAWVIKSH_DB_NAME";
pub const ENV_DB_USER: &str = "LAWVIKSH_DB_USER";
pub const ENV_DB_PASSWORD: &str = "LAWVIKSH_DB_PASSWORD";
pub const ENV_LOG_LEVEL: &str = "LAWVIKSH_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "LAWVIKSH_LOG_DIR";

const DEFAULT_DB_PATH: &str = "lawviksh.db";
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "lawviksh_db";
const DEFAULT_DB_USER: &str = "postgres";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownBackend(String),
    /// The backend exists but this build was compiled without it.
    BackendNotCompiled(&'static str),
    InvalidPort(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownBackend(value) => write!(
                f,
                "unknown database backend `{value}`; expected sqlite|postgres"
            ),
            Self::BackendNotCompiled(name) => write!(
                f,
                "database backend `{name}` requires the `{name}` cargo feature"
            ),
            Self::InvalidPort(value) => write!(f, "invalid database port `{value}`"),
        }
    }
}

impl Error for ConfigError {}

/// Connection settings for the networked engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Which storage engine to open, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Sqlite { path: PathBuf },
    Postgres(NetworkConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let backend = match get(ENV_DB_BACKEND)
            .unwrap_or_else(|| "sqlite".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "sqlite" => BackendConfig::Sqlite {
                path: get(ENV_DB_PATH)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            },
            "postgres" | "postgresql" => {
                if !cfg!(feature = "postgres") {
                    return Err(ConfigError::BackendNotCompiled("postgres"));
                }
                let defaults = NetworkConfig::default();
                let port = match get(ENV_DB_PORT) {
                    Some(raw) => raw
                        .parse::<u16>()
                        .ok()
                        .filter(|port| *port != 0)
                        .ok_or(ConfigError::InvalidPort(raw))?,
                    None => defaults.port,
                };
                BackendConfig::Postgres(NetworkConfig {
                    host: get(ENV_DB_HOST).unwrap_or(defaults.host),
                    port,
                    dbname: get(ENV_DB_NAME).unwrap_or(defaults.dbname),
                    user: get(ENV_DB_USER).unwrap_or(defaults.user),
                    // Taken verbatim, not trimmed.
                    password: lookup(ENV_DB_PASSWORD).unwrap_or(defaults.password),
                    connect_timeout: defaults.connect_timeout,
                })
            }
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let logging = LoggingConfig {
            level: get(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: get(ENV_LOG_DIR).map(PathBuf::from),
        };

        Ok(Self { backend, logging })
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, BackendConfig, ConfigError};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_sqlite_file() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Sqlite {
                path: PathBuf::from("lawviksh.db")
            }
        );
        assert!(config.logging.log_dir.is_none());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("LAWVIKSH_DB_BACKEND", "  "),
            ("LAWVIKSH_DB_PATH", ""),
            ("LAWVIKSH_LOG_LEVEL", "warn"),
        ]))
        .unwrap();
        assert_eq!(config.backend, BackendConfig::default());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("LAWVIKSH_DB_BACKEND", "mongo")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownBackend("mongo".to_string()));
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn postgres_requires_feature() {
        let err = AppConfig::from_lookup(lookup_from(&[("LAWVIKSH_DB_BACKEND", "postgres")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::BackendNotCompiled("postgres"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn postgres_settings_are_parsed() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("LAWVIKSH_DB_BACKEND", "PostgreSQL"),
            ("LAWVIKSH_DB_HOST", "db.internal"),
            ("LAWVIKSH_DB_PORT", "6543"),
            ("LAWVIKSH_DB_PASSWORD", "s3cret"),
        ]))
        .unwrap();
        match config.backend {
            BackendConfig::Postgres(network) => {
                assert_eq!(network.host, "db.internal");
                assert_eq!(network.port, 6543);
                assert_eq!(network.dbname, "lawviksh_db");
                assert_eq!(network.password, "s3cret");
            }
            other => panic!("unexpected backend: {other:?}"),
        }

        let err = AppConfig::from_lookup(lookup_from(&[
            ("LAWVIKSH_DB_BACKEND", "postgres"),
            ("LAWVIKSH_DB_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("not-a-port".to_string()));
    }
}
