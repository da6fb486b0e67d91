use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::contributions::guest::DEFAULT_LOCATION_THRESHOLD;
use crate::loader::LoaderOptions;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub loaders: LoaderConfig,
    pub contributions: ContributionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let max_batch_size = match env::var("APP_LOADER_MAX_BATCH_SIZE") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or(ConfigError::InvalidBatchSize)?,
            ),
            _ => None,
        };

        let guest_location_threshold = match env::var("APP_GUEST_LOCATION_THRESHOLD") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|threshold| *threshold >= 0)
                .ok_or(ConfigError::InvalidLocationThreshold)?,
            Err(_) => DEFAULT_LOCATION_THRESHOLD,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            loaders: LoaderConfig { max_batch_size },
            contributions: ContributionConfig {
                guest_location_threshold,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Request-scoped loader tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderConfig {
    pub max_batch_size: Option<usize>,
}

impl LoaderConfig {
    pub fn options(&self) -> LoaderOptions {
        LoaderOptions {
            max_batch_size: self.max_batch_size,
            ..LoaderOptions::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContributionConfig {
    /// Amount in cents above which guests must provide an address.
    pub guest_location_threshold: i64,
}

impl Default for ContributionConfig {
    fn default() -> Self {
        Self {
            guest_location_threshold: DEFAULT_LOCATION_THRESHOLD,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBatchSize,
    InvalidLocationThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBatchSize => {
                write!(f, "APP_LOADER_MAX_BATCH_SIZE must be a positive integer")
            }
            ConfigError::InvalidLocationThreshold => write!(
                f,
                "APP_GUEST_LOCATION_THRESHOLD must be a non-negative amount in cents"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBatchSize
            | ConfigError::InvalidLocationThreshold => None,
        }
    }
}
