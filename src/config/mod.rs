use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;

use crate::convalidation::{OverflowPolicy, DEFAULT_CACHE_CAPACITY};

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
    pub allocation: AllocationConfig,
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

        let overflow_policy = match env::var("CONVALIDATION_OVERFLOW_POLICY") {
            Ok(raw) => parse_overflow_policy(&raw)?,
            Err(_) => OverflowPolicy::default(),
        };

        let bulk_workers = match env::var("CONVALIDATION_BULK_WORKERS") {
            Ok(raw) => raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|_| ConfigError::InvalidWorkerCount { value: raw })?,
            Err(_) => default_worker_count(),
        };

        let cache_capacity = match env::var("CONVALIDATION_CACHE_CAPACITY") {
            Ok(raw) => raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|_| ConfigError::InvalidCacheCapacity { value: raw })?,
            Err(_) => default_cache_capacity(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            allocation: AllocationConfig {
                overflow_policy,
                bulk_workers,
                cache_capacity,
            },
        })
    }
}

fn parse_overflow_policy(raw: &str) -> Result<OverflowPolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "redirect" | "free_elective" | "redirect_to_free_elective" => {
            Ok(OverflowPolicy::RedirectToFreeElective)
        }
        "uncounted" | "discard" => Ok(OverflowPolicy::Uncounted),
        _ => Err(ConfigError::InvalidOverflowPolicy {
            value: raw.to_string(),
        }),
    }
}

fn default_worker_count() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

fn default_cache_capacity() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Credit allocation policy, bulk run sizing and the server's distribution cache bound.
#[derive(Debug, Clone)]
pub struct AllocationConfig {
    pub overflow_policy: OverflowPolicy,
    pub bulk_workers: NonZeroUsize,
    pub cache_capacity: NonZeroUsize,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            overflow_policy: OverflowPolicy::default(),
            bulk_workers: default_worker_count(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidOverflowPolicy { value: String },
    InvalidWorkerCount { value: String },
    InvalidCacheCapacity { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidOverflowPolicy { value } => write!(
                f,
                "CONVALIDATION_OVERFLOW_POLICY must be 'redirect' or 'uncounted' (got '{}')",
                value
            ),
            ConfigError::InvalidWorkerCount { value } => write!(
                f,
                "CONVALIDATION_BULK_WORKERS must be a positive integer (got '{}')",
                value
            ),
            ConfigError::InvalidCacheCapacity { value } => write!(
                f,
                "CONVALIDATION_CACHE_CAPACITY must be a positive integer (got '{}')",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidOverflowPolicy { .. }
            | ConfigError::InvalidWorkerCount { .. }
            | ConfigError::InvalidCacheCapacity { .. } => None,
        }
    }
}
