use crate::sources::{SourceLocation, SourceSet, JOHNS_HOPKINS_PROVIDER};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_INGEST_TIMEOUT_SECS: u64 = 120;

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
    pub ingest: IngestConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            ingest: IngestConfig::from_env()?,
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

/// Log filtering and formatting.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Where the source and reference tables come from, and how long one
/// ingestion run may take.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub provider: String,
    pub sources: SourceSet,
    pub population_csv: Option<PathBuf>,
    pub testing_csv: Option<PathBuf>,
    pub timeout: Duration,
}

impl IngestConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = SourceSet::johns_hopkins();
        let sources = SourceSet {
            confirmed: source_var("APP_CONFIRMED_SOURCE").unwrap_or(defaults.confirmed),
            recovered: source_var("APP_RECOVERED_SOURCE").unwrap_or(defaults.recovered),
            deceased: source_var("APP_DECEASED_SOURCE").unwrap_or(defaults.deceased),
        };

        let timeout_secs = match non_empty_var("APP_INGEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTimeout)?,
            None => DEFAULT_INGEST_TIMEOUT_SECS,
        };

        Ok(Self {
            provider: non_empty_var("APP_PROVIDER_NAME")
                .unwrap_or_else(|| JOHNS_HOPKINS_PROVIDER.to_string()),
            sources,
            population_csv: non_empty_var("APP_POPULATION_CSV").map(PathBuf::from),
            testing_csv: non_empty_var("APP_TESTING_CSV").map(PathBuf::from),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            provider: JOHNS_HOPKINS_PROVIDER.to_string(),
            sources: SourceSet::johns_hopkins(),
            population_csv: None,
            testing_csv: None,
            timeout: Duration::from_secs(DEFAULT_INGEST_TIMEOUT_SECS),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn source_var(name: &str) -> Option<SourceLocation> {
    non_empty_var(name).map(|value| SourceLocation::parse(&value))
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "APP_INGEST_TIMEOUT_SECS must be a positive number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidTimeout => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_CONFIRMED_SOURCE",
            "APP_RECOVERED_SOURCE",
            "APP_DECEASED_SOURCE",
            "APP_POPULATION_CSV",
            "APP_TESTING_CSV",
            "APP_INGEST_TIMEOUT_SECS",
            "APP_PROVIDER_NAME",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.telemetry.ansi);
        assert_eq!(config.ingest.provider, JOHNS_HOPKINS_PROVIDER);
        assert_eq!(config.ingest.sources, SourceSet::johns_hopkins());
        assert!(config.ingest.population_csv.is_none());
        assert_eq!(config.ingest.timeout, Duration::from_secs(120));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn source_overrides_accept_paths_and_urls() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_CONFIRMED_SOURCE", "data/confirmed.csv");
        env::set_var("APP_DECEASED_SOURCE", "https://example.org/deaths.csv");
        env::set_var("APP_POPULATION_CSV", "data/population.csv");
        env::set_var("APP_INGEST_TIMEOUT_SECS", "15");

        let config = AppConfig::load().expect("config loads");
        assert!(!config.telemetry.ansi);
        assert_eq!(
            config.ingest.sources.confirmed,
            SourceLocation::File(PathBuf::from("data/confirmed.csv"))
        );
        assert_eq!(
            config.ingest.sources.deceased,
            SourceLocation::Url("https://example.org/deaths.csv".to_string())
        );
        assert_eq!(
            config.ingest.sources.recovered,
            SourceSet::johns_hopkins().recovered
        );
        assert_eq!(
            config.ingest.population_csv,
            Some(PathBuf::from("data/population.csv"))
        );
        assert_eq!(config.ingest.timeout, Duration::from_secs(15));
        reset_env();
    }

    #[test]
    fn rejects_zero_timeout() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_INGEST_TIMEOUT_SECS", "0");
        let error = AppConfig::load().expect_err("zero timeout rejected");
        assert!(matches!(error, ConfigError::InvalidTimeout));
        reset_env();
    }
}
