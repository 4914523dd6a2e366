//! Server configuration.
//!
//! Loaded from `reliefnet.toml` with `RELIEFNET__` environment overrides,
//! e.g. `RELIEFNET__SERVER__PORT=9090`. Provider availability is decided
//! here, once, at startup: a provider is enabled when its credential is
//! configured, and the resulting flags are passed down rather than
//! re-checked per call.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use reliefnet_db_postgres::PostgresConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        match self.storage.backend {
            StorageBackend::Memory => {}
            StorageBackend::Postgres => {
                let pg = self
                    .storage
                    .postgres
                    .as_ref()
                    .ok_or("storage.backend=postgres requires storage.postgres config")?;
                if pg.url.is_empty() {
                    return Err("storage.postgres.url must not be empty".into());
                }
                if pg.pool_size == 0 {
                    return Err("storage.postgres.pool_size must be > 0".into());
                }
            }
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err("cache.cleanup_interval_secs must be > 0".into());
        }
        if self.cache.geocode_ttl_secs == 0
            || self.cache.analysis_ttl_secs == 0
            || self.cache.updates_ttl_secs == 0
            || self.cache.social_ttl_secs == 0
        {
            return Err("cache TTLs must be > 0".into());
        }
        if self.providers.attempt_timeout_ms == 0 {
            return Err("providers.attempt_timeout_ms must be > 0".into());
        }
        if self.pagination.default_count == 0 {
            return Err("pagination.default_count must be > 0".into());
        }
        if self.pagination.default_count > self.pagination.max_count {
            return Err("pagination.default_count must be <= pagination.max_count".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

/// Which record/cache backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process store, for development and tests.
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How often the background sweeper deletes expired rows.
    pub cleanup_interval_secs: u64,
    pub geocode_ttl_secs: i64,
    pub analysis_ttl_secs: i64,
    pub updates_ttl_secs: i64,
    pub social_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 600,
            geocode_ttl_secs: 3600,
            analysis_ttl_secs: 3600,
            updates_ttl_secs: 1800,
            social_ttl_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Google Maps Geocoding API key. Absent = provider disabled.
    #[serde(default)]
    pub google_maps_api_key: Option<String>,
    /// Mapbox access token. Absent = provider disabled.
    #[serde(default)]
    pub mapbox_access_token: Option<String>,
    /// Nominatim needs no credential; it can still be switched off.
    pub nominatim_enabled: bool,
    /// Gemini API key for content classification. Absent = keyword fallback
    /// only.
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    pub fema_enabled: bool,
    /// Partner-provided Red Cross feed URL. Absent = source disabled.
    #[serde(default)]
    pub redcross_feed_url: Option<String>,
    /// Per-attempt timeout applied to every provider call.
    pub attempt_timeout_ms: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            google_maps_api_key: None,
            mapbox_access_token: None,
            nominatim_enabled: true,
            gemini_api_key: None,
            fema_enabled: true,
            redcross_feed_url: None,
            attempt_timeout_ms: 5000,
        }
    }
}

impl ProvidersConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub default_count: usize,
    pub max_count: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_count: 20,
            max_count: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("reliefnet.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g. RELIEFNET__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("RELIEFNET")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_postgres_backend_requires_config() {
        let mut cfg = AppConfig::default();
        cfg.storage.backend = StorageBackend::Postgres;
        assert!(cfg.validate().is_err());

        cfg.storage.postgres = Some(PostgresConfig::new("postgres://localhost/reliefnet"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_pagination_ordering_enforced() {
        let mut cfg = AppConfig::default();
        cfg.pagination.default_count = 500;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_addr_falls_back_to_any() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "not-an-ip".into();
        assert_eq!(cfg.addr().ip().to_string(), "0.0.0.0");
    }
}
