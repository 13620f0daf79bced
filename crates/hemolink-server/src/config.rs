use hemolink_registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// External DHIS2 registry connection and identifier mapping
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.sync.default_days_back == 0 {
            return Err("sync.default_days_back must be > 0".into());
        }
        if self.sync.full_sync_days_back == 0 {
            return Err("sync.full_sync_days_back must be > 0".into());
        }
        if self.sync.job_timeout_ms == 0 {
            return Err("sync.job_timeout_ms must be > 0".into());
        }
        if self.rate_limit.enabled
            && (self.rate_limit.general_per_minute == 0
                || self.rate_limit.import_per_minute == 0
                || self.rate_limit.sync_per_minute == 0)
        {
            return Err("rate_limit buckets must be > 0 when enabled".into());
        }
        if self.audit.retention_days == 0 {
            return Err("audit.retention_days must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.registry
            .validate()
            .map_err(|e| format!("registry config error: {e}"))?;
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

    /// Returns the base URL for the server.
    /// If `base_url` is configured, returns that; otherwise computes from host:port.
    pub fn base_url(&self) -> String {
        self.server
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL for the server, used in links and responses.
    /// If not set, defaults to http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8001
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Window for donation syncs when no days_back is given.
    #[serde(default = "default_days_back")]
    pub default_days_back: i64,
    /// Window for the donations leg of a full sync.
    #[serde(default = "default_full_sync_days_back")]
    pub full_sync_days_back: i64,
    /// Overall bound on one sync job; exceeding it forces the job into
    /// the error state and releases the per-type lock.
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,
}

fn default_days_back() -> i64 {
    7
}
fn default_full_sync_days_back() -> i64 {
    30
}
fn default_job_timeout_ms() -> u64 {
    300_000
}

impl SyncSettings {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            default_days_back: default_days_back(),
            full_sync_days_back: default_full_sync_days_back(),
            job_timeout_ms: default_job_timeout_ms(),
        }
    }
}

/// Fixed-window request limits per category, keyed by client address.
/// Health endpoints are always exempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_general_per_minute")]
    pub general_per_minute: u32,
    #[serde(default = "default_import_per_minute")]
    pub import_per_minute: u32,
    #[serde(default = "default_sync_per_minute")]
    pub sync_per_minute: u32,
}

fn default_rate_limit_enabled() -> bool {
    true
}
fn default_general_per_minute() -> u32 {
    100
}
fn default_import_per_minute() -> u32 {
    10
}
fn default_sync_per_minute() -> u32 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            general_per_minute: default_general_per_minute(),
            import_per_minute: default_import_per_minute(),
            sync_per_minute: default_sync_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Entries older than this are removed by the scheduled sweep.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_retention_days() -> i64 {
    365
}
fn default_sweep_interval_secs() -> u64 {
    3_600
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
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
                let default_path = PathBuf::from("hemolink.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., HEMOLINK__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("HEMOLINK")
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
    fn test_default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_rate_bucket_rejected_when_enabled() {
        let mut cfg = AppConfig::default();
        cfg.rate_limit.sync_per_minute = 0;
        assert!(cfg.validate().is_err());

        cfg.rate_limit.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_merge_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [sync]
            default_days_back = 14

            [registry]
            base_url = "https://dhis2.example.org"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.sync.default_days_back, 14);
        assert_eq!(cfg.registry.base_url, "https://dhis2.example.org");
        // Untouched sections keep defaults
        assert_eq!(cfg.rate_limit.import_per_minute, 10);
        assert_eq!(cfg.audit.retention_days, 365);
    }

    #[test]
    fn test_addr_resolution() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.addr().port(), 8001);
        assert_eq!(cfg.base_url(), "http://0.0.0.0:8001");
    }
}
