use anyhow::{Context, ensure};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

const CONFIG_FILE: &str = "config/telemetry";
const ENV_PREFIX: &str = "TELEMETRY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub rate_limit: RateLimitSettings,
    pub health: HealthSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: 256 * 1024,
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            url: "sqlite:telemetry.db".to_string(),
            max_connections: 5,
            acquire_timeout_ms: 5_000,
        }
    }
}

impl StorageSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitSettings {
    pub permit_limit: u32,
    pub window_secs: u64,
    pub retry_after_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            permit_limit: 100,
            window_secs: 10,
            retry_after_secs: 10,
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HealthSettings {
    pub readiness_timeout_ms: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            readiness_timeout_ms: 2_000,
        }
    }
}

impl HealthSettings {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=info,sqlx=warn".to_string(),
            json: true,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.server.max_body_bytes > 0, "server.max_body_bytes must be positive");
        ensure!(self.storage.max_connections > 0, "storage.max_connections must be positive");
        ensure!(self.storage.acquire_timeout_ms > 0, "storage.acquire_timeout_ms must be positive");
        ensure!(self.rate_limit.permit_limit > 0, "rate_limit.permit_limit must be positive");
        ensure!(self.rate_limit.window_secs > 0, "rate_limit.window_secs must be positive");
        ensure!(self.health.readiness_timeout_ms > 0, "health.readiness_timeout_ms must be positive");
        Ok(())
    }
}

/// Load `config/telemetry.*` (optional) overlaid with `TELEMETRY_<SECTION>__<KEY>` variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(CONFIG_FILE).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = settings.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}
