//! Configuration management

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub tracking: TrackingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under /uploads
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    /// Bearer token accepted by the admin stats endpoint
    pub admin_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Secret mixed into every visitor hash. Required, there is no fallback.
    pub salt: String,
    /// Treat requests without a User-Agent header as automated traffic
    #[serde(default)]
    pub missing_user_agent_is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";

        let builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "visitlog.db")?
            .set_default("logging.level", "info")?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("VISITLOG").separator("__"));

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Invalid port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }
        if self.server.admin_token.trim().is_empty() {
            anyhow::bail!("server.admin_token must be set");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        // An unset salt would make visitor hashes trivially reversible
        if self.tracking.salt.trim().is_empty() {
            anyhow::bail!("tracking.salt must be set (e.g. VISITLOG_TRACKING__SALT)");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid logging level '{}'. Must be one of: {:?}", self.logging.level, valid_levels);
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
