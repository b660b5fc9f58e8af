use config::{ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    /// Seconds between rate limiter purges
    pub purge_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8090)?
            .set_default("server.workers", 4)?
            .set_default("server.purge_interval_secs", 60)?
            // Logging defaults
            .set_default("log.level", "info")?
            .set_default("log.json", true)?;

        builder = builder.add_source(
            Environment::with_prefix("CLAIM_SERVER")
                .separator("__")
                .try_parsing(true),
        );

        if let Ok(port) = env::var("SERVICE_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }
}

/// Ledger configuration: a TOML file named by `CLAIMS_CONFIG`, else `CLAIMS_*` variables
pub fn load_ledger_config() -> claim_ledger::Result<claim_ledger::Config> {
    match env::var("CLAIMS_CONFIG") {
        Ok(path) => claim_ledger::Config::from_file(path),
        Err(_) => claim_ledger::Config::from_env(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_env().unwrap();
        assert!(!settings.server.host.is_empty());
        assert!(settings.server.workers > 0);
        assert!(!settings.log.level.is_empty());
    }
}
