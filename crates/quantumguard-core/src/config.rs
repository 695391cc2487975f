//! Gateway configuration. Load from TOML or env.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global application configuration for the QuantumGuard gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity shown in logs and `/health`.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Base directory for the SQLite store (`quantumguard.sqlite` lives under it).
    pub storage_path: String,
    /// LLM mode: "mock" answers locally, "live" calls the hosted chat-completion API.
    pub llm_mode: String,
    /// If true, the gateway serves the static dashboard from `frontend/`. (Config alias: `ui_enabled`)
    #[serde(default, alias = "ui_enabled")]
    pub frontend_enabled: bool,
}

impl CoreConfig {
    /// Load config from file and environment.
    /// Precedence: env `QG_CONFIG` path > `config/gateway.toml` > defaults,
    /// with `QG_*` environment variables overriding everything.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("QG_CONFIG").unwrap_or_else(|_| "config/gateway.toml".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "QuantumGuard Gateway")?
            .set_default("port", 8000_i64)?
            .set_default("storage_path", "./data")?
            .set_default("llm_mode", "mock")?
            .set_default("frontend_enabled", false)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("QG").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        // No config/gateway.toml in the test cwd, so defaults win.
        let config = CoreConfig::load().expect("load defaults");
        assert_eq!(config.port, 8000);
        assert_eq!(config.llm_mode, "mock");
        assert!(!config.frontend_enabled);
    }
}
