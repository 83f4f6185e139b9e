//! API configuration

use serde::Deserialize;

use domain_coverage::EngineConfig;

/// API configuration
///
/// Read from `API_*` environment variables; the nested engine section uses
/// `__` (e.g. `API_ENGINE__FUTURE_DATE_TOLERANCE_DAYS=3`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Log level or filter directive
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
    /// JSON catalog snapshot loaded at startup
    pub catalog_path: Option<String>,
    /// Coverage engine settings
    pub engine: EngineConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            json_logs: false,
            catalog_path: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
