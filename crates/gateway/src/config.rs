use common::{Environment, LogLevel};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub bind_addr: String,
    pub upload_folder: PathBuf,
    pub max_content_length: usize,
    pub detector_url: String,
    pub detector_timeout_secs: u64,
    pub imagery_command: String,
    pub imagery_zoom: u8,
    pub imagery_source: String,
    pub otel_endpoint: Option<String>,
}

impl Config {
    pub fn detector_timeout(&self) -> Duration {
        Duration::from_secs(self.detector_timeout_secs)
    }
}

/// Defaults overlaid with `GATEWAY_*` environment variables.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    load(env_source())
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix("GATEWAY")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load(env: config::Environment) -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("bind_addr", "0.0.0.0:5000")?
        .set_default("upload_folder", "uploads")?
        .set_default("max_content_length", 16_i64 * 1024 * 1024)?
        .set_default("detector_url", "http://localhost:8000")?
        .set_default("detector_timeout_secs", 300_i64)?
        .set_default("imagery_command", "python3 scripts/fetch_tiles.py")?
        .set_default("imagery_zoom", 18_i64)?
        .set_default("imagery_source", "Satellite")?
        .add_source(env)
        .build()?;

    config.try_deserialize::<Config>()
}
