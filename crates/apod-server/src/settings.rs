//! Server settings
//!
//! Values come from environment variables layered over built-in defaults.

use anyhow::{Context, Result};
use config::{Environment, Map};
use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://apod.db";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
pub const DEFAULT_APOD_API_URL: &str = "https://api.nasa.gov/planetary/apod";
/// NASA's shared, heavily rate-limited key
pub const DEMO_API_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// sqlx SQLite connection string (`DATABASE_URL`)
    pub database_url: String,
    /// Listen address (`BIND_ADDRESS`)
    pub bind_address: String,
    /// Upstream endpoint (`APOD_API_URL`)
    pub apod_api_url: String,
    /// Upstream key (`APOD_API_KEY`)
    pub apod_api_key: String,
    /// Run the ingestion step before serving (`INGEST_ON_STARTUP`)
    pub ingest_on_startup: bool,
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::default().try_parsing(true))
    }

    /// Load from an explicit variable map instead of the process environment
    pub fn from_map(vars: Map<String, String>) -> Result<Self> {
        Self::load(Environment::default().try_parsing(true).source(Some(vars)))
    }

    fn load(env: Environment) -> Result<Self> {
        let config: Config = config::Config::builder()
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("apod_api_url", DEFAULT_APOD_API_URL)?
            .set_default("apod_api_key", DEMO_API_KEY)?
            .set_default("ingest_on_startup", true)?
            .add_source(env)
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if config.apod_api_key == DEMO_API_KEY {
            tracing::warn!("APOD_API_KEY not set, using {} (rate limited)", DEMO_API_KEY);
        }

        Ok(config)
    }
}
