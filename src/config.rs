use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;

use crate::{
    conflict::{DEFAULT_MAX_SUGGESTIONS, DEFAULT_SLOT_STEP_MINUTES},
    models::Location,
    queue::DEFAULT_STEP_MINUTES,
};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    pub schedule: ScheduleConfig,
    pub queue: QueueConfig,
    pub locations: Vec<Location>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the booking service
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Only needed by commands that persist changes
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Opening time, "HH:MM"
    pub open_time: String,
    /// Closing time, "HH:MM"
    pub close_time: String,
    pub slot_step_minutes: u32,
    pub max_suggestions: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            open_time: "09:00".to_string(),
            close_time: "21:00".to_string(),
            slot_step_minutes: DEFAULT_SLOT_STEP_MINUTES,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct QueueConfig {
    pub duration_step_minutes: i32,
    pub offset_step_minutes: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            duration_step_minutes: DEFAULT_STEP_MINUTES,
            offset_step_minutes: DEFAULT_STEP_MINUTES,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml` files and `KITE__*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kite-scheduler");

        let builder = Self::defaults()?
            // Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // Environment variables (KITE__SCHEDULE__OPEN_TIME=...)
            .add_source(Environment::with_prefix("KITE").separator("__"));

        Self::finish(builder)
    }

    /// Load configuration from one explicit file on top of the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from(path.to_path_buf()).required(true));
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let locations: Vec<&str> = Location::ALL.iter().map(Location::name).collect();
        let database_url = std::env::var("DATABASE_URL").ok();

        let builder = Config::builder()
            // Api
            .set_default("api.base_url", ApiConfig::default().base_url)?
            // Network
            .set_default("network.request_timeout_secs", 30)?
            .set_default("network.connect_timeout_secs", 10)?
            // Database
            .set_default("database.url", database_url)?
            // Schedule
            .set_default("schedule.open_time", "09:00")?
            .set_default("schedule.close_time", "21:00")?
            .set_default("schedule.slot_step_minutes", i64::from(DEFAULT_SLOT_STEP_MINUTES))?
            .set_default("schedule.max_suggestions", DEFAULT_MAX_SUGGESTIONS as i64)?
            // Queue
            .set_default("queue.duration_step_minutes", DEFAULT_STEP_MINUTES)?
            .set_default("queue.offset_step_minutes", DEFAULT_STEP_MINUTES)?
            // Locations
            .set_default("locations", locations)?;

        Ok(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let s = builder.build().context("Failed to build configuration")?;
        s.try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
