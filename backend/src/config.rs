//! Configuration management for the Inventory & Procurement service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with IPM_ prefix (`IPM__INVENTORY__Z_SCORE=2.33`)

use std::collections::HashMap;

use config::{ConfigError, Environment, File};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::cost::CostFeedbackSettings;
use shared::metrics::{HoldingCostMethod, MetricsSettings};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Log output format: "pretty" or "json"
    pub log_format: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Inventory metrics and reorder configuration
    pub inventory: InventoryConfig,

    /// Task queue configuration
    pub jobs: JobsConfig,

    /// Daily scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Role → `resource:action` grants; roles left out use the built-in catalog
    #[serde(default)]
    pub access: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// "percentage" or "fixed"
    pub holding_cost_method: HoldingCostMethod,

    /// Annual holding cost as a fraction of unit price
    pub holding_cost_percentage: f64,

    /// Annual holding cost per unit in fixed mode
    pub holding_cost_fixed: f64,

    /// Target service level; keep in step with `z_score`
    pub service_level: f64,

    /// Z-score matching `service_level` (1.65 for 95%, 2.33 for 99%)
    pub z_score: f64,

    /// Lead time used when an item has none
    pub default_lead_time_days: i32,

    /// Days of stock movements feeding the demand statistics
    pub history_days: i64,

    /// Days between an automatic request and its needed-by date
    pub reorder_lead_window_days: i64,

    /// Receipts averaged into the learned ordering cost
    pub cost_feedback_window: usize,

    /// Relative price change that re-bands the holding percentage
    pub price_change_threshold: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    /// Buffered jobs before `enqueue` waits
    pub queue_capacity: usize,

    /// Attempts per job before it is logged as failed
    pub max_attempts: u32,

    /// Delay between attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Hours between metric recomputes
    pub metrics_interval_hours: u64,
}

fn to_decimal(value: f64, key: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_f64(value)
        .ok_or_else(|| ConfigError::Message(format!("{} is not a valid number: {}", key, value)))
}

impl InventoryConfig {
    /// Calculator settings for the shared metrics module
    pub fn metrics_settings(&self) -> Result<MetricsSettings, ConfigError> {
        Ok(MetricsSettings {
            holding_cost_method: self.holding_cost_method,
            holding_cost_percentage: to_decimal(
                self.holding_cost_percentage,
                "inventory.holding_cost_percentage",
            )?,
            holding_cost_fixed: to_decimal(self.holding_cost_fixed, "inventory.holding_cost_fixed")?,
            service_level: to_decimal(self.service_level, "inventory.service_level")?,
            z_score: to_decimal(self.z_score, "inventory.z_score")?,
            default_lead_time_days: self.default_lead_time_days,
        })
    }

    pub fn cost_feedback_settings(&self) -> Result<CostFeedbackSettings, ConfigError> {
        Ok(CostFeedbackSettings {
            window: self.cost_feedback_window,
            price_change_threshold: to_decimal(
                self.price_change_threshold,
                "inventory.price_change_threshold",
            )?,
        })
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("IPM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::defaults(config::Config::builder(), &environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (IPM_ prefix)
            .add_source(
                Environment::with_prefix("IPM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("log_format", "pretty")?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "postgres://localhost/inventory_procurement")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("inventory.holding_cost_method", "percentage")?
            .set_default("inventory.holding_cost_percentage", 0.20)?
            .set_default("inventory.holding_cost_fixed", 0.0)?
            .set_default("inventory.service_level", 0.95)?
            .set_default("inventory.z_score", 1.65)?
            .set_default("inventory.default_lead_time_days", 7)?
            .set_default("inventory.history_days", 365)?
            .set_default("inventory.reorder_lead_window_days", 3)?
            .set_default("inventory.cost_feedback_window", 10)?
            .set_default("inventory.price_change_threshold", 0.10)?
            .set_default("jobs.queue_capacity", 256)?
            .set_default("jobs.max_attempts", 3)?
            .set_default("jobs.retry_backoff_ms", 500)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.metrics_interval_hours", 24)
    }

    /// Configuration built from code defaults only
    pub fn from_defaults() -> Result<Self, ConfigError> {
        Self::defaults(config::Config::builder(), "development")?
            .build()?
            .try_deserialize()
    }
}
