use aerobook_catalog::PricingConfig;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BusinessRules {
    #[serde(default = "default_seat_hold_seconds")]
    pub seat_hold_seconds: u64,
    #[serde(default = "default_max_seat_hold_seconds")]
    pub max_seat_hold_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub hold_sweep_interval_seconds: u64,
    #[serde(default = "default_adult_age")]
    pub adult_age: u8,
    #[serde(default = "default_max_tickets")]
    pub max_tickets_per_booking: usize,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_seat_hold_seconds() -> u64 { 900 }
fn default_max_seat_hold_seconds() -> u64 { 1800 }
fn default_sweep_interval() -> u64 { 30 }
fn default_adult_age() -> u8 { 18 }
fn default_max_tickets() -> usize { 9 }
fn default_currency() -> String { "USD".to_string() }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            seat_hold_seconds: default_seat_hold_seconds(),
            max_seat_hold_seconds: default_max_seat_hold_seconds(),
            hold_sweep_interval_seconds: default_sweep_interval(),
            adult_age: default_adult_age(),
            max_tickets_per_booking: default_max_tickets(),
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: i64,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,
}

fn default_requests_per_window() -> i64 { 100 }
fn default_window_seconds() -> i64 { 60 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_seconds: default_window_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `AEROBOOK__SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("AEROBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parse a single TOML document, without layering.
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
