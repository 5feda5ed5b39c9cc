use crate::app_config::BusinessRules;
use aerobook_core::CoreError;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Operators can override hold and passenger rules at runtime through the
    /// `business_rules` table. Rows look like `{"value": <number>}`.
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<(String, Value)> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        Ok(apply_rule_overrides(defaults, rows))
    }
}

pub(crate) fn apply_rule_overrides(mut rules: BusinessRules, rows: Vec<(String, Value)>) -> BusinessRules {
    for (key, value) in rows {
        let Some(v) = value.get("value") else {
            warn!("Ignoring business rule {} without a value", key);
            continue;
        };
        match key.as_str() {
            "seat_hold_seconds" => {
                if let Some(u) = v.as_u64() {
                    rules.seat_hold_seconds = u;
                }
            }
            "max_seat_hold_seconds" => {
                if let Some(u) = v.as_u64() {
                    rules.max_seat_hold_seconds = u;
                }
            }
            "adult_age" => {
                if let Some(age) = v.as_u64().and_then(|u| u8::try_from(u).ok()) {
                    rules.adult_age = age;
                }
            }
            "max_tickets_per_booking" => {
                if let Some(u) = v.as_u64() {
                    rules.max_tickets_per_booking = u as usize;
                }
            }
            _ => warn!("Unknown business rule {}", key),
        }
    }
    rules
}

/// Every sqlx failure surfaces to the core as a storage error.
pub(crate) fn storage(e: sqlx::Error) -> CoreError {
    CoreError::Storage(e.to_string())
}
