use aerobook_core::{CoreError, CoreResult, EventPublisher};
use aerobook_shared::models::events::{CabinFare, DomainEvent};
use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Free seats per cabin as last observed, for cheap flight listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CabinAvailability {
    pub cabin: aerobook_core::Cabin,
    pub free: u32,
    pub current_price_cents: i64,
}

/// Per-cabin availability derived from a flight's current fares.
pub fn availability_of(fares: &[CabinFare]) -> Vec<CabinAvailability> {
    fares.iter().map(CabinAvailability::from).collect()
}

impl From<&CabinFare> for CabinAvailability {
    fn from(fare: &CabinFare) -> Self {
        Self {
            cabin: fare.cabin,
            free: fare.capacity.saturating_sub(fare.occupied),
            current_price_cents: fare.current_price_cents,
        }
    }
}

fn availability_key(flight_id: Uuid) -> String {
    format!("flight:{}:availability", flight_id)
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    availability_ttl_seconds: u64,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            availability_ttl_seconds: 300,
        })
    }

    pub async fn set_flight_availability(&self, flight_id: Uuid, fares: &[CabinFare]) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let snapshot = availability_of(fares);
        let payload = serde_json::to_string(&snapshot).unwrap_or_else(|_| "[]".to_string());
        conn.set_ex::<_, _, ()>(availability_key(flight_id), payload, self.availability_ttl_seconds)
            .await
    }

    pub async fn get_flight_availability(&self, flight_id: Uuid) -> RedisResult<Option<Vec<CabinAvailability>>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(availability_key(flight_id)).await?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// Fixed window counter. Returns false once `limit` is exceeded.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

/// Refreshes the availability cache whenever a flight is repriced, which
/// happens after every commit and cancellation.
#[async_trait]
impl EventPublisher for RedisClient {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        if let DomainEvent::PriceUpdated(update) = event {
            self.set_flight_availability(update.flight_id, &update.fares)
                .await
                .map_err(|e| CoreError::Storage(e.to_string()))?;
            debug!("Availability cache refreshed for flight {}", update.flight_id);
        }
        Ok(())
    }
}
