use aerobook_core::{CabinFare, Clock, CoreResult, EventPublisher, SeatInventory};
use aerobook_shared::models::events::{DomainEvent, PriceUpdatedEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    /// Floor for the demand multiplier.
    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: f64,

    /// Ceiling for the demand multiplier.
    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: f64,

    /// `k` in `1 + k * ratio^2`.
    #[serde(default = "default_curve_factor")]
    pub demand_curve_factor: f64,

    /// Prices are rounded to a multiple of this many cents.
    #[serde(default = "default_rounding_cents")]
    pub rounding_cents: i64,
}

fn default_min_multiplier() -> f64 { 1.0 }
fn default_max_multiplier() -> f64 { 3.0 }
fn default_curve_factor() -> f64 { 2.0 }
fn default_rounding_cents() -> i64 { 1 }

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
            demand_curve_factor: default_curve_factor(),
            rounding_cents: default_rounding_cents(),
        }
    }
}

/// Occupancy-driven fare curve.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Multiplier for the current occupancy. Non-decreasing in `occupied / capacity`.
    pub fn calculate_demand_multiplier(&self, occupied: u32, capacity: u32) -> f64 {
        if capacity == 0 {
            return 1.0;
        }

        let ratio = (occupied.min(capacity) as f64) / (capacity as f64);
        let multiplier = 1.0 + self.config.demand_curve_factor.max(0.0) * ratio * ratio;

        multiplier.max(self.config.min_multiplier).min(self.config.max_multiplier)
    }

    /// Price of one seat given the cabin's base price and occupancy.
    pub fn price_for(&self, base_price_cents: i64, occupied: u32, capacity: u32) -> i64 {
        if capacity == 0 {
            return base_price_cents;
        }

        let multiplier = self.calculate_demand_multiplier(occupied, capacity);
        let adjusted = (base_price_cents as f64 * multiplier).round() as i64;

        // Round to the nearest step, ties upward.
        let step = self.config.rounding_cents.max(1);
        let remainder = adjusted % step;
        if remainder * 2 >= step {
            adjusted + (step - remainder)
        } else {
            adjusted - remainder
        }
    }

    pub fn reprice(&self, fare: &CabinFare) -> CabinFare {
        CabinFare {
            current_price_cents: self.price_for(fare.base_price_cents, fare.occupied, fare.capacity),
            ..fare.clone()
        }
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

/// Recomputes and stores a flight's per-cabin fares after its occupancy changed.
///
/// Runs for the same flight are serialized: the occupancy read, the price
/// write and the `PriceUpdated` event happen under one per-flight lock, so the
/// last stored price always reflects the latest occupancy.
pub struct PriceRecalculator {
    engine: PricingEngine,
    inventory: Arc<dyn SeatInventory>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    flight_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl PriceRecalculator {
    pub fn new(
        engine: PricingEngine,
        inventory: Arc<dyn SeatInventory>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            inventory,
            events,
            clock,
            flight_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn flight_lock(&self, flight_id: Uuid) -> Arc<Mutex<()>> {
        self.flight_locks.lock().await.entry(flight_id).or_default().clone()
    }

    pub async fn recalculate(&self, flight_id: Uuid) -> CoreResult<Vec<CabinFare>> {
        let lock = self.flight_lock(flight_id).await;
        let _serialized = lock.lock().await;

        let flight = self.inventory.flight(flight_id).await?;
        let fares: Vec<CabinFare> = flight.cabins.iter().map(|f| self.engine.reprice(f)).collect();

        self.inventory.set_current_prices(flight_id, &fares).await?;

        for (old, new) in flight.cabins.iter().zip(&fares) {
            if old.current_price_cents != new.current_price_cents {
                info!(
                    "Flight {} {} fare {} -> {} ({}/{} occupied)",
                    flight.flight_number, new.cabin, old.current_price_cents, new.current_price_cents,
                    new.occupied, new.capacity
                );
            }
        }

        let event = DomainEvent::PriceUpdated(PriceUpdatedEvent {
            flight_id,
            fares: fares.clone(),
            timestamp: self.clock.now().timestamp(),
        });
        if let Err(e) = self.events.publish(&event).await {
            warn!("Failed to publish price update for {}: {}", flight_id, e);
        }

        Ok(fares)
    }
}
