use crate::error::AppError;
use crate::state::AppState;
use aerobook_core::{CoreResult, EventPublisher};
use aerobook_shared::models::events::DomainEvent;
use async_trait::async_trait;
use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{opts, Encoder, IntCounterVec, Registry, TextEncoder};

/// Prometheus counters for the booking core.
///
/// Successful transitions are counted from the event stream; rejections are
/// counted by the handlers, which are the only place that sees them.
pub struct ApiMetrics {
    registry: Registry,
    /// Labels: `outcome` (granted, denied, released, expired)
    holds: IntCounterVec,
    /// Labels: `outcome` (confirmed, rejected, cancelled), `kind`
    bookings: IntCounterVec,
    /// Labels: `event`
    price_recalculations: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let holds = IntCounterVec::new(opts!("aerobook_holds_total", "Seat hold transitions"), &["outcome"])?;
        let bookings = IntCounterVec::new(
            opts!("aerobook_bookings_total", "Booking outcomes"),
            &["outcome", "kind"],
        )?;
        let price_recalculations = IntCounterVec::new(
            opts!("aerobook_price_recalculations_total", "Per-flight fare recalculations"),
            &["event"],
        )?;

        registry.register(Box::new(holds.clone()))?;
        registry.register(Box::new(bookings.clone()))?;
        registry.register(Box::new(price_recalculations.clone()))?;

        Ok(Self { registry, holds, bookings, price_recalculations })
    }

    pub fn hold_denied(&self) {
        self.holds.with_label_values(&["denied"]).inc();
    }

    pub fn booking_rejected(&self, kind: &str) {
        self.bookings.with_label_values(&["rejected", kind]).inc();
    }

    pub fn hold_count(&self, outcome: &str) -> u64 {
        self.holds.with_label_values(&[outcome]).get()
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[async_trait]
impl EventPublisher for ApiMetrics {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        match event {
            DomainEvent::SeatHeld(_) => self.holds.with_label_values(&["granted"]).inc(),
            DomainEvent::SeatReleased(e) if e.reason == "EXPIRED" => self.holds.with_label_values(&["expired"]).inc(),
            DomainEvent::SeatReleased(_) => self.holds.with_label_values(&["released"]).inc(),
            DomainEvent::BookingConfirmed(_) => self.bookings.with_label_values(&["confirmed", "OK"]).inc(),
            DomainEvent::BookingCancelled(_) => self.bookings.with_label_values(&["cancelled", "OK"]).inc(),
            DomainEvent::PriceUpdated(_) => self.price_recalculations.with_label_values(&[event.name()]).inc(),
        }
        Ok(())
    }
}

pub async fn export_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .export()
        .map_err(|e| AppError::InternalServerError(format!("metrics encoding failed: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
