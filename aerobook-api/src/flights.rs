use aerobook_core::{Cabin, CoreError, Flight, NewFlight, Seat, SeatState};
use aerobook_shared::models::events::DomainEvent;
use aerobook_store::redis_repo::{availability_of, CabinAvailability};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{error::AppError, middleware::Claims, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

/// A seat as one caller sees it. Other owners' identities are never exposed.
#[derive(Debug, Serialize)]
pub struct SeatView {
    pub seat_number: String,
    pub state: SeatState,
    pub held_by_you: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_expires_at: Option<DateTime<Utc>>,
}

impl SeatView {
    fn for_owner(seat: Seat, owner: &str) -> Self {
        let held_by_you = seat.state == SeatState::Held && seat.hold_owner.as_deref() == Some(owner);
        Self {
            seat_number: seat.seat_number,
            state: seat.state,
            held_by_you,
            hold_expires_at: if held_by_you { seat.hold_expires_at } else { None },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SeatMapResponse {
    pub flight_id: Uuid,
    pub cabin: Cabin,
    pub current_price_cents: Option<i64>,
    pub seats: Vec<SeatView>,
}

pub(crate) fn parse_cabin(raw: &str) -> Result<Cabin, AppError> {
    raw.parse()
        .map_err(|e| AppError::ValidationError(format!("{}", e)))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_flight(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewFlight>,
) -> Result<(StatusCode, Json<Flight>), AppError> {
    let flight = state.inventory.register_flight(&req).await?;
    tracing::info!("Flight {} registered by {}", flight.flight_number, claims.sub);
    Ok((StatusCode::CREATED, Json(flight)))
}

pub async fn list_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, AppError> {
    Ok(Json(state.inventory.list_flights().await?))
}

pub async fn get_flight(
    State(state): State<AppState>,
    Path(flight_id): Path<Uuid>,
) -> Result<Json<Flight>, AppError> {
    Ok(Json(state.inventory.flight(flight_id).await?))
}

/// Free seats and current fare per cabin.
///
/// Read from the Redis cache when one is configured. The cache is only
/// written by price updates, so a miss or a cache failure falls back to
/// inventory without filling it.
pub async fn get_availability(
    State(state): State<AppState>,
    Path(flight_id): Path<Uuid>,
) -> Result<Json<Vec<CabinAvailability>>, AppError> {
    if let Some(redis) = &state.redis {
        match redis.get_flight_availability(flight_id).await {
            Ok(Some(cached)) => return Ok(Json(cached)),
            Ok(None) => tracing::debug!("Availability cache miss for flight {}", flight_id),
            Err(e) => tracing::warn!("Availability cache read failed for flight {}: {}", flight_id, e),
        }
    }

    let flight = state.inventory.flight(flight_id).await?;
    Ok(Json(availability_of(&flight.cabins)))
}

pub async fn get_seat_map(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((flight_id, cabin)): Path<(Uuid, String)>,
) -> Result<Json<SeatMapResponse>, AppError> {
    let cabin = parse_cabin(&cabin)?;
    let flight = state.inventory.flight(flight_id).await?;
    let current_price_cents = flight.current_price(cabin);
    if current_price_cents.is_none() {
        return Err(CoreError::NotFound(format!("cabin {} on flight {}", cabin, flight_id)).into());
    }

    let seats = state
        .coordinator
        .seat_map(flight_id, cabin)
        .await?
        .into_iter()
        .map(|s| SeatView::for_owner(s, &claims.sub))
        .collect();

    Ok(Json(SeatMapResponse {
        flight_id,
        cabin,
        current_price_cents,
        seats,
    }))
}

/// Live seat and fare events for one flight.
pub async fn stream_flight(
    State(state): State<AppState>,
    Path(flight_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    state.inventory.flight(flight_id).await?;
    let rx = state.sse_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.concerns_flight(flight_id) => Some(sse_event(&event)),
            Ok(_) => None,
            Err(e) => {
                // Lagged receivers skip ahead; clients re-read the seat map.
                tracing::warn!("SSE subscriber for {} lagged: {}", flight_id, e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(event: &DomainEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.name()).json_data(event)
}
