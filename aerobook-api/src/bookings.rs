use aerobook_core::{Booking, TicketSpec};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Claims, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub tickets: Vec<TicketSpec>,
}

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    match state.bookings.create_booking(&claims.sub, req.tickets).await {
        Ok(booking) => Ok((StatusCode::CREATED, Json(booking))),
        Err(e) => {
            state.metrics.booking_rejected(e.kind());
            Err(e.into())
        }
    }
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_bookings(&claims.sub).await?))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.get_booking(booking_id).await?;
    authorize(&claims, &booking)?;
    Ok(Json(booking))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.get_booking(booking_id).await?;
    authorize(&claims, &booking)?;

    let cancelled = state.bookings.cancel_booking(booking_id).await?;
    tracing::info!("Booking {} cancelled by {}", booking_id, claims.sub);
    Ok(Json(cancelled))
}

fn authorize(claims: &Claims, booking: &Booking) -> Result<(), AppError> {
    if booking.owner == claims.sub || claims.is_admin() {
        Ok(())
    } else {
        Err(AppError::AuthorizationError("booking belongs to another customer".to_string()))
    }
}
