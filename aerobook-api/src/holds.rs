use aerobook_core::{Cabin, CoreError, SeatRef};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, flights::parse_cabin, middleware::Claims, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct HoldParams {
    /// Requested lifetime; clamped to the configured maximum.
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HoldResponse {
    pub flight_id: Uuid,
    pub cabin: Cabin,
    pub seat_number: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseAllResponse {
    pub released: Vec<SeatRef>,
}

pub async fn hold_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((flight_id, cabin, seat_number)): Path<(Uuid, String, String)>,
    Query(params): Query<HoldParams>,
) -> Result<(StatusCode, Json<HoldResponse>), AppError> {
    let cabin = parse_cabin(&cabin)?;
    let ttl = state.coordinator.policy().ttl_from_seconds(params.ttl_seconds)?;

    let hold = match state
        .coordinator
        .hold(flight_id, cabin, &seat_number, &claims.sub, Some(ttl))
        .await
    {
        Ok(hold) => hold,
        Err(e) => {
            if matches!(e, CoreError::SeatUnavailable(_)) {
                state.metrics.hold_denied();
            }
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(HoldResponse {
            flight_id,
            cabin,
            seat_number: hold.seat.seat_number,
            expires_at: hold.expires_at,
        }),
    ))
}

pub async fn release_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((flight_id, cabin, seat_number)): Path<(Uuid, String, String)>,
) -> Result<StatusCode, AppError> {
    let cabin = parse_cabin(&cabin)?;
    state
        .coordinator
        .release(flight_id, cabin, &seat_number, &claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn release_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ReleaseAllResponse>, AppError> {
    let released = state.coordinator.release_all(&claims.sub).await?;
    Ok(Json(ReleaseAllResponse { released }))
}
