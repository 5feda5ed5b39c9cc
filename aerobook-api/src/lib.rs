use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod bookings;
pub mod error;
pub mod events;
pub mod flights;
pub mod holds;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod worker;

pub use state::{AppState, AuthConfig};

use middleware::{admin_auth_middleware, customer_auth_middleware, rate_limit_middleware};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .route(
            "/flights",
            get(flights::list_flights).merge(
                post(flights::create_flight).layer(from_fn_with_state(state.clone(), admin_auth_middleware)),
            ),
        )
        .route("/flights/{flight_id}", get(flights::get_flight))
        .route("/flights/{flight_id}/availability", get(flights::get_availability));

    let customer = Router::new()
        .route("/flights/{flight_id}/seats/{cabin}", get(flights::get_seat_map))
        .route("/flights/{flight_id}/stream", get(flights::stream_flight))
        .route(
            "/seats/{flight_id}/{cabin}/{seat_number}/hold",
            post(holds::hold_seat).delete(holds::release_seat),
        )
        .route("/holds", delete(holds::release_all))
        .route("/bookings", post(bookings::create_booking).get(bookings::list_bookings))
        .route("/bookings/{booking_id}", get(bookings::get_booking))
        .route("/bookings/{booking_id}/cancel", patch(bookings::cancel_booking))
        .route_layer(from_fn_with_state(state.clone(), customer_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::export_metrics))
        .nest("/v1/auth", auth::routes())
        .nest("/v1", public.merge(customer))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
