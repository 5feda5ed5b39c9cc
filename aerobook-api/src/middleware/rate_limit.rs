use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::warn;

use crate::state::AppState;

/// Fixed-window limit per client IP. Only active when Redis is configured,
/// and fails open when Redis is unreachable.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };
    let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>().cloned() else {
        return next.run(req).await;
    };

    let key = format!("ratelimit:{}", addr.ip());
    let limit = &state.rate_limit;
    match redis.check_rate_limit(&key, limit.requests_per_window, limit.window_seconds).await {
        Ok(true) => next.run(req).await,
        Ok(false) => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response(),
        Err(e) => {
            warn!("Rate limiter unavailable: {}", e);
            next.run(req).await
        }
    }
}
