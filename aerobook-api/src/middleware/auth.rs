use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

pub const ROLE_GUEST: &str = "GUEST";
pub const ROLE_CUSTOMER: &str = "CUSTOMER";
pub const ROLE_ADMIN: &str = "ADMIN";

// ============================================================================
// JWT Claims
// ============================================================================

/// `sub` doubles as the owner token for holds and bookings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub fn issue_token(auth: &AuthConfig, sub: &str, role: &str) -> Result<(String, Claims), AppError> {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;
    Ok((token, claims))
}

fn bearer_claims(auth: &AuthConfig, headers: &HeaderMap) -> Result<Claims, AppError> {
    let token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("missing bearer token".to_string()))?;

    decode::<Claims>(token, &DecodingKey::from_secret(auth.secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AppError::AuthenticationError("invalid or expired token".to_string()))
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

/// Any signed-in caller: guests, customers and admins.
pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = bearer_claims(&state.auth, req.headers())?;

    if ![ROLE_GUEST, ROLE_CUSTOMER, ROLE_ADMIN].contains(&claims.role.as_str()) {
        return Err(AppError::AuthorizationError(format!("role {} cannot book", claims.role)));
    }
    if claims.sub.trim().is_empty() {
        return Err(AppError::AuthenticationError("token has no subject".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = bearer_claims(&state.auth, req.headers())?;

    if !claims.is_admin() {
        return Err(AppError::AuthorizationError("admin role required".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
