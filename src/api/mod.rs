//! API handlers for the LMS REST endpoints

pub mod copies;
pub mod health;
pub mod loans;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, services::desks::Role, AppState};

/// Header carrying the caller's role
pub const ROLE_HEADER: &str = "x-lms-role";

/// Extractor for the role the caller acts in
pub struct CallerRole(pub Role);

#[async_trait]
impl<S> FromRequestParts<S> for CallerRole
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing role header".to_string()))?;

        Ok(CallerRole(role.parse()?))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Loans
        .route("/loans", get(loans::list_loans))
        .route("/loans", post(loans::checkout))
        .route("/loans/lookup", get(loans::lookup_loan))
        .route("/loans/return", post(loans::return_loan))
        .route("/loans/renew", post(loans::renew_loan))
        // Inventory
        .route("/copies", put(copies::set_copies))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
