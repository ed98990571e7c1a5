//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{copies, health, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LMS API",
        version = "1.0.0",
        description = "Library checkout and return API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Loans
        loans::checkout,
        loans::return_loan,
        loans::renew_loan,
        loans::lookup_loan,
        loans::list_loans,
        // Inventory
        copies::set_copies,
    ),
    components(
        schemas(
            // Loans
            loans::CheckoutRequest,
            loans::RenewRequest,
            loans::ReturnResponse,
            loans::LookupResponse,
            crate::models::LoanKey,
            crate::models::LoanRecord,
            crate::models::LoanView,
            crate::models::BookSummary,
            crate::models::Branch,
            crate::models::Borrower,
            // Inventory
            copies::SetCopiesRequest,
            crate::models::CopyRecord,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "loans", description = "Checkout, return and renewal"),
        (name = "copies", description = "Branch inventory")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
