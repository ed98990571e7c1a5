//! Loan endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{CopyRecord, LoanKey, LoanRecord, LoanView},
};

use super::CallerRole;

/// Checkout request
#[derive(Deserialize, ToSchema, Validate)]
pub struct CheckoutRequest {
    #[validate(range(min = 1))]
    pub book_id: i32,
    #[validate(range(min = 1))]
    pub branch_id: i32,
    #[validate(range(min = 1))]
    pub card_no: i32,
    /// Due date; omitted to use the standard loan period
    pub due_date: Option<NaiveDate>,
}

impl CheckoutRequest {
    fn key(&self) -> LoanKey {
        LoanKey::new(self.book_id, self.branch_id, self.card_no)
    }
}

/// Renewal (due date override) request
#[derive(Deserialize, ToSchema, Validate)]
pub struct RenewRequest {
    #[validate(range(min = 1))]
    pub book_id: i32,
    #[validate(range(min = 1))]
    pub branch_id: i32,
    #[validate(range(min = 1))]
    pub card_no: i32,
    /// New due date, strictly after the current one
    pub due_date: NaiveDate,
}

/// Return response with the branch's updated inventory
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    pub copies: CopyRecord,
}

/// Lookup response; absence is not an error
#[derive(Serialize, ToSchema)]
pub struct LookupResponse {
    pub found: bool,
    pub loan: Option<LoanRecord>,
}

/// Check a book out
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanRecord),
        (status = 403, description = "Role may not check out"),
        (status = 404, description = "No copies record for book at branch"),
        (status = 409, description = "No copies available, duplicate loan or bad due date")
    )
)]
pub async fn checkout(
    State(state): State<crate::AppState>,
    CallerRole(role): CallerRole,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, Json<LoanRecord>)> {
    request.validate()?;

    let loan = state
        .services
        .desk(role)
        .checkout(request.key(), request.due_date)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/return",
    tag = "loans",
    request_body = LoanKey,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Loan not found"),
        (status = 500, description = "Ledger inconsistency")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    CallerRole(role): CallerRole,
    Json(key): Json<LoanKey>,
) -> AppResult<Json<ReturnResponse>> {
    key.validate()?;

    let copies = state.services.desk(role).return_loan(key).await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        copies,
    }))
}

/// Move a loan's due date forward
#[utoipa::path(
    post,
    path = "/loans/renew",
    tag = "loans",
    request_body = RenewRequest,
    responses(
        (status = 200, description = "Loan renewed", body = LoanRecord),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "New due date not after the current one")
    )
)]
pub async fn renew_loan(
    State(state): State<crate::AppState>,
    CallerRole(role): CallerRole,
    Json(request): Json<RenewRequest>,
) -> AppResult<Json<LoanRecord>> {
    request.validate()?;

    let key = LoanKey::new(request.book_id, request.branch_id, request.card_no);
    let loan = state
        .services
        .desk(role)
        .renew(key, request.due_date)
        .await?;

    Ok(Json(loan))
}

/// Look up a single loan
#[utoipa::path(
    get,
    path = "/loans/lookup",
    tag = "loans",
    params(LoanKey),
    responses(
        (status = 200, description = "Lookup result", body = LookupResponse)
    )
)]
pub async fn lookup_loan(
    State(state): State<crate::AppState>,
    CallerRole(role): CallerRole,
    Query(key): Query<LoanKey>,
) -> AppResult<Json<LookupResponse>> {
    key.validate()?;

    let loan = state.services.desk(role).lookup(key).await?;

    Ok(Json(LookupResponse {
        found: loan.is_some(),
        loan,
    }))
}

/// List every active loan
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    responses(
        (status = 200, description = "Active loans", body = Vec<LoanView>),
        (status = 403, description = "Role may not list loans")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    CallerRole(role): CallerRole,
) -> AppResult<Json<Vec<LoanView>>> {
    let desk = state.services.desk(role);
    let listing = desk.list_all()?;
    let loans = listing
        .stream()
        .await?
        .collect::<AppResult<Vec<LoanView>>>()
        .await?;

    Ok(Json(loans))
}
