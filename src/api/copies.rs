//! Branch inventory endpoints

use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{error::AppResult, models::CopyRecord};

use super::CallerRole;

/// Set how many copies of a book a branch owns
#[derive(Deserialize, ToSchema, Validate)]
pub struct SetCopiesRequest {
    #[validate(range(min = 1))]
    pub book_id: i32,
    #[validate(range(min = 1))]
    pub branch_id: i32,
    #[validate(range(min = 0))]
    pub no_of_copies: i32,
}

/// Set the total copy count for a book at a branch
#[utoipa::path(
    put,
    path = "/copies",
    tag = "copies",
    request_body = SetCopiesRequest,
    responses(
        (status = 200, description = "Inventory updated", body = CopyRecord),
        (status = 403, description = "Role may not manage inventory"),
        (status = 409, description = "Fewer copies than outstanding loans")
    )
)]
pub async fn set_copies(
    State(state): State<crate::AppState>,
    CallerRole(role): CallerRole,
    Json(request): Json<SetCopiesRequest>,
) -> AppResult<Json<CopyRecord>> {
    request.validate()?;

    let copies = state
        .services
        .desk(role)
        .set_copies(request.book_id, request.branch_id, request.no_of_copies)
        .await?;

    Ok(Json(copies))
}
