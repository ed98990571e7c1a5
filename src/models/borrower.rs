//! Borrower (card holder) model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrower {
    pub card_no: i32,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}
