//! Library branch model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Branch {
    pub id: i32,
    pub name: String,
    pub address: Option<String>,
}
