//! Library Management System
//!
//! Checkout and return of books across library branches. Every checkout,
//! return, or renewal changes the copies ledger and the loan ledger inside one
//! store transaction, so the two never disagree.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
