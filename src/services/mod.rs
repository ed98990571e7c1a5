//! Business logic services

pub mod desks;
pub mod loans;

use std::sync::Arc;

use crate::{config::LoansConfig, repository::LedgerStore};

use desks::{LoanDesk, Role};
use loans::{BorrowingEngine, Clock};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub engine: BorrowingEngine,
    loans_config: LoansConfig,
}

impl Services {
    /// Create all services over the given ledger store
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, loans_config: LoansConfig) -> Self {
        Self {
            engine: BorrowingEngine::new(store, clock, loans_config.renewal_policy),
            loans_config,
        }
    }

    /// Loan desk for a caller acting in `role`
    pub fn desk(&self, role: Role) -> Box<dyn LoanDesk> {
        desks::desk_for(role, self.engine.clone(), &self.loans_config)
    }
}
