//! Per-branch copy inventory

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Total and on-shelf copy counts of one book at one branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CopyRecord {
    pub book_id: i32,
    pub branch_id: i32,
    pub no_of_copies: i32,
    pub no_of_available_copies: i32,
}

impl CopyRecord {
    pub fn new(book_id: i32, branch_id: i32, no_of_copies: i32, no_of_available_copies: i32) -> Self {
        Self {
            book_id,
            branch_id,
            no_of_copies,
            no_of_available_copies,
        }
    }

    /// `0 <= available <= total`
    pub fn is_consistent(&self) -> bool {
        0 <= self.no_of_available_copies && self.no_of_available_copies <= self.no_of_copies
    }

    /// Copies currently out on loan
    pub fn outstanding(&self) -> i32 {
        self.no_of_copies - self.no_of_available_copies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency() {
        assert!(CopyRecord::new(7, 3, 2, 2).is_consistent());
        assert!(CopyRecord::new(7, 3, 2, 0).is_consistent());
        assert!(!CopyRecord::new(7, 3, 2, 3).is_consistent());
        assert!(!CopyRecord::new(7, 3, 2, -1).is_consistent());
    }

    #[test]
    fn test_outstanding() {
        assert_eq!(CopyRecord::new(7, 3, 5, 2).outstanding(), 3);
    }
}
