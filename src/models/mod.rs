//! Data models for the LMS

pub mod author;
pub mod book;
pub mod borrower;
pub mod branch;
pub mod copies;
pub mod loan;

// Re-export commonly used types
pub use author::{Author, Publisher};
pub use book::{Book, BookSummary};
pub use borrower::Borrower;
pub use branch::Branch;
pub use copies::CopyRecord;
pub use loan::{LoanKey, LoanRecord, LoanView};
