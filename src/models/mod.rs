//! Data models for the circulation server

pub mod item;
pub mod loan;
pub mod member;

// Re-export commonly used types
pub use item::{CreateItem, Item};
pub use loan::{Loan, LoanDetails, LoanStatus, LoanView, NewLoan};
pub use member::{CreateMember, Member, MemberActivity};
