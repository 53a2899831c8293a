//! Loans from investment funds to members.
//!
//! This module contains:
//! - The [Loan] model and its status state machine
//! - The interest engine that accrues interest and splits payments
//! - The ledger operations that issue, repay, settle and delete loans
//! - The JSON endpoints for loans

mod core;
mod endpoints;
mod interest;
mod operations;
mod status;

pub use core::{Loan, LoanFilter, NewLoan, Repayment, create_loan_table, get_loan, get_loans};
pub use endpoints::{
    LoanStatusUpdate, create_loan_endpoint, delete_loan_endpoint, get_loan_endpoint,
    get_loans_endpoint, repay_loan_endpoint, update_loan_status_endpoint,
};
pub use operations::{
    create_loan, delete_loan, get_loan_with_interest, get_loans_with_interest, repay_loan,
    update_loan_status,
};
pub use status::LoanStatus;
