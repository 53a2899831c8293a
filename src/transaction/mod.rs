//! The transaction log.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transaction records
//! - Database functions for storing, querying, and linking transaction records
//! - The ledger operations for deposits, withdrawals and transfers
//! - The JSON endpoints for the activity feed

mod core;
mod endpoints;
mod operations;

pub use core::{
    Transaction, TransactionBuilder, TransactionFilter, TransactionType, create_transaction_record,
    create_transaction_table, delete_transaction_record, get_transaction, query_transactions,
};
pub(crate) use core::{link_transaction_loan, update_transaction_record};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint,
};
pub use operations::{NewTransaction, create_transaction, delete_transaction};
