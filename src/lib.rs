//! HODYVIKU is the bookkeeping service of a community savings and lending group.
//!
//! The library keeps member balances, fund totals and the transaction log
//! consistent while contributions, loans, repayments, transfers and penalties
//! are created, edited and deleted. Every ledger operation goes through
//! [Ledger], which runs it as a single unit of work against the SQLite
//! database, and is exposed over a JSON API built with axum.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use rust_decimal::Decimal;
use tokio::signal;

mod app_state;
mod contribution;
mod dashboard;
mod database_id;
mod db;
pub mod endpoints;
mod fund;
mod ledger;
mod loan;
mod logging;
mod member;
mod money;
mod penalty;
mod response;
mod routing;
#[cfg(test)]
mod test_utils;
mod timezone;
mod transaction;

pub use app_state::AppState;
pub use contribution::{
    Contribution, ContributionBatch, ContributionFilter, ContributionItem, ContributionUpdate,
};
pub use dashboard::{DashboardSummary, FundTypeTotal, LoanTotals};
pub use database_id::{
    ContributionId, FundId, LoanId, MemberId, PenaltyId, TransactionId,
};
pub use db::initialize as initialize_db;
pub use fund::{Fund, FundType, FundUpdate, InterestDistribution, MemberInterestShare, NewFund};
pub use ledger::{Ledger, LedgerConfig, LedgerState};
pub use loan::{Loan, LoanFilter, LoanStatus, LoanStatusUpdate, NewLoan, Repayment};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use member::{Member, MemberStatus, NewMember};
pub use penalty::{NewPenalty, Penalty, PenaltyFilter, PenaltyStatus, PenaltyUpdate};
pub use routing::build_router;
pub use transaction::{NewTransaction, Transaction, TransactionFilter, TransactionType};

use crate::response::ApiResponse;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The broad category of an [Error], which decides how it is reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was malformed or breaks a business rule. Nothing was written.
    Validation,
    /// A referenced record does not exist. Nothing was written.
    NotFound,
    /// The record is not in a state that allows the requested operation.
    IllegalState,
    /// A store failure or other unexpected error. The operation was rolled back.
    Unexpected,
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An amount was zero, negative or otherwise unusable.
    #[error("the amount {0} is invalid, amounts must be greater than zero")]
    InvalidAmount(Decimal),

    /// An amount was larger than the largest amount the ledger accepts.
    #[error("the amount {0} is too large, amounts cannot exceed {max}", max = money::MAX_AMOUNT)]
    AmountTooLarge(Decimal),

    /// Applying an amount would take a balance or total out of the representable range.
    #[error("the result of this operation is too large to record")]
    AmountOverflow,

    /// An interest rate was negative or implausibly large.
    #[error(
        "the interest rate {0}% is invalid, rates must be between 0% and {max}%",
        max = money::MAX_INTEREST_RATE
    )]
    InvalidInterestRate(Decimal),

    /// A required name or text field was empty.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// A loan was given a due date before its start date.
    #[error("the due date {due_date} is before the start date {start_date}")]
    InvalidDueDate {
        /// The date the loan starts.
        start_date: time::Date,
        /// The requested due date.
        due_date: time::Date,
    },

    /// A contribution request did not contain any contributions.
    #[error("a contribution batch must contain at least one contribution")]
    EmptyContributionBatch,

    /// The specified member email already exists in the database.
    #[error("a member with the email \"{0}\" already exists")]
    DuplicateMemberEmail(String),

    /// The specified fund name already exists in the database.
    #[error("the fund \"{0}\" already exists")]
    DuplicateFundName(String),

    /// Loans may only be issued from investment funds.
    #[error("fund {0} is not an investment fund and cannot issue loans")]
    NotAnInvestmentFund(FundId),

    /// The fund does not hold enough money to disburse a loan.
    #[error("the fund only holds {available} but the loan requires {requested}")]
    InsufficientFundBalance {
        /// The fund's current total.
        available: Decimal,
        /// The loan amount.
        requested: Decimal,
    },

    /// A repayment was larger than everything still owed on the loan.
    #[error("the payment of {amount} exceeds the outstanding balance of {outstanding}")]
    PaymentExceedsOutstanding {
        /// The payment amount.
        amount: Decimal,
        /// Remaining principal plus remaining interest.
        outstanding: Decimal,
    },

    /// A transfer did not name a recipient.
    #[error("a transfer requires a recipient")]
    MissingRecipient,

    /// A transfer named the sender as the recipient.
    #[error("a member cannot transfer money to themselves")]
    SelfTransfer,

    /// The transaction type may only be created by its dedicated operation.
    #[error("{0} transactions cannot be created directly")]
    UnsupportedTransactionType(TransactionType),

    /// The transaction belongs to a contribution, loan or penalty and must be
    /// removed through that record instead.
    #[error("transaction {0} belongs to another record, delete that record instead")]
    OwnedTransaction(TransactionId),

    /// The member cannot be deleted while transactions refer to them.
    #[error("member {0} has transactions and cannot be deleted")]
    MemberHasTransactions(MemberId),

    /// The member cannot be deleted while penalties refer to them.
    #[error("member {0} has penalties and cannot be deleted")]
    MemberHasPenalties(MemberId),

    /// The fund cannot be deleted while contributions refer to it.
    #[error("fund {0} has contributions and cannot be deleted")]
    FundHasContributions(FundId),

    /// The fund cannot be deleted while loans issued from it refer to it.
    #[error("fund {0} has issued loans and cannot be deleted")]
    FundHasLoans(FundId),

    /// The member ID did not match a member.
    #[error("could not find a member with the ID {0}")]
    MemberNotFound(MemberId),

    /// The fund ID did not match a fund.
    #[error("could not find a fund with the ID {0}")]
    FundNotFound(FundId),

    /// The loan ID did not match a loan.
    #[error("could not find a loan with the ID {0}")]
    LoanNotFound(LoanId),

    /// The penalty ID did not match a penalty.
    #[error("could not find a penalty with the ID {0}")]
    PenaltyNotFound(PenaltyId),

    /// The contribution ID did not match a contribution.
    #[error("could not find a contribution with the ID {0}")]
    ContributionNotFound(ContributionId),

    /// The transaction ID did not match a transaction.
    #[error("could not find a transaction with the ID {0}")]
    TransactionNotFound(TransactionId),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The loan status table does not allow moving between the two states.
    #[error("a loan cannot go from {from} to {to}")]
    IllegalLoanTransition {
        /// The current status.
        from: LoanStatus,
        /// The requested status.
        to: LoanStatus,
    },

    /// Only pending loans may be deleted.
    #[error("only pending loans can be deleted, this loan is {0}")]
    LoanNotPending(LoanStatus),

    /// Only active or defaulted loans can be repaid.
    #[error("only active or defaulted loans can be repaid, this loan is {0}")]
    LoanNotActive(LoanStatus),

    /// The loan has been paid off and cannot take more payments.
    #[error("loan {0} has already been paid")]
    LoanAlreadyPaid(LoanId),

    /// Only pending penalties can be edited.
    #[error("penalty {0} has been paid and can no longer be edited")]
    PenaltyAlreadyPaid(PenaltyId),

    /// The penalty already has the requested status.
    #[error("the penalty is already {0}")]
    PenaltyStatusUnchanged(PenaltyStatus),

    /// Another writer changed the record between reading and writing it.
    #[error("the {0} was modified by another operation, try again")]
    ConcurrentModification(&'static str),

    /// A value stored in the database could not be parsed.
    #[error("invalid value stored in the database: {0}")]
    CorruptValue(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl Error {
    /// The category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount(_)
            | Error::AmountTooLarge(_)
            | Error::AmountOverflow
            | Error::InvalidInterestRate(_)
            | Error::EmptyField(_)
            | Error::InvalidDueDate { .. }
            | Error::EmptyContributionBatch
            | Error::DuplicateMemberEmail(_)
            | Error::DuplicateFundName(_)
            | Error::NotAnInvestmentFund(_)
            | Error::InsufficientFundBalance { .. }
            | Error::PaymentExceedsOutstanding { .. }
            | Error::MissingRecipient
            | Error::SelfTransfer
            | Error::UnsupportedTransactionType(_)
            | Error::OwnedTransaction(_)
            | Error::MemberHasTransactions(_)
            | Error::MemberHasPenalties(_)
            | Error::FundHasContributions(_)
            | Error::FundHasLoans(_) => ErrorKind::Validation,
            Error::MemberNotFound(_)
            | Error::FundNotFound(_)
            | Error::LoanNotFound(_)
            | Error::PenaltyNotFound(_)
            | Error::ContributionNotFound(_)
            | Error::TransactionNotFound(_)
            | Error::NotFound => ErrorKind::NotFound,
            Error::IllegalLoanTransition { .. }
            | Error::LoanNotPending(_)
            | Error::LoanNotActive(_)
            | Error::LoanAlreadyPaid(_)
            | Error::PenaltyAlreadyPaid(_)
            | Error::PenaltyStatusUnchanged(_)
            | Error::ConcurrentModification(_) => ErrorKind::IllegalState,
            Error::CorruptValue(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::InvalidTimezoneError(_) => ErrorKind::Unexpected,
        }
    }

    /// The HTTP status code used to report the error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::IllegalState => StatusCode::CONFLICT,
            ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        match self.kind() {
            ErrorKind::Unexpected => {
                // The details of unexpected errors are not intended to be shown to the client.
                tracing::error!("An unexpected error occurred: {}", self);
                ApiResponse::error(
                    status_code,
                    "An unexpected error occurred, check the server logs for more details.",
                )
            }
            _ => ApiResponse::error(status_code, &self.to_string()),
        }
    }
}
