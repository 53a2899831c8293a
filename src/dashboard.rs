//! The dashboard: a summary of the group's money in one response.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    fund::{FundType, get_all_funds},
    ledger::LedgerState,
    loan::{Loan, LoanFilter, LoanStatus, get_loans, get_loans_with_interest},
    member::get_all_members,
    money::checked_sum,
    penalty::{PenaltyFilter, PenaltyStatus, get_penalties},
    response::ApiResponse,
    transaction::{Transaction, TransactionFilter, query_transactions},
};

/// How many transactions the dashboard shows.
const RECENT_TRANSACTION_COUNT: u32 = 10;

/// The combined total of all funds of one type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundTypeTotal {
    /// The type the totals are for.
    pub fund_type: FundType,
    /// How many funds have this type.
    pub fund_count: usize,
    /// The sum of their totals.
    pub total_amount: Decimal,
}

/// Counts and amounts for the loans in one status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoanTotals {
    /// How many loans there are.
    pub count: usize,
    /// Principal still owed across the loans.
    pub outstanding_principal: Decimal,
    /// Interest still owed across the loans.
    pub outstanding_interest: Decimal,
}

impl LoanTotals {
    fn from_loans(loans: &[Loan]) -> Result<Self, Error> {
        Ok(Self {
            count: loans.len(),
            outstanding_principal: checked_sum(loans.iter().map(|loan| loan.remaining_principal))?,
            outstanding_interest: checked_sum(loans.iter().map(|loan| loan.remaining_interest))?,
        })
    }
}

/// An overview of members, funds, loans, penalties and recent activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// How many members the group has.
    pub member_count: usize,
    /// The sum of every member's balance.
    pub total_member_balance: Decimal,
    /// Fund totals for each fund type, in a fixed order.
    pub fund_totals: Vec<FundTypeTotal>,
    /// Interest earned by all funds that has not been distributed yet.
    pub undistributed_interest: Decimal,
    /// Active loans, with interest accrued up to today.
    pub active_loans: LoanTotals,
    /// Defaulted loans, which do not accrue interest.
    pub defaulted_loans: LoanTotals,
    /// How many penalties are waiting to be paid.
    pub pending_penalty_count: usize,
    /// The sum of all pending penalties.
    pub pending_penalty_amount: Decimal,
    /// The newest transactions, newest first.
    pub recent_transactions: Vec<Transaction>,
}

/// Gather the dashboard summary as of `today`.
///
/// Active loans are accrued and saved along the way, so this must run as a
/// unit of work.
///
/// # Errors
/// This function will return a:
/// - [Error::ConcurrentModification] if a loan changed while accruing,
/// - [Error::AmountOverflow] if a total cannot be represented,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_dashboard_summary(
    today: Date,
    connection: &Connection,
) -> Result<DashboardSummary, Error> {
    let members = get_all_members(connection)?;
    let funds = get_all_funds(connection)?;

    let fund_types = [FundType::Savings, FundType::Investment, FundType::Emergency];
    let fund_totals = fund_types
        .into_iter()
        .map(|fund_type| {
            let funds_of_type: Vec<_> = funds
                .iter()
                .filter(|fund| fund.fund_type == fund_type)
                .collect();

            Ok(FundTypeTotal {
                fund_type,
                fund_count: funds_of_type.len(),
                total_amount: checked_sum(funds_of_type.iter().map(|fund| fund.total_amount))?,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let active_loans = get_loans_with_interest(
        &LoanFilter {
            member_id: None,
            status: Some(LoanStatus::Active),
        },
        today,
        connection,
    )?;
    let defaulted_loans = get_loans(
        &LoanFilter {
            member_id: None,
            status: Some(LoanStatus::Defaulted),
        },
        connection,
    )?;

    let pending_penalties = get_penalties(
        &PenaltyFilter {
            member_id: None,
            status: Some(PenaltyStatus::Pending),
        },
        connection,
    )?;

    let recent_transactions = query_transactions(
        &TransactionFilter {
            limit: Some(RECENT_TRANSACTION_COUNT),
            ..Default::default()
        },
        connection,
    )?;

    Ok(DashboardSummary {
        member_count: members.len(),
        total_member_balance: checked_sum(members.iter().map(|member| member.balance))?,
        fund_totals,
        undistributed_interest: checked_sum(funds.iter().map(|fund| fund.interest_earned))?,
        active_loans: LoanTotals::from_loans(&active_loans)?,
        defaulted_loans: LoanTotals::from_loans(&defaulted_loans)?,
        pending_penalty_count: pending_penalties.len(),
        pending_penalty_amount: checked_sum(
            pending_penalties.iter().map(|penalty| penalty.amount),
        )?,
        recent_transactions,
    })
}

/// A route handler for the dashboard summary.
pub async fn get_dashboard_endpoint(State(state): State<LedgerState>) -> Response {
    match state.run(|connection, today| get_dashboard_summary(today, connection)) {
        Ok(summary) => ApiResponse::ok(summary),
        Err(error) => error.into_response(),
    }
}
