//! Defines the loan model and its database queries.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::{FundId, LoanId, MemberId, TransactionId},
    loan::LoanStatus,
    money::get_decimal,
};

/// Money lent from an investment fund to a member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loan {
    /// The ID of the loan.
    pub id: LoanId,
    /// The borrowing member.
    pub member_id: MemberId,
    /// The investment fund the money came from.
    pub fund_id: FundId,
    /// The principal originally lent.
    pub amount: Decimal,
    /// Simple interest rate in percent per year.
    pub interest_rate: Decimal,
    /// When the loan was disbursed and interest starts to accrue.
    pub start_date: Date,
    /// When the loan should be repaid.
    pub due_date: Date,
    /// Where the loan is in its life.
    pub status: LoanStatus,
    /// Principal still owed.
    pub remaining_principal: Decimal,
    /// Interest accrued and still owed.
    pub remaining_interest: Decimal,
    /// Principal repaid so far.
    pub principal_paid: Decimal,
    /// Interest repaid so far.
    pub interest_paid: Decimal,
    /// Interest has been accrued up to this date.
    pub last_interest_calculation_date: Date,
    /// The disbursement transaction.
    pub transaction_id: TransactionId,
    /// What the money is for.
    pub purpose: String,
    /// Incremented on every write, used to detect concurrent modification.
    #[serde(skip)]
    pub version: i64,
}

impl Loan {
    /// Everything still owed on the loan.
    pub fn outstanding(&self) -> Decimal {
        self.remaining_principal + self.remaining_interest
    }
}

/// The data needed to issue a loan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewLoan {
    /// The borrowing member.
    pub member_id: MemberId,
    /// The investment fund to lend from.
    pub fund_id: FundId,
    /// The principal to lend.
    pub amount: Decimal,
    /// Simple interest rate in percent per year.
    pub interest_rate: Decimal,
    /// When the loan starts, defaults to today.
    #[serde(default)]
    pub start_date: Option<Date>,
    /// When the loan should be repaid.
    pub due_date: Date,
    /// The initial status, defaults to pending.
    #[serde(default)]
    pub status: LoanStatus,
    /// What the money is for.
    #[serde(default)]
    pub purpose: String,
}

/// A payment towards a loan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Repayment {
    /// How much is paid.
    pub amount: Decimal,
    /// When the payment was made, defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
    /// A free text description.
    #[serde(default)]
    pub description: String,
}

/// Narrows down the loans returned by [get_loans].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanFilter {
    /// Loans taken by this member.
    pub member_id: Option<MemberId>,
    /// Loans in this status.
    pub status: Option<LoanStatus>,
}

/// Create the loan table in the database.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_loan_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS loan (
            id INTEGER PRIMARY KEY,
            member_id INTEGER NOT NULL,
            fund_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            interest_rate TEXT NOT NULL,
            start_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL,
            remaining_principal TEXT NOT NULL,
            remaining_interest TEXT NOT NULL,
            principal_paid TEXT NOT NULL,
            interest_paid TEXT NOT NULL,
            last_interest_calculation_date TEXT NOT NULL,
            transaction_id INTEGER NOT NULL,
            purpose TEXT NOT NULL DEFAULT '',
            version INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_loan_member ON loan(member_id);
        CREATE INDEX IF NOT EXISTS idx_loan_status ON loan(status);",
    )?;

    Ok(())
}

const LOAN_COLUMNS: &str = "id, member_id, fund_id, amount, interest_rate, start_date, due_date, \
     status, remaining_principal, remaining_interest, principal_paid, interest_paid, \
     last_interest_calculation_date, transaction_id, purpose, version";

fn map_loan_row(row: &Row) -> Result<Loan, rusqlite::Error> {
    Ok(Loan {
        id: row.get(0)?,
        member_id: row.get(1)?,
        fund_id: row.get(2)?,
        amount: get_decimal(row, 3)?,
        interest_rate: get_decimal(row, 4)?,
        start_date: row.get(5)?,
        due_date: row.get(6)?,
        status: row.get(7)?,
        remaining_principal: get_decimal(row, 8)?,
        remaining_interest: get_decimal(row, 9)?,
        principal_paid: get_decimal(row, 10)?,
        interest_paid: get_decimal(row, 11)?,
        last_interest_calculation_date: row.get(12)?,
        transaction_id: row.get(13)?,
        purpose: row.get(14)?,
        version: row.get(15)?,
    })
}

/// Insert a freshly disbursed loan: nothing repaid, no interest accrued yet.
pub(super) fn insert_loan(
    new_loan: &NewLoan,
    start_date: Date,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Loan, Error> {
    let amount = new_loan.amount.to_string();

    connection
        .prepare(&format!(
            "INSERT INTO loan (member_id, fund_id, amount, interest_rate, start_date, due_date,
                status, remaining_principal, remaining_interest, principal_paid, interest_paid,
                last_interest_calculation_date, transaction_id, purpose, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?3, '0', '0', '0', ?5, ?8, ?9, 0)
             RETURNING {LOAN_COLUMNS}"
        ))?
        .query_row(
            (
                new_loan.member_id,
                new_loan.fund_id,
                amount,
                new_loan.interest_rate.to_string(),
                start_date,
                new_loan.due_date,
                new_loan.status,
                transaction_id,
                new_loan.purpose.trim(),
            ),
            map_loan_row,
        )
        .map_err(Error::from)
}

/// Retrieve a loan by `id` as stored, without accruing interest.
///
/// # Errors
/// This function will return a:
/// - [Error::LoanNotFound] if `id` does not refer to a loan,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_loan(id: LoanId, connection: &Connection) -> Result<Loan, Error> {
    connection
        .prepare(&format!("SELECT {LOAN_COLUMNS} FROM loan WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_loan_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::LoanNotFound(id),
            error => error.into(),
        })
}

/// Retrieve the loans matching `filter` as stored, newest first.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn get_loans(filter: &LoanFilter, connection: &Connection) -> Result<Vec<Loan>, Error> {
    connection
        .prepare(&format!(
            "SELECT {LOAN_COLUMNS} FROM loan
             WHERE (?1 IS NULL OR member_id = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY start_date DESC, id DESC"
        ))?
        .query_map((filter.member_id, filter.status), map_loan_row)?
        .map(|maybe_loan| maybe_loan.map_err(Error::from))
        .collect()
}

/// Write the status and balances of `loan` back to the database.
///
/// The write only succeeds if nobody else wrote the loan since it was read,
/// after which `loan.version` is bumped to match the database.
///
/// # Errors
/// Returns [Error::ConcurrentModification] if the loan changed since it was read.
pub(super) fn save_loan(loan: &mut Loan, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE loan
         SET status = ?1, remaining_principal = ?2, remaining_interest = ?3,
             principal_paid = ?4, interest_paid = ?5, last_interest_calculation_date = ?6,
             version = version + 1
         WHERE id = ?7 AND version = ?8",
        (
            loan.status,
            loan.remaining_principal.to_string(),
            loan.remaining_interest.to_string(),
            loan.principal_paid.to_string(),
            loan.interest_paid.to_string(),
            loan.last_interest_calculation_date,
            loan.id,
            loan.version,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::ConcurrentModification("loan"));
    }

    loan.version += 1;

    Ok(())
}

/// Delete the loan row `id`.
pub(super) fn remove_loan(id: LoanId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM loan WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::LoanNotFound(id));
    }

    Ok(())
}
