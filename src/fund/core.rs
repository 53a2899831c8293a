//! Defines the fund model, its database queries and the fund mutators.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::FundId,
    money::{
        checked_add, get_decimal, require_text, validate_interest_rate, validate_opening_amount,
    },
};

// ============================================================================
// MODELS
// ============================================================================

/// What a fund's money is pooled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundType {
    /// Regular member savings.
    Savings,
    /// Money lent out to members. Only investment funds can issue loans.
    Investment,
    /// A reserve for emergencies.
    Emergency,
}

impl FundType {
    /// The lowercase name used in the API and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            FundType::Savings => "savings",
            FundType::Investment => "investment",
            FundType::Emergency => "emergency",
        }
    }
}

impl Display for FundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FundType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "savings" => Ok(FundType::Savings),
            "investment" => Ok(FundType::Investment),
            "emergency" => Ok(FundType::Emergency),
            other => Err(format!("unknown fund type \"{other}\"")),
        }
    }
}

impl ToSql for FundType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FundType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A pool of money that members contribute to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fund {
    /// The ID of the fund.
    pub id: FundId,
    /// The unique name of the fund.
    pub name: String,
    /// What the fund is for.
    pub fund_type: FundType,
    /// A free text description.
    pub description: String,
    /// The cash held by the fund.
    ///
    /// Contributions and repaid principal flow in, loans flow out.
    pub total_amount: Decimal,
    /// The interest rate in percent charged on loans issued from the fund.
    pub interest_rate: Decimal,
    /// Interest collected from loan repayments that has not been distributed yet.
    pub interest_earned: Decimal,
    /// When interest was last distributed to contributing members.
    pub last_interest_distribution_date: Option<Date>,
    /// Incremented on every write, used to detect concurrent modification.
    #[serde(skip)]
    pub version: i64,
}

/// The data needed to open a fund.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFund {
    /// The unique name of the fund.
    pub name: String,
    /// What the fund is for.
    pub fund_type: FundType,
    /// A free text description.
    #[serde(default)]
    pub description: String,
    /// The cash the fund is opened with, zero if not given.
    #[serde(default)]
    pub total_amount: Decimal,
    /// The interest rate in percent.
    #[serde(default)]
    pub interest_rate: Decimal,
}

/// The fields of a fund that may be edited.
///
/// Totals are only ever changed by ledger operations.
#[derive(Debug, Clone, Deserialize)]
pub struct FundUpdate {
    /// The unique name of the fund.
    pub name: String,
    /// A free text description.
    #[serde(default)]
    pub description: String,
    /// The interest rate in percent.
    pub interest_rate: Decimal,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the fund table in the database.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_fund_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS fund (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            fund_type TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            total_amount TEXT NOT NULL DEFAULT '0',
            interest_rate TEXT NOT NULL DEFAULT '0',
            interest_earned TEXT NOT NULL DEFAULT '0',
            last_interest_distribution_date TEXT,
            version INTEGER NOT NULL DEFAULT 0
        )",
        (),
    )?;

    Ok(())
}

const FUND_COLUMNS: &str = "id, name, fund_type, description, total_amount, interest_rate, \
     interest_earned, last_interest_distribution_date, version";

/// Map a row selected with the fund columns in table order to a [Fund].
pub fn map_fund_row(row: &Row) -> Result<Fund, rusqlite::Error> {
    Ok(Fund {
        id: row.get(0)?,
        name: row.get(1)?,
        fund_type: row.get(2)?,
        description: row.get(3)?,
        total_amount: get_decimal(row, 4)?,
        interest_rate: get_decimal(row, 5)?,
        interest_earned: get_decimal(row, 6)?,
        last_interest_distribution_date: row.get(7)?,
        version: row.get(8)?,
    })
}

fn map_unique_violation(error: rusqlite::Error, name: &str) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateFundName(name.to_owned()),
        error => error.into(),
    }
}

/// Open a new fund.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyField] if the name is blank,
/// - [Error::InvalidAmount] or [Error::AmountTooLarge] if the opening total is out of range,
/// - [Error::InvalidInterestRate] if the interest rate is out of range,
/// - [Error::DuplicateFundName] if a fund with the same name exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_fund(new_fund: &NewFund, connection: &Connection) -> Result<Fund, Error> {
    let name = require_text(&new_fund.name, "fund name")?;
    let total_amount = validate_opening_amount(new_fund.total_amount)?;
    let interest_rate = validate_interest_rate(new_fund.interest_rate)?;

    connection
        .prepare(&format!(
            "INSERT INTO fund (name, fund_type, description, total_amount, interest_rate, interest_earned, version)
             VALUES (?1, ?2, ?3, ?4, ?5, '0', 0)
             RETURNING {FUND_COLUMNS}"
        ))?
        .query_row(
            (
                &name,
                new_fund.fund_type,
                new_fund.description.trim(),
                total_amount.to_string(),
                interest_rate.to_string(),
            ),
            map_fund_row,
        )
        .map_err(|error| map_unique_violation(error, &name))
}

/// Retrieve a fund by `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::FundNotFound] if `id` does not refer to a fund,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_fund(id: FundId, connection: &Connection) -> Result<Fund, Error> {
    connection
        .prepare(&format!("SELECT {FUND_COLUMNS} FROM fund WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_fund_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::FundNotFound(id),
            error => error.into(),
        })
}

/// Retrieve all funds ordered by name.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn get_all_funds(connection: &Connection) -> Result<Vec<Fund>, Error> {
    connection
        .prepare(&format!("SELECT {FUND_COLUMNS} FROM fund ORDER BY name ASC"))?
        .query_map([], map_fund_row)?
        .map(|maybe_fund| maybe_fund.map_err(Error::from))
        .collect()
}

/// Edit the name, description and interest rate of a fund.
///
/// # Errors
/// This function will return a:
/// - [Error::FundNotFound] if `id` does not refer to a fund,
/// - [Error::EmptyField] if the name is blank,
/// - [Error::InvalidInterestRate] if the interest rate is out of range,
/// - [Error::DuplicateFundName] if another fund has the same name,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_fund(id: FundId, update: &FundUpdate, connection: &Connection) -> Result<Fund, Error> {
    let existing = get_fund(id, connection)?;
    let name = require_text(&update.name, "fund name")?;
    let interest_rate = validate_interest_rate(update.interest_rate)?;

    let rows_affected = connection
        .execute(
            "UPDATE fund SET name = ?1, description = ?2, interest_rate = ?3, version = version + 1
             WHERE id = ?4 AND version = ?5",
            (
                &name,
                update.description.trim(),
                interest_rate.to_string(),
                id,
                existing.version,
            ),
        )
        .map_err(|error| map_unique_violation(error, &name))?;

    if rows_affected == 0 {
        return Err(Error::ConcurrentModification("fund"));
    }

    get_fund(id, connection)
}

/// Delete a fund and return it.
///
/// # Errors
/// This function will return a:
/// - [Error::FundNotFound] if `id` does not refer to a fund,
/// - [Error::FundHasContributions] if any contribution was made to the fund,
/// - [Error::FundHasLoans] if any loan was issued from the fund,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_fund(id: FundId, connection: &Connection) -> Result<Fund, Error> {
    let fund = get_fund(id, connection)?;

    let contribution_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM contribution WHERE fund_id = ?1",
        [id],
        |row| row.get(0),
    )?;

    if contribution_count > 0 {
        return Err(Error::FundHasContributions(id));
    }

    let loan_count: i64 =
        connection.query_row("SELECT COUNT(id) FROM loan WHERE fund_id = ?1", [id], |row| {
            row.get(0)
        })?;

    if loan_count > 0 {
        return Err(Error::FundHasLoans(id));
    }

    connection.execute("DELETE FROM fund WHERE id = ?1", [id])?;
    tracing::info!("Deleted fund {id} \"{}\"", fund.name);

    Ok(fund)
}

/// Write the money columns of `fund` back to the database.
///
/// The write only succeeds if nobody else wrote the fund since it was read,
/// after which `fund.version` is bumped to match the database.
fn save_fund_amounts(fund: &mut Fund, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE fund
         SET total_amount = ?1, interest_earned = ?2, last_interest_distribution_date = ?3,
             version = version + 1
         WHERE id = ?4 AND version = ?5",
        (
            fund.total_amount.to_string(),
            fund.interest_earned.to_string(),
            fund.last_interest_distribution_date,
            fund.id,
            fund.version,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::ConcurrentModification("fund"));
    }

    fund.version += 1;

    Ok(())
}

/// Add `delta` to the total amount of the fund `id` and return the new total.
///
/// # Errors
/// This function will return a:
/// - [Error::FundNotFound] if `id` does not refer to a fund,
/// - [Error::AmountOverflow] if the new amount is out of range,
/// - [Error::ConcurrentModification] if the fund changed since it was read,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn adjust_fund_total(
    id: FundId,
    delta: Decimal,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let mut fund = get_fund(id, connection)?;
    let previous_total = fund.total_amount;
    fund.total_amount = checked_add(fund.total_amount, delta)?;
    save_fund_amounts(&mut fund, connection)?;

    tracing::debug!("Fund {id} total {previous_total} -> {}", fund.total_amount);

    Ok(fund.total_amount)
}

/// Add `delta` to the undistributed interest of the fund `id` and return the new amount.
///
/// # Errors
/// This function will return a:
/// - [Error::FundNotFound] if `id` does not refer to a fund,
/// - [Error::AmountOverflow] if the new amount is out of range,
/// - [Error::ConcurrentModification] if the fund changed since it was read,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn add_fund_interest_earned(
    id: FundId,
    delta: Decimal,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let mut fund = get_fund(id, connection)?;
    fund.interest_earned = checked_add(fund.interest_earned, delta)?;
    save_fund_amounts(&mut fund, connection)?;

    tracing::debug!("Fund {id} interest earned is now {}", fund.interest_earned);

    Ok(fund.interest_earned)
}

/// Zero the undistributed interest of `fund` and stamp the distribution date.
pub(super) fn clear_fund_interest(
    fund: &mut Fund,
    distribution_date: Date,
    connection: &Connection,
) -> Result<(), Error> {
    fund.interest_earned = Decimal::ZERO;
    fund.last_interest_distribution_date = Some(distribution_date);

    save_fund_amounts(fund, connection)
}
