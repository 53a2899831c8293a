//! Defines the contribution model and its database queries.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::{ContributionId, FundId, MemberId, TransactionId},
    money::get_decimal,
};

/// A member's payment into a fund.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    /// The ID of the contribution.
    pub id: ContributionId,
    /// The contributing member.
    pub member_id: MemberId,
    /// The fund paid into.
    pub fund_id: FundId,
    /// How much was paid in.
    pub amount: Decimal,
    /// When the contribution was made.
    pub date: Date,
    /// A free text description.
    pub description: String,
    /// The audit transaction recorded for the contribution.
    pub transaction_id: TransactionId,
}

/// One fund and amount in a [ContributionBatch].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContributionItem {
    /// The fund to pay into.
    pub fund_id: FundId,
    /// How much to pay in.
    pub amount: Decimal,
}

/// One or more contributions made by one member at the same time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContributionBatch {
    /// The contributing member.
    pub member_id: MemberId,
    /// When the contributions were made, defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
    /// A description shared by every contribution in the batch.
    #[serde(default)]
    pub description: String,
    /// The funds and amounts.
    pub contributions: Vec<ContributionItem>,
}

/// The editable fields of a contribution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContributionUpdate {
    /// The fund paid into.
    pub fund_id: FundId,
    /// How much was paid in.
    pub amount: Decimal,
    /// When the contribution was made.
    pub date: Date,
    /// A free text description.
    #[serde(default)]
    pub description: String,
}

/// Narrows down the contributions returned by [get_contributions].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContributionFilter {
    /// Contributions made by this member.
    pub member_id: Option<MemberId>,
    /// Contributions made to this fund.
    pub fund_id: Option<FundId>,
}

/// Create the contribution table in the database.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_contribution_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS contribution (
            id INTEGER PRIMARY KEY,
            member_id INTEGER NOT NULL,
            fund_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            transaction_id INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_contribution_fund ON contribution(fund_id);
        CREATE INDEX IF NOT EXISTS idx_contribution_member ON contribution(member_id);",
    )?;

    Ok(())
}

const CONTRIBUTION_COLUMNS: &str =
    "id, member_id, fund_id, amount, date, description, transaction_id";

fn map_contribution_row(row: &Row) -> Result<Contribution, rusqlite::Error> {
    Ok(Contribution {
        id: row.get(0)?,
        member_id: row.get(1)?,
        fund_id: row.get(2)?,
        amount: get_decimal(row, 3)?,
        date: row.get(4)?,
        description: row.get(5)?,
        transaction_id: row.get(6)?,
    })
}

/// Insert a contribution row. Balances are the caller's responsibility.
pub(super) fn insert_contribution(
    member_id: MemberId,
    item: &ContributionItem,
    date: Date,
    description: &str,
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Contribution, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO contribution (member_id, fund_id, amount, date, description, transaction_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {CONTRIBUTION_COLUMNS}"
        ))?
        .query_row(
            (
                member_id,
                item.fund_id,
                item.amount.to_string(),
                date,
                description,
                transaction_id,
            ),
            map_contribution_row,
        )
        .map_err(Error::from)
}

/// Retrieve a contribution by `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::ContributionNotFound] if `id` does not refer to a contribution,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_contribution(
    id: ContributionId,
    connection: &Connection,
) -> Result<Contribution, Error> {
    connection
        .prepare(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM contribution WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_contribution_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::ContributionNotFound(id),
            error => error.into(),
        })
}

/// Retrieve the contributions matching `filter`, newest first.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn get_contributions(
    filter: &ContributionFilter,
    connection: &Connection,
) -> Result<Vec<Contribution>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM contribution
             WHERE (?1 IS NULL OR member_id = ?1) AND (?2 IS NULL OR fund_id = ?2)
             ORDER BY date DESC, id DESC"
        ))?
        .query_map((filter.member_id, filter.fund_id), map_contribution_row)?
        .map(|maybe_contribution| maybe_contribution.map_err(Error::from))
        .collect()
}

/// Overwrite the editable fields of the contribution `id`.
pub(super) fn save_contribution(
    id: ContributionId,
    update: &ContributionUpdate,
    connection: &Connection,
) -> Result<Contribution, Error> {
    connection
        .prepare(&format!(
            "UPDATE contribution SET fund_id = ?1, amount = ?2, date = ?3, description = ?4
             WHERE id = ?5
             RETURNING {CONTRIBUTION_COLUMNS}"
        ))?
        .query_row(
            (
                update.fund_id,
                update.amount.to_string(),
                update.date,
                update.description.trim(),
                id,
            ),
            map_contribution_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::ContributionNotFound(id),
            error => error.into(),
        })
}

/// Delete the contribution row `id`.
pub(super) fn remove_contribution(id: ContributionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM contribution WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::ContributionNotFound(id));
    }

    Ok(())
}
