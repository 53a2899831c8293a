//! Defines the penalty model and its database queries.

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
    database_id::{MemberId, PenaltyId, TransactionId},
    money::get_decimal,
};

/// Whether a penalty has been paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenaltyStatus {
    /// Levied but not paid yet.
    #[default]
    Pending,
    /// Paid out of the member's balance.
    Paid,
}

impl PenaltyStatus {
    /// The lowercase name used in the API and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyStatus::Pending => "pending",
            PenaltyStatus::Paid => "paid",
        }
    }
}

impl Display for PenaltyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PenaltyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PenaltyStatus::Pending),
            "paid" => Ok(PenaltyStatus::Paid),
            other => Err(format!("unknown penalty status \"{other}\"")),
        }
    }
}

impl ToSql for PenaltyStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PenaltyStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A fine levied on a member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Penalty {
    /// The ID of the penalty.
    pub id: PenaltyId,
    /// The fined member.
    pub member_id: MemberId,
    /// The size of the fine.
    pub amount: Decimal,
    /// Why the member was fined.
    pub reason: String,
    /// When the penalty was levied.
    pub date: Date,
    /// Whether the penalty has been paid.
    pub status: PenaltyStatus,
    /// The payment transaction, set only while the penalty is paid.
    pub transaction_id: Option<TransactionId>,
}

/// The data needed to levy a penalty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewPenalty {
    /// The member to fine.
    pub member_id: MemberId,
    /// The size of the fine.
    pub amount: Decimal,
    /// Why the member is fined.
    pub reason: String,
    /// When the penalty was levied, defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
    /// Create the penalty as already paid.
    #[serde(default)]
    pub status: PenaltyStatus,
}

/// The editable fields of a pending penalty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PenaltyUpdate {
    /// The size of the fine.
    pub amount: Decimal,
    /// Why the member was fined.
    pub reason: String,
    /// When the penalty was levied.
    pub date: Date,
}

/// Narrows down the penalties returned by [get_penalties].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PenaltyFilter {
    /// Penalties levied on this member.
    pub member_id: Option<MemberId>,
    /// Penalties in this status.
    pub status: Option<PenaltyStatus>,
}

/// Create the penalty table in the database.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_penalty_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS penalty (
            id INTEGER PRIMARY KEY,
            member_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            reason TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            transaction_id INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_penalty_member ON penalty(member_id);",
    )?;

    Ok(())
}

const PENALTY_COLUMNS: &str = "id, member_id, amount, reason, date, status, transaction_id";

fn map_penalty_row(row: &Row) -> Result<Penalty, rusqlite::Error> {
    Ok(Penalty {
        id: row.get(0)?,
        member_id: row.get(1)?,
        amount: get_decimal(row, 2)?,
        reason: row.get(3)?,
        date: row.get(4)?,
        status: row.get(5)?,
        transaction_id: row.get(6)?,
    })
}

/// Insert an unpaid penalty row.
pub(super) fn insert_penalty(
    member_id: MemberId,
    amount: Decimal,
    reason: &str,
    date: Date,
    connection: &Connection,
) -> Result<Penalty, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO penalty (member_id, amount, reason, date, status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {PENALTY_COLUMNS}"
        ))?
        .query_row(
            (
                member_id,
                amount.to_string(),
                reason,
                date,
                PenaltyStatus::Pending,
            ),
            map_penalty_row,
        )
        .map_err(Error::from)
}

/// Retrieve a penalty by `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::PenaltyNotFound] if `id` does not refer to a penalty,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_penalty(id: PenaltyId, connection: &Connection) -> Result<Penalty, Error> {
    connection
        .prepare(&format!(
            "SELECT {PENALTY_COLUMNS} FROM penalty WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_penalty_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::PenaltyNotFound(id),
            error => error.into(),
        })
}

/// Retrieve the penalties matching `filter`, newest first.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn get_penalties(
    filter: &PenaltyFilter,
    connection: &Connection,
) -> Result<Vec<Penalty>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PENALTY_COLUMNS} FROM penalty
             WHERE (?1 IS NULL OR member_id = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY date DESC, id DESC"
        ))?
        .query_map((filter.member_id, filter.status), map_penalty_row)?
        .map(|maybe_penalty| maybe_penalty.map_err(Error::from))
        .collect()
}

/// Move `penalty` to `status` and set its payment transaction.
///
/// The write only succeeds if the stored status still matches `penalty.status`.
///
/// # Errors
/// Returns [Error::ConcurrentModification] if the penalty changed since it was read.
pub(super) fn save_penalty_status(
    penalty: &mut Penalty,
    status: PenaltyStatus,
    transaction_id: Option<TransactionId>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE penalty SET status = ?1, transaction_id = ?2 WHERE id = ?3 AND status = ?4",
        (status, transaction_id, penalty.id, penalty.status),
    )?;

    if rows_affected == 0 {
        return Err(Error::ConcurrentModification("penalty"));
    }

    penalty.status = status;
    penalty.transaction_id = transaction_id;

    Ok(())
}

/// Overwrite the amount, reason and date of the pending penalty `id`.
pub(super) fn save_penalty_details(
    id: PenaltyId,
    amount: Decimal,
    reason: &str,
    date: Date,
    connection: &Connection,
) -> Result<Penalty, Error> {
    connection
        .prepare(&format!(
            "UPDATE penalty SET amount = ?1, reason = ?2, date = ?3
             WHERE id = ?4 AND status = ?5
             RETURNING {PENALTY_COLUMNS}"
        ))?
        .query_row(
            (amount.to_string(), reason, date, id, PenaltyStatus::Pending),
            map_penalty_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::ConcurrentModification("penalty"),
            error => error.into(),
        })
}

/// Delete the penalty row `id`.
pub(super) fn remove_penalty(id: PenaltyId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM penalty WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::PenaltyNotFound(id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        Error,
        test_utils::{get_test_connection, must_create_member},
    };

    use super::{
        PenaltyFilter, PenaltyStatus, get_penalties, get_penalty, insert_penalty,
        save_penalty_status,
    };

    #[test]
    fn insert_and_get_penalty() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);

        let inserted = insert_penalty(
            member.id,
            dec!(30),
            "Late to meeting",
            date!(2025 - 02 - 01),
            &connection,
        )
        .unwrap();

        assert_eq!(inserted.status, PenaltyStatus::Pending);
        assert_eq!(inserted.transaction_id, None);
        assert_eq!(get_penalty(inserted.id, &connection), Ok(inserted));
    }

    #[test]
    fn filter_by_status() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);
        let mut paid = insert_penalty(member.id, dec!(5), "a", date!(2025 - 02 - 01), &connection)
            .unwrap();
        insert_penalty(member.id, dec!(6), "b", date!(2025 - 02 - 02), &connection).unwrap();
        save_penalty_status(&mut paid, PenaltyStatus::Paid, Some(1), &connection).unwrap();

        let penalties = get_penalties(
            &PenaltyFilter {
                status: Some(PenaltyStatus::Paid),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();

        assert_eq!(penalties, vec![paid]);
    }

    #[test]
    fn stale_status_write_is_rejected() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);
        let mut penalty =
            insert_penalty(member.id, dec!(5), "a", date!(2025 - 02 - 01), &connection).unwrap();
        let mut stale = penalty.clone();
        save_penalty_status(&mut penalty, PenaltyStatus::Paid, Some(1), &connection).unwrap();

        let result = save_penalty_status(&mut stale, PenaltyStatus::Paid, Some(2), &connection);

        assert_eq!(result, Err(Error::ConcurrentModification("penalty")));
    }

    #[test]
    fn missing_penalty() {
        let connection = get_test_connection();

        assert_eq!(get_penalty(7, &connection), Err(Error::PenaltyNotFound(7)));
    }

    #[test]
    fn parses_status() {
        assert_eq!("paid".parse::<PenaltyStatus>(), Ok(PenaltyStatus::Paid));
        assert!("waived".parse::<PenaltyStatus>().is_err());
    }
}
