//! Defines the member model, its database queries and the member balance mutator.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::MemberId,
    money::{checked_add, get_decimal, require_text},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a member is still taking part in the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// The member takes part in the group.
    #[default]
    Active,
    /// The member has left or is suspended.
    Inactive,
}

impl MemberStatus {
    fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }
}

impl Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for MemberStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MemberStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "active" => Ok(MemberStatus::Active),
            "inactive" => Ok(MemberStatus::Inactive),
            other => Err(FromSqlError::Other(
                format!("unknown member status \"{other}\"").into(),
            )),
        }
    }
}

/// A member of the savings group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    /// The ID of the member.
    pub id: MemberId,
    /// The member's full name.
    pub name: String,
    /// An optional, unique contact email.
    pub email: Option<String>,
    /// An optional contact phone number.
    pub phone: Option<String>,
    /// When the member joined the group.
    pub join_date: Date,
    /// Whether the member is active.
    pub status: MemberStatus,
    /// The member's balance in XAF.
    ///
    /// Only ledger operations change the balance, it is never edited directly.
    pub balance: Decimal,
    /// Incremented on every write, used to detect concurrent modification.
    #[serde(skip)]
    pub version: i64,
}

/// The data needed to create or edit a member.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    /// The member's full name.
    pub name: String,
    /// An optional contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// An optional contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// When the member joined, defaults to today.
    #[serde(default)]
    pub join_date: Option<Date>,
    /// Defaults to [MemberStatus::Active].
    #[serde(default)]
    pub status: MemberStatus,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the member table in the database.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_member_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS member (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE,
            phone TEXT,
            join_date TEXT NOT NULL,
            status TEXT NOT NULL,
            balance TEXT NOT NULL DEFAULT '0',
            version INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_member_name ON member(name);",
    )?;

    Ok(())
}

const MEMBER_COLUMNS: &str = "id, name, email, phone, join_date, status, balance, version";

/// Map a row selected with the member columns in table order to a [Member].
pub fn map_member_row(row: &Row) -> Result<Member, rusqlite::Error> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        join_date: row.get(4)?,
        status: row.get(5)?,
        balance: get_decimal(row, 6)?,
        version: row.get(7)?,
    })
}

/// Blank optional text is stored as NULL so the UNIQUE email constraint only
/// applies to real addresses.
fn normalize_optional(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

fn map_unique_violation(error: rusqlite::Error, email: Option<&str>) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateMemberEmail(email.unwrap_or_default().to_owned()),
        error => error.into(),
    }
}

/// Create a member with a zero balance.
///
/// `today` is used as the join date when `new_member` does not specify one.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyField] if the name is blank,
/// - [Error::DuplicateMemberEmail] if another member uses the same email,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_member(
    new_member: &NewMember,
    today: Date,
    connection: &Connection,
) -> Result<Member, Error> {
    let name = require_text(&new_member.name, "member name")?;
    let email = normalize_optional(new_member.email.as_deref());
    let phone = normalize_optional(new_member.phone.as_deref());
    let join_date = new_member.join_date.unwrap_or(today);

    connection
        .prepare(&format!(
            "INSERT INTO member (name, email, phone, join_date, status, balance, version)
             VALUES (?1, ?2, ?3, ?4, ?5, '0', 0)
             RETURNING {MEMBER_COLUMNS}"
        ))?
        .query_row(
            (&name, &email, &phone, join_date, new_member.status),
            map_member_row,
        )
        .map_err(|error| map_unique_violation(error, email.as_deref()))
}

/// Retrieve a member by `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::MemberNotFound] if `id` does not refer to a member,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_member(id: MemberId, connection: &Connection) -> Result<Member, Error> {
    connection
        .prepare(&format!("SELECT {MEMBER_COLUMNS} FROM member WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_member_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::MemberNotFound(id),
            error => error.into(),
        })
}

/// Retrieve all members ordered by name.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn get_all_members(connection: &Connection) -> Result<Vec<Member>, Error> {
    connection
        .prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM member ORDER BY name ASC, id ASC"
        ))?
        .query_map([], map_member_row)?
        .map(|maybe_member| maybe_member.map_err(Error::from))
        .collect()
}

/// Update the identity fields of a member. The balance is left untouched.
///
/// # Errors
/// This function will return a:
/// - [Error::MemberNotFound] if `id` does not refer to a member,
/// - [Error::EmptyField] if the name is blank,
/// - [Error::DuplicateMemberEmail] if another member uses the same email,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_member(
    id: MemberId,
    update: &NewMember,
    connection: &Connection,
) -> Result<Member, Error> {
    let existing = get_member(id, connection)?;
    let name = require_text(&update.name, "member name")?;
    let email = normalize_optional(update.email.as_deref());
    let phone = normalize_optional(update.phone.as_deref());
    let join_date = update.join_date.unwrap_or(existing.join_date);

    let rows_affected = connection
        .execute(
            "UPDATE member
             SET name = ?1, email = ?2, phone = ?3, join_date = ?4, status = ?5, version = version + 1
             WHERE id = ?6 AND version = ?7",
            (
                &name,
                &email,
                &phone,
                join_date,
                update.status,
                id,
                existing.version,
            ),
        )
        .map_err(|error| map_unique_violation(error, email.as_deref()))?;

    if rows_affected == 0 {
        return Err(Error::ConcurrentModification("member"));
    }

    get_member(id, connection)
}

/// Delete a member.
///
/// # Errors
/// This function will return a:
/// - [Error::MemberNotFound] if `id` does not refer to a member,
/// - [Error::MemberHasTransactions] if any transaction names the member as
///   sender or recipient,
/// - [Error::MemberHasPenalties] if any penalty, paid or not, names the member,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_member(id: MemberId, connection: &Connection) -> Result<Member, Error> {
    let member = get_member(id, connection)?;

    let transaction_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\" WHERE member_id = ?1 OR recipient_id = ?1",
        [id],
        |row| row.get(0),
    )?;

    if transaction_count > 0 {
        return Err(Error::MemberHasTransactions(id));
    }

    let penalty_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM penalty WHERE member_id = ?1",
        [id],
        |row| row.get(0),
    )?;

    if penalty_count > 0 {
        return Err(Error::MemberHasPenalties(id));
    }

    connection.execute("DELETE FROM member WHERE id = ?1", [id])?;
    tracing::info!("Deleted member {id} \"{}\"", member.name);

    Ok(member)
}

/// Add `delta` to the balance of the member `id` and return the new balance.
///
/// No check is made on the sign of `delta` or the resulting balance: members
/// may go into debt.
///
/// # Errors
/// This function will return a:
/// - [Error::MemberNotFound] if `id` does not refer to a member,
/// - [Error::AmountOverflow] if the new balance is out of range,
/// - [Error::ConcurrentModification] if the member changed since it was read,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn adjust_member_balance(
    id: MemberId,
    delta: Decimal,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let member = get_member(id, connection)?;
    let new_balance = checked_add(member.balance, delta)?;

    let rows_affected = connection.execute(
        "UPDATE member SET balance = ?1, version = version + 1 WHERE id = ?2 AND version = ?3",
        (new_balance.to_string(), id, member.version),
    )?;

    if rows_affected == 0 {
        return Err(Error::ConcurrentModification("member"));
    }

    tracing::debug!("Member {id} balance {} -> {new_balance}", member.balance);

    Ok(new_balance)
}
