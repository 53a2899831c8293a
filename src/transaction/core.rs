//! Defines the transaction model, the append-only audit record of every
//! balance-affecting event, and its database queries.

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
    database_id::{FundId, LoanId, MemberId, TransactionId},
    money::get_decimal,
};

// ============================================================================
// MODELS
// ============================================================================

/// The kind of event a [Transaction] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money paid in to a member's balance.
    Deposit,
    /// Money taken out of a member's balance.
    Withdrawal,
    /// The sending leg of a member-to-member transfer.
    Transfer,
    /// The disbursement of a loan to a member.
    Loan,
    /// A payment towards a loan.
    Repayment,
    /// A member paying into a fund.
    Contribution,
    /// A member paying a penalty.
    Penalty,
}

impl TransactionType {
    /// The lowercase name used in the API and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
            TransactionType::Loan => "loan",
            TransactionType::Repayment => "repayment",
            TransactionType::Contribution => "contribution",
            TransactionType::Penalty => "penalty",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "transfer" => Ok(TransactionType::Transfer),
            "loan" => Ok(TransactionType::Loan),
            "repayment" => Ok(TransactionType::Repayment),
            "contribution" => Ok(TransactionType::Contribution),
            "penalty" => Ok(TransactionType::Penalty),
            other => Err(format!("unknown transaction type \"{other}\"")),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A single balance-affecting event.
///
/// Transactions are never edited by the ledger except to link the two legs of
/// a transfer and to follow edits of the contribution that owns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// What kind of event this is.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The size of the event. Always positive, the type decides the direction.
    pub amount: Decimal,
    /// When the event happened.
    pub date: Date,
    /// A text description of the event.
    pub description: String,
    /// The member whose balance the event affects.
    pub member_id: MemberId,
    /// The receiving member of a transfer.
    pub recipient_id: Option<MemberId>,
    /// The fund involved, if any.
    pub fund_id: Option<FundId>,
    /// The loan involved, if any.
    pub loan_id: Option<LoanId>,
    /// The other leg of a transfer.
    pub related_transaction_id: Option<TransactionId>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        transaction_type: TransactionType,
        amount: Decimal,
        date: Date,
        member_id: MemberId,
    ) -> TransactionBuilder {
        TransactionBuilder {
            transaction_type,
            amount,
            date,
            description: String::new(),
            member_id,
            recipient_id: None,
            fund_id: None,
            loan_id: None,
            related_transaction_id: None,
        }
    }
}

/// A builder for creating [Transaction] records.
///
/// Only the type, amount, date and member are required, everything else
/// defaults to empty.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// What kind of event this is.
    pub transaction_type: TransactionType,
    /// The size of the event.
    pub amount: Decimal,
    /// When the event happened.
    pub date: Date,
    /// A text description of the event.
    pub description: String,
    /// The member whose balance the event affects.
    pub member_id: MemberId,
    /// The receiving member of a transfer.
    pub recipient_id: Option<MemberId>,
    /// The fund involved.
    pub fund_id: Option<FundId>,
    /// The loan involved.
    pub loan_id: Option<LoanId>,
    /// The other leg of a transfer.
    pub related_transaction_id: Option<TransactionId>,
}

impl TransactionBuilder {
    /// Set the description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    /// Set the receiving member.
    pub fn recipient_id(mut self, recipient_id: Option<MemberId>) -> Self {
        self.recipient_id = recipient_id;
        self
    }

    /// Set the fund.
    pub fn fund_id(mut self, fund_id: Option<FundId>) -> Self {
        self.fund_id = fund_id;
        self
    }

    /// Set the loan.
    pub fn loan_id(mut self, loan_id: Option<LoanId>) -> Self {
        self.loan_id = loan_id;
        self
    }

    /// Set the other leg of a transfer.
    pub fn related_transaction_id(mut self, related_transaction_id: Option<TransactionId>) -> Self {
        self.related_transaction_id = related_transaction_id;
        self
    }
}

/// Narrows down the transactions returned by [query_transactions].
///
/// Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    /// Transactions where the member is the sender or the recipient.
    pub member_id: Option<MemberId>,
    /// Transactions of this type.
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// Transactions involving this fund.
    pub fund_id: Option<FundId>,
    /// Transactions on or after this date.
    pub from: Option<Date>,
    /// Transactions on or before this date.
    pub to: Option<Date>,
    /// The maximum number of transactions to return.
    pub limit: Option<u32>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_type TEXT NOT NULL,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            member_id INTEGER NOT NULL,
            recipient_id INTEGER,
            fund_id INTEGER,
            loan_id INTEGER,
            related_transaction_id INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_member ON \"transaction\"(member_id);
        CREATE INDEX IF NOT EXISTS idx_transaction_recipient ON \"transaction\"(recipient_id);
        CREATE INDEX IF NOT EXISTS idx_transaction_date ON \"transaction\"(date);",
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str = "id, transaction_type, amount, date, description, member_id, \
     recipient_id, fund_id, loan_id, related_transaction_id";

/// Map a row selected with the transaction columns in table order to a [Transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        transaction_type: row.get(1)?,
        amount: get_decimal(row, 2)?,
        date: row.get(3)?,
        description: row.get(4)?,
        member_id: row.get(5)?,
        recipient_id: row.get(6)?,
        fund_id: row.get(7)?,
        loan_id: row.get(8)?,
        related_transaction_id: row.get(9)?,
    })
}

/// Insert a transaction record from a builder.
///
/// This only writes the audit record. Callers are responsible for the
/// balance changes the record describes.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn create_transaction_record(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (transaction_type, amount, date, description, member_id,
                recipient_id, fund_id, loan_id, related_transaction_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.transaction_type,
                builder.amount.to_string(),
                builder.date,
                builder.description,
                builder.member_id,
                builder.recipient_id,
                builder.fund_id,
                builder.loan_id,
                builder.related_transaction_id,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound(id),
            error => error.into(),
        })
}

/// Retrieve the transactions matching `filter`, newest first.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn query_transactions(
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    // Sort by date, and then ID to keep the order stable for same-day transactions
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
         WHERE (?1 IS NULL OR member_id = ?1 OR recipient_id = ?1)
           AND (?2 IS NULL OR transaction_type = ?2)
           AND (?3 IS NULL OR fund_id = ?3)
           AND (?4 IS NULL OR date >= ?4)
           AND (?5 IS NULL OR date <= ?5)
         ORDER BY date DESC, id DESC
         LIMIT ?6"
    );
    // A negative limit means no limit in SQLite.
    let limit = filter.limit.map(i64::from).unwrap_or(-1);

    connection
        .prepare(&query)?
        .query_map(
            (
                filter.member_id,
                filter.transaction_type,
                filter.fund_id,
                filter.from,
                filter.to,
                limit,
            ),
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Delete a transaction record by `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction_record(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::TransactionNotFound(id));
    }

    Ok(())
}

/// Point the transaction `id` at its other leg `related_id`.
pub(crate) fn link_related_transaction(
    id: TransactionId,
    related_id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET related_transaction_id = ?1 WHERE id = ?2",
        (related_id, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::TransactionNotFound(id));
    }

    Ok(())
}

/// Record that the transaction `id` disbursed the loan `loan_id`.
pub(crate) fn link_transaction_loan(
    id: TransactionId,
    loan_id: LoanId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET loan_id = ?1 WHERE id = ?2",
        (loan_id, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::TransactionNotFound(id));
    }

    Ok(())
}

/// Rewrite the amount, date, description and fund of the transaction `id`.
///
/// Used when the contribution that owns the transaction is edited.
pub(crate) fn update_transaction_record(
    id: TransactionId,
    amount: Decimal,
    date: Date,
    description: &str,
    fund_id: Option<FundId>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET amount = ?1, date = ?2, description = ?3, fund_id = ?4
         WHERE id = ?5",
        (amount.to_string(), date, description, fund_id, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::TransactionNotFound(id));
    }

    Ok(())
}

/// Whether a contribution, loan or penalty refers to the transaction `id`.
pub(crate) fn is_owned_transaction(id: TransactionId, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM contribution WHERE transaction_id = ?1)
                 OR EXISTS(SELECT 1 FROM loan WHERE transaction_id = ?1)
                 OR EXISTS(SELECT 1 FROM penalty WHERE transaction_id = ?1)",
            [id],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{Error, db::initialize};

    use super::{
        Transaction, TransactionFilter, TransactionType, create_transaction_record,
        delete_transaction_record, get_transaction, is_owned_transaction,
        link_related_transaction, query_transactions,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn create_and_get_transaction() {
        let connection = get_test_connection();

        let transaction = create_transaction_record(
            Transaction::build(
                TransactionType::Contribution,
                dec!(2500.50),
                date!(2025 - 02 - 14),
                1,
            )
            .description("Monthly savings")
            .fund_id(Some(3)),
            &connection,
        )
        .unwrap();

        assert!(transaction.id > 0);
        assert_eq!(transaction.transaction_type, TransactionType::Contribution);
        assert_eq!(transaction.amount, dec!(2500.50));
        assert_eq!(transaction.fund_id, Some(3));
        assert_eq!(transaction.recipient_id, None);
        assert_eq!(get_transaction(transaction.id, &connection), Ok(transaction));
    }

    #[test]
    fn get_missing_transaction_returns_not_found() {
        let connection = get_test_connection();

        assert_eq!(
            get_transaction(5, &connection),
            Err(Error::TransactionNotFound(5))
        );
    }

    #[test]
    fn delete_transaction_record_removes_row() {
        let connection = get_test_connection();
        let transaction = create_transaction_record(
            Transaction::build(TransactionType::Deposit, dec!(1), date!(2025 - 02 - 14), 1),
            &connection,
        )
        .unwrap();

        delete_transaction_record(transaction.id, &connection).unwrap();

        assert_eq!(
            delete_transaction_record(transaction.id, &connection),
            Err(Error::TransactionNotFound(transaction.id))
        );
    }

    #[test]
    fn link_related_transaction_sets_pointer() {
        let connection = get_test_connection();
        let first = create_transaction_record(
            Transaction::build(TransactionType::Transfer, dec!(5), date!(2025 - 02 - 14), 1),
            &connection,
        )
        .unwrap();
        let second = create_transaction_record(
            Transaction::build(TransactionType::Deposit, dec!(5), date!(2025 - 02 - 14), 2)
                .related_transaction_id(Some(first.id)),
            &connection,
        )
        .unwrap();

        link_related_transaction(first.id, second.id, &connection).unwrap();

        assert_eq!(
            get_transaction(first.id, &connection)
                .unwrap()
                .related_transaction_id,
            Some(second.id)
        );
    }

    #[test]
    fn query_transactions_filters_and_orders_newest_first() {
        let connection = get_test_connection();
        let build = |transaction_type, amount, date, member_id| {
            create_transaction_record(
                Transaction::build(transaction_type, amount, date, member_id),
                &connection,
            )
            .unwrap()
        };
        let older = build(TransactionType::Deposit, dec!(10), date!(2025 - 01 - 01), 1);
        let newer = build(TransactionType::Withdrawal, dec!(5), date!(2025 - 01 - 05), 1);
        build(TransactionType::Deposit, dec!(7), date!(2025 - 01 - 03), 2);
        let received = create_transaction_record(
            Transaction::build(TransactionType::Transfer, dec!(3), date!(2025 - 01 - 04), 2)
                .recipient_id(Some(1)),
            &connection,
        )
        .unwrap();

        let for_member = query_transactions(
            &TransactionFilter {
                member_id: Some(1),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        assert_eq!(for_member, vec![newer, received, older.clone()]);

        let deposits = query_transactions(
            &TransactionFilter {
                member_id: Some(1),
                transaction_type: Some(TransactionType::Deposit),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        assert_eq!(deposits, vec![older]);

        let limited = query_transactions(
            &TransactionFilter {
                limit: Some(2),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        assert_eq!(limited.len(), 2);

        let in_range = query_transactions(
            &TransactionFilter {
                from: Some(date!(2025 - 01 - 03)),
                to: Some(date!(2025 - 01 - 04)),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        assert_eq!(in_range.len(), 2);
    }

    #[test]
    fn transactions_referenced_by_penalties_are_owned() {
        let connection = get_test_connection();
        let transaction = create_transaction_record(
            Transaction::build(TransactionType::Penalty, dec!(30), date!(2025 - 02 - 14), 1),
            &connection,
        )
        .unwrap();
        let loose = create_transaction_record(
            Transaction::build(TransactionType::Deposit, dec!(30), date!(2025 - 02 - 14), 1),
            &connection,
        )
        .unwrap();
        connection
            .execute(
                "INSERT INTO penalty (member_id, amount, reason, date, status, transaction_id)
                 VALUES (1, '30', 'Late', '2025-02-14', 'paid', ?1)",
                [transaction.id],
            )
            .unwrap();

        assert_eq!(is_owned_transaction(transaction.id, &connection), Ok(true));
        assert_eq!(is_owned_transaction(loose.id, &connection), Ok(false));
    }
}
