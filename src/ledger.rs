//! Runs ledger operations as atomic units of work.
//!
//! A ledger operation touches several records: a member's balance, a fund's
//! total, a loan's balances and one or more transactions. [Ledger::unit_of_work]
//! runs the whole operation inside one SQLite transaction so that either every
//! write is applied or none is. Each record carries a version number that is
//! checked on write; if another writer got there first the operation fails
//! with [Error::ConcurrentModification], the transaction is rolled back and
//! the operation is retried from scratch.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRef;
use rusqlite::{Connection, TransactionBehavior};
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    contribution::{
        Contribution, ContributionBatch, ContributionUpdate, create_contributions,
        delete_contribution, update_contribution,
    },
    dashboard::{DashboardSummary, get_dashboard_summary},
    database_id::{ContributionId, FundId, LoanId, MemberId, PenaltyId, TransactionId},
    fund::{
        Fund, FundUpdate, InterestDistribution, NewFund, create_fund, delete_fund,
        distribute_fund_interest, update_fund,
    },
    loan::{
        Loan, LoanStatus, NewLoan, Repayment, create_loan, delete_loan, get_loan_with_interest,
        repay_loan, update_loan_status,
    },
    member::{Member, NewMember, create_member, delete_member, update_member},
    penalty::{
        NewPenalty, Penalty, PenaltyStatus, PenaltyUpdate, create_penalty, delete_penalty,
        set_penalty_status, update_penalty,
    },
    timezone::get_local_offset,
    transaction::{NewTransaction, Transaction, create_transaction, delete_transaction},
};

/// Controls how the ledger runs operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// How many times an operation is attempted before a concurrent
    /// modification is reported to the caller.
    pub max_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Runs ledger operations against a database connection.
pub struct Ledger<'conn> {
    connection: &'conn mut Connection,
    config: LedgerConfig,
    today: Date,
}

impl<'conn> Ledger<'conn> {
    /// Create a ledger that dates operations without an explicit date on `today`.
    pub fn new(connection: &'conn mut Connection, config: LedgerConfig, today: Date) -> Self {
        Self {
            connection,
            config,
            today,
        }
    }

    /// The date used for operations that do not specify one.
    pub fn today(&self) -> Date {
        self.today
    }

    /// Run `operation` in a database transaction.
    ///
    /// The transaction is committed if `operation` succeeds and rolled back if
    /// it fails. On [Error::ConcurrentModification] the operation is run again
    /// on a fresh transaction, up to [LedgerConfig::max_attempts] times in total.
    ///
    /// `operation` receives the connection to run its queries on and today's date.
    ///
    /// # Errors
    /// Returns the error from the last attempt of `operation`, or
    /// [Error::SqlError] if the transaction cannot be started or committed.
    pub fn unit_of_work<T, F>(&mut self, mut operation: F) -> Result<T, Error>
    where
        F: FnMut(&Connection, Date) -> Result<T, Error>,
    {
        let mut attempt = 1;

        loop {
            let transaction = self
                .connection
                .transaction_with_behavior(TransactionBehavior::Immediate)?;

            match operation(&transaction, self.today) {
                Ok(value) => {
                    transaction.commit()?;
                    return Ok(value);
                }
                Err(Error::ConcurrentModification(record))
                    if attempt < self.config.max_attempts =>
                {
                    // Dropping the transaction rolls it back.
                    drop(transaction);
                    tracing::warn!(
                        "The {record} changed during attempt {attempt} of {}, retrying",
                        self.config.max_attempts
                    );
                    attempt += 1;
                }
                Err(error) => {
                    tracing::debug!("Rolling back unit of work: {error}");
                    return Err(error);
                }
            }
        }
    }
}

/// One method per ledger operation, each run as its own unit of work.
impl Ledger<'_> {
    /// Register a member. See [create_member].
    pub fn create_member(&mut self, new_member: &NewMember) -> Result<Member, Error> {
        self.unit_of_work(|connection, today| create_member(new_member, today, connection))
    }

    /// Edit a member's details. See [update_member].
    pub fn update_member(&mut self, id: MemberId, update: &NewMember) -> Result<Member, Error> {
        self.unit_of_work(|connection, _| update_member(id, update, connection))
    }

    /// Delete a member without transactions. See [delete_member].
    pub fn delete_member(&mut self, id: MemberId) -> Result<Member, Error> {
        self.unit_of_work(|connection, _| delete_member(id, connection))
    }

    /// Open a fund. See [create_fund].
    pub fn create_fund(&mut self, new_fund: &NewFund) -> Result<Fund, Error> {
        self.unit_of_work(|connection, _| create_fund(new_fund, connection))
    }

    /// Edit a fund's name, description and rate. See [update_fund].
    pub fn update_fund(&mut self, id: FundId, update: &FundUpdate) -> Result<Fund, Error> {
        self.unit_of_work(|connection, _| update_fund(id, update, connection))
    }

    /// Delete a fund nobody contributed to. See [delete_fund].
    pub fn delete_fund(&mut self, id: FundId) -> Result<Fund, Error> {
        self.unit_of_work(|connection, _| delete_fund(id, connection))
    }

    /// Pay a fund's earned interest out to its contributors. See [distribute_fund_interest].
    pub fn distribute_fund_interest(&mut self, id: FundId) -> Result<InterestDistribution, Error> {
        self.unit_of_work(|connection, today| distribute_fund_interest(id, today, connection))
    }

    /// Record a batch of contributions. See [create_contributions].
    pub fn create_contributions(
        &mut self,
        batch: &ContributionBatch,
    ) -> Result<Vec<Contribution>, Error> {
        self.unit_of_work(|connection, today| create_contributions(batch, today, connection))
    }

    /// Edit a contribution. See [update_contribution].
    pub fn update_contribution(
        &mut self,
        id: ContributionId,
        update: &ContributionUpdate,
    ) -> Result<Contribution, Error> {
        self.unit_of_work(|connection, _| update_contribution(id, update, connection))
    }

    /// Delete a contribution and undo its effects. See [delete_contribution].
    pub fn delete_contribution(&mut self, id: ContributionId) -> Result<Contribution, Error> {
        self.unit_of_work(|connection, _| delete_contribution(id, connection))
    }

    /// Issue a loan from an investment fund. See [create_loan].
    pub fn create_loan(&mut self, new_loan: &NewLoan) -> Result<Loan, Error> {
        self.unit_of_work(|connection, today| create_loan(new_loan, today, connection))
    }

    /// Get a loan with interest accrued up to today. See [get_loan_with_interest].
    pub fn get_loan(&mut self, id: LoanId) -> Result<Loan, Error> {
        self.unit_of_work(|connection, today| get_loan_with_interest(id, today, connection))
    }

    /// Pay towards a loan. See [repay_loan].
    pub fn repay_loan(&mut self, id: LoanId, repayment: &Repayment) -> Result<Loan, Error> {
        self.unit_of_work(|connection, today| repay_loan(id, repayment, today, connection))
    }

    /// Move a loan to another status. See [update_loan_status].
    pub fn update_loan_status(&mut self, id: LoanId, status: LoanStatus) -> Result<Loan, Error> {
        self.unit_of_work(|connection, today| update_loan_status(id, status, today, connection))
    }

    /// Delete a pending loan. See [delete_loan].
    pub fn delete_loan(&mut self, id: LoanId) -> Result<Loan, Error> {
        self.unit_of_work(|connection, _| delete_loan(id, connection))
    }

    /// Levy a penalty. See [create_penalty].
    pub fn create_penalty(&mut self, new_penalty: &NewPenalty) -> Result<Penalty, Error> {
        self.unit_of_work(|connection, today| create_penalty(new_penalty, today, connection))
    }

    /// Pay or unpay a penalty. See [set_penalty_status].
    pub fn set_penalty_status(
        &mut self,
        id: PenaltyId,
        status: PenaltyStatus,
    ) -> Result<Penalty, Error> {
        self.unit_of_work(|connection, _| set_penalty_status(id, status, connection))
    }

    /// Edit a pending penalty. See [update_penalty].
    pub fn update_penalty(
        &mut self,
        id: PenaltyId,
        update: &PenaltyUpdate,
    ) -> Result<Penalty, Error> {
        self.unit_of_work(|connection, _| update_penalty(id, update, connection))
    }

    /// Delete a penalty, refunding it first if it was paid. See [delete_penalty].
    pub fn delete_penalty(&mut self, id: PenaltyId) -> Result<Penalty, Error> {
        self.unit_of_work(|connection, _| delete_penalty(id, connection))
    }

    /// Record a deposit, withdrawal or transfer. See [create_transaction].
    pub fn create_transaction(
        &mut self,
        new_transaction: &NewTransaction,
    ) -> Result<Vec<Transaction>, Error> {
        self.unit_of_work(|connection, today| {
            create_transaction(new_transaction, today, connection)
        })
    }

    /// Delete a plain transaction and reverse it. See [delete_transaction].
    pub fn delete_transaction(&mut self, id: TransactionId) -> Result<Transaction, Error> {
        self.unit_of_work(|connection, _| delete_transaction(id, connection))
    }

    /// Summarize the ledger as of today. See [get_dashboard_summary].
    pub fn dashboard(&mut self) -> Result<DashboardSummary, Error> {
        self.unit_of_work(|connection, today| get_dashboard_summary(today, connection))
    }
}

/// The state needed by every ledger endpoint.
#[derive(Debug, Clone)]
pub struct LedgerState {
    /// The database connection shared by all requests.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Africa/Douala".
    pub local_timezone: String,
    /// How ledger operations are run.
    pub config: LedgerConfig,
}

impl FromRef<AppState> for LedgerState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            config: state.ledger_config,
        }
    }
}

impl LedgerState {
    /// Today's date in the local timezone.
    ///
    /// # Errors
    /// Returns [Error::InvalidTimezoneError] if the timezone is not a valid
    /// canonical timezone name.
    pub fn today(&self) -> Result<Date, Error> {
        let offset = get_local_offset(&self.local_timezone)
            .ok_or_else(|| Error::InvalidTimezoneError(self.local_timezone.clone()))?;

        Ok(OffsetDateTime::now_utc().to_offset(offset).date())
    }

    /// Run a ledger operation as a unit of work. See [Ledger::unit_of_work].
    ///
    /// # Errors
    /// Returns [Error::DatabaseLockError] if the database lock is poisoned,
    /// otherwise the error from the operation.
    pub fn run<T, F>(&self, operation: F) -> Result<T, Error>
    where
        F: FnMut(&Connection, Date) -> Result<T, Error>,
    {
        let today = self.today()?;
        let mut connection = self.lock()?;

        Ledger::new(&mut connection, self.config, today).unit_of_work(operation)
    }

    /// Run a read-only `query` against the database.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLockError] if the database lock is poisoned,
    /// otherwise the error from the query.
    pub fn read<T, F>(&self, query: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> Result<T, Error>,
    {
        let connection = self.lock()?;

        query(&connection)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|error| {
            tracing::error!("Could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}
