//! The loan status state machine.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Where a loan is in its life.
///
/// ```text
/// pending -> approved -> active -> paid
///                          |  ^      ^
///                          v  |      |
///                        defaulted --+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Requested but not yet approved. The only status a loan can be deleted in.
    #[default]
    Pending,
    /// Approved by the group.
    Approved,
    /// Being repaid. Only active loans accrue interest.
    Active,
    /// Fully repaid.
    Paid,
    /// The member stopped repaying.
    Defaulted,
}

impl LoanStatus {
    /// The lowercase name used in the API and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Active => "active",
            LoanStatus::Paid => "paid",
            LoanStatus::Defaulted => "defaulted",
        }
    }

    /// Whether a manual status update may move a loan from `self` to `next`.
    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        matches!(
            (self, next),
            (LoanStatus::Pending, LoanStatus::Approved)
                | (LoanStatus::Approved, LoanStatus::Active)
                | (LoanStatus::Active, LoanStatus::Paid)
                | (LoanStatus::Active, LoanStatus::Defaulted)
                | (LoanStatus::Defaulted, LoanStatus::Active)
                | (LoanStatus::Defaulted, LoanStatus::Paid)
        )
    }

    /// Move from `self` to `next`.
    ///
    /// # Errors
    /// Returns [Error::IllegalLoanTransition] if the transition table does not
    /// allow it, including when `next` is the current status.
    pub fn transition(self, next: LoanStatus) -> Result<LoanStatus, Error> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::IllegalLoanTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether interest accrues on a loan in this status.
    pub fn accrues_interest(self) -> bool {
        self == LoanStatus::Active
    }
}

impl Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LoanStatus::Pending),
            "approved" => Ok(LoanStatus::Approved),
            "active" => Ok(LoanStatus::Active),
            "paid" => Ok(LoanStatus::Paid),
            "defaulted" => Ok(LoanStatus::Defaulted),
            other => Err(format!("unknown loan status \"{other}\"")),
        }
    }
}

impl ToSql for LoanStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LoanStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}
