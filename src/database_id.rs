//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// Database identifier for a member.
pub type MemberId = DatabaseId;
/// Database identifier for a fund.
pub type FundId = DatabaseId;
/// Database identifier for a transaction.
pub type TransactionId = DatabaseId;
/// Database identifier for a contribution.
pub type ContributionId = DatabaseId;
/// Database identifier for a loan.
pub type LoanId = DatabaseId;
/// Database identifier for a penalty.
pub type PenaltyId = DatabaseId;
