//! The ledger operations that create, edit and delete contributions.

use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    contribution::{
        Contribution, ContributionBatch, ContributionUpdate,
        core::{get_contribution, insert_contribution, remove_contribution, save_contribution},
    },
    database_id::ContributionId,
    fund::{adjust_fund_total, get_fund},
    member::{adjust_member_balance, get_member},
    money::{checked_sum, validate_amount},
    transaction::{
        Transaction, TransactionType, create_transaction_record, delete_transaction_record,
        update_transaction_record,
    },
};

/// Record every contribution in `batch` and debit the member once for the total.
///
/// Each contribution gets its own contribution transaction and raises its
/// fund's total. `today` is used when the batch has no date.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyContributionBatch] if the batch has no contributions,
/// - [Error::InvalidAmount] or [Error::AmountTooLarge] if any amount is out of range,
/// - [Error::AmountOverflow] if the batch total cannot be represented,
/// - [Error::MemberNotFound] or [Error::FundNotFound] if a reference is invalid,
/// - or [Error::SqlError] if there is some other SQL error.
///
/// All checks are made before anything is written.
pub fn create_contributions(
    batch: &ContributionBatch,
    today: Date,
    connection: &Connection,
) -> Result<Vec<Contribution>, Error> {
    if batch.contributions.is_empty() {
        return Err(Error::EmptyContributionBatch);
    }

    get_member(batch.member_id, connection)?;
    for item in &batch.contributions {
        validate_amount(item.amount)?;
        get_fund(item.fund_id, connection)?;
    }
    let total = checked_sum(batch.contributions.iter().map(|item| item.amount))?;

    let date = batch.date.unwrap_or(today);
    let description = batch.description.trim();
    let mut contributions = Vec::with_capacity(batch.contributions.len());

    for item in &batch.contributions {
        let transaction = create_transaction_record(
            Transaction::build(
                TransactionType::Contribution,
                item.amount,
                date,
                batch.member_id,
            )
            .fund_id(Some(item.fund_id))
            .description(description),
            connection,
        )?;
        let contribution = insert_contribution(
            batch.member_id,
            item,
            date,
            description,
            transaction.id,
            connection,
        )?;
        adjust_fund_total(item.fund_id, item.amount, connection)?;

        contributions.push(contribution);
    }

    adjust_member_balance(batch.member_id, -total, connection)?;

    tracing::info!(
        "Member {} contributed {total} across {} fund(s)",
        batch.member_id,
        contributions.len()
    );

    Ok(contributions)
}

/// Delete a contribution and undo its effects on the fund, the member and the log.
///
/// # Errors
/// This function will return a:
/// - [Error::ContributionNotFound] if `id` does not refer to a contribution,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_contribution(
    id: ContributionId,
    connection: &Connection,
) -> Result<Contribution, Error> {
    let contribution = get_contribution(id, connection)?;

    delete_transaction_record(contribution.transaction_id, connection)?;
    adjust_fund_total(contribution.fund_id, -contribution.amount, connection)?;
    adjust_member_balance(contribution.member_id, contribution.amount, connection)?;
    remove_contribution(id, connection)?;

    tracing::info!(
        "Deleted contribution {id} of {} by member {} to fund {}",
        contribution.amount,
        contribution.member_id,
        contribution.fund_id
    );

    Ok(contribution)
}

/// Edit a contribution, moving money between funds and the member as needed.
///
/// The old contribution is reversed and the new one applied, so the result is
/// the same as deleting and re-creating it, except that the IDs are kept.
///
/// # Errors
/// This function will return a:
/// - [Error::ContributionNotFound] if `id` does not refer to a contribution,
/// - [Error::InvalidAmount] if the new amount is not positive,
/// - [Error::FundNotFound] if the new fund does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_contribution(
    id: ContributionId,
    update: &ContributionUpdate,
    connection: &Connection,
) -> Result<Contribution, Error> {
    let existing = get_contribution(id, connection)?;
    validate_amount(update.amount)?;
    get_fund(update.fund_id, connection)?;

    adjust_fund_total(existing.fund_id, -existing.amount, connection)?;
    adjust_fund_total(update.fund_id, update.amount, connection)?;

    let member_delta = existing.amount - update.amount;
    if !member_delta.is_zero() {
        adjust_member_balance(existing.member_id, member_delta, connection)?;
    }

    update_transaction_record(
        existing.transaction_id,
        update.amount,
        update.date,
        update.description.trim(),
        Some(update.fund_id),
        connection,
    )?;
    let contribution = save_contribution(id, update, connection)?;

    tracing::info!(
        "Updated contribution {id}: {} to fund {} -> {} to fund {}",
        existing.amount,
        existing.fund_id,
        contribution.amount,
        contribution.fund_id
    );

    Ok(contribution)
}
