//! The ledger operations that levy, pay, edit and delete penalties.

use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    database_id::PenaltyId,
    member::{adjust_member_balance, get_member},
    money::{require_text, validate_amount},
    penalty::{
        NewPenalty, Penalty, PenaltyStatus, PenaltyUpdate,
        core::{
            get_penalty, insert_penalty, remove_penalty, save_penalty_details,
            save_penalty_status,
        },
    },
    transaction::{Transaction, TransactionType, create_transaction_record, delete_transaction_record},
};

/// Levy a penalty on a member, paying it straight away if it is created as paid.
///
/// `today` is used when the penalty has no date.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - [Error::EmptyField] if the reason is empty,
/// - [Error::MemberNotFound] if the member does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_penalty(
    new_penalty: &NewPenalty,
    today: Date,
    connection: &Connection,
) -> Result<Penalty, Error> {
    validate_amount(new_penalty.amount)?;
    let reason = require_text(&new_penalty.reason, "reason")?;
    get_member(new_penalty.member_id, connection)?;

    let mut penalty = insert_penalty(
        new_penalty.member_id,
        new_penalty.amount,
        &reason,
        new_penalty.date.unwrap_or(today),
        connection,
    )?;

    if new_penalty.status == PenaltyStatus::Paid {
        pay(&mut penalty, connection)?;
    }

    tracing::info!(
        "Penalty {} of {} levied on member {} ({})",
        penalty.id,
        penalty.amount,
        penalty.member_id,
        penalty.status
    );

    Ok(penalty)
}

/// Debit the member and record the payment transaction.
fn pay(penalty: &mut Penalty, connection: &Connection) -> Result<(), Error> {
    let transaction = create_transaction_record(
        Transaction::build(
            TransactionType::Penalty,
            penalty.amount,
            penalty.date,
            penalty.member_id,
        )
        .description(&format!("Penalty: {}", penalty.reason)),
        connection,
    )?;
    adjust_member_balance(penalty.member_id, -penalty.amount, connection)?;

    save_penalty_status(penalty, PenaltyStatus::Paid, Some(transaction.id), connection)
}

/// Credit the member back and remove the payment transaction.
fn unpay(penalty: &mut Penalty, connection: &Connection) -> Result<(), Error> {
    if let Some(transaction_id) = penalty.transaction_id {
        delete_transaction_record(transaction_id, connection)?;
    }
    adjust_member_balance(penalty.member_id, penalty.amount, connection)?;

    save_penalty_status(penalty, PenaltyStatus::Pending, None, connection)
}

/// Pay a pending penalty or undo the payment of a paid one.
///
/// # Errors
/// This function will return a:
/// - [Error::PenaltyNotFound] if `id` does not refer to a penalty,
/// - [Error::PenaltyStatusUnchanged] if the penalty already has `status`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn set_penalty_status(
    id: PenaltyId,
    status: PenaltyStatus,
    connection: &Connection,
) -> Result<Penalty, Error> {
    let mut penalty = get_penalty(id, connection)?;

    match (penalty.status, status) {
        (PenaltyStatus::Pending, PenaltyStatus::Paid) => pay(&mut penalty, connection)?,
        (PenaltyStatus::Paid, PenaltyStatus::Pending) => unpay(&mut penalty, connection)?,
        (current, _) => return Err(Error::PenaltyStatusUnchanged(current)),
    }

    tracing::info!("Penalty {id} is now {status}");

    Ok(penalty)
}

/// Edit the amount, reason and date of a pending penalty.
///
/// # Errors
/// This function will return a:
/// - [Error::PenaltyNotFound] if `id` does not refer to a penalty,
/// - [Error::PenaltyAlreadyPaid] if the penalty has been paid,
/// - [Error::InvalidAmount] or [Error::EmptyField] if the new values are invalid,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_penalty(
    id: PenaltyId,
    update: &PenaltyUpdate,
    connection: &Connection,
) -> Result<Penalty, Error> {
    let penalty = get_penalty(id, connection)?;
    if penalty.status == PenaltyStatus::Paid {
        return Err(Error::PenaltyAlreadyPaid(id));
    }

    validate_amount(update.amount)?;
    let reason = require_text(&update.reason, "reason")?;

    save_penalty_details(id, update.amount, &reason, update.date, connection)
}

/// Delete a penalty, refunding the member first if it was paid.
///
/// # Errors
/// This function will return a:
/// - [Error::PenaltyNotFound] if `id` does not refer to a penalty,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_penalty(id: PenaltyId, connection: &Connection) -> Result<Penalty, Error> {
    let mut penalty = get_penalty(id, connection)?;

    if penalty.status == PenaltyStatus::Paid {
        unpay(&mut penalty, connection)?;
    }
    remove_penalty(id, connection)?;

    tracing::info!(
        "Deleted penalty {id} of {} on member {}",
        penalty.amount,
        penalty.member_id
    );

    Ok(penalty)
}
