//! The ledger operations for plain deposits, withdrawals and member-to-member transfers.

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;

use crate::{
    Error,
    database_id::{FundId, MemberId, TransactionId},
    fund::get_fund,
    member::{adjust_member_balance, get_member},
    money::validate_amount,
    transaction::{
        Transaction, TransactionType,
        core::{
            create_transaction_record, delete_transaction_record, get_transaction,
            is_owned_transaction, link_related_transaction,
        },
    },
};

/// The request body for recording a transaction directly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTransaction {
    /// Deposit, withdrawal or transfer.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The size of the transaction.
    pub amount: Decimal,
    /// When it happened, defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
    /// A free text description.
    #[serde(default)]
    pub description: String,
    /// The member whose balance changes, the sender of a transfer.
    pub member_id: MemberId,
    /// The receiving member of a transfer.
    #[serde(default)]
    pub recipient_id: Option<MemberId>,
    /// The fund involved, if any.
    #[serde(default)]
    pub fund_id: Option<FundId>,
}

/// How deleting a transaction of `transaction_type` changes its member's balance.
///
/// Transfers, contributions and penalties have no reversal here: contributions
/// and penalties are reversed through their own records, and each transfer leg
/// is deleted on its own.
pub fn reversal_delta(transaction_type: TransactionType, amount: Decimal) -> Decimal {
    match transaction_type {
        TransactionType::Deposit | TransactionType::Loan => -amount,
        TransactionType::Withdrawal | TransactionType::Repayment => amount,
        TransactionType::Transfer | TransactionType::Contribution | TransactionType::Penalty => {
            Decimal::ZERO
        }
    }
}

/// Record a deposit, withdrawal or transfer and apply it to member balances.
///
/// A deposit credits and a withdrawal debits the member. A transfer produces
/// two linked transactions: the sender's transfer leg and a deposit leg for
/// the recipient. The sender is debited and the recipient credited.
///
/// Returns the transactions created, the sender's leg first.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - [Error::UnsupportedTransactionType] for any other transaction type,
/// - [Error::MissingRecipient] if a transfer has no recipient,
/// - [Error::SelfTransfer] if a member transfers to themselves,
/// - [Error::MemberNotFound] or [Error::FundNotFound] if a reference is invalid,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    new_transaction: &NewTransaction,
    today: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    validate_amount(new_transaction.amount)?;
    get_member(new_transaction.member_id, connection)?;
    if let Some(fund_id) = new_transaction.fund_id {
        get_fund(fund_id, connection)?;
    }

    let date = new_transaction.date.unwrap_or(today);
    let description = new_transaction.description.trim();
    let amount = new_transaction.amount;
    let member_id = new_transaction.member_id;

    let transactions = match new_transaction.transaction_type {
        TransactionType::Deposit | TransactionType::Withdrawal => {
            let transaction = create_transaction_record(
                Transaction::build(new_transaction.transaction_type, amount, date, member_id)
                    .fund_id(new_transaction.fund_id)
                    .description(description),
                connection,
            )?;
            let delta = if transaction.transaction_type == TransactionType::Deposit {
                amount
            } else {
                -amount
            };
            adjust_member_balance(member_id, delta, connection)?;

            vec![transaction]
        }
        TransactionType::Transfer => {
            let recipient_id = new_transaction
                .recipient_id
                .ok_or(Error::MissingRecipient)?;
            if recipient_id == member_id {
                return Err(Error::SelfTransfer);
            }
            get_member(recipient_id, connection)?;

            transfer(
                member_id,
                recipient_id,
                amount,
                date,
                description,
                new_transaction.fund_id,
                connection,
            )?
        }
        other => return Err(Error::UnsupportedTransactionType(other)),
    };

    tracing::info!(
        "Recorded {} of {amount} for member {member_id}",
        new_transaction.transaction_type
    );

    Ok(transactions)
}

fn transfer(
    sender_id: MemberId,
    recipient_id: MemberId,
    amount: Decimal,
    date: Date,
    description: &str,
    fund_id: Option<FundId>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut sent = create_transaction_record(
        Transaction::build(TransactionType::Transfer, amount, date, sender_id)
            .recipient_id(Some(recipient_id))
            .fund_id(fund_id)
            .description(description),
        connection,
    )?;
    let received = create_transaction_record(
        Transaction::build(TransactionType::Deposit, amount, date, recipient_id)
            .related_transaction_id(Some(sent.id))
            .fund_id(fund_id)
            .description(description),
        connection,
    )?;
    link_related_transaction(sent.id, received.id, connection)?;
    sent.related_transaction_id = Some(received.id);

    adjust_member_balance(sender_id, -amount, connection)?;
    adjust_member_balance(recipient_id, amount, connection)?;

    Ok(vec![sent, received])
}

/// Delete a transaction and reverse its effect on the member's balance.
///
/// Deleting one leg of a transfer leaves the other leg in place.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction,
/// - [Error::OwnedTransaction] if a contribution, loan or penalty owns the
///   transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = get_transaction(id, connection)?;

    if is_owned_transaction(id, connection)? {
        return Err(Error::OwnedTransaction(id));
    }

    delete_transaction_record(id, connection)?;

    let delta = reversal_delta(transaction.transaction_type, transaction.amount);
    if !delta.is_zero() {
        adjust_member_balance(transaction.member_id, delta, connection)?;
    }

    tracing::info!(
        "Deleted {} transaction {id} of {}, member {} adjusted by {delta}",
        transaction.transaction_type,
        transaction.amount,
        transaction.member_id
    );

    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        Error,
        contribution::{ContributionBatch, ContributionItem, create_contributions},
        fund::FundType,
        member::get_member,
        test_utils::{get_test_connection, must_create_fund, must_create_member, set_member_balance},
        transaction::{TransactionType, get_transaction},
    };

    use super::{NewTransaction, create_transaction, delete_transaction, reversal_delta};

    fn new_transaction(
        transaction_type: TransactionType,
        amount: Decimal,
        member_id: i64,
        recipient_id: Option<i64>,
    ) -> NewTransaction {
        NewTransaction {
            transaction_type,
            amount,
            date: Some(date!(2025 - 05 - 01)),
            description: "Cash".to_owned(),
            member_id,
            recipient_id,
            fund_id: None,
        }
    }

    #[test]
    fn reversal_signs() {
        let amount = dec!(10);

        assert_eq!(reversal_delta(TransactionType::Deposit, amount), dec!(-10));
        assert_eq!(reversal_delta(TransactionType::Loan, amount), dec!(-10));
        assert_eq!(reversal_delta(TransactionType::Withdrawal, amount), dec!(10));
        assert_eq!(reversal_delta(TransactionType::Repayment, amount), dec!(10));
        assert_eq!(reversal_delta(TransactionType::Transfer, amount), dec!(0));
        assert_eq!(reversal_delta(TransactionType::Contribution, amount), dec!(0));
        assert_eq!(reversal_delta(TransactionType::Penalty, amount), dec!(0));
    }

    #[test]
    fn deposit_and_withdrawal_move_balance() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);
        let today = date!(2025 - 05 - 02);

        create_transaction(
            &new_transaction(TransactionType::Deposit, dec!(100), member.id, None),
            today,
            &connection,
        )
        .unwrap();
        create_transaction(
            &new_transaction(TransactionType::Withdrawal, dec!(30), member.id, None),
            today,
            &connection,
        )
        .unwrap();

        assert_eq!(get_member(member.id, &connection).unwrap().balance, dec!(70));
    }

    #[test]
    fn transfer_creates_two_linked_legs() {
        let connection = get_test_connection();
        let sender = must_create_member("Amina", &connection);
        let recipient = must_create_member("Bello", &connection);
        set_member_balance(sender.id, dec!(100), &connection);

        let legs = create_transaction(
            &new_transaction(TransactionType::Transfer, dec!(40), sender.id, Some(recipient.id)),
            date!(2025 - 05 - 02),
            &connection,
        )
        .unwrap();

        assert_eq!(legs.len(), 2);
        let (sent, received) = (&legs[0], &legs[1]);
        assert_eq!(sent.transaction_type, TransactionType::Transfer);
        assert_eq!(sent.recipient_id, Some(recipient.id));
        assert_eq!(sent.related_transaction_id, Some(received.id));
        assert_eq!(received.transaction_type, TransactionType::Deposit);
        assert_eq!(received.member_id, recipient.id);
        assert_eq!(received.related_transaction_id, Some(sent.id));
        assert_eq!(get_transaction(sent.id, &connection).as_ref(), Ok(sent));

        let sender_balance = get_member(sender.id, &connection).unwrap().balance;
        let recipient_balance = get_member(recipient.id, &connection).unwrap().balance;
        assert_eq!(sender_balance, dec!(60));
        assert_eq!(recipient_balance, dec!(40));
        assert_eq!(sender_balance + recipient_balance, dec!(100));
    }

    #[test]
    fn transfer_validation() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);
        let today = date!(2025 - 05 - 02);

        assert_eq!(
            create_transaction(
                &new_transaction(TransactionType::Transfer, dec!(5), member.id, None),
                today,
                &connection
            ),
            Err(Error::MissingRecipient)
        );
        assert_eq!(
            create_transaction(
                &new_transaction(TransactionType::Transfer, dec!(5), member.id, Some(member.id)),
                today,
                &connection
            ),
            Err(Error::SelfTransfer)
        );
        assert_eq!(
            create_transaction(
                &new_transaction(TransactionType::Transfer, dec!(5), member.id, Some(99)),
                today,
                &connection
            ),
            Err(Error::MemberNotFound(99))
        );
    }

    #[test]
    fn other_types_are_rejected() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);

        for transaction_type in [
            TransactionType::Loan,
            TransactionType::Repayment,
            TransactionType::Contribution,
            TransactionType::Penalty,
        ] {
            assert_eq!(
                create_transaction(
                    &new_transaction(transaction_type, dec!(5), member.id, None),
                    date!(2025 - 05 - 02),
                    &connection
                ),
                Err(Error::UnsupportedTransactionType(transaction_type))
            );
        }
    }

    #[test]
    fn delete_deposit_reverses_balance() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);
        let created = create_transaction(
            &new_transaction(TransactionType::Deposit, dec!(100), member.id, None),
            date!(2025 - 05 - 02),
            &connection,
        )
        .unwrap();

        delete_transaction(created[0].id, &connection).unwrap();

        assert_eq!(get_member(member.id, &connection).unwrap().balance, dec!(0));
        assert_eq!(
            get_transaction(created[0].id, &connection),
            Err(Error::TransactionNotFound(created[0].id))
        );
    }

    #[test]
    fn delete_withdrawal_credits_member() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);
        let created = create_transaction(
            &new_transaction(TransactionType::Withdrawal, dec!(25), member.id, None),
            date!(2025 - 05 - 02),
            &connection,
        )
        .unwrap();

        delete_transaction(created[0].id, &connection).unwrap();

        assert_eq!(get_member(member.id, &connection).unwrap().balance, dec!(0));
    }

    #[test]
    fn deleting_one_transfer_leg_leaves_the_other() {
        let connection = get_test_connection();
        let sender = must_create_member("Amina", &connection);
        let recipient = must_create_member("Bello", &connection);
        let legs = create_transaction(
            &new_transaction(TransactionType::Transfer, dec!(40), sender.id, Some(recipient.id)),
            date!(2025 - 05 - 02),
            &connection,
        )
        .unwrap();

        delete_transaction(legs[1].id, &connection).unwrap();

        assert!(get_transaction(legs[0].id, &connection).is_ok());
        assert_eq!(get_member(sender.id, &connection).unwrap().balance, dec!(-40));
        assert_eq!(get_member(recipient.id, &connection).unwrap().balance, dec!(0));
    }

    #[test]
    fn owned_transactions_cannot_be_deleted_directly() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);
        let fund = must_create_fund("Savings", FundType::Savings, dec!(0), &connection);
        let contributions = create_contributions(
            &ContributionBatch {
                member_id: member.id,
                date: None,
                description: String::new(),
                contributions: vec![ContributionItem {
                    fund_id: fund.id,
                    amount: dec!(10),
                }],
            },
            date!(2025 - 05 - 02),
            &connection,
        )
        .unwrap();
        let transaction_id = contributions[0].transaction_id;

        assert_eq!(
            delete_transaction(transaction_id, &connection),
            Err(Error::OwnedTransaction(transaction_id))
        );
        assert!(get_transaction(transaction_id, &connection).is_ok());
    }
}
