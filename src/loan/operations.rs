//! The ledger operations for issuing, repaying, settling and deleting loans.

use rusqlite::Connection;
use rust_decimal::Decimal;
use time::Date;

use crate::{
    Error,
    database_id::LoanId,
    fund::{FundType, add_fund_interest_earned, adjust_fund_total, get_fund},
    loan::{
        Loan, LoanFilter, LoanStatus, NewLoan, Repayment,
        core::{get_loan, get_loans, insert_loan, remove_loan, save_loan},
        interest::{accrue, allocate_payment, apply_payment, full_term_interest},
    },
    member::{adjust_member_balance, get_member},
    money::{validate_amount, validate_interest_rate},
    transaction::{
        Transaction, TransactionType, create_transaction_record, delete_transaction_record,
        link_transaction_loan,
    },
};

/// Issue a loan and disburse it from its fund to the member.
///
/// The member's balance goes up and the fund's total goes down by the loan
/// amount, and a loan transaction is recorded. `today` is used when the loan
/// has no start date.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - [Error::InvalidInterestRate] if the rate is out of range,
/// - [Error::InvalidDueDate] if the loan is due before it starts,
/// - [Error::IllegalLoanTransition] if the loan would start out paid or defaulted,
/// - [Error::MemberNotFound] or [Error::FundNotFound] if a reference is invalid,
/// - [Error::NotAnInvestmentFund] if the fund cannot lend,
/// - [Error::InsufficientFundBalance] if the fund holds less than the amount,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_loan(new_loan: &NewLoan, today: Date, connection: &Connection) -> Result<Loan, Error> {
    validate_amount(new_loan.amount)?;
    validate_interest_rate(new_loan.interest_rate)?;

    if matches!(new_loan.status, LoanStatus::Paid | LoanStatus::Defaulted) {
        return Err(Error::IllegalLoanTransition {
            from: LoanStatus::Pending,
            to: new_loan.status,
        });
    }

    let start_date = new_loan.start_date.unwrap_or(today);
    if new_loan.due_date < start_date {
        return Err(Error::InvalidDueDate {
            start_date,
            due_date: new_loan.due_date,
        });
    }

    get_member(new_loan.member_id, connection)?;
    let fund = get_fund(new_loan.fund_id, connection)?;

    if fund.fund_type != FundType::Investment {
        return Err(Error::NotAnInvestmentFund(fund.id));
    }

    if fund.total_amount < new_loan.amount {
        return Err(Error::InsufficientFundBalance {
            available: fund.total_amount,
            requested: new_loan.amount,
        });
    }

    let description = if new_loan.purpose.trim().is_empty() {
        format!("Loan from {}", fund.name)
    } else {
        format!("Loan from {}: {}", fund.name, new_loan.purpose.trim())
    };

    let transaction = create_transaction_record(
        Transaction::build(
            TransactionType::Loan,
            new_loan.amount,
            start_date,
            new_loan.member_id,
        )
        .fund_id(Some(fund.id))
        .description(&description),
        connection,
    )?;
    let loan = insert_loan(new_loan, start_date, transaction.id, connection)?;
    link_transaction_loan(transaction.id, loan.id, connection)?;

    adjust_member_balance(loan.member_id, loan.amount, connection)?;
    adjust_fund_total(loan.fund_id, -loan.amount, connection)?;

    tracing::info!(
        "Loan {} of {} at {}% issued to member {} from fund {}",
        loan.id,
        loan.amount,
        loan.interest_rate,
        loan.member_id,
        loan.fund_id
    );

    Ok(loan)
}

/// Bring the interest of `loan` up to `as_of` and persist it if anything accrued.
fn accrue_and_save(loan: &mut Loan, as_of: Date, connection: &Connection) -> Result<(), Error> {
    let accrued = accrue(loan, as_of)?;

    if !accrued.is_zero() {
        save_loan(loan, connection)?;
        tracing::debug!(
            "Loan {} accrued {accrued} interest up to {as_of}",
            loan.id
        );
    }

    Ok(())
}

/// Retrieve a loan with its interest accrued up to `today`.
///
/// # Errors
/// This function will return a:
/// - [Error::LoanNotFound] if `id` does not refer to a loan,
/// - [Error::ConcurrentModification] if the loan changed while accruing,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_loan_with_interest(
    id: LoanId,
    today: Date,
    connection: &Connection,
) -> Result<Loan, Error> {
    let mut loan = get_loan(id, connection)?;
    accrue_and_save(&mut loan, today, connection)?;

    Ok(loan)
}

/// Retrieve the loans matching `filter` with their interest accrued up to `today`.
///
/// # Errors
/// This function will return a:
/// - [Error::ConcurrentModification] if a loan changed while accruing,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_loans_with_interest(
    filter: &LoanFilter,
    today: Date,
    connection: &Connection,
) -> Result<Vec<Loan>, Error> {
    let mut loans = get_loans(filter, connection)?;

    for loan in loans.iter_mut() {
        accrue_and_save(loan, today, connection)?;
    }

    Ok(loans)
}

/// Pay towards the loan `id`, settling accrued interest before principal.
///
/// Interest is accrued up to `today` first. The member is debited the full
/// amount, the principal part returns to the fund's total and the interest
/// part is added to the fund's undistributed interest. Once nothing is owed
/// the loan is marked as paid.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - [Error::LoanNotFound] if `id` does not refer to a loan,
/// - [Error::LoanAlreadyPaid] if the loan is already paid,
/// - [Error::LoanNotActive] if the loan is still pending or approved,
/// - [Error::PaymentExceedsOutstanding] if the amount is more than is owed,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn repay_loan(
    id: LoanId,
    repayment: &Repayment,
    today: Date,
    connection: &Connection,
) -> Result<Loan, Error> {
    validate_amount(repayment.amount)?;

    let mut loan = get_loan(id, connection)?;
    match loan.status {
        LoanStatus::Active | LoanStatus::Defaulted => {}
        LoanStatus::Paid => return Err(Error::LoanAlreadyPaid(id)),
        status => return Err(Error::LoanNotActive(status)),
    }

    accrue(&mut loan, today)?;

    let outstanding = loan.outstanding();
    if repayment.amount > outstanding {
        return Err(Error::PaymentExceedsOutstanding {
            amount: repayment.amount,
            outstanding,
        });
    }

    let allocation = allocate_payment(repayment.amount, loan.remaining_interest);
    let description = if repayment.description.trim().is_empty() {
        format!("Repayment of loan {id}")
    } else {
        repayment.description.trim().to_owned()
    };

    create_transaction_record(
        Transaction::build(
            TransactionType::Repayment,
            repayment.amount,
            repayment.date.unwrap_or(today),
            loan.member_id,
        )
        .fund_id(Some(loan.fund_id))
        .loan_id(Some(loan.id))
        .description(&description),
        connection,
    )?;
    adjust_member_balance(loan.member_id, -repayment.amount, connection)?;

    apply_payment(&mut loan, allocation);
    if loan.outstanding().is_zero() {
        loan.status = LoanStatus::Paid;
    }
    save_loan(&mut loan, connection)?;

    if !allocation.principal.is_zero() {
        adjust_fund_total(loan.fund_id, allocation.principal, connection)?;
    }
    if !allocation.interest.is_zero() {
        add_fund_interest_earned(loan.fund_id, allocation.interest, connection)?;
    }

    tracing::info!(
        "Loan {id} repaid {} ({} interest, {} principal), {} outstanding",
        repayment.amount,
        allocation.interest,
        allocation.principal,
        loan.outstanding()
    );

    Ok(loan)
}

/// Move the loan `id` to `status`.
///
/// Interest is accrued up to `today` before the status changes. Marking a
/// loan as paid settles whatever is still owed with a final repayment.
///
/// # Errors
/// This function will return a:
/// - [Error::LoanNotFound] if `id` does not refer to a loan,
/// - [Error::IllegalLoanTransition] if the loan cannot move to `status`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_loan_status(
    id: LoanId,
    status: LoanStatus,
    today: Date,
    connection: &Connection,
) -> Result<Loan, Error> {
    let mut loan = get_loan(id, connection)?;
    let next_status = loan.status.transition(status)?;

    accrue(&mut loan, today)?;

    if next_status == LoanStatus::Paid {
        settle_loan(&mut loan, today, connection)?;
    }

    let previous_status = loan.status;
    loan.status = next_status;
    save_loan(&mut loan, connection)?;

    tracing::info!("Loan {id} moved from {previous_status} to {next_status}");

    Ok(loan)
}

/// Collect everything still owed on `loan` and zero its balances.
///
/// `interest_paid` is set to the full-term interest on the original amount,
/// not the interest actually collected.
fn settle_loan(loan: &mut Loan, today: Date, connection: &Connection) -> Result<(), Error> {
    let total_due = loan.outstanding();

    if total_due > Decimal::ZERO {
        create_transaction_record(
            Transaction::build(TransactionType::Repayment, total_due, today, loan.member_id)
                .fund_id(Some(loan.fund_id))
                .loan_id(Some(loan.id))
                .description(&format!("Final settlement of loan {}", loan.id)),
            connection,
        )?;
        adjust_member_balance(loan.member_id, -total_due, connection)?;

        if !loan.remaining_principal.is_zero() {
            adjust_fund_total(loan.fund_id, loan.remaining_principal, connection)?;
        }
        if !loan.remaining_interest.is_zero() {
            add_fund_interest_earned(loan.fund_id, loan.remaining_interest, connection)?;
        }
    }

    loan.remaining_principal = Decimal::ZERO;
    loan.remaining_interest = Decimal::ZERO;
    loan.principal_paid = loan.amount;
    loan.interest_paid = full_term_interest(loan.amount, loan.interest_rate)?;

    Ok(())
}

/// Delete a pending loan and undo its disbursement.
///
/// # Errors
/// This function will return a:
/// - [Error::LoanNotFound] if `id` does not refer to a loan,
/// - [Error::LoanNotPending] if the loan has moved past pending,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_loan(id: LoanId, connection: &Connection) -> Result<Loan, Error> {
    let loan = get_loan(id, connection)?;

    if loan.status != LoanStatus::Pending {
        return Err(Error::LoanNotPending(loan.status));
    }

    adjust_fund_total(loan.fund_id, loan.amount, connection)?;
    delete_transaction_record(loan.transaction_id, connection)?;
    adjust_member_balance(loan.member_id, -loan.amount, connection)?;
    remove_loan(id, connection)?;

    tracing::info!(
        "Deleted pending loan {id} of {} to member {}",
        loan.amount,
        loan.member_id
    );

    Ok(loan)
}
