//! Simple interest accrual and the split of loan payments between interest and principal.
//!
//! Interest accrues daily on the remaining principal using an actual/365 day
//! count:
//!
//! ```text
//! interest = remaining_principal * interest_rate / 100 * days / 365
//! ```
//!
//! rounded half away from zero to whole cents. Accrual is lazy: it is
//! computed whenever a loan is read, repaid or changes status.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::Date;

use crate::{
    Error,
    loan::Loan,
    money::{checked_add, checked_mul, round_money},
};

/// The day count convention divides by this many days per year.
pub const DAYS_PER_YEAR: Decimal = dec!(365);

/// Interest on `principal` at `interest_rate` percent per year between `from` and `to`.
///
/// Returns zero if `to` is not after `from`.
///
/// # Errors
/// Returns [Error::AmountOverflow] if the interest cannot be represented.
pub fn interest_between(
    principal: Decimal,
    interest_rate: Decimal,
    from: Date,
    to: Date,
) -> Result<Decimal, Error> {
    let days = (to - from).whole_days();

    if days <= 0 {
        return Ok(Decimal::ZERO);
    }

    let yearly = checked_mul(principal, interest_rate)? / Decimal::ONE_HUNDRED;
    let interest = checked_mul(yearly, Decimal::from(days))? / DAYS_PER_YEAR;

    Ok(round_money(interest))
}

/// The interest on the full original amount for the loan's term, as used when
/// a loan is marked as paid.
///
/// # Errors
/// Returns [Error::AmountOverflow] if the interest cannot be represented.
pub fn full_term_interest(amount: Decimal, interest_rate: Decimal) -> Result<Decimal, Error> {
    Ok(round_money(checked_mul(amount, interest_rate)? / Decimal::ONE_HUNDRED))
}

/// Accrue interest on `loan` up to `as_of`, in memory.
///
/// Returns the interest added. When nothing is added (the loan does not
/// accrue, no days have passed or the interest rounds to zero) the loan is
/// left untouched, including its calculation date, so fractions of a cent are
/// picked up by a later accrual instead of being lost.
///
/// # Errors
/// Returns [Error::AmountOverflow] if the interest cannot be represented, in
/// which case the loan is left untouched.
pub fn accrue(loan: &mut Loan, as_of: Date) -> Result<Decimal, Error> {
    if !loan.status.accrues_interest() {
        return Ok(Decimal::ZERO);
    }

    let interest = interest_between(
        loan.remaining_principal,
        loan.interest_rate,
        loan.last_interest_calculation_date,
        as_of,
    )?;

    if interest.is_zero() {
        return Ok(Decimal::ZERO);
    }

    loan.remaining_interest = checked_add(loan.remaining_interest, interest)?;
    loan.last_interest_calculation_date = as_of;

    Ok(interest)
}

/// How a payment is split between interest and principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentAllocation {
    /// The part of the payment that settles accrued interest.
    pub interest: Decimal,
    /// The rest of the payment, which reduces the principal.
    pub principal: Decimal,
}

/// Split `amount` so that accrued interest is paid off before principal.
pub fn allocate_payment(amount: Decimal, remaining_interest: Decimal) -> PaymentAllocation {
    let interest = amount.min(remaining_interest);

    PaymentAllocation {
        interest,
        principal: amount - interest,
    }
}

/// Apply a payment split to the balances of `loan`, in memory.
pub fn apply_payment(loan: &mut Loan, allocation: PaymentAllocation) {
    loan.remaining_interest -= allocation.interest;
    loan.interest_paid += allocation.interest;
    loan.remaining_principal -= allocation.principal;
    loan.principal_paid += allocation.principal;
}
