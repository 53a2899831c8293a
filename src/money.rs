//! Helpers for storing and validating amounts of money.
//!
//! Amounts are [Decimal]s stored as TEXT columns so that SQLite never rounds them.

use std::str::FromStr;

use rusqlite::{Row, types::Type};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::Error;

/// The number of decimal places amounts are rounded to.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// The largest amount a single ledger entry or opening balance may carry.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000);

/// The largest yearly interest rate, in percent, a fund or loan may carry.
pub const MAX_INTEREST_RATE: Decimal = dec!(1000);

/// Read a decimal stored as TEXT from column `index` of `row`.
pub fn get_decimal(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    Decimal::from_str(&text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}

/// Round `amount` to whole cents, with halves rounded away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Check that `amount` can be used as the amount of a ledger entry.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if `amount` is zero or negative,
/// - or [Error::AmountTooLarge] if `amount` is more than [MAX_AMOUNT].
pub fn validate_amount(amount: Decimal) -> Result<Decimal, Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }

    validate_opening_amount(amount)
}

/// Check that `amount` can be used as an opening total, which may be zero.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if `amount` is negative,
/// - or [Error::AmountTooLarge] if `amount` is more than [MAX_AMOUNT].
pub fn validate_opening_amount(amount: Decimal) -> Result<Decimal, Error> {
    if amount < Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }

    if amount > MAX_AMOUNT {
        return Err(Error::AmountTooLarge(amount));
    }

    Ok(amount)
}

/// Check that an interest rate, in percent, is between zero and [MAX_INTEREST_RATE].
///
/// # Errors
/// Returns [Error::InvalidInterestRate] if `rate` is out of range.
pub fn validate_interest_rate(rate: Decimal) -> Result<Decimal, Error> {
    if rate < Decimal::ZERO || rate > MAX_INTEREST_RATE {
        return Err(Error::InvalidInterestRate(rate));
    }

    Ok(rate)
}

/// Add two amounts.
///
/// # Errors
/// Returns [Error::AmountOverflow] if the sum cannot be represented.
pub fn checked_add(left: Decimal, right: Decimal) -> Result<Decimal, Error> {
    left.checked_add(right).ok_or(Error::AmountOverflow)
}

/// Multiply two amounts.
///
/// # Errors
/// Returns [Error::AmountOverflow] if the product cannot be represented.
pub fn checked_mul(left: Decimal, right: Decimal) -> Result<Decimal, Error> {
    left.checked_mul(right).ok_or(Error::AmountOverflow)
}

/// Sum `amounts`.
///
/// # Errors
/// Returns [Error::AmountOverflow] if the total cannot be represented.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, Error> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| checked_add(total, amount))
}

/// Trim `text` and check that something is left.
///
/// # Errors
/// Returns [Error::EmptyField] naming `field` if `text` is blank.
pub fn require_text(text: &str, field: &'static str) -> Result<String, Error> {
    let text = text.trim();

    if text.is_empty() {
        return Err(Error::EmptyField(field));
    }

    Ok(text.to_owned())
}
