//! Pro-rata distribution of a fund's earned interest to its contributors.

use std::collections::BTreeMap;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    contribution::{ContributionFilter, get_contributions},
    database_id::{FundId, MemberId},
    fund::core::{clear_fund_interest, get_fund},
    member::adjust_member_balance,
    money::{checked_add, checked_sum, round_money},
    transaction::{Transaction, TransactionType, create_transaction_record},
};

/// One member's part of an interest distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberInterestShare {
    /// The receiving member.
    pub member_id: MemberId,
    /// Everything the member has contributed to the fund.
    pub contributed: Decimal,
    /// The interest credited to the member.
    pub share: Decimal,
}

/// The result of distributing a fund's interest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestDistribution {
    /// The fund the interest came from.
    pub fund_id: FundId,
    /// The sum of all shares.
    pub total_distributed: Decimal,
    /// Each contributing member's share, ordered by member ID.
    pub shares: Vec<MemberInterestShare>,
}

/// Split `interest` between members in proportion to what they contributed.
///
/// Shares are rounded to cents, so they may not add up to `interest` exactly.
///
/// # Errors
/// Returns [Error::AmountOverflow] if the contributions cannot be totalled.
pub fn pro_rata_shares(
    interest: Decimal,
    contributed_by_member: &BTreeMap<MemberId, Decimal>,
) -> Result<Vec<MemberInterestShare>, Error> {
    let total_contributed = checked_sum(contributed_by_member.values().copied())?;

    if total_contributed <= Decimal::ZERO {
        return Ok(Vec::new());
    }

    // The ratio is at most one, so the share never exceeds `interest`.
    let shares = contributed_by_member
        .iter()
        .map(|(&member_id, &contributed)| MemberInterestShare {
            member_id,
            contributed,
            share: round_money(interest * (contributed / total_contributed)),
        })
        .collect();

    Ok(shares)
}

/// Credit each contributor of the fund `fund_id` with their share of its earned interest.
///
/// Each member with a non-zero share gets a deposit transaction. The fund's
/// earned interest is then zeroed and its distribution date set to `today`.
/// Nothing happens if the fund has no earned interest or no contributions.
///
/// # Errors
/// This function will return a:
/// - [Error::FundNotFound] if `fund_id` does not refer to a fund,
/// - [Error::AmountOverflow] if a member's balance would go out of range,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn distribute_fund_interest(
    fund_id: FundId,
    today: Date,
    connection: &Connection,
) -> Result<InterestDistribution, Error> {
    let mut fund = get_fund(fund_id, connection)?;
    let nothing_distributed = InterestDistribution {
        fund_id,
        total_distributed: Decimal::ZERO,
        shares: Vec::new(),
    };

    if fund.interest_earned <= Decimal::ZERO {
        return Ok(nothing_distributed);
    }

    let contributions = get_contributions(
        &ContributionFilter {
            fund_id: Some(fund_id),
            member_id: None,
        },
        connection,
    )?;

    if contributions.is_empty() {
        return Ok(nothing_distributed);
    }

    let mut contributed_by_member: BTreeMap<MemberId, Decimal> = BTreeMap::new();
    for contribution in &contributions {
        let contributed = contributed_by_member
            .entry(contribution.member_id)
            .or_default();
        *contributed = checked_add(*contributed, contribution.amount)?;
    }

    let shares = pro_rata_shares(fund.interest_earned, &contributed_by_member)?;
    let description = format!("Interest from {}", fund.name);

    for share in shares.iter().filter(|share| share.share > Decimal::ZERO) {
        adjust_member_balance(share.member_id, share.share, connection)?;
        create_transaction_record(
            Transaction::build(TransactionType::Deposit, share.share, today, share.member_id)
                .fund_id(Some(fund_id))
                .description(&description),
            connection,
        )?;
    }

    let total_distributed = checked_sum(shares.iter().map(|share| share.share))?;
    let interest_earned = fund.interest_earned;
    clear_fund_interest(&mut fund, today, connection)?;

    tracing::info!(
        "Distributed {total_distributed} of {interest_earned} interest from fund {fund_id} to {} member(s)",
        shares.len()
    );

    Ok(InterestDistribution {
        fund_id,
        total_distributed,
        shares,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        contribution::{ContributionBatch, ContributionItem, create_contributions},
        fund::{FundType, add_fund_interest_earned, get_fund},
        member::get_member,
        test_utils::{get_test_connection, must_create_fund, must_create_member},
        transaction::{TransactionFilter, TransactionType, query_transactions},
    };

    use super::{distribute_fund_interest, pro_rata_shares};

    fn contribute(member_id: i64, fund_id: i64, amount: Decimal, connection: &Connection) {
        create_contributions(
            &ContributionBatch {
                member_id,
                date: None,
                description: String::new(),
                contributions: vec![ContributionItem { fund_id, amount }],
            },
            date!(2025 - 06 - 01),
            connection,
        )
        .unwrap();
    }

    #[test]
    fn shares_are_proportional_and_rounded() {
        let contributed = BTreeMap::from([(1, dec!(100)), (2, dec!(200))]);

        let shares = pro_rata_shares(dec!(10), &contributed).unwrap();

        assert_eq!(shares[0].share, dec!(3.33));
        assert_eq!(shares[1].share, dec!(6.67));
    }

    #[test]
    fn distributes_interest_to_contributors() {
        let connection = get_test_connection();
        let amina = must_create_member("Amina", &connection);
        let bello = must_create_member("Bello", &connection);
        let fund = must_create_fund("Investment", FundType::Investment, dec!(0), &connection);
        contribute(amina.id, fund.id, dec!(300), &connection);
        contribute(bello.id, fund.id, dec!(100), &connection);
        contribute(amina.id, fund.id, dec!(100), &connection);
        add_fund_interest_earned(fund.id, dec!(50), &connection).unwrap();

        let distribution =
            distribute_fund_interest(fund.id, date!(2025 - 07 - 01), &connection).unwrap();

        assert_eq!(distribution.total_distributed, dec!(50));
        assert_eq!(distribution.shares.len(), 2);
        assert_eq!(distribution.shares[0].member_id, amina.id);
        assert_eq!(distribution.shares[0].contributed, dec!(400));
        assert_eq!(distribution.shares[0].share, dec!(40));
        assert_eq!(distribution.shares[1].share, dec!(10));

        assert_eq!(get_member(amina.id, &connection).unwrap().balance, dec!(-360));
        assert_eq!(get_member(bello.id, &connection).unwrap().balance, dec!(-90));

        let fund = get_fund(fund.id, &connection).unwrap();
        assert_eq!(fund.interest_earned, dec!(0));
        assert_eq!(fund.last_interest_distribution_date, Some(date!(2025 - 07 - 01)));

        let deposits = query_transactions(
            &TransactionFilter {
                transaction_type: Some(TransactionType::Deposit),
                fund_id: Some(fund.id),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();
        assert_eq!(deposits.len(), 2);
    }

    #[test]
    fn no_interest_is_a_no_op() {
        let connection = get_test_connection();
        let member = must_create_member("Amina", &connection);
        let fund = must_create_fund("Investment", FundType::Investment, dec!(0), &connection);
        contribute(member.id, fund.id, dec!(100), &connection);

        let distribution =
            distribute_fund_interest(fund.id, date!(2025 - 07 - 01), &connection).unwrap();

        assert!(distribution.shares.is_empty());
        let fund = get_fund(fund.id, &connection).unwrap();
        assert_eq!(fund.last_interest_distribution_date, None);
    }

    #[test]
    fn no_contributions_is_a_no_op() {
        let connection = get_test_connection();
        let fund = must_create_fund("Investment", FundType::Investment, dec!(0), &connection);
        add_fund_interest_earned(fund.id, dec!(50), &connection).unwrap();

        let distribution =
            distribute_fund_interest(fund.id, date!(2025 - 07 - 01), &connection).unwrap();

        assert_eq!(distribution.total_distributed, dec!(0));
        assert_eq!(get_fund(fund.id, &connection).unwrap().interest_earned, dec!(50));
    }
}
