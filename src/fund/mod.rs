//! Funds: pools of money members contribute to and loans are issued from.

mod core;
mod distribution;
mod endpoints;

pub use core::{
    Fund, FundType, FundUpdate, NewFund, add_fund_interest_earned, adjust_fund_total,
    create_fund, create_fund_table, delete_fund, get_all_funds, get_fund, update_fund,
};
pub use distribution::{
    InterestDistribution, MemberInterestShare, distribute_fund_interest, pro_rata_shares,
};
pub use endpoints::{
    create_fund_endpoint, delete_fund_endpoint, distribute_interest_endpoint, get_fund_endpoint,
    get_funds_endpoint, update_fund_endpoint,
};
