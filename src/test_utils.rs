//! Fixtures shared by the unit tests.

#![allow(missing_docs)]

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use rust_decimal::Decimal;
use time::macros::date;

use crate::{
    database_id::MemberId,
    db::initialize,
    ledger::{LedgerConfig, LedgerState},
    fund::{Fund, FundType, NewFund, create_fund},
    member::{Member, MemberStatus, NewMember, adjust_member_balance, create_member, get_member},
};

pub(crate) fn get_test_connection() -> Connection {
    let connection =
        Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");
    initialize(&connection).expect("Could not initialize database");
    connection
}

/// Ledger endpoint state backed by an in-memory database.
pub(crate) fn get_test_state() -> LedgerState {
    LedgerState {
        db_connection: Arc::new(Mutex::new(get_test_connection())),
        local_timezone: "Africa/Douala".to_owned(),
        config: LedgerConfig::default(),
    }
}

#[track_caller]
pub(crate) fn must_create_member(name: &str, connection: &Connection) -> Member {
    create_member(
        &NewMember {
            name: name.to_owned(),
            email: None,
            phone: None,
            join_date: None,
            status: MemberStatus::Active,
        },
        date!(2025 - 01 - 01),
        connection,
    )
    .expect("Could not create test member")
}

/// Create a fund with a 10% interest rate.
#[track_caller]
pub(crate) fn must_create_fund(
    name: &str,
    fund_type: FundType,
    total_amount: Decimal,
    connection: &Connection,
) -> Fund {
    create_fund(
        &NewFund {
            name: name.to_owned(),
            fund_type,
            description: String::new(),
            total_amount,
            interest_rate: Decimal::TEN,
        },
        connection,
    )
    .expect("Could not create test fund")
}

/// Set a member's balance directly, bypassing the ledger.
#[track_caller]
pub(crate) fn set_member_balance(id: MemberId, balance: Decimal, connection: &Connection) {
    let member = get_member(id, connection).expect("Could not get test member");
    adjust_member_balance(id, balance - member.balance, connection)
        .expect("Could not set test member balance");
}
