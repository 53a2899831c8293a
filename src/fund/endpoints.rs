//! The JSON endpoints for managing funds and distributing their interest.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::{
    database_id::FundId,
    fund::{
        FundUpdate, NewFund, create_fund, delete_fund, distribute_fund_interest, get_all_funds,
        get_fund, update_fund,
    },
    ledger::LedgerState,
    response::ApiResponse,
};

/// A route handler for listing all funds.
pub async fn get_funds_endpoint(State(state): State<LedgerState>) -> Response {
    match state.read(get_all_funds) {
        Ok(funds) => ApiResponse::ok(funds),
        Err(error) => error.into_response(),
    }
}

/// A route handler for opening a new fund.
pub async fn create_fund_endpoint(
    State(state): State<LedgerState>,
    Json(new_fund): Json<NewFund>,
) -> Response {
    match state.run(|connection, _| create_fund(&new_fund, connection)) {
        Ok(fund) => ApiResponse::created(fund),
        Err(error) => error.into_response(),
    }
}

/// A route handler for getting a single fund.
pub async fn get_fund_endpoint(
    State(state): State<LedgerState>,
    Path(fund_id): Path<FundId>,
) -> Response {
    match state.read(|connection| get_fund(fund_id, connection)) {
        Ok(fund) => ApiResponse::ok(fund),
        Err(error) => error.into_response(),
    }
}

/// A route handler for editing the name, description and rate of a fund.
pub async fn update_fund_endpoint(
    State(state): State<LedgerState>,
    Path(fund_id): Path<FundId>,
    Json(update): Json<FundUpdate>,
) -> Response {
    match state.run(|connection, _| update_fund(fund_id, &update, connection)) {
        Ok(fund) => ApiResponse::ok(fund),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a fund nobody has contributed to.
pub async fn delete_fund_endpoint(
    State(state): State<LedgerState>,
    Path(fund_id): Path<FundId>,
) -> Response {
    match state.run(|connection, _| delete_fund(fund_id, connection)) {
        Ok(fund) => ApiResponse::ok(fund),
        Err(error) => error.into_response(),
    }
}

/// A route handler for paying a fund's earned interest out to its contributors.
///
/// Responds with each member's share.
pub async fn distribute_interest_endpoint(
    State(state): State<LedgerState>,
    Path(fund_id): Path<FundId>,
) -> Response {
    match state.run(|connection, today| distribute_fund_interest(fund_id, today, connection)) {
        Ok(distribution) => ApiResponse::ok(distribution),
        Err(error) => error.into_response(),
    }
}
