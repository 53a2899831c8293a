//! The JSON endpoints for contributions.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};

use crate::{
    contribution::{
        ContributionBatch, ContributionFilter, ContributionUpdate, create_contributions,
        delete_contribution, get_contributions, update_contribution,
    },
    database_id::ContributionId,
    ledger::LedgerState,
    response::ApiResponse,
};

/// A route handler for listing contributions, optionally by member or fund.
pub async fn get_contributions_endpoint(
    State(state): State<LedgerState>,
    Query(filter): Query<ContributionFilter>,
) -> Response {
    match state.read(|connection| get_contributions(&filter, connection)) {
        Ok(contributions) => ApiResponse::ok(contributions),
        Err(error) => error.into_response(),
    }
}

/// A route handler for recording a batch of contributions by one member.
///
/// Responds with the created contributions in the order they were given.
pub async fn create_contributions_endpoint(
    State(state): State<LedgerState>,
    Json(batch): Json<ContributionBatch>,
) -> Response {
    match state.run(|connection, today| create_contributions(&batch, today, connection)) {
        Ok(contributions) => ApiResponse::created(contributions),
        Err(error) => error.into_response(),
    }
}

/// A route handler for editing a contribution.
pub async fn update_contribution_endpoint(
    State(state): State<LedgerState>,
    Path(contribution_id): Path<ContributionId>,
    Json(update): Json<ContributionUpdate>,
) -> Response {
    match state.run(|connection, _| update_contribution(contribution_id, &update, connection)) {
        Ok(contribution) => ApiResponse::ok(contribution),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a contribution, responds with the deleted contribution.
pub async fn delete_contribution_endpoint(
    State(state): State<LedgerState>,
    Path(contribution_id): Path<ContributionId>,
) -> Response {
    match state.run(|connection, _| delete_contribution(contribution_id, connection)) {
        Ok(contribution) => ApiResponse::ok(contribution),
        Err(error) => error.into_response(),
    }
}
