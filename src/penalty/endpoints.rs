//! The JSON endpoints for penalties.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    database_id::PenaltyId,
    ledger::LedgerState,
    penalty::{
        NewPenalty, PenaltyFilter, PenaltyStatus, PenaltyUpdate, create_penalty, delete_penalty,
        get_penalties, set_penalty_status, update_penalty,
    },
    response::ApiResponse,
};

/// The request body for paying a penalty or undoing its payment.
#[derive(Debug, Clone, Deserialize)]
pub struct PenaltyStatusUpdate {
    /// The status to move to.
    pub status: PenaltyStatus,
}

/// A route handler for listing penalties.
pub async fn get_penalties_endpoint(
    State(state): State<LedgerState>,
    Query(filter): Query<PenaltyFilter>,
) -> Response {
    match state.read(|connection| get_penalties(&filter, connection)) {
        Ok(penalties) => ApiResponse::ok(penalties),
        Err(error) => error.into_response(),
    }
}

/// A route handler for levying a penalty, responds with the new penalty.
pub async fn create_penalty_endpoint(
    State(state): State<LedgerState>,
    Json(new_penalty): Json<NewPenalty>,
) -> Response {
    match state.run(|connection, today| create_penalty(&new_penalty, today, connection)) {
        Ok(penalty) => ApiResponse::created(penalty),
        Err(error) => error.into_response(),
    }
}

/// A route handler for editing a pending penalty.
pub async fn update_penalty_endpoint(
    State(state): State<LedgerState>,
    Path(penalty_id): Path<PenaltyId>,
    Json(update): Json<PenaltyUpdate>,
) -> Response {
    match state.run(|connection, _| update_penalty(penalty_id, &update, connection)) {
        Ok(penalty) => ApiResponse::ok(penalty),
        Err(error) => error.into_response(),
    }
}

/// A route handler for paying a penalty or undoing its payment.
pub async fn update_penalty_status_endpoint(
    State(state): State<LedgerState>,
    Path(penalty_id): Path<PenaltyId>,
    Json(update): Json<PenaltyStatusUpdate>,
) -> Response {
    match state.run(|connection, _| set_penalty_status(penalty_id, update.status, connection)) {
        Ok(penalty) => ApiResponse::ok(penalty),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a penalty, responds with the deleted penalty.
pub async fn delete_penalty_endpoint(
    State(state): State<LedgerState>,
    Path(penalty_id): Path<PenaltyId>,
) -> Response {
    match state.run(|connection, _| delete_penalty(penalty_id, connection)) {
        Ok(penalty) => ApiResponse::ok(penalty),
        Err(error) => error.into_response(),
    }
}
