//! The JSON endpoints for loans.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    database_id::LoanId,
    ledger::LedgerState,
    loan::{
        LoanFilter, LoanStatus, NewLoan, Repayment, create_loan, delete_loan,
        get_loan_with_interest, get_loans_with_interest, repay_loan, update_loan_status,
    },
    response::ApiResponse,
};

/// The request body for changing a loan's status.
#[derive(Debug, Clone, Deserialize)]
pub struct LoanStatusUpdate {
    /// The status to move to.
    pub status: LoanStatus,
}

/// A route handler for listing loans, with interest accrued up to today.
pub async fn get_loans_endpoint(
    State(state): State<LedgerState>,
    Query(filter): Query<LoanFilter>,
) -> Response {
    match state.run(|connection, today| get_loans_with_interest(&filter, today, connection)) {
        Ok(loans) => ApiResponse::ok(loans),
        Err(error) => error.into_response(),
    }
}

/// A route handler for issuing a loan, responds with the new loan.
pub async fn create_loan_endpoint(
    State(state): State<LedgerState>,
    Json(new_loan): Json<NewLoan>,
) -> Response {
    match state.run(|connection, today| create_loan(&new_loan, today, connection)) {
        Ok(loan) => ApiResponse::created(loan),
        Err(error) => {
            tracing::debug!("Could not create loan {new_loan:?}: {error}");
            error.into_response()
        }
    }
}

/// A route handler for getting a loan, with interest accrued up to today.
pub async fn get_loan_endpoint(
    State(state): State<LedgerState>,
    Path(loan_id): Path<LoanId>,
) -> Response {
    match state.run(|connection, today| get_loan_with_interest(loan_id, today, connection)) {
        Ok(loan) => ApiResponse::ok(loan),
        Err(error) => error.into_response(),
    }
}

/// A route handler for moving a loan to another status.
pub async fn update_loan_status_endpoint(
    State(state): State<LedgerState>,
    Path(loan_id): Path<LoanId>,
    Json(update): Json<LoanStatusUpdate>,
) -> Response {
    match state.run(|connection, today| {
        update_loan_status(loan_id, update.status, today, connection)
    }) {
        Ok(loan) => ApiResponse::ok(loan),
        Err(error) => error.into_response(),
    }
}

/// A route handler for paying towards a loan, responds with the updated loan.
pub async fn repay_loan_endpoint(
    State(state): State<LedgerState>,
    Path(loan_id): Path<LoanId>,
    Json(repayment): Json<Repayment>,
) -> Response {
    match state.run(|connection, today| repay_loan(loan_id, &repayment, today, connection)) {
        Ok(loan) => ApiResponse::ok(loan),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a pending loan, responds with the deleted loan.
pub async fn delete_loan_endpoint(
    State(state): State<LedgerState>,
    Path(loan_id): Path<LoanId>,
) -> Response {
    match state.run(|connection, _| delete_loan(loan_id, connection)) {
        Ok(loan) => ApiResponse::ok(loan),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
    };
    use rust_decimal_macros::dec;
    use serde_json::json;
    use time::macros::date;

    use crate::{
        fund::FundType,
        loan::{LoanFilter, LoanStatus, NewLoan, Repayment},
        response::test_utils::{must_get_data, must_get_error},
        test_utils::{get_test_state, must_create_fund, must_create_member},
    };

    use super::{
        LoanStatusUpdate, create_loan_endpoint, delete_loan_endpoint, get_loan_endpoint,
        get_loans_endpoint, repay_loan_endpoint, update_loan_status_endpoint,
    };

    fn new_loan(member_id: i64, fund_id: i64) -> NewLoan {
        NewLoan {
            member_id,
            fund_id,
            amount: dec!(200),
            interest_rate: dec!(10),
            start_date: None,
            due_date: date!(2099 - 12 - 31),
            status: LoanStatus::Pending,
            purpose: String::new(),
        }
    }

    #[tokio::test]
    async fn loan_lifecycle_over_http() {
        let state = get_test_state();
        let (member, fund) = {
            let connection = state.db_connection.lock().unwrap();
            (
                must_create_member("Amina", &connection),
                must_create_fund("Investment", FundType::Investment, dec!(1000), &connection),
            )
        };

        let response = create_loan_endpoint(
            State(state.clone()),
            Json(new_loan(member.id, fund.id)),
        )
        .await;
        let loan = must_get_data(response, StatusCode::CREATED).await;
        let loan_id = loan["id"].as_i64().unwrap();
        assert_eq!(loan["status"], "pending");
        assert_eq!(loan["remaining_principal"], json!("200"));

        for status in [LoanStatus::Approved, LoanStatus::Active] {
            let response = update_loan_status_endpoint(
                State(state.clone()),
                Path(loan_id),
                Json(LoanStatusUpdate { status }),
            )
            .await;
            must_get_data(response, StatusCode::OK).await;
        }

        let response = repay_loan_endpoint(
            State(state.clone()),
            Path(loan_id),
            Json(Repayment {
                amount: dec!(200),
                date: None,
                description: String::new(),
            }),
        )
        .await;
        let loan = must_get_data(response, StatusCode::OK).await;
        assert_eq!(loan["principal_paid"], json!("200"));

        let response = get_loan_endpoint(State(state.clone()), Path(loan_id)).await;
        let loan = must_get_data(response, StatusCode::OK).await;
        assert_eq!(loan["status"], "paid");

        let response = get_loans_endpoint(State(state), Query(LoanFilter::default())).await;
        let loans = must_get_data(response, StatusCode::OK).await;
        assert_eq!(loans.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn illegal_transition_is_conflict() {
        let state = get_test_state();
        let (member, fund) = {
            let connection = state.db_connection.lock().unwrap();
            (
                must_create_member("Amina", &connection),
                must_create_fund("Investment", FundType::Investment, dec!(1000), &connection),
            )
        };
        let response =
            create_loan_endpoint(State(state.clone()), Json(new_loan(member.id, fund.id))).await;
        let loan_id = must_get_data(response, StatusCode::CREATED).await["id"]
            .as_i64()
            .unwrap();

        let response = update_loan_status_endpoint(
            State(state),
            Path(loan_id),
            Json(LoanStatusUpdate {
                status: LoanStatus::Paid,
            }),
        )
        .await;

        let message = must_get_error(response, StatusCode::CONFLICT).await;
        assert_eq!(message, "a loan cannot go from pending to paid");
    }

    #[tokio::test]
    async fn missing_loan_is_not_found() {
        let state = get_test_state();

        let response = delete_loan_endpoint(State(state), Path(42)).await;

        let message = must_get_error(response, StatusCode::NOT_FOUND).await;
        assert_eq!(message, "could not find a loan with the ID 42");
    }

    #[tokio::test]
    async fn savings_fund_cannot_lend() {
        let state = get_test_state();
        let (member, fund) = {
            let connection = state.db_connection.lock().unwrap();
            (
                must_create_member("Amina", &connection),
                must_create_fund("Savings", FundType::Savings, dec!(1000), &connection),
            )
        };

        let response =
            create_loan_endpoint(State(state), Json(new_loan(member.id, fund.id))).await;

        must_get_error(response, StatusCode::BAD_REQUEST).await;
    }
}
