//! The JSON endpoints for the transaction log.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};

use crate::{
    database_id::TransactionId,
    ledger::LedgerState,
    response::ApiResponse,
    transaction::{
        NewTransaction, TransactionFilter, create_transaction, delete_transaction,
        get_transaction, query_transactions,
    },
};

/// A route handler for the activity feed, newest transactions first.
pub async fn get_transactions_endpoint(
    State(state): State<LedgerState>,
    Query(filter): Query<TransactionFilter>,
) -> Response {
    match state.read(|connection| query_transactions(&filter, connection)) {
        Ok(transactions) => ApiResponse::ok(transactions),
        Err(error) => error.into_response(),
    }
}

/// A route handler for recording a deposit, withdrawal or transfer.
///
/// Responds with every transaction created: one, or two for a transfer.
pub async fn create_transaction_endpoint(
    State(state): State<LedgerState>,
    Json(new_transaction): Json<NewTransaction>,
) -> Response {
    match state.run(|connection, today| create_transaction(&new_transaction, today, connection)) {
        Ok(transactions) => ApiResponse::created(transactions),
        Err(error) => error.into_response(),
    }
}

/// A route handler for getting a single transaction.
pub async fn get_transaction_endpoint(
    State(state): State<LedgerState>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    match state.read(|connection| get_transaction(transaction_id, connection)) {
        Ok(transaction) => ApiResponse::ok(transaction),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a transaction, responds with the deleted transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<LedgerState>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    match state.run(|connection, _| delete_transaction(transaction_id, connection)) {
        Ok(transaction) => ApiResponse::ok(transaction),
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

    use crate::{
        response::test_utils::{must_get_data, must_get_error},
        test_utils::{get_test_state, must_create_member},
        transaction::{NewTransaction, TransactionFilter, TransactionType},
    };

    use super::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint,
    };

    #[tokio::test]
    async fn transfer_over_http() {
        let state = get_test_state();
        let (sender, recipient) = {
            let connection = state.db_connection.lock().unwrap();
            (
                must_create_member("Amina", &connection),
                must_create_member("Bello", &connection),
            )
        };

        let response = create_transaction_endpoint(
            State(state.clone()),
            Json(NewTransaction {
                transaction_type: TransactionType::Transfer,
                amount: dec!(15),
                date: None,
                description: "Lunch".to_owned(),
                member_id: sender.id,
                recipient_id: Some(recipient.id),
                fund_id: None,
            }),
        )
        .await;
        let legs = must_get_data(response, StatusCode::CREATED).await;
        let legs = legs.as_array().unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0]["type"], "transfer");
        assert_eq!(legs[1]["type"], "deposit");

        let response = get_transactions_endpoint(
            State(state.clone()),
            Query(TransactionFilter {
                member_id: Some(recipient.id),
                ..Default::default()
            }),
        )
        .await;
        let feed = must_get_data(response, StatusCode::OK).await;
        assert_eq!(feed.as_array().map(Vec::len), Some(2));

        let sent_id = legs[0]["id"].as_i64().unwrap();
        let response = get_transaction_endpoint(State(state.clone()), Path(sent_id)).await;
        let sent = must_get_data(response, StatusCode::OK).await;
        assert_eq!(sent["related_transaction_id"], legs[1]["id"]);

        let response = delete_transaction_endpoint(State(state), Path(sent_id)).await;
        must_get_data(response, StatusCode::OK).await;
    }

    #[tokio::test]
    async fn unsupported_type_is_bad_request() {
        let state = get_test_state();
        let member = must_create_member("Amina", &state.db_connection.lock().unwrap());

        let response = create_transaction_endpoint(
            State(state),
            Json(NewTransaction {
                transaction_type: TransactionType::Loan,
                amount: dec!(15),
                date: None,
                description: String::new(),
                member_id: member.id,
                recipient_id: None,
                fund_id: None,
            }),
        )
        .await;

        let message = must_get_error(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(message, "loan transactions cannot be created directly");
    }
}
