//! Application router configuration.

use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;

use crate::{
    AppState, Error,
    contribution::{
        create_contributions_endpoint, delete_contribution_endpoint, get_contributions_endpoint,
        update_contribution_endpoint,
    },
    dashboard::get_dashboard_endpoint,
    endpoints,
    fund::{
        create_fund_endpoint, delete_fund_endpoint, distribute_interest_endpoint,
        get_fund_endpoint, get_funds_endpoint, update_fund_endpoint,
    },
    loan::{
        create_loan_endpoint, delete_loan_endpoint, get_loan_endpoint, get_loans_endpoint,
        repay_loan_endpoint, update_loan_status_endpoint,
    },
    logging::logging_middleware,
    member::{
        create_member_endpoint, delete_member_endpoint, get_member_endpoint, get_members_endpoint,
        update_member_endpoint,
    },
    penalty::{
        create_penalty_endpoint, delete_penalty_endpoint, get_penalties_endpoint,
        update_penalty_endpoint, update_penalty_status_endpoint,
    },
    response::ApiResponse,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::DASHBOARD, get(get_dashboard_endpoint))
        .route(
            endpoints::MEMBERS,
            get(get_members_endpoint).post(create_member_endpoint),
        )
        .route(
            endpoints::MEMBER,
            get(get_member_endpoint)
                .put(update_member_endpoint)
                .delete(delete_member_endpoint),
        )
        .route(
            endpoints::FUNDS,
            get(get_funds_endpoint).post(create_fund_endpoint),
        )
        .route(
            endpoints::FUND,
            get(get_fund_endpoint)
                .put(update_fund_endpoint)
                .delete(delete_fund_endpoint),
        )
        .route(
            endpoints::DISTRIBUTE_INTEREST,
            post(distribute_interest_endpoint),
        )
        .route(
            endpoints::CONTRIBUTIONS,
            get(get_contributions_endpoint).post(create_contributions_endpoint),
        )
        .route(
            endpoints::CONTRIBUTION,
            put(update_contribution_endpoint).delete(delete_contribution_endpoint),
        )
        .route(
            endpoints::LOANS,
            get(get_loans_endpoint).post(create_loan_endpoint),
        )
        .route(
            endpoints::LOAN,
            get(get_loan_endpoint).delete(delete_loan_endpoint),
        )
        .route(endpoints::LOAN_STATUS, put(update_loan_status_endpoint))
        .route(endpoints::LOAN_PAYMENTS, post(repay_loan_endpoint))
        .route(
            endpoints::PENALTIES,
            get(get_penalties_endpoint).post(create_penalty_endpoint),
        )
        .route(
            endpoints::PENALTY,
            put(update_penalty_endpoint).delete(delete_penalty_endpoint),
        )
        .route(
            endpoints::PENALTY_STATUS,
            put(update_penalty_status_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// Report that the server is up.
async fn get_health() -> Response {
    ApiResponse::ok(json!({"status": "ok"}))
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        AppState, LedgerConfig,
        endpoints::{self, format_endpoint},
    };

    use super::build_router;

    fn get_test_server() -> TestServer {
        let connection = Connection::open_in_memory().expect("Could not open database in memory.");
        let state = AppState::new(connection, "Africa/Douala", LedgerConfig::default())
            .expect("Could not create app state.");

        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn health_check() {
        let server = get_test_server();

        let response = server.get(endpoints::HEALTH).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = get_test_server();

        let response = server.get("/api/nope").await;

        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["success"], false);
    }

    #[tokio::test]
    async fn loan_scenario_through_the_router() {
        let server = get_test_server();

        let response = server
            .post(endpoints::MEMBERS)
            .json(&json!({"name": "Amina"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let member_id = response.json::<Value>()["data"]["id"].as_i64().unwrap();

        let response = server
            .post(endpoints::FUNDS)
            .json(&json!({
                "name": "Investment",
                "fund_type": "investment",
                "total_amount": "1000",
                "interest_rate": "10"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let fund_id = response.json::<Value>()["data"]["id"].as_i64().unwrap();

        let response = server
            .post(endpoints::LOANS)
            .json(&json!({
                "member_id": member_id,
                "fund_id": fund_id,
                "amount": "200",
                "interest_rate": "10",
                "due_date": "2099-12-31",
                "status": "active"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let loan_id = response.json::<Value>()["data"]["id"].as_i64().unwrap();

        let response = server
            .post(&format_endpoint(endpoints::LOAN_PAYMENTS, loan_id))
            .json(&json!({"amount": "50"}))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>()["data"]["remaining_principal"],
            "150"
        );

        let fund = server
            .get(&format_endpoint(endpoints::FUND, fund_id))
            .await
            .json::<Value>();
        assert_eq!(fund["data"]["total_amount"], "850");

        let member = server
            .get(&format_endpoint(endpoints::MEMBER, member_id))
            .await
            .json::<Value>();
        assert_eq!(member["data"]["balance"], "150");

        server
            .delete(&format_endpoint(endpoints::LOAN, loan_id))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn oversized_deposits_are_rejected_and_the_server_keeps_serving() {
        let server = get_test_server();
        let response = server
            .post(endpoints::MEMBERS)
            .json(&json!({"name": "Amina"}))
            .await;
        let member_id = response.json::<Value>()["data"]["id"].as_i64().unwrap();

        for _ in 0..2 {
            let response = server
                .post(endpoints::TRANSACTIONS)
                .json(&json!({
                    "type": "deposit",
                    "amount": "79228162514264337593543950335",
                    "member_id": member_id
                }))
                .await;

            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<Value>()["success"], false);
        }

        let member = server
            .get(&format_endpoint(endpoints::MEMBER, member_id))
            .await;
        member.assert_status_ok();
        assert_eq!(member.json::<Value>()["data"]["balance"], "0");
        server.get(endpoints::HEALTH).await.assert_status_ok();
    }

    #[tokio::test]
    async fn wrong_method_is_rejected() {
        let server = get_test_server();

        server
            .put(endpoints::LOANS)
            .json(&json!({}))
            .await
            .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }
}
