//! The JSON endpoints for managing members.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::{
    database_id::MemberId,
    ledger::LedgerState,
    member::{NewMember, create_member, delete_member, get_all_members, get_member, update_member},
    response::ApiResponse,
};

/// A route handler for listing all members.
pub async fn get_members_endpoint(State(state): State<LedgerState>) -> Response {
    match state.read(get_all_members) {
        Ok(members) => ApiResponse::ok(members),
        Err(error) => error.into_response(),
    }
}

/// A route handler for registering a new member, responds with the member.
pub async fn create_member_endpoint(
    State(state): State<LedgerState>,
    Json(new_member): Json<NewMember>,
) -> Response {
    match state.run(|connection, today| create_member(&new_member, today, connection)) {
        Ok(member) => ApiResponse::created(member),
        Err(error) => error.into_response(),
    }
}

/// A route handler for getting a single member.
pub async fn get_member_endpoint(
    State(state): State<LedgerState>,
    Path(member_id): Path<MemberId>,
) -> Response {
    match state.read(|connection| get_member(member_id, connection)) {
        Ok(member) => ApiResponse::ok(member),
        Err(error) => error.into_response(),
    }
}

/// A route handler for editing a member's details, responds with the updated member.
pub async fn update_member_endpoint(
    State(state): State<LedgerState>,
    Path(member_id): Path<MemberId>,
    Json(update): Json<NewMember>,
) -> Response {
    match state.run(|connection, _| update_member(member_id, &update, connection)) {
        Ok(member) => ApiResponse::ok(member),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a member without transactions.
pub async fn delete_member_endpoint(
    State(state): State<LedgerState>,
    Path(member_id): Path<MemberId>,
) -> Response {
    match state.run(|connection, _| delete_member(member_id, connection)) {
        Ok(member) => ApiResponse::ok(member),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
    };

    use crate::{
        member::{MemberStatus, NewMember},
        response::test_utils::{must_get_data, must_get_error},
        test_utils::get_test_state,
    };

    use super::{
        create_member_endpoint, delete_member_endpoint, get_member_endpoint,
        get_members_endpoint, update_member_endpoint,
    };

    fn new_member(name: &str, email: Option<&str>) -> NewMember {
        NewMember {
            name: name.to_owned(),
            email: email.map(str::to_owned),
            phone: None,
            join_date: None,
            status: MemberStatus::Active,
        }
    }

    #[tokio::test]
    async fn member_crud() {
        let state = get_test_state();

        let response =
            create_member_endpoint(State(state.clone()), Json(new_member("Amina", None))).await;
        let created = must_get_data(response, StatusCode::CREATED).await;
        assert_eq!(created["name"], "Amina");
        assert_eq!(created["balance"], "0");
        let member_id = created["id"].as_i64().unwrap();

        let response = update_member_endpoint(
            State(state.clone()),
            Path(member_id),
            Json(new_member("Amina Fon", Some("amina@example.com"))),
        )
        .await;
        let updated = must_get_data(response, StatusCode::OK).await;
        assert_eq!(updated["email"], "amina@example.com");

        let response = get_members_endpoint(State(state.clone())).await;
        let members = must_get_data(response, StatusCode::OK).await;
        assert_eq!(members.as_array().map(Vec::len), Some(1));

        let response = delete_member_endpoint(State(state.clone()), Path(member_id)).await;
        must_get_data(response, StatusCode::OK).await;

        let response = get_member_endpoint(State(state), Path(member_id)).await;
        must_get_error(response, StatusCode::NOT_FOUND).await;
    }

    #[tokio::test]
    async fn duplicate_email_is_bad_request() {
        let state = get_test_state();
        let response = create_member_endpoint(
            State(state.clone()),
            Json(new_member("Amina", Some("a@example.com"))),
        )
        .await;
        must_get_data(response, StatusCode::CREATED).await;

        let response = create_member_endpoint(
            State(state),
            Json(new_member("Bello", Some("a@example.com"))),
        )
        .await;

        let message = must_get_error(response, StatusCode::BAD_REQUEST).await;
        assert!(message.contains("a@example.com"));
    }
}
