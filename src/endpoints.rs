//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/members/{member_id}', use [format_endpoint].

/// The route for checking that the server is up.
pub const HEALTH: &str = "/api/health";
/// The route for the dashboard summary.
pub const DASHBOARD: &str = "/api/dashboard";
/// The route to list and create members.
pub const MEMBERS: &str = "/api/members";
/// The route to access a single member.
pub const MEMBER: &str = "/api/members/{member_id}";
/// The route to list and create funds.
pub const FUNDS: &str = "/api/funds";
/// The route to access a single fund.
pub const FUND: &str = "/api/funds/{fund_id}";
/// The route to distribute a fund's earned interest to its contributors.
pub const DISTRIBUTE_INTEREST: &str = "/api/funds/{fund_id}/distribute_interest";
/// The route to list contributions and create a batch of them.
pub const CONTRIBUTIONS: &str = "/api/contributions";
/// The route to edit or delete a single contribution.
pub const CONTRIBUTION: &str = "/api/contributions/{contribution_id}";
/// The route to list and create loans.
pub const LOANS: &str = "/api/loans";
/// The route to access a single loan.
pub const LOAN: &str = "/api/loans/{loan_id}";
/// The route to change the status of a loan.
pub const LOAN_STATUS: &str = "/api/loans/{loan_id}/status";
/// The route to repay a loan.
pub const LOAN_PAYMENTS: &str = "/api/loans/{loan_id}/payments";
/// The route to list and create penalties.
pub const PENALTIES: &str = "/api/penalties";
/// The route to edit or delete a single penalty.
pub const PENALTY: &str = "/api/penalties/{penalty_id}";
/// The route to pay or unpay a penalty.
pub const PENALTY_STATUS: &str = "/api/penalties/{penalty_id}/status";
/// The route for the activity feed and creating transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/members/{member_id}', '{member_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let param_start = match endpoint_path.find('{') {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::HEALTH);
        assert_endpoint_is_valid_uri(endpoints::DASHBOARD);
        assert_endpoint_is_valid_uri(endpoints::MEMBERS);
        assert_endpoint_is_valid_uri(endpoints::MEMBER);
        assert_endpoint_is_valid_uri(endpoints::FUNDS);
        assert_endpoint_is_valid_uri(endpoints::FUND);
        assert_endpoint_is_valid_uri(endpoints::DISTRIBUTE_INTEREST);
        assert_endpoint_is_valid_uri(endpoints::CONTRIBUTIONS);
        assert_endpoint_is_valid_uri(endpoints::CONTRIBUTION);
        assert_endpoint_is_valid_uri(endpoints::LOANS);
        assert_endpoint_is_valid_uri(endpoints::LOAN);
        assert_endpoint_is_valid_uri(endpoints::LOAN_STATUS);
        assert_endpoint_is_valid_uri(endpoints::LOAN_PAYMENTS);
        assert_endpoint_is_valid_uri(endpoints::PENALTIES);
        assert_endpoint_is_valid_uri(endpoints::PENALTY);
        assert_endpoint_is_valid_uri(endpoints::PENALTY_STATUS);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTION);
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint(endpoints::LOAN_PAYMENTS, 1);

        assert_eq!(formatted_path, "/api/loans/1/payments");
        assert!(formatted_path.parse::<Uri>().is_ok());

        // Parameter with single word should also work.
        let formatted_path = format_endpoint("/hello/{world}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint(endpoints::MEMBERS, 1);

        assert_eq!(formatted_path, "/api/members");
    }
}
