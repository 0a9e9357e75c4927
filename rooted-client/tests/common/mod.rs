//! Shared test helpers for client tests.

#![allow(dead_code)]

use rooted_client::path::{default_end_node, relationship_filter};
use rooted_client::{ApiClient, ClientConfig, Credential, RetryPolicy, SigningInput};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const TOKEN_ID: &str = "token-id";
pub const TOKEN_KEY: &str = "token-key";
pub const USER_ID: &str = "S-1-5-21-1004336348-1177238915-682003330-1104";
pub const GROUP_ID: &str = "S-1-5-21-1004336348-1177238915-682003330-1120";

/// Fast retries so that retry tests stay quick.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_factor_ms: 1,
        max_backoff_secs: 1,
        ..RetryPolicy::default()
    }
}

pub fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(server.uri(), Credential::new(TOKEN_ID, TOKEN_KEY)).with_retry(fast_retry(2))
}

pub fn test_client(server: &MockServer) -> ApiClient {
    ApiClient::new(test_config(server)).unwrap()
}

/// Accepts only requests whose `Signature` header verifies against
/// [`TOKEN_KEY`], the way the service checks it.
pub struct ValidSignature;

impl Match for ValidSignature {
    fn matches(&self, request: &Request) -> bool {
        let headers = &request.headers;
        let (Some(date), Some(signature)) = (
            headers.get("RequestDate").and_then(|v| v.to_str().ok()),
            headers.get("Signature").and_then(|v| v.to_str().ok()),
        ) else {
            return false;
        };

        let uri = match request.url.query() {
            Some(query) => format!("{}?{query}", request.url.path()),
            None => request.url.path().to_string(),
        };
        let body = (!request.body.is_empty()).then_some(request.body.as_slice());

        let expected = SigningInput {
            method: request.method.as_str(),
            path: &uri,
            request_date: date,
            body,
        }
        .signature(TOKEN_KEY.as_bytes());

        expected == signature
    }
}

/// `GET` mock for an API path, matched on path only.
pub fn get(api_path: &str) -> wiremock::MockBuilder {
    Mock::given(method("GET")).and(path(api_path))
}

/// Mock for the shortest-path query from `start` to its Domain Admins group.
pub fn shortest_path_to_da(start: &str) -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path("/api/v2/graphs/shortest-path"))
        .and(query_param("start_node", start))
        .and(query_param("end_node", default_end_node(start).as_str()))
        .and(query_param("relationship_kinds", relationship_filter().as_str()))
}

/// A two-node, one-edge path payload.
pub fn two_node_path() -> Value {
    json!({
        "data": {
            "nodes": {
                "n1": {"objectId": "A", "label": "ALICE@CORP.LOCAL", "kind": "User"},
                "n2": {"objectId": "B", "label": "DOMAIN ADMINS@CORP.LOCAL", "kind": "Group"}
            },
            "edges": [
                {"source": "n1", "target": "n2", "kind": "MemberOf"}
            ]
        }
    })
}

pub fn error_body(message: &str) -> Value {
    json!({"errors": [{"context": "graph", "message": message}]})
}

pub fn ok_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

pub async fn mount_path(server: &MockServer, start: &str, response: ResponseTemplate) {
    shortest_path_to_da(start).respond_with(response).mount(server).await;
}
