//! Credit balance, history, packages and grant integration tests.

mod common;

use axum::http::StatusCode;
use common::{TestHarness, JPEG_BYTES};
use serde_json::json;

// ============================================================================
// Balance
// ============================================================================

#[tokio::test]
async fn get_balance_success() {
    let harness = TestHarness::new();
    harness.register().await;

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 3);
    assert_eq!(body["lifetime_used"], 0);
}

#[tokio::test]
async fn get_balance_without_account_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn get_balance_without_auth_fails() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/credits/balance").await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn new_account_has_trial_transaction() {
    let harness = TestHarness::new();
    harness.register().await;

    let response = harness
        .server
        .get("/v1/credits/transactions")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["kind"], "trial_grant");
    assert_eq!(transactions[0]["amount"], 3);
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn transactions_are_newest_first_and_paginated() {
    let harness = TestHarness::new();
    harness.register().await;

    harness.convert("anime", JPEG_BYTES).await.assert_status_ok();

    let response = harness
        .server
        .get("/v1/credits/transactions?limit=1")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["kind"], "conversion_charge");
    assert_eq!(transactions[0]["amount"], -1);
    assert_eq!(transactions[0]["balance_after"], 2);
    assert!(transactions[0]["conversion_id"].is_string());
    assert_eq!(body["has_more"], true);

    let body: serde_json::Value = harness
        .server
        .get("/v1/credits/transactions?limit=1&offset=1")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(body["transactions"][0]["kind"], "trial_grant");
    assert_eq!(body["has_more"], false);
}

// ============================================================================
// Packages
// ============================================================================

#[tokio::test]
async fn packages_are_public() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/credits/packages").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let packages = body["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 5);
    assert_eq!(packages[0]["id"], "starter");
    assert_eq!(packages[0]["credits"], 15);
}

// ============================================================================
// Admin grants
// ============================================================================

#[tokio::test]
async fn grant_package_adds_credits() {
    let harness = TestHarness::new();
    harness.register().await;

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-admin-key", harness.admin_api_key.clone())
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "package_id": "power-pack"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["granted"], 25);
    assert_eq!(body["balance"], 28);

    let tx: serde_json::Value = harness
        .server
        .get("/v1/credits/transactions?limit=1")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(tx["transactions"][0]["kind"], "purchase");
}

#[tokio::test]
async fn grant_bonus_credits_with_reason() {
    let harness = TestHarness::new();
    harness.register().await;

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-admin-key", harness.admin_api_key.clone())
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "credits": 5,
            "reason": "Support goodwill"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 8);

    let tx: serde_json::Value = harness
        .server
        .get("/v1/credits/transactions?limit=1")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(tx["transactions"][0]["kind"], "bonus");
    assert_eq!(tx["transactions"][0]["description"], "Support goodwill");
}

#[tokio::test]
async fn grant_requires_admin_key() {
    let harness = TestHarness::new();
    harness.register().await;

    let body = json!({
        "account_id": harness.test_account_id.to_string(),
        "credits": 5
    });

    harness
        .server
        .post("/v1/credits/grant")
        .json(&body)
        .await
        .assert_status_unauthorized();

    harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-admin-key", "wrong-key")
        .json(&body)
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn grant_rejects_bad_requests() {
    let harness = TestHarness::new();
    harness.register().await;
    let account_id = harness.test_account_id.to_string();

    let cases = [
        json!({ "account_id": account_id, "package_id": "mega", }),
        json!({ "account_id": account_id, "credits": 0 }),
        json!({ "account_id": account_id, "credits": 5, "package_id": "pro" }),
        json!({ "account_id": account_id }),
        json!({ "account_id": "not-a-uuid", "credits": 5 }),
    ];

    for case in cases {
        let response = harness
            .server
            .post("/v1/credits/grant")
            .add_header("x-admin-key", harness.admin_api_key.clone())
            .json(&case)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "{case}");
    }
}

#[tokio::test]
async fn grant_to_unknown_account_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/credits/grant")
        .add_header("x-admin-key", harness.admin_api_key.clone())
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "credits": 5
        }))
        .await;

    response.assert_status_not_found();
}
