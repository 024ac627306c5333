//! API integration tests
//!
//! These run against a live server and database.
//! Run with: cargo test -- --ignored

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const ADMIN_ID: &str = "1";

fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Issue today's tickets and return whatever the server handed out
async fn bulk_issue(client: &Client, capacity: i64) -> Value {
    let response = client
        .post(format!("{}/tickets/bulk-issue", BASE_URL))
        .header("X-Actor-Id", ADMIN_ID)
        .json(&json!({
            "date": today(),
            "time_slot": "morning",
            "capacity": capacity
        }))
        .send()
        .await
        .expect("Failed to send bulk issue request");

    assert!(response.status().is_success());
    response.json().await.expect("Failed to parse bulk issue response")
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_ready() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
#[ignore]
async fn test_bulk_issue_requires_actor() {
    let client = Client::new();

    let response = client
        .post(format!("{}/tickets/bulk-issue", BASE_URL))
        .json(&json!({ "date": today(), "time_slot": "morning", "capacity": 1 }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_bulk_issue_rejects_bad_date() {
    let client = Client::new();

    let response = client
        .post(format!("{}/tickets/bulk-issue", BASE_URL))
        .header("X-Actor-Id", ADMIN_ID)
        .json(&json!({ "date": "19/10/2026", "time_slot": "morning", "capacity": 1 }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_validate_unknown_ticket() {
    let client = Client::new();

    let response = client
        .post(format!("{}/tickets/TKT-19700101-000000/validate", BASE_URL))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "not_found");
}

#[tokio::test]
#[ignore]
async fn test_issue_validate_and_redeem_once() {
    let client = Client::new();
    let issued = bulk_issue(&client, 1).await;

    // Needs at least one approved help request for today in the database
    let Some(ticket) = issued["tickets"].as_array().and_then(|t| t.first()).cloned() else {
        return;
    };
    let number = ticket["ticket_number"].as_str().expect("No ticket number");

    let response = client
        .post(format!("{}/tickets/{}/validate", BASE_URL, number))
        .json(&json!({ "staff_id": 42 }))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["valid"], true);

    let response = client
        .post(format!("{}/tickets/{}/use", BASE_URL, number))
        .json(&json!({ "staff_id": 42 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["queue_position"].as_i64().unwrap_or(0) >= 1);

    let response = client
        .post(format!("{}/tickets/{}/use", BASE_URL, number))
        .json(&json!({ "staff_id": 42 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["reason"], "already_used");
}

#[tokio::test]
#[ignore]
async fn test_cancel_unknown_ticket() {
    let client = Client::new();

    let response = client
        .post(format!("{}/tickets/999999999/cancel", BASE_URL))
        .header("X-Actor-Id", ADMIN_ID)
        .json(&json!({ "reason": "test", "notify_user": false }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_queue_for_today() {
    let client = Client::new();

    let response = client
        .get(format!("{}/queue", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.is_array());
}
