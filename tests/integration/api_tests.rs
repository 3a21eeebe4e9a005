//! API integration tests
//!
//! These expect a server running on localhost:8080.

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Unique suffix so repeated runs don't collide on usernames
fn unique(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("{}{}", prefix, nanos)
}

async fn create_item(client: &Client, copies: i32) -> i64 {
    let response = client
        .post(format!("{}/items", BASE_URL))
        .json(&json!({
            "title": "Test Book",
            "total_copies": copies
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No item id")
}

async fn create_member(client: &Client) -> i64 {
    let username = unique("member");
    let response = client
        .post(format!("{}/members", BASE_URL))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username)
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No member id")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
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
async fn test_create_item_validation() {
    let client = Client::new();

    let response = client
        .post(format!("{}/items", BASE_URL))
        .json(&json!({
            "title": "",
            "total_copies": 0
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_checkout_return_cycle() {
    let client = Client::new();
    let item_id = create_item(&client, 1).await;
    let member_id = create_member(&client).await;
    let other_id = create_member(&client).await;

    let response = client
        .post(format!("{}/items/{}/checkout", BASE_URL, item_id))
        .json(&json!({ "member_id": member_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    let loan_id = body["loan"]["id"].as_i64().expect("No loan id");

    // Last copy is out
    let response = client
        .post(format!("{}/items/{}/checkout", BASE_URL, item_id))
        .json(&json!({ "member_id": other_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let response = client
        .post(format!("{}/items/{}/return", BASE_URL, item_id))
        .json(&json!({ "member_id": member_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["loan"]["is_returned"], true);

    // No active loan left
    let response = client
        .post(format!("{}/items/{}/return", BASE_URL, item_id))
        .json(&json!({ "member_id": member_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 404);

    let response = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "returned");
}

#[tokio::test]
#[ignore]
async fn test_extend_loan() {
    let client = Client::new();
    let item_id = create_item(&client, 2).await;
    let member_id = create_member(&client).await;

    let response = client
        .post(format!("{}/items/{}/checkout", BASE_URL, item_id))
        .json(&json!({ "member_id": member_id }))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    let loan_id = body["loan"]["id"].as_i64().expect("No loan id");

    let response = client
        .post(format!("{}/loans/{}/extend", BASE_URL, loan_id))
        .json(&json!({ "additional_days": 0 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);

    let response = client
        .post(format!("{}/loans/{}/extend", BASE_URL, loan_id))
        .json(&json!({ "additional_days": 7 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
}

#[tokio::test]
#[ignore]
async fn test_overdue_scan() {
    let client = Client::new();

    let response = client
        .post(format!("{}/overdue/scan", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["examined"].is_number());

    let response = client
        .get(format!("{}/overdue/last-report", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_loan_stats() {
    let client = Client::new();

    let response = client
        .get(format!("{}/loans/stats", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["active"].is_number());
    assert!(body["overdue"].is_number());
}
