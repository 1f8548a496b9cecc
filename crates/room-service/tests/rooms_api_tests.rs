//! End-to-end tests for the REST API.
//!
//! Each test boots a real server on an ephemeral port and talks to it over
//! HTTP with reqwest.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use reqwest::StatusCode;
use room_test_utils::TestRoomServer;
use serde_json::json;

#[tokio::test]
async fn test_register_returns_token_and_identity() -> Result<()> {
    let server = TestRoomServer::spawn().await?;

    let response = server
        .client()
        .post(format!("{}/api/register", server.url()))
        .json(&json!({ "username": "alice", "password": "s3cret" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["username"], "alice");
    assert!(body["userId"].is_string());
    assert!(!body["token"].as_str().unwrap_or_default().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_register_duplicate_username_is_conflict() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    server.register("alice").await?;

    let response = server
        .client()
        .post(format!("{}/api/register", server.url()))
        .json(&json!({ "username": "alice", "password": "other" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "CONFLICT");

    Ok(())
}

#[tokio::test]
async fn test_register_missing_field_is_bad_request() -> Result<()> {
    let server = TestRoomServer::spawn().await?;

    let response = server
        .client()
        .post(format!("{}/api/register", server.url()))
        .json(&json!({ "username": "alice" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_login_round_trip() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let alice = server.register("alice").await?;

    let response = server
        .client()
        .post(format!("{}/api/login", server.url()))
        .json(&json!({ "username": "alice", "password": "password" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["userId"], alice.identity.id.to_string());

    Ok(())
}

#[tokio::test]
async fn test_login_wrong_password_is_unauthorized() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    server.register("alice").await?;

    let response = server
        .client()
        .post(format!("{}/api/login", server.url()))
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("www-authenticate"));

    Ok(())
}

#[tokio::test]
async fn test_create_room_requires_auth() -> Result<()> {
    let server = TestRoomServer::spawn().await?;

    let response = server
        .client()
        .post(format!("{}/api/rooms", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = server
        .client()
        .post(format!("{}/api/rooms", server.url()))
        .bearer_auth("not-a-token")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_create_room_returns_eight_char_id_and_is_fetchable() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let alice = server.register("alice").await?;

    let room_id = server.create_room(&alice).await?;
    assert_eq!(room_id.as_str().len(), 8);

    let response = server
        .client()
        .get(format!("{}/api/rooms/{}", server.url(), room_id))
        .bearer_auth(&alice.token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["id"], room_id.as_str());
    assert_eq!(body["ownerId"], alice.identity.id.to_string());

    Ok(())
}

#[tokio::test]
async fn test_created_rooms_have_distinct_ids() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let alice = server.register("alice").await?;

    let first = server.create_room(&alice).await?;
    let second = server.create_room(&alice).await?;

    assert_ne!(first, second);

    Ok(())
}

#[tokio::test]
async fn test_get_missing_room_is_not_found() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let alice = server.register("alice").await?;

    let response = server
        .client()
        .get(format!("{}/api/rooms/deadbeef", server.url()))
        .bearer_auth(&alice.token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["message"], "Room not found");

    Ok(())
}

#[tokio::test]
async fn test_health_reports_room_count() -> Result<()> {
    let server = TestRoomServer::spawn().await?;
    let alice = server.register("alice").await?;
    server.create_room(&alice).await?;

    let body: serde_json::Value = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rooms"], 1);
    assert_eq!(body["participants"], 0);

    Ok(())
}
