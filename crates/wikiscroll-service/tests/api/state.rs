use crate::common::server_utils::{as_device, as_user, create_test_server};
use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn test_client_state_starts_empty() -> Result<()> {
    let app = create_test_server();

    let state: Value = as_device(app.server.get("/api/v1/state"), "device-1")
        .await
        .json();
    assert_eq!(state["owner"], "device-1");
    assert_eq!(state["viewed_post_ids"], json!([]));
    assert_eq!(state["onboarding_seen"], false);

    Ok(())
}

#[tokio::test]
async fn test_viewed_ids_set_is_last_write_wins_and_merge_is_union() -> Result<()> {
    let app = create_test_server();

    as_device(app.server.put("/api/v1/state/viewed"), "device-1")
        .json(&json!({ "post_ids": [3, 1, 2] }))
        .await
        .assert_status_ok();
    let state: Value = as_device(app.server.put("/api/v1/state/viewed"), "device-1")
        .json(&json!({ "post_ids": [3, 1] }))
        .await
        .json();
    assert_eq!(state["viewed_post_ids"], json!([1, 3]));

    let state: Value = as_device(app.server.post("/api/v1/state/viewed/merge"), "device-1")
        .json(&json!({ "post_ids": [2, 3] }))
        .await
        .json();
    assert_eq!(state["viewed_post_ids"], json!([1, 2, 3]));

    // Another device keeps its own list.
    let other: Value = as_device(app.server.get("/api/v1/state"), "device-2")
        .await
        .json();
    assert_eq!(other["viewed_post_ids"], json!([]));

    Ok(())
}

#[tokio::test]
async fn test_onboarding_flag_persists() -> Result<()> {
    let app = create_test_server();

    as_device(app.server.put("/api/v1/state/onboarding"), "device-1")
        .json(&json!({ "seen": true }))
        .await
        .assert_status_ok();

    let state: Value = as_device(app.server.get("/api/v1/state"), "device-1")
        .await
        .json();
    assert_eq!(state["onboarding_seen"], true);

    Ok(())
}

#[tokio::test]
async fn test_signed_in_user_owns_state_over_device() -> Result<()> {
    let app = create_test_server();

    let request = as_device(app.server.put("/api/v1/state/viewed"), "device-1");
    as_user(request, "reader-1")
        .json(&json!({ "post_ids": [7] }))
        .await
        .assert_status_ok();

    let state: Value = as_user(app.server.get("/api/v1/state"), "reader-1")
        .await
        .json();
    assert_eq!(state["owner"], "reader-1");
    assert_eq!(state["viewed_post_ids"], json!([7]));

    let device: Value = as_device(app.server.get("/api/v1/state"), "device-1")
        .await
        .json();
    assert_eq!(device["viewed_post_ids"], json!([]));

    Ok(())
}

#[tokio::test]
async fn test_state_requires_an_owner() -> Result<()> {
    let app = create_test_server();

    app.server
        .get("/api/v1/state")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .put("/api/v1/state/onboarding")
        .json(&json!({ "seen": true }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    Ok(())
}
