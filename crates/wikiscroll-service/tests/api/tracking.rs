use crate::common::{
    day,
    server_utils::{TestApp, as_user, create_test_server},
    test_utils,
};
use anyhow::Result;
use axum::http::StatusCode;
use chrono::Duration;
use serde_json::{Value, json};
use wikiscroll_service::models::Post;

const READER: &str = "reader-1";

async fn open_session(app: &TestApp, user: Option<&str>) -> String {
    let request = app.server.post("/api/v1/feed/sessions");
    let request = match user {
        Some(user) => as_user(request, user),
        None => request,
    };
    let session: Value = request.await.json();
    session["id"].as_str().unwrap().to_string()
}

async fn item_call(
    app: &TestApp,
    user: Option<&str>,
    session: &str,
    position: usize,
    action: &str,
) -> Value {
    let request = app
        .server
        .post(&format!("/api/v1/feed/sessions/{session}/items/{position}/{action}"));
    let request = match user {
        Some(user) => as_user(request, user),
        None => request,
    };
    let response = request.await;
    response.assert_status_ok();
    response.json()
}

fn seed(app: &TestApp, count: usize) -> Vec<Post> {
    let mut conn = app.db.lock().unwrap();
    test_utils::seed_posts(&mut conn, count, Some("Storia"))
}

#[tokio::test]
async fn test_view_is_recorded_once_per_mount() -> Result<()> {
    let app = create_test_server();
    let posts = seed(&app, 12);
    let session = open_session(&app, Some(READER)).await;

    let visible = item_call(&app, Some(READER), &session, 0, "visible").await;
    assert_eq!(visible["item"]["id"], posts[0].id);
    // Five posts left at most, so the queue was topped up.
    assert_eq!(visible["load"]["status"], "appended");
    assert_eq!(visible["load"]["count"], 5);

    app.clock.advance(Duration::seconds(1));
    let outcome = item_call(&app, Some(READER), &session, 0, "viewed").await;
    assert_eq!(outcome["status"], "recorded");
    let notifications = outcome["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["achievement_id"], 1);

    let again = item_call(&app, Some(READER), &session, 0, "viewed").await;
    assert_eq!(again["status"], "already_recorded");
    assert!(again.get("notifications").is_none());

    let mut conn = app.db.lock().unwrap();
    assert_eq!(test_utils::count_views(&mut conn, READER), 1);
    assert_eq!(test_utils::view_count(&mut conn, posts[0].id), 1);
    assert_eq!(test_utils::unlocked_ids(&mut conn, READER), vec![1]);

    Ok(())
}

#[tokio::test]
async fn test_view_before_dwell_is_too_early() -> Result<()> {
    let app = create_test_server();
    seed(&app, 6);
    let session = open_session(&app, Some(READER)).await;

    item_call(&app, Some(READER), &session, 0, "visible").await;
    app.clock.advance(Duration::milliseconds(400));

    let outcome = item_call(&app, Some(READER), &session, 0, "viewed").await;
    assert_eq!(outcome["status"], "too_early");
    assert_eq!(outcome["retry_after_ms"], 600);

    let mut conn = app.db.lock().unwrap();
    assert_eq!(test_utils::count_views(&mut conn, READER), 0);

    Ok(())
}

#[tokio::test]
async fn test_view_without_mount_is_not_recorded() -> Result<()> {
    let app = create_test_server();
    seed(&app, 6);
    let session = open_session(&app, Some(READER)).await;

    let outcome = item_call(&app, Some(READER), &session, 2, "viewed").await;
    assert_eq!(outcome["status"], "not_mounted");

    // Out of range positions do not exist.
    as_user(
        app.server
            .post(&format!("/api/v1/feed/sessions/{session}/items/99/visible")),
        READER,
    )
    .await
    .assert_status(StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_remount_after_hide_records_nothing_new_for_the_day() -> Result<()> {
    let app = create_test_server();
    let posts = seed(&app, 6);
    let session = open_session(&app, Some(READER)).await;

    item_call(&app, Some(READER), &session, 0, "visible").await;
    app.clock.advance(Duration::seconds(2));
    assert_eq!(item_call(&app, Some(READER), &session, 0, "viewed").await["status"], "recorded");
    item_call(&app, Some(READER), &session, 0, "hidden").await;

    item_call(&app, Some(READER), &session, 0, "visible").await;
    app.clock.advance(Duration::seconds(2));
    assert_eq!(item_call(&app, Some(READER), &session, 0, "viewed").await["status"], "recorded");

    let mut conn = app.db.lock().unwrap();
    assert_eq!(test_utils::count_views(&mut conn, READER), 1);
    // The session already counted this post.
    assert_eq!(test_utils::view_count(&mut conn, posts[0].id), 1);

    Ok(())
}

#[tokio::test]
async fn test_anonymous_view_updates_counter_only() -> Result<()> {
    let app = create_test_server();
    let posts = seed(&app, 6);
    let session = open_session(&app, None).await;

    item_call(&app, None, &session, 1, "visible").await;
    app.clock.advance(Duration::seconds(1));
    let outcome = item_call(&app, None, &session, 1, "viewed").await;
    assert_eq!(outcome["status"], "recorded");

    let mut conn = app.db.lock().unwrap();
    assert_eq!(test_utils::view_count(&mut conn, posts[1].id), 1);

    Ok(())
}

#[tokio::test]
async fn test_hiding_credits_reading_time() -> Result<()> {
    let app = create_test_server();
    let posts = seed(&app, 6);
    let session = open_session(&app, Some(READER)).await;

    item_call(&app, Some(READER), &session, 0, "visible").await;
    app.clock.advance(Duration::seconds(1));
    item_call(&app, Some(READER), &session, 0, "viewed").await;
    app.clock.advance(Duration::seconds(150));

    let hidden = item_call(&app, Some(READER), &session, 0, "hidden").await;
    assert_eq!(hidden["was_mounted"], true);
    assert_eq!(hidden["reading_time"], 2);

    let hidden = item_call(&app, Some(READER), &session, 3, "hidden").await;
    assert_eq!(hidden["was_mounted"], false);
    assert!(hidden["reading_time"].is_null());

    let mut conn = app.db.lock().unwrap();
    assert_eq!(test_utils::reading_time(&mut conn, READER, posts[0].id), 2);

    Ok(())
}

#[tokio::test]
async fn test_ad_impression_waits_for_skip_delay() -> Result<()> {
    let app = create_test_server();
    seed(&app, 20);
    let session = open_session(&app, Some(READER)).await;
    // Load a second batch so position 6 holds the first ad.
    item_call(&app, Some(READER), &session, 0, "visible").await;

    let visible = item_call(&app, Some(READER), &session, 6, "visible").await;
    assert_eq!(visible["item"]["type"], "ad");
    assert_eq!(visible["item"]["id"], "ad-1");

    let impression = format!("/api/v1/feed/sessions/{session}/items/6/impression");
    let early: Value = as_user(app.server.post(&impression), READER)
        .json(&json!({ "outcome": "full_view" }))
        .await
        .json();
    assert_eq!(early["status"], "too_early");
    assert_eq!(early["retry_after_ms"], 5000);

    app.clock.advance(Duration::seconds(5));
    let recorded: Value = as_user(app.server.post(&impression), READER)
        .json(&json!({ "outcome": "full_view" }))
        .await
        .json();
    assert_eq!(recorded["status"], "recorded");

    let again: Value = as_user(app.server.post(&impression), READER)
        .json(&json!({ "outcome": "click" }))
        .await
        .json();
    assert_eq!(again["status"], "already_recorded");

    let mut conn = app.db.lock().unwrap();
    assert_eq!(test_utils::count_impressions(&mut conn, READER), 1);

    Ok(())
}

#[tokio::test]
async fn test_ad_click_needs_only_the_minimum_view() -> Result<()> {
    let app = create_test_server();
    seed(&app, 20);
    let session = open_session(&app, Some(READER)).await;
    item_call(&app, Some(READER), &session, 0, "visible").await;
    item_call(&app, Some(READER), &session, 6, "visible").await;

    app.clock.advance(Duration::seconds(1));
    let clicked: Value = as_user(
        app.server
            .post(&format!("/api/v1/feed/sessions/{session}/items/6/impression")),
        READER,
    )
    .json(&json!({ "outcome": "click" }))
    .await
    .json();
    assert_eq!(clicked["status"], "recorded");

    Ok(())
}

#[tokio::test]
async fn test_anonymous_ad_impressions_are_not_stored() -> Result<()> {
    let app = create_test_server();
    seed(&app, 20);
    let session = open_session(&app, None).await;
    item_call(&app, None, &session, 0, "visible").await;
    item_call(&app, None, &session, 6, "visible").await;
    app.clock.advance(Duration::seconds(10));

    let outcome: Value = app
        .server
        .post(&format!("/api/v1/feed/sessions/{session}/items/6/impression"))
        .json(&json!({ "outcome": "skip" }))
        .await
        .json();
    assert_eq!(outcome["status"], "anonymous");

    Ok(())
}

#[tokio::test]
async fn test_item_kind_mismatch_is_a_bad_request() -> Result<()> {
    let app = create_test_server();
    seed(&app, 20);
    let session = open_session(&app, Some(READER)).await;
    item_call(&app, Some(READER), &session, 0, "visible").await;

    as_user(
        app.server
            .post(&format!("/api/v1/feed/sessions/{session}/items/6/viewed")),
        READER,
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);

    as_user(
        app.server
            .post(&format!("/api/v1/feed/sessions/{session}/items/0/impression")),
        READER,
    )
    .json(&json!({ "outcome": "full_view" }))
    .await
    .assert_status(StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_tenth_view_unlocks_reading_achievement_once() -> Result<()> {
    let app = create_test_server();
    let posts = seed(&app, 12);
    let session = open_session(&app, Some(READER)).await;

    item_call(&app, Some(READER), &session, 0, "visible").await;
    app.clock.advance(Duration::seconds(1));
    item_call(&app, Some(READER), &session, 0, "viewed").await;

    {
        let mut conn = app.db.lock().unwrap();
        for post in &posts[4..12] {
            test_utils::insert_view(&mut conn, READER, post.id, day(20));
        }
        assert_eq!(test_utils::count_views(&mut conn, READER), 9);
        assert_eq!(test_utils::unlocked_ids(&mut conn, READER), vec![1]);
    }

    item_call(&app, Some(READER), &session, 1, "visible").await;
    app.clock.advance(Duration::seconds(1));
    let outcome = item_call(&app, Some(READER), &session, 1, "viewed").await;
    assert_eq!(outcome["status"], "recorded");
    let notifications = outcome["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["achievement_id"], 2);
    assert_eq!(notifications[0]["title"], "Achievement unlocked!");

    item_call(&app, Some(READER), &session, 2, "visible").await;
    app.clock.advance(Duration::seconds(1));
    let outcome = item_call(&app, Some(READER), &session, 2, "viewed").await;
    assert!(outcome.get("notifications").is_none());

    let mut conn = app.db.lock().unwrap();
    assert_eq!(test_utils::unlocked_ids(&mut conn, READER), vec![1, 2]);

    Ok(())
}

#[tokio::test]
async fn test_three_day_streak_unlocks() -> Result<()> {
    let app = create_test_server();
    let posts = seed(&app, 8);
    {
        let mut conn = app.db.lock().unwrap();
        test_utils::insert_view(&mut conn, READER, posts[7].id, day(18));
        test_utils::insert_view(&mut conn, READER, posts[6].id, day(19));
    }
    let session = open_session(&app, Some(READER)).await;

    item_call(&app, Some(READER), &session, 0, "visible").await;
    app.clock.advance(Duration::seconds(1));
    let outcome = item_call(&app, Some(READER), &session, 0, "viewed").await;

    let unlocked: Vec<i64> = outcome["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["achievement_id"].as_i64().unwrap())
        .collect();
    assert!(unlocked.contains(&5), "unlocked {unlocked:?}");

    let stats: Value = as_user(app.server.get("/api/v1/profile/stats"), READER)
        .await
        .json();
    assert_eq!(stats["current_streak"], 3);
    assert_eq!(stats["total_views"], 3);

    Ok(())
}
