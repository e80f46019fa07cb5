use crate::common::{
    day,
    server_utils::{as_user, create_test_server},
    start_time, test_utils,
};
use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn test_profile_defaults_to_empty() -> Result<()> {
    let app = create_test_server();

    let response = as_user(app.server.get("/api/v1/profile"), "reader-1").await;
    response.assert_status_ok();

    let profile: Value = response.json();
    assert_eq!(profile["user_id"], "reader-1");
    assert!(profile["full_name"].is_null());
    assert_eq!(profile["preferred_categories"], json!([]));

    app.server
        .get("/api/v1/profile")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_profile_update_normalizes_input() -> Result<()> {
    let app = create_test_server();

    let response = as_user(app.server.put("/api/v1/profile"), "reader-1")
        .json(&json!({
            "full_name": "  Ada Lovelace ",
            "birth_date": "1990-12-10",
            "preferred_categories": ["storia", "Geografia", "STORIA"],
        }))
        .await;
    response.assert_status_ok();

    let profile: Value = response.json();
    assert_eq!(profile["full_name"], "Ada Lovelace");
    assert_eq!(profile["birth_date"], "1990-12-10");
    assert_eq!(profile["preferred_categories"], json!(["Storia", "Geografia"]));

    // A second update replaces the first.
    as_user(app.server.put("/api/v1/profile"), "reader-1")
        .json(&json!({ "full_name": "   ", "preferred_categories": [] }))
        .await
        .assert_status_ok();

    let profile: Value = as_user(app.server.get("/api/v1/profile"), "reader-1")
        .await
        .json();
    assert!(profile["full_name"].is_null());
    assert!(profile["birth_date"].is_null());
    assert_eq!(profile["preferred_categories"], json!([]));

    Ok(())
}

#[tokio::test]
async fn test_profile_rejects_unknown_category() -> Result<()> {
    let app = create_test_server();

    let response = as_user(app.server.put("/api/v1/profile"), "reader-1")
        .json(&json!({ "preferred_categories": ["Sport"] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let profile: Value = as_user(app.server.get("/api/v1/profile"), "reader-1")
        .await
        .json();
    assert_eq!(profile["preferred_categories"], json!([]));

    Ok(())
}

#[tokio::test]
async fn test_stats_report_counts_and_achievements() -> Result<()> {
    let app = create_test_server();
    {
        let mut conn = app.db.lock().unwrap();
        let base = start_time().naive_utc();
        let storia = test_utils::insert_post(&mut conn, "Cesare", Some("Storia"), base);
        let natura =
            test_utils::insert_post(&mut conn, "Gran Paradiso", Some("Natura e Ambiente"), base);
        let vario = test_utils::insert_post(&mut conn, "Varie", None, base);

        test_utils::insert_view(&mut conn, "reader-1", storia.id, day(20));
        test_utils::insert_view(&mut conn, "reader-1", natura.id, day(19));
        test_utils::insert_view(&mut conn, "reader-1", storia.id, day(10));
        test_utils::insert_view(&mut conn, "reader-1", vario.id, day(1));
    }

    let response = as_user(app.server.get("/api/v1/profile/stats"), "reader-1").await;
    response.assert_status_ok();

    let stats: Value = response.json();
    assert_eq!(stats["total_views"], 4);
    assert_eq!(stats["views_today"], 1);
    assert_eq!(stats["views_last_7_days"], 2);
    assert_eq!(stats["views_last_30_days"], 4);
    assert_eq!(stats["current_streak"], 2);
    assert_eq!(stats["top_categories"][0]["category"], "Storia");
    assert_eq!(stats["top_categories"][0]["views"], 2);
    assert_eq!(stats["like_count"], 0);

    let achievements = stats["achievements"].as_array().unwrap();
    assert_eq!(achievements.len(), 10);
    // Nothing was unlocked through the tracker yet, progress is still reported.
    let first_reading = achievements.iter().find(|a| a["id"] == 1).unwrap();
    assert_eq!(first_reading["progress"], 4);
    assert!(first_reading["unlocked_at"].is_null());

    Ok(())
}

#[tokio::test]
async fn test_achievement_catalogue_lists_unlocked_first() -> Result<()> {
    let app = create_test_server();
    {
        let mut conn = app.db.lock().unwrap();
        test_utils::seed_posts(&mut conn, 6, Some("Biografie"));
    }

    let session: Value = as_user(app.server.post("/api/v1/feed/sessions"), "reader-1")
        .await
        .json();
    let id = session["id"].as_str().unwrap().to_string();
    as_user(
        app.server
            .post(&format!("/api/v1/feed/sessions/{id}/items/0/visible")),
        "reader-1",
    )
    .await
    .assert_status_ok();
    app.clock.advance(chrono::Duration::seconds(1));
    as_user(
        app.server
            .post(&format!("/api/v1/feed/sessions/{id}/items/0/viewed")),
        "reader-1",
    )
    .await
    .assert_status_ok();

    let catalogue: Value = as_user(app.server.get("/api/v1/profile/achievements"), "reader-1")
        .await
        .json();
    let entries = catalogue.as_array().unwrap();
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[0]["id"], 1);
    assert_eq!(entries[0]["name"], "Prima Lettura");
    assert!(!entries[0]["unlocked_at"].is_null());
    assert!(entries[1..].iter().all(|e| e["unlocked_at"].is_null()));

    Ok(())
}
