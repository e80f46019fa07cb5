#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use diesel::{Connection, sqlite::SqliteConnection};
use std::time::Duration;
use wikiscroll_service::config::AppConfig;
use wikiscroll_service::db::run_migrations;

pub fn establish_test_connection() -> SqliteConnection {
    let mut connection =
        SqliteConnection::establish(":memory:").expect("Failed to create in-memory database");
    run_migrations(&mut connection).expect("Failed to run migrations");
    connection
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 20, 10, 0, 0).unwrap()
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

/// Feed knobs with both sampling gates always taken and no background ticks
/// during a test.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.feed.exclusion_probability = 1.0;
    config.feed.category_probability = 1.0;
    config.feed.prefetch_interval = Duration::from_secs(3600);
    config
}

pub mod server_utils {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};
    use axum_test::{TestRequest, TestServer};
    use std::sync::{Arc, Mutex};
    use wikiscroll_service::auth::{DEVICE_ID_HEADER, USER_ID_HEADER};
    use wikiscroll_service::clock::ManualClock;
    use wikiscroll_service::repositories::SharedConnection;
    use wikiscroll_service::{DefaultAppState, routes};

    pub struct TestApp {
        pub server: TestServer,
        pub db: SharedConnection,
        pub clock: ManualClock,
        pub state: DefaultAppState,
    }

    pub fn create_test_server() -> TestApp {
        create_test_server_with(test_config())
    }

    pub fn create_test_server_with(config: AppConfig) -> TestApp {
        let db = Arc::new(Mutex::new(establish_test_connection()));
        let clock = ManualClock::new(start_time());

        let state = DefaultAppState::builder(db.clone())
            .config(config)
            .clock(Arc::new(clock.clone()))
            .rng_seed(7)
            .build();
        let app = routes::create_router().with_state(state.clone());

        let server = TestServer::new(app).unwrap();
        TestApp {
            server,
            db,
            clock,
            state,
        }
    }

    pub fn as_user(request: TestRequest, user_id: &str) -> TestRequest {
        request.add_header(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_str(user_id).unwrap(),
        )
    }

    pub fn as_device(request: TestRequest, device_id: &str) -> TestRequest {
        request.add_header(
            HeaderName::from_static(DEVICE_ID_HEADER),
            HeaderValue::from_str(device_id).unwrap(),
        )
    }
}

pub mod test_utils {
    use super::*;
    use diesel::prelude::*;
    use wikiscroll_service::models::Post;
    use wikiscroll_service::schema::{ad_impressions, post_views, user_achievements, wiki_posts};

    /// Inserts a post with a fixed creation time, bypassing the API so no
    /// realtime event is published.
    pub fn insert_post(
        conn: &mut SqliteConnection,
        title: &str,
        category: Option<&str>,
        created_at: NaiveDateTime,
    ) -> Post {
        let slug = title.replace(' ', "_");
        diesel::insert_into(wiki_posts::table)
            .values((
                wiki_posts::title.eq(title),
                wiki_posts::summary.eq(format!("Summary of {title}")),
                wiki_posts::image_url.eq(format!("https://upload.example.org/{slug}.jpg")),
                wiki_posts::source_url.eq(format!("https://it.wikipedia.org/wiki/{slug}")),
                wiki_posts::category.eq(category),
                wiki_posts::created_at.eq(created_at),
            ))
            .returning(Post::as_returning())
            .get_result(conn)
            .expect("Failed to insert post")
    }

    /// `count` posts, the first one newest.
    pub fn seed_posts(
        conn: &mut SqliteConnection,
        count: usize,
        category: Option<&str>,
    ) -> Vec<Post> {
        let base = start_time().naive_utc();
        (0..count)
            .map(|i| {
                insert_post(
                    conn,
                    &format!("Article {i}"),
                    category,
                    base - chrono::Duration::minutes(i as i64 + 1),
                )
            })
            .collect()
    }

    pub fn insert_view(conn: &mut SqliteConnection, user_id: &str, post_id: i32, date: NaiveDate) {
        diesel::insert_into(post_views::table)
            .values((
                post_views::user_id.eq(user_id),
                post_views::post_id.eq(post_id),
                post_views::viewed_at.eq(date.and_hms_opt(8, 0, 0).unwrap()),
                post_views::view_date.eq(date),
                post_views::reading_time.eq(0),
            ))
            .execute(conn)
            .expect("Failed to insert view");
    }

    pub fn count_views(conn: &mut SqliteConnection, user_id: &str) -> i64 {
        post_views::table
            .filter(post_views::user_id.eq(user_id))
            .count()
            .get_result(conn)
            .expect("Failed to count views")
    }

    pub fn reading_time(conn: &mut SqliteConnection, user_id: &str, post_id: i32) -> i32 {
        post_views::table
            .filter(post_views::user_id.eq(user_id))
            .filter(post_views::post_id.eq(post_id))
            .select(post_views::reading_time)
            .first(conn)
            .expect("Failed to read reading time")
    }

    pub fn view_count(conn: &mut SqliteConnection, post_id: i32) -> i32 {
        wiki_posts::table
            .find(post_id)
            .select(wiki_posts::view_count)
            .first(conn)
            .expect("Failed to read view count")
    }

    pub fn unlocked_ids(conn: &mut SqliteConnection, user_id: &str) -> Vec<i32> {
        user_achievements::table
            .filter(user_achievements::user_id.eq(user_id))
            .order(user_achievements::achievement_id.asc())
            .select(user_achievements::achievement_id)
            .load(conn)
            .expect("Failed to load unlocks")
    }

    pub fn count_impressions(conn: &mut SqliteConnection, user_id: &str) -> i64 {
        ad_impressions::table
            .filter(ad_impressions::user_id.eq(user_id))
            .count()
            .get_result(conn)
            .expect("Failed to count impressions")
    }
}
