use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use serde::Serialize;

use crate::AppState;
use crate::feed::{AdPlacement, AdSlot, AdSupply};

mod feed;
mod library;
mod posts;
mod profile;
mod state;

#[derive(Debug, Serialize)]
struct ClientConfig {
    ads_enabled: bool,
    feed_ad_frequency: usize,
    library_ad_frequency: usize,
    ad_skip_delay_seconds: u64,
    min_view_duration_ms: u64,
    post_dwell_ms: u64,
    feed_batch_size: usize,
    third_party_ads: bool,
    generation_available: bool,
    feed_ads: Vec<AdSlot>,
}

/// Knobs the client needs to render and time the feed.
async fn client_config<S: AppState>(State(state): State<S>) -> ResponseJson<ClientConfig> {
    let config = state.config();
    ResponseJson(ClientConfig {
        ads_enabled: config.ads.enabled,
        feed_ad_frequency: config.ads.feed_frequency,
        library_ad_frequency: config.ads.library_frequency,
        ad_skip_delay_seconds: config.ads.skip_delay.as_secs(),
        min_view_duration_ms: config.ads.min_view_duration.as_millis() as u64,
        post_dwell_ms: config.feed.post_dwell.as_millis() as u64,
        feed_batch_size: config.feed.batch_size,
        third_party_ads: config.ads.third_party_enabled,
        generation_available: state.generator().is_some(),
        feed_ads: state.ads().inventory(AdPlacement::Feed).to_vec(),
    })
}

pub fn create_api_v1_router<S: AppState>() -> Router<S> {
    Router::new()
        .route("/config", get(client_config::<S>))
        .route("/posts", post(posts::create_post::<S>))
        .route("/posts/generate", post(posts::generate_post::<S>))
        .route("/posts/{id}", get(posts::get_post::<S>))
        .route("/posts/{id}/engagement", get(posts::engagement::<S>))
        .route(
            "/posts/{id}/like",
            put(posts::like::<S>).delete(posts::unlike::<S>),
        )
        .route("/posts/{id}/like/toggle", post(posts::toggle_like::<S>))
        .route(
            "/posts/{id}/save",
            put(posts::save::<S>).delete(posts::unsave::<S>),
        )
        .route("/posts/{id}/save/toggle", post(posts::toggle_save::<S>))
        .route("/posts/{id}/share", get(posts::share::<S>))
        .route("/feed/sessions", post(feed::open_session::<S>))
        .route(
            "/feed/sessions/{id}",
            get(feed::get_session::<S>).delete(feed::close_session::<S>),
        )
        .route("/feed/sessions/{id}/more", post(feed::load_more::<S>))
        .route(
            "/feed/sessions/{id}/items/{position}/visible",
            post(feed::item_visible::<S>),
        )
        .route(
            "/feed/sessions/{id}/items/{position}/viewed",
            post(feed::item_viewed::<S>),
        )
        .route(
            "/feed/sessions/{id}/items/{position}/impression",
            post(feed::item_impression::<S>),
        )
        .route(
            "/feed/sessions/{id}/items/{position}/hidden",
            post(feed::item_hidden::<S>),
        )
        .route("/library", get(library::list_library::<S>))
        .route(
            "/profile",
            get(profile::get_profile::<S>).put(profile::update_profile::<S>),
        )
        .route("/profile/likes", get(profile::liked_posts::<S>))
        .route("/profile/saves", get(profile::saved_posts::<S>))
        .route("/profile/stats", get(profile::stats::<S>))
        .route("/profile/achievements", get(profile::achievement_list::<S>))
        .route("/state", get(state::get_state::<S>))
        .route("/state/viewed", put(state::set_viewed::<S>))
        .route("/state/viewed/merge", post(state::merge_viewed::<S>))
        .route("/state/onboarding", put(state::set_onboarding::<S>))
}
