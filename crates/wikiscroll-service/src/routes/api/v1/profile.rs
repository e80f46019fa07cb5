use axum::{
    extract::{Json, State},
    response::Json as ResponseJson,
};
use tracing::{info, instrument};

use crate::AppState;
use crate::achievements::{self, AchievementStatus, Metrics};
use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::models::{Post, Profile, ProfileUpdate};
use crate::repositories::{EngagementRepository, ProfileRepository, Reaction};
use crate::stats::{self, StatsReport};
use crate::validation::validate_preferred_categories;

#[instrument(skip_all, fields(user_id = %user_id))]
pub(super) async fn get_profile<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
) -> Result<ResponseJson<Profile>, ApiError> {
    let profile = state
        .profile_repo()
        .find(&user_id)
        .await?
        .unwrap_or_else(|| Profile::empty(&user_id));
    Ok(ResponseJson(profile))
}

#[instrument(skip_all, fields(user_id = %user_id))]
pub(super) async fn update_profile<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
    Json(mut update): Json<ProfileUpdate>,
) -> Result<ResponseJson<Profile>, ApiError> {
    update.preferred_categories = validate_preferred_categories(&update.preferred_categories)?;
    update.full_name = update
        .full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let now = state.clock().now().naive_utc();
    let profile = state.profile_repo().upsert(&user_id, &update, now).await?;
    info!(
        preferred = profile.preferred_categories.len(),
        "Updated profile"
    );
    Ok(ResponseJson(profile))
}

pub(super) async fn liked_posts<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
) -> Result<ResponseJson<Vec<Post>>, ApiError> {
    let posts = state
        .engagement_repo()
        .reacted_posts(Reaction::Like, &user_id)
        .await?;
    Ok(ResponseJson(posts))
}

pub(super) async fn saved_posts<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
) -> Result<ResponseJson<Vec<Post>>, ApiError> {
    let posts = state
        .engagement_repo()
        .reacted_posts(Reaction::Save, &user_id)
        .await?;
    Ok(ResponseJson(posts))
}

#[instrument(skip_all, fields(user_id = %user_id))]
pub(super) async fn stats<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
) -> Result<ResponseJson<StatsReport>, ApiError> {
    let today = state.clock().today();
    let report = stats::load_report(
        state.engagement_repo(),
        state.achievement_repo(),
        &user_id,
        today,
    )
    .await?;
    Ok(ResponseJson(report))
}

pub(super) async fn achievement_list<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
) -> Result<ResponseJson<Vec<AchievementStatus>>, ApiError> {
    let records = state.engagement_repo().view_records(&user_id).await?;
    let metrics = Metrics::from_records(&records, state.clock().today());
    let catalogue = achievements::catalogue(state.achievement_repo(), &user_id, &metrics).await?;
    Ok(ResponseJson(catalogue))
}
