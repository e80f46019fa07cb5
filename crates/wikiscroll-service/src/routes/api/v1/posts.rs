use axum::{
    extract::{Json, Path, State},
    response::Json as ResponseJson,
};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::AppState;
use crate::auth::{AuthUser, Identity};
use crate::errors::ApiError;
use crate::generator::GenerationRequest;
use crate::models::{NewPost, Post};
use crate::repositories::{PostRepository, Reaction};
use crate::social::{self, EngagementSummary, ReactionState, ShareTargets};
use crate::validation::validate_category;

#[derive(Debug, Deserialize)]
pub(super) struct CreatePostRequest {
    title: String,
    summary: String,
    #[serde(default)]
    image_url: String,
    source_url: String,
    category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct GenerateRequest {
    category: Option<String>,
}

/// Stores `new_post` unless a post with the same source URL exists. A
/// same-titled duplicate returns the existing post; a different title is a
/// conflict.
async fn store_post<S: AppState>(state: &S, new_post: NewPost) -> Result<Post, ApiError> {
    let posts = state.post_repo();
    if let Some(existing) = posts.find_by_source_url(&new_post.source_url).await? {
        if existing.title != new_post.title {
            warn!(
                existing_title = %existing.title,
                new_title = %new_post.title,
                "Source URL already exists with a different title"
            );
            return Err(ApiError::DuplicateSourceUrl);
        }
        info!(id = existing.id, "Returning existing post");
        return Ok(existing);
    }

    let post = posts.create(&new_post).await?;
    info!(id = post.id, category = ?post.category, "Created post");
    state.post_events().publish(post.clone());
    Ok(post)
}

#[instrument(skip_all, fields(source_url = %payload.source_url, category = ?payload.category))]
pub(super) async fn create_post<S: AppState>(
    State(state): State<S>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<ResponseJson<Post>, ApiError> {
    debug!("Processing create post request");
    let new_post = NewPost::new(
        &payload.title,
        &payload.summary,
        &payload.image_url,
        &payload.source_url,
        payload.category.as_deref(),
    )?;
    Ok(ResponseJson(store_post(&state, new_post).await?))
}

#[instrument(skip_all, fields(category = ?payload.as_ref().and_then(|p| p.category.clone())))]
pub(super) async fn generate_post<S: AppState>(
    State(state): State<S>,
    payload: Option<Json<GenerateRequest>>,
) -> Result<ResponseJson<Post>, ApiError> {
    let Some(generator) = state.generator() else {
        return Err(ApiError::GenerationUnavailable);
    };

    let request = payload.map(|Json(p)| p).unwrap_or_default();
    let category = request
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(validate_category)
        .transpose()?
        .map(str::to_string);

    let generated = generator.generate(&GenerationRequest { category }).await?;
    let new_post = NewPost::from_generated(&generated)?;
    Ok(ResponseJson(store_post(&state, new_post).await?))
}

#[instrument(skip_all, fields(id = %id))]
pub(super) async fn get_post<S: AppState>(
    State(state): State<S>,
    Path(id): Path<i32>,
) -> Result<ResponseJson<Post>, ApiError> {
    match state.post_repo().find_by_id(id).await? {
        Some(post) => Ok(ResponseJson(post)),
        None => {
            debug!("Post not found");
            Err(ApiError::NotFound)
        }
    }
}

#[instrument(skip_all, fields(id = %id))]
pub(super) async fn engagement<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Path(id): Path<i32>,
) -> Result<ResponseJson<EngagementSummary>, ApiError> {
    let summary = social::engagement_summary(
        state.post_repo(),
        state.engagement_repo(),
        id,
        identity.user_id.as_deref(),
    )
    .await?;
    Ok(ResponseJson(summary))
}

async fn set_reaction<S: AppState>(
    state: &S,
    user_id: &str,
    post_id: i32,
    reaction: Reaction,
    active: bool,
) -> Result<ResponseJson<ReactionState>, ApiError> {
    let now = state.clock().now().naive_utc();
    let result = social::set_reaction(
        state.post_repo(),
        state.engagement_repo(),
        reaction,
        user_id,
        post_id,
        active,
        now,
    )
    .await?;
    Ok(ResponseJson(result))
}

async fn toggle_reaction<S: AppState>(
    state: &S,
    user_id: &str,
    post_id: i32,
    reaction: Reaction,
) -> Result<ResponseJson<ReactionState>, ApiError> {
    let now = state.clock().now().naive_utc();
    let result = social::toggle_reaction(
        state.post_repo(),
        state.engagement_repo(),
        reaction,
        user_id,
        post_id,
        now,
    )
    .await?;
    Ok(ResponseJson(result))
}

pub(super) async fn like<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i32>,
) -> Result<ResponseJson<ReactionState>, ApiError> {
    set_reaction(&state, &user_id, id, Reaction::Like, true).await
}

pub(super) async fn unlike<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i32>,
) -> Result<ResponseJson<ReactionState>, ApiError> {
    set_reaction(&state, &user_id, id, Reaction::Like, false).await
}

pub(super) async fn toggle_like<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i32>,
) -> Result<ResponseJson<ReactionState>, ApiError> {
    toggle_reaction(&state, &user_id, id, Reaction::Like).await
}

pub(super) async fn save<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i32>,
) -> Result<ResponseJson<ReactionState>, ApiError> {
    set_reaction(&state, &user_id, id, Reaction::Save, true).await
}

pub(super) async fn unsave<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i32>,
) -> Result<ResponseJson<ReactionState>, ApiError> {
    set_reaction(&state, &user_id, id, Reaction::Save, false).await
}

pub(super) async fn toggle_save<S: AppState>(
    State(state): State<S>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i32>,
) -> Result<ResponseJson<ReactionState>, ApiError> {
    toggle_reaction(&state, &user_id, id, Reaction::Save).await
}

pub(super) async fn share<S: AppState>(
    State(state): State<S>,
    Path(id): Path<i32>,
) -> Result<ResponseJson<ShareTargets>, ApiError> {
    let post = state
        .post_repo()
        .find_by_id(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ResponseJson(ShareTargets::for_post(&post)))
}
