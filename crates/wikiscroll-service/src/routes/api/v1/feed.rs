use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::AppState;
use crate::auth::Identity;
use crate::errors::ApiError;
use crate::feed::{AdLayout, AdPlacement, FeedItem, FeedSession, LoadOutcome, spawn_prefetcher};
use crate::repositories::{ClientStateStore, ProfileRepository};
use crate::tracking::{self, AdOutcome, HiddenItem, TrackOutcome, VisibleItem};
use crate::validation::validate_preferred_categories;

#[derive(Debug, Default, Deserialize)]
pub(super) struct OpenSessionRequest {
    /// Overrides the profile's preferred categories.
    categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImpressionRequest {
    outcome: AdOutcome,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionView {
    id: String,
    position: usize,
    remaining: usize,
    loading: bool,
    post_count: usize,
    preferred_categories: Vec<String>,
    items: Vec<FeedItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct LoadMoreResponse {
    #[serde(flatten)]
    outcome: LoadOutcome,
    post_count: usize,
    remaining: usize,
}

fn session_view<S: AppState>(state: &S, session: &FeedSession) -> SessionView {
    let layout = AdLayout::resolve(&state.config().ads, state.ads(), AdPlacement::Feed);
    let posts = session.posts();
    SessionView {
        id: session.id.clone(),
        position: session.position(),
        remaining: session.remaining(layout.frequency, layout.ads.len()),
        loading: session.is_loading(),
        post_count: posts.len(),
        preferred_categories: session.preferred_categories().to_vec(),
        items: layout.interleave(&posts),
    }
}

/// Looks up a session the caller may use. Sessions opened by a signed-in user
/// are not visible to anyone else.
fn find_session<S: AppState>(
    state: &S,
    identity: &Identity,
    id: &str,
) -> Result<Arc<FeedSession>, ApiError> {
    let session = state.sessions().get(id).ok_or(ApiError::NotFound)?;
    match session.user_id.as_deref() {
        Some(owner) if identity.user_id.as_deref() != Some(owner) => {
            debug!("Session belongs to another user");
            Err(ApiError::NotFound)
        }
        _ => Ok(session),
    }
}

#[instrument(skip_all, fields(user_id = ?identity.user_id, device_id = ?identity.device_id))]
pub(super) async fn open_session<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    payload: Option<Json<OpenSessionRequest>>,
) -> Result<(StatusCode, ResponseJson<SessionView>), ApiError> {
    let request = payload.map(|Json(p)| p).unwrap_or_default();
    let id = Uuid::new_v4().to_string();

    let preferred = match (request.categories, identity.user_id.as_deref()) {
        (Some(categories), _) => validate_preferred_categories(&categories)?,
        (None, Some(user_id)) => state
            .profile_repo()
            .find(user_id)
            .await?
            .map(|profile| profile.preferred_categories)
            .unwrap_or_default(),
        (None, None) => Vec::new(),
    };

    // Without any identity the session has no durable state of its own.
    let owner_key = identity
        .owner_key()
        .map(str::to_string)
        .unwrap_or_else(|| format!("session:{id}"));
    let viewed = match state.client_state().viewed_post_ids(&owner_key).await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(error = %err, "Could not read viewed posts, starting empty");
            Vec::new()
        }
    };

    let session = Arc::new(FeedSession::new(
        id,
        owner_key,
        identity.user_id.clone(),
        preferred,
        viewed,
        state.clock().now(),
    ));
    state.sessions().insert(session.clone());

    let outcome = state.feed().load_more(&session).await;
    spawn_prefetcher(state.clone(), &session);
    info!(session_id = %session.id, ?outcome, "Opened feed session");

    Ok((StatusCode::CREATED, ResponseJson(session_view(&state, &session))))
}

#[instrument(skip_all, fields(session_id = %id))]
pub(super) async fn get_session<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<ResponseJson<SessionView>, ApiError> {
    let session = find_session(&state, &identity, &id)?;
    session.touch(state.clock().now());
    Ok(ResponseJson(session_view(&state, &session)))
}

#[instrument(skip_all, fields(session_id = %id))]
pub(super) async fn close_session<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    find_session(&state, &identity, &id)?;
    state.sessions().remove(&id);
    info!("Closed feed session");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(session_id = %id))]
pub(super) async fn load_more<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<ResponseJson<LoadMoreResponse>, ApiError> {
    let session = find_session(&state, &identity, &id)?;
    session.touch(state.clock().now());
    let outcome = state.feed().load_more(&session).await;

    let layout = AdLayout::resolve(&state.config().ads, state.ads(), AdPlacement::Feed);
    Ok(ResponseJson(LoadMoreResponse {
        outcome,
        post_count: session.post_count(),
        remaining: session.remaining(layout.frequency, layout.ads.len()),
    }))
}

pub(super) async fn item_visible<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Path((id, position)): Path<(String, usize)>,
) -> Result<ResponseJson<VisibleItem>, ApiError> {
    let session = find_session(&state, &identity, &id)?;
    let visible = tracking::mark_visible(&state, &session, position).await?;
    Ok(ResponseJson(visible))
}

pub(super) async fn item_viewed<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Path((id, position)): Path<(String, usize)>,
) -> Result<ResponseJson<TrackOutcome>, ApiError> {
    let session = find_session(&state, &identity, &id)?;
    let outcome = tracking::record_post_view(&state, &session, position).await?;
    Ok(ResponseJson(outcome))
}

pub(super) async fn item_impression<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Path((id, position)): Path<(String, usize)>,
    Json(payload): Json<ImpressionRequest>,
) -> Result<ResponseJson<TrackOutcome>, ApiError> {
    let session = find_session(&state, &identity, &id)?;
    let outcome =
        tracking::record_ad_impression(&state, &session, position, payload.outcome).await?;
    Ok(ResponseJson(outcome))
}

pub(super) async fn item_hidden<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Path((id, position)): Path<(String, usize)>,
) -> Result<ResponseJson<HiddenItem>, ApiError> {
    let session = find_session(&state, &identity, &id)?;
    let hidden = tracking::mark_hidden(&state, &session, position).await?;
    Ok(ResponseJson(hidden))
}
