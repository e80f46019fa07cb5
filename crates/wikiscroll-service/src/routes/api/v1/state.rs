use axum::{
    extract::{Json, State},
    response::Json as ResponseJson,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::AppState;
use crate::auth::Identity;
use crate::errors::ApiError;
use crate::repositories::ClientStateStore;

#[derive(Debug, Serialize)]
pub(super) struct ClientStateView {
    owner: String,
    viewed_post_ids: Vec<i32>,
    onboarding_seen: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ViewedIdsRequest {
    post_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OnboardingRequest {
    seen: bool,
}

async fn load_view<S: AppState>(state: &S, owner: &str) -> Result<ClientStateView, ApiError> {
    let store = state.client_state();
    Ok(ClientStateView {
        owner: owner.to_string(),
        viewed_post_ids: store.viewed_post_ids(owner).await?,
        onboarding_seen: store.onboarding_seen(owner).await?,
    })
}

pub(super) async fn get_state<S: AppState>(
    State(state): State<S>,
    identity: Identity,
) -> Result<ResponseJson<ClientStateView>, ApiError> {
    let owner = identity.require_owner()?;
    Ok(ResponseJson(load_view(&state, owner).await?))
}

/// Replaces the stored list; the last writer wins.
#[instrument(skip_all, fields(count = payload.post_ids.len()))]
pub(super) async fn set_viewed<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Json(payload): Json<ViewedIdsRequest>,
) -> Result<ResponseJson<ClientStateView>, ApiError> {
    let owner = identity.require_owner()?;
    let now = state.clock().now().naive_utc();
    state
        .client_state()
        .set_viewed_post_ids(owner, &payload.post_ids, now)
        .await?;
    info!("Replaced viewed post ids");
    Ok(ResponseJson(load_view(&state, owner).await?))
}

#[instrument(skip_all, fields(count = payload.post_ids.len()))]
pub(super) async fn merge_viewed<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Json(payload): Json<ViewedIdsRequest>,
) -> Result<ResponseJson<ClientStateView>, ApiError> {
    let owner = identity.require_owner()?;
    let now = state.clock().now().naive_utc();
    let merged = state
        .client_state()
        .merge_viewed_post_ids(owner, &payload.post_ids, now)
        .await?;
    info!(total = merged.len(), "Merged viewed post ids");
    Ok(ResponseJson(load_view(&state, owner).await?))
}

pub(super) async fn set_onboarding<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Json(payload): Json<OnboardingRequest>,
) -> Result<ResponseJson<ClientStateView>, ApiError> {
    let owner = identity.require_owner()?;
    let now = state.clock().now().naive_utc();
    state
        .client_state()
        .set_onboarding_seen(owner, payload.seen, now)
        .await?;
    Ok(ResponseJson(load_view(&state, owner).await?))
}
