//! Dwell-gated view and ad impression recording for feed sessions.
//!
//! A feed position is *mounted* when the client reports it visible. Once the
//! item has been visible for long enough the client reports the view, and at
//! most one record is written per mount. Tracking writes are best effort: a
//! store failure is logged and reported as `dropped`, never surfaced as an
//! HTTP error and never retried.

use crate::AppState;
use crate::achievements;
use crate::errors::ApiError;
use crate::feed::{
    AdLayout, AdPlacement, FeedItem, FeedSession, LoadOutcome, Mount, MountedItem, Slot, top_up,
};
use crate::models::{NewAdImpression, NewPostView, UnlockNotification};
use crate::repositories::{ClientStateStore, EngagementRepository, PostRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Recorded,
    /// This mount already produced its record.
    AlreadyRecorded,
    /// Not visible for long enough yet; report again later.
    TooEarly,
    NotMounted,
    /// Ad impressions are only kept for signed-in users.
    Anonymous,
    /// The store rejected the write; it is not retried.
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackOutcome {
    pub status: TrackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<UnlockNotification>,
}

impl TrackOutcome {
    fn status(status: TrackStatus) -> Self {
        Self {
            status,
            retry_after_ms: None,
            notifications: Vec::new(),
        }
    }

    fn too_early(remaining: Duration) -> Self {
        Self {
            retry_after_ms: Some(remaining.as_millis() as u64),
            ..Self::status(TrackStatus::TooEarly)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdOutcome {
    FullView,
    Skip,
    Click,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibleItem {
    pub position: usize,
    pub item: FeedItem,
    pub mounted_at: DateTime<Utc>,
    pub remaining: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HiddenItem {
    pub position: usize,
    pub was_mounted: bool,
    /// Whole minutes credited to today's view, if any.
    pub reading_time: Option<i32>,
}

/// Item at `position` in the session's assembled sequence.
pub fn resolve_item<S: AppState>(
    state: &S,
    session: &FeedSession,
    position: usize,
) -> Result<FeedItem, ApiError> {
    let layout = AdLayout::resolve(&state.config().ads, state.ads(), AdPlacement::Feed);
    match layout.locate(position, session.post_count()) {
        Some(Slot::Post(index)) => session
            .post_at(index)
            .map(FeedItem::Post)
            .ok_or(ApiError::NotFound),
        Some(Slot::Ad(index)) => layout
            .ads
            .get(index % layout.ads.len().max(1))
            .cloned()
            .map(FeedItem::Ad)
            .ok_or(ApiError::NotFound),
        None => Err(ApiError::NotFound),
    }
}

fn mounted_item(item: &FeedItem) -> MountedItem {
    match item {
        FeedItem::Post(post) => MountedItem::Post(post.id),
        FeedItem::Ad(ad) => MountedItem::Ad(ad.id.clone()),
    }
}

fn visible_for(mount: &Mount, now: DateTime<Utc>) -> Duration {
    (now - mount.started_at).to_std().unwrap_or_default()
}

/// Mounts the item at `position`, moves the scroll position there and tops up
/// the queue when it runs low.
#[instrument(skip_all, fields(session_id = %session.id, position))]
pub async fn mark_visible<S: AppState>(
    state: &S,
    session: &FeedSession,
    position: usize,
) -> Result<VisibleItem, ApiError> {
    let item = resolve_item(state, session, position)?;
    let now = state.clock().now();
    session.touch(now);
    session.set_position(position);
    let mount = session.mount(position, mounted_item(&item), now);
    debug!(started_at = %mount.started_at, "Item visible");

    let load = top_up(state, session).await;
    let layout = AdLayout::resolve(&state.config().ads, state.ads(), AdPlacement::Feed);

    Ok(VisibleItem {
        position,
        item,
        mounted_at: mount.started_at,
        remaining: session.remaining(layout.frequency, layout.ads.len()),
        load,
    })
}

/// Records a post view for the current mount at `position`.
#[instrument(skip_all, fields(session_id = %session.id, position))]
pub async fn record_post_view<S: AppState>(
    state: &S,
    session: &FeedSession,
    position: usize,
) -> Result<TrackOutcome, ApiError> {
    let post = match resolve_item(state, session, position)? {
        FeedItem::Post(post) => post,
        FeedItem::Ad(_) => {
            return Err(ApiError::BadRequest(format!(
                "Item at position {position} is an ad"
            )));
        }
    };

    let now = state.clock().now();
    session.touch(now);
    let Some(mount) = session
        .current_mount(position)
        .filter(|m| m.item == MountedItem::Post(post.id))
    else {
        return Ok(TrackOutcome::status(TrackStatus::NotMounted));
    };

    let dwell = state.config().feed.post_dwell;
    let elapsed = visible_for(&mount, now);
    if elapsed < dwell {
        return Ok(TrackOutcome::too_early(dwell - elapsed));
    }
    if !session.claim_mount(position) {
        return Ok(TrackOutcome::status(TrackStatus::AlreadyRecorded));
    }

    let mut dropped = false;

    if session.mark_viewed(post.id) {
        if let Err(err) = state.post_repo().increment_view_count(post.id).await {
            warn!(post_id = post.id, error = %err, "Dropped view counter increment");
            dropped = true;
        }
        if let Err(err) = state
            .client_state()
            .merge_viewed_post_ids(&session.owner_key, &[post.id], now.naive_utc())
            .await
        {
            warn!(post_id = post.id, error = %err, "Failed to persist viewed post id");
        }
    }

    let mut notifications = Vec::new();
    if let Some(user_id) = session.user_id.as_deref() {
        let view = NewPostView {
            user_id: user_id.to_string(),
            post_id: post.id,
            viewed_at: now.naive_utc(),
            view_date: now.date_naive(),
            reading_time: 0,
        };
        match state.engagement_repo().record_view(&view).await {
            Ok(Some(_)) => {
                session.set_mount_view_date(position, view.view_date);
                match achievements::evaluate(
                    state.engagement_repo(),
                    state.achievement_repo(),
                    user_id,
                    now.naive_utc(),
                )
                .await
                {
                    Ok(unlocked) => notifications = unlocked,
                    Err(err) => warn!(error = %err, "Achievement evaluation failed"),
                }
            }
            Ok(None) => debug!(post_id = post.id, "Already viewed today"),
            Err(err) => {
                warn!(post_id = post.id, error = %err, "Dropped view event");
                dropped = true;
            }
        }
    }

    info!(post_id = post.id, dropped, unlocked = notifications.len(), "Post view tracked");
    Ok(TrackOutcome {
        status: if dropped {
            TrackStatus::Dropped
        } else {
            TrackStatus::Recorded
        },
        retry_after_ms: None,
        notifications,
    })
}

/// Unmounts `position`. If this mount wrote today's view, whole minutes of
/// visibility are credited as reading time.
#[instrument(skip_all, fields(session_id = %session.id, position))]
pub async fn mark_hidden<S: AppState>(
    state: &S,
    session: &FeedSession,
    position: usize,
) -> Result<HiddenItem, ApiError> {
    let now = state.clock().now();
    session.touch(now);
    let Some(mount) = session.unmount(position) else {
        return Ok(HiddenItem {
            position,
            was_mounted: false,
            reading_time: None,
        });
    };

    let mut reading_time = None;
    if let (MountedItem::Post(post_id), Some(view_date), Some(user_id)) =
        (&mount.item, mount.view_date, session.user_id.as_deref())
    {
        let minutes = (now - mount.started_at).num_minutes();
        if minutes > 0 {
            let minutes = i32::try_from(minutes).unwrap_or(i32::MAX);
            match state
                .engagement_repo()
                .update_reading_time(user_id, *post_id, view_date, minutes)
                .await
            {
                Ok(()) => reading_time = Some(minutes),
                Err(err) => warn!(post_id, error = %err, "Dropped reading time update"),
            }
        }
    }

    Ok(HiddenItem {
        position,
        was_mounted: true,
        reading_time,
    })
}

/// Records one ad impression for the current mount at `position`.
#[instrument(skip_all, fields(session_id = %session.id, position, ?outcome))]
pub async fn record_ad_impression<S: AppState>(
    state: &S,
    session: &FeedSession,
    position: usize,
    outcome: AdOutcome,
) -> Result<TrackOutcome, ApiError> {
    let ad = match resolve_item(state, session, position)? {
        FeedItem::Ad(ad) => ad,
        FeedItem::Post(_) => {
            return Err(ApiError::BadRequest(format!(
                "Item at position {position} is not an ad"
            )));
        }
    };

    let now = state.clock().now();
    session.touch(now);
    let Some(user_id) = session.user_id.as_deref() else {
        return Ok(TrackOutcome::status(TrackStatus::Anonymous));
    };
    let Some(mount) = session
        .current_mount(position)
        .filter(|m| m.item == MountedItem::Ad(ad.id.clone()))
    else {
        return Ok(TrackOutcome::status(TrackStatus::NotMounted));
    };

    let ads_config = &state.config().ads;
    let required = match outcome {
        AdOutcome::FullView | AdOutcome::Skip => Duration::from_secs(ad.skip_delay_seconds),
        AdOutcome::Click => ads_config.min_view_duration,
    };
    let elapsed = visible_for(&mount, now);
    if elapsed < required {
        return Ok(TrackOutcome::too_early(required - elapsed));
    }
    if !session.claim_mount(position) {
        return Ok(TrackOutcome::status(TrackStatus::AlreadyRecorded));
    }

    let impression = NewAdImpression {
        user_id: user_id.to_string(),
        ad_id: ad.id.clone(),
        viewed_at: now.naive_utc(),
        skipped: outcome == AdOutcome::Skip,
        clicked: outcome == AdOutcome::Click,
        view_duration_ms: i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
    };
    if let Err(err) = state.engagement_repo().record_impression(&impression).await {
        warn!(ad_id = %ad.id, error = %err, "Dropped ad impression");
        return Ok(TrackOutcome::status(TrackStatus::Dropped));
    }

    // Experience points are not persisted yet.
    let reward = match outcome {
        AdOutcome::FullView => ads_config.reward_for_full_view,
        AdOutcome::Click => ads_config.reward_for_click,
        AdOutcome::Skip => 0,
    };
    info!(ad_id = %ad.id, reward, "Ad impression recorded");
    Ok(TrackOutcome::status(TrackStatus::Recorded))
}
