use crate::errors::ApiError;
use crate::models::{
    AdImpression, Achievement, NewAdImpression, NewPost, NewPostView, Post, PostView, Profile,
    ProfileUpdate, ViewRecord,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Filters for one feed fetch. `None` means the filter is not applied.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub exclude_ids: Option<Vec<i32>>,
    pub categories: Option<Vec<String>>,
    pub limit: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySort {
    #[default]
    Newest,
    Oldest,
    MostViewed,
    Title,
}

/// Restricts the library by one reader's view history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewedScope {
    ViewedBy(String),
    NotViewedBy(String),
}

#[derive(Debug, Clone, Default)]
pub struct LibraryQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub viewed: Option<ViewedScope>,
    pub sort: LibrarySort,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct ListPostsResult {
    pub items: Vec<Post>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Like,
    Save,
}

#[async_trait]
pub trait PostRepository: Clone + Send + Sync + 'static {
    async fn create(&self, post: &NewPost) -> Result<Post, ApiError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<Post>, ApiError>;
    async fn find_by_source_url(&self, url: &str) -> Result<Option<Post>, ApiError>;
    /// Newest first, bounded by `query.limit`.
    async fn list_for_feed(&self, query: &FeedQuery) -> Result<Vec<Post>, ApiError>;
    async fn list_library(&self, query: &LibraryQuery) -> Result<ListPostsResult, ApiError>;
    /// Atomic `view_count + 1`. Returns false when the post does not exist.
    async fn increment_view_count(&self, id: i32) -> Result<bool, ApiError>;
}

#[async_trait]
pub trait EngagementRepository: Clone + Send + Sync + 'static {
    /// Flips the reaction in one transaction and returns the new state.
    async fn toggle_reaction(
        &self,
        kind: Reaction,
        user_id: &str,
        post_id: i32,
        at: NaiveDateTime,
    ) -> Result<bool, ApiError>;
    /// Sets the reaction to `on`; repeated calls leave a single row or none.
    async fn set_reaction(
        &self,
        kind: Reaction,
        user_id: &str,
        post_id: i32,
        on: bool,
        at: NaiveDateTime,
    ) -> Result<(), ApiError>;
    async fn has_reaction(&self, kind: Reaction, user_id: &str, post_id: i32)
    -> Result<bool, ApiError>;
    async fn count_reactions(&self, kind: Reaction, post_id: i32) -> Result<u64, ApiError>;
    async fn count_user_reactions(&self, kind: Reaction, user_id: &str) -> Result<u64, ApiError>;
    /// Posts the user reacted to, most recent reaction first.
    async fn reacted_posts(&self, kind: Reaction, user_id: &str) -> Result<Vec<Post>, ApiError>;

    /// Inserts the view unless the user already viewed the post that day.
    async fn record_view(&self, view: &NewPostView) -> Result<Option<PostView>, ApiError>;
    async fn update_reading_time(
        &self,
        user_id: &str,
        post_id: i32,
        view_date: NaiveDate,
        minutes: i32,
    ) -> Result<(), ApiError>;
    async fn count_views(&self, user_id: &str) -> Result<u64, ApiError>;
    async fn view_records(&self, user_id: &str) -> Result<Vec<ViewRecord>, ApiError>;

    async fn record_impression(&self, impression: &NewAdImpression)
    -> Result<AdImpression, ApiError>;
}

#[async_trait]
pub trait AchievementRepository: Clone + Send + Sync + 'static {
    async fn all(&self) -> Result<Vec<Achievement>, ApiError>;
    async fn unlocked(&self, user_id: &str) -> Result<Vec<(i32, NaiveDateTime)>, ApiError>;
    /// Returns true only if this call created the unlock row.
    async fn unlock(
        &self,
        user_id: &str,
        achievement_id: i32,
        at: NaiveDateTime,
    ) -> Result<bool, ApiError>;
}

#[async_trait]
pub trait ProfileRepository: Clone + Send + Sync + 'static {
    async fn find(&self, user_id: &str) -> Result<Option<Profile>, ApiError>;
    async fn upsert(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        at: NaiveDateTime,
    ) -> Result<Profile, ApiError>;
}

/// Durable per-client state that outlives feed sessions.
#[async_trait]
pub trait ClientStateStore: Clone + Send + Sync + 'static {
    async fn viewed_post_ids(&self, owner: &str) -> Result<Vec<i32>, ApiError>;
    /// Replaces the stored list (last write wins).
    async fn set_viewed_post_ids(
        &self,
        owner: &str,
        ids: &[i32],
        at: NaiveDateTime,
    ) -> Result<(), ApiError>;
    /// Adds ids to the stored list and returns the merged list.
    async fn merge_viewed_post_ids(
        &self,
        owner: &str,
        ids: &[i32],
        at: NaiveDateTime,
    ) -> Result<Vec<i32>, ApiError>;
    async fn onboarding_seen(&self, owner: &str) -> Result<bool, ApiError>;
    async fn set_onboarding_seen(
        &self,
        owner: &str,
        seen: bool,
        at: NaiveDateTime,
    ) -> Result<(), ApiError>;
}
