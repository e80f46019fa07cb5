use axum::{
    extract::{Query, State},
    response::Json as ResponseJson,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::AppState;
use crate::auth::Identity;
use crate::errors::ApiError;
use crate::feed::{AdLayout, AdPlacement, FeedItem};
use crate::models::Post;
use crate::repositories::{LibraryQuery, LibrarySort, PostRepository, ViewedScope};
use crate::validation::{UNCATEGORIZED_LABEL, validate_category};

const LIBRARY_PAGE_SIZE: i64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum ViewedFilter {
    #[default]
    All,
    Viewed,
    Unviewed,
}

#[derive(Debug, Deserialize)]
pub(super) struct LibraryParams {
    search: Option<String>,
    category: Option<String>,
    #[serde(default)]
    viewed: ViewedFilter,
    #[serde(default)]
    sort: LibrarySort,
    /// Zero-based.
    #[serde(default)]
    page: u32,
}

#[derive(Debug, Serialize)]
pub(super) struct CategoryGroup {
    category: String,
    posts: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub(super) struct LibraryPage {
    items: Vec<FeedItem>,
    groups: Vec<CategoryGroup>,
    total: u64,
    page: u32,
    page_size: i64,
    has_more: bool,
}

/// Groups posts by category in order of first appearance.
fn group_by_category(posts: &[Post]) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for post in posts {
        let category = post.category.as_deref().unwrap_or(UNCATEGORIZED_LABEL);
        match groups.iter_mut().find(|g| g.category == category) {
            Some(group) => group.posts.push(post.clone()),
            None => groups.push(CategoryGroup {
                category: category.to_string(),
                posts: vec![post.clone()],
            }),
        }
    }
    groups
}

#[instrument(
    skip_all,
    fields(
        search = ?params.search,
        category = ?params.category,
        viewed = ?params.viewed,
        sort = ?params.sort,
        page = params.page
    )
)]
pub(super) async fn list_library<S: AppState>(
    State(state): State<S>,
    identity: Identity,
    Query(params): Query<LibraryParams>,
) -> Result<ResponseJson<LibraryPage>, ApiError> {
    debug!("Processing library request");

    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(validate_category)
        .transpose()?
        .map(str::to_string);

    let mut query = LibraryQuery {
        search: params.search.clone(),
        category,
        sort: params.sort,
        limit: LIBRARY_PAGE_SIZE,
        offset: i64::from(params.page) * LIBRARY_PAGE_SIZE,
        ..LibraryQuery::default()
    };

    if params.viewed != ViewedFilter::All {
        let user_id = identity.require_user()?.to_string();
        query.viewed = match params.viewed {
            ViewedFilter::Viewed => Some(ViewedScope::ViewedBy(user_id)),
            ViewedFilter::Unviewed => Some(ViewedScope::NotViewedBy(user_id)),
            ViewedFilter::All => None,
        };
    }

    let result = state.post_repo().list_library(&query).await?;
    let layout = AdLayout::resolve(&state.config().ads, state.ads(), AdPlacement::Library);
    let has_more = (query.offset + result.items.len() as i64) < result.total as i64;

    info!(
        returned_count = result.items.len(),
        total = result.total,
        "Retrieved library page"
    );

    Ok(ResponseJson(LibraryPage {
        items: layout.interleave(&result.items),
        groups: group_by_category(&result.items),
        total: result.total,
        page: params.page,
        page_size: LIBRARY_PAGE_SIZE,
        has_more,
    }))
}
