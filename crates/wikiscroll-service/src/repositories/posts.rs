use super::traits::{
    FeedQuery, LibraryQuery, LibrarySort, ListPostsResult, PostRepository, ViewedScope,
};
use super::{SharedConnection, with_conn};
use crate::errors::ApiError;
use crate::models::{NewPost, Post};
use crate::schema::{post_views, wiki_posts};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use std::collections::HashSet;

/// Exclusion lists up to this size are bound into the query. Larger ones are
/// applied in memory over a newest-first scan, keeping the statement under
/// SQLite's bound-variable limit.
const MAX_BOUND_EXCLUSIONS: usize = 500;
const SCAN_CHUNK: i64 = 200;

#[derive(Clone)]
pub struct SqlitePostRepository {
    db: SharedConnection,
}

impl SqlitePostRepository {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }
}

fn library_filter(query: &LibraryQuery) -> wiki_posts::BoxedQuery<'static, Sqlite> {
    let mut statement = wiki_posts::table.into_boxed();

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        statement = statement.filter(
            wiki_posts::title
                .like(pattern.clone())
                .or(wiki_posts::summary.like(pattern)),
        );
    }
    if let Some(category) = &query.category {
        statement = statement.filter(wiki_posts::category.eq(category.clone()));
    }
    match &query.viewed {
        Some(ViewedScope::ViewedBy(user_id)) => {
            let viewed = post_views::table
                .filter(post_views::user_id.eq(user_id.clone()))
                .select(post_views::post_id);
            statement = statement.filter(wiki_posts::id.eq_any(viewed));
        }
        Some(ViewedScope::NotViewedBy(user_id)) => {
            let viewed = post_views::table
                .filter(post_views::user_id.eq(user_id.clone()))
                .select(post_views::post_id);
            statement = statement.filter(wiki_posts::id.ne_all(viewed));
        }
        None => {}
    }

    statement
}

/// Feed candidates newest first, without the exclusion filter.
fn feed_candidates(query: &FeedQuery) -> wiki_posts::BoxedQuery<'static, Sqlite> {
    let mut statement = wiki_posts::table.into_boxed();
    if let Some(categories) = &query.categories {
        statement = statement.filter(wiki_posts::category.eq_any(categories.clone()));
    }
    statement.order((wiki_posts::created_at.desc(), wiki_posts::id.desc()))
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn create(&self, post: &NewPost) -> Result<Post, ApiError> {
        with_conn(&self.db, |conn| {
            diesel::insert_into(wiki_posts::table)
                .values(post)
                .returning(Post::as_returning())
                .get_result(conn)
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Post>, ApiError> {
        with_conn(&self.db, |conn| {
            wiki_posts::table
                .find(id)
                .select(Post::as_select())
                .first(conn)
                .optional()
        })
    }

    async fn find_by_source_url(&self, url: &str) -> Result<Option<Post>, ApiError> {
        with_conn(&self.db, |conn| {
            wiki_posts::table
                .filter(wiki_posts::source_url.eq(url))
                .order(wiki_posts::id.asc())
                .select(Post::as_select())
                .first(conn)
                .optional()
        })
    }

    async fn list_for_feed(&self, query: &FeedQuery) -> Result<Vec<Post>, ApiError> {
        with_conn(&self.db, |conn| {
            let excluded = query.exclude_ids.as_deref().unwrap_or_default();

            if excluded.len() <= MAX_BOUND_EXCLUSIONS {
                let mut statement = feed_candidates(query);
                if !excluded.is_empty() {
                    statement = statement.filter(wiki_posts::id.ne_all(excluded.to_vec()));
                }
                return statement
                    .limit(query.limit)
                    .select(Post::as_select())
                    .load(conn);
            }

            let excluded: HashSet<i32> = excluded.iter().copied().collect();
            let mut page = Vec::new();
            let mut offset = 0;
            loop {
                let chunk: Vec<Post> = feed_candidates(query)
                    .limit(SCAN_CHUNK)
                    .offset(offset)
                    .select(Post::as_select())
                    .load(conn)?;
                let exhausted = (chunk.len() as i64) < SCAN_CHUNK;
                page.extend(chunk.into_iter().filter(|post| !excluded.contains(&post.id)));
                if exhausted || page.len() as i64 >= query.limit {
                    break;
                }
                offset += SCAN_CHUNK;
            }
            page.truncate(usize::try_from(query.limit).unwrap_or(0));
            Ok(page)
        })
    }

    async fn list_library(&self, query: &LibraryQuery) -> Result<ListPostsResult, ApiError> {
        with_conn(&self.db, |conn| {
            let total: i64 = library_filter(query).count().get_result(conn)?;

            let statement = library_filter(query);
            let statement = match query.sort {
                LibrarySort::Newest => {
                    statement.order((wiki_posts::created_at.desc(), wiki_posts::id.desc()))
                }
                LibrarySort::Oldest => {
                    statement.order((wiki_posts::created_at.asc(), wiki_posts::id.asc()))
                }
                LibrarySort::MostViewed => {
                    statement.order((wiki_posts::view_count.desc(), wiki_posts::id.desc()))
                }
                LibrarySort::Title => {
                    statement.order((wiki_posts::title.asc(), wiki_posts::id.asc()))
                }
            };

            let items = statement
                .limit(query.limit)
                .offset(query.offset)
                .select(Post::as_select())
                .load(conn)?;

            Ok(ListPostsResult {
                items,
                total: total as u64,
            })
        })
    }

    async fn increment_view_count(&self, id: i32) -> Result<bool, ApiError> {
        with_conn(&self.db, |conn| {
            let updated = diesel::update(wiki_posts::table.find(id))
                .set(wiki_posts::view_count.eq(wiki_posts::view_count + 1))
                .execute(conn)?;
            Ok(updated > 0)
        })
    }
}
