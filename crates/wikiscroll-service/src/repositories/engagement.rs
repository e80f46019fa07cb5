use super::traits::{EngagementRepository, Reaction};
use super::{SharedConnection, with_conn};
use crate::errors::ApiError;
use crate::models::{AdImpression, NewAdImpression, NewPostView, Post, PostView, ViewRecord};
use crate::schema::{ad_impressions, post_likes, post_saves, post_views, wiki_posts};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;

#[derive(Clone)]
pub struct SqliteEngagementRepository {
    db: SharedConnection,
}

impl SqliteEngagementRepository {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }
}

fn delete_reaction(
    conn: &mut SqliteConnection,
    kind: Reaction,
    user_id: &str,
    post_id: i32,
) -> Result<usize, DieselError> {
    match kind {
        Reaction::Like => diesel::delete(
            post_likes::table
                .filter(post_likes::user_id.eq(user_id))
                .filter(post_likes::post_id.eq(post_id)),
        )
        .execute(conn),
        Reaction::Save => diesel::delete(
            post_saves::table
                .filter(post_saves::user_id.eq(user_id))
                .filter(post_saves::post_id.eq(post_id)),
        )
        .execute(conn),
    }
}

/// `INSERT OR IGNORE`; the unique (user_id, post_id) index keeps one row per pair.
fn insert_reaction(
    conn: &mut SqliteConnection,
    kind: Reaction,
    user_id: &str,
    post_id: i32,
    at: NaiveDateTime,
) -> Result<usize, DieselError> {
    match kind {
        Reaction::Like => diesel::insert_or_ignore_into(post_likes::table)
            .values((
                post_likes::user_id.eq(user_id),
                post_likes::post_id.eq(post_id),
                post_likes::created_at.eq(at),
            ))
            .execute(conn),
        Reaction::Save => diesel::insert_or_ignore_into(post_saves::table)
            .values((
                post_saves::user_id.eq(user_id),
                post_saves::post_id.eq(post_id),
                post_saves::created_at.eq(at),
            ))
            .execute(conn),
    }
}

#[async_trait]
impl EngagementRepository for SqliteEngagementRepository {
    async fn toggle_reaction(
        &self,
        kind: Reaction,
        user_id: &str,
        post_id: i32,
        at: NaiveDateTime,
    ) -> Result<bool, ApiError> {
        with_conn(&self.db, |conn| {
            conn.transaction::<_, DieselError, _>(|conn| {
                if delete_reaction(conn, kind, user_id, post_id)? > 0 {
                    return Ok(false);
                }
                insert_reaction(conn, kind, user_id, post_id, at)?;
                Ok(true)
            })
        })
    }

    async fn set_reaction(
        &self,
        kind: Reaction,
        user_id: &str,
        post_id: i32,
        on: bool,
        at: NaiveDateTime,
    ) -> Result<(), ApiError> {
        with_conn(&self.db, |conn| {
            if on {
                insert_reaction(conn, kind, user_id, post_id, at)?;
            } else {
                delete_reaction(conn, kind, user_id, post_id)?;
            }
            Ok(())
        })
    }

    async fn has_reaction(
        &self,
        kind: Reaction,
        user_id: &str,
        post_id: i32,
    ) -> Result<bool, ApiError> {
        with_conn(&self.db, |conn| {
            let count: i64 = match kind {
                Reaction::Like => post_likes::table
                    .filter(post_likes::user_id.eq(user_id))
                    .filter(post_likes::post_id.eq(post_id))
                    .count()
                    .get_result(conn)?,
                Reaction::Save => post_saves::table
                    .filter(post_saves::user_id.eq(user_id))
                    .filter(post_saves::post_id.eq(post_id))
                    .count()
                    .get_result(conn)?,
            };
            Ok(count > 0)
        })
    }

    async fn count_reactions(&self, kind: Reaction, post_id: i32) -> Result<u64, ApiError> {
        with_conn(&self.db, |conn| {
            let count: i64 = match kind {
                Reaction::Like => post_likes::table
                    .filter(post_likes::post_id.eq(post_id))
                    .count()
                    .get_result(conn)?,
                Reaction::Save => post_saves::table
                    .filter(post_saves::post_id.eq(post_id))
                    .count()
                    .get_result(conn)?,
            };
            Ok(count as u64)
        })
    }

    async fn count_user_reactions(&self, kind: Reaction, user_id: &str) -> Result<u64, ApiError> {
        with_conn(&self.db, |conn| {
            let count: i64 = match kind {
                Reaction::Like => post_likes::table
                    .filter(post_likes::user_id.eq(user_id))
                    .count()
                    .get_result(conn)?,
                Reaction::Save => post_saves::table
                    .filter(post_saves::user_id.eq(user_id))
                    .count()
                    .get_result(conn)?,
            };
            Ok(count as u64)
        })
    }

    async fn reacted_posts(&self, kind: Reaction, user_id: &str) -> Result<Vec<Post>, ApiError> {
        with_conn(&self.db, |conn| match kind {
            Reaction::Like => post_likes::table
                .inner_join(wiki_posts::table)
                .filter(post_likes::user_id.eq(user_id))
                .order((post_likes::created_at.desc(), post_likes::id.desc()))
                .select(Post::as_select())
                .load(conn),
            Reaction::Save => post_saves::table
                .inner_join(wiki_posts::table)
                .filter(post_saves::user_id.eq(user_id))
                .order((post_saves::created_at.desc(), post_saves::id.desc()))
                .select(Post::as_select())
                .load(conn),
        })
    }

    async fn record_view(&self, view: &NewPostView) -> Result<Option<PostView>, ApiError> {
        with_conn(&self.db, |conn| {
            conn.transaction::<_, DieselError, _>(|conn| {
                let inserted = diesel::insert_or_ignore_into(post_views::table)
                    .values(view)
                    .execute(conn)?;
                if inserted == 0 {
                    return Ok(None);
                }

                post_views::table
                    .filter(post_views::user_id.eq(&view.user_id))
                    .filter(post_views::post_id.eq(view.post_id))
                    .filter(post_views::view_date.eq(view.view_date))
                    .select(PostView::as_select())
                    .first(conn)
                    .optional()
            })
        })
    }

    async fn update_reading_time(
        &self,
        user_id: &str,
        post_id: i32,
        view_date: NaiveDate,
        minutes: i32,
    ) -> Result<(), ApiError> {
        with_conn(&self.db, |conn| {
            diesel::update(
                post_views::table
                    .filter(post_views::user_id.eq(user_id))
                    .filter(post_views::post_id.eq(post_id))
                    .filter(post_views::view_date.eq(view_date)),
            )
            .set(post_views::reading_time.eq(minutes))
            .execute(conn)?;
            Ok(())
        })
    }

    async fn count_views(&self, user_id: &str) -> Result<u64, ApiError> {
        with_conn(&self.db, |conn| {
            let count: i64 = post_views::table
                .filter(post_views::user_id.eq(user_id))
                .count()
                .get_result(conn)?;
            Ok(count as u64)
        })
    }

    async fn view_records(&self, user_id: &str) -> Result<Vec<ViewRecord>, ApiError> {
        with_conn(&self.db, |conn| {
            post_views::table
                .inner_join(wiki_posts::table)
                .filter(post_views::user_id.eq(user_id))
                .order((post_views::viewed_at.desc(), post_views::id.desc()))
                .select((
                    post_views::post_id,
                    post_views::viewed_at,
                    post_views::view_date,
                    post_views::reading_time,
                    wiki_posts::category,
                ))
                .load::<ViewRecord>(conn)
        })
    }

    async fn record_impression(
        &self,
        impression: &NewAdImpression,
    ) -> Result<AdImpression, ApiError> {
        with_conn(&self.db, |conn| {
            diesel::insert_into(ad_impressions::table)
                .values(impression)
                .returning(AdImpression::as_returning())
                .get_result(conn)
        })
    }
}
