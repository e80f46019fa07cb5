use super::traits::AchievementRepository;
use super::{SharedConnection, with_conn};
use crate::errors::ApiError;
use crate::models::Achievement;
use crate::schema::{achievements, user_achievements};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Clone)]
pub struct SqliteAchievementRepository {
    db: SharedConnection,
}

impl SqliteAchievementRepository {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AchievementRepository for SqliteAchievementRepository {
    async fn all(&self) -> Result<Vec<Achievement>, ApiError> {
        with_conn(&self.db, |conn| {
            achievements::table
                .order((achievements::category.asc(), achievements::threshold.asc()))
                .select(Achievement::as_select())
                .load(conn)
        })
    }

    async fn unlocked(&self, user_id: &str) -> Result<Vec<(i32, NaiveDateTime)>, ApiError> {
        with_conn(&self.db, |conn| {
            user_achievements::table
                .filter(user_achievements::user_id.eq(user_id))
                .order(user_achievements::unlocked_at.asc())
                .select((
                    user_achievements::achievement_id,
                    user_achievements::unlocked_at,
                ))
                .load(conn)
        })
    }

    async fn unlock(
        &self,
        user_id: &str,
        achievement_id: i32,
        at: NaiveDateTime,
    ) -> Result<bool, ApiError> {
        with_conn(&self.db, |conn| {
            let inserted = diesel::insert_or_ignore_into(user_achievements::table)
                .values((
                    user_achievements::user_id.eq(user_id),
                    user_achievements::achievement_id.eq(achievement_id),
                    user_achievements::unlocked_at.eq(at),
                ))
                .execute(conn)?;
            Ok(inserted > 0)
        })
    }
}
