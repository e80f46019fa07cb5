use super::traits::ProfileRepository;
use super::{SharedConnection, with_conn};
use crate::errors::ApiError;
use crate::models::{Profile, ProfileRecord, ProfileRow, ProfileUpdate};
use crate::schema::profiles;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;

#[derive(Clone)]
pub struct SqliteProfileRepository {
    db: SharedConnection,
}

impl SqliteProfileRepository {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn find(&self, user_id: &str) -> Result<Option<Profile>, ApiError> {
        let row = with_conn(&self.db, |conn| {
            profiles::table
                .find(user_id)
                .select(ProfileRow::as_select())
                .first(conn)
                .optional()
        })?;
        Ok(row.map(Profile::from))
    }

    async fn upsert(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        at: NaiveDateTime,
    ) -> Result<Profile, ApiError> {
        let preferred_categories = serde_json::to_string(&update.preferred_categories)
            .map_err(|_| ApiError::InternalError)?;

        let record = ProfileRecord {
            id: user_id.to_string(),
            full_name: update
                .full_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            birth_date: update.birth_date,
            preferred_categories,
            updated_at: at,
        };

        let row = with_conn(&self.db, |conn| {
            diesel::insert_into(profiles::table)
                .values(&record)
                .on_conflict(profiles::id)
                .do_update()
                .set(&record)
                .returning(ProfileRow::as_returning())
                .get_result(conn)
        })?;

        Ok(row.into())
    }
}
