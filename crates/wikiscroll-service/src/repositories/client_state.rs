use super::traits::ClientStateStore;
use super::{SharedConnection, with_conn};
use crate::errors::ApiError;
use crate::schema::client_state;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use std::collections::BTreeSet;

const VIEWED_POSTS_KEY: &str = "viewed_post_ids";
const ONBOARDING_KEY: &str = "onboarding_seen";

/// Client state persisted as JSON strings, one row per (owner, key).
#[derive(Clone)]
pub struct SqliteClientStateStore {
    db: SharedConnection,
}

impl SqliteClientStateStore {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }
}

fn read_value(
    conn: &mut SqliteConnection,
    owner: &str,
    key: &str,
) -> Result<Option<String>, DieselError> {
    client_state::table
        .find((owner, key))
        .select(client_state::value)
        .first::<String>(conn)
        .optional()
}

fn write_value(
    conn: &mut SqliteConnection,
    owner: &str,
    key: &str,
    value: &str,
    at: NaiveDateTime,
) -> Result<(), DieselError> {
    diesel::replace_into(client_state::table)
        .values((
            client_state::owner_key.eq(owner),
            client_state::state_key.eq(key),
            client_state::value.eq(value),
            client_state::updated_at.eq(at),
        ))
        .execute(conn)?;
    Ok(())
}

/// Stored lists are unversioned; anything unreadable counts as empty.
fn decode_ids(raw: Option<String>) -> BTreeSet<i32> {
    raw.and_then(|value| serde_json::from_str::<Vec<i32>>(&value).ok())
        .map(|ids| ids.into_iter().collect())
        .unwrap_or_default()
}

fn encode_ids(ids: &BTreeSet<i32>) -> String {
    let list: Vec<i32> = ids.iter().copied().collect();
    serde_json::to_string(&list).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait]
impl ClientStateStore for SqliteClientStateStore {
    async fn viewed_post_ids(&self, owner: &str) -> Result<Vec<i32>, ApiError> {
        let raw = with_conn(&self.db, |conn| read_value(conn, owner, VIEWED_POSTS_KEY))?;
        Ok(decode_ids(raw).into_iter().collect())
    }

    async fn set_viewed_post_ids(
        &self,
        owner: &str,
        ids: &[i32],
        at: NaiveDateTime,
    ) -> Result<(), ApiError> {
        let encoded = encode_ids(&ids.iter().copied().collect());
        with_conn(&self.db, |conn| {
            write_value(conn, owner, VIEWED_POSTS_KEY, &encoded, at)
        })
    }

    async fn merge_viewed_post_ids(
        &self,
        owner: &str,
        ids: &[i32],
        at: NaiveDateTime,
    ) -> Result<Vec<i32>, ApiError> {
        let merged = with_conn(&self.db, |conn| {
            conn.transaction::<_, DieselError, _>(|conn| {
                let mut stored = decode_ids(read_value(conn, owner, VIEWED_POSTS_KEY)?);
                let before = stored.len();
                stored.extend(ids.iter().copied());
                if stored.len() != before {
                    write_value(conn, owner, VIEWED_POSTS_KEY, &encode_ids(&stored), at)?;
                }
                Ok(stored)
            })
        })?;
        Ok(merged.into_iter().collect())
    }

    async fn onboarding_seen(&self, owner: &str) -> Result<bool, ApiError> {
        let raw = with_conn(&self.db, |conn| read_value(conn, owner, ONBOARDING_KEY))?;
        Ok(raw.as_deref() == Some("true"))
    }

    async fn set_onboarding_seen(
        &self,
        owner: &str,
        seen: bool,
        at: NaiveDateTime,
    ) -> Result<(), ApiError> {
        let value = if seen { "true" } else { "false" };
        with_conn(&self.db, |conn| write_value(conn, owner, ONBOARDING_KEY, value, at))
    }
}
