use crate::errors::ApiError;
use diesel::sqlite::SqliteConnection;
use std::sync::{Arc, Mutex};
use tracing::error;

pub mod achievements;
pub mod client_state;
pub mod engagement;
pub mod posts;
pub mod profiles;
pub mod traits;

pub use achievements::SqliteAchievementRepository;
pub use client_state::SqliteClientStateStore;
pub use engagement::SqliteEngagementRepository;
pub use posts::SqlitePostRepository;
pub use profiles::SqliteProfileRepository;
pub use traits::{
    AchievementRepository, ClientStateStore, EngagementRepository, FeedQuery, LibraryQuery,
    LibrarySort, ListPostsResult, PostRepository, ProfileRepository, Reaction, ViewedScope,
};

pub type SharedConnection = Arc<Mutex<SqliteConnection>>;

/// Runs `f` with the shared connection locked. The lock is never held across an await.
pub(crate) fn with_conn<T, F>(db: &SharedConnection, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, diesel::result::Error>,
{
    let mut conn = db.lock().map_err(|_| {
        error!("Database connection mutex poisoned");
        ApiError::InternalError
    })?;
    Ok(f(&mut *conn)?)
}
