use super::interleave::assembled_len;
use crate::models::Post;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountedItem {
    Post(i32),
    Ad(String),
}

/// One continuous visibility period of a feed position.
#[derive(Debug, Clone)]
pub struct Mount {
    pub item: MountedItem,
    pub started_at: DateTime<Utc>,
    pub recorded: bool,
    /// Day of the view event written during this mount, if any.
    pub view_date: Option<NaiveDate>,
}

#[derive(Debug, Default)]
struct FeedState {
    posts: Vec<Post>,
    loaded_ids: HashSet<i32>,
    viewed_ids: HashSet<i32>,
    position: usize,
    last_activity: DateTime<Utc>,
}

/// Server-side state of one client's scrolling feed.
#[derive(Debug)]
pub struct FeedSession {
    pub id: String,
    /// Key for durable client state: the user id, or the anonymous device id.
    pub owner_key: String,
    pub user_id: Option<String>,
    preferred_categories: Vec<String>,
    state: Mutex<FeedState>,
    mounts: Mutex<HashMap<usize, Mount>>,
    loading: AtomicBool,
}

/// Clears the in-flight flag when the load finishes, however it finishes.
pub struct LoadGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl FeedSession {
    pub fn new(
        id: String,
        owner_key: String,
        user_id: Option<String>,
        preferred_categories: Vec<String>,
        viewed_ids: impl IntoIterator<Item = i32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_key,
            user_id,
            preferred_categories,
            state: Mutex::new(FeedState {
                viewed_ids: viewed_ids.into_iter().collect(),
                last_activity: now,
                ..FeedState::default()
            }),
            mounts: Mutex::new(HashMap::new()),
            loading: AtomicBool::new(false),
        }
    }

    pub fn preferred_categories(&self) -> &[String] {
        &self.preferred_categories
    }

    /// Returns `None` while another load is in flight.
    pub fn try_begin_load(&self) -> Option<LoadGuard<'_>> {
        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| LoadGuard {
                flag: &self.loading,
            })
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Ids already loaded into this session plus ids the client has viewed.
    pub fn exclusion_ids(&self) -> HashSet<i32> {
        let state = lock(&self.state);
        state.loaded_ids.union(&state.viewed_ids).copied().collect()
    }

    /// Appends a fetched batch and returns how many posts were added. With
    /// `skip_loaded` set, posts already in the session are dropped; a batch
    /// fetched without exclusion may repeat posts on purpose.
    pub fn append_posts(&self, posts: Vec<Post>, skip_loaded: bool) -> usize {
        let mut state = lock(&self.state);
        let mut count = 0;
        for post in posts {
            if !state.loaded_ids.insert(post.id) && skip_loaded {
                continue;
            }
            state.posts.push(post);
            count += 1;
        }
        count
    }

    /// Adds a post pushed by the realtime channel unless it is already loaded.
    pub fn merge_realtime(&self, post: Post) -> bool {
        let mut state = lock(&self.state);
        if !state.loaded_ids.insert(post.id) {
            return false;
        }
        state.posts.push(post);
        true
    }

    pub fn posts(&self) -> Vec<Post> {
        lock(&self.state).posts.clone()
    }

    pub fn post_at(&self, index: usize) -> Option<Post> {
        lock(&self.state).posts.get(index).cloned()
    }

    pub fn post_count(&self) -> usize {
        lock(&self.state).posts.len()
    }

    pub fn position(&self) -> usize {
        lock(&self.state).position
    }

    pub fn set_position(&self, position: usize) {
        lock(&self.state).position = position;
    }

    /// Items left below the current position in the assembled sequence.
    pub fn remaining(&self, ad_frequency: usize, ads_available: usize) -> usize {
        let state = lock(&self.state);
        assembled_len(state.posts.len(), ad_frequency, ads_available).saturating_sub(state.position)
    }

    pub fn touch(&self, now: DateTime<Utc>) {
        lock(&self.state).last_activity = now;
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        lock(&self.state).last_activity
    }

    /// Returns true when the post was not yet in the viewed set.
    pub fn mark_viewed(&self, post_id: i32) -> bool {
        lock(&self.state).viewed_ids.insert(post_id)
    }

    pub fn has_viewed(&self, post_id: i32) -> bool {
        lock(&self.state).viewed_ids.contains(&post_id)
    }

    /// Starts a mount for `position` unless one is already running.
    pub fn mount(&self, position: usize, item: MountedItem, now: DateTime<Utc>) -> Mount {
        lock(&self.mounts)
            .entry(position)
            .or_insert_with(|| Mount {
                item,
                started_at: now,
                recorded: false,
                view_date: None,
            })
            .clone()
    }

    pub fn current_mount(&self, position: usize) -> Option<Mount> {
        lock(&self.mounts).get(&position).cloned()
    }

    /// Flags the mount as recorded. Returns false if it was already recorded
    /// or is not mounted, so only one caller wins.
    pub fn claim_mount(&self, position: usize) -> bool {
        match lock(&self.mounts).get_mut(&position) {
            Some(mount) if !mount.recorded => {
                mount.recorded = true;
                true
            }
            _ => false,
        }
    }

    pub fn set_mount_view_date(&self, position: usize, date: NaiveDate) {
        if let Some(mount) = lock(&self.mounts).get_mut(&position) {
            mount.view_date = Some(date);
        }
    }

    pub fn unmount(&self, position: usize) -> Option<Mount> {
        lock(&self.mounts).remove(&position)
    }
}

/// Open feed sessions by id.
#[derive(Debug, Clone, Default)]
pub struct FeedSessions {
    inner: Arc<RwLock<HashMap<String, Arc<FeedSession>>>>,
}

impl FeedSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<FeedSession>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<FeedSession>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<FeedSession>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
