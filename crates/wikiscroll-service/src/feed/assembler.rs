use super::session::FeedSession;
use crate::config::FeedConfig;
use crate::models::Post;
use crate::repositories::{FeedQuery, PostRepository};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Appended { count: usize },
    /// Another load for the same session was running; nothing was done.
    InFlight,
}

/// Which optional filters one fetch applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    pub exclude_seen: bool,
    pub restrict_categories: bool,
}

pub struct FeedAssembler<P: PostRepository> {
    posts: P,
    config: FeedConfig,
    rng: Mutex<StdRng>,
}

impl<P: PostRepository> FeedAssembler<P> {
    pub fn new(posts: P, config: FeedConfig) -> Self {
        Self::with_rng(posts, config, StdRng::from_os_rng())
    }

    /// Deterministic sampling, for reproducible feeds.
    pub fn with_seed(posts: P, config: FeedConfig, seed: u64) -> Self {
        Self::with_rng(posts, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(posts: P, config: FeedConfig, rng: StdRng) -> Self {
        Self {
            posts,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Rolls the two probabilistic gates. Neither filter is strict so the feed
    /// never starves when the unseen or preferred pool runs dry.
    pub fn plan(&self, has_exclusions: bool, has_preferences: bool) -> FetchPlan {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let exclude_seen = rng.random_bool(self.config.exclusion_probability) && has_exclusions;
        let restrict_categories =
            has_preferences && rng.random_bool(self.config.category_probability);
        FetchPlan {
            exclude_seen,
            restrict_categories,
        }
    }

    /// One page of candidates, newest first, with the plan that produced it.
    /// Store failures yield an empty page.
    #[instrument(
        skip_all,
        fields(excluded = exclude_ids.len(), preferred = preferred_categories.len())
    )]
    pub async fn fetch_page(
        &self,
        exclude_ids: &HashSet<i32>,
        preferred_categories: &[String],
    ) -> (FetchPlan, Vec<Post>) {
        let plan = self.plan(!exclude_ids.is_empty(), !preferred_categories.is_empty());
        debug!(?plan, "Fetching feed page");

        let query = FeedQuery {
            exclude_ids: plan
                .exclude_seen
                .then(|| exclude_ids.iter().copied().collect()),
            categories: plan
                .restrict_categories
                .then(|| preferred_categories.to_vec()),
            limit: self.config.page_size,
        };

        let posts = match self.posts.list_for_feed(&query).await {
            Ok(posts) => posts,
            Err(err) => {
                warn!(error = %err, "Failed to load feed page");
                Vec::new()
            }
        };
        (plan, posts)
    }

    /// Appends the next batch to `session`. A call made while another load for
    /// the same session is running does nothing.
    #[instrument(skip_all, fields(session_id = %session.id))]
    pub async fn load_more(&self, session: &FeedSession) -> LoadOutcome {
        let Some(_guard) = session.try_begin_load() else {
            debug!("Load already in flight");
            return LoadOutcome::InFlight;
        };

        let exclude_ids = session.exclusion_ids();
        let (plan, mut page) = self
            .fetch_page(&exclude_ids, session.preferred_categories())
            .await;
        page.truncate(self.config.batch_size);

        // A realtime merge may have added one of these posts while the page was
        // being fetched.
        let count = session.append_posts(page, plan.exclude_seen);
        debug!(count, total = session.post_count(), "Appended feed batch");
        LoadOutcome::Appended { count }
    }
}
