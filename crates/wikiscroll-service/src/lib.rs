use axum::Router;
use std::sync::Arc;

pub mod achievements;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod feed;
pub mod generator;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod schema;
pub mod shutdown;
pub mod social;
pub mod stats;
pub mod tracking;
pub mod validation;

use clock::{Clock, SystemClock};
use config::AppConfig;
use feed::{AdSupply, FeedAssembler, FeedSessions, PostEvents, StaticAdInventory};
use generator::{ContentGenerator, HttpContentGenerator};
use repositories::{
    AchievementRepository, ClientStateStore, EngagementRepository, PostRepository,
    ProfileRepository, SharedConnection, SqliteAchievementRepository, SqliteClientStateStore,
    SqliteEngagementRepository, SqlitePostRepository, SqliteProfileRepository,
};
use shutdown::ShutdownState;

/// Everything a handler can reach. Handlers are generic over it so tests can
/// swap pieces.
pub trait AppState: Clone + Send + Sync + 'static {
    type PostRepo: PostRepository;
    type EngagementRepo: EngagementRepository;
    type AchievementRepo: AchievementRepository;
    type ProfileRepo: ProfileRepository;
    type ClientState: ClientStateStore;
    type Ads: AdSupply;

    fn post_repo(&self) -> &Self::PostRepo;
    fn engagement_repo(&self) -> &Self::EngagementRepo;
    fn achievement_repo(&self) -> &Self::AchievementRepo;
    fn profile_repo(&self) -> &Self::ProfileRepo;
    fn client_state(&self) -> &Self::ClientState;
    fn ads(&self) -> &Self::Ads;
    fn feed(&self) -> &FeedAssembler<Self::PostRepo>;
    fn sessions(&self) -> &FeedSessions;
    fn post_events(&self) -> &PostEvents;
    fn shutdown(&self) -> &ShutdownState;
    fn config(&self) -> &AppConfig;
    fn clock(&self) -> &dyn Clock;
    fn generator(&self) -> Option<&dyn ContentGenerator>;
}

struct Inner {
    post_repo: SqlitePostRepository,
    engagement_repo: SqliteEngagementRepository,
    achievement_repo: SqliteAchievementRepository,
    profile_repo: SqliteProfileRepository,
    client_state: SqliteClientStateStore,
    ads: StaticAdInventory,
    feed: FeedAssembler<SqlitePostRepository>,
    sessions: FeedSessions,
    post_events: PostEvents,
    shutdown: ShutdownState,
    config: AppConfig,
    clock: Arc<dyn Clock>,
    generator: Option<Arc<dyn ContentGenerator>>,
}

#[derive(Clone)]
pub struct DefaultAppState {
    inner: Arc<Inner>,
}

impl DefaultAppState {
    /// State with default configuration over an already migrated connection.
    pub fn new(db: SharedConnection) -> Self {
        Self::builder(db).build()
    }

    pub fn builder(db: SharedConnection) -> DefaultAppStateBuilder {
        DefaultAppStateBuilder {
            db,
            config: AppConfig::default(),
            clock: None,
            rng_seed: None,
            ads: None,
            generator: None,
            shutdown: None,
        }
    }
}

pub struct DefaultAppStateBuilder {
    db: SharedConnection,
    config: AppConfig,
    clock: Option<Arc<dyn Clock>>,
    rng_seed: Option<u64>,
    ads: Option<StaticAdInventory>,
    generator: Option<Arc<dyn ContentGenerator>>,
    shutdown: Option<ShutdownState>,
}

impl DefaultAppStateBuilder {
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fixes the feed's sampling sequence.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn ads(mut self, ads: StaticAdInventory) -> Self {
        self.ads = Some(ads);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn shutdown(mut self, shutdown: ShutdownState) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn build(self) -> DefaultAppState {
        let post_repo = SqlitePostRepository::new(self.db.clone());
        let feed = match self.rng_seed {
            Some(seed) => {
                FeedAssembler::with_seed(post_repo.clone(), self.config.feed.clone(), seed)
            }
            None => FeedAssembler::new(post_repo.clone(), self.config.feed.clone()),
        };
        let generator = self.generator.or_else(|| {
            self.config
                .generator
                .as_ref()
                .map(|g| Arc::new(HttpContentGenerator::new(g)) as Arc<dyn ContentGenerator>)
        });

        DefaultAppState {
            inner: Arc::new(Inner {
                engagement_repo: SqliteEngagementRepository::new(self.db.clone()),
                achievement_repo: SqliteAchievementRepository::new(self.db.clone()),
                profile_repo: SqliteProfileRepository::new(self.db.clone()),
                client_state: SqliteClientStateStore::new(self.db),
                ads: self
                    .ads
                    .unwrap_or_else(|| StaticAdInventory::from_config(&self.config.ads)),
                post_repo,
                feed,
                sessions: FeedSessions::new(),
                post_events: PostEvents::new(),
                shutdown: self.shutdown.unwrap_or_default(),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                generator,
                config: self.config,
            }),
        }
    }
}

impl AppState for DefaultAppState {
    type PostRepo = SqlitePostRepository;
    type EngagementRepo = SqliteEngagementRepository;
    type AchievementRepo = SqliteAchievementRepository;
    type ProfileRepo = SqliteProfileRepository;
    type ClientState = SqliteClientStateStore;
    type Ads = StaticAdInventory;

    fn post_repo(&self) -> &Self::PostRepo {
        &self.inner.post_repo
    }

    fn engagement_repo(&self) -> &Self::EngagementRepo {
        &self.inner.engagement_repo
    }

    fn achievement_repo(&self) -> &Self::AchievementRepo {
        &self.inner.achievement_repo
    }

    fn profile_repo(&self) -> &Self::ProfileRepo {
        &self.inner.profile_repo
    }

    fn client_state(&self) -> &Self::ClientState {
        &self.inner.client_state
    }

    fn ads(&self) -> &Self::Ads {
        &self.inner.ads
    }

    fn feed(&self) -> &FeedAssembler<Self::PostRepo> {
        &self.inner.feed
    }

    fn sessions(&self) -> &FeedSessions {
        &self.inner.sessions
    }

    fn post_events(&self) -> &PostEvents {
        &self.inner.post_events
    }

    fn shutdown(&self) -> &ShutdownState {
        &self.inner.shutdown
    }

    fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    fn generator(&self) -> Option<&dyn ContentGenerator> {
        self.inner.generator.as_deref()
    }
}

pub fn create_app<S: AppState>(state: S) -> Router {
    routes::create_router().with_state(state)
}
