use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Ad placement and tracking knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct AdsConfig {
    /// One ad after every N posts in the main feed.
    pub feed_frequency: usize,
    /// One ad after every N posts in the library.
    pub library_frequency: usize,
    pub skip_delay: Duration,
    /// Minimum dwell for an impression to count.
    pub min_view_duration: Duration,
    pub enabled: bool,
    pub third_party_enabled: bool,
    pub network_client: String,
    pub network_feed_slot: String,
    pub network_library_slot: String,
    /// Experience points; logged only.
    pub reward_for_full_view: u32,
    pub reward_for_click: u32,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            feed_frequency: 6,
            library_frequency: 9,
            skip_delay: Duration::from_secs(5),
            min_view_duration: Duration::from_millis(1000),
            enabled: true,
            third_party_enabled: false,
            network_client: String::new(),
            network_feed_slot: String::new(),
            network_library_slot: String::new(),
            reward_for_full_view: 10,
            reward_for_click: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Rows fetched per load.
    pub page_size: i64,
    /// Rows appended to the session per load.
    pub batch_size: usize,
    pub exclusion_probability: f64,
    pub category_probability: f64,
    pub low_water_mark: usize,
    pub prefetch_interval: Duration,
    pub session_idle_timeout: Duration,
    /// Minimum dwell before a post view is recorded.
    pub post_dwell: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            batch_size: 5,
            exclusion_probability: 0.8,
            category_probability: 0.8,
            low_water_mark: 5,
            prefetch_interval: Duration::from_millis(2000),
            session_idle_timeout: Duration::from_secs(30 * 60),
            post_dwell: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub request_timeout: Duration,
    pub ads: AdsConfig,
    pub feed: FeedConfig,
    pub generator: Option<GeneratorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: ":memory:".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout: Duration::from_secs(15),
            ads: AdsConfig::default(),
            feed: FeedConfig::default(),
            generator: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let ads = AdsConfig::default();
        let feed = FeedConfig::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let generator = lookup("GENERATOR_URL")
            .filter(|v| !v.trim().is_empty())
            .map(|endpoint| GeneratorConfig {
                endpoint,
                api_key: lookup("GENERATOR_API_KEY").filter(|v| !v.is_empty()),
            });

        let config = AppConfig {
            database_url,
            bind_address: lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            ads: AdsConfig {
                feed_frequency: parse_or(&lookup, "FEED_AD_FREQUENCY", ads.feed_frequency)?,
                library_frequency: parse_or(
                    &lookup,
                    "LIBRARY_AD_FREQUENCY",
                    ads.library_frequency,
                )?,
                skip_delay: Duration::from_secs(parse_or(
                    &lookup,
                    "AD_SKIP_DELAY_SECONDS",
                    ads.skip_delay.as_secs(),
                )?),
                min_view_duration: Duration::from_millis(parse_or(
                    &lookup,
                    "MIN_VIEW_DURATION_MS",
                    ads.min_view_duration.as_millis() as u64,
                )?),
                enabled: parse_or(&lookup, "ENABLE_ADS", ads.enabled)?,
                third_party_enabled: parse_or(
                    &lookup,
                    "ENABLE_THIRD_PARTY_ADS",
                    ads.third_party_enabled,
                )?,
                network_client: lookup("AD_NETWORK_CLIENT").unwrap_or(ads.network_client),
                network_feed_slot: lookup("AD_NETWORK_FEED_SLOT").unwrap_or(ads.network_feed_slot),
                network_library_slot: lookup("AD_NETWORK_LIBRARY_SLOT")
                    .unwrap_or(ads.network_library_slot),
                reward_for_full_view: parse_or(
                    &lookup,
                    "REWARD_FOR_FULL_VIEW",
                    ads.reward_for_full_view,
                )?,
                reward_for_click: parse_or(&lookup, "REWARD_FOR_CLICK", ads.reward_for_click)?,
            },
            feed: FeedConfig {
                page_size: parse_or(&lookup, "FEED_PAGE_SIZE", feed.page_size)?,
                batch_size: parse_or(&lookup, "FEED_BATCH_SIZE", feed.batch_size)?,
                exclusion_probability: parse_probability(
                    &lookup,
                    "FEED_EXCLUSION_PROBABILITY",
                    feed.exclusion_probability,
                )?,
                category_probability: parse_probability(
                    &lookup,
                    "FEED_CATEGORY_PROBABILITY",
                    feed.category_probability,
                )?,
                low_water_mark: parse_or(&lookup, "FEED_LOW_WATER_MARK", feed.low_water_mark)?,
                prefetch_interval: Duration::from_millis(parse_or(
                    &lookup,
                    "FEED_PREFETCH_INTERVAL_MS",
                    feed.prefetch_interval.as_millis() as u64,
                )?),
                session_idle_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "FEED_SESSION_IDLE_SECS",
                    feed.session_idle_timeout.as_secs(),
                )?),
                post_dwell: Duration::from_millis(parse_or(
                    &lookup,
                    "POST_DWELL_MS",
                    feed.post_dwell.as_millis() as u64,
                )?),
            },
            generator,
        };

        if config.feed.page_size <= 0 {
            return Err(ConfigError::Invalid {
                key: "FEED_PAGE_SIZE",
                value: config.feed.page_size.to_string(),
            });
        }
        if config.feed.prefetch_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "FEED_PREFETCH_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value: raw })
        }
        _ => Ok(default),
    }
}

fn parse_probability<F>(lookup: &F, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}
