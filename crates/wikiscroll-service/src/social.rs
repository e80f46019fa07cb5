use crate::errors::ApiError;
use crate::models::Post;
use crate::repositories::{EngagementRepository, PostRepository, Reaction};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, instrument};
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionState {
    pub post_id: i32,
    pub reaction: Reaction,
    pub active: bool,
}

async fn ensure_post<P: PostRepository>(posts: &P, post_id: i32) -> Result<(), ApiError> {
    match posts.find_by_id(post_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound),
    }
}

/// Flips a like or save in one store transaction.
#[instrument(skip(posts, engagement))]
pub async fn toggle_reaction<P, E>(
    posts: &P,
    engagement: &E,
    reaction: Reaction,
    user_id: &str,
    post_id: i32,
    now: NaiveDateTime,
) -> Result<ReactionState, ApiError>
where
    P: PostRepository,
    E: EngagementRepository,
{
    ensure_post(posts, post_id).await?;
    let active = engagement
        .toggle_reaction(reaction, user_id, post_id, now)
        .await?;
    info!(active, "Reaction toggled");
    Ok(ReactionState {
        post_id,
        reaction,
        active,
    })
}

/// Idempotent like/save (`active = true`) or unlike/unsave (`active = false`).
#[instrument(skip(posts, engagement))]
pub async fn set_reaction<P, E>(
    posts: &P,
    engagement: &E,
    reaction: Reaction,
    user_id: &str,
    post_id: i32,
    active: bool,
    now: NaiveDateTime,
) -> Result<ReactionState, ApiError>
where
    P: PostRepository,
    E: EngagementRepository,
{
    ensure_post(posts, post_id).await?;
    engagement
        .set_reaction(reaction, user_id, post_id, active, now)
        .await?;
    info!("Reaction set");
    Ok(ReactionState {
        post_id,
        reaction,
        active,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementSummary {
    pub post_id: i32,
    pub like_count: u64,
    pub save_count: u64,
    /// Only present for an authenticated caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,
}

pub async fn engagement_summary<P, E>(
    posts: &P,
    engagement: &E,
    post_id: i32,
    user_id: Option<&str>,
) -> Result<EngagementSummary, ApiError>
where
    P: PostRepository,
    E: EngagementRepository,
{
    ensure_post(posts, post_id).await?;
    let (liked, saved) = match user_id {
        Some(user) => (
            Some(engagement.has_reaction(Reaction::Like, user, post_id).await?),
            Some(engagement.has_reaction(Reaction::Save, user, post_id).await?),
        ),
        None => (None, None),
    };
    Ok(EngagementSummary {
        post_id,
        like_count: engagement.count_reactions(Reaction::Like, post_id).await?,
        save_count: engagement.count_reactions(Reaction::Save, post_id).await?,
        liked,
        saved,
    })
}

/// Links for sharing a post on the usual networks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareTargets {
    pub url: String,
    pub title: String,
    pub copy_text: String,
    pub facebook: String,
    pub twitter: String,
    pub linkedin: String,
    pub whatsapp: String,
    pub telegram: String,
}

fn share_link(base: &str, params: &[(&str, &str)]) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{base}?{query}")
}

impl ShareTargets {
    pub fn for_post(post: &Post) -> Self {
        let url = post.source_url.as_str();
        let title = post.title.as_str();
        let copy_text = format!("{title} - {url}");
        Self {
            facebook: share_link("https://www.facebook.com/sharer/sharer.php", &[("u", url)]),
            twitter: share_link(
                "https://twitter.com/intent/tweet",
                &[("text", title), ("url", url)],
            ),
            linkedin: share_link(
                "https://www.linkedin.com/sharing/share-offsite/",
                &[("url", url)],
            ),
            whatsapp: share_link("https://wa.me/", &[("text", copy_text.as_str())]),
            telegram: share_link(
                "https://t.me/share/url",
                &[("url", url), ("text", title)],
            ),
            url: url.to_string(),
            title: title.to_string(),
            copy_text,
        }
    }
}
