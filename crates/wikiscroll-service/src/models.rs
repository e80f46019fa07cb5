use crate::validation::{
    ValidationError, classify_category, normalize_url_lenient, require_text, validate_category,
};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::wiki_posts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub summary: String,
    pub image_url: String,
    pub source_url: String,
    pub category: Option<String>,
    pub view_count: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::wiki_posts)]
pub struct NewPost {
    pub title: String,
    pub summary: String,
    pub image_url: String,
    pub source_url: String,
    pub category: Option<String>,
}

impl NewPost {
    /// Builds a post submitted directly (seeding). Unknown categories are rejected.
    pub fn new(
        title: &str,
        summary: &str,
        image_url: &str,
        source_url: &str,
        category: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(validate_category)
            .transpose()?
            .map(str::to_string);

        Ok(NewPost {
            title: require_text("title", title)?,
            summary: require_text("summary", summary)?,
            image_url: normalize_url_lenient(image_url),
            source_url: normalize_url_lenient(source_url),
            category,
        })
    }

    /// Builds a post from generator output. Only title and summary are required;
    /// links and category are defaulted or passed through.
    pub fn from_generated(generated: &GeneratedPost) -> Result<Self, ValidationError> {
        Ok(NewPost {
            title: require_text("title", &generated.title)?,
            summary: require_text("summary", &generated.summary)?,
            image_url: normalize_url_lenient(&generated.image_url),
            source_url: normalize_url_lenient(&generated.source_url),
            category: classify_category(generated.category.as_deref()),
        })
    }
}

/// Payload produced by the external content generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPost {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::post_views)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PostView {
    pub id: i32,
    pub user_id: String,
    pub post_id: i32,
    pub viewed_at: NaiveDateTime,
    pub view_date: NaiveDate,
    /// minutes
    pub reading_time: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::post_views)]
pub struct NewPostView {
    pub user_id: String,
    pub post_id: i32,
    pub viewed_at: NaiveDateTime,
    pub view_date: NaiveDate,
    pub reading_time: i32,
}

/// One view joined with the category of the viewed post.
#[derive(Debug, Clone, PartialEq, Queryable)]
pub struct ViewRecord {
    pub post_id: i32,
    pub viewed_at: NaiveDateTime,
    pub view_date: NaiveDate,
    pub reading_time: i32,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Reading,
    Streak,
    Diversity,
}

impl fmt::Display for AchievementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AchievementCategory::Reading => write!(f, "reading"),
            AchievementCategory::Streak => write!(f, "streak"),
            AchievementCategory::Diversity => write!(f, "diversity"),
        }
    }
}

impl FromStr for AchievementCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reading" => Ok(AchievementCategory::Reading),
            "streak" => Ok(AchievementCategory::Streak),
            "diversity" => Ok(AchievementCategory::Diversity),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::achievements)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Achievement {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub threshold: i32,
    pub category: String,
}

impl Achievement {
    pub fn kind(&self) -> Option<AchievementCategory> {
        self.category.parse().ok()
    }
}

/// One-time celebration shown when an achievement unlocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnlockNotification {
    pub achievement_id: i32,
    pub title: String,
    pub message: String,
    pub category: String,
}

impl From<&Achievement> for UnlockNotification {
    fn from(achievement: &Achievement) -> Self {
        UnlockNotification {
            achievement_id: achievement.id,
            title: "Achievement unlocked!".to_string(),
            message: format!(
                "{} {}: {}",
                achievement.icon, achievement.name, achievement.description
            ),
            category: achievement.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::ad_impressions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AdImpression {
    pub id: i32,
    pub user_id: String,
    pub ad_id: String,
    pub viewed_at: NaiveDateTime,
    pub skipped: bool,
    pub clicked: bool,
    pub view_duration_ms: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::ad_impressions)]
pub struct NewAdImpression {
    pub user_id: String,
    pub ad_id: String,
    pub viewed_at: NaiveDateTime,
    pub skipped: bool,
    pub clicked: bool,
    pub view_duration_ms: i64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProfileRow {
    pub id: String,
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub preferred_categories: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(treat_none_as_null = true)]
pub struct ProfileRecord {
    pub id: String,
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub preferred_categories: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub user_id: String,
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub preferred_categories: Vec<String>,
}

impl Profile {
    pub fn empty(user_id: &str) -> Self {
        Profile {
            user_id: user_id.to_string(),
            full_name: None,
            birth_date: None,
            preferred_categories: Vec::new(),
        }
    }
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        // A malformed stored list is treated as "no preferences".
        let preferred_categories =
            serde_json::from_str(&row.preferred_categories).unwrap_or_default();
        Profile {
            user_id: row.id,
            full_name: row.full_name,
            birth_date: row.birth_date,
            preferred_categories,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub preferred_categories: Vec<String>,
}
