use crate::achievements::{AchievementStatus, Metrics, catalogue, current_streak};
use crate::errors::ApiError;
use crate::models::ViewRecord;
use crate::repositories::{AchievementRepository, EngagementRepository, Reaction};
use crate::validation::UNCATEGORIZED_LABEL;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

const TOP_CATEGORIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub views: u64,
}

/// Reading statistics for one user. Windows include today, so
/// `views_last_7_days` covers today and the six days before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingStats {
    pub total_views: u64,
    pub views_today: u64,
    pub views_last_7_days: u64,
    pub views_last_30_days: u64,
    pub views_last_365_days: u64,
    pub current_streak: u32,
    /// Minutes per view, rounded to one decimal.
    pub average_reading_time: f64,
    pub top_categories: Vec<CategoryCount>,
    pub like_count: u64,
    pub save_count: u64,
}

fn views_since(records: &[ViewRecord], today: NaiveDate, days: u64) -> u64 {
    let first = today
        .checked_sub_days(Days::new(days.saturating_sub(1)))
        .unwrap_or(NaiveDate::MIN);
    records
        .iter()
        .filter(|r| r.view_date >= first && r.view_date <= today)
        .count() as u64
}

fn top_categories(records: &[ViewRecord]) -> Vec<CategoryCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for record in records {
        let category = record.category.as_deref().unwrap_or(UNCATEGORIZED_LABEL);
        *counts.entry(category).or_default() += 1;
    }
    let mut ranked: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, views)| CategoryCount {
            category: category.to_string(),
            views,
        })
        .collect();
    ranked.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.category.cmp(&b.category)));
    ranked.truncate(TOP_CATEGORIES);
    ranked
}

impl ReadingStats {
    pub fn compute(
        records: &[ViewRecord],
        today: NaiveDate,
        like_count: u64,
        save_count: u64,
    ) -> Self {
        let total_views = records.len() as u64;
        let total_minutes: i64 = records.iter().map(|r| i64::from(r.reading_time)).sum();
        let average_reading_time = if total_views == 0 {
            0.0
        } else {
            (total_minutes as f64 / total_views as f64 * 10.0).round() / 10.0
        };

        Self {
            total_views,
            views_today: views_since(records, today, 1),
            views_last_7_days: views_since(records, today, 7),
            views_last_30_days: views_since(records, today, 30),
            views_last_365_days: views_since(records, today, 365),
            current_streak: current_streak(records.iter().map(|r| r.view_date), today),
            average_reading_time,
            top_categories: top_categories(records),
            like_count,
            save_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub stats: ReadingStats,
    pub achievements: Vec<AchievementStatus>,
}

pub async fn load_report<E, A>(
    engagement: &E,
    achievements: &A,
    user_id: &str,
    today: NaiveDate,
) -> Result<StatsReport, ApiError>
where
    E: EngagementRepository,
    A: AchievementRepository,
{
    let records = engagement.view_records(user_id).await?;
    let likes = engagement.count_user_reactions(Reaction::Like, user_id).await?;
    let saves = engagement.count_user_reactions(Reaction::Save, user_id).await?;

    let metrics = Metrics::from_records(&records, today);
    Ok(StatsReport {
        stats: ReadingStats::compute(&records, today, likes, saves),
        achievements: catalogue(achievements, user_id, &metrics).await?,
    })
}
