use crate::errors::ApiError;
use crate::models::{Achievement, AchievementCategory, UnlockNotification, ViewRecord};
use crate::repositories::{AchievementRepository, EngagementRepository};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, instrument};

/// Consecutive days with at least one view, walking back from `today`.
/// Zero when there is no view today.
pub fn current_streak<I>(view_dates: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let days: HashSet<NaiveDate> = view_dates.into_iter().collect();
    let mut streak = 0;
    let mut day = today;
    while days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

pub fn distinct_categories(records: &[ViewRecord]) -> usize {
    records
        .iter()
        .filter_map(|record| record.category.as_deref())
        .collect::<BTreeSet<_>>()
        .len()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub reading: u64,
    pub streak: u32,
    pub diversity: usize,
}

impl Metrics {
    pub fn from_records(records: &[ViewRecord], today: NaiveDate) -> Self {
        Self {
            reading: records.len() as u64,
            streak: current_streak(records.iter().map(|r| r.view_date), today),
            diversity: distinct_categories(records),
        }
    }

    pub fn value_for(&self, category: AchievementCategory) -> u64 {
        match category {
            AchievementCategory::Reading => self.reading,
            AchievementCategory::Streak => u64::from(self.streak),
            AchievementCategory::Diversity => self.diversity as u64,
        }
    }

    pub fn reaches(&self, achievement: &Achievement) -> bool {
        achievement
            .kind()
            .is_some_and(|kind| self.value_for(kind) >= achievement.threshold.max(0) as u64)
    }
}

/// Unlocks every achievement the user now qualifies for. Each unlock yields one
/// notification; re-running with no new views yields none.
#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn evaluate<E, A>(
    engagement: &E,
    achievements: &A,
    user_id: &str,
    now: NaiveDateTime,
) -> Result<Vec<UnlockNotification>, ApiError>
where
    E: EngagementRepository,
    A: AchievementRepository,
{
    let records = engagement.view_records(user_id).await?;
    let metrics = Metrics::from_records(&records, now.date());
    debug!(?metrics, "Evaluating achievements");

    let unlocked: HashSet<i32> = achievements
        .unlocked(user_id)
        .await?
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    let mut notifications = Vec::new();
    for achievement in achievements.all().await? {
        if unlocked.contains(&achievement.id) || !metrics.reaches(&achievement) {
            continue;
        }
        if achievements.unlock(user_id, achievement.id, now).await? {
            info!(
                achievement_id = achievement.id,
                name = %achievement.name,
                "Achievement unlocked"
            );
            notifications.push(UnlockNotification::from(&achievement));
        }
    }

    Ok(notifications)
}

/// One catalogue entry with the user's progress.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub progress: u64,
    pub unlocked_at: Option<NaiveDateTime>,
}

/// Full catalogue, unlocked entries first (most recent first), then by
/// category and threshold.
pub async fn catalogue<A: AchievementRepository>(
    achievements: &A,
    user_id: &str,
    metrics: &Metrics,
) -> Result<Vec<AchievementStatus>, ApiError> {
    let unlocked: HashMap<i32, NaiveDateTime> =
        achievements.unlocked(user_id).await?.into_iter().collect();

    let mut entries: Vec<AchievementStatus> = achievements
        .all()
        .await?
        .into_iter()
        .map(|achievement| AchievementStatus {
            progress: achievement
                .kind()
                .map(|kind| metrics.value_for(kind))
                .unwrap_or_default(),
            unlocked_at: unlocked.get(&achievement.id).copied(),
            achievement,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.unlocked_at
            .is_some()
            .cmp(&a.unlocked_at.is_some())
            .then_with(|| b.unlocked_at.cmp(&a.unlocked_at))
            .then_with(|| a.achievement.category.cmp(&b.achievement.category))
            .then_with(|| a.achievement.threshold.cmp(&b.achievement.threshold))
    });
    Ok(entries)
}
