/// Append-only audit trail of user actions
use crate::{
    db,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

/// Default number of entries returned by the activity feed
pub const DEFAULT_RECENT_LIMIT: i64 = 10;

/// Activity categories written by the mutation paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    DocumentEdit,
    DocumentStatusUpdate,
    ApplicationUpdate,
    LorRequest,
    LorUpdate,
    AiUsage,
    FeedbackSubmission,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::DocumentEdit => "document_edit",
            ActivityType::DocumentStatusUpdate => "document_status_update",
            ActivityType::ApplicationUpdate => "application_update",
            ActivityType::LorRequest => "lor_request",
            ActivityType::LorUpdate => "lor_update",
            ActivityType::AiUsage => "ai_usage",
            ActivityType::FeedbackSubmission => "feedback_submission",
        }
    }
}

/// Activity entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub user_id: String,
    /// Stored free-form so older categories still read back
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Value,
}

/// Activity counts per calendar period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub today: u64,
    pub this_week: u64,
    pub this_month: u64,
}

/// Activity log
#[derive(Clone)]
pub struct ActivityLog {
    db: SqlitePool,
}

impl ActivityLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append an entry
    pub async fn log(
        &self,
        user_id: &str,
        activity_type: ActivityType,
        description: &str,
        metadata: Value,
    ) -> AppResult<i64> {
        let metadata = if metadata.is_null() {
            Value::Object(Default::default())
        } else {
            metadata
        };

        let result = sqlx::query(
            r#"
            INSERT INTO user_activity (user_id, activity_type, description, timestamp, metadata)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(activity_type.as_str())
        .bind(description)
        .bind(db::now_timestamp())
        .bind(metadata.to_string())
        .execute(&self.db)
        .await?;

        tracing::debug!(
            "Logged {} activity for {}: {}",
            activity_type.as_str(),
            user_id,
            description
        );

        Ok(result.last_insert_rowid())
    }

    /// Most recent entries first
    pub async fn recent(&self, user_id: &str, limit: i64) -> AppResult<Vec<Activity>> {
        let limit = limit.clamp(1, 100);
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, activity_type, description, timestamp, metadata
            FROM user_activity
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(parse_activity).collect()
    }

    pub async fn stats(&self, user_id: &str) -> AppResult<ActivityStats> {
        self.stats_at(user_id, Utc::now()).await
    }

    /// Counts entries since the start of the day, the week (Sunday) and the month of `now`
    pub async fn stats_at(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<ActivityStats> {
        let (start_of_day, start_of_week, start_of_month) = period_starts(now);

        let rows = sqlx::query("SELECT timestamp FROM user_activity WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

        let mut stats = ActivityStats::default();
        for row in rows {
            let timestamp = db::parse_timestamp(&row.get::<String, _>("timestamp"))?;
            if timestamp >= start_of_day {
                stats.today += 1;
            }
            if timestamp >= start_of_week {
                stats.this_week += 1;
            }
            if timestamp >= start_of_month {
                stats.this_month += 1;
            }
        }

        Ok(stats)
    }
}

fn period_starts(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>, DateTime<Utc>) {
    let start_of_day = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
    let start_of_week =
        start_of_day - Duration::days(i64::from(now.weekday().num_days_from_sunday()));
    let start_of_month = start_of_day - Duration::days(i64::from(now.day0()));
    (start_of_day, start_of_week, start_of_month)
}

fn parse_activity(row: sqlx::sqlite::SqliteRow) -> AppResult<Activity> {
    let timestamp = db::parse_timestamp(&row.get::<String, _>("timestamp"))?;
    let metadata_str: String = row.get("metadata");
    let metadata = serde_json::from_str(&metadata_str)
        .map_err(|e| AppError::Internal(format!("Invalid activity metadata: {}", e)))?;

    Ok(Activity {
        id: row.get("id"),
        user_id: row.get("user_id"),
        activity_type: row.get("activity_type"),
        description: row.get("description"),
        timestamp,
        metadata,
    })
}
