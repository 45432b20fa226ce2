/// In-app product feedback
use crate::{
    activity::{ActivityLog, ActivityType},
    db,
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;

/// Maximum characters per feedback text after sanitizing
pub const FEEDBACK_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackSubmission {
    pub positive: Option<String>,
    pub negative: Option<String>,
    pub rating: f64,
    pub device: DeviceType,
}

/// Ratings are whole numbers from 1 to 5
pub fn validate_rating(rating: f64) -> AppResult<i64> {
    if rating.fract() != 0.0 || !(1.0..=5.0).contains(&rating) {
        return Err(AppError::Validation("Rating is required.".to_string()));
    }
    Ok(rating as i64)
}

/// Drop anything between `<` and the next `>`
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

/// Strip tags and trim; empty becomes `None`, overlong text is rejected
pub fn sanitize_feedback_text(text: Option<&str>, field: &str) -> AppResult<Option<String>> {
    let Some(text) = text else {
        return Ok(None);
    };

    let sanitized = strip_tags(text).trim().to_string();
    if sanitized.is_empty() {
        return Ok(None);
    }
    if sanitized.chars().count() > FEEDBACK_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "{} exceeds maximum length of {} characters",
            field, FEEDBACK_MAX_CHARS
        )));
    }
    Ok(Some(sanitized))
}

/// Feedback manager
#[derive(Clone)]
pub struct FeedbackManager {
    db: SqlitePool,
    activity: ActivityLog,
}

impl FeedbackManager {
    pub fn new(db: SqlitePool, activity: ActivityLog) -> Self {
        Self { db, activity }
    }

    /// Store a submission and log it; returns the feedback id
    pub async fn submit(&self, user_id: &str, submission: &FeedbackSubmission) -> AppResult<String> {
        let rating = validate_rating(submission.rating)?;
        let positive = sanitize_feedback_text(submission.positive.as_deref(), "Positive feedback")?;
        let negative = sanitize_feedback_text(submission.negative.as_deref(), "Negative feedback")?;

        let id = db::new_id();
        sqlx::query(
            r#"
            INSERT INTO feedback (id, user_id, positive, negative, rating, device, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(positive)
        .bind(negative)
        .bind(rating)
        .bind(submission.device.as_str())
        .bind(db::now_timestamp())
        .execute(&self.db)
        .await?;

        self.activity
            .log(user_id, ActivityType::FeedbackSubmission, "Submitted feedback", json!({}))
            .await?;

        tracing::info!("Feedback {} submitted by {} (rating {})", id, user_id, rating);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, test_pool};
    use sqlx::Row;

    #[test]
    fn test_rating_bounds() {
        assert_eq!(validate_rating(1.0).unwrap(), 1);
        assert_eq!(validate_rating(5.0).unwrap(), 5);
        assert!(validate_rating(0.0).is_err());
        assert!(validate_rating(6.0).is_err());
        assert!(validate_rating(3.5).is_err());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(
            sanitize_feedback_text(Some("  <b>Great</b> app<script>x</script> "), "Positive feedback")
                .unwrap()
                .as_deref(),
            Some("Great appx")
        );
        assert_eq!(sanitize_feedback_text(Some(" <br/> "), "f").unwrap(), None);
        assert_eq!(sanitize_feedback_text(None, "f").unwrap(), None);
        assert_eq!(sanitize_feedback_text(Some("a < b"), "f").unwrap().as_deref(), Some("a < b"));

        let long = "x".repeat(FEEDBACK_MAX_CHARS + 1);
        assert!(matches!(
            sanitize_feedback_text(Some(&long), "Negative feedback"),
            Err(AppError::Validation(msg)) if msg.starts_with("Negative feedback")
        ));
        let exact = "x".repeat(FEEDBACK_MAX_CHARS);
        assert!(sanitize_feedback_text(Some(&exact), "f").is_ok());
    }

    #[tokio::test]
    async fn test_submit_logs_activity() {
        let pool = test_pool().await;
        let user = fixtures::user(&pool, "ext-1").await;
        let activity = ActivityLog::new(pool.clone());
        let feedback = FeedbackManager::new(pool.clone(), activity.clone());

        let id = feedback
            .submit(
                &user,
                &FeedbackSubmission {
                    positive: Some("Helpful deadlines view".to_string()),
                    negative: Some("   ".to_string()),
                    rating: 4.0,
                    device: DeviceType::Desktop,
                },
            )
            .await
            .unwrap();

        let row = sqlx::query("SELECT positive, negative, rating FROM feedback WHERE id = ?")
            .bind(&id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<Option<String>, _>("negative"), None);
        assert_eq!(row.get::<i64, _>("rating"), 4);

        let recent = activity.recent(&user, 1).await.unwrap();
        assert_eq!(recent[0].activity_type, "feedback_submission");

        let rejected = feedback
            .submit(
                &user,
                &FeedbackSubmission {
                    positive: None,
                    negative: None,
                    rating: 9.0,
                    device: DeviceType::Mobile,
                },
            )
            .await;
        assert!(matches!(rejected, Err(AppError::Validation(_))));
    }
}
