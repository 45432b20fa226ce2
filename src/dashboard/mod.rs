/// Dashboard summary
///
/// Read-only rollup of a user's applications, documents, credits and most
/// recent activity.
use crate::{
    activity::{Activity, ActivityLog},
    applications::{applications_for_user, views::parse_deadline, ApplicationStatus},
    credits::{CreditLedger, CreditSummary},
    documents::{documents_for_user, DocumentStatus},
    error::AppResult,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// Activities shown on the dashboard
pub const DASHBOARD_ACTIVITY_LIMIT: i64 = 12;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationTotals {
    pub total: usize,
    pub submitted: usize,
    pub in_progress: usize,
    pub next_deadline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub total: usize,
    pub average_progress: i64,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub applications: ApplicationTotals,
    pub documents: DocumentTotals,
    pub credits: CreditSummary,
    pub recent_activity: Vec<Activity>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: SqlitePool,
    credits: CreditLedger,
    activity: ActivityLog,
}

impl DashboardService {
    pub fn new(db: SqlitePool, credits: CreditLedger, activity: ActivityLog) -> Self {
        Self {
            db,
            credits,
            activity,
        }
    }

    pub async fn summary(&self, user_id: &str) -> AppResult<DashboardSummary> {
        self.summary_at(user_id, Utc::now()).await
    }

    /// Upcoming deadlines are judged against `now`
    pub async fn summary_at(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<DashboardSummary> {
        let applications = applications_for_user(&self.db, user_id).await?;

        let next_deadline = applications
            .iter()
            .filter(|a| !a.status.is_terminal() && a.status != ApplicationStatus::Submitted)
            .filter_map(|a| parse_deadline(&a.deadline).map(|at| (at, &a.deadline)))
            .filter(|(at, _)| *at >= now)
            .min_by_key(|(at, _)| *at)
            .map(|(_, deadline)| deadline.clone());

        let application_totals = ApplicationTotals {
            total: applications.len(),
            submitted: applications
                .iter()
                .filter(|a| a.status == ApplicationStatus::Submitted)
                .count(),
            in_progress: applications
                .iter()
                .filter(|a| a.status == ApplicationStatus::InProgress)
                .count(),
            next_deadline,
        };

        let documents = documents_for_user(&self.db, user_id).await?;
        let average_progress = if documents.is_empty() {
            0
        } else {
            let sum: i64 = documents.iter().map(|d| d.progress).sum();
            (sum as f64 / documents.len() as f64).round() as i64
        };
        let document_totals = DocumentTotals {
            total: documents.len(),
            average_progress,
            completed: documents
                .iter()
                .filter(|d| d.status == DocumentStatus::Complete)
                .count(),
        };

        let credits = self.credits.get_balance(user_id).await?.into();
        let recent_activity = self.activity.recent(user_id, DASHBOARD_ACTIVITY_LIMIT).await?;

        Ok(DashboardSummary {
            applications: application_totals,
            documents: document_totals,
            credits,
            recent_activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        activity::ActivityType,
        applications::{ApplicationManager, ApplicationPriority, NewApplication, StatusUpdate},
        catalog::CatalogManager,
        config::CreditsConfig,
        db::{fixtures, test_pool},
        documents::{documents_for_application, DocumentManager},
    };
    use chrono::TimeZone;
    use serde_json::json;

    fn new_application(university_id: &str, program_id: &str, deadline: &str) -> NewApplication {
        NewApplication {
            university_id: university_id.to_string(),
            program_id: program_id.to_string(),
            deadline: deadline.to_string(),
            priority: ApplicationPriority::Medium,
            notes: None,
            documents: None,
        }
    }

    #[tokio::test]
    async fn test_empty_dashboard() {
        let pool = test_pool().await;
        let user = fixtures::user(&pool, "ext-1").await;
        let activity = ActivityLog::new(pool.clone());
        let credits = CreditLedger::new(pool.clone(), CreditsConfig::default());
        let dashboard = DashboardService::new(pool, credits, activity);

        let summary = dashboard.summary(&user).await.unwrap();
        assert_eq!(summary.applications, ApplicationTotals::default());
        assert_eq!(summary.documents, DocumentTotals::default());
        assert_eq!(summary.credits.remaining_credits, 500);
        assert!(summary.recent_activity.is_empty());
    }

    #[tokio::test]
    async fn test_summary_rollup() {
        let pool = test_pool().await;
        let ids = fixtures::catalog(&pool).await;
        let user = fixtures::user(&pool, "ext-1").await;
        let activity = ActivityLog::new(pool.clone());
        let documents = DocumentManager::new(pool.clone(), activity.clone());
        let applications = ApplicationManager::new(
            pool.clone(),
            CatalogManager::new(pool.clone()),
            documents.clone(),
            activity.clone(),
        );
        let credits = CreditLedger::new(pool.clone(), CreditsConfig::default());
        let dashboard = DashboardService::new(pool.clone(), credits, activity.clone());

        applications
            .create(&user, new_application(&ids.mit, &ids.mit_cs_ms, "2024-01-01"))
            .await
            .unwrap();
        applications
            .create(&user, new_application(&ids.stanford, &ids.stanford_mba, "2025-03-01"))
            .await
            .unwrap();
        let soon = applications
            .create(&user, new_application(&ids.berkeley, &ids.berkeley_ds_ms, "2025-01-15"))
            .await
            .unwrap();
        let submitted = applications
            .create(&user, new_application(&ids.mit, &ids.mit_cs_phd, "2024-12-20"))
            .await
            .unwrap();

        applications
            .update_status(
                &user,
                &submitted,
                StatusUpdate {
                    status: ApplicationStatus::Submitted,
                    notes: None,
                    submission_date: None,
                },
            )
            .await
            .unwrap();

        let docs = documents_for_application(&pool, &soon).await.unwrap();
        documents
            .set_status(&user, &docs[0].id, DocumentStatus::Complete)
            .await
            .unwrap();
        documents
            .set_status(&user, &docs[1].id, DocumentStatus::Draft)
            .await
            .unwrap();

        for i in 0..20 {
            activity
                .log(&user, ActivityType::DocumentEdit, &format!("edit {}", i), json!({}))
                .await
                .unwrap();
        }

        let now = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        let summary = dashboard.summary_at(&user, now).await.unwrap();

        assert_eq!(summary.applications.total, 4);
        assert_eq!(summary.applications.submitted, 1);
        assert_eq!(summary.applications.in_progress, 1);
        assert_eq!(summary.applications.next_deadline.as_deref(), Some("2025-01-15"));

        // 12 documents, one complete (100) and one draft (33)
        assert_eq!(summary.documents.total, 12);
        assert_eq!(summary.documents.completed, 1);
        assert_eq!(summary.documents.average_progress, 11);

        assert_eq!(summary.recent_activity.len(), DASHBOARD_ACTIVITY_LIMIT as usize);
        assert_eq!(summary.recent_activity[0].description, "edit 19");
    }
}
