/// Graduate program applications
///
/// Creation validates the program/university pairing and the one live
/// application per program rule, then seeds the document set. User-driven
/// status changes go through `update_status`; derived changes come from the
/// document manager.
pub mod views;

use crate::{
    activity::{ActivityLog, ActivityType},
    catalog::CatalogManager,
    db,
    documents::{default_document_set, DocumentManager, DocumentRequest},
    error::{AppError, AppResult},
    metrics, ownership,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Row, SqlitePool};
use validator::Validate;

/// Application status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    NotStarted,
    Draft,
    InProgress,
    Submitted,
    Accepted,
    Rejected,
    Deleted,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::NotStarted => "not_started",
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "not_started" => Ok(ApplicationStatus::NotStarted),
            "draft" => Ok(ApplicationStatus::Draft),
            "in_progress" => Ok(ApplicationStatus::InProgress),
            "submitted" => Ok(ApplicationStatus::Submitted),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "deleted" => Ok(ApplicationStatus::Deleted),
            _ => Err(AppError::Validation(format!("Invalid application status: {}", s))),
        }
    }

    /// Statuses the document-driven derivation never overwrites
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted
                | ApplicationStatus::Accepted
                | ApplicationStatus::Rejected
                | ApplicationStatus::Deleted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationPriority {
    Low,
    Medium,
    High,
}

impl ApplicationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationPriority::Low => "low",
            ApplicationPriority::Medium => "medium",
            ApplicationPriority::High => "high",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "low" => Ok(ApplicationPriority::Low),
            "medium" => Ok(ApplicationPriority::Medium),
            "high" => Ok(ApplicationPriority::High),
            _ => Err(AppError::Validation(format!("Invalid application priority: {}", s))),
        }
    }
}

/// Application record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub user_id: String,
    pub university_id: String,
    pub program_id: String,
    pub status: ApplicationStatus,
    pub priority: ApplicationPriority,
    pub deadline: String,
    pub notes: Option<String>,
    pub submission_date: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Create request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    #[validate(length(min = 1))]
    pub university_id: String,
    #[validate(length(min = 1))]
    pub program_id: String,
    #[validate(length(min = 1, max = 64))]
    pub deadline: String,
    pub priority: ApplicationPriority,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    /// Falls back to one SOP and two LORs when absent
    #[serde(rename = "applicationDocuments")]
    pub documents: Option<Vec<DocumentRequest>>,
}

/// Status update request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    pub submission_date: Option<String>,
}

const APPLICATION_COLUMNS: &str = "SELECT id, user_id, university_id, program_id, status, priority, deadline, notes, submission_date, last_updated FROM applications";

pub async fn fetch_application(
    db: &SqlitePool,
    application_id: &str,
) -> AppResult<Option<Application>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", APPLICATION_COLUMNS))
        .bind(application_id)
        .fetch_optional(db)
        .await?;

    row.map(|row| parse_application(&row)).transpose()
}

/// All of a user's applications in creation order
pub async fn applications_for_user(db: &SqlitePool, user_id: &str) -> AppResult<Vec<Application>> {
    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? ORDER BY rowid",
        APPLICATION_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;

    rows.iter().map(parse_application).collect()
}

fn parse_application(row: &sqlx::sqlite::SqliteRow) -> AppResult<Application> {
    Ok(Application {
        id: row.get("id"),
        user_id: row.get("user_id"),
        university_id: row.get("university_id"),
        program_id: row.get("program_id"),
        status: ApplicationStatus::from_str(&row.get::<String, _>("status"))?,
        priority: ApplicationPriority::from_str(&row.get::<String, _>("priority"))?,
        deadline: row.get("deadline"),
        notes: row.get("notes"),
        submission_date: row.get("submission_date"),
        last_updated: db::parse_timestamp(&row.get::<String, _>("last_updated"))?,
    })
}

/// Application manager
#[derive(Clone)]
pub struct ApplicationManager {
    db: SqlitePool,
    catalog: CatalogManager,
    documents: DocumentManager,
    activity: ActivityLog,
}

impl ApplicationManager {
    pub fn new(
        db: SqlitePool,
        catalog: CatalogManager,
        documents: DocumentManager,
        activity: ActivityLog,
    ) -> Self {
        Self {
            db,
            catalog,
            documents,
            activity,
        }
    }

    /// Create an application with its documents; returns the new id
    pub async fn create(&self, user_id: &str, new: NewApplication) -> AppResult<String> {
        new.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        self.catalog
            .validate_program_belongs_to_university(&new.university_id, &new.program_id)
            .await?;
        self.check_existing(user_id, &new.program_id).await?;

        let id = db::new_id();
        sqlx::query(
            r#"
            INSERT INTO applications
                (id, user_id, university_id, program_id, status, priority, deadline, notes, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&new.university_id)
        .bind(&new.program_id)
        .bind(ApplicationStatus::Draft.as_str())
        .bind(new.priority.as_str())
        .bind(&new.deadline)
        .bind(new.notes.as_deref().unwrap_or(""))
        .bind(db::now_timestamp())
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            // A concurrent create got past check_existing first
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateApplication
            }
            e => AppError::Database(e),
        })?;

        let requests = new.documents.unwrap_or_else(default_document_set);
        self.documents.create_documents(&id, user_id, &requests).await?;

        self.activity
            .log(
                user_id,
                ActivityType::ApplicationUpdate,
                "Application created",
                json!({
                    "applicationId": id,
                    "oldStatus": ApplicationStatus::NotStarted.as_str(),
                    "newStatus": ApplicationStatus::Draft.as_str(),
                }),
            )
            .await?;

        metrics::record_application_created(new.priority.as_str());
        tracing::info!(
            "Created application {} for user {} ({} documents)",
            id,
            user_id,
            requests.len()
        );

        Ok(id)
    }

    /// At most one live application per (user, program)
    async fn check_existing(&self, user_id: &str, program_id: &str) -> AppResult<()> {
        let existing = sqlx::query(
            "SELECT id FROM applications WHERE user_id = ? AND program_id = ? AND status != 'deleted' LIMIT 1",
        )
        .bind(user_id)
        .bind(program_id)
        .fetch_optional(&self.db)
        .await?;

        if existing.is_some() {
            return Err(AppError::DuplicateApplication);
        }
        Ok(())
    }

    /// User-driven status change
    pub async fn update_status(
        &self,
        user_id: &str,
        application_id: &str,
        update: StatusUpdate,
    ) -> AppResult<Application> {
        update
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let mut application =
            ownership::require_ownership(&self.db, application_id, user_id).await?;
        let old_status = application.status;

        if update.notes.is_some() {
            application.notes = update.notes;
        }
        if update.status == ApplicationStatus::Submitted && update.submission_date.is_some() {
            application.submission_date = update.submission_date;
        }
        application.status = update.status;
        application.last_updated = Utc::now();

        sqlx::query(
            r#"
            UPDATE applications
            SET status = ?, notes = ?, submission_date = ?, last_updated = ?
            WHERE id = ?
            "#,
        )
        .bind(application.status.as_str())
        .bind(&application.notes)
        .bind(&application.submission_date)
        .bind(db::format_timestamp(application.last_updated))
        .bind(application_id)
        .execute(&self.db)
        .await?;

        self.activity
            .log(
                user_id,
                ActivityType::ApplicationUpdate,
                &format!("Application status updated to {}", application.status.as_str()),
                json!({
                    "applicationId": application_id,
                    "oldStatus": old_status.as_str(),
                    "newStatus": application.status.as_str(),
                }),
            )
            .await?;

        metrics::record_application_status_change(application.status.as_str(), "user");
        tracing::info!(
            "Application {} status {} -> {}",
            application_id,
            old_status.as_str(),
            application.status.as_str()
        );

        Ok(application)
    }

    /// Delete an application and its documents
    pub async fn delete(&self, user_id: &str, application_id: &str) -> AppResult<()> {
        let application = ownership::require_ownership(&self.db, application_id, user_id).await?;

        let mut tx = self.db.begin().await?;
        let removed = sqlx::query("DELETE FROM application_documents WHERE application_id = ?")
            .bind(application_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM applications WHERE id = ?")
            .bind(application_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.activity
            .log(
                user_id,
                ActivityType::ApplicationUpdate,
                "Application deleted",
                json!({
                    "applicationId": application_id,
                    "oldStatus": application.status.as_str(),
                    "newStatus": ApplicationStatus::Deleted.as_str(),
                }),
            )
            .await?;

        tracing::info!(
            "Deleted application {} and {} documents",
            application_id,
            removed.rows_affected()
        );

        Ok(())
    }

    pub async fn list(&self, user_id: &str) -> AppResult<Vec<Application>> {
        applications_for_user(&self.db, user_id).await
    }
}
