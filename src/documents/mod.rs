/// Application documents (statements of purpose, letters of recommendation)
///
/// A document belongs to one application and is denormalized onto the same
/// user. Status changes recompute the document's progress and then re-derive
/// the parent application's status; adding a document does not.
pub mod status;

use crate::{
    activity::{ActivityLog, ActivityType},
    applications::{self, ApplicationStatus},
    db,
    error::{AppError, AppResult},
    metrics, ownership,
};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Row, SqlitePool};
use validator::Validate;

use status::derive_status;

/// Document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Sop,
    Lor,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Sop => "sop",
            DocumentType::Lor => "lor",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "sop" => Ok(DocumentType::Sop),
            "lor" => Ok(DocumentType::Lor),
            _ => Err(AppError::Validation(format!("Invalid document type: {}", s))),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocumentType::Sop => "Statement of Purpose",
            DocumentType::Lor => "Letter of Recommendation",
        }
    }
}

/// Document workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    NotStarted,
    Draft,
    InReview,
    Complete,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::NotStarted => "not_started",
            DocumentStatus::Draft => "draft",
            DocumentStatus::InReview => "in_review",
            DocumentStatus::Complete => "complete",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "not_started" => Ok(DocumentStatus::NotStarted),
            "draft" => Ok(DocumentStatus::Draft),
            "in_review" => Ok(DocumentStatus::InReview),
            "complete" => Ok(DocumentStatus::Complete),
            _ => Err(AppError::Validation(format!("Invalid document status: {}", s))),
        }
    }

    /// Progress percentage shown for this status
    pub fn progress(&self) -> i64 {
        match self {
            DocumentStatus::NotStarted => 0,
            DocumentStatus::Draft => 33,
            DocumentStatus::InReview => 66,
            DocumentStatus::Complete => 100,
        }
    }
}

/// Document record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDocument {
    pub id: String,
    pub application_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub title: String,
    pub status: DocumentStatus,
    pub progress: i64,
    pub content: String,
    pub recommender_name: Option<String>,
    pub recommender_email: Option<String>,
    pub last_edited: DateTime<Utc>,
}

/// Requested document when creating an application.
///
/// The requested status is accepted but not honored: new documents always
/// start as not started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequest {
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    #[serde(default)]
    pub status: Option<DocumentStatus>,
}

impl DocumentRequest {
    pub fn new(document_type: DocumentType) -> Self {
        Self {
            document_type,
            status: Some(DocumentStatus::NotStarted),
        }
    }
}

/// One SOP and two LORs
pub fn default_document_set() -> Vec<DocumentRequest> {
    vec![
        DocumentRequest::new(DocumentType::Sop),
        DocumentRequest::new(DocumentType::Lor),
        DocumentRequest::new(DocumentType::Lor),
    ]
}

/// Recommender details on a letter of recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommender {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecommenderUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
}

const DOCUMENT_COLUMNS: &str = "SELECT id, application_id, user_id, document_type, title, status, progress, content, recommender_name, recommender_email, last_edited FROM application_documents";

pub async fn fetch_document(
    db: &SqlitePool,
    document_id: &str,
) -> AppResult<Option<ApplicationDocument>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", DOCUMENT_COLUMNS))
        .bind(document_id)
        .fetch_optional(db)
        .await?;

    row.map(|row| parse_document(&row)).transpose()
}

/// Documents of one application in creation order
pub async fn documents_for_application(
    db: &SqlitePool,
    application_id: &str,
) -> AppResult<Vec<ApplicationDocument>> {
    let rows = sqlx::query(&format!(
        "{} WHERE application_id = ? ORDER BY rowid",
        DOCUMENT_COLUMNS
    ))
    .bind(application_id)
    .fetch_all(db)
    .await?;

    rows.iter().map(parse_document).collect()
}

pub async fn documents_for_user(db: &SqlitePool, user_id: &str) -> AppResult<Vec<ApplicationDocument>> {
    let rows = sqlx::query(&format!("{} WHERE user_id = ? ORDER BY rowid", DOCUMENT_COLUMNS))
        .bind(user_id)
        .fetch_all(db)
        .await?;

    rows.iter().map(parse_document).collect()
}

fn parse_document(row: &sqlx::sqlite::SqliteRow) -> AppResult<ApplicationDocument> {
    Ok(ApplicationDocument {
        id: row.get("id"),
        application_id: row.get("application_id"),
        user_id: row.get("user_id"),
        document_type: DocumentType::from_str(&row.get::<String, _>("document_type"))?,
        title: row.get("title"),
        status: DocumentStatus::from_str(&row.get::<String, _>("status"))?,
        progress: row.get("progress"),
        content: row.get("content"),
        recommender_name: row.get("recommender_name"),
        recommender_email: row.get("recommender_email"),
        last_edited: db::parse_timestamp(&row.get::<String, _>("last_edited"))?,
    })
}

/// Document manager
#[derive(Clone)]
pub struct DocumentManager {
    db: SqlitePool,
    activity: ActivityLog,
}

impl DocumentManager {
    pub fn new(db: SqlitePool, activity: ActivityLog) -> Self {
        Self { db, activity }
    }

    /// Insert a batch of documents for an application concurrently
    pub async fn create_documents(
        &self,
        application_id: &str,
        user_id: &str,
        requests: &[DocumentRequest],
    ) -> AppResult<Vec<ApplicationDocument>> {
        try_join_all(
            requests
                .iter()
                .map(|request| self.insert_document(application_id, user_id, request.document_type)),
        )
        .await
    }

    /// Add one document to an existing application
    pub async fn create_document(
        &self,
        user_id: &str,
        application_id: &str,
        document_type: DocumentType,
    ) -> AppResult<ApplicationDocument> {
        ownership::require_ownership(&self.db, application_id, user_id).await?;
        let document = self
            .insert_document(application_id, user_id, document_type)
            .await?;
        Ok(document)
    }

    async fn insert_document(
        &self,
        application_id: &str,
        user_id: &str,
        document_type: DocumentType,
    ) -> AppResult<ApplicationDocument> {
        let document = ApplicationDocument {
            id: db::new_id(),
            application_id: application_id.to_string(),
            user_id: user_id.to_string(),
            document_type,
            title: document_type.title().to_string(),
            status: DocumentStatus::NotStarted,
            progress: 0,
            content: String::new(),
            recommender_name: None,
            recommender_email: None,
            last_edited: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO application_documents
                (id, application_id, user_id, document_type, title, status, progress, content, last_edited)
            VALUES (?, ?, ?, ?, ?, ?, 0, '', ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.application_id)
        .bind(&document.user_id)
        .bind(document_type.as_str())
        .bind(&document.title)
        .bind(document.status.as_str())
        .bind(db::format_timestamp(document.last_edited))
        .execute(&self.db)
        .await?;

        self.activity
            .log(
                user_id,
                ActivityType::DocumentStatusUpdate,
                &format!("Document created: {}", document.title),
                json!({
                    "documentId": document.id,
                    "oldStatus": DocumentStatus::NotStarted.as_str(),
                    "newStatus": DocumentStatus::NotStarted.as_str(),
                }),
            )
            .await?;

        tracing::debug!(
            "Created {} document {} for application {}",
            document_type.as_str(),
            document.id,
            application_id
        );

        Ok(document)
    }

    pub async fn get_document(&self, user_id: &str, document_id: &str) -> AppResult<ApplicationDocument> {
        let (document, _) =
            ownership::require_document_ownership(&self.db, document_id, user_id).await?;
        Ok(document)
    }

    pub async fn list_for_application(
        &self,
        user_id: &str,
        application_id: &str,
    ) -> AppResult<Vec<ApplicationDocument>> {
        ownership::require_ownership(&self.db, application_id, user_id).await?;
        documents_for_application(&self.db, application_id).await
    }

    /// Set a document's status and progress, then re-derive the application status
    pub async fn set_status(
        &self,
        user_id: &str,
        document_id: &str,
        new_status: DocumentStatus,
    ) -> AppResult<ApplicationDocument> {
        let (mut document, application) =
            ownership::require_document_ownership(&self.db, document_id, user_id).await?;

        let old_status = document.status;
        let old_progress = document.progress;
        let new_progress = new_status.progress();
        let now = Utc::now();

        sqlx::query(
            "UPDATE application_documents SET status = ?, progress = ?, last_edited = ? WHERE id = ?",
        )
        .bind(new_status.as_str())
        .bind(new_progress)
        .bind(db::format_timestamp(now))
        .bind(document_id)
        .execute(&self.db)
        .await?;

        self.activity
            .log(
                user_id,
                ActivityType::DocumentStatusUpdate,
                &format!("Document status updated to {}", new_status.as_str()),
                json!({
                    "documentId": document_id,
                    "oldStatus": old_status.as_str(),
                    "newStatus": new_status.as_str(),
                }),
            )
            .await?;

        if old_progress != new_progress {
            self.activity
                .log(
                    user_id,
                    ActivityType::DocumentEdit,
                    &format!(
                        "Document progress updated from {}% to {}%",
                        old_progress, new_progress
                    ),
                    json!({
                        "documentId": document_id,
                        "oldProgress": old_progress,
                        "newProgress": new_progress,
                    }),
                )
                .await?;
        }

        metrics::record_document_status(document.document_type.as_str(), new_status.as_str());
        tracing::info!(
            "Document {} status {} -> {}",
            document_id,
            old_status.as_str(),
            new_status.as_str()
        );

        self.derive_application_status(&application.id).await?;

        document.status = new_status;
        document.progress = new_progress;
        document.last_edited = now;
        Ok(document)
    }

    /// Recompute the application status from its documents and persist it if it moved
    pub async fn derive_application_status(&self, application_id: &str) -> AppResult<ApplicationStatus> {
        let application = applications::fetch_application(&self.db, application_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

        let statuses: Vec<DocumentStatus> = documents_for_application(&self.db, application_id)
            .await?
            .into_iter()
            .map(|d| d.status)
            .collect();

        let Some(target) = derive_status(application.status, &statuses) else {
            return Ok(application.status);
        };

        sqlx::query("UPDATE applications SET status = ?, last_updated = ? WHERE id = ?")
            .bind(target.as_str())
            .bind(db::now_timestamp())
            .bind(application_id)
            .execute(&self.db)
            .await?;

        self.activity
            .log(
                &application.user_id,
                ActivityType::ApplicationUpdate,
                &format!("Application status automatically updated to {}", target.as_str()),
                json!({
                    "applicationId": application_id,
                    "oldStatus": application.status.as_str(),
                    "newStatus": target.as_str(),
                }),
            )
            .await?;

        metrics::record_application_status_change(target.as_str(), "derived");
        tracing::info!(
            "Application {} status derived {} -> {}",
            application_id,
            application.status.as_str(),
            target.as_str()
        );

        Ok(target)
    }

    pub async fn update_content(
        &self,
        user_id: &str,
        document_id: &str,
        content: &str,
    ) -> AppResult<ApplicationDocument> {
        let (mut document, _) =
            ownership::require_document_ownership(&self.db, document_id, user_id).await?;

        document.last_edited = self.write_content(document_id, content).await?;
        document.content = content.to_string();

        self.activity
            .log(
                user_id,
                ActivityType::DocumentEdit,
                "Document content updated",
                json!({
                    "documentId": document_id,
                    "oldStatus": document.status.as_str(),
                    "newStatus": document.status.as_str(),
                }),
            )
            .await?;

        Ok(document)
    }

    /// Store generated text on a document the caller already owns
    pub(crate) async fn store_generated_content(
        &self,
        document: &ApplicationDocument,
        content: &str,
    ) -> AppResult<ApplicationDocument> {
        let last_edited = self.write_content(&document.id, content).await?;
        Ok(ApplicationDocument {
            content: content.to_string(),
            last_edited,
            ..document.clone()
        })
    }

    async fn write_content(&self, document_id: &str, content: &str) -> AppResult<DateTime<Utc>> {
        let now = Utc::now();
        sqlx::query("UPDATE application_documents SET content = ?, last_edited = ? WHERE id = ?")
            .bind(content)
            .bind(db::format_timestamp(now))
            .bind(document_id)
            .execute(&self.db)
            .await?;
        Ok(now)
    }

    pub async fn get_recommender(&self, user_id: &str, document_id: &str) -> AppResult<Recommender> {
        let document = self.get_document(user_id, document_id).await?;
        require_lor(&document, "get")?;

        Ok(Recommender {
            name: document.recommender_name,
            email: document.recommender_email,
        })
    }

    pub async fn update_recommender(
        &self,
        user_id: &str,
        document_id: &str,
        update: &RecommenderUpdate,
    ) -> AppResult<ApplicationDocument> {
        update
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let (mut document, _) =
            ownership::require_document_ownership(&self.db, document_id, user_id).await?;
        require_lor(&document, "update")?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE application_documents
            SET recommender_name = ?, recommender_email = ?, last_edited = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.email)
        .bind(db::format_timestamp(now))
        .bind(document_id)
        .execute(&self.db)
        .await?;

        self.activity
            .log(
                user_id,
                ActivityType::LorUpdate,
                "Recommender updated",
                json!({
                    "documentId": document_id,
                    "recommenderName": update.name,
                }),
            )
            .await?;

        document.recommender_name = Some(update.name.clone());
        document.recommender_email = Some(update.email.clone());
        document.last_edited = now;
        Ok(document)
    }
}

fn require_lor(document: &ApplicationDocument, action: &str) -> AppResult<()> {
    if document.document_type != DocumentType::Lor {
        return Err(AppError::Validation(format!(
            "Cannot {} recommender information for non-LOR documents",
            action
        )));
    }
    Ok(())
}
