/// AI document generation
///
/// Generation is metered: the caller must hold enough credits before the
/// language model is called, and credits are only consumed once content came
/// back. A failed upstream call costs nothing.

pub mod http;

pub use http::HttpDocumentGenerator;

use crate::{
    activity::{ActivityLog, ActivityType},
    catalog::CatalogManager,
    credits::{CreditLedger, CreditSummary, CreditUsageType},
    documents::{ApplicationDocument, DocumentManager, DocumentType, Recommender},
    error::{AppError, AppResult},
    metrics, ownership,
    profiles::ProfileManager,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Instant};

#[derive(Debug, Clone, Serialize)]
pub struct UniversityContext {
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramContext {
    pub name: String,
    pub degree: String,
    pub department: String,
}

/// Payload sent to the generator
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    #[serde(skip)]
    pub document_type: DocumentType,
    pub profile: Value,
    pub university: UniversityContext,
    pub program: ProgramContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommender: Option<Recommender>,
}

/// Language model backend
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Produce the document text
    async fn generate(&self, request: &GenerationRequest) -> AppResult<String>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub document: ApplicationDocument,
    pub credits_used: i64,
    pub credits: CreditSummary,
}

/// Generation workflow
#[derive(Clone)]
pub struct GenerationService {
    db: SqlitePool,
    generator: Arc<dyn DocumentGenerator>,
    catalog: CatalogManager,
    documents: DocumentManager,
    credits: CreditLedger,
    profiles: ProfileManager,
    activity: ActivityLog,
}

impl GenerationService {
    pub fn new(
        db: SqlitePool,
        generator: Arc<dyn DocumentGenerator>,
        catalog: CatalogManager,
        documents: DocumentManager,
        credits: CreditLedger,
        profiles: ProfileManager,
        activity: ActivityLog,
    ) -> Self {
        Self {
            db,
            generator,
            catalog,
            documents,
            credits,
            profiles,
            activity,
        }
    }

    fn pricing(&self, document_type: DocumentType) -> (i64, CreditUsageType) {
        let config = self.credits.config();
        match document_type {
            DocumentType::Sop => (config.sop_cost, CreditUsageType::SopRequest),
            DocumentType::Lor => (config.lor_cost, CreditUsageType::LorRequest),
        }
    }

    /// Generate content for one of the caller's documents and store it
    pub async fn generate_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> AppResult<GenerationOutcome> {
        let (document, application) =
            ownership::require_document_ownership(&self.db, document_id, user_id).await?;
        let (cost, usage_type) = self.pricing(document.document_type);

        let available = self.credits.get_remaining(user_id).await?;
        if available < cost {
            return Err(AppError::InsufficientCredits {
                available,
                requested: cost,
            });
        }

        let university = self.catalog.require_university(&application.university_id).await?;
        let program = self.catalog.require_program(&application.program_id).await?;

        let recommender = match document.document_type {
            DocumentType::Sop => None,
            DocumentType::Lor => {
                if document.recommender_name.is_none() {
                    return Err(AppError::Validation(
                        "Recommender information must be saved before generating a letter"
                            .to_string(),
                    ));
                }
                Some(Recommender {
                    name: document.recommender_name.clone(),
                    email: document.recommender_email.clone(),
                })
            }
        };

        let profile = match self.profiles.get(user_id).await? {
            Some(profile) => serde_json::to_value(profile)
                .map_err(|e| AppError::Internal(format!("Failed to encode profile: {}", e)))?,
            None => json!({}),
        };

        let request = GenerationRequest {
            document_type: document.document_type,
            profile,
            university: UniversityContext {
                name: university.name.clone(),
                department: program.department.clone(),
            },
            program: ProgramContext {
                name: program.name.clone(),
                degree: program.degree.clone(),
                department: program.department.clone(),
            },
            recommender,
        };

        let started = Instant::now();
        let content = match self.generator.generate(&request).await {
            Ok(content) => content,
            Err(e) => {
                metrics::record_generation(
                    document.document_type.as_str(),
                    false,
                    started.elapsed().as_secs_f64(),
                );
                tracing::error!("Generation of document {} failed: {}", document_id, e);
                return Err(AppError::Generation(format!(
                    "Failed to generate {}",
                    document.document_type.title()
                )));
            }
        };
        metrics::record_generation(
            document.document_type.as_str(),
            true,
            started.elapsed().as_secs_f64(),
        );

        let description = format!(
            "Generated {} for {} at {}",
            document.document_type.title(),
            program.name,
            university.name
        );
        let credits = self
            .credits
            .consume(user_id, usage_type, cost, Some(&description))
            .await?;

        let document = self.documents.store_generated_content(&document, &content).await?;

        self.activity
            .log(
                user_id,
                ActivityType::AiUsage,
                &description,
                json!({
                    "documentId": document.id,
                    "applicationId": application.id,
                    "creditsUsed": cost,
                }),
            )
            .await?;

        tracing::info!(
            "Generated {} for document {} ({} credits)",
            document.document_type.as_str(),
            document.id,
            cost
        );

        Ok(GenerationOutcome {
            document,
            credits_used: cost,
            credits,
        })
    }
}
