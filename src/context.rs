/// Application context and dependency injection
use crate::{
    activity::ActivityLog,
    applications::ApplicationManager,
    catalog::CatalogManager,
    config::ServerConfig,
    credits::CreditLedger,
    dashboard::DashboardService,
    db,
    documents::DocumentManager,
    error::{AppError, AppResult},
    favorites::FavoriteManager,
    feedback::FeedbackManager,
    generation::{DocumentGenerator, GenerationService, HttpDocumentGenerator},
    profiles::ProfileManager,
    rate_limit::RateLimiter,
    search::SearchService,
    users::UserManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub users: UserManager,
    pub catalog: CatalogManager,
    pub applications: ApplicationManager,
    pub documents: DocumentManager,
    pub credits: CreditLedger,
    pub generation: GenerationService,
    pub search: SearchService,
    pub favorites: FavoriteManager,
    pub profiles: ProfileManager,
    pub feedback: FeedbackManager,
    pub activity: ActivityLog,
    pub dashboard: DashboardService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let generator: Arc<dyn DocumentGenerator> =
            Arc::new(HttpDocumentGenerator::new(&config.generation)?);

        Ok(Self::with_pool(config, db, generator))
    }

    /// Wire the managers over an existing pool
    pub fn with_pool(
        config: ServerConfig,
        db: SqlitePool,
        generator: Arc<dyn DocumentGenerator>,
    ) -> Self {
        let activity = ActivityLog::new(db.clone());
        let catalog = CatalogManager::new(db.clone());
        let credits = CreditLedger::new(db.clone(), config.credits.clone());
        let documents = DocumentManager::new(db.clone(), activity.clone());
        let applications =
            ApplicationManager::new(db.clone(), catalog.clone(), documents.clone(), activity.clone());
        let profiles = ProfileManager::new(db.clone());
        let generation = GenerationService::new(
            db.clone(),
            generator,
            catalog.clone(),
            documents.clone(),
            credits.clone(),
            profiles.clone(),
            activity.clone(),
        );
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            users: UserManager::new(db.clone(), credits.clone()),
            search: SearchService::new(db.clone(), catalog.clone()),
            favorites: FavoriteManager::new(db.clone(), catalog.clone()),
            feedback: FeedbackManager::new(db.clone(), activity.clone()),
            dashboard: DashboardService::new(db.clone(), credits.clone(), activity.clone()),
            config: Arc::new(config),
            db,
            catalog,
            applications,
            documents,
            credits,
            generation,
            profiles,
            activity,
            rate_limiter,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AppError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }
        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
