/// Document endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    documents::{ApplicationDocument, DocumentStatus, DocumentType, Recommender, RecommenderUpdate},
    error::AppResult,
    generation::GenerationOutcome,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

/// Build document routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/applications/:id/documents", post(create_document))
        .route("/api/documents/:id", get(get_document))
        .route("/api/documents/:id/status", put(update_status))
        .route("/api/documents/:id/content", put(update_content))
        .route(
            "/api/documents/:id/recommender",
            get(get_recommender).put(update_recommender),
        )
        .route("/api/documents/:id/generate", post(generate))
}

#[derive(Deserialize)]
struct CreateDocumentRequest {
    #[serde(rename = "type")]
    document_type: DocumentType,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: DocumentStatus,
}

#[derive(Deserialize)]
struct ContentRequest {
    content: String,
}

async fn create_document(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(application_id): Path<String>,
    Json(req): Json<CreateDocumentRequest>,
) -> AppResult<(StatusCode, Json<ApplicationDocument>)> {
    let document = ctx
        .documents
        .create_document(auth.user_id(), &application_id, req.document_type)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn get_document(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<ApplicationDocument>> {
    Ok(Json(ctx.documents.get_document(auth.user_id(), &id).await?))
}

async fn update_status(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> AppResult<Json<ApplicationDocument>> {
    Ok(Json(ctx.documents.set_status(auth.user_id(), &id, req.status).await?))
}

async fn update_content(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<ContentRequest>,
) -> AppResult<Json<ApplicationDocument>> {
    Ok(Json(ctx.documents.update_content(auth.user_id(), &id, &req.content).await?))
}

async fn get_recommender(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<Recommender>> {
    Ok(Json(ctx.documents.get_recommender(auth.user_id(), &id).await?))
}

async fn update_recommender(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<RecommenderUpdate>,
) -> AppResult<Json<ApplicationDocument>> {
    Ok(Json(ctx.documents.update_recommender(auth.user_id(), &id, &req).await?))
}

async fn generate(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<GenerationOutcome>> {
    Ok(Json(ctx.generation.generate_document(auth.user_id(), &id).await?))
}
