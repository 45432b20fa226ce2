/// Application endpoints
use crate::{
    applications::{
        views::{ApplicationDetails, ApplicationSummary, UniversityDocuments},
        Application, NewApplication, StatusUpdate,
    },
    auth::AuthContext,
    context::AppContext,
    error::AppResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Build application routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/applications",
            get(list_applications).post(create_application),
        )
        .route("/api/applications/timeline", get(timeline))
        .route(
            "/api/applications/documents-by-university",
            get(documents_by_university),
        )
        .route(
            "/api/applications/:id",
            get(get_application).delete(delete_application),
        )
        .route("/api/applications/:id/status", put(update_status))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedApplication {
    application_id: String,
}

async fn create_application(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<NewApplication>,
) -> AppResult<(StatusCode, Json<CreatedApplication>)> {
    let application_id = ctx.applications.create(auth.user_id(), req).await?;
    Ok((StatusCode::CREATED, Json(CreatedApplication { application_id })))
}

async fn list_applications(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<ApplicationSummary>>> {
    Ok(Json(ctx.applications.list_with_progress(auth.user_id()).await?))
}

async fn timeline(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<ApplicationDetails>>> {
    Ok(Json(ctx.applications.timeline(auth.user_id()).await?))
}

async fn documents_by_university(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<UniversityDocuments>>> {
    Ok(Json(ctx.applications.documents_by_university(auth.user_id()).await?))
}

async fn get_application(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<ApplicationDetails>> {
    Ok(Json(ctx.applications.get_with_details(auth.user_id(), &id).await?))
}

async fn update_status(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdate>,
) -> AppResult<Json<Application>> {
    Ok(Json(ctx.applications.update_status(auth.user_id(), &id, req).await?))
}

async fn delete_application(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    ctx.applications.delete(auth.user_id(), &id).await?;
    Ok(Json(json!({ "success": true })))
}
