/// Catalog and search endpoints
use crate::{
    auth::OptionalAuthContext,
    catalog::{Program, University},
    context::AppContext,
    error::{AppError, AppResult},
    search::{DegreeType, LocationFilter, SearchRequest},
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build catalog and search routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/universities/:id", get(get_university))
        .route("/api/universities/:id/programs", get(university_programs))
        .route("/api/programs/:id", get(get_program))
        .route("/api/search/programs", post(search_programs))
        .route("/api/search/universities", post(search_universities))
        .route("/api/search/locations", get(locations))
        .route("/api/search/degree-types", get(degree_types))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgramSearchResponse {
    program_ids: Vec<String>,
}

/// Program with the caller's favorite flag; false when anonymous
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgramView {
    #[serde(flatten)]
    program: Program,
    is_favorite: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniversitySearchRequest {
    program_ids: Vec<String>,
}

async fn get_university(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> AppResult<Json<University>> {
    Ok(Json(ctx.catalog.require_university(&id).await?))
}

async fn university_programs(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Program>>> {
    ctx.catalog.require_university(&id).await?;
    Ok(Json(ctx.catalog.programs_by_university(&id).await?))
}

async fn get_program(
    State(ctx): State<AppContext>,
    auth: OptionalAuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<ProgramView>> {
    let program = ctx.catalog.require_program(&id).await?;
    let is_favorite = match auth.auth {
        Some(auth) => ctx.favorites.is_favorite(auth.user_id(), &program.id).await?,
        None => false,
    };
    Ok(Json(ProgramView { program, is_favorite }))
}

async fn search_programs(
    State(ctx): State<AppContext>,
    Json(req): Json<SearchRequest>,
) -> AppResult<Json<ProgramSearchResponse>> {
    let program_ids = ctx.search.search_programs(&req).await?;
    Ok(Json(ProgramSearchResponse { program_ids }))
}

async fn search_universities(
    State(ctx): State<AppContext>,
    Json(req): Json<UniversitySearchRequest>,
) -> AppResult<Json<Vec<University>>> {
    ctx.search
        .universities_for_programs(&req.program_ids)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No universities found for the given programs".to_string()))
}

async fn locations(State(ctx): State<AppContext>) -> AppResult<Json<Vec<LocationFilter>>> {
    Ok(Json(ctx.search.unique_locations().await?))
}

async fn degree_types(State(ctx): State<AppContext>) -> AppResult<Json<Vec<DegreeType>>> {
    Ok(Json(ctx.search.unique_degree_types().await?))
}
