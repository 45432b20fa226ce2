/// Favorite program endpoints
use crate::{
    auth::AuthContext,
    catalog::Program,
    context::AppContext,
    error::AppResult,
    favorites::FavoriteId,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Build favorite routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/favorites", get(list_favorites))
        .route("/api/favorites/ids", get(list_ids))
        .route("/api/favorites/by-id/:id", delete(delete_favorite))
        .route("/api/favorites/:program_id", get(is_favorite))
        .route("/api/favorites/:program_id/toggle", post(toggle))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteState {
    is_favorite: bool,
}

async fn toggle(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(program_id): Path<String>,
) -> AppResult<Json<FavoriteState>> {
    let is_favorite = ctx.favorites.toggle(auth.user_id(), &program_id).await?;
    Ok(Json(FavoriteState { is_favorite }))
}

async fn is_favorite(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(program_id): Path<String>,
) -> AppResult<Json<FavoriteState>> {
    let is_favorite = ctx.favorites.is_favorite(auth.user_id(), &program_id).await?;
    Ok(Json(FavoriteState { is_favorite }))
}

async fn list_favorites(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<Program>>> {
    Ok(Json(ctx.favorites.list_programs(auth.user_id()).await?))
}

async fn list_ids(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<FavoriteId>>> {
    Ok(Json(ctx.favorites.list_ids(auth.user_id()).await?))
}

async fn delete_favorite(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    ctx.favorites.delete(auth.user_id(), &id).await?;
    Ok(Json(json!({ "success": true })))
}
