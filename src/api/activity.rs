/// Activity feed and dashboard endpoints
use crate::{
    activity::{Activity, ActivityStats, DEFAULT_RECENT_LIMIT},
    auth::AuthContext,
    context::AppContext,
    dashboard::DashboardSummary,
    error::AppResult,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

/// Build activity routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/activity", get(recent))
        .route("/api/activity/stats", get(stats))
        .route("/api/dashboard", get(dashboard))
}

#[derive(Deserialize)]
struct RecentQuery {
    limit: Option<i64>,
}

async fn recent(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<RecentQuery>,
) -> AppResult<Json<Vec<Activity>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Ok(Json(ctx.activity.recent(auth.user_id(), limit).await?))
}

async fn stats(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<ActivityStats>> {
    Ok(Json(ctx.activity.stats(auth.user_id()).await?))
}

async fn dashboard(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<DashboardSummary>> {
    Ok(Json(ctx.dashboard.summary(auth.user_id()).await?))
}
