/// Credit endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    credits::{CreditSummary, CreditUsage, CreditUsageType, UsageStat},
    error::{AppError, AppResult},
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

const DEFAULT_USAGE_LIMIT: i64 = 50;

/// Build credit routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/credits", get(get_credits))
        .route("/api/credits/remaining", get(get_remaining))
        .route("/api/credits/usage", get(get_usage))
        .route("/api/credits/use", post(use_credits))
}

#[derive(Deserialize)]
struct UsageQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageResponse {
    usage: Vec<CreditUsage>,
    stats: Vec<UsageStat>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemainingResponse {
    remaining_credits: i64,
}

#[derive(Deserialize)]
struct UseCreditsRequest {
    #[serde(rename = "type")]
    usage_type: CreditUsageType,
    amount: i64,
    description: Option<String>,
}

async fn get_credits(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<CreditSummary>> {
    Ok(Json(ctx.credits.get_balance(auth.user_id()).await?.into()))
}

async fn get_remaining(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<RemainingResponse>> {
    let remaining_credits = ctx.credits.get_remaining(auth.user_id()).await?;
    Ok(Json(RemainingResponse { remaining_credits }))
}

async fn get_usage(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<UsageQuery>,
) -> AppResult<Json<UsageResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_USAGE_LIMIT).clamp(1, 500);
    let usage = ctx.credits.list_usage(auth.user_id(), limit).await?;
    let stats = ctx.credits.usage_stats(auth.user_id()).await?;
    Ok(Json(UsageResponse { usage, stats }))
}

async fn use_credits(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<UseCreditsRequest>,
) -> AppResult<Json<CreditSummary>> {
    if req.usage_type == CreditUsageType::AiCreditsReset {
        return Err(AppError::Validation(
            "Resets cannot be recorded as consumption".to_string(),
        ));
    }

    let summary = ctx
        .credits
        .consume(auth.user_id(), req.usage_type, req.amount, req.description.as_deref())
        .await?;
    Ok(Json(summary))
}
