/// Background task implementations
use crate::{context::AppContext, error::AppResult};
use chrono::Utc;

/// Reset expired credit ledgers back to the default allocation
pub async fn reset_expired_credits(ctx: &AppContext) -> AppResult<u64> {
    ctx.credits.reset_expired(Utc::now()).await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}
