/// Feedback endpoint
use crate::{
    auth::AuthContext, context::AppContext, error::AppResult, feedback::FeedbackSubmission,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/feedback", post(submit))
}

async fn submit(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<FeedbackSubmission>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = ctx.feedback.submit(auth.user_id(), &req).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}
