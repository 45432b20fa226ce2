/// Profile and onboarding endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::{AppError, AppResult},
    profiles::{CareerGoals, Education, OnboardingStatus, PersonalInfo, StepResult, TestScores, UserProfile},
};
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};

/// Build profile routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/profile", get(get_profile))
        .route("/api/profile/onboarding", get(onboarding))
        .route("/api/profile/personal-info", put(personal_info))
        .route("/api/profile/education", put(education))
        .route("/api/profile/test-scores", put(test_scores))
        .route("/api/profile/career-goals", put(career_goals))
}

async fn get_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<UserProfile>> {
    ctx.profiles
        .get(auth.user_id())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

async fn onboarding(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<OnboardingStatus>> {
    Ok(Json(ctx.profiles.onboarding_status(auth.user_id()).await?))
}

async fn personal_info(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<PersonalInfo>,
) -> AppResult<Json<StepResult>> {
    Ok(Json(ctx.profiles.save_personal_info(auth.user_id(), &req).await?))
}

async fn education(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<Education>,
) -> AppResult<Json<StepResult>> {
    Ok(Json(ctx.profiles.save_education(auth.user_id(), &req).await?))
}

async fn test_scores(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<TestScores>,
) -> AppResult<Json<StepResult>> {
    Ok(Json(ctx.profiles.save_test_scores(auth.user_id(), &req).await?))
}

async fn career_goals(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CareerGoals>,
) -> AppResult<Json<StepResult>> {
    Ok(Json(ctx.profiles.save_career_goals(auth.user_id(), &req).await?))
}
