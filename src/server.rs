/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{AppError, AppResult},
    metrics,
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(crate::api::routes())
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus text exposition
async fn metrics_handler() -> Response {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        metrics::render_metrics(),
    )
        .into_response()
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> AppResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("GradAid listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());
    info!("   Generation service: {}", ctx.config.generation.service_url);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::sign_identity_token,
        config::test_config,
        db::{fixtures, test_pool},
        generation::{DocumentGenerator, GenerationRequest},
    };
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NoGenerator;

    #[async_trait]
    impl DocumentGenerator for NoGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> AppResult<String> {
            Err(AppError::Generation("disabled".to_string()))
        }
    }

    async fn test_app() -> (Router, AppContext) {
        let pool = test_pool().await;
        let ctx = AppContext::with_pool(test_config(), pool, Arc::new(NoGenerator));
        (build_router(ctx.clone()), ctx)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_fallback() {
        let (app, _) = test_app().await;

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "NotFound");
    }

    #[tokio::test]
    async fn test_auth_required_and_unprovisioned() {
        let (app, ctx) = test_app().await;

        let response = app
            .clone()
            .oneshot(Request::get("/api/users/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let token = sign_identity_token(
            "ext-ghost",
            &ctx.config.authentication.identity_jwt_secret,
            3600,
        );
        let response = app
            .oneshot(
                Request::get("/api/users/me")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(response)
            .await["message"]
            .as_str()
            .unwrap()
            .contains("user not provisioned"));
    }

    #[tokio::test]
    async fn test_create_and_list_applications() {
        let (app, ctx) = test_app().await;
        let ids = fixtures::catalog(&ctx.db).await;
        fixtures::user(&ctx.db, "ext-1").await;
        let token = sign_identity_token("ext-1", &ctx.config.authentication.identity_jwt_secret, 3600);

        let body = json!({
            "universityId": ids.mit,
            "programId": ids.mit_cs_ms,
            "deadline": "2025-12-15",
            "priority": "high"
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/applications")
                    .header("authorization", format!("Bearer {}", token))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let duplicate = app
            .clone()
            .oneshot(
                Request::post("/api/applications")
                    .header("authorization", format!("Bearer {}", token))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(
                Request::get("/api/applications")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list = body_json(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["totalDocuments"], 3);
        assert_eq!(list[0]["status"], "draft");
    }
}
