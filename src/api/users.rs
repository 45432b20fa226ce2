/// Current-user and identity webhook endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::{AppError, AppResult},
    users::{IdentityUser, User},
};
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Header carrying the shared webhook secret
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/users/me", get(me))
        .route("/api/webhooks/identity", post(identity_webhook))
}

async fn me(auth: AuthContext) -> Json<User> {
    Json(auth.user)
}

/// Identity provider event envelope
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct DeletedIdentity {
    id: String,
}

fn check_webhook_secret(headers: &HeaderMap, expected: &str) -> AppResult<()> {
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing webhook secret".to_string()))?;

    if provided != expected {
        tracing::warn!("Rejected identity webhook with a bad secret");
        return Err(AppError::Authentication("Invalid webhook secret".to_string()));
    }
    Ok(())
}

fn parse_data<T: serde::de::DeserializeOwned>(data: Value) -> AppResult<T> {
    serde_json::from_value(data)
        .map_err(|e| AppError::Validation(format!("Invalid webhook payload: {}", e)))
}

/// Apply one identity event to the user table
pub async fn apply_webhook_event(ctx: &AppContext, event: WebhookEvent) -> AppResult<Value> {
    match event.event_type.as_str() {
        "user.created" | "user.updated" => {
            let identity: IdentityUser = parse_data(event.data)?;
            let user = ctx.users.upsert_from_identity(&identity).await?;
            Ok(json!({ "success": true, "userId": user.id }))
        }
        "user.deleted" => {
            let deleted: DeletedIdentity = parse_data(event.data)?;
            let removed = ctx.users.delete_by_external_id(&deleted.id).await?;
            Ok(json!({ "success": true, "deleted": removed }))
        }
        other => {
            tracing::debug!("Ignoring identity webhook event {}", other);
            Ok(json!({ "success": true, "ignored": other }))
        }
    }
}

async fn identity_webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> AppResult<Json<Value>> {
    check_webhook_secret(&headers, &ctx.config.authentication.webhook_secret)?;
    tracing::info!("Identity webhook: {}", event.event_type);
    Ok(Json(apply_webhook_event(&ctx, event).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::test_config,
        db::test_pool,
        generation::{DocumentGenerator, GenerationRequest},
    };
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    struct NoGenerator;

    #[async_trait]
    impl DocumentGenerator for NoGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> AppResult<String> {
            Err(AppError::Generation("disabled".to_string()))
        }
    }

    fn created(id: &str) -> WebhookEvent {
        WebhookEvent {
            event_type: "user.created".to_string(),
            data: json!({
                "id": id,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "primary_email_address_id": "em_1",
                "email_addresses": [
                    { "id": "em_0", "email_address": "old@example.com" },
                    { "id": "em_1", "email_address": "ada@example.com" }
                ]
            }),
        }
    }

    #[test]
    fn test_webhook_secret() {
        let mut headers = HeaderMap::new();
        assert!(check_webhook_secret(&headers, "s3cret").is_err());

        headers.insert(WEBHOOK_SECRET_HEADER, HeaderValue::from_static("nope"));
        assert!(matches!(
            check_webhook_secret(&headers, "s3cret"),
            Err(AppError::Authentication(_))
        ));

        headers.insert(WEBHOOK_SECRET_HEADER, HeaderValue::from_static("s3cret"));
        assert!(check_webhook_secret(&headers, "s3cret").is_ok());
    }

    #[tokio::test]
    async fn test_created_then_deleted() {
        let pool = test_pool().await;
        let ctx = AppContext::with_pool(test_config(), pool, Arc::new(NoGenerator));

        apply_webhook_event(&ctx, created("user_2abc")).await.unwrap();
        let user = ctx.users.get_by_external_id("user_2abc").await.unwrap().unwrap();
        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(ctx.credits.get_remaining(&user.id).await.unwrap(), 500);

        let result = apply_webhook_event(
            &ctx,
            WebhookEvent {
                event_type: "user.deleted".to_string(),
                data: json!({ "id": "user_2abc" }),
            },
        )
        .await
        .unwrap();
        assert_eq!(result["deleted"], true);
        assert!(ctx.users.get_by_external_id("user_2abc").await.unwrap().is_none());

        let ignored = apply_webhook_event(
            &ctx,
            WebhookEvent {
                event_type: "session.created".to_string(),
                data: json!({}),
            },
        )
        .await
        .unwrap();
        assert_eq!(ignored["ignored"], "session.created");
    }
}
