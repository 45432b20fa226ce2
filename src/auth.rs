/// Authentication extractors and utilities
use crate::{
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::AppError,
    users::User,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

/// Claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// External identity id
    pub sub: String,
    pub exp: usize,
}

/// Authenticated context - resolves the bearer token to a provisioned user
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl AuthContext {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let claims = verify_identity_token(&token, &state.config.authentication.identity_jwt_secret)?;

        let user = state
            .users
            .resolve_current_user(Some(&claims.sub))
            .await?
            .ok_or_else(|| AppError::Authentication("user not provisioned".to_string()))?;

        Ok(AuthContext { user })
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await.ok();
        Ok(OptionalAuthContext { auth })
    }
}

/// Verify an HS256 identity token and return its claims
pub fn verify_identity_token(token: &str, secret: &str) -> Result<IdentityClaims, AppError> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;

    decode::<IdentityClaims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("JWT verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Authentication("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::Authentication("Invalid token signature".to_string())
                }
                _ => AppError::Authentication(format!("Invalid token: {}", e)),
            }
        })
}

/// Sign an identity token for tests
#[cfg(test)]
pub fn sign_identity_token(subject: &str, secret: &str, ttl_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = IdentityClaims {
        sub: subject.to_string(),
        exp: (chrono::Utc::now().timestamp() + ttl_secs) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &str = "test-secret-that-is-at-least-32-characters";

    #[test]
    fn test_verify_round_trip() {
        let token = sign_identity_token("user_2abc", SECRET, 3600);
        let claims = assert_ok!(verify_identity_token(&token, SECRET));
        assert_eq!(claims.sub, "user_2abc");
        assert_err!(verify_identity_token("not-a-jwt", SECRET));
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let token = sign_identity_token("user_2abc", SECRET, 3600);
        assert!(matches!(
            verify_identity_token(&token, "another-secret-that-is-long-enough-xx"),
            Err(AppError::Authentication(msg)) if msg == "Invalid token signature"
        ));

        let expired = sign_identity_token("user_2abc", SECRET, -3600);
        assert!(matches!(
            verify_identity_token(&expired, SECRET),
            Err(AppError::Authentication(msg)) if msg == "Token has expired"
        ));
    }
}
