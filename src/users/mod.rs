/// User accounts linked to the external identity provider
///
/// Users are created and updated from identity provider events. Deleting a
/// user removes everything the user owns.
use crate::{
    credits::CreditLedger,
    db,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Tables holding per-user rows, children before parents
const USER_DATA_TABLES: &[&str] = &[
    "application_documents",
    "applications",
    "ai_credit_usage",
    "ai_credits",
    "user_activity",
    "user_profiles",
    "favorites",
    "feedback",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

/// User payload sent by the identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
}

impl IdentityUser {
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }

    /// Primary address, or empty when the provider has none marked
    pub fn primary_email(&self) -> String {
        self.primary_email_address_id
            .as_deref()
            .and_then(|primary| self.email_addresses.iter().find(|e| e.id == primary))
            .map(|e| e.email_address.clone())
            .unwrap_or_default()
    }
}

/// User manager
#[derive(Clone)]
pub struct UserManager {
    db: SqlitePool,
    credits: CreditLedger,
}

impl UserManager {
    pub fn new(db: SqlitePool, credits: CreditLedger) -> Self {
        Self { db, credits }
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, external_id, name, email, created_at FROM users WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| {
            Ok(User {
                id: row.get("id"),
                external_id: row.get("external_id"),
                name: row.get("name"),
                email: row.get("email"),
                created_at: db::parse_timestamp(&row.get::<String, _>("created_at"))?,
            })
        })
        .transpose()
    }

    /// Resolve the caller's identity subject to a user.
    ///
    /// No subject is an authentication failure; an unknown subject is `None`
    /// so the caller decides whether that is fatal.
    pub async fn resolve_current_user(&self, subject: Option<&str>) -> AppResult<Option<User>> {
        let subject =
            subject.ok_or_else(|| AppError::Authentication("Not authenticated".to_string()))?;
        self.get_by_external_id(subject).await
    }

    /// Insert or update a user from an identity provider event.
    ///
    /// New users get their default credit balance.
    pub async fn upsert_from_identity(&self, identity: &IdentityUser) -> AppResult<User> {
        let name = identity.display_name();
        let email = identity.primary_email();

        if let Some(mut user) = self.get_by_external_id(&identity.id).await? {
            sqlx::query("UPDATE users SET name = ?, email = ? WHERE id = ?")
                .bind(&name)
                .bind(&email)
                .bind(&user.id)
                .execute(&self.db)
                .await?;

            tracing::info!("Updated user {} from identity provider", user.id);
            user.name = name;
            user.email = email;
            return Ok(user);
        }

        let user = User {
            id: db::new_id(),
            external_id: identity.id.clone(),
            name,
            email,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, external_id, name, email, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.external_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(db::format_timestamp(user.created_at))
        .execute(&self.db)
        .await?;

        self.credits.create_default(&user.id).await?;

        tracing::info!("Provisioned user {} for identity {}", user.id, user.external_id);
        Ok(user)
    }

    /// Delete a user and all owned data; returns false when no user matched
    pub async fn delete_by_external_id(&self, external_id: &str) -> AppResult<bool> {
        let Some(user) = self.get_by_external_id(external_id).await? else {
            tracing::warn!("Can't delete user, none for identity {}", external_id);
            return Ok(false);
        };

        let mut tx = self.db.begin().await?;
        for table in USER_DATA_TABLES {
            sqlx::query(&format!("DELETE FROM {} WHERE user_id = ?", table))
                .bind(&user.id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Deleted user {} and all owned data", user.id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        activity::{ActivityLog, ActivityType},
        config::CreditsConfig,
        db::{fixtures, test_pool},
    };
    use serde_json::json;

    fn identity(id: &str, first: &str) -> IdentityUser {
        serde_json::from_value(json!({
            "id": id,
            "first_name": first,
            "last_name": "Hopper",
            "email_addresses": [
                { "id": "e1", "email_address": "old@example.com" },
                { "id": "e2", "email_address": "grace@example.com" }
            ],
            "primary_email_address_id": "e2"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let pool = test_pool().await;
        let credits = CreditLedger::new(pool.clone(), CreditsConfig::default());
        let users = UserManager::new(pool.clone(), credits.clone());

        let created = users.upsert_from_identity(&identity("idp_1", "Grace")).await.unwrap();
        assert_eq!(created.name, "Grace Hopper");
        assert_eq!(created.email, "grace@example.com");
        assert_eq!(credits.get_remaining(&created.id).await.unwrap(), 500);

        let updated = users.upsert_from_identity(&identity("idp_1", "Amazing")).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Amazing Hopper");
    }

    #[tokio::test]
    async fn test_resolve_current_user() {
        let pool = test_pool().await;
        let users = UserManager::new(pool.clone(), CreditLedger::new(pool.clone(), CreditsConfig::default()));
        let id = fixtures::user(&pool, "idp_2").await;

        assert!(matches!(
            users.resolve_current_user(None).await,
            Err(AppError::Authentication(_))
        ));
        assert!(users.resolve_current_user(Some("unknown")).await.unwrap().is_none());
        assert_eq!(
            users.resolve_current_user(Some("idp_2")).await.unwrap().unwrap().id,
            id
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_owned_rows() {
        let pool = test_pool().await;
        let credits = CreditLedger::new(pool.clone(), CreditsConfig::default());
        let users = UserManager::new(pool.clone(), credits.clone());
        let user = users.upsert_from_identity(&identity("idp_3", "Ada")).await.unwrap();

        credits
            .consume(&user.id, crate::credits::CreditUsageType::AiUsage, 5, None)
            .await
            .unwrap();
        ActivityLog::new(pool.clone())
            .log(&user.id, ActivityType::AiUsage, "Generated", json!({}))
            .await
            .unwrap();

        assert!(users.delete_by_external_id("idp_3").await.unwrap());
        assert!(!users.delete_by_external_id("idp_3").await.unwrap());

        for table in USER_DATA_TABLES {
            let count: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {} WHERE user_id = ?", table))
                .bind(&user.id)
                .fetch_one(&pool)
                .await
                .unwrap()
                .get("n");
            assert_eq!(count, 0, "{}", table);
        }
    }
}
