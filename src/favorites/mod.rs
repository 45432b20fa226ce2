/// Saved programs
use crate::{
    catalog::{CatalogManager, Program},
    db,
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteId {
    pub id: String,
    pub program_id: String,
}

/// Favorites manager
#[derive(Clone)]
pub struct FavoriteManager {
    db: SqlitePool,
    catalog: CatalogManager,
}

impl FavoriteManager {
    pub fn new(db: SqlitePool, catalog: CatalogManager) -> Self {
        Self { db, catalog }
    }

    /// Flip the favorite flag; returns the new state
    pub async fn toggle(&self, user_id: &str, program_id: &str) -> AppResult<bool> {
        self.catalog.require_program(program_id).await?;

        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND program_id = ?")
            .bind(user_id)
            .bind(program_id)
            .execute(&self.db)
            .await?;
        if removed.rows_affected() > 0 {
            tracing::debug!("User {} unfavorited program {}", user_id, program_id);
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO favorites (id, user_id, program_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(db::new_id())
        .bind(user_id)
        .bind(program_id)
        .bind(db::now_timestamp())
        .execute(&self.db)
        .await?;

        tracing::debug!("User {} favorited program {}", user_id, program_id);
        Ok(true)
    }

    pub async fn is_favorite(&self, user_id: &str, program_id: &str) -> AppResult<bool> {
        let row = sqlx::query("SELECT 1 FROM favorites WHERE user_id = ? AND program_id = ?")
            .bind(user_id)
            .bind(program_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn list_ids(&self, user_id: &str) -> AppResult<Vec<FavoriteId>> {
        let rows = sqlx::query("SELECT id, program_id FROM favorites WHERE user_id = ? ORDER BY rowid")
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .iter()
            .map(|row| FavoriteId {
                id: row.get("id"),
                program_id: row.get("program_id"),
            })
            .collect())
    }

    /// Favorited programs in the order they were saved
    pub async fn list_programs(&self, user_id: &str) -> AppResult<Vec<Program>> {
        let program_ids: Vec<String> = self
            .list_ids(user_id)
            .await?
            .into_iter()
            .map(|f| f.program_id)
            .collect();
        self.catalog.programs_by_ids(&program_ids).await
    }

    /// Delete one of the caller's favorites by its id
    pub async fn delete(&self, user_id: &str, favorite_id: &str) -> AppResult<()> {
        let removed = sqlx::query("DELETE FROM favorites WHERE id = ? AND user_id = ?")
            .bind(favorite_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if removed.rows_affected() == 0 {
            return Err(AppError::NotFound("Favorite not found".to_string()));
        }
        Ok(())
    }
}
