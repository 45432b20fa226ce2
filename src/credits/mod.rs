/// AI credit ledger
///
/// One balance row per user plus an append-only usage log. Every write that
/// touches the balance goes through a single transaction together with its
/// usage row, and consumption is bounded by the stored total.
use crate::{
    config::CreditsConfig,
    db,
    error::{AppError, AppResult},
    metrics,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;

/// Usage categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditUsageType {
    LorRequest,
    LorUpdate,
    SopRequest,
    SopUpdate,
    AiUsage,
    AiCreditsReset,
}

impl CreditUsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditUsageType::LorRequest => "lor_request",
            CreditUsageType::LorUpdate => "lor_update",
            CreditUsageType::SopRequest => "sop_request",
            CreditUsageType::SopUpdate => "sop_update",
            CreditUsageType::AiUsage => "ai_usage",
            CreditUsageType::AiCreditsReset => "ai_credits_reset",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "lor_request" => Ok(CreditUsageType::LorRequest),
            "lor_update" => Ok(CreditUsageType::LorUpdate),
            "sop_request" => Ok(CreditUsageType::SopRequest),
            "sop_update" => Ok(CreditUsageType::SopUpdate),
            "ai_usage" => Ok(CreditUsageType::AiUsage),
            "ai_credits_reset" => Ok(CreditUsageType::AiCreditsReset),
            _ => Err(AppError::Validation(format!("Invalid credit usage type: {}", s))),
        }
    }
}

/// Stored (or materialized default) balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub total_credits: i64,
    pub used_credits: i64,
    pub reset_date: DateTime<Utc>,
}

impl CreditBalance {
    pub fn remaining(&self) -> i64 {
        remaining_credits(self.total_credits, self.used_credits)
    }
}

/// Balance returned after a consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    #[serde(flatten)]
    pub balance: CreditBalance,
    pub remaining_credits: i64,
}

impl From<CreditBalance> for CreditSummary {
    fn from(balance: CreditBalance) -> Self {
        let remaining_credits = balance.remaining();
        Self {
            balance,
            remaining_credits,
        }
    }
}

/// Usage log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditUsage {
    pub id: i64,
    pub user_id: String,
    #[serde(rename = "type")]
    pub usage_type: CreditUsageType,
    pub credits: i64,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
}

/// Per-category share of consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStat {
    #[serde(rename = "type")]
    pub usage_type: CreditUsageType,
    pub used: i64,
    pub percentage: i64,
}

/// `max(0, total - used)`
pub fn remaining_credits(total: i64, used: i64) -> i64 {
    (total - used).max(0)
}

/// Credit ledger
#[derive(Clone)]
pub struct CreditLedger {
    db: SqlitePool,
    config: CreditsConfig,
}

impl CreditLedger {
    pub fn new(db: SqlitePool, config: CreditsConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &CreditsConfig {
        &self.config
    }

    fn next_reset_date(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from + Duration::days(self.config.reset_period_days)
    }

    fn default_balance(&self) -> CreditBalance {
        CreditBalance {
            total_credits: self.config.default_total,
            used_credits: 0,
            reset_date: self.next_reset_date(Utc::now()),
        }
    }

    /// Create the default balance row if the user has none
    pub async fn create_default(&self, user_id: &str) -> AppResult<()> {
        let balance = self.default_balance();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO ai_credits (user_id, total_credits, used_credits, reset_date)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(user_id)
        .bind(balance.total_credits)
        .bind(db::format_timestamp(balance.reset_date))
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Stored balance, or a default that is not persisted
    pub async fn get_balance(&self, user_id: &str) -> AppResult<CreditBalance> {
        let row = sqlx::query(
            "SELECT total_credits, used_credits, reset_date FROM ai_credits WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => parse_balance(&row),
            None => Ok(self.default_balance()),
        }
    }

    pub async fn get_remaining(&self, user_id: &str) -> AppResult<i64> {
        Ok(self.get_balance(user_id).await?.remaining())
    }

    /// Consume `amount` credits and append the matching usage row.
    ///
    /// Fails with `InsufficientCredits` without writing anything when the
    /// balance cannot cover the amount.
    pub async fn consume(
        &self,
        user_id: &str,
        usage_type: CreditUsageType,
        amount: i64,
        description: Option<&str>,
    ) -> AppResult<CreditSummary> {
        if amount <= 0 {
            return Err(AppError::Validation("Credit amount must be positive".to_string()));
        }

        let mut tx = self.db.begin().await?;
        self.ensure_row(&mut tx, user_id).await?;

        let updated = sqlx::query(
            r#"
            UPDATE ai_credits
            SET used_credits = used_credits + ?1
            WHERE user_id = ?2 AND used_credits + ?1 <= total_credits
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let balance = fetch_balance(&mut tx, user_id).await?;
            tx.rollback().await?;
            tracing::info!(
                "Rejected credit consumption for {}: requested {}, available {}",
                user_id,
                amount,
                balance.remaining()
            );
            return Err(AppError::InsufficientCredits {
                available: balance.remaining(),
                requested: amount,
            });
        }

        insert_usage(&mut tx, user_id, usage_type, amount, description).await?;
        let balance = fetch_balance(&mut tx, user_id).await?;
        tx.commit().await?;

        metrics::CREDITS_CONSUMED_TOTAL
            .with_label_values(&[usage_type.as_str()])
            .inc_by(amount as u64);
        tracing::info!(
            "Consumed {} credits ({}) for {}; {} remaining",
            amount,
            usage_type.as_str(),
            user_id,
            balance.remaining()
        );

        Ok(balance.into())
    }

    /// Zero the used counter, push the reset date forward and log a reset entry
    pub async fn reset_to_default(&self, user_id: &str) -> AppResult<CreditBalance> {
        let reset_date = self.next_reset_date(Utc::now());

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO ai_credits (user_id, total_credits, used_credits, reset_date)
            VALUES (?1, ?2, 0, ?3)
            ON CONFLICT(user_id) DO UPDATE SET used_credits = 0, reset_date = excluded.reset_date
            "#,
        )
        .bind(user_id)
        .bind(self.config.default_total)
        .bind(db::format_timestamp(reset_date))
        .execute(&mut *tx)
        .await?;

        insert_usage(
            &mut tx,
            user_id,
            CreditUsageType::AiCreditsReset,
            0,
            Some("Credits automatically replenished."),
        )
        .await?;
        let balance = fetch_balance(&mut tx, user_id).await?;
        tx.commit().await?;

        tracing::info!("Reset credits for {} until {}", user_id, balance.reset_date);
        Ok(balance)
    }

    /// Reset every balance whose reset date is not after `now`
    pub async fn reset_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let rows = sqlx::query("SELECT user_id FROM ai_credits WHERE reset_date <= ?")
            .bind(db::format_timestamp(now))
            .fetch_all(&self.db)
            .await?;

        let mut count = 0;
        for row in rows {
            let user_id: String = row.get("user_id");
            self.reset_to_default(&user_id).await?;
            count += 1;
        }

        Ok(count)
    }

    /// Usage log, newest first
    pub async fn list_usage(&self, user_id: &str, limit: i64) -> AppResult<Vec<CreditUsage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, usage_type, credits, timestamp, description
            FROM ai_credit_usage
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CreditUsage {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    usage_type: CreditUsageType::from_str(&row.get::<String, _>("usage_type"))?,
                    credits: row.get("credits"),
                    timestamp: db::parse_timestamp(&row.get::<String, _>("timestamp"))?,
                    description: row.get("description"),
                })
            })
            .collect()
    }

    /// Consumption grouped by category, in order of first use
    pub async fn usage_stats(&self, user_id: &str) -> AppResult<Vec<UsageStat>> {
        let rows = sqlx::query(
            "SELECT usage_type, credits FROM ai_credit_usage WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let mut order = Vec::new();
        let mut by_type: HashMap<CreditUsageType, i64> = HashMap::new();
        let mut total_used = 0;

        for row in rows {
            let usage_type = CreditUsageType::from_str(&row.get::<String, _>("usage_type"))?;
            let credits: i64 = row.get("credits");
            if !by_type.contains_key(&usage_type) {
                order.push(usage_type);
            }
            *by_type.entry(usage_type).or_insert(0) += credits;
            total_used += credits;
        }

        Ok(order
            .into_iter()
            .map(|usage_type| {
                let used = by_type[&usage_type];
                let percentage = if total_used > 0 {
                    ((used as f64 / total_used as f64) * 100.0).round() as i64
                } else {
                    0
                };
                UsageStat {
                    usage_type,
                    used,
                    percentage,
                }
            })
            .collect())
    }

    async fn ensure_row(&self, tx: &mut Transaction<'_, Sqlite>, user_id: &str) -> AppResult<()> {
        let balance = self.default_balance();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO ai_credits (user_id, total_credits, used_credits, reset_date)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(user_id)
        .bind(balance.total_credits)
        .bind(db::format_timestamp(balance.reset_date))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

async fn insert_usage(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    usage_type: CreditUsageType,
    credits: i64,
    description: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO ai_credit_usage (user_id, usage_type, credits, timestamp, description)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(usage_type.as_str())
    .bind(credits)
    .bind(db::now_timestamp())
    .bind(description)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn fetch_balance(tx: &mut Transaction<'_, Sqlite>, user_id: &str) -> AppResult<CreditBalance> {
    let row = sqlx::query(
        "SELECT total_credits, used_credits, reset_date FROM ai_credits WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    parse_balance(&row)
}

fn parse_balance(row: &sqlx::sqlite::SqliteRow) -> AppResult<CreditBalance> {
    Ok(CreditBalance {
        total_credits: row.get("total_credits"),
        used_credits: row.get("used_credits"),
        reset_date: db::parse_timestamp(&row.get::<String, _>("reset_date"))?,
    })
}
