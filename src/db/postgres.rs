use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use std::collections::BTreeMap;

use super::Store;
use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        CustomToken, Transaction, TransactionFilter, TransactionStatus, UserProgress, UserTokens,
    },
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn new(config: &Config, database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(FromRow)]
struct ProgressRow {
    user_address: String,
    tutorials_completed: Vec<String>,
    quiz_scores: Json<BTreeMap<String, u8>>,
    achievements_unlocked: Vec<String>,
    total_points: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProgressRow> for UserProgress {
    fn from(row: ProgressRow) -> Self {
        UserProgress {
            user_address: row.user_address,
            tutorials_completed: row.tutorials_completed,
            quiz_scores: row.quiz_scores.0,
            achievements_unlocked: row.achievements_unlocked,
            total_points: row.total_points.max(0) as u64,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TokensRow {
    user_address: String,
    tokens: Json<Vec<CustomToken>>,
    version: i64,
}

#[derive(FromRow)]
struct TransactionRow {
    user_id: String,
    tx_hash: String,
    tx_type: String,
    token_symbol: String,
    amount: String,
    status: String,
    timestamp: DateTime<Utc>,
    network: String,
    metadata: serde_json::Value,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(Transaction {
            tx_type: row.tx_type.parse().map_err(AppError::Internal)?,
            status: row.status.parse().map_err(AppError::Internal)?,
            user_id: row.user_id,
            tx_hash: row.tx_hash,
            token_symbol: row.token_symbol,
            amount: row.amount,
            timestamp: row.timestamp,
            network: row.network,
            metadata: row.metadata,
        })
    }
}

fn points_to_db(points: u64) -> Result<i64> {
    i64::try_from(points).map_err(|_| AppError::Internal("Point total overflow".to_string()))
}

const PROGRESS_COLUMNS: &str = "user_address, tutorials_completed, quiz_scores, \
     achievements_unlocked, total_points, version, created_at, updated_at";

// ==================== PROGRESS QUERIES ====================
#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> bool {
        self.pool.acquire().await.is_ok()
    }

    async fn load_progress(&self, user_address: &str) -> Result<UserProgress> {
        sqlx::query(
            "INSERT INTO user_progress (user_address) VALUES ($1)
             ON CONFLICT (user_address) DO NOTHING",
        )
        .bind(user_address)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {} FROM user_progress WHERE user_address = $1",
            PROGRESS_COLUMNS
        ))
        .bind(user_address)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn save_progress(&self, progress: &UserProgress) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_progress
            SET tutorials_completed   = $2,
                quiz_scores           = $3,
                achievements_unlocked = $4,
                total_points          = $5,
                version               = version + 1,
                updated_at            = NOW()
            WHERE user_address = $1 AND version = $6
            "#,
        )
        .bind(&progress.user_address)
        .bind(&progress.tutorials_completed)
        .bind(Json(&progress.quiz_scores))
        .bind(&progress.achievements_unlocked)
        .bind(points_to_db(progress.total_points)?)
        .bind(progress.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn top_progress(&self, limit: u32) -> Result<Vec<UserProgress>> {
        let rows = sqlx::query_as::<_, ProgressRow>(&format!(
            "SELECT {} FROM user_progress ORDER BY total_points DESC, seq ASC LIMIT $1",
            PROGRESS_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_users(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_progress")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    // ==================== TOKEN QUERIES ====================

    async fn load_tokens(&self, user_address: &str) -> Result<UserTokens> {
        let defaults = UserTokens::with_defaults(user_address);
        sqlx::query(
            "INSERT INTO user_tokens (user_address, tokens) VALUES ($1, $2)
             ON CONFLICT (user_address) DO NOTHING",
        )
        .bind(user_address)
        .bind(Json(&defaults.tokens))
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, TokensRow>(
            "SELECT user_address, tokens, version FROM user_tokens WHERE user_address = $1",
        )
        .bind(user_address)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserTokens {
            user_address: row.user_address,
            tokens: row.tokens.0,
            version: row.version,
        })
    }

    async fn save_tokens(&self, tokens: &UserTokens) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE user_tokens
             SET tokens = $2, version = version + 1, updated_at = NOW()
             WHERE user_address = $1 AND version = $3",
        )
        .bind(&tokens.user_address)
        .bind(Json(&tokens.tokens))
        .bind(tokens.version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ==================== TRANSACTION QUERIES ====================

    async fn insert_transaction(&self, tx: &Transaction) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (tx_hash, user_id, tx_type, token_symbol, amount,
                 status, timestamp, network, metadata)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            ON CONFLICT (tx_hash) DO NOTHING
            "#,
        )
        .bind(&tx.tx_hash)
        .bind(&tx.user_id)
        .bind(tx.tx_type.as_str())
        .bind(&tx.token_symbol)
        .bind(&tx.amount)
        .bind(tx.status.as_str())
        .bind(tx.timestamp)
        .bind(&tx.network)
        .bind(&tx.metadata)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_transaction(&self, tx_hash: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT user_id, tx_hash, tx_type, token_symbol, amount, status,
                    timestamp, network, metadata
             FROM transactions WHERE tx_hash = $1",
        )
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Transaction::try_from).transpose()
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT user_id, tx_hash, tx_type, token_symbol, amount, status,
                    timestamp, network, metadata
             FROM transactions
             WHERE user_id = $1
               AND ($2::TEXT IS NULL OR tx_type = $2)
               AND ($3::TEXT IS NULL OR status = $3)
             ORDER BY timestamp DESC, id DESC
             LIMIT $4",
        )
        .bind(user_id)
        .bind(filter.tx_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(i64::from(filter.limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn count_transactions(&self, user_id: &str, filter: &TransactionFilter) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions
             WHERE user_id = $1
               AND ($2::TEXT IS NULL OR tx_type = $2)
               AND ($3::TEXT IS NULL OR status = $3)",
        )
        .bind(user_id)
        .bind(filter.tx_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as usize)
    }

    async fn set_transaction_status(
        &self,
        tx_hash: &str,
        current: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET status = $3 WHERE tx_hash = $1 AND status = $2",
        )
        .bind(tx_hash)
        .bind(current.as_str())
        .bind(next.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
