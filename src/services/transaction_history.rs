use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    constants::{BASE_NETWORK, DEFAULT_PAGE_LIMIT, MAX_WRITE_ATTEMPTS},
    db::Store,
    error::{AppError, Result},
    models::{
        PaginatedResponse, Transaction, TransactionFilter, TransactionStatus, TransactionType,
    },
    utils::{ensure_page_limit, normalize_address, normalize_tx_hash, parse_positive_amount},
};

/// A transaction as reported by the client after it was broadcast.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub user_id: String,
    pub tx_hash: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub token_symbol: String,
    #[serde(default, deserialize_with = "crate::utils::string_or_number")]
    pub amount: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

fn parse_type(raw: &str) -> Result<TransactionType> {
    raw.parse().map_err(AppError::BadRequest)
}

fn parse_status(raw: &str) -> Result<TransactionStatus> {
    raw.parse().map_err(AppError::BadRequest)
}

// Wallet addresses are lowercased; other user ids (e.g. a Farcaster fid) are kept as given.
fn normalize_user_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("userId is required".to_string()));
    }
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return normalize_address(trimmed);
    }
    Ok(trimmed.to_string())
}

pub struct TransactionHistoryService {
    store: Arc<dyn Store>,
}

impl TransactionHistoryService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(&self, input: NewTransaction) -> Result<Transaction> {
        let tx_hash = normalize_tx_hash(&input.tx_hash)?;
        let user_id = normalize_user_id(&input.user_id)?;
        let amount = input
            .amount
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("amount is required".to_string()))?;
        let amount = parse_positive_amount(amount)?.normalize().to_string();
        let token_symbol = input.token_symbol.trim().to_string();
        if token_symbol.is_empty() {
            return Err(AppError::BadRequest("tokenSymbol is required".to_string()));
        }

        let tx = Transaction {
            user_id,
            tx_hash,
            tx_type: parse_type(&input.tx_type)?,
            token_symbol,
            amount,
            status: input
                .status
                .as_deref()
                .map(parse_status)
                .transpose()?
                .unwrap_or(TransactionStatus::Pending),
            timestamp: Utc::now(),
            network: input
                .network
                .map(|n| n.trim().to_ascii_lowercase())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| BASE_NETWORK.to_string()),
            metadata: input.metadata.unwrap_or(serde_json::Value::Null),
        };

        if !self.store.insert_transaction(&tx).await? {
            return Err(AppError::Conflict(format!(
                "Transaction {} is already recorded",
                tx.tx_hash
            )));
        }
        tracing::info!(
            "Recorded {} {} {} for {} ({})",
            tx.tx_type,
            tx.amount,
            tx.token_symbol,
            tx.user_id,
            tx.tx_hash
        );
        Ok(tx)
    }

    /// Newest first, optionally filtered by type and status.
    pub async fn list(
        &self,
        user_id: &str,
        tx_type: Option<&str>,
        status: Option<&str>,
        limit: Option<u32>,
    ) -> Result<PaginatedResponse<Transaction>> {
        let user_id = normalize_user_id(user_id)?;
        let filter = TransactionFilter {
            tx_type: tx_type.map(parse_type).transpose()?,
            status: status.map(parse_status).transpose()?,
            limit: ensure_page_limit(limit, DEFAULT_PAGE_LIMIT)?,
        };
        let items = self.store.list_transactions(&user_id, &filter).await?;
        let total = self.store.count_transactions(&user_id, &filter).await?;
        Ok(PaginatedResponse {
            total,
            limit: filter.limit,
            items,
        })
    }

    pub async fn get(&self, tx_hash: &str) -> Result<Transaction> {
        let tx_hash = normalize_tx_hash(tx_hash)?;
        self.store
            .get_transaction(&tx_hash)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", tx_hash)))
    }

    /// Moves a pending transaction to its final status. Re-sending the current
    /// status is a no-op; a completed or failed transaction never changes again.
    pub async fn update_status(&self, tx_hash: &str, status: &str) -> Result<Transaction> {
        let next = parse_status(status)?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut tx = self.get(tx_hash).await?;
            if tx.status == next {
                return Ok(tx);
            }
            if !tx.status.can_transition_to(next) {
                return Err(AppError::BadRequest(format!(
                    "Transaction is already {} and cannot become {}",
                    tx.status, next
                )));
            }
            if self
                .store
                .set_transaction_status(&tx.tx_hash, tx.status, next)
                .await?
            {
                tracing::info!("Transaction {}: {} -> {}", tx.tx_hash, tx.status, next);
                tx.status = next;
                return Ok(tx);
            }
        }
        Err(AppError::Conflict(
            "Transaction status changed concurrently, please retry".to_string(),
        ))
    }
}
