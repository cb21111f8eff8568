use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::Store;
use crate::{
    error::Result,
    models::{Transaction, TransactionFilter, TransactionStatus, UserProgress, UserTokens},
};

#[derive(Debug, Default)]
struct ProgressTable {
    by_address: HashMap<String, UserProgress>,
    // creation order, used as the leaderboard tie-breaker
    order: Vec<String>,
}

#[derive(Debug, Default)]
struct TransactionTable {
    rows: Vec<Transaction>,
    by_hash: HashMap<String, usize>,
}

/// Process-local store. Used when no database is configured and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    progress: Arc<RwLock<ProgressTable>>,
    tokens: Arc<RwLock<HashMap<String, UserTokens>>>,
    transactions: Arc<RwLock<TransactionTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load_progress(&self, user_address: &str) -> Result<UserProgress> {
        if let Some(found) = self.progress.read().await.by_address.get(user_address) {
            return Ok(found.clone());
        }

        let mut table = self.progress.write().await;
        if let Some(found) = table.by_address.get(user_address) {
            return Ok(found.clone());
        }
        let created = UserProgress::new(user_address);
        table
            .by_address
            .insert(user_address.to_string(), created.clone());
        table.order.push(user_address.to_string());
        Ok(created)
    }

    async fn save_progress(&self, progress: &UserProgress) -> Result<bool> {
        let mut table = self.progress.write().await;
        let Some(stored) = table.by_address.get_mut(&progress.user_address) else {
            return Ok(false);
        };
        if stored.version != progress.version {
            return Ok(false);
        }
        let mut next = progress.clone();
        next.version += 1;
        next.updated_at = Utc::now();
        *stored = next;
        Ok(true)
    }

    async fn top_progress(&self, limit: u32) -> Result<Vec<UserProgress>> {
        let table = self.progress.read().await;
        let mut rows: Vec<UserProgress> = table
            .order
            .iter()
            .filter_map(|address| table.by_address.get(address).cloned())
            .collect();
        // stable: equal totals keep creation order
        rows.sort_by(|a, b| b.total_points.cmp(&a.total_points));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn count_users(&self) -> Result<usize> {
        Ok(self.progress.read().await.by_address.len())
    }

    async fn load_tokens(&self, user_address: &str) -> Result<UserTokens> {
        let mut tokens = self.tokens.write().await;
        let entry = tokens
            .entry(user_address.to_string())
            .or_insert_with(|| UserTokens::with_defaults(user_address));
        Ok(entry.clone())
    }

    async fn save_tokens(&self, list: &UserTokens) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        let Some(stored) = tokens.get_mut(&list.user_address) else {
            return Ok(false);
        };
        if stored.version != list.version {
            return Ok(false);
        }
        let mut next = list.clone();
        next.version += 1;
        *stored = next;
        Ok(true)
    }

    async fn insert_transaction(&self, tx: &Transaction) -> Result<bool> {
        let mut table = self.transactions.write().await;
        if table.by_hash.contains_key(&tx.tx_hash) {
            return Ok(false);
        }
        let idx = table.rows.len();
        table.rows.push(tx.clone());
        table.by_hash.insert(tx.tx_hash.clone(), idx);
        Ok(true)
    }

    async fn get_transaction(&self, tx_hash: &str) -> Result<Option<Transaction>> {
        let table = self.transactions.read().await;
        Ok(table
            .by_hash
            .get(tx_hash)
            .and_then(|idx| table.rows.get(*idx))
            .cloned())
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let table = self.transactions.read().await;
        let mut rows: Vec<Transaction> = table
            .rows
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user_id && filter.matches(tx))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(filter.limit as usize);
        Ok(rows)
    }

    async fn count_transactions(&self, user_id: &str, filter: &TransactionFilter) -> Result<usize> {
        let table = self.transactions.read().await;
        Ok(table
            .rows
            .iter()
            .filter(|tx| tx.user_id == user_id && filter.matches(tx))
            .count())
    }

    async fn set_transaction_status(
        &self,
        tx_hash: &str,
        current: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<bool> {
        let mut table = self.transactions.write().await;
        let Some(idx) = table.by_hash.get(tx_hash).copied() else {
            return Ok(false);
        };
        match table.rows.get_mut(idx) {
            Some(tx) if tx.status == current => {
                tx.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
