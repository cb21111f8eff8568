//! Persistence for user documents (progress, token lists) and reported transactions.
//!
//! Documents carry a `version`. `save_*` only succeeds when the stored version still
//! equals the version that was read, and bumps it by one; callers re-read and retry on
//! `false`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{Transaction, TransactionFilter, TransactionStatus, UserProgress, UserTokens},
};

#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> bool {
        true
    }

    // ==================== PROGRESS ====================

    /// Returns the wallet's progress document, creating an empty one on first read.
    async fn load_progress(&self, user_address: &str) -> Result<UserProgress>;

    /// Compare-and-swap on `progress.version`.
    async fn save_progress(&self, progress: &UserProgress) -> Result<bool>;

    /// Ordered by total points (desc), ties by creation order.
    async fn top_progress(&self, limit: u32) -> Result<Vec<UserProgress>>;

    async fn count_users(&self) -> Result<usize>;

    // ==================== TOKENS ====================

    /// Returns the wallet's token list, seeding the defaults on first access.
    async fn load_tokens(&self, user_address: &str) -> Result<UserTokens>;

    /// Compare-and-swap on `tokens.version`.
    async fn save_tokens(&self, tokens: &UserTokens) -> Result<bool>;

    // ==================== TRANSACTIONS ====================

    /// Returns `false` when the tx hash is already recorded.
    async fn insert_transaction(&self, tx: &Transaction) -> Result<bool>;

    async fn get_transaction(&self, tx_hash: &str) -> Result<Option<Transaction>>;

    /// Newest first.
    async fn list_transactions(
        &self,
        user_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>>;

    /// Rows matching the filter, ignoring its limit.
    async fn count_transactions(&self, user_id: &str, filter: &TransactionFilter) -> Result<usize>;

    /// Sets `next` only if the stored status is still `current`.
    async fn set_transaction_status(
        &self,
        tx_hash: &str,
        current: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<bool>;
}
