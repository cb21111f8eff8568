use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Send,
    Swap,
    Receive,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Send => "send",
            TransactionType::Swap => "swap",
            TransactionType::Receive => "receive",
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "send" => Ok(TransactionType::Send),
            "swap" => Ok(TransactionType::Swap),
            "receive" => Ok(TransactionType::Receive),
            other => Err(format!("Unknown transaction type: {}", other)),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Pending may move to any status; terminal statuses only to themselves.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        *self == next || !self.is_terminal()
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("Unknown transaction status: {}", other)),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== TRANSACTION ====================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub user_id: String,
    pub tx_hash: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub token_symbol: String,
    pub amount: String,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    pub network: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub tx_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub limit: u32,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.tx_type.map(|t| t == tx.tx_type).unwrap_or(true)
            && self.status.map(|s| s == tx.status).unwrap_or(true)
    }
}
