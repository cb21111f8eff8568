use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{DEFAULT_TOKENS, NATIVE_TOKEN_ADDRESS};

// ==================== PROGRESS ====================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_address: String,
    pub tutorials_completed: Vec<String>,
    pub quiz_scores: BTreeMap<String, u8>,
    pub achievements_unlocked: Vec<String>,
    pub total_points: u64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(user_address: &str) -> Self {
        let now = Utc::now();
        Self {
            user_address: user_address.to_string(),
            tutorials_completed: Vec::new(),
            quiz_scores: BTreeMap::new(),
            achievements_unlocked: Vec::new(),
            total_points: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_completed(&self, tutorial_id: &str) -> bool {
        self.tutorials_completed.iter().any(|id| id == tutorial_id)
    }

    pub fn has_unlocked(&self, achievement_id: &str) -> bool {
        self.achievements_unlocked.iter().any(|id| id == achievement_id)
    }

    pub fn perfect_quiz_count(&self) -> u64 {
        self.quiz_scores
            .values()
            .filter(|score| **score == crate::constants::PERFECT_QUIZ_SCORE)
            .count() as u64
    }
}

// ==================== TOKENS ====================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomToken {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl CustomToken {
    pub fn is_native(&self) -> bool {
        self.address.eq_ignore_ascii_case(NATIVE_TOKEN_ADDRESS)
    }

    /// CAIP-19 asset identifier understood by the wallet SDK.
    pub fn caip19(&self, chain_id: u64) -> String {
        if self.is_native() {
            format!("eip155:{}/slip44:60", chain_id)
        } else {
            format!("eip155:{}/erc20:{}", chain_id, self.address)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserTokens {
    pub user_address: String,
    pub tokens: Vec<CustomToken>,
    pub version: i64,
}

impl UserTokens {
    pub fn with_defaults(user_address: &str) -> Self {
        let tokens = DEFAULT_TOKENS
            .iter()
            .map(|(address, symbol, name, decimals, icon)| CustomToken {
                address: address.to_string(),
                symbol: symbol.to_string(),
                name: name.to_string(),
                decimals: *decimals,
                icon: Some(icon.to_string()),
            })
            .collect();
        Self {
            user_address: user_address.to_string(),
            tokens,
            version: 0,
        }
    }
}

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub limit: u32,
    pub total: usize,
}
