use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::{
    error::Result,
    models::CustomToken,
    services::{
        onchain::{format_token_amount, ChainReader},
        token_registry::TokenRegistry,
    },
    utils::normalize_address,
};

const PORTFOLIO_CACHE_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    #[serde(flatten)]
    pub token: CustomToken,
    pub balance: String,
    pub balance_base_units: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub address: String,
    pub chain_id: u64,
    pub balances: Vec<TokenBalance>,
    pub fetched_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn empty(address: &str, chain_id: u64) -> Self {
        Self {
            address: address.to_string(),
            chain_id,
            balances: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    /// One-line summary used in chat prompts and replies, e.g. "1.5 ETH, 20 USDC".
    pub fn summary(&self) -> String {
        let held: Vec<String> = self
            .balances
            .iter()
            .filter(|b| b.balance != "0")
            .map(|b| format!("{} {}", b.balance, b.token.symbol))
            .collect();
        if held.is_empty() {
            "no token balances".to_string()
        } else {
            held.join(", ")
        }
    }

    pub fn balance_of(&self, symbol: &str) -> Option<&TokenBalance> {
        self.balances
            .iter()
            .find(|b| b.token.symbol.eq_ignore_ascii_case(symbol))
    }
}

#[derive(Clone)]
struct CachedPortfolio {
    fetched_at: Instant,
    portfolio: Portfolio,
}

/// Balances of every token in a wallet's list, cached per address for a short TTL.
#[derive(Clone)]
pub struct PortfolioService {
    registry: TokenRegistry,
    chain: Arc<dyn ChainReader>,
    chain_id: u64,
    ttl: Duration,
    cache: Arc<RwLock<HashMap<String, CachedPortfolio>>>,
}

impl PortfolioService {
    pub fn new(
        registry: TokenRegistry,
        chain: Arc<dyn ChainReader>,
        chain_id: u64,
        ttl_secs: u64,
    ) -> Self {
        Self {
            registry,
            chain,
            chain_id,
            ttl: Duration::from_secs(ttl_secs),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn snapshot(&self, address: &str) -> Result<Portfolio> {
        let address = normalize_address(address)?;
        if let Some(cached) = self.cache.read().await.get(&address) {
            if cached.fetched_at.elapsed() <= self.ttl {
                return Ok(cached.portfolio.clone());
            }
        }

        let tokens = self.registry.get_tokens(&address).await?.tokens;
        let fetches = tokens.into_iter().map(|token| {
            let owner = address.clone();
            async move {
                let raw = self.fetch_balance(&token, &owner).await;
                (token, raw)
            }
        });
        let results = futures_util::future::join_all(fetches).await;

        let mut balances = Vec::with_capacity(results.len());
        for (token, raw) in results {
            let formatted = raw.and_then(|value| {
                format_token_amount(value, token.decimals).map(|human| (value, human))
            });
            match formatted {
                Ok((value, balance)) => balances.push(TokenBalance {
                    token,
                    balance,
                    balance_base_units: value.to_string(),
                }),
                Err(err) => {
                    tracing::warn!("Skipping {} balance for {}: {}", token.symbol, address, err);
                }
            }
        }

        let portfolio = Portfolio {
            address: address.clone(),
            chain_id: self.chain_id,
            balances,
            fetched_at: Utc::now(),
        };
        self.store(&address, &portfolio).await;
        Ok(portfolio)
    }

    /// Like [`snapshot`](Self::snapshot) but never fails; chat uses this.
    pub async fn snapshot_or_empty(&self, address: &str) -> Portfolio {
        match self.snapshot(address).await {
            Ok(portfolio) => portfolio,
            Err(err) => {
                tracing::warn!("Portfolio unavailable for {}: {}", address, err);
                Portfolio::empty(&address.to_ascii_lowercase(), self.chain_id)
            }
        }
    }

    pub async fn invalidate(&self, address: &str) {
        self.cache
            .write()
            .await
            .remove(&address.trim().to_ascii_lowercase());
    }

    async fn fetch_balance(&self, token: &CustomToken, owner: &str) -> Result<U256> {
        if token.is_native() {
            self.chain.native_balance(owner).await
        } else {
            self.chain.erc20_balance(&token.address, owner).await
        }
    }

    async fn store(&self, address: &str, portfolio: &Portfolio) {
        let mut guard = self.cache.write().await;
        guard.insert(
            address.to_string(),
            CachedPortfolio {
                fetched_at: Instant::now(),
                portfolio: portfolio.clone(),
            },
        );
        if guard.len() > PORTFOLIO_CACHE_MAX_ENTRIES {
            let ttl = self.ttl;
            guard.retain(|_, entry| entry.fetched_at.elapsed() <= ttl);
        }
    }
}
