use serde::Deserialize;
use std::env;

use crate::constants::{BASE_CHAIN_ID, DEFAULT_BASE_RPC_URL, DEFAULT_DEX_ROUTER};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Database (in-memory store when unset)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Redis (in-memory conversation store when unset)
    pub redis_url: Option<String>,

    // Blockchain
    pub base_rpc_url: String,
    pub base_chain_id: u64,
    pub dex_router_address: String,

    // LLM
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub llm_timeout_secs: u64,

    // Sessions and caches
    pub conversation_ttl_secs: u64,
    pub conversation_max_messages: usize,
    pub portfolio_cache_ttl_secs: u64,
    pub chat_rate_limit_per_minute: u64,

    // CORS
    pub cors_allowed_origins: String,
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            database_url: optional_var("DATABASE_URL"),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            redis_url: optional_var("REDIS_URL"),

            base_rpc_url: env::var("BASE_RPC_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_RPC_URL.to_string()),
            base_chain_id: env::var("BASE_CHAIN_ID")
                .unwrap_or_else(|_| BASE_CHAIN_ID.to_string())
                .parse()?,
            dex_router_address: env::var("DEX_ROUTER_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_DEX_ROUTER.to_string()),

            openai_api_key: optional_var("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,

            conversation_ttl_secs: env::var("CONVERSATION_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
            conversation_max_messages: env::var("CONVERSATION_MAX_MESSAGES")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            portfolio_cache_ttl_secs: env::var("PORTFOLIO_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            chat_rate_limit_per_minute: env::var("CHAT_RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_rpc_url.trim().is_empty() {
            anyhow::bail!("BASE_RPC_URL is empty");
        }
        url::Url::parse(&self.base_rpc_url)
            .map_err(|e| anyhow::anyhow!("BASE_RPC_URL is not a valid URL: {}", e))?;
        if crate::utils::normalize_address(&self.dex_router_address).is_err() {
            anyhow::bail!("DEX_ROUTER_ADDRESS is not a valid address");
        }
        if self.conversation_max_messages < 2 {
            anyhow::bail!("CONVERSATION_MAX_MESSAGES must be at least 2");
        }
        if self.llm_timeout_secs == 0 {
            anyhow::bail!("LLM_TIMEOUT_SECS must be > 0");
        }

        if self.database_url.is_none() {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data lost on restart)");
        }
        if self.redis_url.is_none() {
            tracing::warn!("REDIS_URL not set; conversations are kept in process memory");
        }
        if self.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set; chat falls back to keyword intent parsing");
        }
        if self.base_chain_id != BASE_CHAIN_ID {
            tracing::warn!("BASE_CHAIN_ID={} is not Base mainnet", self.base_chain_id);
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_testnet(&self) -> bool {
        self.environment == "testnet" || self.base_chain_id != BASE_CHAIN_ID
    }

    pub fn has_llm_provider(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "development".to_string(),
        database_url: None,
        database_max_connections: 1,
        redis_url: None,
        base_rpc_url: "http://localhost:8545".to_string(),
        base_chain_id: BASE_CHAIN_ID,
        dex_router_address: DEFAULT_DEX_ROUTER.to_string(),
        openai_api_key: None,
        openai_model: "gpt-4o-mini".to_string(),
        openai_base_url: "http://localhost:9999/v1".to_string(),
        llm_timeout_secs: 5,
        conversation_ttl_secs: 3600,
        conversation_max_messages: 20,
        portfolio_cache_ttl_secs: 30,
        chat_rate_limit_per_minute: 20,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_router() {
        let mut config = test_config();
        config.dex_router_address = "router".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_tiny_conversation_cap() {
        let mut config = test_config();
        config.conversation_max_messages = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn is_testnet_follows_chain_id() {
        let mut config = test_config();
        assert!(!config.is_testnet());
        config.base_chain_id = 84532;
        assert!(config.is_testnet());
    }
}
