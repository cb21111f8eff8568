// src/api/mod.rs

pub mod achievements;
pub mod chat;
pub mod health;
pub mod leaderboard;
pub mod portfolio;
pub mod swap;
pub mod tokens;
pub mod transactions;
pub mod tutorials;

use axum::extract::{FromRequest, FromRequestParts};
use std::sync::Arc;

use crate::{
    config::Config,
    db::Store,
    error::AppError,
    services::{
        ChainReader, ChatService, ConversationStore, LlmClient, PortfolioService, SwapService,
        TokenRegistry,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub conversations: Arc<dyn ConversationStore>,
    pub chain: Arc<dyn ChainReader>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub portfolio: PortfolioService,
    pub config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        conversations: Arc<dyn ConversationStore>,
        chain: Arc<dyn ChainReader>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let portfolio = PortfolioService::new(
            TokenRegistry::new(store.clone()),
            chain.clone(),
            config.base_chain_id,
            config.portfolio_cache_ttl_secs,
        );
        Self {
            store,
            conversations,
            chain,
            llm,
            portfolio,
            config,
        }
    }

    pub fn token_registry(&self) -> TokenRegistry {
        TokenRegistry::new(self.store.clone())
    }

    pub fn swap_service(&self) -> SwapService {
        SwapService::new(self.token_registry(), self.chain.clone(), &self.config)
    }

    pub fn chat_service(&self) -> ChatService {
        ChatService::new(
            self.token_registry(),
            self.swap_service(),
            self.portfolio.clone(),
            self.chain.clone(),
            self.llm.clone(),
            self.conversations.clone(),
            &self.config,
        )
    }
}

/// `Json` whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejections use the API error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
