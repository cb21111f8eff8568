// All service modules
pub mod achievements;
pub mod chat;
pub mod conversation_store;
pub mod intent;
pub mod llm;
pub mod onchain;
pub mod portfolio;
pub mod progress_service;
pub mod swap_service;
pub mod token_registry;
pub mod transaction_history;

#[cfg(test)]
pub(crate) mod testing;

// Re-export for convenience
pub use chat::ChatService;
pub use conversation_store::{ConversationStore, MemoryConversationStore, RedisConversationStore};
pub use llm::{LlmClient, OpenAiClient};
pub use onchain::{BaseRpcReader, ChainReader};
pub use portfolio::PortfolioService;
pub use progress_service::ProgressService;
pub use swap_service::SwapService;
pub use token_registry::TokenRegistry;
pub use transaction_history::TransactionHistoryService;
