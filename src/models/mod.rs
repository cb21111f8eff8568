// src/models/mod.rs
pub mod conversation;
pub mod transaction;
pub mod user;

pub use conversation::{ChatMessage, ChatRole, Conversation};
pub use transaction::{Transaction, TransactionFilter, TransactionStatus, TransactionType};
pub use user::{ApiResponse, CustomToken, PaginatedResponse, UserProgress, UserTokens};
