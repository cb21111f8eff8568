//! Chat sessions keyed by conversation id, expiring after a TTL.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::{
    error::{AppError, Result},
    models::Conversation,
};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn load(&self, id: &str) -> Result<Option<Conversation>>;

    /// Writes the conversation and restarts its TTL.
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Fixed-window counter: increments `key` and returns the count within the window.
    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<u64>;
}

// ==================== MEMORY ====================

#[derive(Default)]
struct MemoryState {
    conversations: HashMap<String, (Conversation, Instant)>,
    counters: HashMap<String, (u64, Instant)>,
}

#[derive(Clone)]
pub struct MemoryConversationStore {
    ttl: Duration,
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryConversationStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .get(id)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(conversation, _)| conversation.clone()))
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let now = Instant::now();
        let mut state = self.state.write().await;
        state.conversations.retain(|_, (_, expires_at)| *expires_at > now);
        state
            .conversations
            .insert(conversation.id.clone(), (conversation.clone(), now + self.ttl));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.state.write().await.conversations.remove(id);
        Ok(removed.is_some_and(|(_, expires_at)| expires_at > Instant::now()))
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<u64> {
        let now = Instant::now();
        let mut state = self.state.write().await;
        state.counters.retain(|_, (_, resets_at)| *resets_at > now);
        let entry = state
            .counters
            .entry(key.to_string())
            .or_insert((0, now + Duration::from_secs(window_secs)));
        entry.0 += 1;
        Ok(entry.0)
    }
}

// ==================== REDIS ====================

const CONVERSATION_KEY_PREFIX: &str = "apex:chat:";

#[derive(Clone)]
pub struct RedisConversationStore {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisConversationStore {
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, ttl_secs })
    }

    fn key(id: &str) -> String {
        format!("{}{}", CONVERSATION_KEY_PREFIX, id)
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(id)).await?;
        raw.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| AppError::Internal(format!("Corrupt conversation {}: {}", id, e)))
        })
        .transpose()
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let json = serde_json::to_string(conversation)
            .map_err(|e| AppError::Internal(format!("Failed to encode conversation: {}", e)))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::key(&conversation.id), json, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(Self::key(id)).await?;
        Ok(removed > 0)
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(key, 1_i64).await?;
        if count == 1 {
            let expired: std::result::Result<bool, redis::RedisError> =
                conn.expire(key, window_secs as i64).await;
            if let Err(err) = expired {
                tracing::warn!("Failed to set expiry on {}: {}", key, err);
            }
        }
        Ok(count.max(0) as u64)
    }
}
