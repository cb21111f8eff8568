//! One chat turn: classify the message, run the matching action and keep the
//! conversation. Actions that move funds only return `actionData` for the client
//! wallet to sign; nothing here submits transactions.

use ethers::types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    config::Config,
    constants::{CHAT_APOLOGY, CHAT_HISTORY_WINDOW},
    error::{AppError, Result},
    models::{ChatMessage, ChatRole, Conversation, CustomToken},
    services::{
        conversation_store::ConversationStore,
        intent::{classify_by_keywords, classify_with_llm, Intent, IntentClassification},
        llm::{history_messages, LlmClient, LlmMessage},
        onchain::{parse_token_amount, ChainReader},
        portfolio::{Portfolio, PortfolioService},
        swap_service::SwapService,
        token_registry::{find_token, NewToken, TokenRegistry},
    },
    utils::{normalize_address, random_id},
};

const MAX_MESSAGE_CHARS: usize = 2_000;
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

const HELP_TEXT: &str = "I can help you with your wallet on Base:\n\
- \"send 10 USDC to 0x...\"\n\
- \"swap 0.1 ETH to USDC\"\n\
- \"what's my balance?\"\n\
- \"add token 0x...\"\n\
- or ask me anything about Base.";

const OFFLINE_ANSWER: &str = "Base is an Ethereum layer 2 built by Coinbase on the OP Stack. \
Transactions settle to Ethereum while costing a fraction of the fees. \
Try the tutorials to learn more, or ask me to check balances, send or swap tokens.";

const ANSWER_PROMPT: &str = "You are Apex, a friendly assistant inside a Farcaster mini app \
for the Base network. Answer questions about Base, Ethereum, wallets and DeFi concisely \
(at most a few short paragraphs). Never ask for private keys or seed phrases. \
The user's current portfolio: {portfolio}.";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub user_address: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub conversation_id: String,
    pub intent: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_data: Option<Value>,
    pub needs_action: bool,
}

#[derive(Debug)]
struct TurnReply {
    intent: &'static str,
    response: String,
    action_data: Option<Value>,
    needs_action: bool,
}

impl TurnReply {
    fn say(intent: Intent, response: impl Into<String>) -> Self {
        Self {
            intent: intent.as_str(),
            response: response.into(),
            action_data: None,
            needs_action: false,
        }
    }

    fn action(intent: Intent, response: String, action_data: Value) -> Self {
        Self {
            intent: intent.as_str(),
            response,
            action_data: Some(action_data),
            needs_action: true,
        }
    }

    fn apology() -> Self {
        Self {
            intent: "error",
            response: CHAT_APOLOGY.to_string(),
            action_data: None,
            needs_action: false,
        }
    }
}

struct Turn<'a> {
    user_address: &'a str,
    message: &'a str,
    history: &'a [ChatMessage],
    tokens: &'a [CustomToken],
    portfolio: &'a Portfolio,
}

pub struct ChatService {
    registry: TokenRegistry,
    swaps: SwapService,
    portfolio: PortfolioService,
    chain: Arc<dyn ChainReader>,
    llm: Option<Arc<dyn LlmClient>>,
    conversations: Arc<dyn ConversationStore>,
    chain_id: u64,
    max_messages: usize,
    rate_limit_per_minute: u64,
}

impl ChatService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: TokenRegistry,
        swaps: SwapService,
        portfolio: PortfolioService,
        chain: Arc<dyn ChainReader>,
        llm: Option<Arc<dyn LlmClient>>,
        conversations: Arc<dyn ConversationStore>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            swaps,
            portfolio,
            chain,
            llm,
            conversations,
            chain_id: config.base_chain_id,
            max_messages: config.conversation_max_messages,
            rate_limit_per_minute: config.chat_rate_limit_per_minute,
        }
    }

    pub async fn respond(&self, request: ChatRequest) -> Result<ChatReply> {
        let user_address = normalize_address(&request.user_address)?;
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::BadRequest("message is required".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::BadRequest(format!(
                "message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        self.enforce_rate_limit(&user_address).await?;

        let mut conversation = self
            .load_or_create(request.conversation_id.as_deref(), &user_address)
            .await;
        let portfolio = self.portfolio.snapshot_or_empty(&user_address).await;
        let tokens = match self.registry.get_tokens(&user_address).await {
            Ok(list) => list.tokens,
            Err(err) => {
                tracing::warn!("Token list unavailable for {}: {}", user_address, err);
                Vec::new()
            }
        };

        let turn = Turn {
            user_address: &user_address,
            message,
            history: conversation.recent(CHAT_HISTORY_WINDOW),
            tokens: &tokens,
            portfolio: &portfolio,
        };
        let reply = match self.handle(&turn).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!("Chat turn failed for {}: {}", user_address, err);
                TurnReply::apology()
            }
        };

        conversation.push(ChatRole::User, message, self.max_messages);
        conversation.push(ChatRole::Assistant, reply.response.clone(), self.max_messages);
        if let Err(err) = self.conversations.save(&conversation).await {
            tracing::warn!("Failed to save conversation {}: {}", conversation.id, err);
        }

        Ok(ChatReply {
            conversation_id: conversation.id,
            intent: reply.intent.to_string(),
            response: reply.response,
            action_data: reply.action_data,
            needs_action: reply.needs_action,
        })
    }

    pub async fn history(&self, conversation_id: &str) -> Result<Conversation> {
        self.conversations
            .load(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {} not found", conversation_id)))
    }

    pub async fn clear(&self, conversation_id: &str) -> Result<()> {
        if !self.conversations.delete(conversation_id).await? {
            return Err(AppError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }
        Ok(())
    }

    async fn enforce_rate_limit(&self, user_address: &str) -> Result<()> {
        if self.rate_limit_per_minute == 0 {
            return Ok(());
        }
        let key = format!("apex:rl:chat:{}", user_address);
        match self
            .conversations
            .incr_window(&key, RATE_LIMIT_WINDOW_SECS)
            .await
        {
            Ok(count) if count > self.rate_limit_per_minute => {
                tracing::warn!("Chat rate limit exceeded for {} ({})", user_address, count);
                Err(AppError::RateLimited)
            }
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!("Chat rate limiter skipped: {}", err);
                Ok(())
            }
        }
    }

    async fn load_or_create(&self, conversation_id: Option<&str>, user_address: &str) -> Conversation {
        if let Some(id) = conversation_id.map(str::trim).filter(|id| !id.is_empty()) {
            match self.conversations.load(id).await {
                Ok(Some(conversation)) if conversation.user_address == user_address => {
                    return conversation;
                }
                Ok(Some(_)) => {
                    tracing::warn!("Conversation {} belongs to another wallet", id);
                }
                Ok(None) => tracing::debug!("Conversation {} expired or unknown", id),
                Err(err) => tracing::warn!("Failed to load conversation {}: {}", id, err),
            }
        }
        Conversation::new(random_id(), user_address)
    }

    async fn classify(&self, turn: &Turn<'_>) -> Result<IntentClassification> {
        let symbols: Vec<String> = turn.tokens.iter().map(|t| t.symbol.clone()).collect();
        match &self.llm {
            Some(llm) => {
                classify_with_llm(
                    llm.as_ref(),
                    turn.message,
                    turn.history,
                    &symbols,
                    &turn.portfolio.summary(),
                )
                .await
            }
            None => Ok(classify_by_keywords(turn.message, &symbols)),
        }
    }

    async fn handle(&self, turn: &Turn<'_>) -> Result<TurnReply> {
        let classification = self.classify(turn).await?;
        tracing::debug!(
            "Intent {} ({:.2}) for {}",
            classification.intent.as_str(),
            classification.confidence,
            turn.user_address
        );

        match classification.intent {
            Intent::Send => self.handle_send(turn, &classification),
            Intent::Swap => self.handle_swap(turn, &classification).await,
            Intent::Balance => Ok(self.handle_balance(turn, &classification)),
            Intent::AddToken => self.handle_add_token(turn, &classification).await,
            Intent::Question => self.handle_question(turn).await,
            Intent::Unknown => Ok(TurnReply::say(Intent::Unknown, HELP_TEXT)),
        }
    }

    fn handle_send(&self, turn: &Turn<'_>, c: &IntentClassification) -> Result<TurnReply> {
        let e = &c.entities;
        let Some(amount) = e.amount.as_deref() else {
            return Ok(TurnReply::say(Intent::Send, "How much would you like to send?"));
        };
        let Some(symbol) = e.token.as_deref() else {
            return Ok(TurnReply::say(Intent::Send, "Which token would you like to send?"));
        };
        let Some(token) = find_token(turn.tokens, symbol) else {
            return Ok(TurnReply::say(
                Intent::Send,
                format!("I couldn't find {} in your token list. You can add it first.", symbol),
            ));
        };
        let Some(recipient) = e.recipient.as_deref() else {
            return Ok(TurnReply::say(
                Intent::Send,
                format!("Who should receive the {}? Please share a 0x address.", token.symbol),
            ));
        };
        let Ok(recipient) = normalize_address(recipient) else {
            return Ok(TurnReply::say(
                Intent::Send,
                format!("{} doesn't look like a valid address.", recipient),
            ));
        };
        let base_units = match parse_token_amount(amount, token.decimals) {
            Ok(value) => value,
            Err(err) => {
                return Ok(TurnReply::say(
                    Intent::Send,
                    format!("That amount doesn't work: {}", public_reason(&err)),
                ))
            }
        };

        if let Some(held) = turn.portfolio.balance_of(&token.symbol) {
            let available = U256::from_dec_str(&held.balance_base_units).unwrap_or_default();
            if available < base_units {
                return Ok(TurnReply::say(
                    Intent::Send,
                    format!(
                        "You only have {} {}, not enough to send {}.",
                        held.balance, token.symbol, amount
                    ),
                ));
            }
        }

        let action = json!({
            "type": "send",
            "token": {
                "symbol": token.symbol,
                "address": token.address,
                "decimals": token.decimals,
            },
            "amount": amount,
            "amountBaseUnits": base_units.to_string(),
            "recipient": recipient,
            "caip19": token.caip19(self.chain_id),
            "chainId": self.chain_id,
        });
        Ok(TurnReply::action(
            Intent::Send,
            format!(
                "Ready to send {} {} to {}. Please confirm in your wallet.",
                amount, token.symbol, recipient
            ),
            action,
        ))
    }

    async fn handle_swap(&self, turn: &Turn<'_>, c: &IntentClassification) -> Result<TurnReply> {
        let e = &c.entities;
        let Some(amount) = e.amount.as_deref() else {
            return Ok(TurnReply::say(Intent::Swap, "How much would you like to swap?"));
        };
        let (Some(sell), Some(buy)) = (
            e.from_token.as_deref().or(e.token.as_deref()),
            e.to_token.as_deref(),
        ) else {
            return Ok(TurnReply::say(
                Intent::Swap,
                "Which tokens would you like to swap? For example \"swap 0.1 ETH to USDC\".",
            ));
        };
        let (Some(sell), Some(buy)) = (find_token(turn.tokens, sell), find_token(turn.tokens, buy))
        else {
            return Ok(TurnReply::say(
                Intent::Swap,
                format!("I can only swap tokens in your list ({}).", symbols(turn.tokens)),
            ));
        };

        let quote = match self.swaps.quote_tokens(sell, buy, amount, e.slippage).await {
            Ok(quote) => quote,
            Err(err @ (AppError::BadRequest(_)
            | AppError::InvalidToken
            | AppError::InsufficientLiquidity)) => {
                return Ok(TurnReply::say(
                    Intent::Swap,
                    format!("I couldn't quote that swap: {}", public_reason(&err)),
                ))
            }
            Err(err) => return Err(err),
        };

        let response = format!(
            "Swap {} {} for about {} {} (at least {} with {}% slippage). Please confirm in your wallet.",
            quote.amount_in,
            quote.sell_token.symbol,
            quote.amount_out,
            quote.buy_token.symbol,
            quote.min_amount_out,
            f64::from(quote.slippage_bps) / 100.0
        );
        Ok(TurnReply::action(
            Intent::Swap,
            response,
            json!({ "type": "swap", "quote": quote }),
        ))
    }

    fn handle_balance(&self, turn: &Turn<'_>, c: &IntentClassification) -> TurnReply {
        let portfolio = turn.portfolio;
        let response = match c.entities.token.as_deref() {
            Some(symbol) => match portfolio.balance_of(symbol) {
                Some(held) => format!("You have {} {}.", held.balance, held.token.symbol),
                None => format!("I couldn't find a {} balance in your wallet.", symbol),
            },
            None if portfolio.balances.is_empty() => {
                "I couldn't load your balances right now. Please try again shortly.".to_string()
            }
            None => format!("Your balances: {}.", portfolio.summary()),
        };
        let mut reply = TurnReply::say(Intent::Balance, response);
        reply.action_data = serde_json::to_value(portfolio).ok();
        reply
    }

    async fn handle_add_token(
        &self,
        turn: &Turn<'_>,
        c: &IntentClassification,
    ) -> Result<TurnReply> {
        let Some(raw) = c.entities.token_address.as_deref() else {
            return Ok(TurnReply::say(
                Intent::AddToken,
                "Please share the token's contract address (0x...).",
            ));
        };
        let Ok(address) = normalize_address(raw) else {
            return Ok(TurnReply::say(
                Intent::AddToken,
                format!("{} doesn't look like a valid contract address.", raw),
            ));
        };
        if let Some(existing) = find_token(turn.tokens, &address) {
            return Ok(TurnReply::say(
                Intent::AddToken,
                format!("{} is already in your token list.", existing.symbol),
            ));
        }

        let metadata = match self.chain.erc20_metadata(&address).await {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::debug!("Token metadata lookup failed for {}: {}", address, err);
                return Ok(TurnReply::say(
                    Intent::AddToken,
                    format!("I couldn't read an ERC-20 token at {} on Base.", address),
                ));
            }
        };
        let token = match (NewToken {
            address,
            symbol: metadata.symbol,
            name: Some(metadata.name),
            decimals: metadata.decimals,
            icon: None,
        })
        .validate()
        {
            Ok(token) => token,
            Err(err) => {
                return Ok(TurnReply::say(
                    Intent::AddToken,
                    format!("That token can't be added: {}", public_reason(&err)),
                ))
            }
        };

        Ok(TurnReply::action(
            Intent::AddToken,
            format!(
                "Found {} ({}) with {} decimals. Confirm to add it to your list.",
                token.name, token.symbol, token.decimals
            ),
            json!({ "type": "add_token", "token": token }),
        ))
    }

    async fn handle_question(&self, turn: &Turn<'_>) -> Result<TurnReply> {
        let Some(llm) = &self.llm else {
            return Ok(TurnReply::say(Intent::Question, OFFLINE_ANSWER));
        };
        let mut messages = vec![LlmMessage::system(
            ANSWER_PROMPT.replace("{portfolio}", &turn.portfolio.summary()),
        )];
        messages.extend(history_messages(turn.history));
        messages.push(LlmMessage::user(turn.message));

        let answer = llm.complete(&messages, false).await?;
        Ok(TurnReply::say(Intent::Question, answer.trim()))
    }
}

fn symbols(tokens: &[CustomToken]) -> String {
    tokens
        .iter()
        .map(|t| t.symbol.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn public_reason(err: &AppError) -> String {
    match err {
        AppError::BadRequest(msg) => msg.clone(),
        AppError::InvalidToken => "token is not in your list".to_string(),
        AppError::InsufficientLiquidity => "not enough liquidity for this pair".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{TOKEN_USDC, TOKEN_WETH},
        db::MemoryStore,
        services::{
            conversation_store::MemoryConversationStore,
            onchain::TokenMetadata,
            testing::{FakeChain, FakeLlm},
        },
    };

    const USER: &str = "0x00000000000000000000000000000000000000cc";
    const RECIPIENT: &str = "0x1111111111111111111111111111111111111111";
    const AERO: &str = "0x940181a94a35a4569e4529a3cdfb74e38fd98631";

    fn chain() -> FakeChain {
        let mut chain = FakeChain::with_rate(U256::from(2_500_000_000u64), U256::exp10(18));
        chain.native = U256::exp10(18) * 2;
        chain.erc20.insert(TOKEN_USDC.to_string(), U256::from(100_000_000u64));
        chain.metadata.insert(
            AERO.to_string(),
            TokenMetadata {
                symbol: "AERO".to_string(),
                name: "Aerodrome".to_string(),
                decimals: 18,
            },
        );
        chain
    }

    fn service_with(llm: Option<Arc<dyn LlmClient>>, config: Config) -> ChatService {
        let store: Arc<dyn crate::db::Store> = Arc::new(MemoryStore::new());
        let chain: Arc<dyn ChainReader> = Arc::new(chain());
        let registry = TokenRegistry::new(store);
        let swaps = SwapService::new(registry.clone(), chain.clone(), &config);
        let portfolio = PortfolioService::new(registry.clone(), chain.clone(), 8453, 30);
        let conversations = Arc::new(MemoryConversationStore::new(3600));
        ChatService::new(registry, swaps, portfolio, chain, llm, conversations, &config)
    }

    fn service() -> ChatService {
        service_with(None, crate::config::test_config())
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            user_address: USER.to_string(),
            conversation_id: None,
        }
    }

    #[tokio::test]
    async fn send_builds_caip19_action() {
        let reply = service()
            .respond(request(&format!("send 25 USDC to {}", RECIPIENT)))
            .await
            .unwrap();
        assert_eq!(reply.intent, "send");
        assert!(reply.needs_action);
        let action = reply.action_data.unwrap();
        assert_eq!(action["amountBaseUnits"], "25000000");
        assert_eq!(action["recipient"], RECIPIENT);
        assert_eq!(action["caip19"], format!("eip155:8453/erc20:{}", TOKEN_USDC));
    }

    #[tokio::test]
    async fn send_native_uses_slip44_and_checks_balance() {
        let service = service();
        let ok = service
            .respond(request(&format!("send 1.5 eth to {}", RECIPIENT)))
            .await
            .unwrap();
        assert_eq!(ok.action_data.unwrap()["caip19"], "eip155:8453/slip44:60");

        let too_much = service
            .respond(request(&format!("send 5 eth to {}", RECIPIENT)))
            .await
            .unwrap();
        assert!(!too_much.needs_action);
        assert!(too_much.response.contains("only have 2 ETH"));
    }

    #[tokio::test]
    async fn send_without_recipient_asks_for_one() {
        let reply = service().respond(request("send 5 usdc")).await.unwrap();
        assert_eq!(reply.intent, "send");
        assert!(!reply.needs_action);
        assert!(reply.response.contains("0x address"));
    }

    #[tokio::test]
    async fn swap_returns_quote_action() {
        let reply = service().respond(request("swap 1 eth to usdc")).await.unwrap();
        assert_eq!(reply.intent, "swap");
        assert!(reply.needs_action);
        let quote = &reply.action_data.unwrap()["quote"];
        assert_eq!(quote["amountOut"], "2500");
        assert_eq!(quote["slippageBps"], 50);
        assert_eq!(quote["path"][0], TOKEN_WETH);
    }

    #[tokio::test]
    async fn balance_reports_holdings() {
        let reply = service().respond(request("what's my balance")).await.unwrap();
        assert_eq!(reply.intent, "balance");
        assert!(reply.response.contains("2 ETH"));
        assert!(reply.response.contains("100 USDC"));

        let filtered = service().respond(request("usdc balance")).await.unwrap();
        assert_eq!(filtered.response, "You have 100 USDC.");
    }

    #[tokio::test]
    async fn add_token_reads_metadata() {
        let reply = service()
            .respond(request(&format!("add token {}", AERO)))
            .await
            .unwrap();
        assert_eq!(reply.intent, "add_token");
        assert!(reply.needs_action);
        assert_eq!(reply.action_data.unwrap()["token"]["symbol"], "AERO");
    }

    #[tokio::test]
    async fn unknown_message_gets_help() {
        let reply = service().respond(request("blorp")).await.unwrap();
        assert_eq!(reply.intent, "unknown");
        assert_eq!(reply.response, HELP_TEXT);
    }

    #[tokio::test]
    async fn conversation_is_kept_between_turns() {
        let service = service();
        let first = service.respond(request("hello there")).await.unwrap();
        let mut next = request("what's my balance");
        next.conversation_id = Some(first.conversation_id.clone());
        let second = service.respond(next).await.unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);

        let history = service.history(&first.conversation_id).await.unwrap();
        assert_eq!(history.messages.len(), 4);
        assert_eq!(history.messages[0].role, ChatRole::User);

        service.clear(&first.conversation_id).await.unwrap();
        assert!(matches!(
            service.history(&first.conversation_id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn foreign_conversation_id_starts_a_new_conversation() {
        let service = service();
        let mine = service.respond(request("hello there")).await.unwrap();

        let other_wallet = "0x00000000000000000000000000000000000000dd";
        let hijack = ChatRequest {
            message: "what's my balance".to_string(),
            user_address: other_wallet.to_string(),
            conversation_id: Some(mine.conversation_id.clone()),
        };
        let theirs = service.respond(hijack).await.unwrap();
        assert_ne!(theirs.conversation_id, mine.conversation_id);

        let original = service.history(&mine.conversation_id).await.unwrap();
        assert_eq!(original.user_address, USER);
        assert_eq!(original.messages.len(), 2);
        let fresh = service.history(&theirs.conversation_id).await.unwrap();
        assert_eq!(fresh.user_address, other_wallet);
        assert_eq!(fresh.messages.len(), 2);
    }

    #[tokio::test]
    async fn null_entities_reach_the_handler() {
        let llm = Arc::new(FakeLlm::new(vec![Ok(
            r#"{"intent":"swap","entities":null,"confidence":null}"#.to_string(),
        )]));
        let service = service_with(Some(llm as Arc<dyn LlmClient>), crate::config::test_config());
        let reply = service.respond(request("swap please")).await.unwrap();
        assert_eq!(reply.intent, "swap");
        assert_eq!(reply.response, "How much would you like to swap?");
        assert!(!reply.needs_action);
    }

    #[tokio::test]
    async fn llm_classification_drives_dispatch() {
        let llm = Arc::new(FakeLlm::new(vec![
            Ok(r#"{"intent":"question","entities":{},"confidence":0.9}"#.to_string()),
            Ok("Base is an L2.".to_string()),
        ]));
        let service = service_with(
            Some(llm.clone() as Arc<dyn LlmClient>),
            crate::config::test_config(),
        );
        let reply = service.respond(request("tell me about base")).await.unwrap();
        assert_eq!(reply.intent, "question");
        assert_eq!(reply.response, "Base is an L2.");

        let requests = llm.requests.lock().unwrap();
        assert!(requests[0].1);
        assert!(!requests[1].1);
    }

    #[tokio::test]
    async fn malformed_classification_becomes_apology() {
        let llm = Arc::new(FakeLlm::new(vec![Ok("not json".to_string())]));
        let service = service_with(Some(llm as Arc<dyn LlmClient>), crate::config::test_config());
        let reply = service.respond(request("do something")).await.unwrap();
        assert_eq!(reply.intent, "error");
        assert_eq!(reply.response, CHAT_APOLOGY);
        assert!(!reply.needs_action);
    }

    #[tokio::test]
    async fn rate_limit_rejects_excess_messages() {
        let mut config = crate::config::test_config();
        config.chat_rate_limit_per_minute = 2;
        let service = service_with(None, config);
        service.respond(request("hi")).await.unwrap();
        service.respond(request("hi")).await.unwrap();
        assert!(matches!(
            service.respond(request("hi")).await.unwrap_err(),
            AppError::RateLimited
        ));
    }

    #[tokio::test]
    async fn empty_message_is_bad_request() {
        assert!(matches!(
            service().respond(request("   ")).await.unwrap_err(),
            AppError::BadRequest(_)
        ));
    }
}
