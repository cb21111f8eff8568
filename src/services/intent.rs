//! Turns a chat utterance into an intent plus loosely-typed entities.
//!
//! With an LLM configured the classification is a single JSON-mode completion;
//! otherwise a keyword parser produces the same shape. Handlers re-check every
//! entity they need, so a well-formed but incomplete classification is fine here.

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::ChatMessage,
    services::llm::{history_messages, LlmClient, LlmMessage},
    utils::{is_address, lenient, lenient_f64, string_or_number},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Send,
    Swap,
    #[serde(alias = "check_balance")]
    Balance,
    #[serde(alias = "addToken", alias = "add-token")]
    AddToken,
    #[serde(alias = "general")]
    Question,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Send => "send",
            Intent::Swap => "swap",
            Intent::Balance => "balance",
            Intent::AddToken => "add_token",
            Intent::Question => "question",
            Intent::Unknown => "unknown",
        }
    }
}

/// Every field tolerates a wrong JSON type by dropping it; handlers ask for what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentEntities {
    #[serde(deserialize_with = "string_or_number")]
    pub amount: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub token: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub from_token: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub to_token: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub recipient: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub token_address: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub slippage: Option<f64>,
}

/// Only non-JSON output is an error; odd or null fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentClassification {
    #[serde(deserialize_with = "lenient")]
    pub intent: Intent,
    #[serde(deserialize_with = "lenient")]
    pub entities: IntentEntities,
    #[serde(deserialize_with = "lenient")]
    pub confidence: f64,
    #[serde(deserialize_with = "lenient")]
    pub needs_clarification: bool,
}

const CLASSIFIER_PROMPT: &str = r#"You are the intent classifier for Apex Base, a wallet assistant on the Base network.
Classify the user's latest message into exactly one intent:
- "send": transfer tokens to an address
- "swap": exchange one token for another
- "balance": check token balances or the portfolio
- "add_token": add a token contract to the user's token list
- "question": anything educational or general about Base, crypto or this app

Known token symbols for this user: {symbols}
Current portfolio: {portfolio}

Respond with JSON only, no prose:
{
  "intent": "send" | "swap" | "balance" | "add_token" | "question",
  "entities": {
    "amount": "decimal string or null",
    "token": "symbol or null",
    "fromToken": "symbol or null",
    "toToken": "symbol or null",
    "recipient": "0x address or null",
    "tokenAddress": "0x address or null",
    "slippage": percent number or null
  },
  "confidence": 0.0-1.0,
  "needsClarification": true | false
}"#;

pub fn classification_prompt(symbols: &[String], portfolio_summary: &str) -> String {
    let symbols = if symbols.is_empty() {
        "none".to_string()
    } else {
        symbols.join(", ")
    };
    CLASSIFIER_PROMPT
        .replace("{symbols}", &symbols)
        .replace("{portfolio}", portfolio_summary)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

pub fn parse_classification(raw: &str) -> Result<IntentClassification> {
    serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| AppError::Llm(format!("malformed intent classification: {}", e)))
}

pub async fn classify_with_llm(
    llm: &dyn LlmClient,
    message: &str,
    history: &[ChatMessage],
    symbols: &[String],
    portfolio_summary: &str,
) -> Result<IntentClassification> {
    let mut messages = vec![LlmMessage::system(classification_prompt(
        symbols,
        portfolio_summary,
    ))];
    messages.extend(history_messages(history));
    messages.push(LlmMessage::user(message));

    let raw = llm.complete(&messages, true).await?;
    tracing::debug!("Intent classifier raw output: {}", raw);
    parse_classification(&raw)
}

// ==================== KEYWORD FALLBACK ====================

fn tokenize_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
        .collect()
}

fn contains_any_keyword(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

fn contains_any_word(words: &[String], keywords: &[&str]) -> bool {
    words.iter().any(|word| keywords.contains(&word.as_str()))
}

fn normalize_token_symbol(word: &str, known_symbols: &[String]) -> Option<String> {
    let word = match word {
        "ether" | "ethereum" => "eth",
        other => other,
    };
    known_symbols
        .iter()
        .find(|symbol| symbol.eq_ignore_ascii_case(word))
        .cloned()
}

fn mentioned_tokens(text: &str, known_symbols: &[String]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for word in tokenize_words(text) {
        if let Some(symbol) = normalize_token_symbol(&word, known_symbols) {
            if found.last().map(|last| last != &symbol).unwrap_or(true) {
                found.push(symbol);
            }
        }
    }
    found
}

fn extract_addresses(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|word| is_address(word))
        .map(|word| word.to_ascii_lowercase())
        .collect()
}

fn extract_amount_from_text(text: &str) -> Option<String> {
    text.split_whitespace()
        .filter(|word| !word.to_ascii_lowercase().starts_with("0x"))
        .find_map(|word| {
            let cleaned: String = word
                .chars()
                .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == ',')
                .collect();
            let cleaned = cleaned.trim_end_matches(['.', ',']);
            if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
                return None;
            }
            let normalized = if cleaned.contains(',') && !cleaned.contains('.') {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            };
            crate::utils::parse_positive_amount(&normalized)
                .ok()
                .map(|_| normalized)
        })
}

fn parse_swap_parameters(text: &str, known_symbols: &[String]) -> (Option<String>, Option<String>) {
    let words = tokenize_words(text);
    let mentioned = mentioned_tokens(text, known_symbols);
    let mut from: Option<String> = None;
    let mut to: Option<String> = None;

    for idx in 0..words.len() {
        let next = words
            .get(idx + 1)
            .and_then(|w| normalize_token_symbol(w, known_symbols));
        match words[idx].as_str() {
            "from" => from = from.or(next),
            "to" | "into" | "for" => to = to.or(next),
            _ => {}
        }
    }

    if from.is_none() {
        from = mentioned
            .iter()
            .find(|symbol| Some(*symbol) != to.as_ref())
            .cloned();
    }
    if to.is_none() {
        to = mentioned
            .iter()
            .find(|symbol| Some(*symbol) != from.as_ref())
            .cloned();
    }
    if from.is_some() && from == to {
        to = None;
    }
    (from, to)
}

fn looks_like_question(lower: &str) -> bool {
    lower.trim_end().ends_with('?')
        || ["what", "how", "why", "explain", "tell me", "who", "when", "is ", "can "]
            .iter()
            .any(|prefix| lower.trim_start().starts_with(prefix))
}

pub fn classify_by_keywords(message: &str, known_symbols: &[String]) -> IntentClassification {
    let lower = message.to_lowercase();
    let addresses = extract_addresses(message);
    let amount = extract_amount_from_text(&lower);
    let tokens = mentioned_tokens(&lower, known_symbols);
    let words = tokenize_words(&lower);

    let (intent, entities) = if (contains_any_word(&words, &["add", "import", "track"])
        && (contains_any_keyword(&lower, &["token", "contract"]) || !addresses.is_empty()))
        && !contains_any_keyword(&lower, &["send", "transfer"])
    {
        (
            Intent::AddToken,
            IntentEntities {
                token_address: addresses.first().cloned(),
                ..Default::default()
            },
        )
    } else if contains_any_keyword(&lower, &["swap", "exchange", "trade", "convert"]) {
        let (from, to) = parse_swap_parameters(&lower, known_symbols);
        (
            Intent::Swap,
            IntentEntities {
                amount,
                from_token: from,
                to_token: to,
                ..Default::default()
            },
        )
    } else if contains_any_keyword(&lower, &["send", "transfer", "pay "]) {
        (
            Intent::Send,
            IntentEntities {
                amount,
                token: tokens.first().cloned(),
                recipient: addresses.first().cloned(),
                ..Default::default()
            },
        )
    } else if contains_any_keyword(
        &lower,
        &["balance", "portfolio", "holdings", "how much", "my tokens", "my wallet"],
    ) {
        (
            Intent::Balance,
            IntentEntities {
                token: tokens.first().cloned(),
                ..Default::default()
            },
        )
    } else if looks_like_question(&lower) {
        (Intent::Question, IntentEntities::default())
    } else {
        (Intent::Unknown, IntentEntities::default())
    };

    IntentClassification {
        intent,
        entities,
        confidence: if intent == Intent::Unknown { 0.2 } else { 0.6 },
        needs_clarification: intent == Intent::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Vec<String> {
        ["ETH", "USDC", "WETH", "DAI", "cbETH"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    const RECIPIENT: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn parse_classification_reads_full_payload() {
        let raw = r#"{"intent":"swap","entities":{"amount":"0.5","fromToken":"ETH","toToken":"USDC"},"confidence":0.93,"needsClarification":false}"#;
        let parsed = parse_classification(raw).unwrap();
        assert_eq!(parsed.intent, Intent::Swap);
        assert_eq!(parsed.entities.amount.as_deref(), Some("0.5"));
        assert_eq!(parsed.entities.to_token.as_deref(), Some("USDC"));
        assert!(!parsed.needs_clarification);
    }

    #[test]
    fn parse_classification_accepts_numeric_amount_and_fence() {
        let raw = "```json\n{\"intent\":\"send\",\"entities\":{\"amount\":25,\"token\":\"USDC\"}}\n```";
        let parsed = parse_classification(raw).unwrap();
        assert_eq!(parsed.intent, Intent::Send);
        assert_eq!(parsed.entities.amount.as_deref(), Some("25"));
    }

    #[test]
    fn parse_classification_maps_unknown_intent() {
        let parsed = parse_classification(r#"{"intent":"mint_nft"}"#).unwrap();
        assert_eq!(parsed.intent, Intent::Unknown);
        assert_eq!(parsed.entities, IntentEntities::default());
    }

    #[test]
    fn parse_classification_accepts_quoted_slippage() {
        let raw = r#"{"intent":"swap","entities":{"amount":"1","fromToken":"ETH","toToken":"USDC","slippage":"1"},"confidence":0.8,"needsClarification":false}"#;
        let parsed = parse_classification(raw).unwrap();
        assert_eq!(parsed.entities.slippage, Some(1.0));

        let raw = r#"{"intent":"swap","entities":{"slippage":0.5}}"#;
        assert_eq!(parse_classification(raw).unwrap().entities.slippage, Some(0.5));

        let raw = r#"{"intent":"swap","entities":{"slippage":"lots"}}"#;
        assert_eq!(parse_classification(raw).unwrap().entities.slippage, None);
    }

    #[test]
    fn parse_classification_tolerates_null_fields() {
        let raw = r#"{"intent":"question","entities":null,"confidence":null,"needsClarification":null}"#;
        let parsed = parse_classification(raw).unwrap();
        assert_eq!(parsed.intent, Intent::Question);
        assert_eq!(parsed.entities, IntentEntities::default());
        assert_eq!(parsed.confidence, 0.0);
        assert!(!parsed.needs_clarification);
    }

    #[test]
    fn parse_classification_drops_mistyped_entities() {
        let raw = r#"{"intent":"send","entities":{"amount":true,"token":["USDC"],"recipient":"0xabc"},"confidence":"high"}"#;
        let parsed = parse_classification(raw).unwrap();
        assert_eq!(parsed.intent, Intent::Send);
        assert_eq!(parsed.entities.amount, None);
        assert_eq!(parsed.entities.token, None);
        assert_eq!(parsed.entities.recipient.as_deref(), Some("0xabc"));
        assert_eq!(parsed.confidence, 0.0);

        let parsed = parse_classification(r#"{"intent":7,"entities":"none"}"#).unwrap();
        assert_eq!(parsed.intent, Intent::Unknown);
    }

    #[test]
    fn parse_classification_rejects_prose() {
        assert!(parse_classification("Sure! The user wants to swap.").is_err());
    }

    #[test]
    fn keywords_detect_swap_pair_and_amount() {
        let c = classify_by_keywords("swap 0.1 eth to usdc", &symbols());
        assert_eq!(c.intent, Intent::Swap);
        assert_eq!(c.entities.amount.as_deref(), Some("0.1"));
        assert_eq!(c.entities.from_token.as_deref(), Some("ETH"));
        assert_eq!(c.entities.to_token.as_deref(), Some("USDC"));
    }

    #[test]
    fn keywords_detect_swap_with_from_keyword() {
        let c = classify_by_keywords("I want USDC, swap from dai 10", &symbols());
        assert_eq!(c.entities.from_token.as_deref(), Some("DAI"));
        assert_eq!(c.entities.to_token.as_deref(), Some("USDC"));
    }

    #[test]
    fn keywords_detect_send_with_recipient() {
        let msg = format!("send 25 USDC to {}", RECIPIENT);
        let c = classify_by_keywords(&msg, &symbols());
        assert_eq!(c.intent, Intent::Send);
        assert_eq!(c.entities.amount.as_deref(), Some("25"));
        assert_eq!(c.entities.token.as_deref(), Some("USDC"));
        assert_eq!(c.entities.recipient.as_deref(), Some(RECIPIENT));
    }

    #[test]
    fn keywords_detect_add_token() {
        let msg = "add token 0x4200000000000000000000000000000000000042";
        let c = classify_by_keywords(msg, &symbols());
        assert_eq!(c.intent, Intent::AddToken);
        assert_eq!(
            c.entities.token_address.as_deref(),
            Some("0x4200000000000000000000000000000000000042")
        );
    }

    #[test]
    fn address_word_does_not_trigger_add_token() {
        let msg = format!("what is the balance of address {}?", RECIPIENT);
        assert_eq!(classify_by_keywords(&msg, &symbols()).intent, Intent::Balance);

        let msg = format!("check the padding on {}", RECIPIENT);
        assert_ne!(classify_by_keywords(&msg, &symbols()).intent, Intent::AddToken);

        let msg = format!("please import {}", RECIPIENT);
        assert_eq!(classify_by_keywords(&msg, &symbols()).intent, Intent::AddToken);
    }

    #[test]
    fn keywords_detect_balance_and_question() {
        assert_eq!(
            classify_by_keywords("what's my balance", &symbols()).intent,
            Intent::Balance
        );
        assert_eq!(
            classify_by_keywords("What is Base?", &symbols()).intent,
            Intent::Question
        );
        assert_eq!(
            classify_by_keywords("blorp", &symbols()).intent,
            Intent::Unknown
        );
    }

    #[test]
    fn amount_extraction_skips_addresses_and_supports_comma() {
        let msg = format!("send to {} 1,5 dai", RECIPIENT);
        assert_eq!(extract_amount_from_text(&msg).as_deref(), Some("1.5"));
    }

    #[test]
    fn prompt_lists_symbols() {
        let prompt = classification_prompt(&symbols(), "ETH 1.0");
        assert!(prompt.contains("ETH, USDC"));
        assert!(prompt.contains("Current portfolio: ETH 1.0"));
    }
}
