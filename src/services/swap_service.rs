use chrono::Utc;
use ethers::types::{U256, U512};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::Config,
    constants::{
        BPS_DENOMINATOR, DEFAULT_SLIPPAGE_PERCENT, MAX_SLIPPAGE_PERCENT, SWAP_DEADLINE_SECS,
        TOKEN_WETH,
    },
    error::{AppError, Result},
    models::{CustomToken, UserTokens},
    services::{
        onchain::{format_token_amount, parse_token_amount, ChainReader},
        token_registry::{find_token, TokenRegistry},
    },
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub sell_token: CustomToken,
    pub buy_token: CustomToken,
    pub amount_in: String,
    pub amount_in_base_units: String,
    pub amount_out: String,
    pub amount_out_base_units: String,
    pub min_amount_out: String,
    pub min_amount_out_base_units: String,
    pub rate: String,
    pub slippage_bps: u32,
    pub path: Vec<String>,
    pub router: String,
    pub deadline: i64,
}

/// Percent (0.5 = 0.5%) to basis points, bounded by `MAX_SLIPPAGE_PERCENT`.
pub fn slippage_to_bps(percent: Option<f64>) -> Result<u32> {
    let percent = percent.unwrap_or(DEFAULT_SLIPPAGE_PERCENT);
    if !percent.is_finite() || !(0.0..=MAX_SLIPPAGE_PERCENT).contains(&percent) {
        return Err(AppError::BadRequest(format!(
            "Slippage must be between 0 and {}%",
            MAX_SLIPPAGE_PERCENT
        )));
    }
    Ok((percent * 100.0).round() as u32)
}

/// `amount_out * (10000 - bps) / 10000`, floored. The product is taken in 512 bits
/// so any `uint256` router output is accepted.
pub fn min_amount_out(amount_out: U256, slippage_bps: u32) -> U256 {
    let bps = slippage_bps.min(BPS_DENOMINATOR);
    let scaled =
        amount_out.full_mul(U256::from(BPS_DENOMINATOR - bps)) / U512::from(BPS_DENOMINATOR);
    // factor <= 1, so the quotient never exceeds amount_out
    U256::try_from(scaled).unwrap_or(amount_out)
}

/// Router paths use WETH in place of native ETH.
fn path_address(token: &CustomToken) -> String {
    if token.is_native() {
        TOKEN_WETH.to_string()
    } else {
        token.address.to_ascii_lowercase()
    }
}

fn human_rate(amount_in: &str, amount_out: &str) -> String {
    let (Ok(amount_in), Ok(amount_out)) = (Decimal::from_str(amount_in), Decimal::from_str(amount_out))
    else {
        return "0".to_string();
    };
    amount_out
        .checked_div(amount_in)
        .map(|rate| rate.round_dp(8).normalize().to_string())
        .unwrap_or_else(|| "0".to_string())
}

#[derive(Clone)]
pub struct SwapService {
    registry: TokenRegistry,
    chain: Arc<dyn ChainReader>,
    router: String,
}

impl SwapService {
    pub fn new(registry: TokenRegistry, chain: Arc<dyn ChainReader>, config: &Config) -> Self {
        Self {
            registry,
            chain,
            router: config.dex_router_address.to_ascii_lowercase(),
        }
    }

    /// Quotes against the wallet's token list, or the default list when no wallet is given.
    pub async fn quote(
        &self,
        user_address: Option<&str>,
        sell_token: &str,
        buy_token: &str,
        amount: &str,
        slippage_percent: Option<f64>,
    ) -> Result<SwapQuote> {
        let tokens = match user_address {
            Some(address) => self.registry.get_tokens(address).await?,
            None => UserTokens::with_defaults(""),
        };
        let sell = find_token(&tokens.tokens, sell_token).ok_or(AppError::InvalidToken)?;
        let buy = find_token(&tokens.tokens, buy_token).ok_or(AppError::InvalidToken)?;
        self.quote_tokens(sell, buy, amount, slippage_percent).await
    }

    pub async fn quote_tokens(
        &self,
        sell: &CustomToken,
        buy: &CustomToken,
        amount: &str,
        slippage_percent: Option<f64>,
    ) -> Result<SwapQuote> {
        if sell.address.eq_ignore_ascii_case(&buy.address) {
            return Err(AppError::BadRequest(
                "Sell and buy token must be different".to_string(),
            ));
        }
        let path = vec![path_address(sell), path_address(buy)];
        if path[0] == path[1] {
            return Err(AppError::BadRequest(
                "ETH and WETH convert 1:1 by wrapping, no swap needed".to_string(),
            ));
        }
        let slippage_bps = slippage_to_bps(slippage_percent)?;
        let amount_in = parse_token_amount(amount, sell.decimals)?;

        let amounts = self
            .chain
            .get_amounts_out(&self.router, amount_in, &path)
            .await?;
        let amount_out = amounts.last().copied().unwrap_or_default();
        if amount_out.is_zero() {
            return Err(AppError::InsufficientLiquidity);
        }
        let min_out = min_amount_out(amount_out, slippage_bps);

        let amount_in_human = format_token_amount(amount_in, sell.decimals)?;
        let amount_out_human = format_token_amount(amount_out, buy.decimals)?;
        tracing::debug!(
            "Quote {} {} -> {} {} ({} bps)",
            amount_in_human,
            sell.symbol,
            amount_out_human,
            buy.symbol,
            slippage_bps
        );

        Ok(SwapQuote {
            rate: human_rate(&amount_in_human, &amount_out_human),
            sell_token: sell.clone(),
            buy_token: buy.clone(),
            amount_in: amount_in_human,
            amount_in_base_units: amount_in.to_string(),
            amount_out: amount_out_human,
            amount_out_base_units: amount_out.to_string(),
            min_amount_out: format_token_amount(min_out, buy.decimals)?,
            min_amount_out_base_units: min_out.to_string(),
            slippage_bps,
            path,
            router: self.router.clone(),
            deadline: Utc::now().timestamp() + SWAP_DEADLINE_SECS,
        })
    }
}
