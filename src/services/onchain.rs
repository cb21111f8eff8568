use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{Address, U256},
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

use crate::{
    config::Config,
    error::{AppError, Result},
};

const RPC_CALL_TIMEOUT_SECS: u64 = 10;

ethers::contract::abigen!(
    Erc20,
    r#"[
        function balanceOf(address) view returns (uint256)
        function decimals() view returns (uint8)
        function symbol() view returns (string)
        function name() view returns (string)
    ]"#
);

ethers::contract::abigen!(
    DexRouter,
    r#"[
        function getAmountsOut(uint256 amountIn, address[] path) view returns (uint256[])
    ]"#
);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// Read-only access to the chain. Nothing here signs or submits transactions.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn native_balance(&self, owner: &str) -> Result<U256>;

    async fn erc20_balance(&self, token: &str, owner: &str) -> Result<U256>;

    async fn erc20_metadata(&self, token: &str) -> Result<TokenMetadata>;

    /// `getAmountsOut` on a Uniswap-V2-style router.
    async fn get_amounts_out(&self, router: &str, amount_in: U256, path: &[String])
        -> Result<Vec<U256>>;
}

pub struct BaseRpcReader {
    provider: Arc<Provider<Http>>,
}

impl BaseRpcReader {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.base_rpc_url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self {
            provider: Arc::new(provider),
        })
    }
}

pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid address: {}", value.trim())))
}

async fn with_rpc_timeout<T, F>(label: &str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = std::result::Result<T, String>>,
{
    match timeout(Duration::from_secs(RPC_CALL_TIMEOUT_SECS), fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(AppError::BlockchainRPC(format!("{}: {}", label, err))),
        Err(_) => Err(AppError::BlockchainRPC(format!(
            "{}: timed out after {}s",
            label, RPC_CALL_TIMEOUT_SECS
        ))),
    }
}

#[async_trait]
impl ChainReader for BaseRpcReader {
    async fn native_balance(&self, owner: &str) -> Result<U256> {
        let owner = parse_address(owner)?;
        with_rpc_timeout("eth_getBalance", async {
            self.provider
                .get_balance(owner, None)
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    async fn erc20_balance(&self, token: &str, owner: &str) -> Result<U256> {
        let contract = Erc20::new(parse_address(token)?, self.provider.clone());
        let owner = parse_address(owner)?;
        with_rpc_timeout("balanceOf", async {
            contract
                .balance_of(owner)
                .call()
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    async fn erc20_metadata(&self, token: &str) -> Result<TokenMetadata> {
        let contract = Erc20::new(parse_address(token)?, self.provider.clone());
        let symbol_call = contract.symbol();
        let name_call = contract.name();
        let decimals_call = contract.decimals();
        let (symbol, name, decimals) = tokio::join!(
            with_rpc_timeout("symbol", async {
                symbol_call.call().await.map_err(|e| e.to_string())
            }),
            with_rpc_timeout("name", async {
                name_call.call().await.map_err(|e| e.to_string())
            }),
            with_rpc_timeout("decimals", async {
                decimals_call.call().await.map_err(|e| e.to_string())
            }),
        );
        let symbol = symbol?;
        // some tokens revert on name(); fall back to the symbol
        let name = name.unwrap_or_else(|err| {
            tracing::debug!("name() unavailable for {}: {}", token, err);
            symbol.clone()
        });
        Ok(TokenMetadata {
            symbol,
            name,
            decimals: decimals?,
        })
    }

    async fn get_amounts_out(
        &self,
        router: &str,
        amount_in: U256,
        path: &[String],
    ) -> Result<Vec<U256>> {
        let router = DexRouter::new(parse_address(router)?, self.provider.clone());
        let path = path
            .iter()
            .map(|address| parse_address(address))
            .collect::<Result<Vec<Address>>>()?;
        let call = router.get_amounts_out(amount_in, path);
        with_rpc_timeout("getAmountsOut", async {
            call.call().await.map_err(|e| e.to_string())
        })
        .await
    }
}

/// Scales a base-unit amount into a trimmed human string ("1500000", 6 -> "1.5").
pub fn format_token_amount(value: U256, decimals: u8) -> Result<String> {
    ethers::utils::format_units(value, decimals as u32)
        .map(|formatted| crate::utils::trim_decimal_string(&formatted))
        .map_err(|e| AppError::Internal(format!("Failed to format amount: {}", e)))
}

/// Parses a human amount into base units, rejecting more fractional digits than `decimals`.
pub fn parse_token_amount(raw: &str, decimals: u8) -> Result<U256> {
    crate::utils::parse_positive_amount(raw)?;
    let trimmed = raw.trim();
    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.len() > decimals as usize {
            return Err(AppError::BadRequest(format!(
                "Amount has more than {} decimal places",
                decimals
            )));
        }
    }
    ethers::utils::parse_units(trimmed, decimals as u32)
        .map(Into::into)
        .map_err(|e| AppError::BadRequest(format!("Invalid amount: {}", e)))
}
