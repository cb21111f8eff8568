//! Hand-written fakes for the chain and LLM seams.

use async_trait::async_trait;
use ethers::types::U256;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::{
    error::{AppError, Result},
    services::{
        llm::{LlmClient, LlmMessage},
        onchain::{ChainReader, TokenMetadata},
    },
};

/// Quotes `amount_in * rate_num / rate_den`; balances and metadata come from the maps.
#[derive(Default)]
pub struct FakeChain {
    pub native: U256,
    pub erc20: HashMap<String, U256>,
    pub metadata: HashMap<String, TokenMetadata>,
    pub rate_num: U256,
    pub rate_den: U256,
    pub fail_erc20: bool,
    pub paths: Mutex<Vec<Vec<String>>>,
}

impl FakeChain {
    pub fn with_rate(rate_num: U256, rate_den: U256) -> Self {
        Self {
            rate_num,
            rate_den,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn native_balance(&self, _owner: &str) -> Result<U256> {
        Ok(self.native)
    }

    async fn erc20_balance(&self, token: &str, _owner: &str) -> Result<U256> {
        if self.fail_erc20 {
            return Err(AppError::BlockchainRPC("balanceOf: connection refused".to_string()));
        }
        Ok(self
            .erc20
            .get(&token.to_ascii_lowercase())
            .copied()
            .unwrap_or_default())
    }

    async fn erc20_metadata(&self, token: &str) -> Result<TokenMetadata> {
        self.metadata
            .get(&token.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| AppError::BlockchainRPC("symbol: execution reverted".to_string()))
    }

    async fn get_amounts_out(
        &self,
        _router: &str,
        amount_in: U256,
        path: &[String],
    ) -> Result<Vec<U256>> {
        self.paths.lock().unwrap().push(path.to_vec());
        if self.rate_den.is_zero() {
            return Err(AppError::BlockchainRPC("getAmountsOut: reverted".to_string()));
        }
        Ok(vec![amount_in, amount_in * self.rate_num / self.rate_den])
    }
}

/// Replays canned completions in order and records every request.
#[derive(Default)]
pub struct FakeLlm {
    replies: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<(Vec<LlmMessage>, bool)>>,
}

impl FakeLlm {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, messages: &[LlmMessage], json_mode: bool) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), json_mode));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::Llm("no canned reply".to_string())))
    }
}
