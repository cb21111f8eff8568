/// Application constants

// Chain
pub const BASE_CHAIN_ID: u64 = 8453;
pub const BASE_NETWORK: &str = "base";
pub const DEFAULT_BASE_RPC_URL: &str = "https://mainnet.base.org";

// Pseudo-address used for the chain's native currency in token lists.
pub const NATIVE_TOKEN_ADDRESS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

// Token addresses (Base mainnet)
pub const TOKEN_USDC: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";
pub const TOKEN_WETH: &str = "0x4200000000000000000000000000000000000006";
pub const TOKEN_DAI: &str = "0x50c5725949a6f0c72e6c4a641f24049a917db0cb";
pub const TOKEN_CBETH: &str = "0x2ae3f1ec7f1f5012cfeab0185bfc7aa3cf0dec22";

// Uniswap V2 Router02 deployment on Base
pub const DEFAULT_DEX_ROUTER: &str = "0x4752ba5dbc23f44d87826276bf6fd6b1c372ad24";

/// Seed list for a wallet's token list: (address, symbol, name, decimals, icon)
pub const DEFAULT_TOKENS: [(&str, &str, &str, u8, &str); 5] = [
    (NATIVE_TOKEN_ADDRESS, "ETH", "Ether", 18, "/tokens/eth.svg"),
    (TOKEN_USDC, "USDC", "USD Coin", 6, "/tokens/usdc.svg"),
    (TOKEN_WETH, "WETH", "Wrapped Ether", 18, "/tokens/weth.svg"),
    (TOKEN_DAI, "DAI", "Dai Stablecoin", 18, "/tokens/dai.svg"),
    (TOKEN_CBETH, "cbETH", "Coinbase Wrapped Staked ETH", 18, "/tokens/cbeth.svg"),
];

// Swap configuration
pub const DEFAULT_SLIPPAGE_PERCENT: f64 = 0.5;
pub const MAX_SLIPPAGE_PERCENT: f64 = 10.0;
pub const BPS_DENOMINATOR: u32 = 10_000;
pub const SWAP_DEADLINE_SECS: i64 = 20 * 60;

// Points configuration
pub const PERFECT_QUIZ_SCORE: u8 = 100;
pub const PERFECT_QUIZ_BONUS_PERCENT: u64 = 20;

// Optimistic write attempts before giving up with a conflict
pub const MAX_WRITE_ATTEMPTS: usize = 5;

// Chat
pub const CHAT_HISTORY_WINDOW: usize = 6;
pub const CHAT_APOLOGY: &str =
    "Sorry, I ran into a problem understanding that request. Please try again in a moment.";

// Page limits
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;
