use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid slippage: {0}")]
    InvalidSlippage(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Malformed pool data for {pool_id}: {reason}")]
    MalformedPoolData { pool_id: String, reason: String },

    #[error("Insufficient liquidity in pool {0}")]
    LowLiquidity(String),

    #[error("Price impact too high: {bps} bps")]
    HighPriceImpact { bps: u64 },

    #[error("Pool discovery already in progress")]
    AlreadyInitializing,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid Move type: {0}")]
    InvalidMoveType(String),

    #[error("Decimals mismatch: {left} vs {right}")]
    DecimalsMismatch { left: u8, right: u8 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("BCS error: {0}")]
    Bcs(#[from] bcs::Error),
}

impl AppError {
    /// Transport-level failures a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Provider(_))
    }
}
