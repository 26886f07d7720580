use ethers::types::H256;
use thiserror::Error;
use uuid::Uuid;

use crate::{events::Stage, state::Network};

/// Missing or malformed configuration. Always raised before any side effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("RPC URL is not configured for {0}")]
    MissingRpcUrl(&'static str),

    #[error("Signing key is not configured for {0}")]
    MissingSigningKey(&'static str),

    #[error("Token contract address is not configured for {0}")]
    MissingTokenAddress(&'static str),
}

impl ConfigError {
    pub fn missing_rpc_url(network: Network) -> Self {
        ConfigError::MissingRpcUrl(network.as_str())
    }

    pub fn missing_signing_key(network: Network) -> Self {
        ConfigError::MissingSigningKey(network.as_str())
    }

    pub fn missing_token_address(network: Network) -> Self {
        ConfigError::MissingTokenAddress(network.as_str())
    }
}

/// Ledger store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid persisted data: {0}")]
    InvalidData(String),

    #[error("Window status cannot change from {from} to {to}")]
    IllegalTransition { from: &'static str, to: &'static str },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Submission or confirmation failures from the chain backend
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC provider error: {0}")]
    Provider(String),

    #[error("Transfer call failed: {0}")]
    Contract(String),

    #[error("Transaction {0:?} was dropped before confirmation")]
    Dropped(H256),

    #[error("Transaction {0:?} reverted")]
    Reverted(H256),

    #[error("Receipt for {tx_hash:?} is missing {field}")]
    IncompleteReceipt { tx_hash: H256, field: &'static str },
}

/// Engine error taxonomy
#[derive(Debug, Error)]
pub enum PayoutError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read payout windows: {0}")]
    Discovery(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid payout amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: &'static str },

    #[error("Amount of {total_units} units is too small to split across {participants} participants")]
    AmountTooSmall { total_units: u64, participants: usize },

    #[error("Transfer {index} to {recipient} failed: {source}")]
    Transfer {
        index: usize,
        recipient: String,
        #[source]
        source: ChainError,
    },

    #[error("Transfer {tx_hash:?} was sent but could not be recorded: {source}")]
    Recording {
        tx_hash: H256,
        #[source]
        source: StoreError,
    },

    #[error("Invalid transfer state transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Window {0} changed status unexpectedly")]
    WindowStatusConflict(Uuid),

    #[error("Math overflow")]
    MathOverflow,
}

impl PayoutError {
    /// True once funds may have moved without a matching ledger row
    pub fn is_ledger_divergence(&self) -> bool {
        matches!(self, PayoutError::Recording { .. })
    }
}

/// A failed trigger run, tagged with the stage that failed
#[derive(Debug, Error)]
#[error("Payout failed during {stage}: {error}")]
pub struct TriggerFailure {
    pub stage: Stage,
    pub window_id: Option<Uuid>,
    #[source]
    pub error: PayoutError,
}

impl TriggerFailure {
    pub fn new(stage: Stage, window_id: Option<Uuid>, error: impl Into<PayoutError>) -> Self {
        TriggerFailure {
            stage,
            window_id,
            error: error.into(),
        }
    }
}

pub type Result<T, E = PayoutError> = std::result::Result<T, E>;
