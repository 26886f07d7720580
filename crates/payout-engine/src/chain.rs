//! On-chain side of the payout: ERC-20 `transfer` submission and
//! confirmation.
//!
//! The engine only talks to [`TransferSubmitter`]; [`EthersConnector`]
//! builds the real one for a window's network.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    contract::abigen,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, H256, U256, U64},
};

use crate::{
    config::ResolvedNetwork,
    constants::REQUIRED_CONFIRMATIONS,
    errors::{ChainError, ConfigError},
};

abigen!(
    Erc20Token,
    r#"[
        function transfer(address to, uint256 amount) external returns (bool)
    ]"#
);

/// Metadata extracted from a confirmed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
    pub gas_used: U256,
    pub effective_gas_price: U256,
}

impl TransferReceipt {
    /// Gas paid in wei; None on overflow
    pub fn gas_cost(&self) -> Option<U256> {
        self.gas_used.checked_mul(self.effective_gas_price)
    }
}

/// Sends one token transfer at a time from a single signing key
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    /// Broadcast `transfer(to, amount_units)`; returns once the node accepted it
    async fn submit(&self, to: Address, amount_units: u64) -> Result<H256, ChainError>;

    /// Block until the transaction is mined and return its receipt
    async fn confirm(&self, tx_hash: H256) -> Result<TransferReceipt, ChainError>;
}

#[async_trait]
impl<T> TransferSubmitter for Arc<T>
where
    T: TransferSubmitter + ?Sized,
{
    async fn submit(&self, to: Address, amount_units: u64) -> Result<H256, ChainError> {
        (**self).submit(to, amount_units).await
    }

    async fn confirm(&self, tx_hash: H256) -> Result<TransferReceipt, ChainError> {
        (**self).confirm(tx_hash).await
    }
}

/// Builds a submitter for a resolved network
pub trait ChainConnector: Send + Sync {
    fn connect(&self, network: &ResolvedNetwork) -> Result<Box<dyn TransferSubmitter>, ConfigError>;
}

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Connects to EVM networks over HTTP JSON-RPC
#[derive(Debug, Default, Clone, Copy)]
pub struct EthersConnector;

impl ChainConnector for EthersConnector {
    fn connect(&self, network: &ResolvedNetwork) -> Result<Box<dyn TransferSubmitter>, ConfigError> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str()).map_err(|err| {
            ConfigError::Invalid {
                name: "rpc_url",
                reason: err.to_string(),
            }
        })?;
        let wallet = network
            .signing_key
            .parse::<LocalWallet>()
            .map_err(|_| ConfigError::Invalid {
                name: "signing_key",
                reason: "not a valid secp256k1 private key".to_string(),
            })?
            .with_chain_id(network.chain_id);

        log::info!(
            "Connected payout signer {:?} on {} (chain {})",
            wallet.address(),
            network.network.as_str(),
            network.chain_id
        );

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let token = Erc20Token::new(network.token_address, client.clone());
        Ok(Box::new(EthersSubmitter { client, token }))
    }
}

pub struct EthersSubmitter {
    client: Arc<SignerClient>,
    token: Erc20Token<SignerClient>,
}

#[async_trait]
impl TransferSubmitter for EthersSubmitter {
    async fn submit(&self, to: Address, amount_units: u64) -> Result<H256, ChainError> {
        let call = self.token.transfer(to, U256::from(amount_units));
        let pending = call
            .send()
            .await
            .map_err(|err| ChainError::Contract(err.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn confirm(&self, tx_hash: H256) -> Result<TransferReceipt, ChainError> {
        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .confirmations(REQUIRED_CONFIRMATIONS)
            .await
            .map_err(|err| ChainError::Provider(err.to_string()))?
            .ok_or(ChainError::Dropped(tx_hash))?;

        if receipt.status == Some(U64::zero()) {
            return Err(ChainError::Reverted(tx_hash));
        }

        let block_number = receipt
            .block_number
            .ok_or(ChainError::IncompleteReceipt { tx_hash, field: "block_number" })?;
        let gas_used = receipt
            .gas_used
            .ok_or(ChainError::IncompleteReceipt { tx_hash, field: "gas_used" })?;
        let effective_gas_price = receipt
            .effective_gas_price
            .ok_or(ChainError::IncompleteReceipt { tx_hash, field: "effective_gas_price" })?;

        Ok(TransferReceipt {
            tx_hash,
            block_number: block_number.as_u64(),
            gas_used,
            effective_gas_price,
        })
    }
}
