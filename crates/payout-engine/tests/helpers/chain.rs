//! Scripted chain backend
//!
//! Records every submission attempt and can be told to fail the n-th
//! submission (0-based), revert its confirmation, charge a custom gas price
//! or take a while to confirm.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use payout_engine::{
    chain::{ChainConnector, TransferReceipt, TransferSubmitter},
    config::ResolvedNetwork,
    errors::{ChainError, ConfigError},
};

pub const MOCK_GAS_USED: u64 = 52_000;
pub const MOCK_GAS_PRICE: u64 = 1_000_000;
pub const MOCK_FIRST_BLOCK: u64 = 1_000;

/// Hash the mock chain assigns to the n-th submission
pub fn tx_hash_for(index: usize) -> H256 {
    H256::from_low_u64_be(index as u64 + 1)
}

#[derive(Default)]
pub struct MockChain {
    submissions: Mutex<Vec<(Address, u64)>>,
    fail_submit_at: Option<usize>,
    revert_at: Option<usize>,
    gas_price: Option<U256>,
    confirm_delay: Option<Duration>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The n-th submission is rejected by the node
    pub fn failing_at(index: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_submit_at: Some(index),
            ..Self::default()
        })
    }

    /// The n-th submission is accepted but reverts on-chain
    pub fn reverting_at(index: usize) -> Arc<Self> {
        Arc::new(Self {
            revert_at: Some(index),
            ..Self::default()
        })
    }

    /// Every receipt reports `gas_price` as the effective gas price
    pub fn with_gas_price(gas_price: U256) -> Arc<Self> {
        Arc::new(Self {
            gas_price: Some(gas_price),
            ..Self::default()
        })
    }

    /// Every confirmation waits `delay` before the receipt comes back
    pub fn slow_confirmations(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            confirm_delay: Some(delay),
            ..Self::default()
        })
    }

    /// Every attempted submission, including rejected ones
    pub fn submissions(&self) -> Vec<(Address, u64)> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferSubmitter for MockChain {
    async fn submit(&self, to: Address, amount_units: u64) -> Result<H256, ChainError> {
        let mut submissions = self.submissions.lock().unwrap();
        let index = submissions.len();
        submissions.push((to, amount_units));

        if self.fail_submit_at == Some(index) {
            return Err(ChainError::Contract(
                "execution reverted: ERC20: transfer amount exceeds balance".to_string(),
            ));
        }
        Ok(tx_hash_for(index))
    }

    async fn confirm(&self, tx_hash: H256) -> Result<TransferReceipt, ChainError> {
        if let Some(delay) = self.confirm_delay {
            tokio::time::sleep(delay).await;
        }
        let index = tx_hash.to_low_u64_be() as usize - 1;
        if self.revert_at == Some(index) {
            return Err(ChainError::Reverted(tx_hash));
        }
        Ok(TransferReceipt {
            tx_hash,
            block_number: MOCK_FIRST_BLOCK + index as u64,
            gas_used: U256::from(MOCK_GAS_USED),
            effective_gas_price: self.gas_price.unwrap_or(U256::from(MOCK_GAS_PRICE)),
        })
    }
}

/// Hands out the shared mock chain and counts connections
pub struct MockConnector {
    chain: Arc<MockChain>,
    connections: AtomicUsize,
}

impl MockConnector {
    pub fn new(chain: Arc<MockChain>) -> Self {
        Self {
            chain,
            connections: AtomicUsize::new(0),
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl ChainConnector for MockConnector {
    fn connect(&self, _network: &ResolvedNetwork) -> Result<Box<dyn TransferSubmitter>, ConfigError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.chain.clone()))
    }
}
