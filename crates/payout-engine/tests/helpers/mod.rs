//! Test helpers for payout engine integration tests
//!
//! Every test binary pulls in the whole module, so not every helper is
//! used by every file.
#![allow(dead_code)]

pub mod chain;
pub mod fixtures;
pub mod store;

pub use chain::*;
pub use fixtures::*;
pub use store::*;

use std::sync::Arc;

use payout_engine::{stages::PayoutContext, store::LedgerStore, PayoutEngine};

/// Engine wired to `store` and a mock chain, using the test config
pub fn setup_engine(store: Arc<dyn LedgerStore>, chain: Arc<MockChain>) -> (PayoutEngine, Arc<MockConnector>) {
    let connector = Arc::new(MockConnector::new(chain));
    let engine = PayoutEngine::new(Arc::new(test_config()), store, connector.clone());
    (engine, connector)
}

/// Stage-level context wired the same way as [`setup_engine`]
pub fn setup_context(store: Arc<dyn LedgerStore>, chain: Arc<MockChain>) -> PayoutContext {
    let connector = Arc::new(MockConnector::new(chain));
    PayoutContext::new(Arc::new(test_config()), store, connector)
}
