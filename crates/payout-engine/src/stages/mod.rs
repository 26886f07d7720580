#![allow(ambiguous_glob_reexports)]

use std::sync::Arc;

use crate::{audit::AuditLogger, chain::ChainConnector, config::Config, store::LedgerStore};

pub mod claim_window;
pub mod complete_window;
pub mod discover_window;
pub mod plan_distribution;
pub mod record_transfer;
pub mod reschedule;
pub mod send_transfers;
pub mod trigger_payout;

pub use claim_window::*;
pub use complete_window::*;
pub use discover_window::*;
pub use plan_distribution::*;
pub use record_transfer::*;
pub use reschedule::*;
pub use send_transfers::*;
pub use trigger_payout::*;

/// Collaborators shared by every stage handler
#[derive(Clone)]
pub struct PayoutContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn LedgerStore>,
    pub connector: Arc<dyn ChainConnector>,
    pub audit: AuditLogger,
}

impl PayoutContext {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn LedgerStore>,
        connector: Arc<dyn ChainConnector>,
    ) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self {
            config,
            store,
            connector,
            audit,
        }
    }

    /// Same collaborators, but the audit trail is not persisted
    pub fn for_dry_run(&self) -> Self {
        Self {
            audit: AuditLogger::detached(),
            ..self.clone()
        }
    }
}
