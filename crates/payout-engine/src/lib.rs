pub mod audit;
pub mod chain;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod server;
pub mod stages;
pub mod state;
pub mod store;
mod utils;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use chain::ChainConnector;
use config::Config;
use errors::TriggerFailure;
use stages::PayoutContext;
use store::LedgerStore;

pub use stages::{PayoutReport, RunStatus};

/// Weekly payout engine
///
/// Owns the collaborators every stage needs and exposes the single trigger
/// entry point used by the HTTP surface and by tests.
#[derive(Clone)]
pub struct PayoutEngine {
    ctx: PayoutContext,
}

impl PayoutEngine {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn LedgerStore>,
        connector: Arc<dyn ChainConnector>,
    ) -> Self {
        Self {
            ctx: PayoutContext::new(config, store, connector),
        }
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Runs one payout invocation against the current time
    ///
    /// A dry run plans the due window without claiming, sending or writing
    pub async fn trigger(&self, dry_run: bool) -> Result<PayoutReport, TriggerFailure> {
        self.trigger_at(Utc::now(), dry_run).await
    }

    /// Same as [`PayoutEngine::trigger`] with an explicit clock
    pub async fn trigger_at(
        &self,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<PayoutReport, TriggerFailure> {
        stages::trigger_payout::handler(&self.ctx, now, dry_run).await
    }
}
