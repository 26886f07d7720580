//! Payout ledger store
//!
//! The only shared mutable resource of the engine. Status changes go through
//! [`LedgerStore::transition_window`], a compare-and-swap that reports how
//! many rows it changed, so two overlapping runs can never both claim the
//! same window.

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    errors::StoreError,
    state::{
        AuditLogEntry, DefaultPayoutConfig, NewPayoutConditions, Participant, PayoutConditions,
        PayoutWindow, TransferRecord, WindowStatus,
    },
};

/// Every backend checks the requested edge before its compare-and-swap
pub(crate) fn check_transition(from: WindowStatus, to: WindowStatus) -> Result<(), StoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Windows with the given status and their conditions, most recent first
    async fn windows_with_status(
        &self,
        status: WindowStatus,
    ) -> Result<Vec<(PayoutWindow, PayoutConditions)>, StoreError>;

    /// Set `to` only if the window is currently `from`; returns rows changed (0 or 1)
    ///
    /// Edges outside the window lifecycle fail with
    /// [`StoreError::IllegalTransition`] without touching the window.
    async fn transition_window(
        &self,
        window_id: Uuid,
        from: WindowStatus,
        to: WindowStatus,
    ) -> Result<u64, StoreError>;

    /// Participants of a window in join order
    async fn participants(&self, window_id: Uuid) -> Result<Vec<Participant>, StoreError>;

    /// Create a Pending window together with its conditions
    async fn create_window(
        &self,
        conditions: NewPayoutConditions,
    ) -> Result<(PayoutWindow, PayoutConditions), StoreError>;

    async fn insert_transfer(&self, record: &TransferRecord) -> Result<(), StoreError>;

    async fn transfers(&self, window_id: Uuid) -> Result<Vec<TransferRecord>, StoreError>;

    async fn default_config(&self) -> Result<Option<DefaultPayoutConfig>, StoreError>;

    async fn append_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;
}
