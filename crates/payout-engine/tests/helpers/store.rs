//! Ledger wrapper with injectable failures
//!
//! Delegates to a [`MemoryLedger`] so tests can still inspect what was
//! written.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use payout_engine::{
    errors::StoreError,
    state::{
        AuditLogEntry, DefaultPayoutConfig, NewPayoutConditions, Participant, PayoutConditions,
        PayoutWindow, TransferRecord, WindowStatus,
    },
    store::{LedgerStore, MemoryLedger},
};
use uuid::Uuid;

pub struct FlakyStore {
    pub ledger: Arc<MemoryLedger>,
    transfer_write_failures: AtomicUsize,
    fail_discovery: AtomicBool,
    fail_default_config: AtomicBool,
    fail_log_writes: AtomicBool,
    race_claims: AtomicBool,
}

impl FlakyStore {
    pub fn new(ledger: Arc<MemoryLedger>) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            transfer_write_failures: AtomicUsize::new(0),
            fail_discovery: AtomicBool::new(false),
            fail_default_config: AtomicBool::new(false),
            fail_log_writes: AtomicBool::new(false),
            race_claims: AtomicBool::new(false),
        })
    }

    /// Fail the next `count` transfer inserts
    pub fn fail_transfer_writes(&self, count: usize) {
        self.transfer_write_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_discovery(&self) {
        self.fail_discovery.store(true, Ordering::SeqCst);
    }

    pub fn fail_default_config(&self) {
        self.fail_default_config.store(true, Ordering::SeqCst);
    }

    /// Every audit log append fails from now on
    pub fn fail_log_writes(&self) {
        self.fail_log_writes.store(true, Ordering::SeqCst);
    }

    /// Every listed Pending window gets claimed by a "concurrent run" right
    /// after it is read
    pub fn race_claims(&self) {
        self.race_claims.store(true, Ordering::SeqCst);
    }

    fn take_transfer_failure(&self) -> bool {
        self.transfer_write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn windows_with_status(
        &self,
        status: WindowStatus,
    ) -> Result<Vec<(PayoutWindow, PayoutConditions)>, StoreError> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".to_string()));
        }
        let windows = self.ledger.windows_with_status(status).await?;
        if self.race_claims.load(Ordering::SeqCst) && status == WindowStatus::Pending {
            for (window, _) in &windows {
                self.ledger
                    .transition_window(window.id, WindowStatus::Pending, WindowStatus::InProgress)
                    .await?;
            }
        }
        Ok(windows)
    }

    async fn transition_window(
        &self,
        window_id: Uuid,
        from: WindowStatus,
        to: WindowStatus,
    ) -> Result<u64, StoreError> {
        self.ledger.transition_window(window_id, from, to).await
    }

    async fn participants(&self, window_id: Uuid) -> Result<Vec<Participant>, StoreError> {
        self.ledger.participants(window_id).await
    }

    async fn create_window(
        &self,
        conditions: NewPayoutConditions,
    ) -> Result<(PayoutWindow, PayoutConditions), StoreError> {
        self.ledger.create_window(conditions).await
    }

    async fn insert_transfer(&self, record: &TransferRecord) -> Result<(), StoreError> {
        if self.take_transfer_failure() {
            return Err(StoreError::Backend("deadlock detected".to_string()));
        }
        self.ledger.insert_transfer(record).await
    }

    async fn transfers(&self, window_id: Uuid) -> Result<Vec<TransferRecord>, StoreError> {
        self.ledger.transfers(window_id).await
    }

    async fn default_config(&self) -> Result<Option<DefaultPayoutConfig>, StoreError> {
        if self.fail_default_config.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("relation does not exist".to_string()));
        }
        self.ledger.default_config().await
    }

    async fn append_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        if self.fail_log_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.ledger.append_log(entry).await
    }
}
