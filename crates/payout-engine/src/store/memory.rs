use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{check_transition, LedgerStore};
use crate::{
    errors::StoreError,
    state::{
        AuditLogEntry, DefaultPayoutConfig, NewPayoutConditions, Participant, PayoutConditions,
        PayoutWindow, TransferRecord, WindowStatus,
    },
};

#[derive(Default)]
struct Ledger {
    windows: Vec<PayoutWindow>,
    conditions: HashMap<Uuid, PayoutConditions>,
    participants: Vec<Participant>,
    transfers: Vec<TransferRecord>,
    logs: Vec<AuditLogEntry>,
    default_config: Option<DefaultPayoutConfig>,
}

/// In-process ledger, used for local runs and tests
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Ledger>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("ledger mutex poisoned".to_string()))
    }

    /// Seed a window with explicit status and conditions
    pub fn insert_window(&self, window: PayoutWindow, conditions: PayoutConditions) -> Result<(), StoreError> {
        let mut ledger = self.lock()?;
        ledger.conditions.insert(window.id, conditions);
        ledger.windows.push(window);
        Ok(())
    }

    pub fn add_participant(&self, participant: Participant) -> Result<(), StoreError> {
        self.lock()?.participants.push(participant);
        Ok(())
    }

    pub fn set_default_config(&self, config: Option<DefaultPayoutConfig>) -> Result<(), StoreError> {
        self.lock()?.default_config = config;
        Ok(())
    }

    pub fn all_windows(&self) -> Result<Vec<PayoutWindow>, StoreError> {
        Ok(self.lock()?.windows.clone())
    }

    pub fn all_transfers(&self) -> Result<Vec<TransferRecord>, StoreError> {
        Ok(self.lock()?.transfers.clone())
    }

    pub fn logs(&self) -> Result<Vec<AuditLogEntry>, StoreError> {
        Ok(self.lock()?.logs.clone())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn windows_with_status(
        &self,
        status: WindowStatus,
    ) -> Result<Vec<(PayoutWindow, PayoutConditions)>, StoreError> {
        let ledger = self.lock()?;
        let mut found: Vec<(PayoutWindow, PayoutConditions)> = ledger
            .windows
            .iter()
            .rev()
            .filter(|window| window.status == status)
            .filter_map(|window| {
                ledger
                    .conditions
                    .get(&window.id)
                    .map(|conditions| (window.clone(), conditions.clone()))
            })
            .collect();
        found.sort_by(|a, b| b.0.created_at.cmp(&a.0.created_at));
        Ok(found)
    }

    async fn transition_window(
        &self,
        window_id: Uuid,
        from: WindowStatus,
        to: WindowStatus,
    ) -> Result<u64, StoreError> {
        check_transition(from, to)?;
        let mut ledger = self.lock()?;
        match ledger
            .windows
            .iter_mut()
            .find(|window| window.id == window_id && window.status == from)
        {
            Some(window) => {
                window.status = to;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn participants(&self, window_id: Uuid) -> Result<Vec<Participant>, StoreError> {
        let mut participants: Vec<Participant> = self
            .lock()?
            .participants
            .iter()
            .filter(|participant| participant.window_id == window_id)
            .cloned()
            .collect();
        participants.sort_by_key(|participant| participant.joined_at);
        Ok(participants)
    }

    async fn create_window(
        &self,
        conditions: NewPayoutConditions,
    ) -> Result<(PayoutWindow, PayoutConditions), StoreError> {
        let window = PayoutWindow {
            id: Uuid::new_v4(),
            status: WindowStatus::Pending,
            created_at: Utc::now(),
        };
        let conditions = conditions.into_conditions(window.id);
        self.insert_window(window.clone(), conditions.clone())?;
        Ok((window, conditions))
    }

    async fn insert_transfer(&self, record: &TransferRecord) -> Result<(), StoreError> {
        self.lock()?.transfers.push(record.clone());
        Ok(())
    }

    async fn transfers(&self, window_id: Uuid) -> Result<Vec<TransferRecord>, StoreError> {
        Ok(self
            .lock()?
            .transfers
            .iter()
            .filter(|record| record.window_id == window_id)
            .cloned()
            .collect())
    }

    async fn default_config(&self) -> Result<Option<DefaultPayoutConfig>, StoreError> {
        Ok(self.lock()?.default_config.clone())
    }

    async fn append_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        self.lock()?.logs.push(entry.clone());
        Ok(())
    }
}
