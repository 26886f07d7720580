use std::fmt;

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::Network;

/// Stage tag attached to every audit entry and trigger failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    Configuration,
    Locking,
    FetchingParticipants,
    Planning,
    SendingTransfers,
    RecordingTransactions,
    Completing,
    Rescheduling,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Configuration => "configuration",
            Stage::Locking => "locking",
            Stage::FetchingParticipants => "fetching_participants",
            Stage::Planning => "planning",
            Stage::SendingTransfers => "sending_transfers",
            Stage::RecordingTransactions => "recording_transactions",
            Stage::Completing => "completing",
            Stage::Rescheduling => "rescheduling",
            Stage::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            Stage::Discovery,
            Stage::Configuration,
            Stage::Locking,
            Stage::FetchingParticipants,
            Stage::Planning,
            Stage::SendingTransfers,
            Stage::RecordingTransactions,
            Stage::Completing,
            Stage::Rescheduling,
            Stage::Completed,
        ]
        .into_iter()
        .find(|stage| stage.as_str() == value)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event written to the audit trail
///
/// The serialized event is stored as the entry's details, `message` as its text.
pub trait AuditEvent: Serialize {
    fn message(&self) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowClaimed {
    pub window_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub network: Network,
    pub total_amount: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent for WindowClaimed {
    fn message(&self) -> String {
        format!(
            "Window {} claimed, paying {} on {}",
            self.window_id,
            self.total_amount,
            self.network.as_str()
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantsExcluded {
    pub window_id: Uuid,
    pub capacity: u32,
    pub excluded: usize,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent for ParticipantsExcluded {
    fn message(&self) -> String {
        format!(
            "{} participants over capacity {} excluded from payout",
            self.excluded, self.capacity
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionPlanned {
    pub window_id: Uuid,
    pub participant_count: usize,
    pub total_units: u64,
    pub base_units: u64,
    pub remainder: u64,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent for DistributionPlanned {
    fn message(&self) -> String {
        format!(
            "Planned {} units across {} participants ({} each, {} with one extra unit)",
            self.total_units, self.participant_count, self.base_units, self.remainder
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NoTransfersRequired {
    pub window_id: Uuid,
    pub participant_count: usize,
    pub total_units: u64,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent for NoTransfersRequired {
    fn message(&self) -> String {
        format!(
            "No transfers required ({} participants, {} units)",
            self.participant_count, self.total_units
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferConfirmed {
    pub window_id: Uuid,
    pub index: usize,
    pub tx_hash: H256,
    pub recipient: Address,
    pub amount_units: u64,
    pub block_number: u64,
    /// None when gas used times price overflows, as in the ledger row
    pub gas_cost_wei: Option<U256>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent for TransferConfirmed {
    fn message(&self) -> String {
        format!(
            "Transfer {} of {} units to {:?} confirmed in block {} ({:?})",
            self.index, self.amount_units, self.recipient, self.block_number, self.tx_hash
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferRecordedDegraded {
    pub window_id: Uuid,
    pub tx_hash: H256,
    pub recipient: Address,
    pub amount_units: u64,
    pub primary_error: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent for TransferRecordedDegraded {
    fn message(&self) -> String {
        format!(
            "Transfer {:?} recorded without amount after primary write failed; actual amount was {} units",
            self.tx_hash, self.amount_units
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowScheduled {
    pub window_id: Uuid,
    pub previous_window_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub total_amount: String,
    pub network: Network,
    pub max_participants: u32,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent for WindowScheduled {
    fn message(&self) -> String {
        format!(
            "Next window {} scheduled for {} ({} on {})",
            self.window_id,
            self.scheduled_at.to_rfc3339(),
            self.total_amount,
            self.network.as_str()
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutCompleted {
    pub window_id: Uuid,
    pub transfers: usize,
    pub distributed_units: u64,
    pub next_window_id: Uuid,
    pub next_scheduled_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent for PayoutCompleted {
    fn message(&self) -> String {
        format!(
            "Payout completed: {} transfers, {} units distributed",
            self.transfers, self.distributed_units
        )
    }
}
