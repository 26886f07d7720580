use chrono::Utc;
use ethers::types::{Address, H256};
use uuid::Uuid;

use super::{record_transfer, DistributionPlan, PayoutContext};
use crate::{
    chain::{TransferReceipt, TransferSubmitter},
    config::ResolvedNetwork,
    errors::{PayoutError, Result},
    events::{Stage, TransferConfirmed},
    state::TransferRecord,
};

/// Where a single planned transfer stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    Submitted { tx_hash: H256 },
    Confirmed { receipt: TransferReceipt },
    Failed { tx_hash: Option<H256>, reason: String },
}

impl TransferState {
    pub fn name(&self) -> &'static str {
        match self {
            TransferState::Pending => "pending",
            TransferState::Submitted { .. } => "submitted",
            TransferState::Confirmed { .. } => "confirmed",
            TransferState::Failed { .. } => "failed",
        }
    }
}

/// One plan entry moving through Pending -> Submitted -> Confirmed | Failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub index: usize,
    pub recipient: Address,
    pub amount_units: u64,
    state: TransferState,
}

impl TransferJob {
    pub fn new(index: usize, recipient: Address, amount_units: u64) -> Self {
        Self {
            index,
            recipient,
            amount_units,
            state: TransferState::Pending,
        }
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.state, TransferState::Confirmed { .. })
    }

    pub fn tx_hash(&self) -> Option<H256> {
        match &self.state {
            TransferState::Pending => None,
            TransferState::Submitted { tx_hash } => Some(*tx_hash),
            TransferState::Confirmed { receipt } => Some(receipt.tx_hash),
            TransferState::Failed { tx_hash, .. } => *tx_hash,
        }
    }

    pub fn mark_submitted(&mut self, tx_hash: H256) -> Result<()> {
        match self.state {
            TransferState::Pending => {
                self.state = TransferState::Submitted { tx_hash };
                Ok(())
            }
            _ => Err(self.invalid_transition("submitted")),
        }
    }

    pub fn mark_confirmed(&mut self, receipt: TransferReceipt) -> Result<()> {
        match self.state {
            TransferState::Submitted { tx_hash } if tx_hash == receipt.tx_hash => {
                self.state = TransferState::Confirmed { receipt };
                Ok(())
            }
            _ => Err(self.invalid_transition("confirmed")),
        }
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        let tx_hash = match self.state {
            TransferState::Pending => None,
            TransferState::Submitted { tx_hash } => Some(tx_hash),
            _ => return Err(self.invalid_transition("failed")),
        };
        self.state = TransferState::Failed {
            tx_hash,
            reason: reason.into(),
        };
        Ok(())
    }

    fn invalid_transition(&self, to: &'static str) -> PayoutError {
        PayoutError::InvalidTransition {
            from: self.state.name(),
            to,
        }
    }
}

/// Ordered transfer jobs for one window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferBatch {
    jobs: Vec<TransferJob>,
}

impl TransferBatch {
    pub fn from_plan(plan: &DistributionPlan) -> Self {
        Self {
            jobs: plan
                .entries
                .iter()
                .enumerate()
                .map(|(i, entry)| TransferJob::new(i, entry.recipient, entry.amount_units))
                .collect(),
        }
    }

    pub fn jobs(&self) -> &[TransferJob] {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut [TransferJob] {
        &mut self.jobs
    }

    pub fn confirmed_hashes(&self) -> Vec<H256> {
        self.jobs
            .iter()
            .filter(|job| job.is_confirmed())
            .filter_map(|job| job.tx_hash())
            .collect()
    }

    pub fn confirmed_units(&self) -> Option<u64> {
        self.jobs
            .iter()
            .filter(|job| job.is_confirmed())
            .try_fold(0u64, |acc, job| acc.checked_add(job.amount_units))
    }
}

/// Executes the batch strictly one transfer at a time
///
/// Each transfer is submitted, awaited until mined and recorded before the
/// next one starts. Confirmed jobs are skipped, so a batch can be resumed.
/// The first failure stops the run: that job is marked Failed and every
/// later job stays Pending. Sent transfers are never undone.
pub async fn handler(
    ctx: &PayoutContext,
    window_id: Uuid,
    network: &ResolvedNetwork,
    submitter: &dyn TransferSubmitter,
    batch: &mut TransferBatch,
) -> Result<Vec<TransferRecord>> {
    let mut records = Vec::new();

    for job in batch.jobs_mut() {
        match job.state() {
            TransferState::Confirmed { .. } => continue,
            TransferState::Pending => {}
            // Submitted or Failed jobs may already be on-chain; resending could pay twice
            _ => return Err(job.invalid_transition("submitted")),
        }

        log::debug!(
            "Submitting transfer {} of {} units to {:?}",
            job.index,
            job.amount_units,
            job.recipient
        );

        let tx_hash = match submitter.submit(job.recipient, job.amount_units).await {
            Ok(tx_hash) => tx_hash,
            Err(source) => {
                job.mark_failed(source.to_string())?;
                return Err(transfer_error(job, source));
            }
        };
        job.mark_submitted(tx_hash)?;

        let receipt = match submitter.confirm(tx_hash).await {
            Ok(receipt) => receipt,
            Err(source) => {
                job.mark_failed(source.to_string())?;
                return Err(transfer_error(job, source));
            }
        };
        job.mark_confirmed(receipt)?;

        ctx.audit
            .emit(
                Stage::SendingTransfers,
                Some(window_id),
                &TransferConfirmed {
                    window_id,
                    index: job.index,
                    tx_hash,
                    recipient: job.recipient,
                    amount_units: job.amount_units,
                    block_number: receipt.block_number,
                    gas_cost_wei: receipt.gas_cost(),
                    timestamp: Utc::now(),
                },
            )
            .await;

        let record = record_transfer::handler(ctx, window_id, network, job, &receipt).await?;
        records.push(record);
    }

    Ok(records)
}

fn transfer_error(job: &TransferJob, source: crate::errors::ChainError) -> PayoutError {
    PayoutError::Transfer {
        index: job.index,
        recipient: format!("{:?}", job.recipient),
        source,
    }
}
