use chrono::Utc;
use uuid::Uuid;

use super::{PayoutContext, TransferJob};
use crate::{
    chain::TransferReceipt,
    config::ResolvedNetwork,
    errors::{PayoutError, Result},
    events::{Stage, TransferRecordedDegraded},
    state::{TransferRecord, TransferStatus},
    utils::explorer_tx_url,
};

/// Writes the ledger row for a confirmed transfer
///
/// The funds have already moved, so a failed primary write is followed by
/// exactly one degraded write that keeps the hash, recipient and window but
/// marks the amount unknown. Only if that also fails is the run aborted.
pub async fn handler(
    ctx: &PayoutContext,
    window_id: Uuid,
    network: &ResolvedNetwork,
    job: &TransferJob,
    receipt: &TransferReceipt,
) -> Result<TransferRecord> {
    let tx_hash = receipt.tx_hash;
    let explorer_url = explorer_tx_url(&network.explorer_url, &tx_hash);

    let record = TransferRecord {
        id: Uuid::new_v4(),
        window_id,
        tx_hash,
        recipient: job.recipient,
        amount_units: Some(job.amount_units),
        status: TransferStatus::Confirmed,
        gas_cost_wei: receipt.gas_cost(),
        chain_id: network.chain_id,
        block_number: Some(receipt.block_number),
        explorer_url: explorer_url.clone(),
        confirmed_at: Some(Utc::now()),
        degraded: false,
    };

    let primary_error = match ctx.store.insert_transfer(&record).await {
        Ok(()) => return Ok(record),
        Err(err) => err,
    };
    ctx.audit
        .failure(Stage::RecordingTransactions, Some(window_id), &primary_error)
        .await;

    let fallback = TransferRecord {
        id: Uuid::new_v4(),
        window_id,
        tx_hash,
        recipient: job.recipient,
        amount_units: None,
        status: TransferStatus::Sent,
        gas_cost_wei: None,
        chain_id: network.chain_id,
        block_number: None,
        explorer_url,
        confirmed_at: None,
        degraded: true,
    };

    ctx.store
        .insert_transfer(&fallback)
        .await
        .map_err(|source| PayoutError::Recording { tx_hash, source })?;

    ctx.audit
        .emit(
            Stage::RecordingTransactions,
            Some(window_id),
            &TransferRecordedDegraded {
                window_id,
                tx_hash,
                recipient: job.recipient,
                amount_units: job.amount_units,
                primary_error: primary_error.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await;

    Ok(fallback)
}
