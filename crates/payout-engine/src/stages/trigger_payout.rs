use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    claim_window, complete_window, discover_window, plan_distribution, reschedule, send_transfers,
    within_capacity, DistributionPlan, DueWindow, PayoutContext, TransferBatch,
};
use crate::{
    constants::TOKEN_DECIMALS,
    errors::{PayoutError, TriggerFailure},
    events::{NoTransfersRequired, PayoutCompleted, Stage},
    utils::format_units,
};

const NO_DUE_WINDOW: &str = "No due payout window";
const NO_TRANSFERS_REQUIRED: &str = "No transfers required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Skipped,
}

/// One line of a dry-run plan, amount in token units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPayout {
    pub recipient: Address,
    pub amount: String,
}

/// Outcome of one trigger invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReport {
    pub status: RunStatus,
    pub dry_run: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub participant_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_per_participant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hashes: Option<Vec<H256>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_window_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<PlannedPayout>>,
}

impl PayoutReport {
    fn skipped(dry_run: bool, window_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Skipped,
            dry_run,
            message: message.into(),
            window_id,
            scheduled_at: None,
            participant_count: 0,
            total_amount: None,
            amount_per_participant: None,
            transaction_hashes: None,
            next_window_id: None,
            next_scheduled_at: None,
            plan: None,
        }
    }

    /// `participant_count` counts the participants within capacity, even
    /// when a zero amount leaves the plan empty
    fn planned(
        due: &DueWindow,
        participant_count: usize,
        plan: &DistributionPlan,
        dry_run: bool,
        message: String,
    ) -> Self {
        Self {
            status: RunStatus::Success,
            dry_run,
            message,
            window_id: Some(due.id()),
            scheduled_at: Some(due.conditions.scheduled_at),
            participant_count,
            total_amount: Some(due.conditions.total_amount.clone()),
            amount_per_participant: (!plan.is_empty())
                .then(|| format_units(plan.base_units, TOKEN_DECIMALS)),
            transaction_hashes: None,
            next_window_id: None,
            next_scheduled_at: None,
            plan: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == RunStatus::Skipped
    }
}

/// Runs one payout invocation end to end
///
/// Every failure is written to the audit trail once, tagged with the stage
/// that failed, and returned. Transfers already sent are never undone; a
/// window that fails after its claim stays InProgress for manual follow-up.
pub async fn handler(
    ctx: &PayoutContext,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<PayoutReport, TriggerFailure> {
    let dry_ctx;
    let ctx = if dry_run {
        dry_ctx = ctx.for_dry_run();
        &dry_ctx
    } else {
        ctx
    };

    match run(ctx, now, dry_run).await {
        Ok(report) => Ok(report),
        Err(failure) => {
            ctx.audit
                .failure(failure.stage, failure.window_id, &failure.error)
                .await;
            Err(failure)
        }
    }
}

async fn run(
    ctx: &PayoutContext,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<PayoutReport, TriggerFailure> {
    let due = discover_window::handler(ctx, now)
        .await
        .map_err(|err| TriggerFailure::new(Stage::Discovery, None, err))?;
    let Some(due) = due else {
        log::info!("{}", NO_DUE_WINDOW);
        return Ok(PayoutReport::skipped(dry_run, None, NO_DUE_WINDOW));
    };
    let window_id = due.id();

    if dry_run {
        return dry_run_report(ctx, &due, now).await;
    }

    // Resolve everything that can be misconfigured before the window is touched
    let network = ctx
        .config
        .network(due.conditions.network)
        .resolve()
        .map_err(at(Stage::Configuration, window_id))?;
    let submitter = ctx
        .connector
        .connect(&network)
        .map_err(at(Stage::Configuration, window_id))?;

    let claimed = claim_window::handler(ctx, &due, now)
        .await
        .map_err(at(Stage::Locking, window_id))?;
    if !claimed {
        return Ok(PayoutReport::skipped(
            false,
            Some(window_id),
            "Window already claimed by another run",
        ));
    }

    let participants = ctx
        .store
        .participants(window_id)
        .await
        .map_err(at(Stage::FetchingParticipants, window_id))?;
    let participant_count = within_capacity(&due.conditions, &participants).len();
    ctx.audit
        .record(
            Stage::FetchingParticipants,
            Some(window_id),
            format!("Fetched {} participants", participants.len()),
        )
        .await;

    let plan = plan_distribution::handler(ctx, &due, &participants, now)
        .await
        .map_err(at(Stage::Planning, window_id))?;

    let mut batch = TransferBatch::from_plan(&plan);
    if plan.is_empty() {
        ctx.audit
            .emit(
                Stage::SendingTransfers,
                Some(window_id),
                &NoTransfersRequired {
                    window_id,
                    participant_count: participants.len(),
                    total_units: plan.total_units,
                    timestamp: now,
                },
            )
            .await;
    } else {
        send_transfers::handler(ctx, window_id, &network, &*submitter, &mut batch)
            .await
            .map_err(|err| {
                let stage = match &err {
                    PayoutError::Recording { .. } => Stage::RecordingTransactions,
                    _ => Stage::SendingTransfers,
                };
                TriggerFailure::new(stage, Some(window_id), err)
            })?;
    }

    complete_window::handler(ctx, window_id)
        .await
        .map_err(at(Stage::Completing, window_id))?;
    ctx.audit
        .record(Stage::Completing, Some(window_id), "Window marked completed")
        .await;

    let (next_window, next_conditions) = reschedule::handler(ctx, &due.conditions, now)
        .await
        .map_err(at(Stage::Rescheduling, window_id))?;

    let distributed_units = batch
        .confirmed_units()
        .ok_or(PayoutError::MathOverflow)
        .map_err(at(Stage::Completed, window_id))?;
    let transaction_hashes = batch.confirmed_hashes();

    ctx.audit
        .emit(
            Stage::Completed,
            Some(window_id),
            &PayoutCompleted {
                window_id,
                transfers: transaction_hashes.len(),
                distributed_units,
                next_window_id: next_window.id,
                next_scheduled_at: next_conditions.scheduled_at,
                timestamp: now,
            },
        )
        .await;

    let message = if plan.is_empty() {
        NO_TRANSFERS_REQUIRED.to_string()
    } else {
        format!(
            "Distributed {} across {} participants",
            format_units(distributed_units, TOKEN_DECIMALS),
            plan.len()
        )
    };

    Ok(PayoutReport {
        transaction_hashes: Some(transaction_hashes),
        next_window_id: Some(next_window.id),
        next_scheduled_at: Some(next_conditions.scheduled_at),
        ..PayoutReport::planned(&due, participant_count, &plan, false, message)
    })
}

fn at<E: Into<PayoutError>>(stage: Stage, window_id: Uuid) -> impl FnOnce(E) -> TriggerFailure {
    move |err| TriggerFailure::new(stage, Some(window_id), err)
}

/// Plans the due window without claiming it, sending, or writing anything
async fn dry_run_report(
    ctx: &PayoutContext,
    due: &DueWindow,
    now: DateTime<Utc>,
) -> Result<PayoutReport, TriggerFailure> {
    let window_id = Some(due.id());
    let participants = ctx
        .store
        .participants(due.id())
        .await
        .map_err(|err| TriggerFailure::new(Stage::FetchingParticipants, window_id, err))?;
    let participant_count = within_capacity(&due.conditions, &participants).len();
    let plan = plan_distribution::handler(ctx, due, &participants, now)
        .await
        .map_err(|err| TriggerFailure::new(Stage::Planning, window_id, err))?;

    let message = if plan.is_empty() {
        NO_TRANSFERS_REQUIRED.to_string()
    } else {
        format!("Dry run: {} transfers planned", plan.len())
    };
    let entries = plan
        .entries
        .iter()
        .map(|entry| PlannedPayout {
            recipient: entry.recipient,
            amount: format_units(entry.amount_units, TOKEN_DECIMALS),
        })
        .collect();

    Ok(PayoutReport {
        plan: Some(entries),
        ..PayoutReport::planned(due, participant_count, &plan, true, message)
    })
}
