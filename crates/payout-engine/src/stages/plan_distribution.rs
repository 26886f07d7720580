use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::Serialize;

use super::{DueWindow, PayoutContext};
use crate::{
    constants::TOKEN_DECIMALS,
    errors::{PayoutError, Result},
    events::{DistributionPlanned, ParticipantsExcluded, Stage},
    state::{Participant, PayoutConditions},
    utils::{format_units, parse_units},
};

/// One recipient and the integer units it is owed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedTransfer {
    pub recipient: Address,
    pub amount_units: u64,
}

/// Exact integer split of a payout amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionPlan {
    pub entries: Vec<PlannedTransfer>,
    pub total_units: u64,
    pub base_units: u64,
    /// Number of leading entries that received `base_units + 1`
    pub remainder: u64,
}

impl DistributionPlan {
    pub fn empty(total_units: u64) -> Self {
        Self {
            entries: Vec::new(),
            total_units,
            base_units: 0,
            remainder: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Split `total_units` across `recipients` in order
///
/// Every recipient gets `total / n`; the first `total % n` recipients get one
/// extra unit, so nothing is lost to rounding. An empty recipient list or a
/// zero total yields an empty plan. A total smaller than the recipient count
/// is rejected rather than sending zero-value transfers.
pub fn plan(total_units: u64, recipients: &[Address]) -> Result<DistributionPlan> {
    if recipients.is_empty() || total_units == 0 {
        return Ok(DistributionPlan::empty(total_units));
    }

    let count = recipients.len() as u64;
    let base_units = total_units.checked_div(count).ok_or(PayoutError::MathOverflow)?;
    let remainder = total_units.checked_rem(count).ok_or(PayoutError::MathOverflow)?;

    if base_units == 0 {
        return Err(PayoutError::AmountTooSmall {
            total_units,
            participants: recipients.len(),
        });
    }

    let entries = recipients
        .iter()
        .enumerate()
        .map(|(i, recipient)| {
            let extra = u64::from((i as u64) < remainder);
            base_units
                .checked_add(extra)
                .map(|amount_units| PlannedTransfer {
                    recipient: *recipient,
                    amount_units,
                })
                .ok_or(PayoutError::MathOverflow)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DistributionPlan {
        entries,
        total_units,
        base_units,
        remainder,
    })
}

/// The participants a window pays: the first `max_participants`, in join order
pub fn within_capacity<'a>(
    conditions: &PayoutConditions,
    participants: &'a [Participant],
) -> &'a [Participant] {
    let capacity = usize::try_from(conditions.max_participants).unwrap_or(usize::MAX);
    &participants[..participants.len().min(capacity)]
}

/// Plans the payout of a claimed window from its participant snapshot
///
/// Participants beyond the window's capacity (in join order) are left out.
pub async fn handler(
    ctx: &PayoutContext,
    due: &DueWindow,
    participants: &[Participant],
    now: DateTime<Utc>,
) -> Result<DistributionPlan> {
    let window_id = due.window.id;
    let total_units = parse_units(&due.conditions.total_amount, TOKEN_DECIMALS)?;

    let eligible = within_capacity(&due.conditions, participants);
    if eligible.len() < participants.len() {
        ctx.audit
            .emit(
                Stage::Planning,
                Some(window_id),
                &ParticipantsExcluded {
                    window_id,
                    capacity: due.conditions.max_participants,
                    excluded: participants.len() - eligible.len(),
                    timestamp: now,
                },
            )
            .await;
    }

    let recipients: Vec<Address> = eligible.iter().map(|p| p.address).collect();
    let plan = plan(total_units, &recipients)?;

    if !plan.is_empty() {
        ctx.audit
            .emit(
                Stage::Planning,
                Some(window_id),
                &DistributionPlanned {
                    window_id,
                    participant_count: plan.len(),
                    total_units,
                    base_units: plan.base_units,
                    remainder: plan.remainder,
                    timestamp: now,
                },
            )
            .await;
        log::debug!(
            "Window {}: {} each to {} participants",
            window_id,
            format_units(plan.base_units, TOKEN_DECIMALS),
            plan.len()
        );
    }

    Ok(plan)
}
