use chrono::{DateTime, Utc};

use super::{DueWindow, PayoutContext};
use crate::{
    errors::{PayoutError, Result},
    events::{Stage, WindowClaimed},
    state::WindowStatus,
};

/// Atomically moves a due window from Pending to InProgress
///
/// Returns `false` when another run changed the window first; the caller
/// must then stop without touching participants or the chain.
pub async fn handler(ctx: &PayoutContext, due: &DueWindow, now: DateTime<Utc>) -> Result<bool> {
    let window_id = due.window.id;
    let changed = ctx
        .store
        .transition_window(window_id, WindowStatus::Pending, WindowStatus::InProgress)
        .await?;

    match changed {
        0 => {
            ctx.audit
                .record(Stage::Locking, Some(window_id), "Window already claimed by another run")
                .await;
            Ok(false)
        }
        1 => {
            ctx.audit
                .emit(
                    Stage::Locking,
                    Some(window_id),
                    &WindowClaimed {
                        window_id,
                        scheduled_at: due.conditions.scheduled_at,
                        network: due.conditions.network,
                        total_amount: due.conditions.total_amount.clone(),
                        timestamp: now,
                    },
                )
                .await;
            Ok(true)
        }
        _ => Err(PayoutError::WindowStatusConflict(window_id)),
    }
}
