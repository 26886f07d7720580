use chrono::{DateTime, Utc};

use super::PayoutContext;
use crate::{
    errors::{PayoutError, Result},
    state::{PayoutConditions, PayoutWindow, WindowStatus},
};

/// A Pending window whose conditions say it should run now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueWindow {
    pub window: PayoutWindow,
    pub conditions: PayoutConditions,
}

impl DueWindow {
    pub fn id(&self) -> uuid::Uuid {
        self.window.id
    }
}

/// Finds at most one due window, most recent first
/// Read-only; a store failure aborts before anything is mutated
pub async fn handler(ctx: &PayoutContext, now: DateTime<Utc>) -> Result<Option<DueWindow>> {
    let candidates = ctx
        .store
        .windows_with_status(WindowStatus::Pending)
        .await
        .map_err(PayoutError::Discovery)?;

    let total = candidates.len();
    let due = candidates
        .into_iter()
        // Only Pending windows are eligible, whatever the backend returned
        .filter(|(window, _)| window.status == WindowStatus::Pending)
        .find(|(_, conditions)| conditions.is_due(now))
        .map(|(window, conditions)| DueWindow { window, conditions });

    match &due {
        Some(found) => log::debug!(
            "Window {} is due ({} pending candidates)",
            found.window.id,
            total
        ),
        None => log::debug!("No due window among {} pending candidates", total),
    }

    Ok(due)
}
