use uuid::Uuid;

use super::PayoutContext;
use crate::{
    errors::{PayoutError, Result},
    state::WindowStatus,
};

/// InProgress -> Completed, refusing if the window is no longer InProgress
pub async fn handler(ctx: &PayoutContext, window_id: Uuid) -> Result<()> {
    let changed = ctx
        .store
        .transition_window(window_id, WindowStatus::InProgress, WindowStatus::Completed)
        .await?;

    if changed != 1 {
        return Err(PayoutError::WindowStatusConflict(window_id));
    }
    Ok(())
}
