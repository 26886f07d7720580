use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    events::{AuditEvent, Stage},
    state::AuditLogEntry,
    store::LedgerStore,
};

/// Best-effort append-only audit trail
///
/// Every entry is mirrored to the process log. Store write failures are
/// reported there and swallowed; logging never fails a payout run.
#[derive(Clone)]
pub struct AuditLogger {
    store: Option<Arc<dyn LedgerStore>>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Process log only; used by dry runs, which must not write anything
    pub fn detached() -> Self {
        Self { store: None }
    }

    pub async fn record(&self, stage: Stage, window_id: Option<Uuid>, message: impl Into<String>) {
        let message = message.into();
        log::info!("[{}] {}{}", stage, message, window_suffix(window_id));
        self.append(stage, window_id, message, None, false).await;
    }

    pub async fn emit<E: AuditEvent>(&self, stage: Stage, window_id: Option<Uuid>, event: &E) {
        let message = event.message();
        log::info!("[{}] {}{}", stage, message, window_suffix(window_id));
        let details = match serde_json::to_value(event) {
            Ok(details) => Some(details),
            Err(err) => {
                log::warn!("Could not serialize audit event for stage {}: {}", stage, err);
                None
            }
        };
        self.append(stage, window_id, message, details, false).await;
    }

    pub async fn failure(
        &self,
        stage: Stage,
        window_id: Option<Uuid>,
        error: &(dyn std::error::Error + Send + Sync + 'static),
    ) {
        let message = error_chain(error);
        log::error!("[{}] {}{}", stage, message, window_suffix(window_id));
        self.append(stage, window_id, message, None, true).await;
    }

    async fn append(
        &self,
        stage: Stage,
        window_id: Option<Uuid>,
        message: String,
        details: Option<serde_json::Value>,
        is_failure: bool,
    ) {
        let Some(store) = &self.store else {
            return;
        };
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            message,
            stage: Some(stage),
            window_id,
            details,
            is_failure,
            created_at: Utc::now(),
        };
        if let Err(err) = store.append_log(&entry).await {
            log::warn!("Audit log write failed ({}): {}", stage, err);
        }
    }
}

fn window_suffix(window_id: Option<Uuid>) -> String {
    window_id
        .map(|id| format!(" (window {id})"))
        .unwrap_or_default()
}

/// `outer: inner: root` rendering of an error and its sources
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
