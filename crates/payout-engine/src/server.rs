//! HTTP trigger surface
//!
//! An external scheduler calls the trigger route on a timer. Callers
//! authenticate with the shared trigger secret, either in the
//! `x-cron-secret` header or as a bearer token.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{constants::TRIGGER_SECRET_HEADER, errors::TriggerFailure, events::Stage, PayoutEngine};

pub const TRIGGER_ROUTE: &str = "/api/payouts/trigger";
pub const HEALTH_ROUTE: &str = "/health";

#[derive(Debug, Default, Deserialize)]
pub struct TriggerQuery {
    #[serde(default)]
    pub dry_run: bool,
}

/// Body returned for unauthorized or failed runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_id: Option<Uuid>,
}

impl From<&TriggerFailure> for ErrorBody {
    fn from(failure: &TriggerFailure) -> Self {
        ErrorBody {
            status: "error".to_string(),
            stage: Some(failure.stage),
            message: failure.error.to_string(),
            window_id: failure.window_id,
        }
    }
}

pub fn router(engine: Arc<PayoutEngine>) -> Router {
    Router::new()
        .route(TRIGGER_ROUTE, get(trigger).post(trigger))
        .route(HEALTH_ROUTE, get(health))
        .with_state(engine)
}

async fn health() -> &'static str {
    "ok"
}

async fn trigger(
    State(engine): State<Arc<PayoutEngine>>,
    Query(query): Query<TriggerQuery>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &engine.config().trigger_secret) {
        log::warn!("Rejected payout trigger with missing or invalid secret");
        let body = ErrorBody {
            status: "error".to_string(),
            stage: None,
            message: "Unauthorized".to_string(),
            window_id: None,
        };
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    let outcome = if query.dry_run {
        engine.trigger(true).await
    } else {
        // A live run must not be cancelled when the caller hangs up mid-transfer
        let run = tokio::spawn(async move { engine.trigger(false).await });
        match run.await {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("Payout run task aborted: {}", err);
                let body = ErrorBody {
                    status: "error".to_string(),
                    stage: None,
                    message: format!("Payout run aborted: {err}"),
                    window_id: None,
                };
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
            }
        }
    };

    match outcome {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(failure) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::from(&failure))).into_response()
        }
    }
}

fn presented_secret(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(TRIGGER_SECRET_HEADER) {
        return value.to_str().ok();
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Constant-time comparison against the configured secret
pub fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    match presented_secret(headers) {
        Some(presented) => presented.trim().as_bytes().ct_eq(secret.as_bytes()).into(),
        None => false,
    }
}
