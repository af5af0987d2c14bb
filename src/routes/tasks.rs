// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users; the
//! queue-header middleware rejects everything else.

use crate::error::Result;
use crate::services::reconcile::ReconcileReport;
use crate::services::tasks::ReconcilePayload;
use crate::AppState;
use axum::{
    extract::{Json, State},
    middleware,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/reconcile", post(run_reconcile))
        .route_layer(middleware::from_fn(
            crate::middleware::tasks_auth::require_tasks_auth,
        ))
}

/// Run one idempotent reconciliation sweep.
///
/// Errors return 500 so Cloud Tasks retries; the sweep is safe to re-run.
async fn run_reconcile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReconcilePayload>,
) -> Result<Json<ReconcileReport>> {
    tracing::info!(
        source = %payload.source,
        coach_id = ?payload.coach_id,
        "Running reconciliation sweep from Cloud Task"
    );

    let report = state.reconcile.sweep().await?;

    Ok(Json(report))
}
