// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks service for deferred reconciliation sweeps.
//!
//! When a listing detects membership divergence (dangling references,
//! missing directory records), the repair runs out-of-band: a task is queued
//! here and delivered to `/tasks/reconcile`.
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::error::AppError;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Payload sent to the reconcile task handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilePayload {
    /// What triggered the sweep ("listing_fallback", "dangling_membership", "schedule")
    pub source: String,
    /// Coach whose listing detected the divergence, if any
    pub coach_id: Option<String>,
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    queue_name: String,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::SYNC_QUEUE_NAME.to_string(),
        }
    }

    /// Queue a reconciliation sweep.
    pub async fn queue_reconcile(
        &self,
        service_url: &str,
        payload: ReconcilePayload,
    ) -> Result<()> {
        tracing::info!(
            source = %payload.source,
            coach_id = ?payload.coach_id,
            "Queuing reconciliation sweep"
        );
        self.queue_task(service_url, "/tasks/reconcile", &payload)
            .await
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(
        &self,
        service_url: &str,
        endpoint: &str,
        payload: &T,
    ) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let queue_path = format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        );

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "sideline-api@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(service_url.to_string()),
            );

        let task = Task::default().set_http_request(http_request);

        let _response = client
            .create_task()
            .set_parent(queue_path)
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }
}
