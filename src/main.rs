// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sideline API Server
//!
//! Backend for the team-management frontend: coach directory, team registry
//! and the invitation workflow, backed by Firestore.

use sideline::{
    config::Config,
    db::FirestoreDb,
    services::{
        CoachDirectory, IdentityVerifier, InvitationService, ReconcileService, TasksService,
        TeamRegistry,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Sideline API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize Cloud Tasks service
    let tasks_service = TasksService::new(&config.gcp_project_id, &config.gcp_region);
    tracing::info!(
        project = %config.gcp_project_id,
        "Cloud Tasks service initialized"
    );

    let identity = Arc::new(
        IdentityVerifier::new(&config.gcp_project_id)
            .expect("Failed to initialize identity verifier"),
    );

    // Wire the membership-sync services together
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db.clone());
    let invitations = InvitationService::new(db.clone(), directory.clone(), registry.clone());
    let reconcile = ReconcileService::new(db.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        identity,
        directory,
        registry,
        invitations,
        reconcile,
        tasks_service,
    });

    // Build router
    let app = sideline::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sideline=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
