// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Sideline: youth-sports team management backend
//!
//! This crate provides the backend API for coach profiles, team rosters and
//! the invitation workflow, keeping the denormalized coach/team membership
//! records synchronized in Firestore.

pub mod config;
pub mod db;
pub mod error;
pub mod invite_code;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{
    CoachDirectory, IdentityVerifier, InvitationService, ReconcileService, TasksService,
    TeamRegistry,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub identity: Arc<IdentityVerifier>,
    pub directory: CoachDirectory,
    pub registry: TeamRegistry,
    pub invitations: InvitationService,
    pub reconcile: ReconcileService,
    pub tasks_service: TasksService,
}
