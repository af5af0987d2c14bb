// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod directory;
pub mod identity;
pub mod invitations;
pub mod reconcile;
pub mod registry;
pub mod tasks;

pub use directory::{CoachDirectory, ProfileUpdate};
pub use identity::{IdentityClaims, IdentityError, IdentityVerifier};
pub use invitations::InvitationService;
pub use reconcile::{ReconcileReport, ReconcileService};
pub use registry::{TeamAttrs, TeamListing, TeamRegistry, TeamUpdate};
pub use tasks::TasksService;
