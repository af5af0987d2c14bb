// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod coach;
pub mod invitation;
pub mod team;

pub use coach::Coach;
pub use invitation::{Invitation, InvitationClaim};
pub use team::{Season, SeasonPeriod, Team};
