// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Team model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Part of the year a season runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SeasonPeriod {
    Spring,
    Summer,
    Fall,
    Winter,
}

/// Season a team plays in (e.g. fall 2026).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Season {
    pub year: i32,
    pub period: SeasonPeriod,
}

/// Team record stored in Firestore.
///
/// `member_coach_ids` mirrors the membership sets on the coach documents;
/// roster mutations go through the transactional ops in `db::firestore`,
/// never through plain document updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Team ID (also used as document ID)
    pub id: String,
    /// Team name
    pub name: String,
    /// Season the team plays in
    pub season: Season,
    /// Member coach IDs in join order (head coach conventionally first)
    #[serde(default)]
    pub member_coach_ids: Vec<String>,
    /// Coach who created the team; always present in `member_coach_ids`
    pub owner_coach_id: String,
    /// Current join code; regenerable, snapshotted onto invitations at issue time
    pub invitation_code: Option<String>,
    /// Soft-delete flag
    pub active: bool,
    /// Optimistic-concurrency counter, bumped by every roster mutation
    #[serde(default)]
    pub version: u64,
    /// When the team was created
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// Whether the roster contains the given coach.
    pub fn has_member(&self, coach_id: &str) -> bool {
        self.member_coach_ids.iter().any(|c| c == coach_id)
    }

    /// Append a coach to the roster. Returns `true` if newly added.
    pub fn add_member(&mut self, coach_id: &str) -> bool {
        if self.has_member(coach_id) {
            return false;
        }
        self.member_coach_ids.push(coach_id.to_string());
        true
    }

    /// Remove a coach from the roster. Returns `true` if they were present.
    ///
    /// The owner cannot be removed; callers must check `owner_coach_id`
    /// before calling (the transactional ops do).
    pub fn remove_member(&mut self, coach_id: &str) -> bool {
        let before = self.member_coach_ids.len();
        self.member_coach_ids.retain(|c| c != coach_id);
        self.member_coach_ids.len() != before
    }
}
