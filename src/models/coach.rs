// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Coach identity model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::identity::IdentityClaims;

/// Coach profile stored in Firestore.
///
/// `team_memberships` mirrors the rosters in the `teams` collection; the two
/// sides are written together in one transaction so they stay in lockstep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coach {
    /// Identity-provider subject (also used as document ID)
    pub id: String,
    /// Display name shown on rosters
    pub display_name: String,
    /// Email address
    pub email: String,
    /// Profile photo URL or blob key
    pub photo_url: Option<String>,
    /// Team IDs this coach belongs to (set semantics, no duplicates)
    #[serde(default)]
    pub team_memberships: Vec<String>,
    /// Opaque UI preferences (theme, notification flags)
    #[serde(default)]
    pub preferences: serde_json::Map<String, serde_json::Value>,
    /// Soft-delete flag
    pub active: bool,
    /// When the coach record was created
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Coach {
    /// Seed a fresh coach record from verified identity claims.
    pub fn from_claims(claims: &IdentityClaims, now: DateTime<Utc>) -> Self {
        Self {
            id: claims.sub.clone(),
            display_name: claims.name.clone().unwrap_or_else(|| "Coach".to_string()),
            email: claims.email.clone().unwrap_or_default(),
            photo_url: claims.picture.clone(),
            team_memberships: Vec::new(),
            preferences: serde_json::Map::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this coach lists the given team in their membership set.
    pub fn is_member_of(&self, team_id: &str) -> bool {
        self.team_memberships.iter().any(|t| t == team_id)
    }

    /// Add a team to the membership set. Returns `true` if newly added.
    pub fn add_membership(&mut self, team_id: &str) -> bool {
        if self.is_member_of(team_id) {
            return false;
        }
        self.team_memberships.push(team_id.to_string());
        true
    }

    /// Remove a team from the membership set. Returns `true` if it was present.
    pub fn remove_membership(&mut self, team_id: &str) -> bool {
        let before = self.team_memberships.len();
        self.team_memberships.retain(|t| t != team_id);
        self.team_memberships.len() != before
    }
}
