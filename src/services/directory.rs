// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coach directory: canonical coach identity records and the
//! membership-set half of the paired roster/membership writes.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::Coach;
use crate::services::identity::IdentityClaims;

/// Partial profile update; `None` fields are left unchanged.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Component owning coach identity + membership-set records.
#[derive(Clone)]
pub struct CoachDirectory {
    db: FirestoreDb,
}

impl CoachDirectory {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Fetch a coach, failing with `NotFound` if absent.
    pub async fn get(&self, coach_id: &str) -> Result<Coach> {
        self.db
            .get_coach(coach_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Coach {}", coach_id)))
    }

    /// Idempotent create-if-absent from verified identity claims.
    ///
    /// An existing record is returned unchanged: profile edits after first
    /// sign-in are never clobbered by later logins. Safe to call concurrently;
    /// the store's create-if-absent primitive resolves the race.
    pub async fn ensure_profile(&self, claims: &IdentityClaims) -> Result<Coach> {
        let seeded = Coach::from_claims(claims, chrono::Utc::now());
        self.db.create_coach_if_absent(&seeded).await
    }

    /// Merge profile fields, failing with `NotFound` if the coach is missing.
    ///
    /// Callers in flows where the identity may not exist yet must
    /// `ensure_profile` first.
    pub async fn update_profile(&self, coach_id: &str, update: ProfileUpdate) -> Result<Coach> {
        self.db
            .mutate_coach_atomic(coach_id, |coach| {
                if let Some(display_name) = update.display_name {
                    coach.display_name = display_name;
                }
                if let Some(email) = update.email {
                    coach.email = email;
                }
                if let Some(photo_url) = update.photo_url {
                    coach.photo_url = Some(photo_url);
                }
                Ok(())
            })
            .await
    }

    /// Add a team to the coach's membership set (set-union, no duplicates).
    ///
    /// This is the one-sided half of the dual write; normal join flows go
    /// through the paired transactional operations. Reconciliation uses this
    /// to repair a membership set that fell behind a team roster.
    pub async fn add_membership(&self, coach_id: &str, team_id: &str) -> Result<Coach> {
        let team_id = team_id.to_string();
        self.db
            .mutate_coach_atomic(coach_id, move |coach| {
                coach.add_membership(&team_id);
                Ok(())
            })
            .await
    }

    /// Remove a team from the coach's membership set; no-op if absent.
    pub async fn remove_membership(&self, coach_id: &str, team_id: &str) -> Result<Coach> {
        let team_id = team_id.to_string();
        self.db
            .mutate_coach_atomic(coach_id, move |coach| {
                coach.remove_membership(&team_id);
                Ok(())
            })
            .await
    }

    /// Soft-delete: mark inactive, keep memberships in place.
    pub async fn deactivate(&self, coach_id: &str) -> Result<Coach> {
        self.db
            .mutate_coach_atomic(coach_id, |coach| {
                coach.active = false;
                Ok(())
            })
            .await
    }

    /// All coaches whose membership set contains the team.
    ///
    /// Prefers the indexed query; falls back to a full scan-and-filter when
    /// the query is unavailable (correctness over efficiency). No activity
    /// filter is applied; callers decide whether inactive coaches matter.
    pub async fn list_by_team(&self, team_id: &str) -> Result<Vec<Coach>> {
        match self.db.query_coaches_by_membership(team_id).await {
            Ok(coaches) => Ok(coaches),
            Err(err) if err.is_retryable() => Err(err),
            Err(err) => {
                tracing::warn!(
                    team_id,
                    error = %err,
                    "Membership query unavailable, falling back to full scan"
                );
                let all = self.db.list_all_coaches().await?;
                Ok(all
                    .into_iter()
                    .filter(|c| c.is_member_of(team_id))
                    .collect())
            }
        }
    }
}
