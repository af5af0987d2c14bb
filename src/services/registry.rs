// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team registry: canonical team records and the roster half of the
//! paired roster/membership writes.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::invite_code;
use crate::models::{Season, Team};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 16;

/// Attributes for creating a team.
#[derive(Debug, Clone)]
pub struct TeamAttrs {
    pub name: String,
    pub season: Season,
}

/// Partial team update; roster and owner are not reachable through this
/// path, only the dedicated membership operations mutate them.
#[derive(Debug, Default, Clone)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub season: Option<Season>,
    /// Optimistic-concurrency check: fail with `VersionConflict` unless the
    /// stored version still matches.
    pub expected_version: Option<u64>,
}

/// Result of listing teams for a coach.
pub struct TeamListing {
    pub teams: Vec<Team>,
    /// True when the listing had to skip dangling references or fall back to
    /// a full scan; a reconciliation sweep is warranted.
    pub degraded: bool,
}

/// Component owning team records + rosters.
#[derive(Clone)]
pub struct TeamRegistry {
    db: FirestoreDb,
}

impl TeamRegistry {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Create a team owned (and initially solely rostered) by the given coach.
    ///
    /// The team document and the owner's membership-set update commit in one
    /// transaction. Fails with `NotFound` if the owner has no coach record.
    pub async fn create(&self, owner_coach_id: &str, attrs: TeamAttrs) -> Result<Team> {
        let now = chrono::Utc::now();
        let team = Team {
            id: uuid::Uuid::new_v4().to_string(),
            name: attrs.name,
            season: attrs.season,
            member_coach_ids: vec![owner_coach_id.to_string()],
            owner_coach_id: owner_coach_id.to_string(),
            invitation_code: Some(invite_code::generate()?),
            active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.db.create_team_atomic(&team).await
    }

    /// Fetch a team, failing with `NotFound` if absent.
    pub async fn get(&self, team_id: &str) -> Result<Team> {
        self.db
            .get_team(team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Team {}", team_id)))
    }

    /// Shallow-merge team attributes (name, season).
    pub async fn update(&self, team_id: &str, update: TeamUpdate) -> Result<Team> {
        self.db
            .mutate_team_atomic(team_id, |team| {
                if let Some(expected) = update.expected_version {
                    if team.version != expected {
                        return Err(AppError::VersionConflict {
                            expected,
                            found: team.version,
                        });
                    }
                }
                if let Some(name) = update.name {
                    team.name = name;
                }
                if let Some(season) = update.season {
                    team.season = season;
                }
                Ok(())
            })
            .await
    }

    /// Add a coach to the roster (paired write with the coach's membership
    /// set). Idempotent for existing members.
    pub async fn add_coach(&self, team_id: &str, coach_id: &str) -> Result<Team> {
        self.db.add_member_atomic(team_id, coach_id).await
    }

    /// Remove a coach from the roster (paired write). Fails with
    /// `InvariantViolation` for the owner; no-op for non-members.
    pub async fn remove_coach(&self, team_id: &str, coach_id: &str) -> Result<Team> {
        self.db.remove_member_atomic(team_id, coach_id).await
    }

    /// Replace the team's join code.
    ///
    /// Already-issued invitations carry their own snapshot of the code and
    /// stay independently redeemable until their own expiry.
    pub async fn regenerate_invitation_code(&self, team_id: &str) -> Result<String> {
        let code = invite_code::generate()?;
        let stored = code.clone();
        self.db
            .mutate_team_atomic(team_id, move |team| {
                team.invitation_code = Some(stored);
                Ok(())
            })
            .await?;

        tracing::info!(team_id, "Invitation code regenerated");
        Ok(code)
    }

    /// Soft-delete: mark inactive, keep the roster in place.
    pub async fn deactivate(&self, team_id: &str) -> Result<Team> {
        self.db
            .mutate_team_atomic(team_id, |team| {
                team.active = false;
                Ok(())
            })
            .await
    }

    /// All active teams the coach belongs to.
    ///
    /// Primary path resolves the coach's membership set and fetches each team
    /// by ID, skipping (not failing on) dangling references and inactive
    /// teams. When the coach record itself is missing (pre-migration data),
    /// falls back to a full scan filtered by roster — resilience only, not
    /// the normal path.
    pub async fn list_for_coach(&self, coach_id: &str) -> Result<TeamListing> {
        let Some(coach) = self.db.get_coach(coach_id).await? else {
            tracing::warn!(coach_id, "Coach record missing, listing teams via full scan");
            let teams: Vec<Team> = self
                .db
                .list_all_teams()
                .await?
                .into_iter()
                .filter(|t| t.active && (t.has_member(coach_id) || t.owner_coach_id == coach_id))
                .collect();
            return Ok(TeamListing {
                teams,
                degraded: true,
            });
        };

        let db = self.db.clone();
        let results: Vec<(String, Result<Option<Team>>)> =
            stream::iter(coach.team_memberships.clone())
                .map(|team_id| {
                    let db = db.clone();
                    async move {
                        let team = db.get_team(&team_id).await;
                        (team_id, team)
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_DB_OPS)
                .collect()
                .await;

        let mut teams = Vec::with_capacity(results.len());
        let mut degraded = false;
        for (team_id, result) in results {
            match result? {
                Some(team) if team.active => teams.push(team),
                Some(_) => {} // soft-deleted, skip silently
                None => {
                    tracing::warn!(
                        coach_id,
                        team_id = %team_id,
                        "Membership references a missing team, skipping"
                    );
                    degraded = true;
                }
            }
        }

        // buffer_unordered scrambles completion order; restore join order.
        teams.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(TeamListing { teams, degraded })
    }
}
