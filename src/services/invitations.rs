// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Invitation workflow: issue and redeem single-use join tokens.
//!
//! The only multi-step, multi-aggregate protocol in the system. Redemption
//! claims the invitation (single-winner among racing redeemers), then joins
//! the team roster, updates the redeemer's membership set and consumes the
//! invitation in a single transaction, so a crash can never half-apply the
//! join.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{Invitation, Team};
use crate::services::directory::CoachDirectory;
use crate::services::identity::IdentityClaims;
use crate::services::registry::TeamRegistry;

/// Component issuing and redeeming invitations.
#[derive(Clone)]
pub struct InvitationService {
    db: FirestoreDb,
    directory: CoachDirectory,
    registry: TeamRegistry,
}

impl InvitationService {
    pub fn new(db: FirestoreDb, directory: CoachDirectory, registry: TeamRegistry) -> Self {
        Self {
            db,
            directory,
            registry,
        }
    }

    /// Issue an invitation for a team, expiring in seven days.
    ///
    /// Snapshots the team's current join code; does not mutate the team,
    /// except to mint a code for teams that have none yet.
    pub async fn issue(
        &self,
        team_id: &str,
        invited_by_coach_id: &str,
        invited_by_name: &str,
    ) -> Result<Invitation> {
        let team = self.registry.get(team_id).await?;
        if !team.active {
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        }

        let code = match team.invitation_code {
            Some(code) => code,
            None => self.registry.regenerate_invitation_code(team_id).await?,
        };

        let invitation = Invitation::issue(
            uuid::Uuid::new_v4().to_string(),
            team_id,
            &code,
            invited_by_coach_id,
            invited_by_name,
            chrono::Utc::now(),
        );

        self.db.insert_invitation(&invitation).await?;

        tracing::info!(
            invitation_id = %invitation.id,
            team_id,
            invited_by_coach_id,
            "Invitation issued"
        );

        Ok(invitation)
    }

    /// Find the unused invitation matching a join code.
    ///
    /// Codes are random enough that more than one match means a team's code
    /// was re-issued across regenerations; the newest invitation wins.
    pub async fn lookup(&self, code: &str) -> Result<Option<Invitation>> {
        let matches = self.db.find_unused_invitations_by_code(code).await?;

        if matches.len() > 1 {
            tracing::warn!(
                count = matches.len(),
                "Multiple unused invitations share a code, taking newest"
            );
        }

        Ok(matches.into_iter().next())
    }

    /// Redeem an invitation as the calling identity and return the joined team.
    ///
    /// Ensures a coach record exists before membership is attached, then
    /// performs the join and the `used` transition atomically. Of two racing
    /// redemptions exactly one succeeds; the other gets `AlreadyRedeemed`.
    pub async fn redeem(&self, code: &str, claims: &IdentityClaims) -> Result<Team> {
        let invitation = self
            .lookup(code)
            .await?
            .ok_or(AppError::InvitationNotFound)?;

        if invitation.is_expired(chrono::Utc::now()) {
            return Err(AppError::InvitationExpired);
        }

        let redeemer = self.directory.ensure_profile(claims).await?;

        let (team, _invitation) = self
            .db
            .redeem_invitation_atomic(&invitation.id, &redeemer.id)
            .await?;

        Ok(team)
    }
}
