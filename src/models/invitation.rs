// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Invitation model: a single-use, time-limited token permitting one
//! identity to join one team.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long an invitation stays redeemable after issuance.
pub const INVITATION_TTL_DAYS: i64 = 7;

/// Invitation record stored in Firestore.
///
/// `used` flips to `true` exactly once at redemption and is terminal.
/// Expired-but-unused invitations are left in place; redemption treats them
/// as invalid rather than deleting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    /// Invitation ID (also used as document ID)
    pub id: String,
    /// Team this invitation joins
    pub team_id: String,
    /// Snapshot of the team's join code at issuance time
    pub invitation_code: String,
    /// Coach who issued the invitation
    pub invited_by_coach_id: String,
    /// Issuer display name (shown in the invite preview)
    pub invited_by_name: String,
    /// Whether the invitation has been redeemed (terminal once true)
    pub used: bool,
    /// Coach who redeemed it
    pub used_by_coach_id: Option<String>,
    /// When it was redeemed
    pub used_at: Option<DateTime<Utc>>,
    /// When the invitation stops being redeemable
    pub expires_at: DateTime<Utc>,
    /// When the invitation was issued
    pub created_at: DateTime<Utc>,
}

/// Claim marker written by the first redemption attempt.
///
/// Stored under the invitation's ID, so the create-if-absent insert succeeds
/// at most once per invitation; that insert is what makes redemption
/// single-winner. A claim by the same coach is an idempotent retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationClaim {
    pub invitation_id: String,
    pub coach_id: String,
    pub claimed_at: DateTime<Utc>,
}

impl Invitation {
    /// Build a fresh invitation for a team, expiring in [`INVITATION_TTL_DAYS`].
    pub fn issue(
        id: String,
        team_id: &str,
        code: &str,
        invited_by_coach_id: &str,
        invited_by_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            team_id: team_id.to_string(),
            invitation_code: code.to_string(),
            invited_by_coach_id: invited_by_coach_id.to_string(),
            invited_by_name: invited_by_name.to_string(),
            used: false,
            used_by_coach_id: None,
            used_at: None,
            expires_at: now + Duration::days(INVITATION_TTL_DAYS),
            created_at: now,
        }
    }

    /// Whether the expiry deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Valid iff unused and not past expiry.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_invitation(now: DateTime<Utc>) -> Invitation {
        Invitation::issue(
            "inv-1".to_string(),
            "team-1",
            "abc123def456ghi789jkl0",
            "coach-1",
            "Pat Example",
            now,
        )
    }

    #[test]
    fn test_issue_sets_seven_day_expiry() {
        let now = Utc::now();
        let inv = test_invitation(now);

        assert_eq!(inv.expires_at, now + Duration::days(7));
        assert!(!inv.used);
        assert!(inv.used_by_coach_id.is_none());
        assert!(inv.used_at.is_none());
    }

    #[test]
    fn test_redeemable_until_expiry() {
        let now = Utc::now();
        let inv = test_invitation(now);

        assert!(inv.is_redeemable(now));
        assert!(inv.is_redeemable(now + Duration::days(7)), "boundary is inclusive");
        assert!(!inv.is_redeemable(now + Duration::days(7) + Duration::seconds(1)));
    }

    #[test]
    fn test_used_is_terminal() {
        let now = Utc::now();
        let mut inv = test_invitation(now);
        inv.used = true;
        inv.used_by_coach_id = Some("coach-2".to_string());
        inv.used_at = Some(now);

        assert!(!inv.is_redeemable(now), "used invitations are never redeemable");
        assert!(!inv.is_expired(now), "used is independent of expiry");
    }
}
