// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Invitation workflow integration tests.
//!
//! These tests require the Firestore emulator to be running; they exercise
//! issuance, lookup, redemption, expiry and the single-winner guarantee for
//! racing redemptions.

use chrono::{Duration, Utc};
use sideline::db::FirestoreDb;
use sideline::error::AppError;
use sideline::models::{Invitation, Season, SeasonPeriod, Team};
use sideline::services::registry::TeamAttrs;
use sideline::services::{CoachDirectory, InvitationService, TeamRegistry};

mod common;
use common::{test_claims, test_db};

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

struct Fixture {
    db: FirestoreDb,
    directory: CoachDirectory,
    registry: TeamRegistry,
    invitations: InvitationService,
}

async fn fixture() -> Fixture {
    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db.clone());
    let invitations = InvitationService::new(db.clone(), directory.clone(), registry.clone());
    Fixture {
        db,
        directory,
        registry,
        invitations,
    }
}

/// Create an owner coach plus a team and return (owner_id, team).
async fn owner_with_team(fx: &Fixture) -> (String, Team) {
    let owner_id = unique_id("owner");
    fx.directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();
    let team = fx
        .registry
        .create(
            &owner_id,
            TeamAttrs {
                name: "Eagles".to_string(),
                season: Season {
                    year: 2026,
                    period: SeasonPeriod::Fall,
                },
            },
        )
        .await
        .unwrap();
    (owner_id, team)
}

#[tokio::test]
async fn test_issue_snapshots_team_code() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;

    let invitation = fx
        .invitations
        .issue(&team.id, &owner_id, "Owner")
        .await
        .unwrap();

    assert_eq!(invitation.team_id, team.id);
    assert_eq!(Some(invitation.invitation_code.clone()), team.invitation_code);
    assert_eq!(invitation.invited_by_coach_id, owner_id);
    assert!(!invitation.used);

    // Seven-day expiry, stamped at issuance.
    let ttl = invitation.expires_at - invitation.created_at;
    assert_eq!(ttl, Duration::days(7));

    // The team itself is untouched by issuance.
    let fetched = fx.registry.get(&team.id).await.unwrap();
    assert_eq!(fetched.version, team.version);
}

#[tokio::test]
async fn test_redeem_joins_team_and_consumes_invitation() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;

    let invitation = fx
        .invitations
        .issue(&team.id, &owner_id, "Owner")
        .await
        .unwrap();

    // The redeemer has never signed in before; redemption creates the record.
    let new_coach_id = unique_id("new-coach");
    let claims = test_claims(&new_coach_id, "New Coach", "new@example.com");

    let joined = fx
        .invitations
        .redeem(&invitation.invitation_code, &claims)
        .await
        .unwrap();

    assert_eq!(joined.id, team.id);
    assert!(joined.has_member(&new_coach_id));

    // Both sides of the dual write agree.
    let coach = fx.directory.get(&new_coach_id).await.unwrap();
    assert!(coach.is_member_of(&team.id));

    // The invitation is consumed, terminally.
    let consumed = fx.db.get_invitation(&invitation.id).await.unwrap().unwrap();
    assert!(consumed.used);
    assert_eq!(consumed.used_by_coach_id, Some(new_coach_id));
    assert!(consumed.used_at.is_some());

    // And no longer matches lookups.
    let found = fx
        .invitations
        .lookup(&invitation.invitation_code)
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_redeem_unknown_code() {
    require_emulator!();

    let fx = fixture().await;
    let claims = test_claims(&unique_id("coach"), "Coach", "c@example.com");

    let err = fx
        .invitations
        .redeem("nosuchcode000000000000000", &claims)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvitationNotFound));
}

#[tokio::test]
async fn test_redeem_expired_invitation() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;
    let code = team.invitation_code.clone().unwrap();

    // Issue in the past so the invitation is already expired but unused.
    let stale = Invitation::issue(
        unique_id("inv"),
        &team.id,
        &code,
        &owner_id,
        "Owner",
        Utc::now() - Duration::days(8),
    );
    fx.db.insert_invitation(&stale).await.unwrap();

    let outsider_id = unique_id("outsider");
    let err = fx
        .invitations
        .redeem(&code, &test_claims(&outsider_id, "Late", "late@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvitationExpired));

    // The roster is unchanged; expired invitations are left in place.
    let fetched = fx.registry.get(&team.id).await.unwrap();
    assert_eq!(fetched.member_coach_ids, vec![owner_id]);
    let still_there = fx.db.get_invitation(&stale.id).await.unwrap().unwrap();
    assert!(!still_there.used);
}

#[tokio::test]
async fn test_concurrent_redemption_single_winner() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;

    let invitation = fx
        .invitations
        .issue(&team.id, &owner_id, "Owner")
        .await
        .unwrap();

    let claims_a = test_claims(&unique_id("racer-a"), "Racer A", "a@example.com");
    let claims_b = test_claims(&unique_id("racer-b"), "Racer B", "b@example.com");

    let (result_a, result_b) = tokio::join!(
        fx.invitations.redeem(&invitation.invitation_code, &claims_a),
        fx.invitations.redeem(&invitation.invitation_code, &claims_b),
    );

    let winners = [&result_a, &result_b]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(winners, 1, "exactly one racing redemption may succeed");

    let loser = if result_a.is_ok() { result_b } else { result_a };
    assert!(matches!(loser.unwrap_err(), AppError::AlreadyRedeemed));

    // Exactly one used=true transition, attributed to the winner.
    let consumed = fx.db.get_invitation(&invitation.id).await.unwrap().unwrap();
    assert!(consumed.used);
    let winner_id = consumed.used_by_coach_id.clone().unwrap();
    assert!(winner_id == claims_a.sub || winner_id == claims_b.sub);

    // The loser holds no membership.
    let fetched = fx.registry.get(&team.id).await.unwrap();
    assert_eq!(fetched.member_coach_ids.len(), 2);
    assert!(fetched.has_member(&winner_id));
}

#[tokio::test]
async fn test_redeem_already_used_invitation() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;

    let invitation = fx
        .invitations
        .issue(&team.id, &owner_id, "Owner")
        .await
        .unwrap();

    let first_id = unique_id("first");
    fx.invitations
        .redeem(
            &invitation.invitation_code,
            &test_claims(&first_id, "First", "first@example.com"),
        )
        .await
        .unwrap();

    // A direct redemption attempt against the consumed record is refused.
    let second_id = unique_id("second");
    fx.directory
        .ensure_profile(&test_claims(&second_id, "Second", "second@example.com"))
        .await
        .unwrap();
    let err = fx
        .db
        .redeem_invitation_atomic(&invitation.id, &second_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyRedeemed));
}

#[tokio::test]
async fn test_regenerated_code_leaves_old_invitations_redeemable() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;

    let old_invitation = fx
        .invitations
        .issue(&team.id, &owner_id, "Owner")
        .await
        .unwrap();

    let new_code = fx
        .registry
        .regenerate_invitation_code(&team.id)
        .await
        .unwrap();
    assert_ne!(new_code, old_invitation.invitation_code);

    let fetched = fx.registry.get(&team.id).await.unwrap();
    assert_eq!(fetched.invitation_code, Some(new_code));

    // The old invitation carries its own code snapshot and still works.
    let joiner_id = unique_id("joiner");
    let joined = fx
        .invitations
        .redeem(
            &old_invitation.invitation_code,
            &test_claims(&joiner_id, "Joiner", "joiner@example.com"),
        )
        .await
        .unwrap();
    assert!(joined.has_member(&joiner_id));
}

#[tokio::test]
async fn test_lookup_prefers_newest_invitation() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;
    let code = team.invitation_code.clone().unwrap();

    // Two unused invitations under the same code, a day apart.
    let older = Invitation::issue(
        unique_id("inv"),
        &team.id,
        &code,
        &owner_id,
        "Owner",
        Utc::now() - Duration::days(1),
    );
    let newer = Invitation::issue(
        unique_id("inv"),
        &team.id,
        &code,
        &owner_id,
        "Owner",
        Utc::now(),
    );
    fx.db.insert_invitation(&older).await.unwrap();
    fx.db.insert_invitation(&newer).await.unwrap();

    let found = fx.invitations.lookup(&code).await.unwrap().unwrap();
    assert_eq!(found.id, newer.id);
}

#[tokio::test]
async fn test_redeem_is_idempotent_for_existing_member() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;

    // Two invitations; the same coach redeems both.
    let first = fx
        .invitations
        .issue(&team.id, &owner_id, "Owner")
        .await
        .unwrap();
    let joiner_id = unique_id("joiner");
    let claims = test_claims(&joiner_id, "Joiner", "joiner@example.com");
    fx.invitations
        .redeem(&first.invitation_code, &claims)
        .await
        .unwrap();

    let second = fx
        .invitations
        .issue(&team.id, &owner_id, "Owner")
        .await
        .unwrap();
    let joined = fx
        .invitations
        .redeem(&second.invitation_code, &claims)
        .await
        .unwrap();

    // Still exactly one roster entry for the joiner.
    let count = joined
        .member_coach_ids
        .iter()
        .filter(|id| *id == &joiner_id)
        .count();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_issue_for_inactive_team_fails() {
    require_emulator!();

    let fx = fixture().await;
    let (owner_id, team) = owner_with_team(&fx).await;
    fx.registry.deactivate(&team.id).await.unwrap();

    let err = fx
        .invitations
        .issue(&team.id, &owner_id, "Owner")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
