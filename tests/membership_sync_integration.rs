// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coach/team membership synchronization integration tests.
//!
//! These tests require the Firestore emulator to be running; they exercise
//! the paired roster/membership writes end to end and verify that the two
//! sides of the relationship never disagree after a successful operation.

use sideline::error::AppError;
use sideline::models::{Season, SeasonPeriod};
use sideline::services::registry::TeamAttrs;
use sideline::services::{CoachDirectory, TeamRegistry};

mod common;
use common::{test_claims, test_db};

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn fall_2026() -> TeamAttrs {
    TeamAttrs {
        name: "Eagles".to_string(),
        season: Season {
            year: 2026,
            period: SeasonPeriod::Fall,
        },
    }
}

/// Both sides of the membership relationship agree for (team, coach).
async fn assert_in_sync(
    registry: &TeamRegistry,
    directory: &CoachDirectory,
    team_id: &str,
    coach_id: &str,
    expected: bool,
) {
    let team = registry.get(team_id).await.unwrap();
    let coach = directory.get(coach_id).await.unwrap();
    assert_eq!(
        team.has_member(coach_id),
        expected,
        "roster side out of sync for {} / {}",
        team_id,
        coach_id
    );
    assert_eq!(
        coach.is_member_of(team_id),
        expected,
        "membership side out of sync for {} / {}",
        team_id,
        coach_id
    );
}

#[tokio::test]
async fn test_ensure_profile_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db);

    let coach_id = unique_id("coach");
    let claims = test_claims(&coach_id, "Pat Example", "pat@example.com");

    let first = directory.ensure_profile(&claims).await.unwrap();
    assert_eq!(first.id, coach_id);
    assert_eq!(first.display_name, "Pat Example");
    assert!(first.active);

    // A team join between the two ensures must survive the second one.
    let team = registry.create(&coach_id, fall_2026()).await.unwrap();

    let second = directory.ensure_profile(&claims).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.team_memberships, vec![team.id.clone()]);
}

#[tokio::test]
async fn test_ensure_profile_does_not_clobber_edits() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db);

    let coach_id = unique_id("coach");
    let claims = test_claims(&coach_id, "Provider Name", "old@example.com");
    directory.ensure_profile(&claims).await.unwrap();

    directory
        .update_profile(
            &coach_id,
            sideline::services::directory::ProfileUpdate {
                display_name: Some("Edited Name".to_string()),
                email: None,
                photo_url: None,
            },
        )
        .await
        .unwrap();

    // Later sign-ins return the record unchanged.
    let again = directory.ensure_profile(&claims).await.unwrap();
    assert_eq!(again.display_name, "Edited Name");
    assert_eq!(again.email, "old@example.com");
}

#[tokio::test]
async fn test_update_profile_missing_coach_is_not_found() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db);

    let err = directory
        .update_profile(
            &unique_id("ghost"),
            sideline::services::directory::ProfileUpdate::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_team_create_round_trip() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db);

    let owner_id = unique_id("owner");
    directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();

    let team = registry.create(&owner_id, fall_2026()).await.unwrap();

    let fetched = registry.get(&team.id).await.unwrap();
    assert_eq!(fetched.name, "Eagles");
    assert_eq!(fetched.season.year, 2026);
    assert_eq!(fetched.season.period, SeasonPeriod::Fall);
    assert_eq!(fetched.member_coach_ids, vec![owner_id.clone()]);
    assert_eq!(fetched.owner_coach_id, owner_id);
    assert!(fetched.active);
    assert!(
        fetched.invitation_code.is_some_and(|c| c.len() >= 20),
        "team should be created with an opaque join code"
    );

    // The owner's membership set was written in the same transaction.
    assert_in_sync(&registry, &directory, &team.id, &owner_id, true).await;
}

#[tokio::test]
async fn test_team_create_requires_owner_record() {
    require_emulator!();

    let db = test_db().await;
    let registry = TeamRegistry::new(db);

    let err = registry
        .create(&unique_id("ghost"), fall_2026())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_add_and_remove_coach_keep_both_sides_in_sync() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db);

    let owner_id = unique_id("owner");
    let coach_id = unique_id("coach");
    directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();
    directory
        .ensure_profile(&test_claims(&coach_id, "Assistant", "asst@example.com"))
        .await
        .unwrap();

    let team = registry.create(&owner_id, fall_2026()).await.unwrap();

    let after_add = registry.add_coach(&team.id, &coach_id).await.unwrap();
    assert_eq!(
        after_add.member_coach_ids,
        vec![owner_id.clone(), coach_id.clone()]
    );
    assert_in_sync(&registry, &directory, &team.id, &coach_id, true).await;

    // Adding an existing member is a no-op, not a duplicate.
    let re_add = registry.add_coach(&team.id, &coach_id).await.unwrap();
    assert_eq!(re_add.member_coach_ids.len(), 2);

    let after_remove = registry.remove_coach(&team.id, &coach_id).await.unwrap();
    assert_eq!(after_remove.member_coach_ids, vec![owner_id.clone()]);
    assert_in_sync(&registry, &directory, &team.id, &coach_id, false).await;
}

#[tokio::test]
async fn test_owner_cannot_be_removed() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db);

    let owner_id = unique_id("owner");
    directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();
    let team = registry.create(&owner_id, fall_2026()).await.unwrap();

    let err = registry.remove_coach(&team.id, &owner_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvariantViolation(_)));

    // The team is unchanged.
    let fetched = registry.get(&team.id).await.unwrap();
    assert_eq!(fetched.member_coach_ids, vec![owner_id.clone()]);
    assert_eq!(fetched.version, team.version);
    assert_in_sync(&registry, &directory, &team.id, &owner_id, true).await;
}

#[tokio::test]
async fn test_update_rejects_stale_version() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db);

    let owner_id = unique_id("owner");
    directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();
    let team = registry.create(&owner_id, fall_2026()).await.unwrap();

    let renamed = registry
        .update(
            &team.id,
            sideline::services::registry::TeamUpdate {
                name: Some("Falcons".to_string()),
                season: None,
                expected_version: Some(team.version),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Falcons");
    assert!(renamed.version > team.version);

    // The old version no longer matches.
    let err = registry
        .update(
            &team.id,
            sideline::services::registry::TeamUpdate {
                name: Some("Hawks".to_string()),
                season: None,
                expected_version: Some(team.version),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::VersionConflict { .. }));

    let fetched = registry.get(&team.id).await.unwrap();
    assert_eq!(fetched.name, "Falcons");
}

#[tokio::test]
async fn test_list_for_coach_skips_inactive_teams() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db);

    let owner_id = unique_id("owner");
    directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();

    let keep = registry.create(&owner_id, fall_2026()).await.unwrap();
    let fold = registry
        .create(
            &owner_id,
            TeamAttrs {
                name: "Folded".to_string(),
                season: Season {
                    year: 2026,
                    period: SeasonPeriod::Spring,
                },
            },
        )
        .await
        .unwrap();
    registry.deactivate(&fold.id).await.unwrap();

    let listing = registry.list_for_coach(&owner_id).await.unwrap();
    let ids: Vec<&str> = listing.teams.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![keep.id.as_str()]);
    assert!(!listing.degraded, "soft-deleted teams are skipped silently");
}

#[tokio::test]
async fn test_list_for_coach_full_scan_fallback() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db.clone());

    let owner_id = unique_id("owner");
    directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();
    let team = registry.create(&owner_id, fall_2026()).await.unwrap();

    // Simulate pre-migration data: the roster lists a coach who has no
    // directory record at all.
    let ghost_id = unique_id("ghost");
    let ghost_for_roster = ghost_id.clone();
    db.mutate_team_atomic(&team.id, move |t| {
        t.add_member(&ghost_for_roster);
        Ok(())
    })
    .await
    .unwrap();

    let listing = registry.list_for_coach(&ghost_id).await.unwrap();
    let ids: Vec<&str> = listing.teams.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![team.id.as_str()]);
    assert!(listing.degraded, "fallback listings are flagged for repair");
}

#[tokio::test]
async fn test_list_by_team_returns_all_member_coaches() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db);

    let owner_id = unique_id("owner");
    let coach_id = unique_id("coach");
    directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();
    directory
        .ensure_profile(&test_claims(&coach_id, "Assistant", "asst@example.com"))
        .await
        .unwrap();

    let team = registry.create(&owner_id, fall_2026()).await.unwrap();
    registry.add_coach(&team.id, &coach_id).await.unwrap();

    // Deactivated coaches still appear; no inactive filter is applied.
    directory.deactivate(&coach_id).await.unwrap();

    let mut listed: Vec<String> = directory
        .list_by_team(&team.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    listed.sort();

    let mut expected = vec![owner_id, coach_id];
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_deactivate_coach_keeps_memberships() {
    require_emulator!();

    let db = test_db().await;
    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db);

    let owner_id = unique_id("owner");
    directory
        .ensure_profile(&test_claims(&owner_id, "Owner", "owner@example.com"))
        .await
        .unwrap();
    let team = registry.create(&owner_id, fall_2026()).await.unwrap();

    let deactivated = directory.deactivate(&owner_id).await.unwrap();
    assert!(!deactivated.active);
    assert_eq!(deactivated.team_memberships, vec![team.id]);
}
