// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Coaches (identity + membership-set records)
//! - Teams (roster + join code)
//! - Invitations (single-use join tokens)
//!
//! Every operation that touches both sides of the coach/team membership
//! relationship runs inside one Firestore transaction, so the roster and the
//! membership set commit together or not at all.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Coach, Invitation, InvitationClaim, Team};
use chrono::Utc;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Map a Firestore error into the app taxonomy, tagged with the operation.
fn store_error(op: &str, err: firestore::errors::FirestoreError) -> AppError {
    match &err {
        firestore::errors::FirestoreError::DatabaseError(db) if db.retry_possible => {
            AppError::Unavailable(format!("{}: {}", op, err))
        }
        firestore::errors::FirestoreError::NetworkError(_) => {
            AppError::Unavailable(format!("{}: {}", op, err))
        }
        _ => AppError::Database(format!("{}: {}", op, err)),
    }
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Coach Operations ────────────────────────────────────────

    /// Get a coach by identity-provider subject.
    pub async fn get_coach(&self, coach_id: &str) -> Result<Option<Coach>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COACHES)
            .obj()
            .one(coach_id)
            .await
            .map_err(|e| store_error("get_coach", e))
    }

    /// Create or replace a coach document.
    pub async fn upsert_coach(&self, coach: &Coach) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COACHES)
            .document_id(&coach.id)
            .object(coach)
            .execute()
            .await
            .map_err(|e| store_error("upsert_coach", e))?;
        Ok(())
    }

    /// Create a coach document only if none exists yet.
    ///
    /// Uses the store's create-if-absent primitive rather than read-then-write,
    /// so two concurrent first-logins cannot produce divergent records: the
    /// loser of the race re-reads and returns the winner's document.
    pub async fn create_coach_if_absent(&self, coach: &Coach) -> Result<Coach, AppError> {
        if let Some(existing) = self.get_coach(&coach.id).await? {
            return Ok(existing);
        }

        let insert = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::COACHES)
            .document_id(&coach.id)
            .object(coach)
            .execute::<()>()
            .await;

        match insert {
            Ok(()) => Ok(coach.clone()),
            Err(err) => {
                // Lost the creation race: another session inserted first.
                if let Some(existing) = self.get_coach(&coach.id).await? {
                    tracing::debug!(coach_id = %coach.id, "Concurrent profile creation, reusing existing record");
                    return Ok(existing);
                }
                Err(store_error("create_coach_if_absent", err))
            }
        }
    }

    /// Read-modify-write a coach document inside a transaction.
    ///
    /// For profile-level mutations only; membership-set changes go through
    /// the paired roster operations below.
    pub async fn mutate_coach_atomic<F>(&self, coach_id: &str, mutate: F) -> Result<Coach, AppError>
    where
        F: FnOnce(&mut Coach) -> Result<(), AppError>,
    {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| store_error("mutate_coach_atomic/begin", e))?;

        let coach: Option<Coach> = client
            .fluent()
            .select()
            .by_id_in(collections::COACHES)
            .obj()
            .one(coach_id)
            .await
            .map_err(|e| store_error("mutate_coach_atomic/read", e))?;

        let Some(mut coach) = coach else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Coach {}", coach_id)));
        };

        if let Err(e) = mutate(&mut coach) {
            let _ = transaction.rollback().await;
            return Err(e);
        }
        coach.updated_at = Utc::now();

        client
            .fluent()
            .update()
            .in_col(collections::COACHES)
            .document_id(&coach.id)
            .object(&coach)
            .add_to_transaction(&mut transaction)
            .map_err(|e| store_error("mutate_coach_atomic/write", e))?;

        transaction
            .commit()
            .await
            .map_err(|e| store_error("mutate_coach_atomic/commit", e))?;

        Ok(coach)
    }

    /// Coaches whose membership set contains the given team (indexed query).
    pub async fn query_coaches_by_membership(
        &self,
        team_id: &str,
    ) -> Result<Vec<Coach>, AppError> {
        let team_id = team_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COACHES)
            .filter(move |q| {
                q.for_all([q.field("team_memberships").array_contains(team_id.clone())])
            })
            .obj()
            .query()
            .await
            .map_err(|e| store_error("query_coaches_by_membership", e))
    }

    /// Full scan of the coaches collection (reconciliation + query fallback).
    pub async fn list_all_coaches(&self) -> Result<Vec<Coach>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COACHES)
            .obj()
            .query()
            .await
            .map_err(|e| store_error("list_all_coaches", e))
    }

    // ─── Team Operations ─────────────────────────────────────────

    /// Get a team by ID.
    pub async fn get_team(&self, team_id: &str) -> Result<Option<Team>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TEAMS)
            .obj()
            .one(team_id)
            .await
            .map_err(|e| store_error("get_team", e))
    }

    /// Full scan of the teams collection (reconciliation + listing fallback).
    pub async fn list_all_teams(&self) -> Result<Vec<Team>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TEAMS)
            .obj()
            .query()
            .await
            .map_err(|e| store_error("list_all_teams", e))
    }

    /// Read-modify-write a team document inside a transaction.
    ///
    /// For attribute-level mutations (name, season, join code, soft delete).
    /// Roster membership never changes through this path; the version counter
    /// is bumped so concurrent editors are detected rather than overwritten.
    pub async fn mutate_team_atomic<F>(&self, team_id: &str, mutate: F) -> Result<Team, AppError>
    where
        F: FnOnce(&mut Team) -> Result<(), AppError>,
    {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| store_error("mutate_team_atomic/begin", e))?;

        let team: Option<Team> = client
            .fluent()
            .select()
            .by_id_in(collections::TEAMS)
            .obj()
            .one(team_id)
            .await
            .map_err(|e| store_error("mutate_team_atomic/read", e))?;

        let Some(mut team) = team else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        };

        if let Err(e) = mutate(&mut team) {
            let _ = transaction.rollback().await;
            return Err(e);
        }
        team.version += 1;
        team.updated_at = Utc::now();

        client
            .fluent()
            .update()
            .in_col(collections::TEAMS)
            .document_id(&team.id)
            .object(&team)
            .add_to_transaction(&mut transaction)
            .map_err(|e| store_error("mutate_team_atomic/write", e))?;

        transaction
            .commit()
            .await
            .map_err(|e| store_error("mutate_team_atomic/commit", e))?;

        Ok(team)
    }

    // ─── Paired Roster/Membership Operations ─────────────────────

    /// Create a team and enroll the owner, atomically.
    ///
    /// Writes the new team document and the owner's updated membership set in
    /// one transaction; fails with `NotFound` if the owner has no coach record
    /// (callers ensure the profile first).
    pub async fn create_team_atomic(&self, team: &Team) -> Result<Team, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| store_error("create_team_atomic/begin", e))?;

        let owner: Option<Coach> = client
            .fluent()
            .select()
            .by_id_in(collections::COACHES)
            .obj()
            .one(&team.owner_coach_id)
            .await
            .map_err(|e| store_error("create_team_atomic/read", e))?;

        let Some(mut owner) = owner else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Coach {}", team.owner_coach_id)));
        };

        let now = Utc::now();
        owner.add_membership(&team.id);
        owner.updated_at = now;

        client
            .fluent()
            .update()
            .in_col(collections::TEAMS)
            .document_id(&team.id)
            .object(team)
            .add_to_transaction(&mut transaction)
            .map_err(|e| store_error("create_team_atomic/write_team", e))?;

        client
            .fluent()
            .update()
            .in_col(collections::COACHES)
            .document_id(&owner.id)
            .object(&owner)
            .add_to_transaction(&mut transaction)
            .map_err(|e| store_error("create_team_atomic/write_coach", e))?;

        transaction
            .commit()
            .await
            .map_err(|e| store_error("create_team_atomic/commit", e))?;

        tracing::info!(
            team_id = %team.id,
            owner_coach_id = %team.owner_coach_id,
            "Team created"
        );

        Ok(team.clone())
    }

    /// Add a coach to a team roster and the team to the coach's membership
    /// set, atomically. Idempotent: re-adding an existing member is a no-op.
    pub async fn add_member_atomic(&self, team_id: &str, coach_id: &str) -> Result<Team, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| store_error("add_member_atomic/begin", e))?;

        let (team, coach) = self.read_pair(team_id, coach_id).await?;
        let Some(mut team) = team else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        };
        let Some(mut coach) = coach else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Coach {}", coach_id)));
        };

        let roster_changed = team.add_member(coach_id);
        let membership_changed = coach.add_membership(team_id);

        if !roster_changed && !membership_changed {
            let _ = transaction.rollback().await;
            return Ok(team);
        }

        let now = Utc::now();
        team.version += 1;
        team.updated_at = now;
        coach.updated_at = now;

        self.write_pair_in_transaction(&team, &coach, &mut transaction)?;

        transaction
            .commit()
            .await
            .map_err(|e| store_error("add_member_atomic/commit", e))?;

        tracing::info!(team_id, coach_id, "Coach added to team");

        Ok(team)
    }

    /// Remove a coach from a team roster and the team from the coach's
    /// membership set, atomically.
    ///
    /// The owner can never be removed through this path.
    pub async fn remove_member_atomic(
        &self,
        team_id: &str,
        coach_id: &str,
    ) -> Result<Team, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| store_error("remove_member_atomic/begin", e))?;

        let (team, coach) = self.read_pair(team_id, coach_id).await?;
        let Some(mut team) = team else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        };
        let Some(mut coach) = coach else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Coach {}", coach_id)));
        };

        if coach_id == team.owner_coach_id {
            let _ = transaction.rollback().await;
            return Err(AppError::InvariantViolation(format!(
                "owner {} cannot be removed from team {}",
                coach_id, team_id
            )));
        }

        let roster_changed = team.remove_member(coach_id);
        let membership_changed = coach.remove_membership(team_id);

        if !roster_changed && !membership_changed {
            let _ = transaction.rollback().await;
            return Ok(team);
        }

        let now = Utc::now();
        team.version += 1;
        team.updated_at = now;
        coach.updated_at = now;

        self.write_pair_in_transaction(&team, &coach, &mut transaction)?;

        transaction
            .commit()
            .await
            .map_err(|e| store_error("remove_member_atomic/commit", e))?;

        tracing::info!(team_id, coach_id, "Coach removed from team");

        Ok(team)
    }

    /// Read a team/coach pair for a paired mutation.
    ///
    /// Reads run under the open transaction and register the documents for
    /// conflict detection; missing-document handling stays with the caller,
    /// which owns the rollback.
    async fn read_pair(
        &self,
        team_id: &str,
        coach_id: &str,
    ) -> Result<(Option<Team>, Option<Coach>), AppError> {
        let client = self.get_client()?;

        let team: Option<Team> = client
            .fluent()
            .select()
            .by_id_in(collections::TEAMS)
            .obj()
            .one(team_id)
            .await
            .map_err(|e| store_error("read_pair/team", e))?;

        let coach: Option<Coach> = client
            .fluent()
            .select()
            .by_id_in(collections::COACHES)
            .obj()
            .one(coach_id)
            .await
            .map_err(|e| store_error("read_pair/coach", e))?;

        Ok((team, coach))
    }

    fn write_pair_in_transaction(
        &self,
        team: &Team,
        coach: &Coach,
        transaction: &mut firestore::FirestoreTransaction<'_>,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        client
            .fluent()
            .update()
            .in_col(collections::TEAMS)
            .document_id(&team.id)
            .object(team)
            .add_to_transaction(transaction)
            .map_err(|e| store_error("write_pair/team", e))?;

        client
            .fluent()
            .update()
            .in_col(collections::COACHES)
            .document_id(&coach.id)
            .object(coach)
            .add_to_transaction(transaction)
            .map_err(|e| store_error("write_pair/coach", e))?;

        Ok(())
    }

    // ─── Invitation Operations ───────────────────────────────────

    /// Get an invitation by ID.
    pub async fn get_invitation(&self, invitation_id: &str) -> Result<Option<Invitation>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::INVITATIONS)
            .obj()
            .one(invitation_id)
            .await
            .map_err(|e| store_error("get_invitation", e))
    }

    /// Persist a new invitation record.
    pub async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::INVITATIONS)
            .document_id(&invitation.id)
            .object(invitation)
            .execute()
            .await
            .map_err(|e| store_error("insert_invitation", e))?;
        Ok(())
    }

    /// Unused invitations matching a join code.
    ///
    /// Can return more than one row when a team's code was regenerated and
    /// re-issued; callers apply the newest-wins tie-break. Sorted client-side
    /// so the query needs no composite index.
    pub async fn find_unused_invitations_by_code(
        &self,
        code: &str,
    ) -> Result<Vec<Invitation>, AppError> {
        let code = code.to_string();
        let mut invitations: Vec<Invitation> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::INVITATIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("invitation_code").eq(code.clone()),
                    q.field("used").eq(false),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| store_error("find_unused_invitations_by_code", e))?;

        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    // ─── Atomic Redemption ───────────────────────────────────────

    /// Claim an invitation for a redeeming coach.
    ///
    /// The claim document's ID is the invitation ID, so the create-if-absent
    /// insert succeeds for exactly one redemption; a racing redemption finds
    /// the claim taken and fails with `AlreadyRedeemed`. Re-claiming by the
    /// same coach is a no-op so an interrupted redemption can be retried.
    async fn claim_invitation(&self, invitation_id: &str, coach_id: &str) -> Result<(), AppError> {
        let claim = InvitationClaim {
            invitation_id: invitation_id.to_string(),
            coach_id: coach_id.to_string(),
            claimed_at: Utc::now(),
        };

        let insert = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::INVITATION_CLAIMS)
            .document_id(invitation_id)
            .object(&claim)
            .execute::<()>()
            .await;

        match insert {
            Ok(()) => Ok(()),
            Err(err) => {
                // Insert fails when a claim already exists; find out whose.
                let existing: Option<InvitationClaim> = self
                    .get_client()?
                    .fluent()
                    .select()
                    .by_id_in(collections::INVITATION_CLAIMS)
                    .obj()
                    .one(invitation_id)
                    .await
                    .map_err(|e| store_error("claim_invitation/read", e))?;

                match existing {
                    Some(existing) if existing.coach_id == coach_id => Ok(()),
                    Some(_) => Err(AppError::AlreadyRedeemed),
                    None => Err(store_error("claim_invitation", err)),
                }
            }
        }
    }

    /// Redeem an invitation: join the team and consume the token.
    ///
    /// Of two racing redemptions exactly one wins the claim (see
    /// [`Self::claim_invitation`]); the loser fails with `AlreadyRedeemed`
    /// without having written any membership. The winner's roster update,
    /// membership update and `used = true` transition commit in one
    /// transaction, so a crash can never half-apply the join.
    pub async fn redeem_invitation_atomic(
        &self,
        invitation_id: &str,
        coach_id: &str,
    ) -> Result<(Team, Invitation), AppError> {
        let client = self.get_client()?;

        let invitation: Option<Invitation> = client
            .fluent()
            .select()
            .by_id_in(collections::INVITATIONS)
            .obj()
            .one(invitation_id)
            .await
            .map_err(|e| store_error("redeem_invitation_atomic/read", e))?;

        let Some(mut invitation) = invitation else {
            return Err(AppError::InvitationNotFound);
        };

        if invitation.used {
            return Err(AppError::AlreadyRedeemed);
        }

        self.claim_invitation(invitation_id, coach_id).await?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| store_error("redeem_invitation_atomic/begin", e))?;

        let team_id = invitation.team_id.clone();
        let (team, coach) = self.read_pair(&team_id, coach_id).await?;
        let Some(mut team) = team else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        };
        let Some(mut coach) = coach else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Coach {}", coach_id)));
        };

        if !team.active {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Team {}", team_id)));
        }

        let now = Utc::now();
        team.add_member(coach_id);
        coach.add_membership(&team_id);
        team.version += 1;
        team.updated_at = now;
        coach.updated_at = now;

        invitation.used = true;
        invitation.used_by_coach_id = Some(coach_id.to_string());
        invitation.used_at = Some(now);

        self.write_pair_in_transaction(&team, &coach, &mut transaction)?;

        client
            .fluent()
            .update()
            .in_col(collections::INVITATIONS)
            .document_id(&invitation.id)
            .object(&invitation)
            .add_to_transaction(&mut transaction)
            .map_err(|e| store_error("redeem_invitation_atomic/write", e))?;

        transaction
            .commit()
            .await
            .map_err(|e| store_error("redeem_invitation_atomic/commit", e))?;

        tracing::info!(
            invitation_id = %invitation.id,
            team_id = %team.id,
            coach_id,
            "Invitation redeemed"
        );

        Ok((team, invitation))
    }
}
