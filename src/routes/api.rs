// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated coaches, plus the public invitation preview.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthCoach;
use crate::models::{Coach, Invitation, Season, SeasonPeriod, Team};
use crate::services::directory::ProfileUpdate;
use crate::services::registry::{TeamAttrs, TeamUpdate};
use crate::services::tasks::ReconcilePayload;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via ID token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/api/teams", get(list_teams).post(create_team))
        .route(
            "/api/teams/{id}",
            get(get_team).patch(update_team).delete(delete_team),
        )
        .route("/api/teams/{id}/coaches", get(list_team_coaches))
        .route("/api/teams/{id}/coaches/{coach_id}", delete(remove_coach))
        .route("/api/teams/{id}/invitation-code", post(regenerate_code))
        .route("/api/teams/{id}/invitations", post(issue_invitation))
        .route("/api/invitations/{code}/redeem", post(redeem_invitation))
}

/// Public routes (no auth) for rendering an invite link before sign-in.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/invitations/{code}", get(preview_invitation))
}

fn validated<T: Validate>(payload: T) -> Result<T> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(payload)
}

/// Fetch a team the caller belongs to; inactive teams read as missing.
async fn member_team(state: &AppState, team_id: &str, coach_id: &str) -> Result<Team> {
    let team = state.registry.get(team_id).await?;
    if !team.active {
        return Err(AppError::NotFound(format!("Team {}", team_id)));
    }
    if !team.has_member(coach_id) {
        return Err(AppError::PermissionDenied(
            "not a member of this team".to_string(),
        ));
    }
    Ok(team)
}

// ─── Coach Profile ───────────────────────────────────────────

/// Coach profile response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CoachResponse {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub team_memberships: Vec<String>,
    pub active: bool,
    pub created_at: String,
}

impl From<Coach> for CoachResponse {
    fn from(coach: Coach) -> Self {
        Self {
            id: coach.id,
            display_name: coach.display_name,
            email: coach.email,
            photo_url: coach.photo_url,
            team_memberships: coach.team_memberships,
            active: coach.active,
            created_at: format_utc_rfc3339(coach.created_at),
        }
    }
}

/// Get (and on first access, create) the calling coach's profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
) -> Result<Json<CoachResponse>> {
    let profile = state.directory.ensure_profile(&coach.claims).await?;
    Ok(Json(profile.into()))
}

#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(url)]
    pub photo_url: Option<String>,
}

/// Merge profile fields into the calling coach's record.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<CoachResponse>> {
    let payload = validated(payload)?;

    let updated = state
        .directory
        .update_profile(
            coach.id(),
            ProfileUpdate {
                display_name: payload.display_name,
                email: payload.email,
                photo_url: payload.photo_url,
            },
        )
        .await?;

    Ok(Json(updated.into()))
}

/// Response for account deactivation.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeactivateResponse {
    pub success: bool,
    pub message: String,
}

/// Soft-delete the calling coach's account.
///
/// Memberships stay in place; rosters keep showing the coach as inactive.
async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
) -> Result<Json<DeactivateResponse>> {
    tracing::info!(coach_id = coach.id(), "Coach-initiated account deactivation");

    state.directory.deactivate(coach.id()).await?;

    Ok(Json(DeactivateResponse {
        success: true,
        message: "Account deactivated.".to_string(),
    }))
}

// ─── Teams ───────────────────────────────────────────────────

/// Team response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamResponse {
    pub id: String,
    pub name: String,
    pub season: Season,
    pub member_coach_ids: Vec<String>,
    pub owner_coach_id: String,
    pub invitation_code: Option<String>,
    pub active: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub version: u64,
    pub created_at: String,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            id: team.id,
            name: team.name,
            season: team.season,
            member_coach_ids: team.member_coach_ids,
            owner_coach_id: team.owner_coach_id,
            invitation_code: team.invitation_code,
            active: team.active,
            version: team.version,
            created_at: format_utc_rfc3339(team.created_at),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamsResponse {
    pub teams: Vec<TeamResponse>,
}

/// List the calling coach's active teams.
async fn list_teams(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
) -> Result<Json<TeamsResponse>> {
    let listing = state.registry.list_for_coach(coach.id()).await?;

    // A degraded listing means the two sides of the membership data disagree
    // somewhere; repair out-of-band rather than failing this request.
    if listing.degraded {
        let payload = ReconcilePayload {
            source: "listing_fallback".to_string(),
            coach_id: Some(coach.id().to_string()),
        };
        if let Err(err) = state
            .tasks_service
            .queue_reconcile(&state.config.api_url, payload)
            .await
        {
            tracing::warn!(error = %err, "Failed to queue reconciliation sweep");
        }
    }

    Ok(Json(TeamsResponse {
        teams: listing.teams.into_iter().map(TeamResponse::from).collect(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct SeasonRequest {
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    pub period: SeasonPeriod,
}

impl From<SeasonRequest> for Season {
    fn from(req: SeasonRequest) -> Self {
        Season {
            year: req.year,
            period: req.period,
        }
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(nested)]
    pub season: SeasonRequest,
}

/// Create a team; the caller becomes owner and first roster member.
async fn create_team(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Json(payload): Json<CreateTeamRequest>,
) -> Result<Json<TeamResponse>> {
    let payload = validated(payload)?;

    // First team creation may precede any profile fetch; make sure the
    // owner's coach record exists before the paired write reads it.
    let owner = state.directory.ensure_profile(&coach.claims).await?;

    let team = state
        .registry
        .create(
            &owner.id,
            TeamAttrs {
                name: payload.name,
                season: payload.season.into(),
            },
        )
        .await?;

    Ok(Json(team.into()))
}

/// Get a team (members only).
async fn get_team(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Path(team_id): Path<String>,
) -> Result<Json<TeamResponse>> {
    let team = member_team(&state, &team_id, coach.id()).await?;
    Ok(Json(team.into()))
}

#[derive(Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(nested)]
    pub season: Option<SeasonRequest>,
    /// When present, the update fails with 409 unless the stored team version
    /// still matches (lost-update protection for concurrent editors).
    pub expected_version: Option<u64>,
}

/// Update team attributes (members only; roster and owner are immutable here).
async fn update_team(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Path(team_id): Path<String>,
    Json(payload): Json<UpdateTeamRequest>,
) -> Result<Json<TeamResponse>> {
    let payload = validated(payload)?;
    member_team(&state, &team_id, coach.id()).await?;

    let updated = state
        .registry
        .update(
            &team_id,
            TeamUpdate {
                name: payload.name,
                season: payload.season.map(Season::from),
                expected_version: payload.expected_version,
            },
        )
        .await?;

    Ok(Json(updated.into()))
}

/// Soft-delete a team (owner only).
async fn delete_team(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Path(team_id): Path<String>,
) -> Result<Json<TeamResponse>> {
    let team = member_team(&state, &team_id, coach.id()).await?;
    if team.owner_coach_id != coach.id() {
        return Err(AppError::PermissionDenied(
            "only the owner can delete a team".to_string(),
        ));
    }

    let deactivated = state.registry.deactivate(&team_id).await?;
    Ok(Json(deactivated.into()))
}

// ─── Roster ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CoachesResponse {
    pub coaches: Vec<CoachResponse>,
}

/// List the coaches on a team's roster (members only).
async fn list_team_coaches(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Path(team_id): Path<String>,
) -> Result<Json<CoachesResponse>> {
    member_team(&state, &team_id, coach.id()).await?;

    let coaches = state.directory.list_by_team(&team_id).await?;
    Ok(Json(CoachesResponse {
        coaches: coaches.into_iter().map(CoachResponse::from).collect(),
    }))
}

/// Remove a coach from a team roster.
///
/// Removing yourself is leaving the team. Removing the owner always fails
/// with a 409; the owner protection lives in the transactional write.
async fn remove_coach(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Path((team_id, coach_id)): Path<(String, String)>,
) -> Result<Json<TeamResponse>> {
    if coach_id != coach.id() {
        member_team(&state, &team_id, coach.id()).await?;
    }

    let team = state.registry.remove_coach(&team_id, &coach_id).await?;

    tracing::info!(
        team_id = %team_id,
        coach_id = %coach_id,
        removed_by = coach.id(),
        "Coach removed from roster"
    );

    Ok(Json(team.into()))
}

// ─── Invitations ─────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RegenerateCodeResponse {
    pub invitation_code: String,
}

/// Replace the team's join code (members only).
///
/// Invitations issued under the old code stay redeemable until they expire.
async fn regenerate_code(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Path(team_id): Path<String>,
) -> Result<Json<RegenerateCodeResponse>> {
    member_team(&state, &team_id, coach.id()).await?;

    let invitation_code = state.registry.regenerate_invitation_code(&team_id).await?;
    Ok(Json(RegenerateCodeResponse { invitation_code }))
}

/// Invitation response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InvitationResponse {
    pub id: String,
    pub team_id: String,
    pub invitation_code: String,
    pub invited_by_name: String,
    pub expires_at: String,
    pub created_at: String,
}

impl From<Invitation> for InvitationResponse {
    fn from(invitation: Invitation) -> Self {
        Self {
            id: invitation.id,
            team_id: invitation.team_id,
            invitation_code: invitation.invitation_code,
            invited_by_name: invitation.invited_by_name,
            expires_at: format_utc_rfc3339(invitation.expires_at),
            created_at: format_utc_rfc3339(invitation.created_at),
        }
    }
}

/// Issue an invitation for a team (members only).
async fn issue_invitation(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Path(team_id): Path<String>,
) -> Result<Json<InvitationResponse>> {
    let issuer = state.directory.ensure_profile(&coach.claims).await?;
    member_team(&state, &team_id, &issuer.id).await?;

    let invitation = state
        .invitations
        .issue(&team_id, &issuer.id, &issuer.display_name)
        .await?;

    Ok(Json(invitation.into()))
}

/// Redeem an invitation as the calling identity; returns the joined team.
async fn redeem_invitation(
    State(state): State<Arc<AppState>>,
    Extension(coach): Extension<AuthCoach>,
    Path(code): Path<String>,
) -> Result<Json<TeamResponse>> {
    let team = state.invitations.redeem(&code, &coach.claims).await?;
    Ok(Json(team.into()))
}

// ─── Public Invitation Preview ───────────────────────────────

/// What an invite link shows before the invitee signs in.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InvitationPreviewResponse {
    pub team_name: String,
    pub invited_by_name: String,
    pub expires_at: String,
}

/// Preview an invitation by code (public, no auth).
async fn preview_invitation(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<InvitationPreviewResponse>> {
    let invitation = state
        .invitations
        .lookup(&code)
        .await?
        .ok_or(AppError::InvitationNotFound)?;

    if invitation.is_expired(chrono::Utc::now()) {
        return Err(AppError::InvitationExpired);
    }

    let team = state.registry.get(&invitation.team_id).await?;
    if !team.active {
        return Err(AppError::InvitationNotFound);
    }

    Ok(Json(InvitationPreviewResponse {
        team_name: team.name,
        invited_by_name: invitation.invited_by_name,
        expires_at: format_utc_rfc3339(invitation.expires_at),
    }))
}
