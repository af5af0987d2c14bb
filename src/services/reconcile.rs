// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconciliation sweep: idempotent repair of the coach/team dual write.
//!
//! All normal mutations commit both sides in one transaction, so the sweep
//! only ever finds divergence introduced outside this code path (manual
//! console edits, pre-migration data, partial imports). It reads both sides,
//! unions the relationship, and rewrites whichever side is behind. Detected
//! inconsistencies are logged, never surfaced as errors to the caller that
//! triggered the sweep.

use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::{Coach, Team};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_CONCURRENT_REPAIRS: usize = 8;

/// One missing half of a membership relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// The coach lists the team but the roster is missing them.
    AddToRoster { team_id: String, coach_id: String },
    /// The roster lists the coach but their membership set is missing it.
    AddMembership { coach_id: String, team_id: String },
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReconcileReport {
    pub teams_checked: u32,
    pub coaches_checked: u32,
    pub repairs_applied: u32,
    pub repairs_failed: u32,
    /// Relationships referencing a document that does not exist; these cannot
    /// be repaired by union and are only reported.
    pub dangling_references: u32,
}

/// Compute the union repairs for a snapshot of both collections.
///
/// Additive only: soft deletes keep memberships in place, so nothing is ever
/// removed here. References to documents absent from the snapshot are counted
/// as dangling rather than repaired.
pub fn compute_repairs(teams: &[Team], coaches: &[Coach]) -> (Vec<Repair>, u32) {
    let teams_by_id: HashMap<&str, &Team> = teams.iter().map(|t| (t.id.as_str(), t)).collect();
    let coaches_by_id: HashMap<&str, &Coach> =
        coaches.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut repairs = Vec::new();
    let mut dangling = 0u32;

    for team in teams {
        // Owner must always appear in the roster.
        if !team.has_member(&team.owner_coach_id) {
            repairs.push(Repair::AddToRoster {
                team_id: team.id.clone(),
                coach_id: team.owner_coach_id.clone(),
            });
        }

        for coach_id in &team.member_coach_ids {
            match coaches_by_id.get(coach_id.as_str()) {
                Some(coach) if !coach.is_member_of(&team.id) => {
                    repairs.push(Repair::AddMembership {
                        coach_id: coach_id.clone(),
                        team_id: team.id.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    tracing::warn!(
                        team_id = %team.id,
                        coach_id = %coach_id,
                        "Roster references a coach with no directory record"
                    );
                    dangling += 1;
                }
            }
        }
    }

    for coach in coaches {
        for team_id in &coach.team_memberships {
            match teams_by_id.get(team_id.as_str()) {
                Some(team) if !team.has_member(&coach.id) => {
                    repairs.push(Repair::AddToRoster {
                        team_id: team_id.clone(),
                        coach_id: coach.id.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    tracing::warn!(
                        coach_id = %coach.id,
                        team_id = %team_id,
                        "Membership set references a missing team"
                    );
                    dangling += 1;
                }
            }
        }
    }

    (repairs, dangling)
}

/// Runs reconciliation sweeps over the whole store.
#[derive(Clone)]
pub struct ReconcileService {
    db: FirestoreDb,
}

impl ReconcileService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Run one sweep. Safe to invoke at any time, repeatedly; a second sweep
    /// over consistent data applies zero repairs.
    pub async fn sweep(&self) -> Result<ReconcileReport> {
        let teams = self.db.list_all_teams().await?;
        let coaches = self.db.list_all_coaches().await?;

        let (repairs, dangling_references) = compute_repairs(&teams, &coaches);

        let total = repairs.len();
        if total > 0 {
            tracing::warn!(repairs = total, "Reconciliation found divergent memberships");
        }

        let db = self.db.clone();
        let outcomes: Vec<bool> = stream::iter(repairs)
            .map(|repair| {
                let db = db.clone();
                async move { apply_repair(&db, repair).await }
            })
            .buffer_unordered(MAX_CONCURRENT_REPAIRS)
            .collect()
            .await;

        let repairs_applied = outcomes.iter().filter(|ok| **ok).count() as u32;
        let report = ReconcileReport {
            teams_checked: teams.len() as u32,
            coaches_checked: coaches.len() as u32,
            repairs_applied,
            repairs_failed: total as u32 - repairs_applied,
            dangling_references,
        };

        tracing::info!(
            teams = report.teams_checked,
            coaches = report.coaches_checked,
            applied = report.repairs_applied,
            failed = report.repairs_failed,
            dangling = report.dangling_references,
            "Reconciliation sweep complete"
        );

        Ok(report)
    }
}

async fn apply_repair(db: &FirestoreDb, repair: Repair) -> bool {
    let result = match &repair {
        Repair::AddToRoster { team_id, coach_id } => {
            let coach_id = coach_id.clone();
            db.mutate_team_atomic(team_id, move |team| {
                team.add_member(&coach_id);
                Ok(())
            })
            .await
            .map(|_| ())
        }
        Repair::AddMembership { coach_id, team_id } => {
            let team_id = team_id.clone();
            db.mutate_coach_atomic(coach_id, move |coach| {
                coach.add_membership(&team_id);
                Ok(())
            })
            .await
            .map(|_| ())
        }
    };

    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(repair = ?repair, error = %err, "Failed to apply repair");
            false
        }
    }
}
