// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde::Serialize;
use sideline::config::Config;
use sideline::db::FirestoreDb;
use sideline::routes::create_router;
use sideline::services::identity::IdentityClaims;
use sideline::services::{
    CoachDirectory, IdentityVerifier, InvitationService, ReconcileService, TasksService,
    TeamRegistry,
};
use sideline::AppState;
use std::sync::Arc;

/// Shared secret for minting test ID tokens (static-key verifier mode).
#[allow(dead_code)]
pub const TEST_SIGNING_KEY: &[u8] = b"sideline-test-secret";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Identity claims as the verifier would extract them from an ID token.
#[allow(dead_code)]
pub fn test_claims(sub: &str, name: &str, email: &str) -> IdentityClaims {
    IdentityClaims {
        sub: sub.to_string(),
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        picture: None,
        email_verified: Some(true),
    }
}

/// Mint an ID token the static-key verifier accepts.
#[allow(dead_code)]
pub fn create_test_jwt(sub: &str) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        iss: String,
        aud: String,
        exp: usize,
        iat: usize,
        name: Option<String>,
        email: Option<String>,
    }

    let now = chrono::Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: sub.to_string(),
        iss: "https://securetoken.google.com/test-project".to_string(),
        aud: "test-project".to_string(),
        exp: now + 86400,
        iat: now,
        name: Some("Test Coach".to_string()),
        email: Some("coach@example.com".to_string()),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SIGNING_KEY),
    )
    .unwrap()
}

/// Build the full app state over the given database.
#[allow(dead_code)]
pub fn test_state(db: FirestoreDb) -> Arc<AppState> {
    let config = Config::test_default();

    let identity = Arc::new(
        IdentityVerifier::new_with_static_key(
            &config.gcp_project_id,
            DecodingKey::from_secret(TEST_SIGNING_KEY),
            Algorithm::HS256,
        )
        .expect("Failed to build static-key verifier"),
    );

    let directory = CoachDirectory::new(db.clone());
    let registry = TeamRegistry::new(db.clone());
    let invitations = InvitationService::new(db.clone(), directory.clone(), registry.clone());
    let reconcile = ReconcileService::new(db.clone());
    let tasks_service = TasksService::new(&config.gcp_project_id, &config.gcp_region);

    Arc::new(AppState {
        config,
        db,
        identity,
        directory,
        registry,
        invitations,
        reconcile,
        tasks_service,
    })
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = test_state(test_db_offline());
    (create_router(state.clone()), state)
}
