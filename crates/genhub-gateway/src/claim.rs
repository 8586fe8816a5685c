//! POST /api/claim: bind a physical device serial to the caller.

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use genhub_core::slug::{display_name_for_identity, random_suffix, slug_for_identity};
use genhub_core::{ClaimOutcome, Profile};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::request::{parse_json, required};
use crate::session::Session;
use crate::state::AppState;

const SLUG_ATTEMPTS: usize = 4;

#[derive(Deserialize)]
struct ClaimRequest {
    serial: Option<String>,
}

pub async fn claim_serial(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: ClaimRequest = parse_json(&body)?;
    let serial = required(req.serial, "serial")?;
    let identity = session.require_identity()?;
    let now = Utc::now();

    let token = match state.backend.claim_serial(&serial, &identity.id, now)? {
        ClaimOutcome::Claimed(token) => {
            tracing::info!(identity = %identity.id, serial = %serial, "device claimed");
            token
        }
        ClaimOutcome::AlreadyOwned(token) => token,
        ClaimOutcome::NotFound => {
            return Err(ApiError::NotFound(format!("serial {} not found", serial)))
        }
        ClaimOutcome::ClaimedByOther => {
            return Err(ApiError::Forbidden(
                "serial is already claimed by another account".to_string(),
            ))
        }
    };

    let (profile, created) = match state.backend.profile(&identity.id)? {
        Some(profile) => (profile, false),
        None => (synthesize_profile(&state, &identity.id, now)?, true),
    };

    Ok(Json(json!({
        "success": true,
        "serial": token.serial,
        "claimedAt": token.claimed_at,
        "profileCreated": created,
        "slug": profile.slug,
    })))
}

/// First profile for a claimer: generated name, slug from the id prefix,
/// with a random suffix if that slug is already taken.
fn synthesize_profile(
    state: &AppState,
    identity_id: &str,
    now: chrono::DateTime<Utc>,
) -> Result<Profile, ApiError> {
    let base = slug_for_identity(identity_id);
    let mut slug = base.clone();
    for _ in 0..SLUG_ATTEMPTS {
        let profile = Profile::new(identity_id, display_name_for_identity(identity_id), &slug, now);
        if state.backend.put_profile(&profile)? {
            tracing::info!(identity = identity_id, slug = %profile.slug, "profile created on first claim");
            return Ok(profile);
        }
        slug = format!("{}-{}", base, random_suffix(4));
    }
    Err(ApiError::Internal(format!(
        "could not allocate a free slug for {}",
        identity_id
    )))
}
