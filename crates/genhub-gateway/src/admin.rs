//! Admin routes: delete, reset and update an identity. All require an admin session.

use axum::{body::Bytes, extract::State, Json};
use chrono::{DateTime, Utc};
use genhub_core::Tier;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::request::{optional, parse_json, required};
use crate::session::Session;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRequest {
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    user_id: Option<String>,
    tier: Option<String>,
    /// RFC 3339 string to set, `null` to clear, absent to leave alone.
    #[serde(default, deserialize_with = "present")]
    tier_expires_at: Option<Value>,
    activated: Option<bool>,
    display_name: Option<String>,
}

/// POST /api/admin/delete-user
pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: UserRequest = parse_json(&body)?;
    let user_id = required(req.user_id, "userId")?;
    let admin = session.require_admin()?;

    if !state.backend.delete_identity(&user_id)? {
        return Err(ApiError::NotFound(format!("user {} not found", user_id)));
    }
    tracing::info!(admin = %admin.id, user = %user_id, "user deleted");
    Ok(Json(json!({ "success": true, "userId": user_id })))
}

/// POST /api/admin/reset-user
pub async fn reset_user(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: UserRequest = parse_json(&body)?;
    let user_id = required(req.user_id, "userId")?;
    let admin = session.require_admin()?;

    let Some(summary) = state.backend.reset_identity(&user_id, Utc::now())? else {
        return Err(ApiError::NotFound(format!("profile for {} not found", user_id)));
    };
    tracing::info!(
        admin = %admin.id,
        user = %user_id,
        released = summary.released_tokens,
        "user reset"
    );
    Ok(Json(json!({
        "success": true,
        "userId": user_id,
        "releasedTokens": summary.released_tokens,
        "profile": summary.profile,
    })))
}

/// POST /api/admin/update-user
///
/// A move to FREE also switches off device sync. That second write is
/// best-effort: if it fails the update is still reported as successful.
pub async fn update_user(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: UpdateUserRequest = parse_json(&body)?;
    let user_id = required(req.user_id, "userId")?;
    let tier = req
        .tier
        .as_deref()
        .map(|t| {
            t.parse::<Tier>()
                .map_err(|_| ApiError::BadRequest("tier must be one of FREE, PREMIUM, B2B".to_string()))
        })
        .transpose()?;
    let expires_at = parse_expiry(req.tier_expires_at)?;
    let display_name = optional(req.display_name);
    let admin = session.require_admin()?;

    let now = Utc::now();
    let mut profile = state
        .backend
        .profile(&user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("profile for {} not found", user_id)))?;
    // Both records are loaded before either is written.
    let identity = match req.activated {
        Some(activated) => {
            let mut identity = state
                .backend
                .identity(&user_id)?
                .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user_id)))?;
            identity.activated = activated;
            Some(identity)
        }
        None => None,
    };

    if let Some(tier) = tier {
        profile.tier = tier;
    }
    if let Some(expires_at) = expires_at {
        profile.tier_expires_at = expires_at;
    }
    if let Some(name) = display_name {
        profile.display_name = name;
    }
    profile.updated_at = now;
    // Slug is unchanged, so the write cannot lose a slug race to another identity.
    state.backend.put_profile(&profile)?;

    if let Some(identity) = identity {
        state.backend.put_identity(&identity)?;
    }

    let mut sync_disabled = None;
    if tier == Some(Tier::Free) {
        match state.backend.set_sync_for_owner(&user_id, false) {
            Ok(count) => sync_disabled = Some(count),
            Err(e) => tracing::warn!(
                user = %user_id,
                "tier set to FREE but disabling device sync failed: {}",
                e
            ),
        }
    }

    tracing::info!(admin = %admin.id, user = %user_id, tier = %profile.tier, "user updated");
    Ok(Json(json!({
        "success": true,
        "profile": profile,
        "syncDisabled": sync_disabled,
    })))
}

/// Keeps an explicit `null` as `Some(Value::Null)` instead of folding it into `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// `None` = leave alone, `Some(None)` = clear, `Some(Some(t))` = set.
fn parse_expiry(raw: Option<Value>) -> Result<Option<Option<DateTime<Utc>>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|t| Some(Some(t.with_timezone(&Utc))))
            .map_err(|_| ApiError::BadRequest("tierExpiresAt must be an RFC 3339 timestamp".to_string())),
        Some(_) => Err(ApiError::BadRequest(
            "tierExpiresAt must be an RFC 3339 timestamp".to_string(),
        )),
    }
}
