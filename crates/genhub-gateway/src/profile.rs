//! Profile routes: public view, vCard download, self-service update and the
//! caller's resolved feature set.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use genhub_core::slug;
use genhub_core::{Capability, Profile, ProfileLink, TierResolver, VCard, DEFAULT_THEME};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::request::{optional, parse_json};
use crate::session::Session;
use crate::state::AppState;

const MAX_BIO_CHARS: usize = 500;
const MAX_LINKS: usize = 50;

/// GET /api/features: tier and capability flags for the caller.
pub async fn features(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let identity = session.require_identity()?;
    let tier = TierResolver::new(state.backend.as_ref()).resolve(&identity.id, Utc::now())?;
    let ctx = state.gate.context(tier);
    Ok(Json(json!({
        "success": true,
        "tier": ctx.tier(),
        "features": ctx.snapshot(),
    })))
}

fn load_public(state: &AppState, slug: &str) -> Result<Profile, ApiError> {
    state
        .backend
        .profile_by_slug(slug)?
        .ok_or_else(|| ApiError::NotFound(format!("profile {} not found", slug)))
}

/// GET /api/profile/:slug
pub async fn public_profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let profile = load_public(&state, &slug)?;
    let tier = genhub_core::resolve_tier(Some(&profile), Utc::now());
    let show_branding = !state.gate.allows(tier, Capability::RemoveBranding.as_str());
    Ok(Json(json!({
        "success": true,
        "profile": {
            "displayName": profile.display_name,
            "slug": profile.slug,
            "bio": profile.bio,
            "theme": profile.theme,
            "links": profile.links,
            "phone": profile.phone,
            "email": profile.email,
            "company": profile.company,
            "jobTitle": profile.job_title,
            "tier": tier,
            "showBranding": show_branding,
        },
    })))
}

/// GET /api/profile/:slug/vcard
pub async fn vcard(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let profile = load_public(&state, &slug)?;
    let tier = genhub_core::resolve_tier(Some(&profile), Utc::now());
    if !state.gate.allows(tier, Capability::VcardDownload.as_str()) {
        return Err(ApiError::Forbidden("vCard download is disabled for this profile".to_string()));
    }
    let url = state.config.profile_url(&profile.slug);
    let body = VCard::from_profile(&profile, Some(&url)).to_vcf();
    let disposition = format!("attachment; filename=\"{}.vcf\"", profile.slug);
    Ok((
        [
            (header::CONTENT_TYPE, "text/vcard; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    display_name: Option<String>,
    slug: Option<String>,
    bio: Option<String>,
    theme: Option<String>,
    links: Option<Vec<ProfileLink>>,
    phone: Option<String>,
    email: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
}

/// POST /api/profile: the caller edits their own profile.
pub async fn update_own_profile(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: UpdateProfileRequest = parse_json(&body)?;
    let identity = session.require_identity()?;
    let now = Utc::now();

    let mut profile = state
        .backend
        .profile(&identity.id)?
        .ok_or_else(|| ApiError::NotFound("no profile yet; claim a device first".to_string()))?;

    if let Some(name) = req.display_name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("displayName may not be empty".to_string()));
        }
        profile.display_name = name.to_string();
    }
    if let Some(new_slug) = req.slug {
        let new_slug = new_slug.trim().to_string();
        slug::validate(&new_slug).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        profile.slug = new_slug;
    }
    if let Some(bio) = req.bio {
        if bio.chars().count() > MAX_BIO_CHARS {
            return Err(ApiError::BadRequest(format!(
                "bio may not exceed {} characters",
                MAX_BIO_CHARS
            )));
        }
        profile.bio = bio.trim().to_string();
    }
    if let Some(theme) = req.theme {
        let theme = theme.trim();
        let theme = if theme.is_empty() { DEFAULT_THEME } else { theme };
        if theme != DEFAULT_THEME {
            let tier = TierResolver::new(state.backend.as_ref()).resolve(&identity.id, now)?;
            if !state.gate.allows(tier, Capability::CustomTheme.as_str()) {
                return Err(ApiError::Forbidden(format!(
                    "custom themes are not available on the {} tier",
                    tier
                )));
            }
        }
        profile.theme = theme.to_string();
    }
    if let Some(links) = req.links {
        if links.len() > MAX_LINKS {
            return Err(ApiError::BadRequest(format!("at most {} links", MAX_LINKS)));
        }
        if links.iter().any(|l| l.url.trim().is_empty()) {
            return Err(ApiError::BadRequest("every link needs a url".to_string()));
        }
        profile.links = links;
    }
    if req.phone.is_some() {
        profile.phone = optional(req.phone);
    }
    if req.email.is_some() {
        profile.email = optional(req.email);
    }
    if req.company.is_some() {
        profile.company = optional(req.company);
    }
    if req.job_title.is_some() {
        profile.job_title = optional(req.job_title);
    }
    profile.updated_at = now;

    if !state.backend.put_profile(&profile)? {
        return Err(ApiError::BadRequest(format!("slug {} is already taken", profile.slug)));
    }
    tracing::info!(identity = %identity.id, slug = %profile.slug, "profile updated");
    Ok(Json(json!({ "success": true, "profile": profile })))
}
