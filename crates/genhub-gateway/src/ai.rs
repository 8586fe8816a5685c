//! Generative text routes: bio generation (gated on `ai_bio`) and model listing.

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use genhub_core::{bio_prompt, Capability, TierResolver};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::request::{optional, parse_json, required};
use crate::session::Session;
use crate::state::AppState;

#[derive(Deserialize)]
struct GenerateBioRequest {
    keywords: Option<String>,
    tone: Option<String>,
    language: Option<String>,
}

/// POST /api/generate-bio
pub async fn generate_bio(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let req: GenerateBioRequest = parse_json(&body)?;
    let keywords = required(req.keywords, "keywords")?;
    let identity = session.require_identity()?.clone();

    let tier = TierResolver::new(state.backend.as_ref()).resolve(&identity.id, Utc::now())?;
    let capability = Capability::AiBio.as_str();
    if !state.gate.allows(tier, capability) {
        return Err(ApiError::Forbidden(format!(
            "{} is not available on the {} tier",
            capability, tier
        )));
    }

    let display_name = state
        .backend
        .profile(&identity.id)?
        .map(|p| p.display_name);
    let prompt = bio_prompt(
        &keywords,
        optional(req.tone).as_deref(),
        optional(req.language).as_deref(),
        display_name.as_deref(),
    );

    let bio = state.generator.generate(&prompt).await?;
    tracing::info!(identity = %identity.id, chars = bio.chars().count(), "bio generated");
    Ok(Json(json!({ "success": true, "bio": bio })))
}

/// GET /api/models
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let models = state.generator.list_models().await?;
    Ok(Json(json!({ "success": true, "models": models })))
}
