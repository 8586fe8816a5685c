//! Generative text bridge: bio generation and model listing over the
//! generative-language REST API. reqwest only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const GENERATE_METHOD: &str = "generateContent";

/// One generative model as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub supported_generation_methods: Vec<String>,
}

/// Text completion seam so handlers can be exercised without the network.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, BridgeError>;
    async fn list_models(&self) -> Result<Vec<ModelInfo>, BridgeError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    error: Option<UpstreamErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    message: Option<String>,
}

pub struct GeminiBridge {
    api_base: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiBridge {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.trim_start_matches("models/").to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn key(&self) -> Result<&str, BridgeError> {
        self.api_key.as_deref().ok_or(BridgeError::MissingApiKey)
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.api_base, self.model, GENERATE_METHOD
        )
    }

    fn models_url(&self) -> String {
        format!("{}/v1beta/models", self.api_base)
    }
}

#[async_trait]
impl TextGenerator for GeminiBridge {
    async fn generate(&self, prompt: &str) -> Result<String, BridgeError> {
        let key = self.key()?;
        tracing::info!(model = %self.model, "generative API: generate");
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        let res = self
            .client
            .post(self.generate_url())
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), &text));
        }
        parse_generated_text(&text)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BridgeError> {
        let key = self.key()?;
        let res = self
            .client
            .get(self.models_url())
            .query(&[("key", key)])
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), &text));
        }
        parse_model_list(&text)
    }
}

/// Upstream error with the API's own message when it sent one.
pub fn upstream_error(status: u16, body: &str) -> BridgeError {
    let message = serde_json::from_str::<UpstreamErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string());
    BridgeError::Upstream { status, message }
}

/// Concatenated text parts of the first candidate.
pub fn parse_generated_text(body: &str) -> Result<String, BridgeError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| BridgeError::Parse(e.to_string()))?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(BridgeError::Parse("no candidate text in response".to_string()));
    }
    Ok(text.to_string())
}

/// Models that can serve `generateContent`, with the `models/` prefix dropped.
pub fn parse_model_list(body: &str) -> Result<Vec<ModelInfo>, BridgeError> {
    let parsed: ListModelsResponse =
        serde_json::from_str(body).map_err(|e| BridgeError::Parse(e.to_string()))?;
    Ok(parsed
        .models
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_METHOD))
        .map(|mut m| {
            if let Some(short) = m.name.strip_prefix("models/") {
                m.name = short.to_string();
            }
            m
        })
        .collect())
}

/// Prompt for a link-in-bio blurb.
pub fn bio_prompt(
    keywords: &str,
    tone: Option<&str>,
    language: Option<&str>,
    display_name: Option<&str>,
) -> String {
    let tone = tone.map(str::trim).filter(|t| !t.is_empty()).unwrap_or("friendly and professional");
    let language = language.map(str::trim).filter(|l| !l.is_empty()).unwrap_or("English");
    let mut prompt = format!(
        "Write a short link-in-bio profile description (max 160 characters) in {}. \
Tone: {}. Use these keywords: {}.",
        language,
        tone,
        keywords.trim()
    );
    if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
        prompt.push_str(&format!(" The profile belongs to {}.", name));
    }
    prompt.push_str(" Reply with the description only, no quotes, no hashtags.");
    prompt
}
