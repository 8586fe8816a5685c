//! In-process harness for handler tests: a temp sled store, the real router,
//! and stub seams for the generative API and the auth backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Utc};
use genhub_core::{
    Backend, BridgeError, ClaimOutcome, ClaimToken, FeatureGate, Identity, IdentityProvider,
    ModelInfo, OverrideTable, Profile, ResetSummary, RouteGuard, SledBackend, StoreError,
    StoreResult, TextGenerator, Tier,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::GatewayConfig;
use crate::routes::build_router;
use crate::state::AppState;

pub struct StubGenerator {
    reply: Result<String, (u16, String)>,
    last_prompt: Mutex<Option<String>>,
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self::replying("A short generated bio.")
    }
}

impl StubGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing(status: u16, message: &str) -> Self {
        Self {
            reply: Err((status, message.to_string())),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, BridgeError> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err((status, message)) => Err(BridgeError::Upstream {
                status: *status,
                message: message.clone(),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BridgeError> {
        Ok(vec![ModelInfo {
            name: "gemini-1.5-flash".to_string(),
            display_name: "Gemini 1.5 Flash".to_string(),
            description: None,
            supported_generation_methods: vec!["generateContent".to_string()],
        }])
    }
}

/// Delegates to sled but cannot flip the sync flag.
struct FlakySync(Arc<SledBackend>);

impl Backend for FlakySync {
    fn identity(&self, id: &str) -> StoreResult<Option<Identity>> {
        self.0.identity(id)
    }
    fn put_identity(&self, identity: &Identity) -> StoreResult<()> {
        self.0.put_identity(identity)
    }
    fn profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        self.0.profile(user_id)
    }
    fn profile_by_slug(&self, slug: &str) -> StoreResult<Option<Profile>> {
        self.0.profile_by_slug(slug)
    }
    fn put_profile(&self, profile: &Profile) -> StoreResult<bool> {
        self.0.put_profile(profile)
    }
    fn token(&self, serial: &str) -> StoreResult<Option<ClaimToken>> {
        self.0.token(serial)
    }
    fn put_token(&self, token: &ClaimToken) -> StoreResult<()> {
        self.0.put_token(token)
    }
    fn tokens_owned_by(&self, identity_id: &str) -> StoreResult<Vec<ClaimToken>> {
        self.0.tokens_owned_by(identity_id)
    }
    fn claim_serial(
        &self,
        serial: &str,
        identity_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        self.0.claim_serial(serial, identity_id, now)
    }
    fn delete_identity(&self, id: &str) -> StoreResult<bool> {
        self.0.delete_identity(id)
    }
    fn reset_identity(&self, id: &str, now: DateTime<Utc>) -> StoreResult<Option<ResetSummary>> {
        self.0.reset_identity(id, now)
    }
    fn set_sync_for_owner(&self, _identity_id: &str, _enabled: bool) -> StoreResult<usize> {
        Err(StoreError::Unavailable("device table is read-only".to_string()))
    }
    fn feature_overrides(&self) -> StoreResult<OverrideTable> {
        self.0.feature_overrides()
    }
    fn put_feature_overrides(&self, table: &OverrideTable) -> StoreResult<()> {
        self.0.put_feature_overrides(table)
    }
}

struct FailingProvider;

impl IdentityProvider for FailingProvider {
    fn authenticate(&self, _token: &str) -> StoreResult<Option<Identity>> {
        Err(StoreError::Unavailable("auth backend timed out".to_string()))
    }
}

#[derive(Default)]
pub struct HarnessBuilder {
    generator: Option<StubGenerator>,
    flaky_sync: bool,
    failing_auth: Option<bool>,
}

impl HarnessBuilder {
    pub fn generator(mut self, generator: StubGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn flaky_sync(mut self) -> Self {
        self.flaky_sync = true;
        self
    }

    /// Auth lookups always error; the guard runs with the given fail-open policy.
    pub fn failing_auth(mut self, fail_open: bool) -> Self {
        self.failing_auth = Some(fail_open);
        self
    }

    pub fn build(self) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SledBackend::open(Some(dir.path().join("db"))).unwrap());
        let generator = Arc::new(self.generator.unwrap_or_default());

        let backend: Arc<dyn Backend> = if self.flaky_sync {
            Arc::new(FlakySync(store.clone()))
        } else {
            store.clone()
        };
        let identities: Arc<dyn IdentityProvider> = match self.failing_auth {
            Some(_) => Arc::new(FailingProvider),
            None => store.clone(),
        };
        let fail_open = self.failing_auth.unwrap_or(true);

        let state = AppState {
            config: Arc::new(GatewayConfig {
                fail_open,
                ..GatewayConfig::default()
            }),
            backend,
            identities,
            generator: generator.clone(),
            gate: Arc::new(FeatureGate::new(store.feature_overrides().unwrap())),
            guard: RouteGuard::new(fail_open),
        };

        Harness {
            _dir: dir,
            store,
            app: build_router(state),
            generator,
        }
    }
}

pub struct Harness {
    _dir: TempDir,
    pub store: Arc<SledBackend>,
    pub app: Router,
    pub generator: Arc<StubGenerator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Stores an identity and returns a fresh session token for it.
    pub fn seed_user(&self, id: &str, activated: bool, admin: bool) -> String {
        let mut identity = Identity::new(id);
        identity.activated = activated;
        identity.is_admin = admin;
        self.store.put_identity(&identity).unwrap();
        self.store.issue_session(id).unwrap()
    }

    pub fn seed_profile(
        &self,
        id: &str,
        slug: &str,
        tier: Tier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Profile {
        let mut profile = Profile::new(id, format!("User {}", id), slug, Utc::now());
        profile.tier = tier;
        profile.tier_expires_at = expires_at;
        assert!(self.store.put_profile(&profile).unwrap(), "slug {slug} taken");
        profile
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &str) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let res = self.send(builder.body(Body::from(body.to_string())).unwrap()).await;
        Self::json(res).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let res = self.send(builder.body(Body::empty()).unwrap()).await;
        Self::json(res).await
    }

    async fn json(res: Response) -> (StatusCode, Value) {
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
