use std::sync::Arc;

use genhub_core::{Backend, FeatureGate, IdentityProvider, RouteGuard, TextGenerator};

use crate::config::GatewayConfig;

/// Shared per-process state. The feature gate's override table is loaded once
/// at start and reused for every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub backend: Arc<dyn Backend>,
    pub identities: Arc<dyn IdentityProvider>,
    pub generator: Arc<dyn TextGenerator>,
    pub gate: Arc<FeatureGate>,
    pub guard: RouteGuard,
}
