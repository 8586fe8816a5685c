//! GenHub core library.
//! Tier resolution, feature gating and route guarding for the link-in-bio
//! platform, plus the backend store seam and the generative text bridge.

pub mod ai_bridge;
pub mod backend;
pub mod error;
pub mod features;
pub mod model;
pub mod route_guard;
pub mod slug;
pub mod store;
pub mod tier;
pub mod vcard;

pub use ai_bridge::{bio_prompt, GeminiBridge, ModelInfo, TextGenerator};
pub use backend::{Backend, ClaimOutcome, IdentityProvider, ResetSummary};
pub use error::{BridgeError, StoreError, StoreResult};
pub use features::{Availability, Capability, FeatureContext, FeatureGate, FeatureState, OverrideTable};
pub use model::{ClaimToken, Identity, Profile, ProfileLink, Tier, DEFAULT_THEME};
pub use route_guard::{AuthState, GuardDecision, PathClass, RouteGuard};
pub use store::SledBackend;
pub use tier::{resolve_tier, TierResolver};
pub use vcard::VCard;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    #[test]
    fn version_comes_from_the_manifest() {
        assert_eq!(super::version(), env!("CARGO_PKG_VERSION"));
    }
}
