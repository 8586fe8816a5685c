//! Backend store seam. The gateway never owns durable state itself: every
//! mutation is one call into a `Backend`, which is expected to make compound
//! operations (claim, delete, reset) atomic.

use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::features::OverrideTable;
use crate::model::{ClaimToken, Identity, Profile};

/// Result of the claim operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Token was free and now belongs to the caller.
    Claimed(ClaimToken),
    /// Caller already owned it; nothing changed.
    AlreadyOwned(ClaimToken),
    NotFound,
    ClaimedByOther,
}

/// Result of an admin reset.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetSummary {
    pub profile: Profile,
    pub released_tokens: usize,
}

/// Row-level access and the compound operations the gateway relies on.
pub trait Backend: Send + Sync {
    fn identity(&self, id: &str) -> StoreResult<Option<Identity>>;
    fn put_identity(&self, identity: &Identity) -> StoreResult<()>;

    fn profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;
    fn profile_by_slug(&self, slug: &str) -> StoreResult<Option<Profile>>;
    /// Inserts or replaces a profile. `Ok(false)` when another identity
    /// already holds the slug; nothing is written in that case.
    fn put_profile(&self, profile: &Profile) -> StoreResult<bool>;

    fn token(&self, serial: &str) -> StoreResult<Option<ClaimToken>>;
    fn put_token(&self, token: &ClaimToken) -> StoreResult<()>;
    fn tokens_owned_by(&self, identity_id: &str) -> StoreResult<Vec<ClaimToken>>;

    /// Claims a token for an identity.
    fn claim_serial(
        &self,
        serial: &str,
        identity_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome>;

    /// Removes the identity with its profile and sessions, and releases every
    /// token it owned. `Ok(false)` when the identity does not exist.
    fn delete_identity(&self, id: &str) -> StoreResult<bool>;

    /// Clears profile content and releases owned tokens; the identity stays.
    /// `Ok(None)` when there is no profile.
    fn reset_identity(&self, id: &str, now: DateTime<Utc>) -> StoreResult<Option<ResetSummary>>;

    /// Sets the sync flag on every token owned by the identity. Returns the count.
    fn set_sync_for_owner(&self, identity_id: &str, enabled: bool) -> StoreResult<usize>;

    fn feature_overrides(&self) -> StoreResult<OverrideTable>;
    fn put_feature_overrides(&self, table: &OverrideTable) -> StoreResult<()>;
}

/// Resolves a session token to an identity. Stands in for the auth provider.
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` for an unknown or revoked token; `Err` when the provider
    /// itself cannot answer.
    fn authenticate(&self, token: &str) -> StoreResult<Option<Identity>>;
}
