//! Tier Resolver: the effective subscription tier of an identity at a point in time.

use chrono::{DateTime, Utc};

use crate::backend::Backend;
use crate::error::StoreResult;
use crate::model::{Profile, Tier};

/// Effective tier for a (possibly missing) profile.
///
/// An expired PREMIUM reads as FREE. Nothing is written back; the stored label
/// stays until an admin changes it.
pub fn resolve_tier(profile: Option<&Profile>, now: DateTime<Utc>) -> Tier {
    let Some(profile) = profile else {
        return Tier::Free;
    };
    match (profile.tier, profile.tier_expires_at) {
        (Tier::Premium, Some(expires_at)) if expires_at < now => Tier::Free,
        (tier, _) => tier,
    }
}

/// Looks up the profile and resolves its tier.
pub struct TierResolver<'a> {
    backend: &'a dyn Backend,
}

impl<'a> TierResolver<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub fn resolve(&self, identity_id: &str, now: DateTime<Utc>) -> StoreResult<Tier> {
        let profile = self.backend.profile(identity_id)?;
        let tier = resolve_tier(profile.as_ref(), now);
        if let Some(p) = profile.as_ref() {
            if p.tier != tier {
                tracing::debug!(identity = identity_id, stored = %p.tier, "subscription expired; resolving as {}", tier);
            }
        }
        Ok(tier)
    }
}
