//! Integration test: session → route guard → tier resolver → feature gate,
//! against a real sled store.
//!
//! Verifies that:
//! 1. An expired PREMIUM profile is gated like FREE, with no write-back.
//! 2. Stored overrides change the answer once loaded into a gate.
//! 3. Deleting an identity frees its claim token for someone else.

use chrono::{Duration, Utc};
use genhub_core::{
    AuthState, Backend, ClaimOutcome, ClaimToken, FeatureGate, FeatureState, GuardDecision,
    Identity, IdentityProvider, Profile, RouteGuard, SledBackend, Tier, TierResolver,
};

fn open() -> (tempfile::TempDir, SledBackend) {
    let dir = tempfile::tempdir().unwrap();
    let store = SledBackend::open(Some(dir.path())).unwrap();
    (dir, store)
}

fn auth_state(store: &SledBackend, token: Option<&str>) -> AuthState {
    match token.map(|t| store.authenticate(t)) {
        None | Some(Ok(None)) => AuthState::Anonymous,
        Some(Ok(Some(identity))) => AuthState::Authenticated {
            activated: identity.activated,
        },
        Some(Err(_)) => AuthState::Unavailable,
    }
}

#[test]
fn expired_premium_is_gated_as_free() {
    let (_dir, store) = open();
    let now = Utc::now();
    store.put_identity(&Identity::new("u1").activated()).unwrap();
    let mut profile = Profile::new("u1", "Jane", "jane", now);
    profile.tier = Tier::Premium;
    profile.tier_expires_at = Some(now - Duration::days(1));
    store.put_profile(&profile).unwrap();

    let session = store.issue_session("u1").unwrap();
    let guard = RouteGuard::default();
    assert_eq!(
        guard.decide("/dashboard/bio", &auth_state(&store, Some(&session))),
        GuardDecision::PassThrough
    );

    let tier = TierResolver::new(&store).resolve("u1", now).unwrap();
    assert_eq!(tier, Tier::Free);

    let state = FeatureState::Ready(FeatureGate::default().context(tier));
    assert!(!state.allows("ai_bio"));
    assert!(state.allows("vcard_download"));

    // The stored label is untouched.
    assert_eq!(store.profile("u1").unwrap().unwrap().tier, Tier::Premium);
}

#[test]
fn unknown_identity_resolves_to_free() {
    let (_dir, store) = open();
    let tier = TierResolver::new(&store).resolve("nobody", Utc::now()).unwrap();
    assert_eq!(tier, Tier::Free);
}

#[test]
fn stored_overrides_apply_once_loaded() {
    let (_dir, store) = open();
    let before = FeatureGate::new(store.feature_overrides().unwrap());
    assert!(!before.allows(Tier::Free, "ai_bio"));

    let mut table = store.feature_overrides().unwrap();
    table.set(Tier::Free, "ai_bio", true);
    store.put_feature_overrides(&table).unwrap();

    // A gate built earlier keeps its snapshot.
    assert!(!before.allows(Tier::Free, "ai_bio"));
    let after = FeatureGate::new(store.feature_overrides().unwrap());
    assert!(after.allows(Tier::Free, "ai_bio"));
}

#[test]
fn unactivated_session_is_sent_to_activate() {
    let (_dir, store) = open();
    store.put_identity(&Identity::new("u2")).unwrap();
    let session = store.issue_session("u2").unwrap();
    let guard = RouteGuard::default();
    assert_eq!(
        guard.decide("/dashboard/x", &auth_state(&store, Some(&session))),
        GuardDecision::Redirect("/activate")
    );
    assert_eq!(
        guard.decide("/dashboard/x", &auth_state(&store, None)),
        GuardDecision::Redirect("/login")
    );
}

#[test]
fn deleted_owner_frees_the_token() {
    let (_dir, store) = open();
    let now = Utc::now();
    store.put_identity(&Identity::new("u1").activated()).unwrap();
    store.put_token(&ClaimToken::unclaimed("GT-7")).unwrap();
    assert!(matches!(
        store.claim_serial("GT-7", "u1", now).unwrap(),
        ClaimOutcome::Claimed(_)
    ));

    assert!(store.delete_identity("u1").unwrap());

    let token = store.token("GT-7").unwrap().unwrap();
    assert!(token.owner_id.is_none());
    assert!(!token.claimed);
    assert!(matches!(
        store.claim_serial("GT-7", "u3", now).unwrap(),
        ClaimOutcome::Claimed(_)
    ));
}
