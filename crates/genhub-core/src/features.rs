//! Feature Gate: tier → capability lookup with a runtime override table.
//!
//! The static table is compiled in. An override table can be stored in the
//! backend; the gateway loads it once at start and never refreshes it, so a
//! change there is picked up on the next restart.
//!
//! | capability           | FREE | PREMIUM | B2B |
//! |----------------------|------|---------|-----|
//! | basic_analytics      | ✓    | ✓       | ✓   |
//! | vcard_download       | ✓    | ✓       | ✓   |
//! | ai_bio               |      | ✓       | ✓   |
//! | deep_analytics       |      | ✓       | ✓   |
//! | custom_theme         |      | ✓       | ✓   |
//! | remove_branding      |      | ✓       | ✓   |
//! | corporate_dashboard  |      |         | ✓   |
//! | bulk_management      |      |         | ✓   |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::model::Tier;

/// Known capability names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BasicAnalytics,
    VcardDownload,
    AiBio,
    DeepAnalytics,
    CustomTheme,
    RemoveBranding,
    CorporateDashboard,
    BulkManagement,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::BasicAnalytics,
        Capability::VcardDownload,
        Capability::AiBio,
        Capability::DeepAnalytics,
        Capability::CustomTheme,
        Capability::RemoveBranding,
        Capability::CorporateDashboard,
        Capability::BulkManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::BasicAnalytics => "basic_analytics",
            Capability::VcardDownload => "vcard_download",
            Capability::AiBio => "ai_bio",
            Capability::DeepAnalytics => "deep_analytics",
            Capability::CustomTheme => "custom_theme",
            Capability::RemoveBranding => "remove_branding",
            Capability::CorporateDashboard => "corporate_dashboard",
            Capability::BulkManagement => "bulk_management",
        }
    }
}

/// Capabilities granted by the compiled-in table.
fn static_grants(tier: Tier) -> &'static [Capability] {
    use Capability::*;
    match tier {
        Tier::Free => &[BasicAnalytics, VcardDownload],
        Tier::Premium => &[
            BasicAnalytics,
            VcardDownload,
            AiBio,
            DeepAnalytics,
            CustomTheme,
            RemoveBranding,
        ],
        Tier::B2b => &Capability::ALL,
    }
}

/// Static lookup by name. Unknown names are false.
pub fn static_allows(tier: Tier, capability: &str) -> bool {
    static_grants(tier).iter().any(|c| c.as_str() == capability)
}

/// Runtime overrides: tier → capability name → flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideTable(HashMap<Tier, HashMap<String, bool>>);

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, tier: Tier, capability: impl Into<String>, enabled: bool) {
        self.0.entry(tier).or_default().insert(capability.into(), enabled);
    }

    pub fn get(&self, tier: Tier, capability: &str) -> Option<bool> {
        self.0.get(&tier).and_then(|caps| caps.get(capability)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|caps| caps.is_empty())
    }

    fn names_for(&self, tier: Tier) -> impl Iterator<Item = &String> {
        self.0.get(&tier).into_iter().flat_map(|caps| caps.keys())
    }
}

/// Answers "may tier T use capability C".
#[derive(Debug, Clone, Default)]
pub struct FeatureGate {
    overrides: OverrideTable,
}

impl FeatureGate {
    pub fn new(overrides: OverrideTable) -> Self {
        Self { overrides }
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    /// A truthy override grants; otherwise the static table decides.
    /// Unknown capabilities are false.
    pub fn allows(&self, tier: Tier, capability: &str) -> bool {
        match self.overrides.get(tier, capability) {
            Some(true) => true,
            _ => static_allows(tier, capability),
        }
    }

    /// Resolved context for one session.
    pub fn context(&self, tier: Tier) -> FeatureContext {
        let mut flags: BTreeMap<String, bool> = Capability::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), self.allows(tier, c.as_str())))
            .collect();
        for name in self.overrides.names_for(tier) {
            flags.insert(name.clone(), self.allows(tier, name));
        }
        FeatureContext { tier, flags }
    }
}

/// Capability flags for one resolved tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureContext {
    tier: Tier,
    flags: BTreeMap<String, bool>,
}

impl FeatureContext {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn allows(&self, capability: &str) -> bool {
        self.flags.get(capability).copied().unwrap_or(false)
    }

    pub fn snapshot(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Tier not resolved yet.
    Unknown,
    Denied,
    Granted,
}

/// Gating state as seen by a consumer: still loading, or resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeatureState {
    #[default]
    Loading,
    Ready(FeatureContext),
}

impl FeatureState {
    pub fn availability(&self, capability: &str) -> Availability {
        match self {
            FeatureState::Loading => Availability::Unknown,
            FeatureState::Ready(ctx) if ctx.allows(capability) => Availability::Granted,
            FeatureState::Ready(_) => Availability::Denied,
        }
    }

    /// Never true while loading.
    pub fn allows(&self, capability: &str) -> bool {
        self.availability(capability) == Availability::Granted
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            FeatureState::Loading => None,
            FeatureState::Ready(ctx) => Some(ctx.tier()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_table_matches_tiers() {
        let gate = FeatureGate::default();
        assert!(!gate.allows(Tier::Free, "ai_bio"));
        assert!(gate.allows(Tier::Free, "vcard_download"));
        assert!(gate.allows(Tier::Premium, "ai_bio"));
        assert!(!gate.allows(Tier::Premium, "corporate_dashboard"));
        assert!(gate.allows(Tier::B2b, "corporate_dashboard"));
    }

    #[test]
    fn capabilities_outside_the_table_are_false() {
        let gate = FeatureGate::default();
        for tier in Tier::ALL {
            assert!(!gate.allows(tier, "teleportation"));
            assert!(!gate.allows(tier, ""));
            for cap in Capability::ALL {
                if !static_grants(tier).contains(&cap) {
                    assert!(!gate.allows(tier, cap.as_str()), "{tier} {}", cap.as_str());
                }
            }
        }
    }

    #[test]
    fn truthy_overrides_grant_and_false_falls_back() {
        let mut table = OverrideTable::new();
        table.set(Tier::Free, "ai_bio", true);
        table.set(Tier::Premium, "deep_analytics", false);
        table.set(Tier::Free, "beta_widgets", true);
        let gate = FeatureGate::new(table);

        assert!(gate.allows(Tier::Free, "ai_bio"));
        // A false override cannot take away a statically granted capability.
        assert!(gate.allows(Tier::Premium, "deep_analytics"));
        assert!(gate.allows(Tier::Free, "beta_widgets"));
        // Not named in the override: static table still decides.
        assert!(gate.allows(Tier::Premium, "custom_theme"));
        assert!(!gate.allows(Tier::Free, "custom_theme"));
    }

    #[test]
    fn context_snapshot_includes_override_only_names() {
        let mut table = OverrideTable::new();
        table.set(Tier::B2b, "sso", true);
        let ctx = FeatureGate::new(table).context(Tier::B2b);
        assert_eq!(ctx.tier(), Tier::B2b);
        assert_eq!(ctx.snapshot().get("sso"), Some(&true));
        assert_eq!(ctx.snapshot().get("ai_bio"), Some(&true));
    }

    #[test]
    fn loading_state_never_grants() {
        let state = FeatureState::Loading;
        for cap in Capability::ALL {
            assert_eq!(state.availability(cap.as_str()), Availability::Unknown);
            assert!(!state.allows(cap.as_str()));
        }
        assert_eq!(state.tier(), None);
    }

    #[test]
    fn ready_state_answers_from_context() {
        let state = FeatureState::Ready(FeatureGate::default().context(Tier::Premium));
        assert_eq!(state.availability("ai_bio"), Availability::Granted);
        assert_eq!(state.availability("corporate_dashboard"), Availability::Denied);
        assert_eq!(state.tier(), Some(Tier::Premium));
    }

    #[test]
    fn override_table_serializes_by_tier_label() {
        let mut table = OverrideTable::new();
        table.set(Tier::Premium, "ai_bio", false);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["PREMIUM"]["ai_bio"], false);
        let back: OverrideTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
