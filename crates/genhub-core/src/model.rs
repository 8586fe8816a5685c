//! Records as the gateway sees them. The system of record is the backend store;
//! these are the shapes it hands back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default theme key. Anything else counts as a custom theme.
pub const DEFAULT_THEME: &str = "default";

/// Account handle created by the auth provider. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub is_admin: bool,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            activated: false,
            is_admin: false,
        }
    }

    pub fn activated(mut self) -> Self {
        self.activated = true;
        self
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

/// Subscription level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    #[default]
    Free,
    Premium,
    B2b,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Premium, Tier::B2b];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "FREE",
            Tier::Premium => "PREMIUM",
            Tier::B2b => "B2B",
        }
    }

    /// Lenient parse used for stored labels: anything unrecognised is the base tier.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

/// Stored labels decode leniently: case-insensitive, unknown labels are FREE.
impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Tier::from_label(&label))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FREE" => Ok(Tier::Free),
            "PREMIUM" => Ok(Tier::Premium),
            "B2B" => Ok(Tier::B2b),
            _ => Err(UnknownTier(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier label: {0}")]
pub struct UnknownTier(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileLink {
    pub label: String,
    pub url: String,
}

/// Public profile, one per identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    pub slug: String,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub tier_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bio: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub links: Vec<ProfileLink>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

impl Profile {
    /// Fresh FREE profile with empty free-text fields.
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        slug: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            slug: slug.into(),
            tier: Tier::Free,
            tier_expires_at: None,
            bio: String::new(),
            theme: default_theme(),
            links: Vec::new(),
            phone: None,
            email: None,
            company: None,
            job_title: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Clears free-text, theme and contact fields. Tier and slug survive.
    pub fn clear_content(&mut self, now: DateTime<Utc>) {
        self.bio.clear();
        self.theme = default_theme();
        self.links.clear();
        self.phone = None;
        self.email = None;
        self.company = None;
        self.job_title = None;
        self.updated_at = now;
    }
}

/// Physical-device claim record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimToken {
    pub serial: String,
    #[serde(default)]
    pub claimed: bool,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_sync")]
    pub sync_enabled: bool,
}

fn default_sync() -> bool {
    true
}

impl ClaimToken {
    pub fn unclaimed(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            claimed: false,
            owner_id: None,
            claimed_at: None,
            sync_enabled: true,
        }
    }

    pub fn is_owned_by(&self, identity_id: &str) -> bool {
        self.owner_id.as_deref() == Some(identity_id)
    }

    /// Makes the token claimable again.
    pub fn release(&mut self) {
        self.claimed = false;
        self.owner_id = None;
        self.claimed_at = None;
        self.sync_enabled = true;
    }
}
