//! Sled-backed `Backend`. Bare metal, direct host filesystem.
//!
//! One tree per record kind, JSON values. Compound operations run as sled
//! multi-tree transactions so a half-applied delete or claim is never visible.
//! The `owned` tree indexes owner id -> claimed serials and is only written
//! inside the same transactions that change token ownership.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, Transactional, TransactionalTree};

use crate::backend::{Backend, ClaimOutcome, IdentityProvider, ResetSummary};
use crate::error::{StoreError, StoreResult};
use crate::features::OverrideTable;
use crate::model::{ClaimToken, Identity, Profile};

const DEFAULT_STORE_PATH: &str = "./data/genhub";
const OVERRIDES_KEY: &[u8] = b"overrides";

type TxError = ConflictableTransactionError<StoreError>;

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn tx_encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TxError> {
    encode(value).map_err(ConflictableTransactionError::Abort)
}

fn tx_decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TxError> {
    decode(bytes).map_err(ConflictableTransactionError::Abort)
}

pub struct SledBackend {
    _db: sled::Db,
    identities: sled::Tree,
    profiles: sled::Tree,
    slugs: sled::Tree,
    tokens: sled::Tree,
    owned: sled::Tree,
    sessions: sled::Tree,
    features: sled::Tree,
}

impl SledBackend {
    /// Open the store at the given path, or `./data/genhub`.
    pub fn open(path: Option<impl AsRef<Path>>) -> StoreResult<Self> {
        let p = path
            .map(|x| x.as_ref().to_path_buf())
            .unwrap_or_else(|| Path::new(DEFAULT_STORE_PATH).to_path_buf());
        let db = sled::open(p)?;
        let store = Self {
            identities: db.open_tree("identities")?,
            profiles: db.open_tree("profiles")?,
            slugs: db.open_tree("slugs")?,
            tokens: db.open_tree("tokens")?,
            owned: db.open_tree("owned")?,
            sessions: db.open_tree("sessions")?,
            features: db.open_tree("features")?,
            _db: db,
        };
        if store.owned.is_empty() && !store.tokens.is_empty() {
            store.rebuild_owner_index()?;
        }
        Ok(store)
    }

    /// Rebuilds the owner index from the token tree, for stores written
    /// before the index existed.
    fn rebuild_owner_index(&self) -> StoreResult<()> {
        let mut index: std::collections::BTreeMap<String, Vec<String>> = Default::default();
        for entry in self.tokens.iter() {
            let (_, raw) = entry?;
            let token: ClaimToken = decode(&raw)?;
            if let (true, Some(owner)) = (token.claimed, token.owner_id) {
                index.entry(owner).or_default().push(token.serial);
            }
        }
        for (owner, serials) in &index {
            self.owned.insert(owner.as_bytes(), encode(serials)?)?;
        }
        tracing::info!(owners = index.len(), "owner index rebuilt");
        Ok(())
    }

    /// Records a session token for an existing identity and returns it.
    pub fn issue_session(&self, identity_id: &str) -> StoreResult<String> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.as_bytes(), identity_id.as_bytes())?;
        Ok(token)
    }

    pub fn revoke_session(&self, token: &str) -> StoreResult<bool> {
        Ok(self.sessions.remove(token.as_bytes())?.is_some())
    }

    fn sessions_of(&self, identity_id: &str) -> StoreResult<Vec<sled::IVec>> {
        let mut keys = Vec::new();
        for entry in self.sessions.iter() {
            let (k, v) = entry?;
            if v.as_ref() == identity_id.as_bytes() {
                keys.push(k);
            }
        }
        Ok(keys)
    }

}

fn owned_serials(owned: &TransactionalTree, owner: &str) -> Result<Vec<String>, TxError> {
    match owned.get(owner.as_bytes())? {
        Some(raw) => tx_decode(&raw),
        None => Ok(Vec::new()),
    }
}

fn store_owned_serials(
    owned: &TransactionalTree,
    owner: &str,
    serials: &[String],
) -> Result<(), TxError> {
    if serials.is_empty() {
        owned.remove(owner.as_bytes())?;
    } else {
        owned.insert(owner.as_bytes(), tx_encode(&serials)?)?;
    }
    Ok(())
}

fn index_claim(owned: &TransactionalTree, owner: &str, serial: &str) -> Result<(), TxError> {
    let mut serials = owned_serials(owned, owner)?;
    if !serials.iter().any(|s| s == serial) {
        serials.push(serial.to_string());
        store_owned_serials(owned, owner, &serials)?;
    }
    Ok(())
}

fn unindex_claim(owned: &TransactionalTree, owner: &str, serial: &str) -> Result<(), TxError> {
    let mut serials = owned_serials(owned, owner)?;
    let before = serials.len();
    serials.retain(|s| s != serial);
    if serials.len() != before {
        store_owned_serials(owned, owner, &serials)?;
    }
    Ok(())
}

/// Releases every token the identity owns and drops its index entry.
/// Reads the index inside the transaction, so a claim that commits first is
/// seen and one that commits later conflicts and retries.
fn release_in_tx(
    tokens: &TransactionalTree,
    owned: &TransactionalTree,
    identity_id: &str,
) -> Result<usize, TxError> {
    let mut released = 0;
    for serial in owned_serials(owned, identity_id)? {
        let Some(raw) = tokens.get(serial.as_bytes())? else {
            continue;
        };
        let mut token: ClaimToken = tx_decode(&raw)?;
        if !token.is_owned_by(identity_id) {
            continue;
        }
        token.release();
        tokens.insert(serial.as_bytes(), tx_encode(&token)?)?;
        released += 1;
    }
    owned.remove(identity_id.as_bytes())?;
    Ok(released)
}

impl Backend for SledBackend {
    fn identity(&self, id: &str) -> StoreResult<Option<Identity>> {
        self.identities
            .get(id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    fn put_identity(&self, identity: &Identity) -> StoreResult<()> {
        self.identities
            .insert(identity.id.as_bytes(), encode(identity)?)?;
        Ok(())
    }

    fn profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        self.profiles
            .get(user_id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    fn profile_by_slug(&self, slug: &str) -> StoreResult<Option<Profile>> {
        let key = slug.to_ascii_lowercase();
        match self.slugs.get(key.as_bytes())? {
            Some(owner) => {
                let owner = String::from_utf8_lossy(&owner).into_owned();
                self.profile(&owner)
            }
            None => Ok(None),
        }
    }

    fn put_profile(&self, profile: &Profile) -> StoreResult<bool> {
        let slug_key = profile.slug.to_ascii_lowercase();
        let value = encode(profile)?;
        let written = (&self.profiles, &self.slugs).transaction(|(profiles, slugs)| {
            if let Some(owner) = slugs.get(slug_key.as_bytes())? {
                if owner.as_ref() != profile.user_id.as_bytes() {
                    return Ok(false);
                }
            }
            if let Some(previous) = profiles.get(profile.user_id.as_bytes())? {
                let previous: Profile = tx_decode(&previous)?;
                let previous_key = previous.slug.to_ascii_lowercase();
                if previous_key != slug_key {
                    slugs.remove(previous_key.as_bytes())?;
                }
            }
            slugs.insert(slug_key.as_bytes(), profile.user_id.as_bytes())?;
            profiles.insert(profile.user_id.as_bytes(), value.clone())?;
            Ok(true)
        })?;
        Ok(written)
    }

    fn token(&self, serial: &str) -> StoreResult<Option<ClaimToken>> {
        self.tokens
            .get(serial.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    fn put_token(&self, token: &ClaimToken) -> StoreResult<()> {
        let value = encode(token)?;
        let serial = token.serial.as_str();
        (&self.tokens, &self.owned).transaction(|(tokens, owned)| {
            if let Some(raw) = tokens.get(serial.as_bytes())? {
                let previous: ClaimToken = tx_decode(&raw)?;
                if let (true, Some(owner)) = (previous.claimed, previous.owner_id.as_deref()) {
                    unindex_claim(owned, owner, serial)?;
                }
            }
            if let (true, Some(owner)) = (token.claimed, token.owner_id.as_deref()) {
                index_claim(owned, owner, serial)?;
            }
            tokens.insert(serial.as_bytes(), value.clone())?;
            Ok(())
        })?;
        Ok(())
    }

    fn tokens_owned_by(&self, identity_id: &str) -> StoreResult<Vec<ClaimToken>> {
        let serials: Vec<String> = match self.owned.get(identity_id.as_bytes())? {
            Some(raw) => decode(&raw)?,
            None => return Ok(Vec::new()),
        };
        let mut owned = Vec::new();
        for serial in serials {
            if let Some(token) = self.token(&serial)? {
                if token.is_owned_by(identity_id) {
                    owned.push(token);
                }
            }
        }
        Ok(owned)
    }

    fn claim_serial(
        &self,
        serial: &str,
        identity_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        let outcome = (&self.tokens, &self.owned).transaction(|(tokens, owned)| {
            let Some(raw) = tokens.get(serial.as_bytes())? else {
                return Ok(ClaimOutcome::NotFound);
            };
            let mut token: ClaimToken = tx_decode(&raw)?;
            if token.claimed {
                return Ok(if token.is_owned_by(identity_id) {
                    ClaimOutcome::AlreadyOwned(token)
                } else {
                    ClaimOutcome::ClaimedByOther
                });
            }
            token.claimed = true;
            token.owner_id = Some(identity_id.to_string());
            token.claimed_at = Some(now);
            token.sync_enabled = true;
            tokens.insert(serial.as_bytes(), tx_encode(&token)?)?;
            index_claim(owned, identity_id, serial)?;
            Ok(ClaimOutcome::Claimed(token))
        })?;
        Ok(outcome)
    }

    fn delete_identity(&self, id: &str) -> StoreResult<bool> {
        let sessions = self.sessions_of(id)?;
        let released = (
            &self.identities,
            &self.profiles,
            &self.slugs,
            &self.tokens,
            &self.owned,
            &self.sessions,
        )
            .transaction(|(identities, profiles, slugs, tokens, owned, session_tree)| {
                if identities.remove(id.as_bytes())?.is_none() {
                    return Ok(None);
                }
                if let Some(raw) = profiles.remove(id.as_bytes())? {
                    let profile: Profile = tx_decode(&raw)?;
                    let slug_key = profile.slug.to_ascii_lowercase();
                    if slugs.get(slug_key.as_bytes())?.as_deref() == Some(id.as_bytes()) {
                        slugs.remove(slug_key.as_bytes())?;
                    }
                }
                let released = release_in_tx(tokens, owned, id)?;
                for key in &sessions {
                    session_tree.remove(key)?;
                }
                Ok(Some(released))
            })?;
        if let Some(released) = released {
            tracing::info!(identity = id, released, "identity deleted");
        }
        Ok(released.is_some())
    }

    fn reset_identity(&self, id: &str, now: DateTime<Utc>) -> StoreResult<Option<ResetSummary>> {
        let summary = (&self.profiles, &self.tokens, &self.owned).transaction(
            |(profiles, tokens, owned)| {
                let Some(raw) = profiles.get(id.as_bytes())? else {
                    return Ok(None);
                };
                let mut profile: Profile = tx_decode(&raw)?;
                profile.clear_content(now);
                profiles.insert(id.as_bytes(), tx_encode(&profile)?)?;
                let released_tokens = release_in_tx(tokens, owned, id)?;
                Ok(Some(ResetSummary {
                    profile,
                    released_tokens,
                }))
            },
        )?;
        Ok(summary)
    }

    fn set_sync_for_owner(&self, identity_id: &str, enabled: bool) -> StoreResult<usize> {
        let updated = (&self.tokens, &self.owned).transaction(|(tokens, owned)| {
            let mut updated = 0;
            for serial in owned_serials(owned, identity_id)? {
                let Some(raw) = tokens.get(serial.as_bytes())? else {
                    continue;
                };
                let mut token: ClaimToken = tx_decode(&raw)?;
                if !token.is_owned_by(identity_id) {
                    continue;
                }
                token.sync_enabled = enabled;
                tokens.insert(serial.as_bytes(), tx_encode(&token)?)?;
                updated += 1;
            }
            Ok(updated)
        })?;
        Ok(updated)
    }

    fn feature_overrides(&self) -> StoreResult<OverrideTable> {
        match self.features.get(OVERRIDES_KEY)? {
            Some(raw) => decode(&raw),
            None => Ok(OverrideTable::new()),
        }
    }

    fn put_feature_overrides(&self, table: &OverrideTable) -> StoreResult<()> {
        self.features.insert(OVERRIDES_KEY, encode(table)?)?;
        Ok(())
    }
}

impl IdentityProvider for SledBackend {
    fn authenticate(&self, token: &str) -> StoreResult<Option<Identity>> {
        match self.sessions.get(token.as_bytes())? {
            Some(owner) => {
                let owner = String::from_utf8_lossy(&owner).into_owned();
                self.identity(&owner)
            }
            None => Ok(None),
        }
    }
}
