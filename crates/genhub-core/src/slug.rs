//! Profile slugs: derived defaults, random suffixes and validation.

use crate::route_guard::is_reserved_segment;

const PREFIX_LEN: usize = 8;
pub const MIN_LEN: usize = 3;
pub const MAX_LEN: usize = 32;

/// First eight alphanumerics of the identity id, lower-cased.
pub fn identity_prefix(identity_id: &str) -> String {
    identity_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(PREFIX_LEN)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Default slug for a freshly claimed profile.
pub fn slug_for_identity(identity_id: &str) -> String {
    let prefix = identity_prefix(identity_id);
    if prefix.len() < MIN_LEN || is_reserved_segment(&prefix) {
        format!("user-{}", random_suffix(6))
    } else {
        prefix
    }
}

pub fn display_name_for_identity(identity_id: &str) -> String {
    format!("User {}", identity_prefix(identity_id))
}

/// Lower-case alphanumeric string of `len` characters.
pub fn random_suffix(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        let chunk = uuid::Uuid::new_v4().simple().to_string();
        out.extend(chunk.chars().take(len - out.len()));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    #[error("slug must be between 3 and 32 characters")]
    Length,
    #[error("slug may only contain lowercase letters, digits and '-'")]
    Charset,
    #[error("slug may not start or end with '-'")]
    Hyphen,
    #[error("slug '{0}' is reserved")]
    Reserved(String),
}

pub fn validate(slug: &str) -> Result<(), SlugError> {
    if slug.len() < MIN_LEN || slug.len() > MAX_LEN {
        return Err(SlugError::Length);
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(SlugError::Charset);
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(SlugError::Hyphen);
    }
    if is_reserved_segment(slug) {
        return Err(SlugError::Reserved(slug.to_string()));
    }
    Ok(())
}
