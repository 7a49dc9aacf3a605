//! Syntactic validation of entities
//!
//! Runs before any store interaction, so a rejected batch never opens a
//! transaction.

use uuid::Uuid;

use crate::db::models::Metadata;
use crate::error::ThingsError;

/// Default maximum name length in characters
pub const MAX_NAME_LEN: usize = 1024;

/// Lowercase hyphenated form of `id`, `None` unless it is a hyphenated UUID.
///
/// Every id is stored and looked up in this form, so one UUID written in
/// different letter cases is one entity.
pub fn canonical_id(id: &str) -> Option<String> {
    if id.len() != 36 {
        return None;
    }
    Uuid::try_parse(id).ok().map(|uuid| uuid.hyphenated().to_string())
}

/// True when `id` is a hyphenated UUID
pub fn is_valid_id(id: &str) -> bool {
    canonical_id(id).is_some()
}

/// Canonical form of an id supplied for a write; `MalformedEntity` otherwise
pub fn validate_id(kind: &str, id: &str) -> Result<String, ThingsError> {
    canonical_id(id).ok_or_else(|| {
        ThingsError::MalformedEntity(format!("{} id '{}' is not a valid UUID", kind, id))
    })
}

/// A present name must be non-empty and at most `max_len` characters.
pub fn validate_name(kind: &str, name: Option<&str>, max_len: usize) -> Result<(), ThingsError> {
    let Some(name) = name else {
        return Ok(());
    };

    if name.is_empty() {
        return Err(ThingsError::MalformedEntity(format!("{} name is empty", kind)));
    }

    let len = name.chars().count();
    if len > max_len {
        return Err(ThingsError::MalformedEntity(format!(
            "{} name is {} characters, limit is {}",
            kind, len, max_len
        )));
    }

    Ok(())
}

/// Metadata keys must be non-empty.
pub fn validate_metadata(kind: &str, metadata: Option<&Metadata>) -> Result<(), ThingsError> {
    if let Some(metadata) = metadata {
        if metadata.keys().any(|k| k.is_empty()) {
            return Err(ThingsError::MalformedEntity(format!(
                "{} metadata contains an empty key",
                kind
            )));
        }
    }
    Ok(())
}

/// A present thing key must be non-empty.
pub fn validate_key(key: Option<&str>) -> Result<(), ThingsError> {
    match key {
        Some("") => Err(ThingsError::MalformedEntity("thing key is empty".into())),
        _ => Ok(()),
    }
}
