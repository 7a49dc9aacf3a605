//! Owner context for ownership-scoped database operations
//!
//! Every read and write of a thing or channel is scoped by the owner claim the
//! caller presents. The claim is authenticated upstream; here it is only
//! compared against the owner recorded on the row.

use std::time::{Duration, Instant};

use crate::error::ThingsError;

/// Owner claim passed to all scoped database operations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerContext {
    /// Account identifier of the caller
    pub owner: String,
    /// Calls made with this context fail with `Cancelled` past this instant
    pub deadline: Option<Instant>,
}

impl OwnerContext {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

impl std::fmt::Display for OwnerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OwnerContext({})", self.owner)
    }
}

/// Ownership guard.
///
/// `record_owner` is the owner stored on the row, or `None` when no row
/// exists. A missing row and a row owned by someone else produce the same
/// error, down to the message.
pub fn authorize(
    ctx: &OwnerContext,
    record_owner: Option<&str>,
    kind: &str,
    id: &str,
) -> Result<(), ThingsError> {
    match record_owner {
        Some(owner) if !ctx.owner.is_empty() && owner == ctx.owner => Ok(()),
        _ => Err(not_found(kind, id)),
    }
}

/// The single error for "no qualifying row", whatever the reason
pub fn not_found(kind: &str, id: &str) -> ThingsError {
    ThingsError::NotFound(format!("{} {}", kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_matching_owner() {
        let ctx = OwnerContext::new("alice@example.com");
        assert!(authorize(&ctx, Some("alice@example.com"), "thing", "t1").is_ok());
    }

    #[test]
    fn test_wrong_owner_looks_like_missing() {
        let ctx = OwnerContext::new("alice@example.com");

        let wrong = authorize(&ctx, Some("bob@example.com"), "thing", "t1").unwrap_err();
        let missing = authorize(&ctx, None, "thing", "t1").unwrap_err();

        assert!(wrong.is_not_found());
        assert_eq!(wrong.to_string(), missing.to_string());
    }

    #[test]
    fn test_empty_claim_never_authorizes() {
        let ctx = OwnerContext::new("");
        assert!(authorize(&ctx, Some(""), "channel", "c1").is_err());
    }
}
