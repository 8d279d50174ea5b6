//! Type-safe account identifier.
//!
//! [`AccountId`] is a newtype wrapper around [`uuid::Uuid`] (v4) providing
//! type safety so that account identifiers cannot be confused with other
//! UUIDs (wallet ids, ledger row ids, idempotency keys).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for an account in the reseller hierarchy.
///
/// Wraps a UUID v4. Generated once at account creation time and immutable
/// thereafter. Used as the parent pointer in the hierarchy, the wallet
/// owner reference, and the subject of every ledger entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AccountId(uuid::Uuid);

impl AccountId {
    /// Creates a new random `AccountId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates an `AccountId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for AccountId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AccountId> for uuid::Uuid {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        let a = AccountId::new();
        let b = AccountId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_uuid_format() {
        let id = AccountId::new();
        let s = format!("{id}");
        assert_eq!(s.len(), 36);
        assert!(s.contains('-'));
    }

    #[test]
    fn ordering_is_total() {
        let a = AccountId::new();
        let b = AccountId::new();
        let lo = a.min(b);
        let hi = a.max(b);
        assert!(lo <= hi);
        assert_eq!(a <= b, !(b < a));
    }

    #[test]
    fn serde_round_trip() {
        let id = AccountId::new();
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        let Ok(back) = serde_json::from_str::<AccountId>(&json) else {
            panic!("deserialization failed");
        };
        assert_eq!(id, back);
    }
}
