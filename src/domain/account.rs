//! Account lifecycle types: status, creation spec, update patch.

use serde::{Deserialize, Serialize};

use super::role::Role;

/// Account status as stored on the row.
///
/// `Deleted` is terminal and always paired with a `deleted_at` marker;
/// rows are never hard-deleted so ledger history stays intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "account_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    /// Normal operating state.
    Active,
    /// Temporarily disabled by an ancestor; may be re-activated.
    Inactive,
    /// Blocked for policy reasons; may be re-activated.
    Block,
    /// Soft-deleted; terminal.
    Deleted,
}

/// Specification for a new account, supplied by the creating ancestor.
#[derive(Clone, Deserialize)]
pub struct NewAccount {
    /// Unique login name.
    pub username: String,
    /// Plaintext password; hashed before storage, never persisted as-is.
    pub password: String,
    /// Role of the new account. Must be strictly below the creator's role.
    pub role: Role,
    /// Optional unique contact email.
    pub email: Option<String>,
    /// Optional display name.
    pub nickname: Option<String>,
}

impl std::fmt::Debug for NewAccount {
    // Keeps the plaintext password out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("email", &self.email)
            .field("nickname", &self.nickname)
            .finish()
    }
}

/// Partial update applied to an existing account by an ancestor.
///
/// `None` fields are left untouched. Password, role, parent and points are
/// deliberately absent: role and parent are immutable after creation, and
/// points only ever move inside the wallet engine's transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPatch {
    /// New contact email (uniqueness enforced).
    pub email: Option<String>,
    /// New display name.
    pub nickname: Option<String>,
    /// Whether the account may receive recharges.
    pub recharge_perm: Option<bool>,
    /// Whether the account may request withdrawals.
    pub withdraw_perm: Option<bool>,
    /// Whether the account's own subtree is hidden from sibling agents.
    pub agent_protect: Option<bool>,
}

impl AccountPatch {
    /// True when the patch carries no changes at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.nickname.is_none()
            && self.recharge_perm.is_none()
            && self.withdraw_perm.is_none()
            && self.agent_protect.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_debug_redacts_password() {
        let spec = NewAccount {
            username: "alice".into(),
            password: "hunter22".into(),
            role: Role::Store,
            email: None,
            nickname: None,
        };
        let printed = format!("{spec:?}");
        assert!(!printed.contains("hunter22"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn default_patch_is_empty() {
        assert!(AccountPatch::default().is_empty());
    }

    #[test]
    fn patch_with_any_field_is_not_empty() {
        let patch = AccountPatch {
            recharge_perm: Some(false),
            ..AccountPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
