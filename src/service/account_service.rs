//! Account lifecycle manager: create, update, status, soft-delete.
//!
//! Every mutation is gated by the two-policy role model
//! ([`Role::can_create`] for creation, membership for management) and by
//! the membership oracle; admins bypass the membership check but never
//! the role rules. Accounts are never hard-deleted.

use std::sync::Arc;

use crate::cache::{CacheInvalidator, EntityKind};
use crate::domain::{AccountId, AccountPatch, AccountStatus, NewAccount, Role};
use crate::error::CoreError;
use crate::persistence::PostgresStore;
use crate::persistence::models::{Account, AccountSummary, InsertAccount};
use crate::service::hierarchy::HierarchyService;
use crate::service::password;

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 6;

/// Orchestration layer for account lifecycle operations.
#[derive(Debug, Clone)]
pub struct AccountService {
    store: PostgresStore,
    hierarchy: HierarchyService<PostgresStore>,
    cache: Arc<dyn CacheInvalidator>,
}

impl AccountService {
    /// Creates a new `AccountService`.
    #[must_use]
    pub fn new(
        store: PostgresStore,
        hierarchy: HierarchyService<PostgresStore>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            store,
            hierarchy,
            cache,
        }
    }

    /// One-time bootstrap of the hierarchy root: creates the first admin
    /// account with no parent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conflict`] when an admin already exists,
    /// [`CoreError::Validation`] on bad credentials, or another
    /// [`CoreError`] on database failure.
    pub async fn seed_admin(
        &self,
        username: &str,
        plain_password: &str,
    ) -> Result<AccountSummary, CoreError> {
        validate_credentials(username, plain_password)?;
        if self.store.admin_exists().await? {
            return Err(CoreError::Conflict("admin root already exists".into()));
        }

        let id = AccountId::new();
        let spec = InsertAccount {
            id,
            username: username.trim().to_string(),
            password_hash: password::hash_password(plain_password)?,
            email: None,
            nickname: None,
            role: Role::Admin,
            parent_id: None,
        };
        let account = self.store.create_account(id, &spec).await?;
        self.cache.invalidate(EntityKind::Account);
        tracing::info!(admin = %account.id, "admin root seeded");
        Ok(AccountSummary::from(&account))
    }

    /// Creates a new account under the acting account.
    ///
    /// The creator becomes the parent; the new role must be strictly
    /// below the creator's ([`Role::can_create`], the total-order rule —
    /// deliberately looser than the transfer adjacency rule).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] on malformed input,
    /// [`CoreError::PermissionDenied`] when the role rule fails,
    /// [`CoreError::Conflict`] on duplicate username/email, or another
    /// [`CoreError`] on database failure.
    pub async fn create(
        &self,
        actor_id: AccountId,
        new_account: &NewAccount,
    ) -> Result<AccountSummary, CoreError> {
        let actor = self.require_actor(actor_id).await?;
        validate_credentials(&new_account.username, &new_account.password)?;

        if !actor.role.can_create(new_account.role) {
            return Err(CoreError::PermissionDenied(format!(
                "{} may not create {} accounts",
                actor.role, new_account.role
            )));
        }

        if self
            .store
            .identity_taken(new_account.username.trim(), new_account.email.as_deref())
            .await?
        {
            return Err(CoreError::Conflict(
                "username or email already in use".into(),
            ));
        }

        let id = AccountId::new();
        let spec = InsertAccount {
            id,
            username: new_account.username.trim().to_string(),
            password_hash: password::hash_password(&new_account.password)?,
            email: new_account.email.clone(),
            nickname: new_account.nickname.clone(),
            role: new_account.role,
            parent_id: Some(actor.id),
        };
        let account = self.store.create_account(actor.id, &spec).await?;
        self.cache.invalidate(EntityKind::Account);
        tracing::info!(
            actor = %actor.id,
            account = %account.id,
            role = %account.role,
            "account created"
        );
        Ok(AccountSummary::from(&account))
    }

    /// Verifies a username/password pair and returns the account when the
    /// credentials match and the account is active.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unauthorized`] on unknown username, wrong
    /// password or inactive account, or another [`CoreError`] on database
    /// failure.
    pub async fn verify_credentials(
        &self,
        username: &str,
        plain_password: &str,
    ) -> Result<AccountSummary, CoreError> {
        let Some(account) = self.store.fetch_by_username(username).await? else {
            return Err(CoreError::Unauthorized("unknown credentials".into()));
        };
        if !password::verify_password(plain_password, &account.password_hash)? {
            return Err(CoreError::Unauthorized("unknown credentials".into()));
        }
        if !account.is_active {
            return Err(CoreError::Unauthorized("account is not active".into()));
        }
        Ok(AccountSummary::from(&account))
    }

    /// Applies a management patch to a descendant account.
    ///
    /// Non-admin actors may not use this path on themselves (protected
    /// fields such as permission flags must come from an ancestor);
    /// self-service profile edits go through [`Self::update_profile`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] on an empty patch,
    /// [`CoreError::PermissionDenied`] on a hierarchy violation,
    /// [`CoreError::AccountNotFound`] when the target is missing, or
    /// another [`CoreError`] on database failure.
    pub async fn update(
        &self,
        actor_id: AccountId,
        target_id: AccountId,
        patch: &AccountPatch,
    ) -> Result<AccountSummary, CoreError> {
        if patch.is_empty() {
            return Err(CoreError::Validation("empty update".into()));
        }
        let actor = self.require_actor(actor_id).await?;
        let target = self.require_target(target_id).await?;
        if actor.role != Role::Admin && actor.id == target.id {
            return Err(CoreError::PermissionDenied(
                "protected fields may only be changed by an ancestor".into(),
            ));
        }
        self.authorize_manage(&actor, target.id).await?;

        let account = self.store.update_account(actor.id, target.id, patch).await?;
        self.cache.invalidate(EntityKind::Account);
        Ok(AccountSummary::from(&account))
    }

    /// Self-service profile update: email and nickname only.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when neither field is given,
    /// [`CoreError::Unauthorized`] when the actor is missing or inactive,
    /// or another [`CoreError`] on database failure.
    pub async fn update_profile(
        &self,
        actor_id: AccountId,
        email: Option<String>,
        nickname: Option<String>,
    ) -> Result<AccountSummary, CoreError> {
        if email.is_none() && nickname.is_none() {
            return Err(CoreError::Validation("empty update".into()));
        }
        let actor = self.require_actor(actor_id).await?;
        let patch = AccountPatch {
            email,
            nickname,
            ..AccountPatch::default()
        };
        let account = self.store.update_account(actor.id, actor.id, &patch).await?;
        self.cache.invalidate(EntityKind::Account);
        Ok(AccountSummary::from(&account))
    }

    /// Sets the lifecycle status of a descendant account.
    ///
    /// Admin accounts can never be deactivated or blocked, by anyone.
    /// Soft deletion has its own operation; `Deleted` is rejected here.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for status `Deleted`,
    /// [`CoreError::PermissionDenied`] for an admin target or hierarchy
    /// violation, [`CoreError::AccountNotFound`] when the target is
    /// missing, or another [`CoreError`] on database failure.
    pub async fn toggle_status(
        &self,
        actor_id: AccountId,
        target_id: AccountId,
        status: AccountStatus,
    ) -> Result<AccountSummary, CoreError> {
        if status == AccountStatus::Deleted {
            return Err(CoreError::Validation(
                "use soft_delete to delete an account".into(),
            ));
        }
        let actor = self.require_actor(actor_id).await?;
        let target = self.require_target(target_id).await?;
        if target.role == Role::Admin {
            return Err(CoreError::PermissionDenied(
                "admin accounts cannot be deactivated".into(),
            ));
        }
        if actor.role != Role::Admin && actor.id == target_id {
            return Err(CoreError::PermissionDenied(
                "status may only be changed by an ancestor".into(),
            ));
        }
        self.authorize_manage(&actor, target_id).await?;

        let account = self.store.set_status(actor.id, target_id, status).await?;
        self.cache.invalidate(EntityKind::Account);
        tracing::info!(actor = %actor.id, target = %target_id, ?status, "status changed");
        Ok(AccountSummary::from(&account))
    }

    /// Soft-deletes a descendant account: sets the `deleted_at` marker
    /// and status `Deleted`. Admin accounts can never be deleted.
    /// Descendants, wallets and ledger history are retained.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PermissionDenied`] for an admin target or
    /// hierarchy violation, [`CoreError::AccountNotFound`] when the
    /// target is missing, or another [`CoreError`] on database failure.
    pub async fn soft_delete(
        &self,
        actor_id: AccountId,
        target_id: AccountId,
    ) -> Result<AccountSummary, CoreError> {
        let actor = self.require_actor(actor_id).await?;
        let target = self.require_target(target_id).await?;
        if target.role == Role::Admin {
            return Err(CoreError::PermissionDenied(
                "admin accounts cannot be deleted".into(),
            ));
        }
        self.authorize_manage(&actor, target_id).await?;

        let account = self.store.soft_delete(actor.id, target_id).await?;
        self.cache.invalidate(EntityKind::Account);
        tracing::info!(actor = %actor.id, target = %target_id, "account soft-deleted");
        Ok(AccountSummary::from(&account))
    }

    /// Fetches a live account, mapping absence to `Unauthorized` (the
    /// actor's identity is the thing in question) and rejecting inactive
    /// actors.
    pub(crate) async fn require_actor(&self, actor_id: AccountId) -> Result<Account, CoreError> {
        let Some(actor) = self.store.fetch_account(actor_id).await? else {
            return Err(CoreError::Unauthorized("unknown actor".into()));
        };
        if !actor.is_active {
            return Err(CoreError::Unauthorized("actor is not active".into()));
        }
        Ok(actor)
    }

    /// Fetches a live target account, mapping absence to `AccountNotFound`.
    async fn require_target(&self, target_id: AccountId) -> Result<Account, CoreError> {
        self.store
            .fetch_account(target_id)
            .await?
            .ok_or(CoreError::AccountNotFound(*target_id.as_uuid()))
    }

    /// Admin reaches everything; everyone else only their own subtree.
    async fn authorize_manage(
        &self,
        actor: &Account,
        target_id: AccountId,
    ) -> Result<(), CoreError> {
        if actor.role == Role::Admin {
            return Ok(());
        }
        if self.hierarchy.is_descendant(actor.id, target_id).await? {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied(
                "target is outside your hierarchy".into(),
            ))
        }
    }
}

/// Shared username/password shape checks.
fn validate_credentials(username: &str, plain_password: &str) -> Result<(), CoreError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(CoreError::Validation("username is required".into()));
    }
    if username.len() > 64 {
        return Err(CoreError::Validation("username too long".into()));
    }
    if plain_password.len() < MIN_PASSWORD_LEN {
        return Err(CoreError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_username_and_password_length() {
        assert!(validate_credentials("alice", "longenough").is_ok());
        assert!(validate_credentials("", "longenough").is_err());
        assert!(validate_credentials("   ", "longenough").is_err());
        assert!(validate_credentials("alice", "short").is_err());
        assert!(validate_credentials(&"x".repeat(65), "longenough").is_err());
    }
}
