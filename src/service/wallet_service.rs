//! Wallet ledger engine: admin self-load, coin transfers, listings.
//!
//! All policy checks (amount, role adjacency, hierarchy membership)
//! happen here, before any mutation; the store then executes the
//! multi-row effect as one transaction with the sender balance
//! re-validated under a row lock. The whole transaction is retried a
//! bounded number of times, only for transient store failures, never for
//! business-rule rejections.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::cache::{CacheInvalidator, EntityKind};
use crate::config::CoreConfig;
use crate::domain::{AccountId, Page, Paginated, Role};
use crate::error::CoreError;
use crate::persistence::PostgresStore;
use crate::persistence::models::{
    Account, LedgerEntryWithCounterparty, LoadOutcome, TransferOutcome,
};
use crate::service::hierarchy::HierarchyService;

/// Orchestration layer for all wallet and ledger operations.
#[derive(Debug, Clone)]
pub struct WalletService {
    store: PostgresStore,
    hierarchy: HierarchyService<PostgresStore>,
    cache: Arc<dyn CacheInvalidator>,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl WalletService {
    /// Creates a new `WalletService` with retry policy from `config`.
    #[must_use]
    pub fn new(
        store: PostgresStore,
        hierarchy: HierarchyService<PostgresStore>,
        cache: Arc<dyn CacheInvalidator>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            store,
            hierarchy,
            cache,
            retry_attempts: config.transient_retry_attempts.max(1),
            retry_backoff: Duration::from_millis(config.transient_retry_backoff_ms),
        }
    }

    /// Admin self-load: credits the acting admin's own wallet. Models
    /// external fiat/crypto inflow converted to coins; there is no
    /// counterpart debit.
    ///
    /// A repeated call with the same `idempotency_key` returns the stored
    /// result of the original execution without moving coins again.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAmount`] for a non-positive amount,
    /// [`CoreError::Unauthorized`] when the actor is missing, inactive or
    /// not an admin, or another [`CoreError`] on store failure.
    pub async fn load_self(
        &self,
        actor_id: AccountId,
        amount: Decimal,
        idempotency_key: Option<Uuid>,
    ) -> Result<LoadOutcome, CoreError> {
        require_positive(amount)?;
        let actor = self.require_actor(actor_id).await?;
        if actor.role != Role::Admin {
            return Err(CoreError::Unauthorized("admin role required".into()));
        }

        if let Some(stored) = self.replay("load_self", idempotency_key).await? {
            return Ok(stored);
        }

        let result = self
            .with_retries(|| self.store.load_admin_wallet(actor.id, amount, idempotency_key))
            .await;
        let outcome = self.settle("load_self", idempotency_key, result).await?;

        self.invalidate_money();
        Ok(outcome)
    }

    /// Moves coins from the actor's wallet to a target wallet.
    ///
    /// Preconditions, checked before any mutation: positive amount; both
    /// accounts exist and are live; for non-admin senders the target lies
    /// in the sender's subtree; the adjacency rule [`Role::can_assign`]
    /// holds for every sender including admins. The balance check runs
    /// inside the store transaction under the wallet row lock, so two
    /// concurrent transfers can never overdraw the same wallet.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAmount`], [`CoreError::Unauthorized`],
    /// [`CoreError::PermissionDenied`], [`CoreError::AccountNotFound`],
    /// [`CoreError::InsufficientBalance`], or another [`CoreError`] on
    /// store failure. All are terminal; only transient store errors are
    /// retried internally.
    pub async fn transfer(
        &self,
        actor_id: AccountId,
        target_id: AccountId,
        amount: Decimal,
        idempotency_key: Option<Uuid>,
    ) -> Result<TransferOutcome, CoreError> {
        require_positive(amount)?;
        let sender = self.require_actor(actor_id).await?;
        let Some(target) = self.store.fetch_account(target_id).await? else {
            return Err(CoreError::AccountNotFound(*target_id.as_uuid()));
        };

        if !sender.role.can_assign(target.role) {
            return Err(CoreError::PermissionDenied(format!(
                "{} may not assign coins to {}",
                sender.role, target.role
            )));
        }
        if sender.role != Role::Admin
            && !self.hierarchy.is_descendant(sender.id, target.id).await?
        {
            return Err(CoreError::PermissionDenied(
                "target is outside your hierarchy".into(),
            ));
        }

        if let Some(stored) = self.replay("transfer", idempotency_key).await? {
            return Ok(stored);
        }

        let result = self
            .with_retries(|| {
                self.store
                    .transfer_coins(sender.id, target.id, amount, idempotency_key)
            })
            .await;
        let outcome = self.settle("transfer", idempotency_key, result).await?;

        self.invalidate_money();
        Ok(outcome)
    }

    /// Current wallet balance of an account in the actor's reach; 0 when
    /// no wallet row exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PermissionDenied`] when the account is
    /// outside the actor's subtree, or another [`CoreError`] on store
    /// failure.
    pub async fn balance_of(
        &self,
        actor_id: AccountId,
        account_id: AccountId,
    ) -> Result<Decimal, CoreError> {
        let actor = self.require_actor(actor_id).await?;
        self.authorize_view(&actor, account_id).await?;
        Ok(self
            .store
            .fetch_wallet(account_id)
            .await?
            .map_or(Decimal::ZERO, |w| w.balance))
    }

    /// Paginated ledger rows of one account, newest first, each joined
    /// with the counterparty account's username and role.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PermissionDenied`] when the account is
    /// outside the actor's subtree, or another [`CoreError`] on store
    /// failure.
    pub async fn transactions_for_account(
        &self,
        actor_id: AccountId,
        account_id: AccountId,
        page: &Page,
    ) -> Result<Paginated<LedgerEntryWithCounterparty>, CoreError> {
        let actor = self.require_actor(actor_id).await?;
        self.authorize_view(&actor, account_id).await?;
        self.store.list_entries(&[account_id], page).await
    }

    /// Paginated ledger rows across a whole subtree (root included),
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PermissionDenied`] when the subtree root is
    /// outside the actor's reach, or another [`CoreError`] on store
    /// failure.
    pub async fn transactions_for_subtree(
        &self,
        actor_id: AccountId,
        root_id: AccountId,
        page: &Page,
    ) -> Result<Paginated<LedgerEntryWithCounterparty>, CoreError> {
        let actor = self.require_actor(actor_id).await?;
        self.authorize_view(&actor, root_id).await?;
        let ids = self.hierarchy.descendant_ids(root_id).await?;
        self.store.list_entries(&ids, page).await
    }

    /// Authoritative replayed balance of one account: the signed sum of
    /// its ledger. Exposed for reconciliation checks; must always equal
    /// the wallet balance and the points mirror.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on store failure.
    pub async fn replayed_balance(&self, account_id: AccountId) -> Result<Decimal, CoreError> {
        self.store.replay_balance(account_id).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn require_actor(&self, actor_id: AccountId) -> Result<Account, CoreError> {
        let Some(actor) = self.store.fetch_account(actor_id).await? else {
            return Err(CoreError::Unauthorized("unknown actor".into()));
        };
        if !actor.is_active {
            return Err(CoreError::Unauthorized("actor is not active".into()));
        }
        Ok(actor)
    }

    async fn authorize_view(
        &self,
        actor: &Account,
        account_id: AccountId,
    ) -> Result<(), CoreError> {
        if actor.role == Role::Admin || actor.id == account_id {
            return Ok(());
        }
        if self.hierarchy.is_descendant(actor.id, account_id).await? {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied(
                "account is outside your hierarchy".into(),
            ))
        }
    }

    /// Returns the stored outcome for a previously used idempotency key.
    async fn replay<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        key: Option<Uuid>,
    ) -> Result<Option<T>, CoreError> {
        let Some(key) = key else { return Ok(None) };
        let Some(record) = self.store.fetch_idempotency(key, operation).await? else {
            return Ok(None);
        };
        tracing::info!(%key, operation, "idempotent replay");
        serde_json::from_value(record.result)
            .map(Some)
            .map_err(|e| CoreError::Internal(format!("idempotency decode: {e}")))
    }

    /// Resolves a finished financial operation. A `Conflict` under a
    /// supplied idempotency key means a concurrent duplicate won the
    /// race; its stored outcome is returned instead of the error.
    async fn settle<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        key: Option<Uuid>,
        result: Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        match result {
            Err(CoreError::Conflict(reason)) if key.is_some() => {
                match self.replay(operation, key).await? {
                    Some(stored) => Ok(stored),
                    None => Err(CoreError::Conflict(reason)),
                }
            }
            other => other,
        }
    }

    /// Runs a financial transaction, retrying only transient store
    /// failures with doubling backoff.
    async fn with_retries<T, F, Fut>(&self, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut backoff = self.retry_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Err(err) if err.is_retryable() && attempt < self.retry_attempts => {
                    tracing::warn!(attempt, error = %err, "transient store error, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                other => return other,
            }
        }
    }

    fn invalidate_money(&self) {
        self.cache.invalidate(EntityKind::Wallet);
        self.cache.invalidate(EntityKind::Ledger);
        // Points mirror lives on the account row.
        self.cache.invalidate(EntityKind::Account);
    }
}

/// Rejects zero and negative amounts.
fn require_positive(amount: Decimal) -> Result<(), CoreError> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(amount));
    }
    Ok(())
}
