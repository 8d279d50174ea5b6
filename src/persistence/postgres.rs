//! PostgreSQL implementation of the hierarchy store and wallet ledger.
//!
//! [`PostgresStore`] owns every SQL statement in the crate. The two
//! financial mutations ([`PostgresStore::load_admin_wallet`] and
//! [`PostgresStore::transfer_coins`]) execute as single transactions:
//! wallet rows are locked `FOR UPDATE` in ascending account-id order,
//! the balance precondition is re-validated under the lock, and wallet
//! balance, the denormalized points mirror, ledger rows, payment/audit
//! rows and the optional idempotency record all commit together or not
//! at all.

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::{
    Account, AuditLog, IdempotencyRecord, InsertAccount, LedgerEntry, LedgerEntryWithCounterparty,
    LoadOutcome, Payment, TransferOutcome, Wallet,
};
use crate::config::CoreConfig;
use crate::domain::{AccountId, AccountStatus, LedgerType, Page, Paginated, SourceKind};
use crate::error::CoreError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to PostgreSQL per the given configuration and, when
    /// enabled, runs pending migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] classified from the underlying connection
    /// or migration failure.
    pub async fn connect(config: &CoreConfig) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await?;

        if config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| CoreError::Store(e.to_string()))?;
        }

        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres"
        );
        Ok(Self { pool })
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Fetches a live (not soft-deleted) account by id.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn fetch_account(&self, id: AccountId) -> Result<Option<Account>, CoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM companies WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// Fetches a live account by username.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn fetch_by_username(&self, username: &str) -> Result<Option<Account>, CoreError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM companies WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// True when the username, or the email if given, is already taken by
    /// any account including soft-deleted ones (identities are never
    /// recycled).
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn identity_taken(
        &self,
        username: &str,
        email: Option<&str>,
    ) -> Result<bool, CoreError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM companies
                 WHERE username = $1 OR ($2::text IS NOT NULL AND email = $2)
             )",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    /// True when any live admin account exists. Used to guard the
    /// one-time bootstrap of the hierarchy root.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn admin_exists(&self) -> Result<bool, CoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM companies WHERE role = 'ADMIN' AND deleted_at IS NULL
             )",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Inserts a new account and its creation audit record in one
    /// transaction, returning the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conflict`] on a duplicate username or email,
    /// or another [`CoreError`] on database failure.
    pub async fn create_account(
        &self,
        actor_id: AccountId,
        spec: &InsertAccount,
    ) -> Result<Account, CoreError> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            "INSERT INTO companies
                 (id, username, password_hash, email, nickname, role, parent_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(spec.id)
        .bind(&spec.username)
        .bind(&spec.password_hash)
        .bind(spec.email.as_deref())
        .bind(spec.nickname.as_deref())
        .bind(spec.role)
        .bind(spec.parent_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_audit(
            &mut tx,
            actor_id,
            "account.create",
            Some(account.id),
            serde_json::json!({
                "username": account.username,
                "role": account.role,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    /// Applies a partial profile update and its audit record in one
    /// transaction. `None` patch fields keep their stored value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AccountNotFound`] when the target does not
    /// exist or is soft-deleted, or another [`CoreError`] on database
    /// failure.
    pub async fn update_account(
        &self,
        actor_id: AccountId,
        target_id: AccountId,
        patch: &crate::domain::AccountPatch,
    ) -> Result<Account, CoreError> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            "UPDATE companies SET
                 email         = COALESCE($2, email),
                 nickname      = COALESCE($3, nickname),
                 recharge_perm = COALESCE($4, recharge_perm),
                 withdraw_perm = COALESCE($5, withdraw_perm),
                 agent_protect = COALESCE($6, agent_protect),
                 updated_at    = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(target_id)
        .bind(patch.email.as_deref())
        .bind(patch.nickname.as_deref())
        .bind(patch.recharge_perm)
        .bind(patch.withdraw_perm)
        .bind(patch.agent_protect)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::AccountNotFound(*target_id.as_uuid()))?;

        Self::insert_audit(
            &mut tx,
            actor_id,
            "account.update",
            Some(target_id),
            serde_json::to_value(patch).unwrap_or(serde_json::Value::Null),
        )
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    /// Sets the lifecycle status (and the derived `is_active` flag) of a
    /// live account, with audit, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AccountNotFound`] when the target does not
    /// exist or is soft-deleted, or another [`CoreError`] on database
    /// failure.
    pub async fn set_status(
        &self,
        actor_id: AccountId,
        target_id: AccountId,
        status: AccountStatus,
    ) -> Result<Account, CoreError> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            "UPDATE companies SET
                 status     = $2,
                 is_active  = $3,
                 updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(target_id)
        .bind(status)
        .bind(status == AccountStatus::Active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::AccountNotFound(*target_id.as_uuid()))?;

        Self::insert_audit(
            &mut tx,
            actor_id,
            "account.status",
            Some(target_id),
            serde_json::json!({ "status": status }),
        )
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    /// Soft-deletes a live account: sets `deleted_at` and status
    /// `DELETED`, with audit, in one transaction. Wallets, ledger history
    /// and descendants are retained.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AccountNotFound`] when the target does not
    /// exist or was already deleted, or another [`CoreError`] on database
    /// failure.
    pub async fn soft_delete(
        &self,
        actor_id: AccountId,
        target_id: AccountId,
    ) -> Result<Account, CoreError> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            "UPDATE companies SET
                 status     = 'DELETED',
                 is_active  = false,
                 deleted_at = now(),
                 updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING *",
        )
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::AccountNotFound(*target_id.as_uuid()))?;

        Self::insert_audit(
            &mut tx,
            actor_id,
            "account.delete",
            Some(target_id),
            serde_json::Value::Null,
        )
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    // ------------------------------------------------------------------
    // Hierarchy edges
    // ------------------------------------------------------------------

    /// Returns the ids of all direct children of the given parents, in a
    /// single batch query. Soft-deleted children are included: edges are
    /// immutable and pruning a deleted intermediate would orphan its live
    /// descendants. Liveness is checked where the node itself is used.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn fetch_children(&self, parents: &[AccountId]) -> Result<Vec<AccountId>, CoreError> {
        let parent_uuids: Vec<Uuid> = parents.iter().map(|id| *id.as_uuid()).collect();
        let children = sqlx::query_scalar::<_, AccountId>(
            "SELECT id FROM companies WHERE parent_id = ANY($1)",
        )
        .bind(&parent_uuids)
        .fetch_all(&self.pool)
        .await?;
        Ok(children)
    }

    // ------------------------------------------------------------------
    // Wallet ledger engine
    // ------------------------------------------------------------------

    /// Admin self-load: credits the admin's own wallet in one transaction.
    ///
    /// Steps under the wallet row lock: ensure the wallet exists, compute
    /// the new balance, insert the `PAID` payment, insert the `RECHARGE`
    /// ledger row carrying the post-load balance snapshot, write the
    /// wallet balance and the points mirror, insert the audit record and
    /// the optional idempotency record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conflict`] when `idempotency_key` was already
    /// used, or another [`CoreError`] on database failure. Amount and
    /// role preconditions are the caller's responsibility.
    pub async fn load_admin_wallet(
        &self,
        admin_id: AccountId,
        amount: Decimal,
        idempotency_key: Option<Uuid>,
    ) -> Result<LoadOutcome, CoreError> {
        let mut tx = self.pool.begin().await?;

        let wallet = Self::lock_wallet(&mut tx, admin_id).await?;
        let new_balance = wallet.balance + amount;

        let payment = sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (id, company_id, amount, merchant, status)
             VALUES ($1, $2, $3, 'ADMIN', 'PAID')
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(admin_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        let entry = Self::insert_ledger(
            &mut tx,
            admin_id,
            wallet.id,
            LedgerType::Recharge,
            amount,
            new_balance,
            Some(SourceKind::Payment),
            Some(payment.id),
            Some("admin self-load"),
        )
        .await?;

        Self::write_balance(&mut tx, wallet.id, admin_id, new_balance).await?;

        Self::insert_audit(
            &mut tx,
            admin_id,
            "wallet.load_self",
            None,
            serde_json::json!({ "amount": amount, "new_balance": new_balance }),
        )
        .await?;

        let outcome = LoadOutcome {
            payment,
            entry,
            new_balance,
        };

        if let Some(key) = idempotency_key {
            Self::insert_idempotency(&mut tx, key, "load_self", &outcome).await?;
        }

        tx.commit().await?;
        tracing::info!(admin = %admin_id, %amount, %new_balance, "admin wallet loaded");
        Ok(outcome)
    }

    /// Moves coins between two wallets in one transaction.
    ///
    /// Both wallet rows are locked `FOR UPDATE` in ascending account-id
    /// order so two opposing transfers cannot deadlock. The sender's
    /// balance is re-validated under the lock: a concurrent transfer that
    /// drained the wallet after the caller's precondition check is caught
    /// here and rejected with [`CoreError::InsufficientBalance`] before
    /// any row changes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InsufficientBalance`] when the locked sender
    /// balance cannot cover `amount`, [`CoreError::Conflict`] when
    /// `idempotency_key` was already used, or another [`CoreError`] on
    /// database failure. Policy preconditions are the caller's
    /// responsibility.
    pub async fn transfer_coins(
        &self,
        sender_id: AccountId,
        target_id: AccountId,
        amount: Decimal,
        idempotency_key: Option<Uuid>,
    ) -> Result<TransferOutcome, CoreError> {
        let mut tx = self.pool.begin().await?;

        // Deterministic lock order across all concurrent transfers.
        let (sender_wallet, target_wallet) = if sender_id <= target_id {
            let s = Self::lock_wallet(&mut tx, sender_id).await?;
            let t = Self::lock_wallet(&mut tx, target_id).await?;
            (s, t)
        } else {
            let t = Self::lock_wallet(&mut tx, target_id).await?;
            let s = Self::lock_wallet(&mut tx, sender_id).await?;
            (s, t)
        };

        if sender_wallet.balance < amount {
            return Err(CoreError::InsufficientBalance {
                held: sender_wallet.balance,
                required: amount,
            });
        }

        let sender_balance = sender_wallet.balance - amount;
        let target_balance = target_wallet.balance + amount;

        Self::write_balance(&mut tx, sender_wallet.id, sender_id, sender_balance).await?;
        Self::write_balance(&mut tx, target_wallet.id, target_id, target_balance).await?;

        Self::insert_ledger(
            &mut tx,
            sender_id,
            sender_wallet.id,
            LedgerType::Withdraw,
            amount,
            sender_balance,
            Some(SourceKind::Account),
            Some(*target_id.as_uuid()),
            None,
        )
        .await?;

        Self::insert_ledger(
            &mut tx,
            target_id,
            target_wallet.id,
            LedgerType::Recharge,
            amount,
            target_balance,
            Some(SourceKind::Account),
            Some(*sender_id.as_uuid()),
            None,
        )
        .await?;

        Self::insert_audit(
            &mut tx,
            sender_id,
            "wallet.transfer",
            Some(target_id),
            serde_json::json!({
                "amount": amount,
                "sender_balance": sender_balance,
                "target_balance": target_balance,
            }),
        )
        .await?;

        let outcome = TransferOutcome {
            sender_id,
            target_id,
            amount,
            sender_balance,
            target_balance,
        };

        if let Some(key) = idempotency_key {
            Self::insert_idempotency(&mut tx, key, "transfer", &outcome).await?;
        }

        tx.commit().await?;
        tracing::info!(
            sender = %sender_id,
            target = %target_id,
            %amount,
            "transfer committed"
        );
        Ok(outcome)
    }

    /// Fetches a wallet without locking, for read-side balance queries.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn fetch_wallet(&self, owner: AccountId) -> Result<Option<Wallet>, CoreError> {
        let wallet =
            sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE company_id = $1")
                .bind(owner)
                .fetch_optional(&self.pool)
                .await?;
        Ok(wallet)
    }

    /// Replays the full ledger of one account as a signed sum. This is
    /// the authoritative balance; the wallet row and the per-entry
    /// snapshots are checkpoints that must agree with it.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn replay_balance(&self, owner: AccountId) -> Result<Decimal, CoreError> {
        let sum = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(
                 CASE WHEN entry_type IN ('WITHDRAW', 'BET') THEN -amount ELSE amount END
             ), 0)
             FROM ledger_entries WHERE company_id = $1",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }

    // ------------------------------------------------------------------
    // Ledger listings
    // ------------------------------------------------------------------

    /// Lists ledger entries for the given set of accounts, newest first,
    /// joined with the counterparty account's username and role where the
    /// source is an account.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn list_entries(
        &self,
        owners: &[AccountId],
        page: &Page,
    ) -> Result<Paginated<LedgerEntryWithCounterparty>, CoreError> {
        let owner_uuids: Vec<Uuid> = owners.iter().map(|id| *id.as_uuid()).collect();

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM ledger_entries WHERE company_id = ANY($1)",
        )
        .bind(&owner_uuids)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, LedgerEntryWithCounterparty>(
            "SELECT l.id, l.company_id, l.entry_type, l.amount, l.balance,
                    c.username AS counterparty_username,
                    c.role     AS counterparty_role,
                    l.remark, l.created_at
             FROM ledger_entries l
             LEFT JOIN companies c
                    ON l.source_kind = 'ACCOUNT' AND c.id = l.source_id
             WHERE l.company_id = ANY($1)
             ORDER BY l.created_at DESC, l.id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(&owner_uuids)
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated::new(items, u64::try_from(total).unwrap_or(0), page))
    }

    // ------------------------------------------------------------------
    // Idempotency and audit
    // ------------------------------------------------------------------

    /// Looks up a stored idempotency record for the given key and
    /// operation discriminator.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn fetch_idempotency(
        &self,
        key: Uuid,
        operation: &str,
    ) -> Result<Option<IdempotencyRecord>, CoreError> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT * FROM idempotency_keys WHERE key = $1 AND operation = $2",
        )
        .bind(key)
        .bind(operation)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Lists audit records, newest first, optionally filtered by actor.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] on database failure.
    pub async fn list_audit(
        &self,
        actor: Option<AccountId>,
        page: &Page,
    ) -> Result<Paginated<AuditLog>, CoreError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM audit_logs WHERE $1::uuid IS NULL OR actor_id = $1",
        )
        .bind(actor)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs
             WHERE $1::uuid IS NULL OR actor_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(actor)
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated::new(items, u64::try_from(total).unwrap_or(0), page))
    }

    // ------------------------------------------------------------------
    // Transaction-scoped helpers
    // ------------------------------------------------------------------

    /// Ensures a wallet row exists for `owner` and locks it `FOR UPDATE`.
    async fn lock_wallet(
        tx: &mut Transaction<'_, Postgres>,
        owner: AccountId,
    ) -> Result<Wallet, CoreError> {
        // Lazily create at balance 0; a concurrent creator wins cleanly.
        sqlx::query(
            "INSERT INTO wallets (id, company_id, balance)
             VALUES ($1, $2, 0)
             ON CONFLICT (company_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .execute(&mut **tx)
        .await?;

        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE company_id = $1 FOR UPDATE",
        )
        .bind(owner)
        .fetch_one(&mut **tx)
        .await?;
        Ok(wallet)
    }

    /// Writes a wallet balance and its points mirror inside the caller's
    /// transaction. The mirror is always assigned the wallet balance,
    /// never incremented independently.
    async fn write_balance(
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: Uuid,
        owner: AccountId,
        balance: Decimal,
    ) -> Result<(), CoreError> {
        sqlx::query("UPDATE wallets SET balance = $2, updated_at = now() WHERE id = $1")
            .bind(wallet_id)
            .bind(balance)
            .execute(&mut **tx)
            .await?;

        sqlx::query("UPDATE companies SET points = $2, updated_at = now() WHERE id = $1")
            .bind(owner)
            .bind(balance)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Inserts one append-only ledger row inside the caller's transaction.
    #[allow(clippy::too_many_arguments)]
    async fn insert_ledger(
        tx: &mut Transaction<'_, Postgres>,
        owner: AccountId,
        wallet_id: Uuid,
        entry_type: LedgerType,
        amount: Decimal,
        balance: Decimal,
        source_kind: Option<SourceKind>,
        source_id: Option<Uuid>,
        remark: Option<&str>,
    ) -> Result<LedgerEntry, CoreError> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            "INSERT INTO ledger_entries
                 (id, company_id, wallet_id, entry_type, amount, balance,
                  source_kind, source_id, remark)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(wallet_id)
        .bind(entry_type)
        .bind(amount)
        .bind(balance)
        .bind(source_kind)
        .bind(source_id)
        .bind(remark)
        .fetch_one(&mut **tx)
        .await?;
        Ok(entry)
    }

    /// Inserts one audit record inside the caller's transaction.
    async fn insert_audit(
        tx: &mut Transaction<'_, Postgres>,
        actor_id: AccountId,
        action: &str,
        target_id: Option<AccountId>,
        details: serde_json::Value,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO audit_logs (id, actor_id, action, target_id, details)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(actor_id)
        .bind(action)
        .bind(target_id)
        .bind(details)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Stores the serialized outcome under the client's idempotency key.
    /// A duplicate key aborts the whole transaction with
    /// [`CoreError::Conflict`]; the service replays the stored result.
    async fn insert_idempotency<T: serde::Serialize>(
        tx: &mut Transaction<'_, Postgres>,
        key: Uuid,
        operation: &str,
        outcome: &T,
    ) -> Result<(), CoreError> {
        let result = serde_json::to_value(outcome)
            .map_err(|e| CoreError::Internal(format!("idempotency encode: {e}")))?;
        sqlx::query(
            "INSERT INTO idempotency_keys (key, operation, result) VALUES ($1, $2, $3)",
        )
        .bind(key)
        .bind(operation)
        .bind(result)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
