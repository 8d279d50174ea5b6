//! Database models for accounts, wallets, ledger entries, payments,
//! audit records and idempotency replay.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountId, AccountStatus, LedgerType, PaymentStatus, Role, SourceKind};

/// An account row from the `companies` table.
///
/// `points` is a denormalized mirror of the wallet balance, written only
/// inside the same transaction as the balance it mirrors.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    /// Primary key.
    pub id: AccountId,
    /// Unique login name.
    pub username: String,
    /// Argon2id password hash. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Optional unique contact email.
    pub email: Option<String>,
    /// Optional display name.
    pub nickname: Option<String>,
    /// Role in the hierarchy.
    pub role: Role,
    /// Parent account; `None` only for admin roots.
    pub parent_id: Option<AccountId>,
    /// Denormalized wallet-balance mirror.
    pub points: Decimal,
    /// Quick activity flag; false for Inactive/Block/Deleted.
    pub is_active: bool,
    /// Full lifecycle status.
    pub status: AccountStatus,
    /// Whether the account may receive recharges.
    pub recharge_perm: bool,
    /// Whether the account may request withdrawals.
    pub withdraw_perm: bool,
    /// Whether the account's subtree is hidden from sibling agents.
    pub agent_protect: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; set once, never cleared.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Public subset of an account, safe to return to callers.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    /// Account id.
    pub id: AccountId,
    /// Login name.
    pub username: String,
    /// Role in the hierarchy.
    pub role: Role,
    /// Parent account id.
    pub parent_id: Option<AccountId>,
    /// Lifecycle status.
    pub status: AccountStatus,
    /// Denormalized balance mirror.
    pub points: Decimal,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            role: account.role,
            parent_id: account.parent_id,
            status: account.status,
            points: account.points,
        }
    }
}

/// A wallet row from the `wallets` table. One per account, created lazily
/// on the first monetary operation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Wallet {
    /// Primary key.
    pub id: Uuid,
    /// Owning account.
    pub company_id: AccountId,
    /// Current balance; never negative.
    pub balance: Decimal,
    /// Last balance change.
    pub updated_at: DateTime<Utc>,
}

/// A ledger row from the `ledger_entries` table. Append-only, immutable.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    /// Primary key.
    pub id: Uuid,
    /// Account whose wallet moved.
    pub company_id: AccountId,
    /// Wallet that moved.
    pub wallet_id: Uuid,
    /// Movement type; conveys the sign of `amount`.
    pub entry_type: LedgerType,
    /// Always-positive amount.
    pub amount: Decimal,
    /// Balance snapshot *after* this entry. Audit checkpoint only; the
    /// signed-amount sum is authoritative.
    pub balance: Decimal,
    /// Counterparty kind, when there is one.
    pub source_kind: Option<SourceKind>,
    /// Counterparty id (account or payment).
    pub source_id: Option<Uuid>,
    /// Free-text remark.
    pub remark: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A ledger row joined with its counterparty account, for listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LedgerEntryWithCounterparty {
    /// Primary key.
    pub id: Uuid,
    /// Account whose wallet moved.
    pub company_id: AccountId,
    /// Movement type.
    pub entry_type: LedgerType,
    /// Always-positive amount.
    pub amount: Decimal,
    /// Post-entry balance snapshot.
    pub balance: Decimal,
    /// Counterparty account's username, when the source is an account.
    pub counterparty_username: Option<String>,
    /// Counterparty account's role, when the source is an account.
    pub counterparty_role: Option<Role>,
    /// Free-text remark.
    pub remark: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A payment row from the `payments` table: an external or admin-initiated
/// top-up event.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    /// Primary key.
    pub id: Uuid,
    /// Credited account.
    pub company_id: AccountId,
    /// Top-up amount.
    pub amount: Decimal,
    /// Merchant label (`"ADMIN"` for admin self-load).
    pub merchant: String,
    /// Settlement status.
    pub status: PaymentStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An audit row from the `audit_logs` table. Immutable once created.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLog {
    /// Primary key.
    pub id: Uuid,
    /// Acting account.
    pub actor_id: AccountId,
    /// Action discriminator (e.g. `"transfer"`, `"account.create"`).
    pub action: String,
    /// Target account, when the action has one.
    pub target_id: Option<AccountId>,
    /// Action-specific details.
    pub details: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Column values for a new account row. Assembled by the account service
/// after policy and uniqueness checks pass; the password is already hashed.
#[derive(Debug, Clone)]
pub struct InsertAccount {
    /// Pre-generated account id.
    pub id: AccountId,
    /// Unique login name.
    pub username: String,
    /// Argon2id hash of the supplied password.
    pub password_hash: String,
    /// Optional unique contact email.
    pub email: Option<String>,
    /// Optional display name.
    pub nickname: Option<String>,
    /// Role, already validated against the creator's.
    pub role: Role,
    /// The creating account; `None` only when seeding an admin root.
    pub parent_id: Option<AccountId>,
}

/// Committed result of an admin self-load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOutcome {
    /// The `PAID` payment record.
    pub payment: Payment,
    /// The `RECHARGE` ledger row.
    pub entry: LedgerEntry,
    /// Wallet balance after the load.
    pub new_balance: Decimal,
}

/// Committed result of a coin transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Debited account.
    pub sender_id: AccountId,
    /// Credited account.
    pub target_id: AccountId,
    /// Amount moved; sender debit equals target credit.
    pub amount: Decimal,
    /// Sender wallet balance after the transfer.
    pub sender_balance: Decimal,
    /// Target wallet balance after the transfer.
    pub target_balance: Decimal,
}

/// A stored idempotency record: client key mapped to the serialized result
/// of the financial operation it guarded.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdempotencyRecord {
    /// Client-supplied key.
    pub key: Uuid,
    /// Operation discriminator (`"transfer"` or `"load_self"`), so a key
    /// cannot be replayed across operation types.
    pub operation: String,
    /// Serialized success result of the original execution.
    pub result: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
