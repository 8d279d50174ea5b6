//! Domain layer: identity, role policy, and ledger vocabulary.
//!
//! This module contains the pure, store-independent parts of the core:
//! account identity, the role hierarchy with its two authorization
//! policies, account lifecycle types, and the ledger/payment vocabulary
//! shared by the persistence and service layers.

pub mod account;
pub mod account_id;
pub mod ledger;
pub mod role;

pub use account::{AccountPatch, AccountStatus, NewAccount};
pub use account_id::AccountId;
pub use ledger::{LedgerType, Page, Paginated, PaymentStatus, SourceKind};
pub use role::Role;
