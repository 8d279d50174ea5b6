//! # coinledger
//!
//! Hierarchical account and coin-ledger core for a multi-tenant reseller
//! platform. Accounts form a strict parent/child tree by role
//! (ADMIN → DISTRIBUTOR → SUB_DISTRIBUTOR → STORE → PLAYER); each account
//! may only create lower-role descendants, fund accounts one level below
//! it, and view its own subtree. Every balance movement is an append-only
//! ledger row, and wallet balance, the denormalized points mirror and the
//! ledger stay mutually consistent under concurrent transfers.
//!
//! The surrounding transport layer (HTTP routing, authentication token
//! issuance, 2FA) is an external collaborator; this crate exposes the
//! operation contracts as async service methods.
//!
//! ## Architecture
//!
//! ```text
//! Transport layer (external)
//!     │
//!     ├── AccountService (service/)  ── lifecycle, policy gating
//!     ├── WalletService  (service/)  ── atomic loads & transfers
//!     ├── HierarchyService (service/) ── descendant membership
//!     │
//!     ├── Role policy (domain/)      ── can_create / can_assign
//!     │
//!     └── PostgresStore (persistence/) ── transactional wallet ledger
//! ```

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;

/// Initializes a `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info`. For embedding hosts and test binaries; calling it twice is a
/// no-op.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
