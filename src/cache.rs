//! Advisory invalidation-on-write cache capability.
//!
//! The surrounding read path may layer a cache over account and ledger
//! reads. The core's only obligation is to signal, after every committed
//! write, which entity kind changed so stale reads cannot outlive the
//! write. The cache is never consulted inside a financial transaction;
//! correctness never depends on it.

use std::fmt::Debug;

/// Entity families the read cache may key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Account rows and the hierarchy edges derived from them.
    Account,
    /// Wallet balances.
    Wallet,
    /// Ledger entries and transaction listings.
    Ledger,
}

/// Write-side invalidation hook implemented by the caching collaborator.
pub trait CacheInvalidator: Debug + Send + Sync {
    /// Called after a committed write touching `kind`. Implementations
    /// must ensure subsequent reads of `kind` do not observe data older
    /// than the write.
    fn invalidate(&self, kind: EntityKind);
}

/// No-op invalidator for deployments without a read cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl CacheInvalidator for NoopCache {
    fn invalidate(&self, _kind: EntityKind) {}
}
