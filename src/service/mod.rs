//! Service layer: business logic orchestration.
//!
//! [`AccountService`] manages the account lifecycle, [`WalletService`]
//! owns every balance movement, and [`HierarchyService`] answers the
//! descendant-membership question both depend on. [`Services`] wires the
//! three over one store for embedding hosts.

pub mod account_service;
pub mod hierarchy;
pub mod password;
pub mod wallet_service;

pub use account_service::AccountService;
pub use hierarchy::{ChildSource, HierarchyService};
pub use wallet_service::WalletService;

use std::sync::Arc;

use crate::cache::CacheInvalidator;
use crate::config::CoreConfig;
use crate::persistence::PostgresStore;

/// The wired-up core, handed to the surrounding transport layer.
#[derive(Debug, Clone)]
pub struct Services {
    /// Account lifecycle manager.
    pub accounts: AccountService,
    /// Wallet ledger engine.
    pub wallets: WalletService,
    /// Membership oracle, for callers gating their own operations.
    pub hierarchy: HierarchyService<PostgresStore>,
}

impl Services {
    /// Wires the services over one store and cache invalidator.
    #[must_use]
    pub fn new(
        store: PostgresStore,
        cache: Arc<dyn CacheInvalidator>,
        config: &CoreConfig,
    ) -> Self {
        let hierarchy = HierarchyService::new(store.clone());
        let accounts =
            AccountService::new(store.clone(), hierarchy.clone(), Arc::clone(&cache));
        let wallets = WalletService::new(store, hierarchy.clone(), cache, config);
        Self {
            accounts,
            wallets,
            hierarchy,
        }
    }
}
