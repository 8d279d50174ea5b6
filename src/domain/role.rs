//! Role hierarchy and the two authorization policies built on it.
//!
//! The platform organizes accounts in a strict tree by role. Two distinct
//! policies govern privileged actions and must never be conflated:
//!
//! - [`Role::can_create`] — total-order rule: an account may create any
//!   account whose role level is *strictly lower* than its own.
//! - [`Role::can_assign`] — adjacency rule: coin transfers (and other
//!   funding-style actions) are restricted to the role *exactly one level
//!   below* the sender, except for [`Role::Admin`] who may assign to any
//!   non-admin role.

use serde::{Deserialize, Serialize};

/// Account role in the reseller hierarchy, highest to lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "company_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform root. May create and fund any lower role; bypasses
    /// hierarchy membership checks.
    Admin,
    /// Top-level reseller under an admin.
    Distributor,
    /// Reseller under a distributor.
    SubDistributor,
    /// Retail outlet under a sub-distributor.
    Store,
    /// End user; leaf of the tree, may not create or fund anyone.
    Player,
}

impl Role {
    /// All roles, highest level first.
    pub const ALL: [Self; 5] = [
        Self::Admin,
        Self::Distributor,
        Self::SubDistributor,
        Self::Store,
        Self::Player,
    ];

    /// Numeric level used for strict-order comparisons: Admin=5 … Player=1.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Admin => 5,
            Self::Distributor => 4,
            Self::SubDistributor => 3,
            Self::Store => 2,
            Self::Player => 1,
        }
    }

    /// Total-order creation rule: a creator may only create accounts of a
    /// strictly lower level. Creating a peer or superior role is denied.
    #[must_use]
    pub const fn can_create(self, new_role: Self) -> bool {
        new_role.level() < self.level()
    }

    /// Adjacency assignment rule governing coin transfers.
    ///
    /// Admin may assign to any of the four non-admin roles. Every other
    /// role may assign only to the single role immediately below it;
    /// Player may assign to nobody. Strictly tighter than [`Self::can_create`].
    #[must_use]
    pub const fn can_assign(self, receiver: Self) -> bool {
        match self {
            Self::Admin => !matches!(receiver, Self::Admin),
            Self::Distributor => matches!(receiver, Self::SubDistributor),
            Self::SubDistributor => matches!(receiver, Self::Store),
            Self::Store => matches!(receiver, Self::Player),
            Self::Player => false,
        }
    }

    /// Stable wire/storage name for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Distributor => "DISTRIBUTOR",
            Self::SubDistributor => "SUB_DISTRIBUTOR",
            Self::Store => "STORE",
            Self::Player => "PLAYER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
