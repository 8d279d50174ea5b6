//! Ledger vocabulary: movement types, payment status, pagination.
//!
//! Ledger amounts are always stored positive; [`LedgerType`] conveys the
//! direction. Replaying a wallet's entries as `sign * amount` in creation
//! order must reproduce its current balance exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Type of a ledger movement. Determines the sign applied to the stored
/// (always positive) amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ledger_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerType {
    /// Credit: incoming coins (transfer-in, admin self-load, player top-up).
    Recharge,
    /// Debit: outgoing coins (transfer-out, withdrawal).
    Withdraw,
    /// Debit: stake placed on a game round.
    Bet,
    /// Credit: game winnings.
    Win,
    /// Credit: commission payout to an agent.
    Commission,
    /// Credit: manual correction. Debit corrections are recorded as
    /// `Withdraw` so every type keeps a fixed sign.
    Adjustment,
}

impl LedgerType {
    /// Sign applied to the stored amount when replaying the ledger.
    #[must_use]
    pub const fn sign(self) -> i8 {
        match self {
            Self::Recharge | Self::Win | Self::Commission | Self::Adjustment => 1,
            Self::Withdraw | Self::Bet => -1,
        }
    }

    /// Signed value of a stored (positive) amount for this movement type.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        if self.sign() < 0 { -amount } else { amount }
    }
}

/// Kind of counterparty referenced by a ledger entry's source fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "source_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// The counterparty is another account (transfer leg).
    Account,
    /// The movement originated from a payment record (top-up).
    Payment,
}

/// Status of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Awaiting settlement by an external merchant.
    Pending,
    /// Settled; coins credited.
    Paid,
    /// Rejected or expired; no coins moved.
    Failed,
}

/// One-based pagination request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    /// Page number, starting at 1. Values below 1 are clamped to 1.
    pub page: u32,
    /// Rows per page. Clamped to `1..=MAX_LIMIT`.
    pub limit: u32,
}

impl Page {
    /// Upper bound on rows per page.
    pub const MAX_LIMIT: u32 = 100;

    /// Clamped rows-per-page value.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        if self.limit == 0 {
            1
        } else if self.limit > Self::MAX_LIMIT {
            Self::MAX_LIMIT
        } else {
            self.limit
        }
    }

    /// Row offset for the clamped page/limit pair.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        let page = if self.page == 0 { 1 } else { self.page };
        (page as u64 - 1) * self.limit() as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// A page of results plus totals.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Total matching rows across all pages.
    pub total: u64,
    /// Requested page number (clamped).
    pub page: u32,
    /// Rows per page (clamped).
    pub limit: u32,
}

impl<T> Paginated<T> {
    /// Assembles a page from rows and a total count.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, page: &Page) -> Self {
        Self {
            items,
            total,
            page: if page.page == 0 { 1 } else { page.page },
            limit: page.limit(),
        }
    }

    /// Number of pages needed for `total` rows at this limit.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            0
        } else {
            self.total.div_ceil(self.limit as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn credit_types_are_positive() {
        for t in [
            LedgerType::Recharge,
            LedgerType::Win,
            LedgerType::Commission,
            LedgerType::Adjustment,
        ] {
            assert_eq!(t.signed(dec!(10)), dec!(10));
        }
    }

    #[test]
    fn debit_types_are_negative() {
        assert_eq!(LedgerType::Withdraw.signed(dec!(10)), dec!(-10));
        assert_eq!(LedgerType::Bet.signed(dec!(2.5)), dec!(-2.5));
    }

    #[test]
    fn replaying_signed_amounts_reconstructs_balance() {
        let moves = [
            (LedgerType::Recharge, dec!(500)),
            (LedgerType::Withdraw, dec!(200)),
            (LedgerType::Bet, dec!(50)),
            (LedgerType::Win, dec!(125)),
        ];
        let balance: Decimal = moves.iter().map(|(t, a)| t.signed(*a)).sum();
        assert_eq!(balance, dec!(375));
    }

    #[test]
    fn page_clamps_degenerate_values() {
        let p = Page { page: 0, limit: 0 };
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);

        let p = Page {
            page: 3,
            limit: 1000,
        };
        assert_eq!(p.limit(), Page::MAX_LIMIT);
        assert_eq!(p.offset(), 200);
    }

    #[test]
    fn paginated_total_pages_rounds_up() {
        let page = Page { page: 1, limit: 20 };
        let p: Paginated<u8> = Paginated::new(vec![], 41, &page);
        assert_eq!(p.total_pages(), 3);
    }
}
