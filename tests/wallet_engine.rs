//! Wallet engine tests against a live PostgreSQL instance.
//!
//! These exercise the transactional money paths end to end: the
//! WITHDRAW/RECHARGE row pair with post-balance snapshots, reconciliation
//! between wallet balance, replayed ledger and the points mirror,
//! conservation across transfers, rejection of concurrent overdrafts, and
//! idempotent replay.
//!
//! All tests are `#[ignore]`d because they need a reachable database:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo test --test wallet_engine -- --ignored
//! ```
//!
//! Migrations run on connect; each test seeds its own uniquely-named
//! accounts, so a shared database can be reused across runs.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use coinledger::cache::NoopCache;
use coinledger::config::CoreConfig;
use coinledger::domain::{AccountId, LedgerType, Page, Role};
use coinledger::error::CoreError;
use coinledger::persistence::PostgresStore;
use coinledger::persistence::models::InsertAccount;
use coinledger::service::{Services, password};

async fn engine() -> anyhow::Result<(Services, PostgresStore)> {
    let config = CoreConfig::from_env();
    let store = PostgresStore::connect(&config).await?;
    let services = Services::new(store.clone(), Arc::new(NoopCache), &config);
    Ok((services, store))
}

/// Inserts an account directly at the store layer with a unique username,
/// bypassing the one-admin bootstrap guard so tests can share a database.
async fn seed(
    store: &PostgresStore,
    role: Role,
    parent: Option<AccountId>,
) -> anyhow::Result<AccountId> {
    let id = AccountId::new();
    let spec = InsertAccount {
        id,
        username: format!("t-{}", Uuid::new_v4().simple()),
        password_hash: password::hash_password("integration")?,
        email: None,
        nickname: None,
        role,
        parent_id: parent,
    };
    store.create_account(parent.unwrap_or(id), &spec).await?;
    Ok(id)
}

fn full_page() -> Page {
    Page { page: 1, limit: 100 }
}

#[tokio::test]
#[ignore = "requires a live postgres via DATABASE_URL"]
async fn transfer_writes_one_withdraw_one_recharge_with_snapshots() -> anyhow::Result<()> {
    let (svc, store) = engine().await?;
    let admin = seed(&store, Role::Admin, None).await?;
    let dist = seed(&store, Role::Distributor, Some(admin)).await?;

    svc.wallets.load_self(admin, dec!(500), None).await?;
    let outcome = svc.wallets.transfer(admin, dist, dec!(120), None).await?;
    assert_eq!(outcome.sender_balance, dec!(380));
    assert_eq!(outcome.target_balance, dec!(120));

    let sender_rows = svc
        .wallets
        .transactions_for_account(admin, admin, &full_page())
        .await?;
    let withdraws: Vec<_> = sender_rows
        .items
        .iter()
        .filter(|e| e.entry_type == LedgerType::Withdraw)
        .collect();
    assert_eq!(withdraws.len(), 1, "exactly one debit row per transfer");
    let Some(debit) = withdraws.first() else {
        panic!("debit row missing");
    };
    assert_eq!(debit.amount, dec!(120));
    assert_eq!(debit.balance, dec!(380), "snapshot is the post-debit balance");

    let target_rows = svc
        .wallets
        .transactions_for_account(admin, dist, &full_page())
        .await?;
    let recharges: Vec<_> = target_rows
        .items
        .iter()
        .filter(|e| e.entry_type == LedgerType::Recharge)
        .collect();
    assert_eq!(recharges.len(), 1, "exactly one credit row per transfer");
    let Some(credit) = recharges.first() else {
        panic!("credit row missing");
    };
    assert_eq!(credit.amount, dec!(120));
    assert_eq!(credit.balance, dec!(120), "snapshot is the post-credit balance");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live postgres via DATABASE_URL"]
async fn balances_ledger_and_points_mirror_reconcile() -> anyhow::Result<()> {
    let (svc, store) = engine().await?;
    let admin = seed(&store, Role::Admin, None).await?;
    let dist = seed(&store, Role::Distributor, Some(admin)).await?;
    let sub = seed(&store, Role::SubDistributor, Some(dist)).await?;

    svc.wallets.load_self(admin, dec!(300), None).await?;
    svc.wallets.transfer(admin, dist, dec!(100), None).await?;
    svc.wallets.transfer(dist, sub, dec!(30), None).await?;

    let mut total = Decimal::ZERO;
    for (id, expected) in [(admin, dec!(200)), (dist, dec!(70)), (sub, dec!(30))] {
        let balance = svc.wallets.balance_of(admin, id).await?;
        assert_eq!(balance, expected);
        assert_eq!(svc.wallets.replayed_balance(id).await?, balance);
        let Some(account) = store.fetch_account(id).await? else {
            panic!("seeded account vanished");
        };
        assert_eq!(account.points, balance, "points mirror must track the wallet");
        total += balance;
    }
    assert_eq!(total, dec!(300), "transfers conserve the loaded total");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live postgres via DATABASE_URL"]
async fn concurrent_transfers_cannot_overdraw() -> anyhow::Result<()> {
    let (svc, store) = engine().await?;
    let admin = seed(&store, Role::Admin, None).await?;
    let dist = seed(&store, Role::Distributor, Some(admin)).await?;
    let sub_a = seed(&store, Role::SubDistributor, Some(dist)).await?;
    let sub_b = seed(&store, Role::SubDistributor, Some(dist)).await?;

    svc.wallets.load_self(admin, dec!(200), None).await?;
    svc.wallets.transfer(admin, dist, dec!(100), None).await?;

    // 60 + 60 > 100: whichever drain locks the wallet second must see the
    // reduced balance and be rejected.
    let (a, b) = tokio::join!(
        svc.wallets.transfer(dist, sub_a, dec!(60), None),
        svc.wallets.transfer(dist, sub_b, dec!(60), None),
    );
    let rejected = match (a, b) {
        (Ok(_), Err(e)) | (Err(e), Ok(_)) => e,
        (Ok(_), Ok(_)) => anyhow::bail!("both drains committed"),
        (Err(a), Err(b)) => anyhow::bail!("both drains failed: {a}; {b}"),
    };
    assert!(matches!(rejected, CoreError::InsufficientBalance { .. }));

    let dist_balance = svc.wallets.balance_of(admin, dist).await?;
    assert_eq!(dist_balance, dec!(40));
    assert_eq!(svc.wallets.replayed_balance(dist).await?, dec!(40));

    let children_total = svc.wallets.balance_of(admin, sub_a).await?
        + svc.wallets.balance_of(admin, sub_b).await?;
    assert_eq!(dist_balance + children_total, dec!(100), "no coins created or lost");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live postgres via DATABASE_URL"]
async fn failed_transfer_leaves_no_trace() -> anyhow::Result<()> {
    let (svc, store) = engine().await?;
    let admin = seed(&store, Role::Admin, None).await?;
    let dist = seed(&store, Role::Distributor, Some(admin)).await?;
    let sub = seed(&store, Role::SubDistributor, Some(dist)).await?;

    svc.wallets.load_self(admin, dec!(40), None).await?;
    svc.wallets.transfer(admin, dist, dec!(40), None).await?;
    let before = svc
        .wallets
        .transactions_for_account(admin, dist, &full_page())
        .await?;

    let result = svc.wallets.transfer(dist, sub, dec!(60), None).await;
    assert!(matches!(
        result,
        Err(CoreError::InsufficientBalance {
            held,
            required,
        }) if held == dec!(40) && required == dec!(60)
    ));

    let after = svc
        .wallets
        .transactions_for_account(admin, dist, &full_page())
        .await?;
    assert_eq!(after.total, before.total, "rejected transfer writes no ledger rows");
    assert_eq!(svc.wallets.balance_of(admin, dist).await?, dec!(40));
    assert_eq!(svc.wallets.balance_of(admin, sub).await?, Decimal::ZERO);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a live postgres via DATABASE_URL"]
async fn idempotency_key_replays_without_moving_coins_again() -> anyhow::Result<()> {
    let (svc, store) = engine().await?;
    let admin = seed(&store, Role::Admin, None).await?;
    let dist = seed(&store, Role::Distributor, Some(admin)).await?;

    let load_key = Uuid::new_v4();
    let first = svc.wallets.load_self(admin, dec!(50), Some(load_key)).await?;
    let replayed = svc.wallets.load_self(admin, dec!(50), Some(load_key)).await?;
    assert_eq!(replayed.new_balance, first.new_balance);
    assert_eq!(svc.wallets.balance_of(admin, admin).await?, dec!(50));

    let transfer_key = Uuid::new_v4();
    let sent = svc
        .wallets
        .transfer(admin, dist, dec!(20), Some(transfer_key))
        .await?;
    let resent = svc
        .wallets
        .transfer(admin, dist, dec!(20), Some(transfer_key))
        .await?;
    assert_eq!(resent.sender_balance, sent.sender_balance);
    assert_eq!(svc.wallets.balance_of(admin, admin).await?, dec!(30));
    assert_eq!(svc.wallets.balance_of(admin, dist).await?, dec!(20));
    Ok(())
}
