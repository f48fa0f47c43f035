//! Storage under concurrency: the database is the only arbiter.

use custodia::keys::TronKeychain;
use custodia::storage::txlog::NewTransaction;
use custodia::storage::{self, Direction, Ledger, TransactionLog};
use custodia::Error;
use rust_decimal::Decimal;
use std::sync::Arc;
use tempfile::TempDir;

fn record(hash: &str) -> NewTransaction {
    NewTransaction {
        user_id: 1,
        tx_hash: hash.into(),
        direction: Direction::Incoming,
        from_address: "TSender".into(),
        to_address: "TReceiver".into(),
        amount: Decimal::new(105, 1),
        explorer_link: format!("https://tronscan.org/#/transaction/{hash}"),
    }
}

/// Test: of many concurrent appends of one hash, exactly one wins
#[tokio::test]
async fn concurrent_duplicate_append() {
    let dir = TempDir::new().expect("tempdir");
    let pool = storage::open(&dir.path().join("race.db")).await.expect("pool");
    let log = TransactionLog::new(pool);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let log = log.clone();
        tasks.push(tokio::spawn(async move { log.append(&record("race")).await }));
    }

    let mut ok = 0;
    let mut dup = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(Error::DuplicateTransaction(_)) => dup += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((ok, dup), (1, 7));
    assert_eq!(log.list_for_user(1).await.unwrap().len(), 1);
}

/// Test: concurrent creates for one user leave exactly one wallet
#[tokio::test]
async fn concurrent_create_single_wallet() {
    let dir = TempDir::new().expect("tempdir");
    let pool = storage::open(&dir.path().join("ledger.db")).await.expect("pool");
    let ledger = Arc::new(Ledger::new(pool, Arc::new(TronKeychain::new())));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let ledger = ledger.clone();
        tasks.push(tokio::spawn(async move { ledger.create(99).await }));
    }
    let mut created = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            Ok(wallet) => created.push(wallet.address),
            Err(Error::AlreadyExists(99)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created.len(), 1);
    assert_eq!(ledger.get(99).await.unwrap().address, created[0]);
}

/// Test: data survives reopening the file
#[tokio::test]
async fn reopen_keeps_data() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested/dir/custodia.db");
    let address = {
        let pool = storage::open(&path).await.expect("pool");
        let ledger = Ledger::new(pool.clone(), Arc::new(TronKeychain::new()));
        let address = ledger.create(5).await.unwrap().address;
        TransactionLog::new(pool.clone()).append(&record("persist")).await.unwrap();
        pool.close().await;
        address
    };

    let pool = storage::open(&path).await.expect("reopen");
    let ledger = Ledger::new(pool.clone(), Arc::new(TronKeychain::new()));
    assert_eq!(ledger.get(5).await.unwrap().address, address);
    assert!(TransactionLog::new(pool).exists("persist").await.unwrap());
}
