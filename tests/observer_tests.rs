//! Chain observer: incoming transfers are logged once and announced once.

mod common;

use common::{harness, incoming, RecordingNotifier};
use custodia::chain::TokenTransfer;
use custodia::storage::Direction;
use custodia::{ObserverConfig, Shutdown, TickReport};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const SENDER: &str = "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8";

/// Test: one new transfer → one record, one notice; a second tick changes nothing
#[tokio::test]
async fn tick_is_idempotent() {
    let h = harness().await;
    let wallet = h.node.ledger().create(1).await.unwrap();
    h.chain.push_transfer(&wallet.address, incoming("aa01", SENDER, &wallet.address, 10_500_000));

    let notifier = Arc::new(RecordingNotifier::default());
    let observer = h.node.observer(notifier.clone());

    let first = observer.tick().await.unwrap();
    assert_eq!(first, TickReport { scanned: 1, recorded: 1, failed: 0 });

    let records = h.node.txlog().list_for_user(1).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].direction, Direction::Incoming);
    assert_eq!(records[0].amount, Decimal::from_str("10.5").unwrap());
    assert_eq!(records[0].from_address, SENDER);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 1);
    assert!(sent[0].1.text.contains("10.5 USDT"));
    assert!(sent[0].1.text.contains("LOW"));
    assert_eq!(h.risk.scored.lock().unwrap().as_slice(), [SENDER.to_string()]);

    let second = observer.tick().await.unwrap();
    assert_eq!(second.recorded, 0);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(h.node.txlog().list_for_user(1).await.unwrap().len(), 1);
}

/// Test: outgoing transfers and other tokens are not incoming
#[tokio::test]
async fn ignores_outgoing_and_foreign_tokens() {
    let h = harness().await;
    let wallet = h.node.ledger().create(1).await.unwrap();
    h.chain.push_transfer(&wallet.address, incoming("bb01", &wallet.address, SENDER, 1_000_000));
    h.chain.push_transfer(
        &wallet.address,
        TokenTransfer { token_contract: "TOtherTokenContractxxxxxxxxxxxxxxx".into(), ..incoming("bb02", SENDER, &wallet.address, 1) },
    );

    let notifier = Arc::new(RecordingNotifier::default());
    let report = h.node.observer(notifier.clone()).tick().await.unwrap();

    assert_eq!(report.recorded, 0);
    assert!(notifier.sent().is_empty());
    assert!(h.node.txlog().list_for_user(1).await.unwrap().is_empty());
}

/// Test: one address failing does not stop the others
#[tokio::test]
async fn failing_address_is_counted() {
    let h = harness().await;
    let broken = h.node.ledger().create(1).await.unwrap();
    let healthy = h.node.ledger().create(2).await.unwrap();
    h.chain.fail(&broken.address);
    h.chain.push_transfer(&healthy.address, incoming("cc01", SENDER, &healthy.address, 2_000_000));

    let notifier = Arc::new(RecordingNotifier::default());
    let report = h.node.observer(notifier.clone()).tick().await.unwrap();

    assert_eq!(report, TickReport { scanned: 2, recorded: 1, failed: 1 });
    assert_eq!(notifier.sent()[0].0, 2);
}

/// Test: a transfer already logged (e.g. our own outgoing one) is skipped
#[tokio::test]
async fn already_logged_is_skipped() {
    let h = harness().await;
    let wallet = h.node.ledger().create(1).await.unwrap();
    h.node
        .txlog()
        .append(&custodia::storage::txlog::NewTransaction {
            user_id: 1,
            tx_hash: "dd01".into(),
            direction: Direction::Incoming,
            from_address: SENDER.into(),
            to_address: wallet.address.clone(),
            amount: Decimal::ONE,
            explorer_link: "https://tronscan.org/#/transaction/dd01".into(),
        })
        .await
        .unwrap();
    h.chain.push_transfer(&wallet.address, incoming("dd01", SENDER, &wallet.address, 1_000_000));

    let notifier = Arc::new(RecordingNotifier::default());
    let report = h.node.observer(notifier.clone()).tick().await.unwrap();
    assert_eq!(report.recorded, 0);
    assert!(notifier.sent().is_empty());
}

/// Test: a failed notice still leaves the record in place
#[tokio::test]
async fn notify_failure_keeps_record() {
    let h = harness().await;
    let wallet = h.node.ledger().create(1).await.unwrap();
    h.chain.push_transfer(&wallet.address, incoming("ee01", SENDER, &wallet.address, 3_000_000));

    let notifier = Arc::new(RecordingNotifier::default());
    *notifier.fail.lock().unwrap() = true;
    let report = h.node.observer(notifier).tick().await.unwrap();

    assert_eq!(report, TickReport { scanned: 1, recorded: 1, failed: 0 });
    assert_eq!(h.node.txlog().list_for_user(1).await.unwrap().len(), 1);
}

/// Test: the loop exits promptly on shutdown
#[tokio::test]
async fn run_stops_on_shutdown() {
    let h = common::harness_with(custodia::NodeConfig::new("test").with_observer(ObserverConfig {
        poll_interval: Duration::from_secs(3600),
        retry_interval: Duration::from_secs(3600),
        page_size: 5,
    }))
    .await;
    let wallet = h.node.ledger().create(1).await.unwrap();
    h.chain.push_transfer(&wallet.address, incoming("ff01", SENDER, &wallet.address, 1_000_000));

    let observer = h.node.observer(Arc::new(RecordingNotifier::default()));
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn(async move { observer.run(rx).await });

    // First tick runs immediately, then the loop sleeps for an hour.
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task).await.expect("observer stopped").unwrap();

    assert_eq!(h.node.txlog().list_for_user(1).await.unwrap().len(), 1);
}

async fn wait_for_records(h: &common::Harness, user_id: i64, count: usize, within: Duration) -> bool {
    tokio::time::timeout(within, async {
        while h.node.txlog().list_for_user(user_id).await.unwrap().len() < count {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

fn split_intervals() -> custodia::NodeConfig {
    custodia::NodeConfig::new("test").with_observer(ObserverConfig {
        poll_interval: Duration::from_secs(3600),
        retry_interval: Duration::from_millis(100),
        page_size: 5,
    })
}

/// Test: after a tick with failures the loop waits retry_interval, not poll_interval
#[tokio::test]
async fn failed_tick_retries_sooner() {
    let h = common::harness_with(split_intervals()).await;
    let broken = h.node.ledger().create(1).await.unwrap();
    let healthy = h.node.ledger().create(2).await.unwrap();
    h.chain.fail(&broken.address);

    let observer = h.node.observer(Arc::new(RecordingNotifier::default()));
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn(async move { observer.run(rx).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    h.chain.push_transfer(&healthy.address, incoming("gg01", SENDER, &healthy.address, 1_000_000));
    assert!(wait_for_records(&h, 2, 1, Duration::from_secs(5)).await, "picked up on a retry tick");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task).await.expect("observer stopped").unwrap();
}

/// Test: a clean tick waits the full poll_interval
#[tokio::test]
async fn clean_tick_waits_poll_interval() {
    let h = common::harness_with(split_intervals()).await;
    let wallet = h.node.ledger().create(1).await.unwrap();

    let observer = h.node.observer(Arc::new(RecordingNotifier::default()));
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn(async move { observer.run(rx).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    h.chain.push_transfer(&wallet.address, incoming("hh01", SENDER, &wallet.address, 1_000_000));
    assert!(!wait_for_records(&h, 1, 1, Duration::from_millis(500)).await, "no tick before poll_interval");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task).await.expect("observer stopped").unwrap();
}
