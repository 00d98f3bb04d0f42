mod common;

use common::{ScriptedDecision, ScriptedExecution, Signal};
use daytrader::adapters::memory_ledger::MemoryLedger;
use daytrader::domain::engine::EngineConfig;
use daytrader::domain::error::DaytraderError;
use daytrader::domain::scheduler::{EngineStatus, Scheduler};
use daytrader::domain::service::{NewService, ServiceState, TradingMode, TradingService};
use daytrader::ports::ledger_port::LedgerPort;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_millis(1),
        retry_backoff: Duration::from_millis(1),
        rejected_backoff: Duration::from_millis(1),
        max_retries: 3,
    }
}

fn new_service(ledger: &MemoryLedger, symbol: &str) -> TradingService {
    ledger
        .create_service(&NewService::new(symbol, dec!(1000)).unwrap())
        .unwrap()
}

async fn wait_until<F>(ledger: &MemoryLedger, service_id: i64, predicate: F)
where
    F: Fn(&TradingService) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let service = ledger.service(service_id).unwrap();
            if predicate(&service) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn complete_cycle_through_the_scheduler() {
    let ledger = Arc::new(MemoryLedger::new());
    let service = new_service(&ledger, "AAPL");

    let decision = Arc::new(
        ScriptedDecision::new()
            .with_buy(&[Signal::Yes, Signal::No])
            .with_sell(&[Signal::No, Signal::Yes, Signal::No]),
    );
    let execution = Arc::new(
        ScriptedExecution::new()
            .with_purchase(5, dec!(150))
            .with_sale(dec!(160)),
    );

    let scheduler = Scheduler::new(ledger.clone(), decision, execution, fast_config());
    scheduler.start(service.id).unwrap();

    wait_until(&ledger, service.id, |s| s.sell_count == 1).await;
    scheduler.stop(service.id).unwrap();
    scheduler.shutdown().await;

    let after = ledger.service(service.id).unwrap();
    assert_eq!(after.current_balance, dec!(1050));
    assert_eq!(after.current_shares, 0);
    assert_eq!(after.total_gain_loss, dec!(50));
    assert_eq!(after.buy_count, 1);
    assert_eq!(after.sell_count, 1);
    assert_eq!(after.mode, TradingMode::Buy);

    let transactions = ledger.transactions_for_service(service.id).unwrap();
    assert_eq!(transactions.len(), 1);
    assert!(transactions[0].is_closed());
    assert_eq!(transactions[0].gain_loss, Some(dec!(50)));
}

#[tokio::test]
async fn services_trade_independently() {
    let ledger = Arc::new(MemoryLedger::new());
    let winner = new_service(&ledger, "AAPL");
    let idler = new_service(&ledger, "MSFT");

    // Only the first scripted purchase exists; the idler never gets a yes.
    let decision = Arc::new(
        ScriptedDecision::new()
            .with_buy(&[Signal::Yes, Signal::No])
            .with_sell(&[Signal::No]),
    );
    let execution = Arc::new(ScriptedExecution::new().with_purchase(2, dec!(150)));

    let scheduler = Scheduler::new(ledger.clone(), decision, execution, fast_config());
    let started = scheduler.start_active_services().unwrap();
    assert_eq!(started, 2);

    wait_until(&ledger, winner.id, |s| s.buy_count == 1).await;
    scheduler.shutdown().await;

    let idler_after = ledger.service(idler.id).unwrap();
    assert_eq!(idler_after.current_balance, dec!(1000));
    assert_eq!(idler_after.buy_count, 0);
}

#[tokio::test]
async fn double_start_is_rejected_while_running() {
    let ledger = Arc::new(MemoryLedger::new());
    let service = new_service(&ledger, "AAPL");

    let decision = Arc::new(ScriptedDecision::new().with_buy(&[Signal::No]));
    let execution = Arc::new(ScriptedExecution::new());

    let scheduler = Scheduler::new(ledger.clone(), decision, execution, fast_config());
    scheduler.start(service.id).unwrap();

    assert!(matches!(
        scheduler.start(service.id),
        Err(DaytraderError::ConcurrentStartRejected { .. })
    ));
    assert_eq!(scheduler.status(service.id), EngineStatus::Running);

    scheduler.shutdown().await;
    assert_eq!(scheduler.status(service.id), EngineStatus::Idle);
}

#[tokio::test]
async fn stop_interrupts_a_long_poll_wait() {
    let ledger = Arc::new(MemoryLedger::new());
    let service = new_service(&ledger, "AAPL");

    let decision = Arc::new(ScriptedDecision::new().with_buy(&[Signal::No]));
    let execution = Arc::new(ScriptedExecution::new());

    let config = EngineConfig {
        poll_interval: Duration::from_secs(3600),
        ..fast_config()
    };
    let scheduler = Scheduler::new(ledger.clone(), decision, execution, config);
    scheduler.start(service.id).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    scheduler.stop(service.id).unwrap();

    tokio::time::timeout(Duration::from_secs(1), scheduler.shutdown())
        .await
        .expect("shutdown should not wait out the poll interval");

    assert_eq!(
        ledger.service(service.id).unwrap().state,
        ServiceState::Inactive
    );
}

#[tokio::test]
async fn decision_outage_parks_service_in_error_and_allows_restart() {
    let ledger = Arc::new(MemoryLedger::new());
    let service = new_service(&ledger, "AAPL");

    let decision = Arc::new(ScriptedDecision::new().with_buy(&[Signal::Unavailable]));
    let execution = Arc::new(ScriptedExecution::new());

    let scheduler = Scheduler::new(ledger.clone(), decision, execution, fast_config());
    scheduler.start(service.id).unwrap();

    wait_until(&ledger, service.id, |s| s.state == ServiceState::Error).await;
    tokio::time::timeout(Duration::from_secs(2), async {
        while scheduler.status(service.id) == EngineStatus::Running {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("failed engine should leave the registry");

    // Nothing moved while the port was down.
    let after = ledger.service(service.id).unwrap();
    assert_eq!(after.current_balance, dec!(1000));
    assert!(ledger.transactions_for_service(service.id).unwrap().is_empty());

    // A restart re-activates and resumes buying.
    scheduler.start(service.id).unwrap();
    let restarted = ledger.service(service.id).unwrap();
    assert_eq!(restarted.state, ServiceState::Active);
    assert_eq!(restarted.mode, TradingMode::Buy);
    scheduler.shutdown().await;
}

#[cfg(feature = "sqlite")]
mod sqlite_parity {
    use super::*;
    use daytrader::adapters::sqlite_ledger::SqliteLedger;
    use daytrader::domain::cycle::{PurchaseFill, SaleFill};
    use chrono::Utc;

    /// The same cycle committed through both ledgers lands on identical
    /// financial state.
    #[test]
    fn memory_and_sqlite_agree_on_a_cycle() {
        let memory = MemoryLedger::new();
        let sqlite = SqliteLedger::in_memory().unwrap();
        sqlite.initialize_schema().unwrap();

        let buy = PurchaseFill {
            quantity: 5,
            price: dec!(150),
            executed_at: Utc::now(),
        };
        let sell = SaleFill {
            price: dec!(160),
            executed_at: Utc::now(),
        };

        let ledgers: [&dyn LedgerPort; 2] = [&memory, &sqlite];
        for ledger in ledgers {
            let service = ledger
                .create_service(&NewService::new("AAPL", dec!(1000)).unwrap())
                .unwrap();
            let (_, tx) = ledger.open_transaction(service.id, &buy).unwrap();
            let (after, closed) = ledger.close_transaction(service.id, tx.id, &sell).unwrap();

            assert_eq!(after.current_balance, dec!(1050));
            assert_eq!(after.total_gain_loss, dec!(50));
            assert_eq!(after.current_shares, 0);
            assert_eq!(after.mode, TradingMode::Buy);
            assert_eq!(closed.gain_loss, Some(dec!(50)));
        }
    }
}
